//! Resource kinds held by the per-kind caches
//!
//! These are CPU-side descriptions only. Uploading them to a GPU is the job
//! of a render backend, which is outside this crate.

use std::collections::HashMap;

use crate::foundation::math::{Mat4, Point3, Vec3};

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Box spanning two corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tightest box around `points`, `None` when there are no points
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a Vec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = *points.next()?;
        Some(points.fold(Self::new(first, first), |bounds, p| Self {
            min: bounds.min.inf(p),
            max: bounds.max.sup(p),
        }))
    }

    /// Center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Half extents
    pub fn half_extents(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    /// The eight corners
    pub fn corners(&self) -> [Vec3; 8] {
        let (a, b) = (self.min, self.max);
        [
            Vec3::new(a.x, a.y, a.z),
            Vec3::new(b.x, a.y, a.z),
            Vec3::new(a.x, b.y, a.z),
            Vec3::new(b.x, b.y, a.z),
            Vec3::new(a.x, a.y, b.z),
            Vec3::new(b.x, a.y, b.z),
            Vec3::new(a.x, b.y, b.z),
            Vec3::new(b.x, b.y, b.z),
        ]
    }

    /// Box enclosing this one after applying `matrix` (e.g. object-to-world)
    pub fn transformed(&self, matrix: &Mat4) -> Self {
        let corners = self
            .corners()
            .map(|corner| matrix.transform_point(&Point3::from(corner)).coords);
        // eight corners, never empty
        Self::from_points(corners.iter()).unwrap_or(*self)
    }
}

/// Vertex with position, normal and texture coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    /// Position in object space
    pub position: Vec3,
    /// Normal vector
    pub normal: Vec3,
    /// Texture coordinates
    pub tex_coord: [f32; 2],
}

impl Vertex {
    /// Create a new vertex
    pub fn new(position: [f32; 3], normal: [f32; 3], tex_coord: [f32; 2]) -> Self {
        Self {
            position: Vec3::from(position),
            normal: Vec3::from(normal),
            tex_coord,
        }
    }
}

/// Indexed triangle mesh
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    /// Vertex data
    pub vertices: Vec<Vertex>,
    /// Triangle indices
    pub indices: Vec<u32>,
    /// Object-space bounds, `None` for an empty mesh
    pub bounds: Option<Aabb>,
}

impl Mesh {
    /// Create a mesh and compute its bounds
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        let bounds = Aabb::from_points(vertices.iter().map(|v| &v.position));
        Self {
            vertices,
            indices,
            bounds,
        }
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Whether every index refers to an existing vertex
    pub fn indices_in_range(&self) -> bool {
        self.indices.iter().all(|i| (*i as usize) < self.vertices.len())
    }

    /// Unit cube centered at the origin with vertices at ±1 on each axis
    pub fn cube() -> Self {
        let vertices = vec![
            // Front face
            Vertex::new([-1.0, -1.0, 1.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
            Vertex::new([1.0, -1.0, 1.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([1.0, 1.0, 1.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([-1.0, 1.0, 1.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            // Back face
            Vertex::new([-1.0, -1.0, -1.0], [0.0, 0.0, -1.0], [1.0, 0.0]),
            Vertex::new([-1.0, 1.0, -1.0], [0.0, 0.0, -1.0], [1.0, 1.0]),
            Vertex::new([1.0, 1.0, -1.0], [0.0, 0.0, -1.0], [0.0, 1.0]),
            Vertex::new([1.0, -1.0, -1.0], [0.0, 0.0, -1.0], [0.0, 0.0]),
        ];

        let indices = vec![
            0, 1, 2, 2, 3, 0, // front
            4, 5, 6, 6, 7, 4, // back
            4, 0, 3, 3, 5, 4, // left
            1, 7, 6, 6, 2, 1, // right
            3, 2, 6, 6, 5, 3, // top
            4, 7, 1, 1, 0, 4, // bottom
        ];

        Self::new(vertices, indices)
    }

    /// Unit quad in the XY plane facing +Z, for sprites
    pub fn quad() -> Self {
        let vertices = vec![
            Vertex::new([-0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0]),
            Vertex::new([0.5, -0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 1.0]),
            Vertex::new([0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [1.0, 0.0]),
            Vertex::new([-0.5, 0.5, 0.0], [0.0, 0.0, 1.0], [0.0, 0.0]),
        ];
        Self::new(vertices, vec![0, 1, 2, 2, 3, 0])
    }
}

/// RGBA8 texture in row-major order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Texture {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// `width * height` RGBA pixels
    pub pixels: Vec<[u8; 4]>,
}

impl Texture {
    /// Single-color texture
    pub fn solid(width: u32, height: u32, color: [u8; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![color; (width * height) as usize],
        }
    }

    /// Two-color checkerboard with square cells of `cell` pixels
    pub fn checkerboard(size: u32, cell: u32, a: [u8; 4], b: [u8; 4]) -> Self {
        let cell = cell.max(1);
        let pixels = (0..size * size)
            .map(|i| {
                let (x, y) = (i % size, i / size);
                if (x / cell + y / cell) % 2 == 0 {
                    a
                } else {
                    b
                }
            })
            .collect();
        Self {
            width: size,
            height: size,
            pixels,
        }
    }

    /// Pixel at `(x, y)`, `None` when out of range
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels.get((y * self.width + x) as usize).copied()
    }
}

/// Pipeline stage a shader runs in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    /// Vertex shader
    Vertex,
    /// Pixel (fragment) shader
    Pixel,
}

/// Shader source and entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Shader {
    /// Pipeline stage
    pub stage: ShaderStage,
    /// Source text
    pub source: String,
    /// Entry point name
    pub entry_point: String,
}

impl Shader {
    /// Shader with the conventional `main` entry point
    pub fn new(stage: ShaderStage, source: impl Into<String>) -> Self {
        Self {
            stage,
            source: source.into(),
            entry_point: "main".to_string(),
        }
    }
}

/// Bitmap font metrics
#[derive(Debug, Clone, PartialEq)]
pub struct Font {
    /// Family name
    pub family: String,
    /// Nominal pixel size
    pub size: f32,
    /// Vertical distance between baselines
    pub line_height: f32,
    /// Per-glyph horizontal advance; glyphs not listed use `default_advance`
    pub advances: HashMap<char, f32>,
    /// Advance for unlisted glyphs
    pub default_advance: f32,
}

impl Font {
    /// Monospace font where every glyph advances by `size * 0.6`
    pub fn monospace(family: impl Into<String>, size: f32) -> Self {
        Self {
            family: family.into(),
            size,
            line_height: size * 1.2,
            advances: HashMap::new(),
            default_advance: size * 0.6,
        }
    }

    /// Width of a single line of text
    pub fn measure(&self, text: &str) -> f32 {
        text.chars()
            .map(|c| self.advances.get(&c).copied().unwrap_or(self.default_advance))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Pose;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_bounds_and_indices() {
        let cube = Mesh::cube();
        assert_eq!(cube.triangle_count(), 12);
        assert!(cube.indices_in_range());

        let bounds = cube.bounds.expect("cube has vertices");
        assert_relative_eq!(bounds.min, Vec3::new(-1.0, -1.0, -1.0));
        assert_relative_eq!(bounds.max, Vec3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn test_empty_mesh_has_no_bounds() {
        assert!(Mesh::new(Vec::new(), Vec::new()).bounds.is_none());
    }

    #[test]
    fn test_transformed_bounds_follow_pose() {
        let bounds = Mesh::cube().bounds.unwrap();
        let pose = Pose::from_translation(Vec3::new(10.0, 0.0, 0.0)).with_uniform_scale(2.0);

        let moved = bounds.transformed(&pose.to_matrix());

        assert_relative_eq!(moved.center(), Vec3::new(10.0, 0.0, 0.0), epsilon = 1e-5);
        assert_relative_eq!(moved.half_extents(), Vec3::new(2.0, 2.0, 2.0), epsilon = 1e-5);
    }

    #[test]
    fn test_checkerboard_alternates() {
        let white = [255, 255, 255, 255];
        let black = [0, 0, 0, 255];
        let texture = Texture::checkerboard(4, 2, white, black);

        assert_eq!(texture.pixel(0, 0), Some(white));
        assert_eq!(texture.pixel(2, 0), Some(black));
        assert_eq!(texture.pixel(2, 2), Some(white));
        assert_eq!(texture.pixel(4, 0), None);
    }

    #[test]
    fn test_font_measure() {
        let mut font = Font::monospace("mono", 10.0);
        font.advances.insert('i', 2.0);
        assert_relative_eq!(font.measure("hi"), 8.0);
    }
}
