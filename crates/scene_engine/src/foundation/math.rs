//! Math utilities and types
//!
//! Provides the fundamental math types used by the scene core.
//!
//! ## Conventions
//!
//! - Column vectors, so a point is transformed as `M * p`
//! - A local pose is composed as `T * R * S`
//! - Hierarchies compose parent-after-child: `world = parent * local`
//!   (object space → parent space → ... → world space)

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Axis length (or scale magnitude) below which a transform is treated as singular.
pub const SINGULAR_EPSILON: f32 = 1e-8;

/// Determinant relative to the product of axis lengths below which the axes
/// are treated as coplanar. 1 for any rotation with non-zero scale.
pub const SINGULAR_RATIO: f32 = 1e-6;

/// Local pose: translation, rotation and scale relative to the parent
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    /// Translation in parent space
    pub translation: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            translation: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Pose {
    /// Create an identity pose
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a pose with only a translation
    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            ..Default::default()
        }
    }

    /// Create a pose with translation and rotation
    pub fn from_translation_rotation(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
            ..Default::default()
        }
    }

    /// Create a pose from all three components
    pub fn new(translation: Vec3, rotation: Quat, scale: Vec3) -> Self {
        Self {
            translation,
            rotation,
            scale,
        }
    }

    /// Builder pattern: set rotation from axis-angle (radians)
    pub fn with_rotation_axis_angle(mut self, axis: Vec3, angle: f32) -> Self {
        self.rotation = Quat::from_axis_angle(&Unit::new_normalize(axis), angle);
        self
    }

    /// Builder pattern: set uniform scale
    pub fn with_uniform_scale(mut self, scale: f32) -> Self {
        self.scale = Vec3::new(scale, scale, scale);
        self
    }

    /// Builder pattern: set non-uniform scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// Convert to a local-to-parent matrix (`T * R * S`)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.translation)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Decompose an affine matrix into a pose
    ///
    /// Shear is discarded. A zero-length basis column yields a zero scale on
    /// that axis and an identity rotation.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let translation = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let scale_x = Vec3::new(matrix.m11, matrix.m21, matrix.m31).magnitude();
        let scale_y = Vec3::new(matrix.m12, matrix.m22, matrix.m32).magnitude();
        let scale_z = Vec3::new(matrix.m13, matrix.m23, matrix.m33).magnitude();
        let scale = Vec3::new(scale_x, scale_y, scale_z);

        if scale_x <= f32::EPSILON || scale_y <= f32::EPSILON || scale_z <= f32::EPSILON {
            return Self {
                translation,
                rotation: Quat::identity(),
                scale,
            };
        }

        let rotation_matrix = Mat3::new(
            matrix.m11 / scale_x, matrix.m12 / scale_y, matrix.m13 / scale_z,
            matrix.m21 / scale_x, matrix.m22 / scale_y, matrix.m23 / scale_z,
            matrix.m31 / scale_x, matrix.m32 / scale_y, matrix.m33 / scale_z,
        );

        Self {
            translation,
            rotation: Quat::from_matrix(&rotation_matrix),
            scale,
        }
    }

    /// Whether every scale component is far enough from zero to invert
    pub fn is_invertible(&self) -> bool {
        self.scale.iter().all(|s| s.abs() > SINGULAR_EPSILON)
    }
}

/// Invert an affine matrix, refusing singular input
///
/// The test is scale-relative: the matrix is singular when one of its basis
/// axes has (near) zero length, or when the axes are (near) coplanar, i.e. the
/// determinant of the linear block is tiny compared to the product of the
/// axis lengths. A tiny uniform scale is therefore still invertible, matching
/// [`Pose::is_invertible`]. Returns `None` when the result would contain
/// non-finite values.
pub fn try_invert(matrix: &Mat4) -> Option<Mat4> {
    let linear: Mat3 = matrix.fixed_view::<3, 3>(0, 0).into_owned();
    let axes = [linear.column(0).norm(), linear.column(1).norm(), linear.column(2).norm()];
    if axes.iter().any(|length| *length <= SINGULAR_EPSILON) {
        return None;
    }
    if linear.determinant().abs() <= SINGULAR_RATIO * axes[0] * axes[1] * axes[2] {
        return None;
    }
    matrix
        .try_inverse()
        .filter(|inverse| inverse.iter().all(|v| v.is_finite()))
}

/// Translation column of an affine matrix
pub fn translation_of(matrix: &Mat4) -> Vec3 {
    Vec3::new(matrix.m14, matrix.m24, matrix.m34)
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Pi / 2
    pub const HALF_PI: f32 = PI * 0.5;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;
}
