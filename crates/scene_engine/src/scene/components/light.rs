//! Light component

use crate::foundation::math::{translation_of, Vec3, Vec4};
use crate::scene::component::{Component, UpdateContext};

/// Types of lights
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LightType {
    /// Parallel rays along the node's -Z axis
    Directional,
    /// Radiates in all directions from the node's origin
    Point,
}

/// Light data plus its world-space placement from the last update
#[derive(Debug, Clone)]
pub struct LightComponent {
    /// The type of light
    pub light_type: LightType,
    /// RGB color (0.0 to 1.0 range)
    pub color: Vec3,
    /// Intensity multiplier
    pub intensity: f32,
    /// Maximum range for point lights
    pub range: f32,
    world_position: Vec3,
    world_direction: Vec3,
}

impl LightComponent {
    /// Directional light
    pub fn directional(color: Vec3, intensity: f32) -> Self {
        Self {
            light_type: LightType::Directional,
            color,
            intensity,
            range: 0.0,
            world_position: Vec3::zeros(),
            world_direction: -Vec3::z(),
        }
    }

    /// Point light
    pub fn point(color: Vec3, intensity: f32, range: f32) -> Self {
        Self {
            light_type: LightType::Point,
            range,
            ..Self::directional(color, intensity)
        }
    }

    /// World-space position from the last update
    pub fn world_position(&self) -> Vec3 {
        self.world_position
    }

    /// World-space unit direction from the last update
    pub fn world_direction(&self) -> Vec3 {
        self.world_direction
    }
}

impl Component for LightComponent {
    fn kind(&self) -> &'static str {
        "light"
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        let world = ctx.object_to_world();
        self.world_position = translation_of(world);

        let forward = (world * Vec4::new(0.0, 0.0, -1.0, 0.0)).xyz();
        if let Some(direction) = forward.try_normalize(f32::EPSILON) {
            self.world_direction = direction;
        }
    }
}
