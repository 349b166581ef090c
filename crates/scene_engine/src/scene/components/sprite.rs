//! Sprite component

use std::fmt;

use crate::foundation::math::{translation_of, Vec3};
use crate::resources::{CacheHandle, Texture};
use crate::scene::component::{Component, UpdateContext};

/// Camera-facing textured quad
#[derive(Clone)]
pub struct SpriteComponent {
    texture: CacheHandle<Texture>,
    /// Width and height in world units
    pub size: [f32; 2],
    /// RGBA tint multiplied with the texture
    pub tint: [f32; 4],
    /// Draw order; higher layers draw later
    pub layer: u8,
    world_center: Vec3,
}

impl SpriteComponent {
    /// Untinted sprite of the given size
    pub fn new(texture: CacheHandle<Texture>, size: [f32; 2]) -> Self {
        Self {
            texture,
            size,
            tint: [1.0; 4],
            layer: 0,
            world_center: Vec3::zeros(),
        }
    }

    /// Builder pattern: set tint
    pub fn with_tint(mut self, tint: [f32; 4]) -> Self {
        self.tint = tint;
        self
    }

    /// Builder pattern: set draw layer
    pub fn with_layer(mut self, layer: u8) -> Self {
        self.layer = layer;
        self
    }

    /// Shared texture
    pub fn texture(&self) -> &CacheHandle<Texture> {
        &self.texture
    }

    /// World-space center as of the last update
    pub fn world_center(&self) -> Vec3 {
        self.world_center
    }
}

impl fmt::Debug for SpriteComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpriteComponent")
            .field("texture", &self.texture.guid())
            .field("size", &self.size)
            .field("tint", &self.tint)
            .field("layer", &self.layer)
            .finish()
    }
}

impl Component for SpriteComponent {
    fn kind(&self) -> &'static str {
        "sprite"
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        self.world_center = translation_of(ctx.object_to_world());
    }
}
