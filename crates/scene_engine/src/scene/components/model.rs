//! Model component
//!
//! Holds cache handles for a mesh and an optional texture. The handles are
//! the component's only claim on those resources: when the component is
//! dropped (its node destroyed or purged) the references are released, and
//! the last release destroys the cached instance.

use std::fmt;

use crate::resources::{Aabb, CacheHandle, Mesh, Texture};
use crate::scene::component::{Component, UpdateContext};

/// Renderable mesh instance
#[derive(Clone)]
pub struct ModelComponent {
    mesh: CacheHandle<Mesh>,
    texture: Option<CacheHandle<Texture>>,
    /// Whether the model should be drawn
    pub visible: bool,
    world_bounds: Option<Aabb>,
}

impl ModelComponent {
    /// Model drawing `mesh`
    pub fn new(mesh: CacheHandle<Mesh>) -> Self {
        Self {
            mesh,
            texture: None,
            visible: true,
            world_bounds: None,
        }
    }

    /// Builder pattern: sample `texture`
    pub fn with_texture(mut self, texture: CacheHandle<Texture>) -> Self {
        self.texture = Some(texture);
        self
    }

    /// Shared mesh
    pub fn mesh(&self) -> &CacheHandle<Mesh> {
        &self.mesh
    }

    /// Shared texture, if any
    pub fn texture(&self) -> Option<&CacheHandle<Texture>> {
        self.texture.as_ref()
    }

    /// Mesh bounds in world space as of the last update
    pub fn world_bounds(&self) -> Option<Aabb> {
        self.world_bounds
    }
}

impl fmt::Debug for ModelComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelComponent")
            .field("mesh", &self.mesh.guid())
            .field("texture", &self.texture.as_ref().map(CacheHandle::guid))
            .field("visible", &self.visible)
            .field("world_bounds", &self.world_bounds)
            .finish()
    }
}

impl Component for ModelComponent {
    fn kind(&self) -> &'static str {
        "model"
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        self.world_bounds = self.mesh.bounds.map(|bounds| bounds.transformed(ctx.object_to_world()));
    }
}
