//! Camera component
//!
//! Derives a view matrix from its node's world transform each frame. An
//! optional look-at target is a non-owning [`NodeId`] reference, resolved
//! lazily every update; a target that no longer exists is dropped.

use crate::foundation::math::{translation_of, try_invert, Mat4, Point3, Vec3};
use crate::scene::component::{Component, UpdateContext};
use crate::scene::node::NodeId;

/// Perspective camera
#[derive(Debug, Clone)]
pub struct CameraComponent {
    /// Vertical field of view in radians
    pub fov_y: f32,
    /// Width / height
    pub aspect: f32,
    /// Near clip distance
    pub near: f32,
    /// Far clip distance
    pub far: f32,
    /// Node to look at, if any
    pub target: Option<NodeId>,
    /// Up vector used for look-at
    pub up: Vec3,
    view: Mat4,
    eye: Vec3,
}

impl Default for CameraComponent {
    fn default() -> Self {
        Self::perspective(60.0_f32.to_radians(), 16.0 / 9.0, 0.1, 1000.0)
    }
}

impl CameraComponent {
    /// Perspective camera with no target
    pub fn perspective(fov_y: f32, aspect: f32, near: f32, far: f32) -> Self {
        Self {
            fov_y,
            aspect,
            near,
            far,
            target: None,
            up: Vec3::y(),
            view: Mat4::identity(),
            eye: Vec3::zeros(),
        }
    }

    /// Builder pattern: look at `target` every frame
    pub fn looking_at(mut self, target: NodeId) -> Self {
        self.target = Some(target);
        self
    }

    /// View matrix from the last update
    pub fn view(&self) -> &Mat4 {
        &self.view
    }

    /// World-space eye position from the last update
    pub fn eye(&self) -> Vec3 {
        self.eye
    }

    /// Projection matrix
    pub fn projection(&self) -> Mat4 {
        Mat4::new_perspective(self.aspect, self.fov_y, self.near, self.far)
    }

    /// `projection * view`
    pub fn view_projection(&self) -> Mat4 {
        self.projection() * self.view
    }
}

impl Component for CameraComponent {
    fn kind(&self) -> &'static str {
        "camera"
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        self.eye = translation_of(ctx.object_to_world());

        let target_position = self.target.and_then(|id| {
            let key = ctx.graph().find_by_id(id)?;
            ctx.graph().world_position(key).ok()
        });

        match (self.target, target_position) {
            (_, Some(target)) if target != self.eye => {
                self.view = Mat4::look_at_rh(&Point3::from(self.eye), &Point3::from(target), &self.up);
            }
            (Some(id), None) => {
                log::debug!("Camera target {} is gone, clearing it", id);
                self.target = None;
                self.view = try_invert(ctx.object_to_world()).unwrap_or(self.view);
            }
            _ => {
                self.view = try_invert(ctx.object_to_world()).unwrap_or(self.view);
            }
        }
    }
}
