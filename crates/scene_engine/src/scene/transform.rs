//! Hierarchical transform cache
//!
//! Each node owns one [`Transform`]: its local-to-parent pose plus two lazily
//! derived matrices, object-to-world and world-to-object, each guarded by its
//! own dirty flag.
//!
//! ## Recomputation model
//!
//! - Writes never recompute. Changing a pose only sets dirty flags; the
//!   [`SceneGraph`](super::SceneGraph) extends them to every descendant.
//! - Reads pull. A dirty matrix is rebuilt from the parent's (already clean)
//!   matrix on first read and cached until the next dirtying.
//! - The forward and inverse caches are independent, so a reader who only
//!   needs one direction never pays for the other.
//!
//! The caches live in `Cell`s so render passes can read through `&SceneGraph`.
//! This makes the scene graph single-threaded by construction.

use std::cell::Cell;

use bitflags::bitflags;

use crate::foundation::collections::NodeKey;
use crate::foundation::math::{try_invert, Mat4, Pose};

bitflags! {
    /// Which derived matrices are stale
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct DirtyFlags: u8 {
        /// `object_to_world` must be recomputed
        const OBJECT_TO_WORLD = 1 << 0;
        /// `world_to_object` must be recomputed
        const WORLD_TO_OBJECT = 1 << 1;
    }
}

/// Inverting a node's local-to-parent matrix failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("local transform of node {node:?} is singular and cannot be inverted")]
pub struct DegenerateTransformError {
    /// Node whose local matrix is singular
    pub node: NodeKey,
}

/// Local pose plus cached world-space matrices
#[derive(Debug)]
pub struct Transform {
    pose: Pose,
    local_to_parent: Mat4,
    object_to_world: Cell<Mat4>,
    world_to_object: Cell<Mat4>,
    dirty: Cell<DirtyFlags>,
    recomputations: Cell<u64>,
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Pose::identity())
    }
}

impl Clone for Transform {
    /// Copies the local pose only; the clone starts dirty because it is
    /// about to live under a different (or no) parent.
    fn clone(&self) -> Self {
        Self {
            pose: self.pose,
            local_to_parent: self.local_to_parent,
            ..Self::default()
        }
    }
}

impl Transform {
    /// Create a transform with the given local pose, fully dirty
    pub fn new(pose: Pose) -> Self {
        Self {
            pose,
            local_to_parent: pose.to_matrix(),
            object_to_world: Cell::new(Mat4::identity()),
            world_to_object: Cell::new(Mat4::identity()),
            dirty: Cell::new(DirtyFlags::all()),
            recomputations: Cell::new(0),
        }
    }

    /// Local pose relative to the parent
    pub fn pose(&self) -> &Pose {
        &self.pose
    }

    /// Local-to-parent matrix
    pub fn local_matrix(&self) -> &Mat4 {
        &self.local_to_parent
    }

    /// Currently stale matrices
    pub fn dirty_flags(&self) -> DirtyFlags {
        self.dirty.get()
    }

    /// Whether any of `flags` is stale
    pub fn is_dirty(&self, flags: DirtyFlags) -> bool {
        self.dirty.get().intersects(flags)
    }

    /// Number of matrix recomputations performed so far (either direction)
    pub fn recompute_count(&self) -> u64 {
        self.recomputations.get()
    }

    /// Cached object-to-world matrix, if it is current
    pub fn cached_object_to_world(&self) -> Option<Mat4> {
        (!self.is_dirty(DirtyFlags::OBJECT_TO_WORLD)).then(|| self.object_to_world.get())
    }

    /// Cached world-to-object matrix, if it is current
    pub fn cached_world_to_object(&self) -> Option<Mat4> {
        (!self.is_dirty(DirtyFlags::WORLD_TO_OBJECT)).then(|| self.world_to_object.get())
    }

    /// Overwrite the local pose and mark this transform dirty.
    ///
    /// Descendants are dirtied by the graph.
    pub(crate) fn set_pose(&mut self, pose: Pose) {
        self.pose = pose;
        self.local_to_parent = pose.to_matrix();
        self.mark_dirty();
    }

    /// Overwrite the local matrix directly and mark this transform dirty.
    ///
    /// The stored pose is a decomposition of `matrix` and drops any shear.
    pub(crate) fn set_matrix(&mut self, matrix: Mat4) {
        self.pose = Pose::from_matrix(&matrix);
        self.local_to_parent = matrix;
        self.mark_dirty();
    }

    pub(crate) fn mark_dirty(&self) {
        self.dirty.set(DirtyFlags::all());
    }

    /// Rebuild `object_to_world` if stale: `parent_o2w * local`.
    ///
    /// `parent` must already be clean; the graph guarantees this by
    /// refreshing ancestors first.
    pub(crate) fn refresh_object_to_world(&self, parent: Option<&Mat4>) -> Mat4 {
        if !self.is_dirty(DirtyFlags::OBJECT_TO_WORLD) {
            return self.object_to_world.get();
        }

        let matrix = match parent {
            Some(parent) => parent * self.local_to_parent,
            None => self.local_to_parent,
        };
        self.object_to_world.set(matrix);
        self.clear(DirtyFlags::OBJECT_TO_WORLD);
        matrix
    }

    /// Rebuild `world_to_object` if stale: `local_inverse * parent_w2o`.
    pub(crate) fn refresh_world_to_object(
        &self,
        node: NodeKey,
        parent: Option<&Mat4>,
    ) -> Result<Mat4, DegenerateTransformError> {
        if !self.is_dirty(DirtyFlags::WORLD_TO_OBJECT) {
            return Ok(self.world_to_object.get());
        }

        let local_inverse = try_invert(&self.local_to_parent).ok_or(DegenerateTransformError { node })?;
        let matrix = match parent {
            Some(parent) => local_inverse * parent,
            None => local_inverse,
        };
        self.world_to_object.set(matrix);
        self.clear(DirtyFlags::WORLD_TO_OBJECT);
        Ok(matrix)
    }

    fn clear(&self, flags: DirtyFlags) {
        self.dirty.set(self.dirty.get() - flags);
        self.recomputations.set(self.recomputations.get() + 1);
    }
}
