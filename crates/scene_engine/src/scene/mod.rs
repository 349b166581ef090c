//! Scene management
//!
//! A hierarchy of [`Node`]s stored in a [`SceneGraph`] arena. Every node owns
//! a [`Transform`] and a list of [`Component`]s; world matrices are derived
//! lazily from the local poses along the parent chain.
//!
//! ## Usage
//!
//! ```
//! use scene_engine::foundation::math::{Pose, Vec3};
//! use scene_engine::scene::SceneGraph;
//!
//! let mut graph = SceneGraph::new();
//! let arm = graph
//!     .spawn_with_pose("arm", graph.root(), Pose::from_translation(Vec3::new(1.0, 0.0, 0.0)))
//!     .unwrap();
//! let hand = graph
//!     .spawn_with_pose("hand", arm, Pose::from_translation(Vec3::new(0.0, 1.0, 0.0)))
//!     .unwrap();
//!
//! assert_eq!(graph.world_position(hand).unwrap(), Vec3::new(1.0, 1.0, 0.0));
//! ```

pub mod command;
pub mod component;
pub mod components;
pub mod error;
pub mod graph;
pub mod node;
pub mod registry;
pub mod transform;

#[cfg(test)]
mod tests;

pub use command::SceneCommand;
pub use component::{Component, ComponentId, ComponentSlot, LifecycleState, UpdateContext};
pub use error::{DegenerateTransformError, SceneError, StructuralViolation};
pub use graph::{SceneGraph, Traversal, UpdateReport, Visit};
pub use node::{Node, NodeId};
pub use registry::{ComponentRegistry, ComponentSpec, RegistryError};
pub use transform::{DirtyFlags, Transform};

pub use crate::foundation::collections::NodeKey;
