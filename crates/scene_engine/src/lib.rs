//! # Scene Engine
//!
//! The scene-management core of a real-time 3D engine.
//!
//! ## Features
//!
//! - **Scene Graph**: Arena-backed node hierarchy with components
//! - **Hierarchical Transforms**: Lazily recomputed world matrices with dirty flags
//! - **Lifecycle**: Active / passive / terminated states with cascading termination
//! - **Resource Caching**: Thread-safe, reference-counted, GUID-keyed caches
//!
//! ## Quick Start
//!
//! ```rust
//! use scene_engine::prelude::*;
//!
//! let mut engine = Engine::new(EngineConfig::default());
//! let root = engine.scene().root();
//! let ship = engine
//!     .scene_mut()
//!     .spawn_with_pose("ship", root, Pose::from_translation(Vec3::new(0.0, 2.0, 0.0)))
//!     .unwrap();
//!
//! let mesh = engine.resources().meshes().get_or_insert_with("builtin/cube", Mesh::cube);
//! engine.scene_mut().add_component(ship, ModelComponent::new(mesh)).unwrap();
//!
//! engine.update(1.0 / 60.0).unwrap();
//! assert_eq!(engine.scene().world_position(ship).unwrap(), Vec3::new(0.0, 2.0, 0.0));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod config;
pub mod foundation;
pub mod resources;
pub mod scene;

mod engine;

pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        config::{Config, EngineConfig, ResourceConfig, SceneConfig},
        foundation::math::{Mat4, Point3, Pose, Quat, Vec3},
        resources::{CacheHandle, Mesh, ResourceCache, ResourceContext, Shader, ShaderStage, Texture},
        scene::{
            components::{CameraComponent, LightComponent, ModelComponent, ScriptComponent, SpriteComponent},
            Component, ComponentSpec, LifecycleState, NodeKey, SceneGraph, Visit,
        },
        Engine, EngineError,
    };
}
