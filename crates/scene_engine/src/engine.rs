//! Engine facade
//!
//! Bundles a scene graph, the resource caches and the component registry,
//! and drives the per-frame update.

use thiserror::Error;

use crate::config::{Config, ConfigError, EngineConfig};
use crate::foundation::collections::NodeKey;
use crate::resources::{ResourceContext, ResourceError};
use crate::scene::{ComponentId, ComponentRegistry, ComponentSpec, RegistryError, SceneError, SceneGraph, UpdateReport};

/// Engine errors
#[derive(Debug, Error)]
pub enum EngineError {
    /// Configuration could not be loaded
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Scene graph operation failed
    #[error("scene error: {0}")]
    Scene(#[from] SceneError),

    /// Resource cache operation failed
    #[error("resource error: {0}")]
    Resource(#[from] ResourceError),

    /// Component construction failed
    #[error("component error: {0}")]
    Registry(#[from] RegistryError),

    /// Frame time was negative or not finite
    #[error("invalid delta time: {0}")]
    InvalidDeltaTime(f32),
}

/// Main engine struct
pub struct Engine {
    scene: SceneGraph,
    resources: ResourceContext,
    registry: ComponentRegistry,
    config: EngineConfig,
    frame: u64,
}

impl Engine {
    /// Create an engine with built-in component kinds registered
    pub fn new(config: EngineConfig) -> Self {
        log::info!("Initializing scene engine...");
        Self {
            scene: SceneGraph::with_config(config.scene.clone()),
            resources: ResourceContext::with_config(config.resources.clone()),
            registry: ComponentRegistry::with_builtins(),
            config,
            frame: 0,
        }
    }

    /// Create an engine from a TOML or RON configuration file
    pub fn from_config_file(path: &str) -> Result<Self, EngineError> {
        let config = EngineConfig::load_from_file(path)?;
        log::info!("Loaded configuration from {}", path);
        Ok(Self::new(config))
    }

    /// Get the scene graph
    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    /// Get mutable access to the scene graph
    pub fn scene_mut(&mut self) -> &mut SceneGraph {
        &mut self.scene
    }

    /// Get the resource caches
    pub fn resources(&self) -> &ResourceContext {
        &self.resources
    }

    /// Get the component registry
    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Get mutable access to the component registry
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Engine configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Frames updated so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Build a component from data and attach it to `node`
    pub fn attach_from_spec(&mut self, node: NodeKey, spec: &ComponentSpec) -> Result<ComponentId, EngineError> {
        let component = self.registry.instantiate(spec, &self.resources)?;
        Ok(self.scene.attach_component(node, component)?)
    }

    /// Advance the scene by `delta_time` seconds
    pub fn update(&mut self, delta_time: f32) -> Result<UpdateReport, EngineError> {
        if !delta_time.is_finite() || delta_time < 0.0 {
            return Err(EngineError::InvalidDeltaTime(delta_time));
        }

        let report = self.scene.update(delta_time);
        self.frame += 1;
        log::trace!("Frame {}: {:?}", self.frame, report);
        Ok(report)
    }

    /// Tear the scene down and report resources still held elsewhere
    ///
    /// Returns the number of cache entries that outlived the scene.
    pub fn shutdown(mut self) -> usize {
        log::info!("Shutting down after {} frame(s)", self.frame);

        let root = self.scene.root();
        let children = self.scene.children(root).to_vec();
        for child in children {
            if let Err(e) = self.scene.destroy(child) {
                log::warn!("Failed to destroy {:?} during shutdown: {}", child, e);
            }
        }
        self.scene.purge_terminated();

        let leaked = self.resources.report_outstanding();
        log::info!("Engine shutdown complete");
        leaked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Pose, Vec3};

    #[test]
    fn test_rejects_bad_delta_time() {
        let mut engine = Engine::new(EngineConfig::default());
        assert!(matches!(engine.update(-1.0), Err(EngineError::InvalidDeltaTime(_))));
        assert!(matches!(engine.update(f32::NAN), Err(EngineError::InvalidDeltaTime(_))));
        assert_eq!(engine.frame(), 0);
    }

    #[test]
    fn test_registry_components_release_on_shutdown() {
        let mut engine = Engine::new(EngineConfig::default());
        let root = engine.scene().root();
        let ship = engine
            .scene_mut()
            .spawn_with_pose("ship", root, Pose::from_translation(Vec3::new(1.0, 0.0, 0.0)))
            .unwrap();

        engine
            .attach_from_spec(ship, &ComponentSpec::new("model").with("mesh", "builtin/cube"))
            .unwrap();
        engine.update(0.016).unwrap();

        assert!(engine.resources().meshes().contains("builtin/cube"));
        assert_eq!(engine.frame(), 1);

        let resources = engine.resources().clone();
        assert_eq!(engine.shutdown(), 0);
        assert!(resources.meshes().is_empty());
    }

    #[test]
    fn test_unknown_kind_surfaces_as_registry_error() {
        let mut engine = Engine::new(EngineConfig::default());
        let root = engine.scene().root();
        let err = engine.attach_from_spec(root, &ComponentSpec::new("audio")).unwrap_err();
        assert!(matches!(err, EngineError::Registry(RegistryError::UnknownKind(_))));
    }
}
