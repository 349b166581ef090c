//! Component registry
//!
//! Maps kind names to constructors so scene data can name components
//! without the loader knowing their concrete types. Constructors receive the
//! [`ResourceContext`] to acquire whatever cached assets they reference.

use std::collections::{BTreeMap, HashMap};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::foundation::math::Vec3;
use crate::resources::{CacheHandle, Mesh, ProceduralLoader, ResourceContext, ResourceError, Texture};

use super::component::Component;
use super::components::{CameraComponent, LightComponent, ModelComponent, SpriteComponent};

/// Data description of one component
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Registered kind name
    pub kind: String,
    /// Constructor parameters
    #[serde(default)]
    pub params: BTreeMap<String, String>,
}

impl ComponentSpec {
    /// Spec with no parameters
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    /// Builder pattern: add a parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Required parameter
    pub fn require(&self, param: &'static str) -> Result<&str, RegistryError> {
        self.params
            .get(param)
            .map(String::as_str)
            .ok_or_else(|| RegistryError::MissingParam {
                kind: self.kind.clone(),
                param,
            })
    }

    /// Optional parameter parsed as `T`, `default` when absent
    pub fn parse_or<T: FromStr>(&self, param: &'static str, default: T) -> Result<T, RegistryError> {
        match self.params.get(param) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|_| self.invalid(param, raw)),
        }
    }

    /// Optional `x,y,z` parameter, `default` when absent
    pub fn vec3_or(&self, param: &'static str, default: Vec3) -> Result<Vec3, RegistryError> {
        let Some(raw) = self.params.get(param) else {
            return Ok(default);
        };
        let parts: Vec<f32> = raw
            .split(',')
            .map(|part| part.trim().parse::<f32>())
            .collect::<Result<_, _>>()
            .map_err(|_| self.invalid(param, raw))?;
        match parts.as_slice() {
            [x, y, z] => Ok(Vec3::new(*x, *y, *z)),
            _ => Err(self.invalid(param, raw)),
        }
    }

    fn invalid(&self, param: &'static str, value: &str) -> RegistryError {
        RegistryError::InvalidParam {
            kind: self.kind.clone(),
            param,
            value: value.to_string(),
        }
    }
}

/// Component construction errors
#[derive(Debug, Error)]
pub enum RegistryError {
    /// No constructor registered for the kind
    #[error("unknown component kind '{0}'")]
    UnknownKind(String),

    /// A required parameter is absent
    #[error("{kind}: missing parameter '{param}'")]
    MissingParam {
        /// Component kind
        kind: String,
        /// Parameter name
        param: &'static str,
    },

    /// A parameter could not be parsed
    #[error("{kind}: invalid value '{value}' for '{param}'")]
    InvalidParam {
        /// Component kind
        kind: String,
        /// Parameter name
        param: &'static str,
        /// Offending value
        value: String,
    },

    /// A referenced resource is neither cached nor built in
    #[error("{kind}: resource '{guid}' is not loaded")]
    MissingResource {
        /// Component kind
        kind: String,
        /// Resource GUID
        guid: String,
    },

    /// Creating a referenced resource failed
    #[error(transparent)]
    Resource(#[from] ResourceError),
}

/// Constructor signature for registered kinds
pub type ComponentConstructor = fn(&ComponentSpec, &ResourceContext) -> Result<Box<dyn Component>, RegistryError>;

/// Kind name → constructor table
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    constructors: HashMap<String, ComponentConstructor>,
}

impl ComponentRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `camera`, `light`, `model` and `sprite` registered
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register("camera", build_camera);
        registry.register("light", build_light);
        registry.register("model", build_model);
        registry.register("sprite", build_sprite);
        registry
    }

    /// Register a constructor, replacing any previous one for `kind`
    pub fn register(&mut self, kind: impl Into<String>, constructor: ComponentConstructor) {
        let kind = kind.into();
        if self.constructors.insert(kind.clone(), constructor).is_some() {
            log::debug!("Replaced constructor for component kind '{}'", kind);
        }
    }

    /// Whether `kind` is registered
    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    /// Registered kinds, sorted
    pub fn kinds(&self) -> Vec<&str> {
        let mut kinds: Vec<&str> = self.constructors.keys().map(String::as_str).collect();
        kinds.sort_unstable();
        kinds
    }

    /// Build a component from its data description
    pub fn instantiate(&self, spec: &ComponentSpec, resources: &ResourceContext) -> Result<Box<dyn Component>, RegistryError> {
        let constructor = self
            .constructors
            .get(&spec.kind)
            .ok_or_else(|| RegistryError::UnknownKind(spec.kind.clone()))?;
        constructor(spec, resources)
    }
}

fn build_camera(spec: &ComponentSpec, _resources: &ResourceContext) -> Result<Box<dyn Component>, RegistryError> {
    let fov_degrees: f32 = spec.parse_or("fov", 60.0)?;
    let aspect = spec.parse_or("aspect", 16.0 / 9.0)?;
    let near = spec.parse_or("near", 0.1)?;
    let far = spec.parse_or("far", 1000.0)?;
    Ok(Box::new(CameraComponent::perspective(fov_degrees.to_radians(), aspect, near, far)))
}

fn build_light(spec: &ComponentSpec, _resources: &ResourceContext) -> Result<Box<dyn Component>, RegistryError> {
    let color = spec.vec3_or("color", Vec3::new(1.0, 1.0, 1.0))?;
    let intensity = spec.parse_or("intensity", 1.0)?;

    let light = match spec.params.get("type").map(String::as_str) {
        None | Some("directional") => LightComponent::directional(color, intensity),
        Some("point") => LightComponent::point(color, intensity, spec.parse_or("range", 10.0)?),
        Some(other) => return Err(spec.invalid("type", other)),
    };
    Ok(Box::new(light))
}

fn build_model(spec: &ComponentSpec, resources: &ResourceContext) -> Result<Box<dyn Component>, RegistryError> {
    let mesh = acquire_mesh(spec, resources, spec.require("mesh")?)?;
    let mut model = ModelComponent::new(mesh);
    if let Some(guid) = spec.params.get("texture") {
        model = model.with_texture(acquire_texture(spec, resources, guid)?);
    }
    Ok(Box::new(model))
}

fn build_sprite(spec: &ComponentSpec, resources: &ResourceContext) -> Result<Box<dyn Component>, RegistryError> {
    let texture = acquire_texture(spec, resources, spec.require("texture")?)?;
    let width = spec.parse_or("width", 1.0)?;
    let height = spec.parse_or("height", 1.0)?;
    let layer = spec.parse_or("layer", 0u8)?;
    Ok(Box::new(SpriteComponent::new(texture, [width, height]).with_layer(layer)))
}

/// Already cached mesh, or a built-in primitive
fn acquire_mesh(spec: &ComponentSpec, resources: &ResourceContext, guid: &str) -> Result<CacheHandle<Mesh>, RegistryError> {
    if let Some(handle) = resources.meshes().get(guid) {
        return Ok(handle);
    }
    let builtins = ProceduralLoader::builtin_meshes();
    if builtins.knows(guid) {
        return Ok(resources.meshes().load(&builtins, guid)?);
    }
    Err(RegistryError::MissingResource {
        kind: spec.kind.clone(),
        guid: guid.to_string(),
    })
}

/// Already cached texture, or a built-in one
fn acquire_texture(
    spec: &ComponentSpec,
    resources: &ResourceContext,
    guid: &str,
) -> Result<CacheHandle<Texture>, RegistryError> {
    if let Some(handle) = resources.textures().get(guid) {
        return Ok(handle);
    }
    let builtins = ProceduralLoader::builtin_textures();
    if builtins.knows(guid) {
        return Ok(resources.textures().load(&builtins, guid)?);
    }
    Err(RegistryError::MissingResource {
        kind: spec.kind.clone(),
        guid: guid.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::components::LightType;

    #[test]
    fn test_builtin_kinds() {
        let registry = ComponentRegistry::with_builtins();
        assert_eq!(registry.kinds(), vec!["camera", "light", "model", "sprite"]);
    }

    #[test]
    fn test_unknown_kind() {
        let registry = ComponentRegistry::new();
        let err = registry
            .instantiate(&ComponentSpec::new("camera"), &ResourceContext::new())
            .unwrap_err();
        assert!(matches!(err, RegistryError::UnknownKind(kind) if kind == "camera"));
    }

    #[test]
    fn test_light_from_params() {
        let registry = ComponentRegistry::with_builtins();
        let spec = ComponentSpec::new("light")
            .with("type", "point")
            .with("color", "1.0, 0.5, 0.25")
            .with("range", "4");

        let component = registry.instantiate(&spec, &ResourceContext::new()).unwrap();
        let light = component.as_any().downcast_ref::<LightComponent>().unwrap();

        assert_eq!(light.light_type, LightType::Point);
        assert_eq!(light.color, Vec3::new(1.0, 0.5, 0.25));
        assert_eq!(light.range, 4.0);
    }

    #[test]
    fn test_invalid_and_missing_params() {
        let registry = ComponentRegistry::with_builtins();
        let resources = ResourceContext::new();

        let bad_color = ComponentSpec::new("light").with("color", "1,2");
        assert!(matches!(
            registry.instantiate(&bad_color, &resources),
            Err(RegistryError::InvalidParam { param: "color", .. })
        ));

        let no_mesh = ComponentSpec::new("model");
        assert!(matches!(
            registry.instantiate(&no_mesh, &resources),
            Err(RegistryError::MissingParam { param: "mesh", .. })
        ));

        let unknown_mesh = ComponentSpec::new("model").with("mesh", "models/ufo.obj");
        assert!(matches!(
            registry.instantiate(&unknown_mesh, &resources),
            Err(RegistryError::MissingResource { .. })
        ));
    }

    #[test]
    fn test_model_uses_cached_or_builtin_mesh() {
        let registry = ComponentRegistry::with_builtins();
        let resources = ResourceContext::new();
        let preloaded = resources.meshes().get_or_insert_with("models/rock.obj", Mesh::quad);

        let rock = registry
            .instantiate(&ComponentSpec::new("model").with("mesh", "models/rock.obj"), &resources)
            .unwrap();
        let cube = registry
            .instantiate(
                &ComponentSpec::new("model")
                    .with("mesh", "builtin/cube")
                    .with("texture", "builtin/checker"),
                &resources,
            )
            .unwrap();

        assert!(rock.as_any().downcast_ref::<ModelComponent>().unwrap().mesh().ptr_eq(&preloaded));
        assert_eq!(resources.meshes().ref_count("models/rock.obj"), 2);
        assert!(resources.meshes().contains("builtin/cube"));
        assert!(resources.textures().contains("builtin/checker"));

        drop(cube);
        assert!(!resources.meshes().contains("builtin/cube"));
    }

    #[test]
    fn test_spec_from_ron() {
        let spec: ComponentSpec = ron::from_str(r#"(kind: "sprite", params: {"texture": "builtin/white", "layer": "2"})"#).unwrap();
        let component = ComponentRegistry::with_builtins()
            .instantiate(&spec, &ResourceContext::new())
            .unwrap();
        assert_eq!(component.kind(), "sprite");
    }
}
