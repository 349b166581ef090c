//! Loader seam between asset sources and the resource caches
//!
//! A loader turns a GUID into a freshly constructed instance. The cache
//! decides whether the loader runs at all: [`ResourceCache::load`] only
//! calls it on a miss.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::cache::{CacheHandle, ResourceCache, ResourceError};
use super::kinds::{Mesh, Shader, ShaderStage, Texture};

/// Asset loading errors
#[derive(Debug, Error)]
pub enum LoadError {
    /// No asset is known under the GUID
    #[error("asset not found: {0}")]
    NotFound(String),

    /// The asset exists but its contents are unusable
    #[error("malformed asset '{guid}': {reason}")]
    Malformed {
        /// GUID of the asset
        guid: String,
        /// What is wrong with it
        reason: String,
    },

    /// Reading the asset failed
    #[error("IO error loading '{guid}': {source}")]
    Io {
        /// GUID of the asset
        guid: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Produces instances of `T` from GUIDs
pub trait AssetLoader<T>: Send + Sync {
    /// Construct the asset named by `guid`
    fn load(&self, guid: &str) -> Result<T, LoadError>;
}

/// Canonical form of a path-like GUID
///
/// Separators become `/`, empty and `.` segments are dropped and `..` pops a
/// segment, so two spellings of the same asset path share one cache entry.
/// Case is preserved: GUIDs are compared exactly, and file loaders open the
/// path they are given. GUIDs that are not paths pass through unchanged
/// apart from surrounding whitespace.
pub fn normalize_guid(guid: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in guid.trim().split(['/', '\\']) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    segments.join("/")
}

impl<T> ResourceCache<T> {
    /// Acquire `guid` through `loader`, which only runs on a miss
    ///
    /// The GUID is normalized first, see [`normalize_guid`]; the loader and
    /// the cache both see the normalized form, so a later
    /// [`ResourceCache::get_or_create`] with that spelling hits the same entry.
    pub fn load<L>(&self, loader: &L, guid: &str) -> Result<CacheHandle<T>, ResourceError>
    where
        L: AssetLoader<T> + ?Sized,
    {
        let guid = normalize_guid(guid);
        self.get_or_create(&guid, || loader.load(&guid))
    }
}

type Generator<T> = Box<dyn Fn() -> T + Send + Sync>;

/// Loader backed by in-memory generator functions
///
/// Used for procedural assets (primitive meshes, solid textures) and in
/// tests. Registered GUIDs are normalized.
pub struct ProceduralLoader<T> {
    generators: HashMap<String, Generator<T>>,
}

impl<T> Default for ProceduralLoader<T> {
    fn default() -> Self {
        Self {
            generators: HashMap::new(),
        }
    }
}

impl<T> fmt::Debug for ProceduralLoader<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut guids: Vec<&String> = self.generators.keys().collect();
        guids.sort();
        f.debug_struct("ProceduralLoader").field("guids", &guids).finish()
    }
}

impl<T> ProceduralLoader<T> {
    /// Create an empty loader
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a generator, replacing any previous one for the same GUID
    pub fn register<F>(&mut self, guid: &str, generator: F) -> &mut Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.generators.insert(normalize_guid(guid), Box::new(generator));
        self
    }

    /// Builder form of [`ProceduralLoader::register`]
    pub fn with<F>(mut self, guid: &str, generator: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        self.register(guid, generator);
        self
    }

    /// Whether a generator exists for `guid`
    pub fn knows(&self, guid: &str) -> bool {
        self.generators.contains_key(&normalize_guid(guid))
    }
}

impl ProceduralLoader<Mesh> {
    /// `builtin/cube` and `builtin/quad`
    pub fn builtin_meshes() -> Self {
        Self::new()
            .with("builtin/cube", Mesh::cube)
            .with("builtin/quad", Mesh::quad)
    }
}

impl ProceduralLoader<Texture> {
    /// `builtin/white`, `builtin/black` and `builtin/checker`
    pub fn builtin_textures() -> Self {
        const WHITE: [u8; 4] = [255, 255, 255, 255];
        const BLACK: [u8; 4] = [0, 0, 0, 255];
        Self::new()
            .with("builtin/white", || Texture::solid(1, 1, WHITE))
            .with("builtin/black", || Texture::solid(1, 1, BLACK))
            .with("builtin/checker", || Texture::checkerboard(64, 8, WHITE, BLACK))
    }
}

impl<T> AssetLoader<T> for ProceduralLoader<T> {
    fn load(&self, guid: &str) -> Result<T, LoadError> {
        self.generators
            .get(&normalize_guid(guid))
            .map(|generate| generate())
            .ok_or_else(|| LoadError::NotFound(guid.to_string()))
    }
}

/// Loads shader source text from files under a root directory
#[derive(Debug, Clone)]
pub struct ShaderFileLoader {
    root: PathBuf,
    stage: ShaderStage,
}

impl ShaderFileLoader {
    /// Loader for `stage` shaders stored under `root`
    pub fn new(root: impl AsRef<Path>, stage: ShaderStage) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            stage,
        }
    }
}

impl AssetLoader<Shader> for ShaderFileLoader {
    fn load(&self, guid: &str) -> Result<Shader, LoadError> {
        let path = self.root.join(guid);
        let source = std::fs::read_to_string(&path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                LoadError::NotFound(guid.to_string())
            } else {
                LoadError::Io {
                    guid: guid.to_string(),
                    source,
                }
            }
        })?;

        if source.trim().is_empty() {
            return Err(LoadError::Malformed {
                guid: guid.to_string(),
                reason: "empty shader source".to_string(),
            });
        }

        log::debug!("Loaded {:?} shader from {}", self.stage, path.display());
        Ok(Shader::new(self.stage, source))
    }
}
