//! Shared resource management
//!
//! One [`ResourceCache`] per resource kind, bundled in a [`ResourceContext`].
//! Components hold [`CacheHandle`]s; when the last handle for a GUID goes
//! away the instance is destroyed immediately.

pub mod cache;
pub mod context;
pub mod kinds;
pub mod loader;

pub use cache::{CacheHandle, CacheStats, FactoryError, ResourceCache, ResourceError};
pub use context::{OutstandingEntry, ResourceContext};
pub use kinds::{Aabb, Font, Mesh, Shader, ShaderStage, Texture, Vertex};
pub use loader::{normalize_guid, AssetLoader, LoadError, ProceduralLoader, ShaderFileLoader};
