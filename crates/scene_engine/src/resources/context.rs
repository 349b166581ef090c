//! Per-kind resource caches bundled for explicit passing
//!
//! There is no global resource manager. Whoever loads assets receives a
//! [`ResourceContext`] and picks the cache for the kind it needs. Cloning
//! the context shares the underlying caches, so it can be handed to loader
//! threads.

use crate::config::ResourceConfig;

use super::cache::{CacheStats, ResourceCache};
use super::kinds::{Font, Mesh, Shader, Texture};

/// Live entry reported by [`ResourceContext::outstanding`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutstandingEntry {
    /// Cache kind
    pub kind: &'static str,
    /// Entry GUID
    pub guid: String,
    /// Handles still alive
    pub refs: usize,
}

/// Caches for every resource kind the engine shares
#[derive(Debug, Clone)]
pub struct ResourceContext {
    meshes: ResourceCache<Mesh>,
    vertex_shaders: ResourceCache<Shader>,
    pixel_shaders: ResourceCache<Shader>,
    textures: ResourceCache<Texture>,
    fonts: ResourceCache<Font>,
    config: ResourceConfig,
}

impl Default for ResourceContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceContext {
    /// Create empty caches with default configuration
    pub fn new() -> Self {
        Self::with_config(ResourceConfig::default())
    }

    /// Create empty caches with custom configuration
    pub fn with_config(config: ResourceConfig) -> Self {
        Self {
            meshes: ResourceCache::with_config("mesh", &config),
            vertex_shaders: ResourceCache::with_config("vertex shader", &config),
            pixel_shaders: ResourceCache::with_config("pixel shader", &config),
            textures: ResourceCache::with_config("texture", &config),
            fonts: ResourceCache::with_config("font", &config),
            config,
        }
    }

    /// Mesh cache
    pub fn meshes(&self) -> &ResourceCache<Mesh> {
        &self.meshes
    }

    /// Vertex shader cache
    pub fn vertex_shaders(&self) -> &ResourceCache<Shader> {
        &self.vertex_shaders
    }

    /// Pixel shader cache
    pub fn pixel_shaders(&self) -> &ResourceCache<Shader> {
        &self.pixel_shaders
    }

    /// Texture cache
    pub fn textures(&self) -> &ResourceCache<Texture> {
        &self.textures
    }

    /// Font cache
    pub fn fonts(&self) -> &ResourceCache<Font> {
        &self.fonts
    }

    /// Active configuration
    pub fn config(&self) -> &ResourceConfig {
        &self.config
    }

    /// Total live entries across all caches
    pub fn total_entries(&self) -> usize {
        self.meshes.len()
            + self.vertex_shaders.len()
            + self.pixel_shaders.len()
            + self.textures.len()
            + self.fonts.len()
    }

    /// Counters of every cache, by kind
    pub fn stats(&self) -> Vec<(&'static str, CacheStats)> {
        vec![
            (self.meshes.kind(), self.meshes.stats()),
            (self.vertex_shaders.kind(), self.vertex_shaders.stats()),
            (self.pixel_shaders.kind(), self.pixel_shaders.stats()),
            (self.textures.kind(), self.textures.stats()),
            (self.fonts.kind(), self.fonts.stats()),
        ]
    }

    /// Every live entry with its reference count
    pub fn outstanding(&self) -> Vec<OutstandingEntry> {
        let mut entries = Vec::new();
        collect(&self.meshes, &mut entries);
        collect(&self.vertex_shaders, &mut entries);
        collect(&self.pixel_shaders, &mut entries);
        collect(&self.textures, &mut entries);
        collect(&self.fonts, &mut entries);
        entries
    }

    /// Log entries still held, typically at shutdown; returns how many there were
    pub fn report_outstanding(&self) -> usize {
        let entries = self.outstanding();
        if self.config.warn_on_leaked_entries {
            for entry in &entries {
                log::warn!("{} '{}' still held by {} handle(s)", entry.kind, entry.guid, entry.refs);
            }
        }
        entries.len()
    }
}

fn collect<T>(cache: &ResourceCache<T>, out: &mut Vec<OutstandingEntry>) {
    out.extend(cache.guids().into_iter().filter_map(|guid| {
        let refs = cache.ref_count(&guid);
        (refs > 0).then(|| OutstandingEntry {
            kind: cache.kind(),
            guid,
            refs,
        })
    }));
}
