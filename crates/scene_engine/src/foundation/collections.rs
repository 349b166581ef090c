//! Specialized collection types

use slotmap::SlotMap;

slotmap::new_key_type! {
    /// Stable arena key of a node inside a [`SceneGraph`](crate::scene::SceneGraph)
    ///
    /// Keys are generational: a key of a destroyed node never aliases a node
    /// created later in the same slot.
    pub struct NodeKey;
}

/// Arena storing values addressed by [`NodeKey`]
pub type NodeArena<T> = SlotMap<NodeKey, T>;
