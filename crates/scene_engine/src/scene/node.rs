//! Scene graph node

use std::fmt;

use crate::foundation::collections::NodeKey;

use super::component::{Component, ComponentId, ComponentSlot, LifecycleState};
use super::transform::Transform;

/// Stable node identity
///
/// Unlike a [`NodeKey`] (an arena slot), an id is never reused and is the
/// handle components use for non-owning cross references. Clones get a
/// fresh id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub(crate) u64);

impl NodeId {
    /// Raw numeric value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// An entity in the scene graph
///
/// Owns exactly one [`Transform`], an ordered list of components and its
/// children (by key). The parent link is non-owning. Topology and pose are
/// changed through [`SceneGraph`](super::SceneGraph) so both sides of every
/// link and every descendant's dirty flags stay consistent.
#[derive(Debug)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) state: LifecycleState,
    pub(crate) transform: Transform,
    pub(crate) components: Vec<ComponentSlot>,
    pub(crate) parent: Option<NodeKey>,
    pub(crate) children: Vec<NodeKey>,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, transform: Transform) -> Self {
        Self {
            id,
            name,
            state: LifecycleState::Active,
            transform,
            components: Vec::new(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Stable identity
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Display name (not required to be unique)
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Rename the node
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Own lifecycle state, before clamping by ancestors
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Whether the node has been terminated
    pub fn is_terminated(&self) -> bool {
        self.state.is_terminated()
    }

    /// Local pose and cached world matrices
    pub fn transform(&self) -> &Transform {
        &self.transform
    }

    /// Parent key, `None` for the root and for detached nodes
    pub fn parent(&self) -> Option<NodeKey> {
        self.parent
    }

    /// Child keys in insertion order
    pub fn children(&self) -> &[NodeKey] {
        &self.children
    }

    /// Attached components in attach order
    pub fn components(&self) -> &[ComponentSlot] {
        &self.components
    }

    /// Mutable access to the attached components
    ///
    /// Slot identity, owner and state stay under the graph's control.
    pub fn components_mut(&mut self) -> &mut [ComponentSlot] {
        &mut self.components
    }

    /// Slot by id
    pub fn component_slot(&self, id: ComponentId) -> Option<&ComponentSlot> {
        self.components.iter().find(|slot| slot.id() == id)
    }

    /// First component of kind `C`
    pub fn component<C: Component>(&self) -> Option<&C> {
        self.components.iter().find_map(ComponentSlot::downcast_ref::<C>)
    }

    /// First component of kind `C`, mutably
    pub fn component_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.components.iter_mut().find_map(ComponentSlot::downcast_mut::<C>)
    }

    /// Mark this node and its components terminated; returns `true` on the first call
    pub(crate) fn terminate(&mut self) -> bool {
        if self.state.is_terminated() {
            return false;
        }
        self.state = LifecycleState::Terminated;
        for slot in &mut self.components {
            slot.set_state(LifecycleState::Terminated);
        }
        true
    }
}
