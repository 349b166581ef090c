//! Component capability surface
//!
//! Concrete behaviours (cameras, lights, models, sprites, scripts) implement
//! [`Component`]. The graph wraps each one in a [`ComponentSlot`] that carries
//! the identity, lifecycle state and owning node shared by every kind.
//!
//! There is no inheritance between kinds: the surface is `update`,
//! `on_attach` and polymorphic cloning, plus `Any` access for downcasting.

use std::any::Any;
use std::fmt;

use crate::foundation::collections::NodeKey;
use crate::foundation::math::Mat4;

use super::command::SceneCommand;
use super::graph::SceneGraph;
use super::node::NodeId;

/// Lifecycle state shared by nodes and components
///
/// Ordered `Terminated < Passive < Active`; an ancestor can only clamp a
/// descendant's effective state downward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum LifecycleState {
    /// Irreversibly finished, pending removal
    Terminated,
    /// Alive but not updated
    Passive,
    /// Alive and updated every frame
    #[default]
    Active,
}

impl LifecycleState {
    /// Clamp this state to at most `ceiling`
    pub fn clamp_to(self, ceiling: Self) -> Self {
        self.min(ceiling)
    }

    /// Whether this is [`LifecycleState::Terminated`]
    pub fn is_terminated(self) -> bool {
        self == Self::Terminated
    }
}

/// Unique component identifier within one scene graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentId(pub(crate) u64);

impl ComponentId {
    /// Raw numeric value
    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "component#{}", self.0)
    }
}

/// Per-call context handed to [`Component::update`]
///
/// Gives read access to the whole graph and a queue for deferred mutations.
/// The components of the node being updated are checked out while the call
/// runs, so they are not visible through [`UpdateContext::graph`].
pub struct UpdateContext<'a> {
    graph: &'a SceneGraph,
    node: NodeKey,
    node_id: NodeId,
    object_to_world: Mat4,
    delta_time: f32,
    commands: &'a mut Vec<SceneCommand>,
}

impl<'a> UpdateContext<'a> {
    pub(crate) fn new(
        graph: &'a SceneGraph,
        node: NodeKey,
        node_id: NodeId,
        object_to_world: Mat4,
        delta_time: f32,
        commands: &'a mut Vec<SceneCommand>,
    ) -> Self {
        Self {
            graph,
            node,
            node_id,
            object_to_world,
            delta_time,
            commands,
        }
    }

    /// Read-only view of the scene
    pub fn graph(&self) -> &SceneGraph {
        self.graph
    }

    /// Key of the node owning the component being updated
    pub fn node(&self) -> NodeKey {
        self.node
    }

    /// Identity of the owning node
    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Current object-to-world matrix of the owning node
    pub fn object_to_world(&self) -> &Mat4 {
        &self.object_to_world
    }

    /// Seconds since the previous update
    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    /// Queue a mutation applied after the update pass
    pub fn push(&mut self, command: SceneCommand) {
        self.commands.push(command);
    }
}

/// Polymorphic cloning and downcasting, implemented for every `Component + Clone`
pub trait ComponentObject {
    /// Deep-copy into a new box
    fn clone_box(&self) -> Box<dyn Component>;
    /// Upcast for downcasting
    fn as_any(&self) -> &dyn Any;
    /// Mutable upcast for downcasting
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Component + Clone> ComponentObject for T {
    fn clone_box(&self) -> Box<dyn Component> {
        Box::new(self.clone())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Capability surface every component kind implements
pub trait Component: ComponentObject + fmt::Debug + 'static {
    /// Stable kind name, also the registry key
    fn kind(&self) -> &'static str;

    /// Called once when attached to `owner`
    fn on_attach(&mut self, _owner: NodeKey) {}

    /// Called once per frame while the component is effectively active
    fn update(&mut self, _ctx: &mut UpdateContext<'_>) {}
}

impl Clone for Box<dyn Component> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// A component attached to a node: identity and state plus the behaviour
#[derive(Debug)]
pub struct ComponentSlot {
    id: ComponentId,
    owner: NodeKey,
    state: LifecycleState,
    component: Box<dyn Component>,
}

impl ComponentSlot {
    pub(crate) fn new(id: ComponentId, owner: NodeKey, mut component: Box<dyn Component>) -> Self {
        component.on_attach(owner);
        Self {
            id,
            owner,
            state: LifecycleState::Active,
            component,
        }
    }

    /// Copy for a cloned node: new identity, new owner, same state
    pub(crate) fn clone_for(&self, id: ComponentId, owner: NodeKey) -> Self {
        let mut slot = Self::new(id, owner, self.component.clone_box());
        slot.state = self.state;
        slot
    }

    /// Component identity
    pub fn id(&self) -> ComponentId {
        self.id
    }

    /// Owning node, fixed at attach time
    pub fn owner(&self) -> NodeKey {
        self.owner
    }

    /// The component's own state, before clamping by its node
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Kind name of the wrapped component
    pub fn kind(&self) -> &'static str {
        self.component.kind()
    }

    /// Wrapped behaviour
    pub fn component(&self) -> &dyn Component {
        self.component.as_ref()
    }

    /// Mutable wrapped behaviour
    pub fn component_mut(&mut self) -> &mut dyn Component {
        self.component.as_mut()
    }

    /// Downcast to a concrete kind
    pub fn downcast_ref<C: Component>(&self) -> Option<&C> {
        self.component.as_any().downcast_ref::<C>()
    }

    /// Mutable downcast to a concrete kind
    pub fn downcast_mut<C: Component>(&mut self) -> Option<&mut C> {
        self.component.as_any_mut().downcast_mut::<C>()
    }

    /// Set state; returns `false` when already terminated and `state` would revive it
    pub(crate) fn set_state(&mut self, state: LifecycleState) -> bool {
        if self.state.is_terminated() && !state.is_terminated() {
            return false;
        }
        self.state = state;
        true
    }

    pub(crate) fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        self.component.update(ctx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Default)]
    struct Counter {
        attached_to: Option<NodeKey>,
        ticks: u32,
    }

    impl Component for Counter {
        fn kind(&self) -> &'static str {
            "counter"
        }

        fn on_attach(&mut self, owner: NodeKey) {
            self.attached_to = Some(owner);
        }
    }

    #[test]
    fn test_state_ordering_clamps_downward() {
        use LifecycleState::*;
        assert_eq!(Active.clamp_to(Passive), Passive);
        assert_eq!(Passive.clamp_to(Active), Passive);
        assert_eq!(Active.clamp_to(Terminated), Terminated);
        assert_eq!(Terminated.clamp_to(Active), Terminated);
    }

    #[test]
    fn test_slot_runs_on_attach_and_downcasts() {
        let owner = NodeKey::default();
        let slot = ComponentSlot::new(ComponentId(7), owner, Box::new(Counter::default()));

        assert_eq!(slot.kind(), "counter");
        assert_eq!(slot.owner(), owner);
        let counter = slot.downcast_ref::<Counter>().expect("counter");
        assert_eq!(counter.attached_to, Some(owner));
        assert_eq!(counter.ticks, 0);
    }

    #[test]
    fn test_terminated_slot_cannot_be_revived() {
        let mut slot = ComponentSlot::new(ComponentId(1), NodeKey::default(), Box::new(Counter::default()));

        assert!(slot.set_state(LifecycleState::Passive));
        assert!(slot.set_state(LifecycleState::Terminated));
        assert!(!slot.set_state(LifecycleState::Active));
        assert_eq!(slot.state(), LifecycleState::Terminated);
    }

    #[test]
    fn test_clone_for_keeps_state_and_reassigns_identity() {
        let mut slot = ComponentSlot::new(ComponentId(1), NodeKey::default(), Box::new(Counter::default()));
        slot.set_state(LifecycleState::Passive);

        let copy = slot.clone_for(ComponentId(2), NodeKey::default());

        assert_eq!(copy.id(), ComponentId(2));
        assert_eq!(copy.state(), LifecycleState::Passive);
        assert!(copy.downcast_ref::<Counter>().is_some());
    }
}
