//! Scene graph: arena-stored node tree with lazy transform propagation
//!
//! Following Game Engine Architecture Chapter 11.2.7 - Scene Graphs.
//!
//! ## Storage
//!
//! Nodes live in a generational arena addressed by [`NodeKey`]. Parent and
//! child relations are keys, so there is exactly one ownership path (arena →
//! node) and no reference cycles. A permanent root node anchors the scene;
//! nodes without a parent that are not the root are *detached*: alive, but
//! outside traversal and the frame update until attached.
//!
//! ## Transforms
//!
//! Pose writes dirty the node and its subtree; world matrices are pulled on
//! read, refreshing stale ancestors first. A dirty node always has dirty
//! descendants, which lets dirtying stop at any subtree that is already
//! stale.
//!
//! ## Termination
//!
//! Terminating a node is irreversible and cascades through its subtree and
//! all their components. Terminated nodes are skipped by traversal and
//! removed from the arena later by [`SceneGraph::purge_terminated`], so it is
//! safe to terminate from inside a traversal or update pass.

use std::collections::HashMap;

use crate::config::SceneConfig;
use crate::foundation::collections::{NodeArena, NodeKey};
use crate::foundation::math::{translation_of, Mat4, Point3, Pose, Vec3};

use super::command::SceneCommand;
use super::component::{Component, ComponentId, ComponentSlot, LifecycleState, UpdateContext};
use super::error::{SceneError, StructuralViolation};
use super::node::{Node, NodeId};
use super::transform::{DirtyFlags, Transform};

/// Visitor verdict for [`SceneGraph::visit`] and [`SceneGraph::visit_mut`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    /// Descend into this node's children
    Continue,
    /// Do not descend into this node's children
    SkipChildren,
    /// End the traversal
    Stop,
}

#[derive(Debug)]
enum TraversalAction {
    SetState(NodeKey, LifecycleState),
    SetLocalPose(NodeKey, Pose),
    SetComponentState(NodeKey, ComponentId, LifecycleState),
}

/// Mutations requested from inside [`SceneGraph::visit_mut`]
///
/// Applied after each visitor call returns, before the next node is visited,
/// so a node terminated here is already skipped by the same pass. Topology
/// never changes during a traversal.
#[derive(Debug, Default)]
pub struct Traversal {
    actions: Vec<TraversalAction>,
}

impl Traversal {
    /// Terminate a node and its subtree
    pub fn terminate(&mut self, node: NodeKey) {
        self.actions.push(TraversalAction::SetState(node, LifecycleState::Terminated));
    }

    /// Change a node's lifecycle state
    pub fn set_state(&mut self, node: NodeKey, state: LifecycleState) {
        self.actions.push(TraversalAction::SetState(node, state));
    }

    /// Overwrite a node's local pose
    pub fn set_local_pose(&mut self, node: NodeKey, pose: Pose) {
        self.actions.push(TraversalAction::SetLocalPose(node, pose));
    }

    /// Change a component's lifecycle state
    pub fn set_component_state(&mut self, node: NodeKey, component: ComponentId, state: LifecycleState) {
        self.actions
            .push(TraversalAction::SetComponentState(node, component, state));
    }
}

/// Summary of one [`SceneGraph::update`] call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateReport {
    /// Live nodes reached from the root
    pub nodes_visited: usize,
    /// Component `update` calls made
    pub components_updated: usize,
    /// Queued commands applied successfully
    pub commands_applied: usize,
    /// Queued commands rejected by the graph
    pub commands_failed: usize,
    /// Nodes removed from the arena
    pub nodes_purged: usize,
}

/// Arena-backed scene graph
#[derive(Debug)]
pub struct SceneGraph {
    nodes: NodeArena<Node>,
    ids: HashMap<NodeId, NodeKey>,
    root: NodeKey,
    pending_removal: Vec<NodeKey>,
    next_node_id: u64,
    next_component_id: u64,
    config: SceneConfig,
}

impl Default for SceneGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneGraph {
    /// Create a graph containing only the root node
    pub fn new() -> Self {
        Self::with_config(SceneConfig::default())
    }

    /// Create a graph with custom configuration
    pub fn with_config(config: SceneConfig) -> Self {
        let mut graph = Self {
            nodes: NodeArena::with_capacity_and_key(config.initial_node_capacity),
            ids: HashMap::with_capacity(config.initial_node_capacity),
            root: NodeKey::default(),
            pending_removal: Vec::new(),
            next_node_id: 0,
            next_component_id: 0,
            config,
        };
        graph.root = graph.insert_node("Root".to_string(), Transform::default());
        graph
    }

    /// Active configuration
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------------

    /// Permanent root node
    pub fn root(&self) -> NodeKey {
        self.root
    }

    /// Number of nodes in the arena, including detached and not yet purged ones
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Always `false`: the root exists for the graph's whole life
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Whether `key` names a node in the arena
    pub fn contains(&self, key: NodeKey) -> bool {
        self.nodes.contains_key(key)
    }

    /// Node by key
    pub fn node(&self, key: NodeKey) -> Option<&Node> {
        self.nodes.get(key)
    }

    /// Mutable node by key
    ///
    /// [`Node`] only exposes mutations that cannot break graph invariants.
    pub fn node_mut(&mut self, key: NodeKey) -> Option<&mut Node> {
        self.nodes.get_mut(key)
    }

    /// Parent of `key`
    pub fn parent(&self, key: NodeKey) -> Option<NodeKey> {
        self.nodes.get(key).and_then(|node| node.parent)
    }

    /// Children of `key` (empty when the key is unknown)
    pub fn children(&self, key: NodeKey) -> &[NodeKey] {
        self.nodes.get(key).map(|node| node.children.as_slice()).unwrap_or_default()
    }

    /// Resolve a stable id to its current key
    pub fn find_by_id(&self, id: NodeId) -> Option<NodeKey> {
        self.ids.get(&id).copied()
    }

    /// First live node named `name`: pre-order from the root, then detached nodes
    pub fn find_by_name(&self, name: &str) -> Option<NodeKey> {
        let mut found = None;
        self.walk(self.root, |key, node| {
            if node.name == name {
                found = Some(key);
                Visit::Stop
            } else {
                Visit::Continue
            }
        });

        found.or_else(|| {
            self.nodes
                .iter()
                .find(|(_, node)| node.name == name && !node.is_terminated())
                .map(|(key, _)| key)
        })
    }

    /// Whether `ancestor` is a strict ancestor of `node`
    pub fn is_ancestor(&self, ancestor: NodeKey, node: NodeKey) -> bool {
        let mut cursor = self.parent(node);
        while let Some(key) = cursor {
            if key == ancestor {
                return true;
            }
            cursor = self.parent(key);
        }
        false
    }

    /// Whether `key` is reachable from the root
    pub fn is_attached(&self, key: NodeKey) -> bool {
        key == self.root || self.is_ancestor(self.root, key)
    }

    fn get(&self, key: NodeKey) -> Result<&Node, SceneError> {
        self.nodes.get(key).ok_or(SceneError::NodeNotFound(key))
    }

    fn get_mut(&mut self, key: NodeKey) -> Result<&mut Node, SceneError> {
        self.nodes.get_mut(key).ok_or(SceneError::NodeNotFound(key))
    }

    // ---------------------------------------------------------------------
    // Creation and topology
    // ---------------------------------------------------------------------

    fn insert_node(&mut self, name: String, transform: Transform) -> NodeKey {
        let id = NodeId(self.next_node_id);
        self.next_node_id += 1;
        let key = self.nodes.insert(Node::new(id, name, transform));
        self.ids.insert(id, key);
        key
    }

    /// Create a detached node with an identity pose
    pub fn create_node(&mut self, name: impl Into<String>) -> NodeKey {
        self.create_node_with_pose(name, Pose::identity())
    }

    /// Create a detached node with the given local pose
    pub fn create_node_with_pose(&mut self, name: impl Into<String>, pose: Pose) -> NodeKey {
        let name = name.into();
        log::trace!("Creating node '{}'", name);
        self.insert_node(name, Transform::new(pose))
    }

    /// Create a node and attach it under `parent`
    pub fn spawn(&mut self, name: impl Into<String>, parent: NodeKey) -> Result<NodeKey, SceneError> {
        self.spawn_with_pose(name, parent, Pose::identity())
    }

    /// Create a node with a local pose and attach it under `parent`
    pub fn spawn_with_pose(
        &mut self,
        name: impl Into<String>,
        parent: NodeKey,
        pose: Pose,
    ) -> Result<NodeKey, SceneError> {
        if self.get(parent)?.is_terminated() {
            return Err(SceneError::Terminated(parent));
        }
        let key = self.create_node_with_pose(name, pose);
        self.link(parent, key);
        Ok(key)
    }

    /// Attach a detached node under `parent`
    ///
    /// Rejects self-parenting, cycles, already parented children, terminated
    /// nodes and the root. On error the graph is unchanged.
    pub fn add_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), SceneError> {
        self.validate_attach(parent, child)?;
        if let Some(existing) = self.get(child)?.parent {
            return Err(StructuralViolation::AlreadyParented { child, parent: existing }.into());
        }
        self.link(parent, child);
        Ok(())
    }

    /// Detach `child` from `parent`
    ///
    /// The child keeps its subtree and becomes parentless, so its world
    /// matrices are recomputed from its local pose alone.
    pub fn remove_child(&mut self, parent: NodeKey, child: NodeKey) -> Result<(), SceneError> {
        self.get(parent)?;
        if self.get(child)?.parent != Some(parent) {
            return Err(StructuralViolation::NotAChild { child, parent }.into());
        }
        self.unlink(child);
        Ok(())
    }

    /// Move `child` under `new_parent`, detaching it first if needed
    ///
    /// Validation happens before any mutation, so a rejected move leaves the
    /// node where it was.
    pub fn reparent(&mut self, child: NodeKey, new_parent: NodeKey) -> Result<(), SceneError> {
        self.validate_attach(new_parent, child)?;
        if self.get(child)?.parent == Some(new_parent) {
            return Ok(());
        }
        self.unlink(child);
        self.link(new_parent, child);
        Ok(())
    }

    /// Detach `child` from whatever parent it has
    pub fn detach(&mut self, child: NodeKey) -> Result<(), SceneError> {
        if child == self.root {
            return Err(StructuralViolation::RootNode.into());
        }
        if self.get(child)?.parent.is_some() {
            self.unlink(child);
        }
        Ok(())
    }

    fn validate_attach(&self, parent: NodeKey, child: NodeKey) -> Result<(), SceneError> {
        let parent_node = self.get(parent)?;
        let child_node = self.get(child)?;

        if child == self.root {
            return Err(StructuralViolation::RootNode.into());
        }
        if parent == child {
            return Err(StructuralViolation::SelfParenting(child).into());
        }
        if parent_node.is_terminated() {
            return Err(SceneError::Terminated(parent));
        }
        if child_node.is_terminated() {
            return Err(SceneError::Terminated(child));
        }
        if self.is_ancestor(child, parent) {
            return Err(StructuralViolation::WouldCreateCycle { child, parent }.into());
        }
        Ok(())
    }

    fn link(&mut self, parent: NodeKey, child: NodeKey) {
        if let Some(node) = self.nodes.get_mut(child) {
            node.parent = Some(parent);
        }
        if let Some(node) = self.nodes.get_mut(parent) {
            node.children.push(child);
        }
        self.mark_subtree_dirty(child);
        log::trace!("Attached {:?} under {:?}", child, parent);
    }

    fn unlink(&mut self, child: NodeKey) {
        let parent = self.nodes.get_mut(child).and_then(|node| node.parent.take());
        if let Some(parent_node) = parent.and_then(|key| self.nodes.get_mut(key)) {
            parent_node.children.retain(|key| *key != child);
        }
        self.mark_subtree_dirty(child);
        log::trace!("Detached {:?} from {:?}", child, parent);
    }

    /// Remove a node and its whole subtree from the arena immediately
    ///
    /// Dropping the nodes drops their components, which releases any
    /// resource handles they hold. Returns the number of nodes removed.
    pub fn destroy(&mut self, key: NodeKey) -> Result<usize, SceneError> {
        if key == self.root {
            return Err(StructuralViolation::RootNode.into());
        }
        self.get(key)?;
        Ok(self.remove_subtree(key))
    }

    fn remove_subtree(&mut self, key: NodeKey) -> usize {
        let parent = self.nodes.get_mut(key).and_then(|node| node.parent.take());
        if let Some(parent_node) = parent.and_then(|p| self.nodes.get_mut(p)) {
            parent_node.children.retain(|child| *child != key);
        }

        let mut removed = 0;
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.remove(current) {
                self.ids.remove(&node.id);
                stack.extend(node.children.iter().copied());
                removed += 1;
            }
        }
        log::trace!("Removed {} node(s) rooted at {:?}", removed, key);
        removed
    }

    /// Copy a node: same name, pose and live components, fresh identity, no links
    ///
    /// Components are cloned polymorphically; resource handles inside them
    /// acquire additional references.
    pub fn clone_node(&mut self, key: NodeKey) -> Result<NodeKey, SceneError> {
        let source = self.get(key)?;
        if source.is_terminated() {
            return Err(SceneError::Terminated(key));
        }
        let name = source.name.clone();
        let transform = source.transform.clone();
        let state = source.state;

        let copy = self.insert_node(name, transform);

        let mut next_id = self.next_component_id;
        let slots: Vec<ComponentSlot> = self.nodes[key]
            .components
            .iter()
            .filter(|slot| !slot.state().is_terminated())
            .map(|slot| {
                let id = ComponentId(next_id);
                next_id += 1;
                slot.clone_for(id, copy)
            })
            .collect();
        self.next_component_id = next_id;

        let node = &mut self.nodes[copy];
        node.components = slots;
        node.state = state;
        Ok(copy)
    }

    /// Deep-copy a node and its live descendants; the copy is detached
    pub fn clone_subtree(&mut self, key: NodeKey) -> Result<NodeKey, SceneError> {
        let copy = self.clone_node(key)?;

        let mut stack: Vec<(NodeKey, NodeKey)> = self.children(key).iter().rev().map(|child| (*child, copy)).collect();
        while let Some((source, new_parent)) = stack.pop() {
            if self.nodes.get(source).map_or(true, Node::is_terminated) {
                continue;
            }
            let child_copy = self.clone_node(source)?;
            self.link(new_parent, child_copy);
            stack.extend(self.children(source).iter().rev().map(|child| (*child, child_copy)));
        }
        Ok(copy)
    }

    // ---------------------------------------------------------------------
    // Transforms
    // ---------------------------------------------------------------------

    /// Local pose of `key`
    pub fn local_pose(&self, key: NodeKey) -> Result<Pose, SceneError> {
        Ok(*self.get(key)?.transform.pose())
    }

    /// Overwrite the local pose and dirty the node's subtree; no recomputation
    pub fn set_local_pose(&mut self, key: NodeKey, pose: Pose) -> Result<(), SceneError> {
        self.get_mut(key)?.transform.set_pose(pose);
        self.dirty_descendants(key);
        Ok(())
    }

    /// Overwrite the local matrix and dirty the node's subtree
    pub fn set_local_matrix(&mut self, key: NodeKey, matrix: Mat4) -> Result<(), SceneError> {
        self.get_mut(key)?.transform.set_matrix(matrix);
        self.dirty_descendants(key);
        Ok(())
    }

    fn mark_subtree_dirty(&self, key: NodeKey) {
        if let Some(node) = self.nodes.get(key) {
            node.transform.mark_dirty();
        }
        self.dirty_descendants(key);
    }

    /// Dirty every descendant of `key`, pruning subtrees that are already stale
    fn dirty_descendants(&self, key: NodeKey) {
        let mut stack: Vec<NodeKey> = self.children(key).to_vec();
        while let Some(current) = stack.pop() {
            let Some(node) = self.nodes.get(current) else {
                continue;
            };
            if node.transform.dirty_flags() == DirtyFlags::all() {
                continue;
            }
            node.transform.mark_dirty();
            stack.extend(node.children.iter().copied());
        }
    }

    /// Stale nodes from `key` upward, plus the first clean ancestor if any
    fn stale_chain(&self, key: NodeKey, flag: DirtyFlags) -> Result<(Vec<NodeKey>, Option<NodeKey>), SceneError> {
        let mut chain = Vec::new();
        let mut cursor = Some(key);
        while let Some(current) = cursor {
            let node = self.get(current)?;
            if !node.transform.is_dirty(flag) {
                return Ok((chain, Some(current)));
            }
            chain.push(current);
            cursor = node.parent;
        }
        Ok((chain, None))
    }

    /// Object-to-world matrix of `key`
    ///
    /// Recomputes stale ancestors top-down first; each transform is rebuilt
    /// at most once per dirtying.
    pub fn object_to_world(&self, key: NodeKey) -> Result<Mat4, SceneError> {
        let (chain, anchor) = self.stale_chain(key, DirtyFlags::OBJECT_TO_WORLD)?;
        let mut matrix = anchor.and_then(|clean| self.nodes[clean].transform.cached_object_to_world());

        for current in chain.iter().rev() {
            matrix = Some(self.nodes[*current].transform.refresh_object_to_world(matrix.as_ref()));
        }
        Ok(matrix.unwrap_or_else(Mat4::identity))
    }

    /// World-to-object matrix of `key`
    ///
    /// Fails with [`SceneError::DegenerateTransform`] when the local matrix of
    /// `key` or a stale ancestor is singular.
    pub fn world_to_object(&self, key: NodeKey) -> Result<Mat4, SceneError> {
        let (chain, anchor) = self.stale_chain(key, DirtyFlags::WORLD_TO_OBJECT)?;
        let mut matrix = anchor.and_then(|clean| self.nodes[clean].transform.cached_world_to_object());

        for current in chain.iter().rev() {
            matrix = Some(
                self.nodes[*current]
                    .transform
                    .refresh_world_to_object(*current, matrix.as_ref())?,
            );
        }
        Ok(matrix.unwrap_or_else(Mat4::identity))
    }

    /// World-space position of the node's origin
    pub fn world_position(&self, key: NodeKey) -> Result<Vec3, SceneError> {
        Ok(translation_of(&self.object_to_world(key)?))
    }

    /// Map a point from the node's object space into world space
    pub fn transform_point_to_world(&self, key: NodeKey, point: &Point3) -> Result<Point3, SceneError> {
        Ok(self.object_to_world(key)?.transform_point(point))
    }

    /// Refresh every stale object-to-world matrix reachable from the root,
    /// parents before children. Returns the number of live nodes walked.
    pub fn refresh_world_matrices(&self) -> usize {
        let mut walked = 0;
        let mut stack: Vec<(NodeKey, Option<Mat4>)> = vec![(self.root, None)];
        while let Some((key, parent)) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if node.is_terminated() {
                continue;
            }
            let matrix = node.transform.refresh_object_to_world(parent.as_ref());
            walked += 1;
            stack.extend(node.children.iter().rev().map(|child| (*child, Some(matrix))));
        }
        walked
    }

    // ---------------------------------------------------------------------
    // Traversal
    // ---------------------------------------------------------------------

    fn walk<F>(&self, start: NodeKey, mut visitor: F)
    where
        F: FnMut(NodeKey, &Node) -> Visit,
    {
        let mut stack = vec![start];
        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if node.is_terminated() {
                continue;
            }
            match visitor(key, node) {
                Visit::Stop => break,
                Visit::SkipChildren => {}
                Visit::Continue => stack.extend(node.children.iter().rev().copied()),
            }
        }
    }

    /// Depth-first pre-order read-only traversal from `start`
    ///
    /// Terminated nodes and their subtrees are skipped.
    pub fn visit<F>(&self, start: NodeKey, visitor: F) -> Result<(), SceneError>
    where
        F: FnMut(NodeKey, &Node) -> Visit,
    {
        self.get(start)?;
        self.walk(start, visitor);
        Ok(())
    }

    /// Depth-first pre-order mutable traversal from `start`
    ///
    /// The visitor gets the node and a [`Traversal`] for state and pose
    /// changes, which are applied between visits.
    pub fn visit_mut<F>(&mut self, start: NodeKey, mut visitor: F) -> Result<(), SceneError>
    where
        F: FnMut(NodeKey, &mut Node, &mut Traversal) -> Visit,
    {
        self.get(start)?;
        let mut traversal = Traversal::default();
        let mut stack = vec![start];

        while let Some(key) = stack.pop() {
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };
            if node.is_terminated() {
                continue;
            }
            let verdict = visitor(key, node, &mut traversal);
            if verdict == Visit::Continue {
                stack.extend(node.children.iter().rev().copied());
            }

            self.apply_traversal(&mut traversal);
            if verdict == Visit::Stop {
                break;
            }
        }
        Ok(())
    }

    fn apply_traversal(&mut self, traversal: &mut Traversal) {
        for action in traversal.actions.drain(..) {
            let result = match action {
                TraversalAction::SetState(node, state) => self.set_state(node, state),
                TraversalAction::SetLocalPose(node, pose) => self.set_local_pose(node, pose),
                TraversalAction::SetComponentState(node, component, state) => {
                    self.set_component_state(node, component, state)
                }
            };
            if let Err(e) = result {
                log::warn!("Traversal action rejected: {}", e);
            }
        }
    }

    // ---------------------------------------------------------------------
    // Lifecycle
    // ---------------------------------------------------------------------

    /// Change a node's lifecycle state
    ///
    /// Terminating is irreversible and cascades to every descendant and
    /// every component in the subtree; the subtree is queued for removal.
    /// Terminating an already terminated node is a no-op.
    pub fn set_state(&mut self, key: NodeKey, state: LifecycleState) -> Result<(), SceneError> {
        let node = self.get(key)?;
        if node.is_terminated() {
            return if state.is_terminated() {
                Ok(())
            } else {
                Err(SceneError::Terminated(key))
            };
        }

        if state.is_terminated() {
            if key == self.root {
                return Err(StructuralViolation::RootNode.into());
            }
            self.terminate_subtree(key);
        } else {
            self.get_mut(key)?.state = state;
        }
        Ok(())
    }

    /// Terminate a node and its subtree
    pub fn terminate(&mut self, key: NodeKey) -> Result<(), SceneError> {
        self.set_state(key, LifecycleState::Terminated)
    }

    fn terminate_subtree(&mut self, key: NodeKey) {
        let mut terminated = 0;
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(node) = self.nodes.get_mut(current) {
                if node.terminate() {
                    terminated += 1;
                }
                stack.extend(node.children.iter().copied());
            }
        }
        self.pending_removal.push(key);
        log::debug!("Terminated {} node(s) rooted at {:?}", terminated, key);
    }

    /// State of `key` clamped by all of its ancestors
    pub fn effective_state(&self, key: NodeKey) -> Result<LifecycleState, SceneError> {
        let mut state = self.get(key)?.state;
        let mut cursor = self.parent(key);
        while let Some(ancestor) = cursor {
            state = state.clamp_to(self.get(ancestor)?.state);
            cursor = self.parent(ancestor);
        }
        Ok(state)
    }

    /// Nodes terminated but not yet purged
    pub fn pending_removal(&self) -> usize {
        self.pending_removal.len()
    }

    /// Remove terminated subtrees and terminated components from the arena
    ///
    /// Returns the number of nodes removed.
    pub fn purge_terminated(&mut self) -> usize {
        let pending = std::mem::take(&mut self.pending_removal);
        let mut removed = 0;
        for key in pending {
            if matches!(self.nodes.get(key), Some(node) if node.is_terminated()) {
                removed += self.remove_subtree(key);
            }
        }

        for (_, node) in &mut self.nodes {
            node.components.retain(|slot| !slot.state().is_terminated());
        }

        if removed > 0 {
            log::debug!("Purged {} terminated node(s)", removed);
        }
        removed
    }

    // ---------------------------------------------------------------------
    // Components
    // ---------------------------------------------------------------------

    /// Attach a boxed component; the owner is fixed for the component's life
    pub fn attach_component(&mut self, key: NodeKey, component: Box<dyn Component>) -> Result<ComponentId, SceneError> {
        if self.get(key)?.is_terminated() {
            return Err(SceneError::Terminated(key));
        }
        let id = ComponentId(self.next_component_id);
        self.next_component_id += 1;

        log::trace!("Attaching {} '{}' to {:?}", id, component.kind(), key);
        let slot = ComponentSlot::new(id, key, component);
        self.get_mut(key)?.components.push(slot);
        Ok(id)
    }

    /// Attach a component by value
    pub fn add_component<C: Component>(&mut self, key: NodeKey, component: C) -> Result<ComponentId, SceneError> {
        self.attach_component(key, Box::new(component))
    }

    /// First component of kind `C` on `key`
    pub fn component<C: Component>(&self, key: NodeKey) -> Option<&C> {
        self.nodes.get(key).and_then(Node::component::<C>)
    }

    /// First component of kind `C` on `key`, mutably
    pub fn component_mut<C: Component>(&mut self, key: NodeKey) -> Option<&mut C> {
        self.nodes.get_mut(key).and_then(Node::component_mut::<C>)
    }

    /// Change a component's own state; terminated components stay terminated
    pub fn set_component_state(
        &mut self,
        key: NodeKey,
        component: ComponentId,
        state: LifecycleState,
    ) -> Result<(), SceneError> {
        let slot = self
            .get_mut(key)?
            .components
            .iter_mut()
            .find(|slot| slot.id() == component)
            .ok_or(SceneError::ComponentNotFound { node: key, component })?;

        if slot.set_state(state) {
            Ok(())
        } else {
            Err(SceneError::ComponentTerminated { node: key, component })
        }
    }

    /// Component state clamped by its node and the node's ancestors
    pub fn effective_component_state(&self, key: NodeKey, component: ComponentId) -> Result<LifecycleState, SceneError> {
        let slot = self
            .get(key)?
            .component_slot(component)
            .ok_or(SceneError::ComponentNotFound { node: key, component })?;
        Ok(slot.state().clamp_to(self.effective_state(key)?))
    }

    // ---------------------------------------------------------------------
    // Frame update
    // ---------------------------------------------------------------------

    /// Apply one deferred command
    pub fn apply(&mut self, command: SceneCommand) -> Result<(), SceneError> {
        match command {
            SceneCommand::SetLocalPose { node, pose } => self.set_local_pose(node, pose),
            SceneCommand::SetState { node, state } => self.set_state(node, state),
            SceneCommand::Reparent { node, parent } => self.reparent(node, parent),
            SceneCommand::Detach(node) => self.detach(node),
            SceneCommand::AttachComponent { node, component } => self.attach_component(node, component).map(|_| ()),
        }
    }

    /// Live nodes reachable from the root in pre-order, each with its effective state
    fn live_order(&self) -> Vec<(NodeKey, LifecycleState)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, LifecycleState::Active)];
        while let Some((key, ceiling)) = stack.pop() {
            let Some(node) = self.nodes.get(key) else {
                continue;
            };
            if node.is_terminated() {
                continue;
            }
            let effective = node.state.clamp_to(ceiling);
            order.push((key, effective));
            stack.extend(node.children.iter().rev().map(|child| (*child, effective)));
        }
        order
    }

    /// Run one frame of the scene
    ///
    /// 1. Refresh world matrices top-down (when configured)
    /// 2. Update every effectively active component of every live node
    /// 3. Apply the commands queued by components
    /// 4. Purge terminated nodes (when configured)
    pub fn update(&mut self, delta_time: f32) -> UpdateReport {
        let mut report = UpdateReport::default();

        if self.config.proactive_transform_refresh {
            self.refresh_world_matrices();
        }

        let order = self.live_order();
        report.nodes_visited = order.len();

        let mut commands = Vec::new();
        for (key, effective) in order {
            if effective != LifecycleState::Active {
                continue;
            }
            let Some(node) = self.nodes.get_mut(key) else {
                continue;
            };
            if node.components.is_empty() {
                continue;
            }
            let node_id = node.id;
            let mut components = std::mem::take(&mut node.components);

            match self.object_to_world(key) {
                Ok(object_to_world) => {
                    let mut ctx = UpdateContext::new(self, key, node_id, object_to_world, delta_time, &mut commands);
                    for slot in components.iter_mut().filter(|slot| slot.state() == LifecycleState::Active) {
                        slot.update(&mut ctx);
                        report.components_updated += 1;
                    }
                }
                Err(e) => log::warn!("Skipping component update for {:?}: {}", key, e),
            }

            if let Some(node) = self.nodes.get_mut(key) {
                node.components = components;
            }
        }

        for command in commands {
            let target = command.target();
            match self.apply(command) {
                Ok(()) => report.commands_applied += 1,
                Err(e) => {
                    log::warn!("Scene command for {:?} rejected: {}", target, e);
                    report.commands_failed += 1;
                }
            }
        }

        if self.config.purge_terminated_each_update {
            report.nodes_purged = self.purge_terminated();
        }

        report
    }

    /// Check that every parent link is mirrored by exactly one child entry
    #[cfg(test)]
    pub(crate) fn assert_links_consistent(&self) {
        for (key, node) in &self.nodes {
            if let Some(parent) = node.parent {
                let siblings = self.children(parent);
                assert_eq!(siblings.iter().filter(|k| **k == key).count(), 1, "{key:?} missing from parent");
            }
            for child in &node.children {
                assert_eq!(self.parent(*child), Some(key), "{child:?} has a stale parent link");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    fn translate(x: f32, y: f32, z: f32) -> Pose {
        Pose::from_translation(Vec3::new(x, y, z))
    }

    #[test]
    fn test_new_graph_has_root() {
        let graph = SceneGraph::new();
        let root = graph.node(graph.root()).expect("root");
        assert_eq!(root.name(), "Root");
        assert_eq!(graph.len(), 1);
        assert!(graph.is_attached(graph.root()));
    }

    #[test]
    fn test_add_child_links_both_sides() {
        let mut graph = SceneGraph::new();
        let child = graph.create_node("child");
        assert!(!graph.is_attached(child));

        graph.add_child(graph.root(), child).expect("attach");

        assert_eq!(graph.parent(child), Some(graph.root()));
        assert_eq!(graph.children(graph.root()), &[child]);
        assert!(graph.is_attached(child));
        graph.assert_links_consistent();
    }

    #[test]
    fn test_structural_violations_leave_graph_unchanged() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn("a", graph.root()).expect("spawn");
        let b = graph.spawn("b", a).expect("spawn");

        assert_eq!(
            graph.add_child(a, a),
            Err(StructuralViolation::SelfParenting(a).into())
        );
        assert_eq!(
            graph.add_child(graph.root(), b),
            Err(StructuralViolation::AlreadyParented { child: b, parent: a }.into())
        );
        assert_eq!(
            graph.reparent(a, b),
            Err(StructuralViolation::WouldCreateCycle { child: a, parent: b }.into())
        );
        assert_eq!(
            graph.reparent(graph.root(), a),
            Err(StructuralViolation::RootNode.into())
        );

        assert_eq!(graph.parent(a), Some(graph.root()));
        assert_eq!(graph.parent(b), Some(a));
        graph.assert_links_consistent();
    }

    #[test]
    fn test_remove_child_requires_matching_parent() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn("a", graph.root()).expect("spawn");
        let b = graph.spawn("b", a).expect("spawn");

        assert_eq!(
            graph.remove_child(graph.root(), b),
            Err(StructuralViolation::NotAChild { child: b, parent: graph.root() }.into())
        );

        graph.remove_child(a, b).expect("detach");
        assert_eq!(graph.parent(b), None);
        assert!(graph.children(a).is_empty());
        graph.assert_links_consistent();
    }

    #[test]
    fn test_removed_child_world_matrix_uses_identity_parent() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn_with_pose("a", graph.root(), translate(5.0, 0.0, 0.0)).expect("spawn");
        let b = graph.spawn_with_pose("b", a, translate(0.0, 1.0, 0.0)).expect("spawn");
        assert_relative_eq!(graph.world_position(b).unwrap(), Vec3::new(5.0, 1.0, 0.0), epsilon = EPSILON);

        graph.remove_child(a, b).expect("detach");

        assert_relative_eq!(graph.world_position(b).unwrap(), Vec3::new(0.0, 1.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_unknown_key_is_reported() {
        let mut graph = SceneGraph::new();
        let ghost = graph.create_node("ghost");
        graph.destroy(ghost).expect("destroy");

        assert_eq!(graph.object_to_world(ghost), Err(SceneError::NodeNotFound(ghost)));
        assert_eq!(graph.set_local_pose(ghost, Pose::identity()), Err(SceneError::NodeNotFound(ghost)));
        assert!(graph.find_by_name("ghost").is_none());
    }

    #[test]
    fn test_dirtying_prunes_already_stale_subtrees() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn("a", graph.root()).expect("spawn");
        let b = graph.spawn("b", a).expect("spawn");
        let c = graph.spawn("c", b).expect("spawn");

        graph.object_to_world(c).expect("read");
        graph.set_local_pose(a, translate(1.0, 0.0, 0.0)).expect("pose");
        assert!(graph.node(c).unwrap().transform().is_dirty(DirtyFlags::OBJECT_TO_WORLD));

        // a second write on a stale chain still leaves every level dirty
        graph.set_local_pose(b, translate(0.0, 1.0, 0.0)).expect("pose");
        for key in [a, b, c] {
            assert_eq!(graph.node(key).unwrap().transform().dirty_flags(), DirtyFlags::all());
        }
        assert_relative_eq!(graph.world_position(c).unwrap(), Vec3::new(1.0, 1.0, 0.0), epsilon = EPSILON);
    }

    #[test]
    fn test_world_to_object_degenerate_scale() {
        let mut graph = SceneGraph::new();
        let flat = graph
            .spawn_with_pose("flat", graph.root(), Pose::identity().with_scale(Vec3::new(1.0, 0.0, 1.0)))
            .expect("spawn");
        let child = graph.spawn("child", flat).expect("spawn");

        assert!(graph.object_to_world(child).is_ok());
        assert!(matches!(
            graph.world_to_object(child),
            Err(SceneError::DegenerateTransform(e)) if e.node == flat
        ));
    }

    #[test]
    fn test_world_to_object_small_uniform_scale() {
        let mut graph = SceneGraph::new();
        let millimetres = graph
            .spawn_with_pose("millimetres", graph.root(), Pose::identity().with_uniform_scale(0.001))
            .expect("spawn");
        let part = graph
            .spawn_with_pose("part", millimetres, translate(1000.0, 0.0, 0.0))
            .expect("spawn");

        assert_relative_eq!(graph.world_position(part).unwrap(), Vec3::new(1.0, 0.0, 0.0), epsilon = EPSILON);

        let world_to_object = graph.world_to_object(part).expect("small scale is invertible");
        let origin = world_to_object.transform_point(&Point3::new(1.0, 0.0, 0.0));
        assert_relative_eq!(origin, Point3::origin(), epsilon = 1e-3);
        assert_relative_eq!(
            world_to_object * graph.object_to_world(part).unwrap(),
            Mat4::identity(),
            epsilon = 1e-4
        );
    }

    #[test]
    fn test_visit_stops_early_and_skips_children() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn("a", graph.root()).expect("spawn");
        let _a1 = graph.spawn("a1", a).expect("spawn");
        let b = graph.spawn("b", graph.root()).expect("spawn");
        let _b1 = graph.spawn("b1", b).expect("spawn");

        let mut seen = Vec::new();
        graph
            .visit(graph.root(), |_, node| {
                seen.push(node.name().to_string());
                if node.name() == "a" {
                    Visit::SkipChildren
                } else if node.name() == "b" {
                    Visit::Stop
                } else {
                    Visit::Continue
                }
            })
            .expect("visit");

        assert_eq!(seen, vec!["Root", "a", "b"]);
    }

    #[test]
    fn test_visit_mut_termination_is_applied_before_next_visit() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn("a", graph.root()).expect("spawn");
        let doomed = graph.spawn("doomed", graph.root()).expect("spawn");
        let _doomed_child = graph.spawn("doomed_child", doomed).expect("spawn");

        let mut seen = Vec::new();
        graph
            .visit_mut(graph.root(), |key, node, traversal| {
                seen.push(node.name().to_string());
                if key == a {
                    traversal.terminate(doomed);
                    node.set_name("a-renamed");
                }
                Visit::Continue
            })
            .expect("visit");

        assert_eq!(seen, vec!["Root", "a"]);
        assert_eq!(graph.node(a).unwrap().name(), "a-renamed");
        assert!(graph.node(doomed).unwrap().is_terminated());
        // structure untouched until purge
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.purge_terminated(), 2);
        assert_eq!(graph.len(), 2);
        graph.assert_links_consistent();
    }

    #[test]
    fn test_termination_is_irreversible() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn("a", graph.root()).expect("spawn");

        graph.terminate(a).expect("terminate");
        graph.terminate(a).expect("idempotent");

        assert_eq!(graph.set_state(a, LifecycleState::Active), Err(SceneError::Terminated(a)));
        assert_eq!(graph.terminate(graph.root()), Err(StructuralViolation::RootNode.into()));
        assert_eq!(graph.spawn("late", a), Err(SceneError::Terminated(a)));
    }

    #[test]
    fn test_effective_state_clamps_through_ancestors() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn("a", graph.root()).expect("spawn");
        let b = graph.spawn("b", a).expect("spawn");

        graph.set_state(a, LifecycleState::Passive).expect("passive");

        assert_eq!(graph.node(b).unwrap().state(), LifecycleState::Active);
        assert_eq!(graph.effective_state(b), Ok(LifecycleState::Passive));

        graph.set_state(a, LifecycleState::Active).expect("active");
        assert_eq!(graph.effective_state(b), Ok(LifecycleState::Active));
    }

    #[test]
    fn test_find_by_name_and_id() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn("a", graph.root()).expect("spawn");
        let detached = graph.create_node("loose");
        let id = graph.node(a).unwrap().id();

        assert_eq!(graph.find_by_name("a"), Some(a));
        assert_eq!(graph.find_by_name("loose"), Some(detached));
        assert_eq!(graph.find_by_id(id), Some(a));

        graph.destroy(a).expect("destroy");
        assert_eq!(graph.find_by_id(id), None);
    }

    #[test]
    fn test_destroy_removes_subtree() {
        let mut graph = SceneGraph::new();
        let a = graph.spawn("a", graph.root()).expect("spawn");
        let b = graph.spawn("b", a).expect("spawn");
        let _c = graph.spawn("c", b).expect("spawn");

        assert_eq!(graph.destroy(a), Ok(3));
        assert_eq!(graph.len(), 1);
        assert!(graph.children(graph.root()).is_empty());
        assert_eq!(graph.destroy(graph.root()), Err(StructuralViolation::RootNode.into()));
    }
}
