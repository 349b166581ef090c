//! Scene graph errors

use thiserror::Error;

use crate::foundation::collections::NodeKey;

pub use super::transform::DegenerateTransformError;

/// Topology changes the graph refuses
///
/// A rejected operation leaves the graph unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StructuralViolation {
    /// A node cannot be its own parent
    #[error("node {0:?} cannot be attached to itself")]
    SelfParenting(NodeKey),

    /// The new parent lies inside the child's subtree
    #[error("attaching {child:?} under {parent:?} would create a cycle")]
    WouldCreateCycle {
        /// Node being attached
        child: NodeKey,
        /// Requested parent, a descendant of `child`
        parent: NodeKey,
    },

    /// The child must be detached before it can be attached elsewhere
    #[error("node {child:?} is already a child of {parent:?}")]
    AlreadyParented {
        /// Node being attached
        child: NodeKey,
        /// Its current parent
        parent: NodeKey,
    },

    /// `remove_child` named a node that is not a child of `parent`
    #[error("node {child:?} is not a child of {parent:?}")]
    NotAChild {
        /// Node being removed
        child: NodeKey,
        /// Claimed parent
        parent: NodeKey,
    },

    /// The scene root cannot be moved, detached, terminated or destroyed
    #[error("operation not permitted on the scene root")]
    RootNode,
}

/// Scene graph errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SceneError {
    /// Key does not name a live node
    #[error("node not found: {0:?}")]
    NodeNotFound(NodeKey),

    /// Component id not found on the node
    #[error("component {component} not found on node {node:?}")]
    ComponentNotFound {
        /// Node searched
        node: NodeKey,
        /// Missing component id
        component: super::ComponentId,
    },

    /// Component is terminated; termination is irreversible
    #[error("component {component} on node {node:?} is terminated")]
    ComponentTerminated {
        /// Owning node
        node: NodeKey,
        /// Terminated component id
        component: super::ComponentId,
    },

    /// Node is terminated; termination is irreversible
    #[error("node {0:?} is terminated")]
    Terminated(NodeKey),

    /// Rejected topology change
    #[error("structural violation: {0}")]
    Structural(#[from] StructuralViolation),

    /// Singular local matrix met while computing a world-to-object matrix
    #[error(transparent)]
    DegenerateTransform(#[from] DegenerateTransformError),
}
