//! Deferred scene mutations
//!
//! Components cannot touch topology while the update pass walks the graph,
//! so they queue [`SceneCommand`]s instead. The graph applies the queue in
//! order once the pass has finished.

use crate::foundation::collections::NodeKey;
use crate::foundation::math::Pose;

use super::component::{Component, LifecycleState};

/// A mutation queued during an update pass
#[derive(Debug)]
pub enum SceneCommand {
    /// Overwrite a node's local pose
    SetLocalPose {
        /// Target node
        node: NodeKey,
        /// New local pose
        pose: Pose,
    },
    /// Change a node's lifecycle state (termination cascades)
    SetState {
        /// Target node
        node: NodeKey,
        /// New state
        state: LifecycleState,
    },
    /// Move a node under a new parent
    Reparent {
        /// Node to move
        node: NodeKey,
        /// New parent
        parent: NodeKey,
    },
    /// Detach a node from its parent, leaving it parentless
    Detach(NodeKey),
    /// Attach a new component to a node
    AttachComponent {
        /// Target node
        node: NodeKey,
        /// Component to attach
        component: Box<dyn Component>,
    },
}

impl SceneCommand {
    /// Node the command applies to
    pub fn target(&self) -> NodeKey {
        match self {
            Self::SetLocalPose { node, .. }
            | Self::SetState { node, .. }
            | Self::Reparent { node, .. }
            | Self::AttachComponent { node, .. } => *node,
            Self::Detach(node) => *node,
        }
    }
}
