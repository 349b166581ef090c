//! Script component
//!
//! Game-specific per-frame behaviour as a closure. Scripts see the graph
//! read-only through the [`UpdateContext`] and change it by queueing
//! [`SceneCommand`]s, which the graph applies after the update pass.

use std::fmt;
use std::sync::Arc;

use crate::foundation::math::{Quat, Unit, Vec3};
use crate::scene::command::SceneCommand;
use crate::scene::component::{Component, LifecycleState, UpdateContext};

/// Per-instance state a script closure can read and modify
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScriptState {
    /// Seconds this instance has been updated for
    pub elapsed: f32,
    /// Number of updates run
    pub ticks: u64,
}

type Behaviour = dyn Fn(&mut ScriptState, &mut UpdateContext<'_>) + Send + Sync;

/// Closure-driven behaviour
///
/// Clones share the closure but get their own [`ScriptState`] copy.
#[derive(Clone)]
pub struct ScriptComponent {
    name: String,
    behaviour: Arc<Behaviour>,
    state: ScriptState,
}

impl ScriptComponent {
    /// Script running `behaviour` every frame
    pub fn new<F>(name: impl Into<String>, behaviour: F) -> Self
    where
        F: Fn(&mut ScriptState, &mut UpdateContext<'_>) + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            behaviour: Arc::new(behaviour),
            state: ScriptState::default(),
        }
    }

    /// Rotate the owning node about a local `axis` at `radians_per_second`
    pub fn spin(axis: Vec3, radians_per_second: f32) -> Self {
        let axis = Unit::new_normalize(axis);
        Self::new("spin", move |_, ctx| {
            let Ok(mut pose) = ctx.graph().local_pose(ctx.node()) else {
                return;
            };
            let step = Quat::from_axis_angle(&axis, radians_per_second * ctx.delta_time());
            pose.rotation = pose.rotation * step;
            let node = ctx.node();
            ctx.push(SceneCommand::SetLocalPose { node, pose });
        })
    }

    /// Move the owning node at a constant local-space `velocity`
    pub fn drift(velocity: Vec3) -> Self {
        Self::new("drift", move |_, ctx| {
            let Ok(mut pose) = ctx.graph().local_pose(ctx.node()) else {
                return;
            };
            pose.translation += velocity * ctx.delta_time();
            let node = ctx.node();
            ctx.push(SceneCommand::SetLocalPose { node, pose });
        })
    }

    /// Terminate the owning node once it has lived `seconds`
    pub fn lifetime(seconds: f32) -> Self {
        Self::new("lifetime", move |state, ctx| {
            if state.elapsed >= seconds {
                let node = ctx.node();
                ctx.push(SceneCommand::SetState {
                    node,
                    state: LifecycleState::Terminated,
                });
            }
        })
    }

    /// Script name, for diagnostics
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Per-instance state
    pub fn state(&self) -> &ScriptState {
        &self.state
    }
}

impl fmt::Debug for ScriptComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScriptComponent")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Component for ScriptComponent {
    fn kind(&self) -> &'static str {
        "script"
    }

    fn update(&mut self, ctx: &mut UpdateContext<'_>) {
        (self.behaviour)(&mut self.state, ctx);
        self.state.elapsed += ctx.delta_time();
        self.state.ticks += 1;
    }
}
