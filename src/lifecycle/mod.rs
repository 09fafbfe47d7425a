//! Lifecycle management for the agent's stacks

use crate::error::{CoreError, CoreResult};
use tracing::debug;

/// Trait for components that follow a lifecycle pattern
pub trait LifecycleNode: Send + Sync {
    /// Configure the node
    fn on_configure(&mut self) -> CoreResult<()>;

    /// Activate the node
    fn on_activate(&mut self) -> CoreResult<()>;

    /// Deactivate the node
    fn on_deactivate(&mut self) -> CoreResult<()>;

    /// Clean up the node
    fn on_cleanup(&mut self) -> CoreResult<()>;

    /// Current state of the node
    fn state(&self) -> State;
}

/// Base implementation for lifecycle nodes
#[derive(Debug, Clone)]
pub struct LifecycleNodeBase {
    pub name: String,
    state: State,
}

/// State of a lifecycle node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Unconfigured,
    Inactive,
    Active,
}

impl LifecycleNodeBase {
    /// Create a new lifecycle node base
    pub fn new(name: &str) -> Self {
        LifecycleNodeBase {
            name: name.to_string(),
            state: State::Unconfigured,
        }
    }

    /// Get the current state
    pub fn get_state(&self) -> State {
        self.state
    }

    /// Move from `from` to `to`, or refuse if the node is elsewhere
    pub fn transition(&mut self, from: State, to: State) -> CoreResult<()> {
        if self.state != from {
            return Err(CoreError::Lifecycle {
                component: self.name.clone(),
                reason: format!("expected {:?} but was {:?}", from, self.state),
            });
        }
        debug!(component = %self.name, ?from, ?to, "lifecycle transition");
        self.state = to;
        Ok(())
    }
}

/// Configure then activate
pub fn bring_up(node: &mut dyn LifecycleNode) -> CoreResult<()> {
    node.on_configure()?;
    node.on_activate()
}

/// Deactivate then clean up, skipping steps the node already went through
pub fn bring_down(node: &mut dyn LifecycleNode) -> CoreResult<()> {
    if node.state() == State::Active {
        node.on_deactivate()?;
    }
    if node.state() == State::Inactive {
        node.on_cleanup()?;
    }
    Ok(())
}
