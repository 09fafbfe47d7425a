//! Control stack: the kinematic model and command dispatch
pub mod kinematics;
pub mod trajectory;

use self::kinematics::KinematicModel;
use crate::config::AgentConfig;
use crate::error::CoreResult;
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::navigation::command::Command;
use crate::world::WorldView;
use std::sync::Arc;
use tracing::{debug, info};

/// Counters kept by the control stack
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    pub commands: u64,
    pub urgent: u64,
    /// Inverse solves that were clamped into range
    pub clamped: u64,
}

/// Control stack for the agent
pub struct ControlStack {
    base: LifecycleNodeBase,
    model: KinematicModel,
    stats: DispatchStats,
}

impl ControlStack {
    /// Create a new control stack
    pub fn new(config: Arc<AgentConfig>) -> Self {
        ControlStack {
            base: LifecycleNodeBase::new("control_stack"),
            model: KinematicModel::new(config.physics.clone()),
            stats: DispatchStats::default(),
        }
    }

    pub fn model(&self) -> &KinematicModel {
        &self.model
    }

    pub fn stats(&self) -> DispatchStats {
        self.stats
    }

    pub fn record_clamps(&mut self, clamps: usize) {
        self.stats.clamped += clamps as u64;
    }

    /// Send a command: its effects land on the agent's body and its server
    /// strings are returned
    pub fn dispatch(&mut self, world: &mut WorldView, command: &Command) -> Vec<String> {
        command.effects.apply(&mut world.body);
        self.stats.commands += 1;
        if command.urgent {
            self.stats.urgent += 1;
        }
        let wire = command.to_wire();
        debug!(tick = command.tick, commands = ?wire, "dispatch");
        wire
    }
}

impl LifecycleNode for ControlStack {
    fn on_configure(&mut self) -> CoreResult<()> {
        info!("Configuring control stack");
        self.base.transition(State::Unconfigured, State::Inactive)
    }

    fn on_activate(&mut self) -> CoreResult<()> {
        info!("Activating control stack");
        self.base.transition(State::Inactive, State::Active)
    }

    fn on_deactivate(&mut self) -> CoreResult<()> {
        info!("Deactivating control stack");
        self.base.transition(State::Active, State::Inactive)
    }

    fn on_cleanup(&mut self) -> CoreResult<()> {
        info!("Cleaning up control stack");
        self.stats = DispatchStats::default();
        self.base.transition(State::Inactive, State::Unconfigured)
    }

    fn state(&self) -> State {
        self.base.get_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Coordinate;
    use crate::navigation::command::{CommandBuilder, PredictedState};
    use crate::perception::sensors::ViewWidth;

    #[test]
    fn dispatch_applies_predicted_effects() {
        let mut control = ControlStack::new(Arc::new(AgentConfig::default()));
        let mut world = WorldView::new();
        let start = PredictedState::from_body(Coordinate::ORIGIN, 0.0, &world.body);

        let mut builder = CommandBuilder::new(control.model(), 0, start);
        builder.turn(45.0);
        builder.set_view(ViewWidth::Narrow);
        let commands = builder.finish();

        let wire = control.dispatch(&mut world, &commands[0]);
        assert_eq!(wire, vec!["(turn -45.00)".to_string(), "(change_view narrow high)".to_string()]);
        assert_eq!(world.body.pending_turn, 45.0);
        assert_eq!(world.body.view_width, ViewWidth::Narrow);
        assert_eq!(control.stats().commands, 1);
    }
}
