//! Planning pass types shared by the motion planners

use super::command::{Action, Command, CommandBuilder, PredictedState};
use crate::common::types::{Degrees, Tick};
use crate::common::Coordinate;
use crate::config::PlannerParams;
use crate::control::kinematics::KinematicModel;
use crate::error::CoreResult;
use std::time::Instant;

/// Where a single planning pass stands, judged by what it sends this tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PassPhase {
    #[default]
    Idle,
    Orienting,
    Locomoting,
    Finalizing,
}

impl PassPhase {
    pub fn of(command: Option<&Command>) -> Self {
        match command.and_then(|command| command.locomotion) {
            None => PassPhase::Idle,
            Some(Action::Turn { .. }) => PassPhase::Orienting,
            Some(Action::Dash { .. }) => PassPhase::Locomoting,
            Some(Action::Kick { .. }) | Some(Action::Catch { .. }) => PassPhase::Finalizing,
        }
    }
}

/// What to do once the ball is within reach
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Terminal {
    /// Kick so the ball reaches `target` (planning frame) at `arrival_speed`
    Kick { target: Coordinate, arrival_speed: f64 },
    Catch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanKind {
    GoTo,
    Intercept,
    Orient,
}

/// The commands of one planning pass. Replaced, never edited.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub kind: PlanKind,
    pub commands: Vec<Command>,
    /// Where the plan ends, in the planning frame
    pub target: Option<Coordinate>,
    /// Spare ticks beyond what the commands need
    pub slack: Option<Tick>,
    /// Tick of the terminal action
    pub deadline: Option<Tick>,
    /// Body turn the plan starts with
    pub required_turn: Degrees,
    /// Inverse solves clamped while building
    pub clamps: usize,
}

impl Plan {
    pub fn phase(&self) -> PassPhase {
        PassPhase::of(self.commands.first())
    }

    pub fn first(&self) -> Option<&Command> {
        self.commands.first()
    }

    pub fn is_urgent(&self) -> bool {
        self.commands.first().is_some_and(|command| command.urgent)
    }

    /// Predicted state after the last command
    pub fn final_state(&self) -> Option<&PredictedState> {
        self.commands.last().map(|command| &command.predicted)
    }
}

/// Inputs shared by every planner in one pass
#[derive(Debug, Clone)]
pub struct PlanContext<'a> {
    pub model: &'a KinematicModel,
    pub params: &'a PlannerParams,
    pub now: Tick,
    pub start: PredictedState,
    pub max_dash_power: f64,
    /// Wall-clock limit for the pass
    pub deadline: Instant,
}

impl<'a> PlanContext<'a> {
    pub fn builder(&self) -> CommandBuilder<'a> {
        CommandBuilder::new(self.model, self.now, self.start).with_max_dash_power(self.max_dash_power)
    }

    pub fn out_of_time(&self) -> bool {
        Instant::now() >= self.deadline
    }
}

/// Trait for motion planning procedures
pub trait MotionPlanner {
    fn name(&self) -> &str;

    /// `Ok(None)` when there is nothing worth sending
    fn plan(&self, ctx: &PlanContext<'_>) -> CoreResult<Option<Plan>>;
}

/// Scan turn used when the agent does not know where it is
#[derive(Debug, Clone)]
pub struct OrientPlanner;

impl MotionPlanner for OrientPlanner {
    fn name(&self) -> &str {
        "orient"
    }

    fn plan(&self, ctx: &PlanContext<'_>) -> CoreResult<Option<Plan>> {
        let mut builder = ctx.builder();
        let turned = builder.turn(ctx.params.orient_turn);
        let clamps = builder.clamps();
        Ok(Some(Plan {
            kind: PlanKind::Orient,
            commands: builder.finish(),
            target: None,
            slack: None,
            deadline: None,
            required_turn: turned,
            clamps,
        }))
    }
}
