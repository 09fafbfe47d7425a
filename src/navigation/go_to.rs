//! Move the agent to a point and stop there

use super::command::CommandBuilder;
use super::planner::{MotionPlanner, Plan, PlanContext, PlanKind};
use crate::common::angle::angle_diff;
use crate::common::types::{Degrees, Tick};
use crate::common::Coordinate;
use crate::config::PlannerParams;
use crate::error::CoreResult;

/// Below this speed the agent counts as standing still
const STILL_SPEED: f64 = 0.01;

/// Heading error accepted when facing a point `distance` away. Grows as the
/// point gets closer so a nearby target never causes endless turning.
pub fn facing_tolerance(lateral_deviation: f64, distance: f64) -> Degrees {
    lateral_deviation.atan2(distance.max(0.0)).to_degrees()
}

/// Outcome of steering towards a point
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Approach {
    /// Ticks spent
    pub used: Tick,
    /// Turn needed before the first dash
    pub initial_turn: Degrees,
    pub arrived: bool,
}

/// Append turn, dash and brake ticks that bring the agent to `target`.
/// Stops after `budget` ticks of the builder have been used.
pub fn steer_to(
    builder: &mut CommandBuilder<'_>,
    target: Coordinate,
    params: &PlannerParams,
    budget: Tick,
) -> Approach {
    let start = builder.len();
    let max_speed = builder.model().physics().player_max_speed;
    let mut initial_turn = None;
    let mut arrived = false;

    while builder.len() < budget {
        let state = *builder.state();
        let offset = target - state.position;
        let distance = offset.magnitude();

        if distance <= params.arrival_tolerance {
            if state.speed() > STILL_SPEED {
                builder.brake();
                continue;
            }
            arrived = true;
            break;
        }

        let needed = angle_diff(state.heading, offset.direction());
        if initial_turn.is_none() {
            initial_turn = Some(needed);
        }

        if needed.abs() > facing_tolerance(params.lateral_deviation, distance) {
            if builder.model().max_turn(state.speed()) + 1e-9 < needed.abs() {
                builder.brake();
            } else {
                builder.turn(needed);
            }
            continue;
        }

        builder.dash_to_speed(distance.min(max_speed));
    }

    Approach {
        used: builder.len() - start,
        initial_turn: initial_turn.unwrap_or(0.0),
        arrived,
    }
}

/// Go to a point in the planning frame
#[derive(Debug, Clone)]
pub struct GoToPlanner {
    pub target: Coordinate,
}

impl GoToPlanner {
    pub fn new(target: Coordinate) -> Self {
        GoToPlanner { target }
    }
}

impl MotionPlanner for GoToPlanner {
    fn name(&self) -> &str {
        "go_to"
    }

    fn plan(&self, ctx: &PlanContext<'_>) -> CoreResult<Option<Plan>> {
        let mut builder = ctx.builder();
        let approach = steer_to(&mut builder, self.target, ctx.params, ctx.params.go_to_budget);
        if builder.is_empty() {
            return Ok(None);
        }

        let clamps = builder.clamps();
        Ok(Some(Plan {
            kind: PlanKind::GoTo,
            commands: builder.finish(),
            target: Some(self.target),
            slack: None,
            deadline: approach.arrived.then(|| ctx.now + approach.used),
            required_turn: approach.initial_turn,
            clamps,
        }))
    }
}
