//! Ball interception
//!
//! The ball is projected forward tick by tick. For each arrival tick up to
//! the horizon a complete plan is built, and one of the feasible plans is
//! picked by slack.

use super::go_to::steer_to;
use super::planner::{MotionPlanner, Plan, PlanContext, PlanKind, Terminal};
use crate::common::angle::angle_diff;
use crate::common::types::Tick;
use crate::common::Coordinate;
use crate::config::PlannerParams;
use crate::control::trajectory::BallTrajectory;
use crate::error::CoreResult;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct InterceptPlanner {
    /// Ball position in the planning frame
    pub ball: Coordinate,
    pub ball_velocity: Coordinate,
    pub terminal: Terminal,
    /// The previous pass was already chasing this ball
    pub continuing: bool,
}

impl InterceptPlanner {
    pub fn new(ball: Coordinate, ball_velocity: Coordinate, terminal: Terminal) -> Self {
        InterceptPlanner {
            ball,
            ball_velocity,
            terminal,
            continuing: false,
        }
    }

    pub fn continuing(mut self, continuing: bool) -> Self {
        self.continuing = continuing;
        self
    }

    fn reach(&self, ctx: &PlanContext<'_>) -> f64 {
        let physics = ctx.model.physics();
        match self.terminal {
            Terminal::Kick { .. } => physics.kickable_margin,
            Terminal::Catch => physics.catchable_margin,
        }
    }

    /// Full plan for meeting the ball `arrival` ticks from now, or `None`
    /// when the agent cannot be in reach by then
    fn plan_arrival(
        &self,
        ctx: &PlanContext<'_>,
        trajectory: &BallTrajectory,
        arrival: Tick,
    ) -> CoreResult<Option<Plan>> {
        let reach = self.reach(ctx);
        let start = ctx.start.position;
        let ball = trajectory.position_at(arrival);
        let max_speed = ctx.model.physics().player_max_speed;

        let gap = start.distance_to(&ball) - reach;
        if gap > f64::from(arrival) * max_speed {
            return Ok(None);
        }

        let offset = ball - start;
        let aim = if offset.magnitude() > ctx.params.kick_aim_distance {
            ball - offset * (ctx.params.kick_aim_distance / offset.magnitude())
        } else {
            start
        };

        let mut builder = ctx.builder();
        let approach = steer_to(&mut builder, aim, ctx.params, arrival);
        while builder.len() < arrival {
            builder.idle();
        }

        let at_arrival = *builder.state();
        let separation = ball - at_arrival.position;
        if separation.magnitude() > reach {
            return Ok(None);
        }

        let mut clamps = builder.clamps();
        match self.terminal {
            Terminal::Kick {
                target,
                arrival_speed,
            } => {
                let model = ctx.model;
                let off_body = angle_diff(at_arrival.heading, separation.direction());
                let effectiveness = model.kick_effectiveness(off_body, separation.magnitude());
                let incoming = trajectory.velocity_at(arrival);
                let kick = model.kick_toward(ball, incoming, target, arrival_speed, effectiveness)?;
                if kick.power.is_clamped() {
                    clamps += 1;
                }
                builder.kick(kick.power.value, kick.direction);
            }
            Terminal::Catch => builder.catch(separation.direction()),
        }

        let slack = arrival - approach.used;
        if slack == 0 {
            builder.mark_urgent();
        }

        Ok(Some(Plan {
            kind: PlanKind::Intercept,
            commands: builder.finish(),
            target: Some(ball),
            slack: Some(slack),
            deadline: Some(ctx.now + arrival),
            required_turn: approach.initial_turn,
            clamps,
        }))
    }
}

impl MotionPlanner for InterceptPlanner {
    fn name(&self) -> &str {
        "intercept"
    }

    fn plan(&self, ctx: &PlanContext<'_>) -> CoreResult<Option<Plan>> {
        let physics = ctx.model.physics();
        let params = ctx.params;
        let trajectory = BallTrajectory::new(self.ball, self.ball_velocity, physics.ball_decay);

        let mut feasible = Vec::new();
        for arrival in 0..=params.intercept_horizon {
            if arrival > 0 && ctx.out_of_time() {
                debug!(arrival, "intercept search stopped at the deadline");
                break;
            }
            let Some(plan) = self.plan_arrival(ctx, &trajectory, arrival)? else {
                continue;
            };
            if plan.slack == Some(0) {
                debug!(arrival, "urgent interception");
                return Ok(Some(plan));
            }
            feasible.push(plan);
        }

        let ball_distance = ctx.start.position.distance_to(&self.ball);
        let chosen = select_plan(feasible, self.continuing, ctx.params, ball_distance);
        if let Some(plan) = &chosen {
            debug!(slack = plan.slack, deadline = plan.deadline, "interception planned");
        }
        Ok(chosen)
    }
}

/// Pick among feasible, non-urgent plans.
///
/// A plan that keeps the current heading is preferred while already
/// chasing, otherwise the slack closest to the comfortable cushion wins. A
/// tight plan for a far ball is not trusted at all.
pub fn select_plan(
    feasible: Vec<Plan>,
    continuing: bool,
    params: &PlannerParams,
    ball_distance: f64,
) -> Option<Plan> {
    let comfortable = params.comfortable_slack;
    let closeness = |plan: &Plan| plan.slack.unwrap_or(0).abs_diff(comfortable);

    let preferred = if continuing {
        feasible
            .iter()
            .filter(|plan| plan.required_turn.abs() < params.reaim_angle)
            .min_by_key(|plan| closeness(plan))
    } else {
        None
    };
    let chosen = preferred.or_else(|| feasible.iter().min_by_key(|plan| closeness(plan)))?;

    let slack = chosen.slack.unwrap_or(0);
    if slack < params.min_reliable_slack && ball_distance > params.unreliable_ball_distance {
        debug!(slack, ball_distance, "interception too tight to trust");
        return None;
    }
    Some(chosen.clone())
}
