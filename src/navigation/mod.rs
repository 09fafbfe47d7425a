//! Navigation stack: one planning pass per control cycle
pub mod command;
pub mod go_to;
pub mod intercept;
pub mod planner;
pub mod vision;

use self::command::{Command, CommandBuilder, PredictedState};
use self::go_to::GoToPlanner;
use self::intercept::InterceptPlanner;
use self::planner::{MotionPlanner, OrientPlanner, PassPhase, Plan, PlanContext, PlanKind, Terminal};
use self::vision::{neck_for, GazeInput, VisionPlanner};
use crate::common::types::Tick;
use crate::common::Coordinate;
use crate::config::AgentConfig;
use crate::control::kinematics::KinematicModel;
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{LifecycleNode, LifecycleNodeBase, State};
use crate::perception::sensors::ViewWidth;
use crate::world::WorldView;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// What the agent is trying to achieve this cycle
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Objective {
    /// Chase the ball and kick it towards a field point
    Intercept { kick_target: Coordinate, arrival_speed: f64 },
    /// Chase the ball and catch it
    Catch,
    GoTo(Coordinate),
    /// Stay put and keep looking around
    Hold,
}

/// Result of one planning pass
#[derive(Debug, Clone, Default)]
pub struct PassOutcome {
    /// The command for the current tick, if there is anything to send
    pub command: Option<Command>,
    pub plan: Option<Plan>,
    pub phase: PassPhase,
    /// The pass was aborted on an invariant violation
    pub aborted: bool,
}

/// Navigation stack for the agent
pub struct NavigationStack {
    base: LifecycleNodeBase,
    config: Arc<AgentConfig>,
    vision: VisionPlanner,
    /// Remaining ticks of the last urgent plan
    pending: VecDeque<Command>,
    chasing: bool,
    phase: PassPhase,
}

impl NavigationStack {
    /// Create a new navigation stack
    pub fn new(config: Arc<AgentConfig>) -> Self {
        NavigationStack {
            base: LifecycleNodeBase::new("navigation_stack"),
            vision: VisionPlanner::new(config.vision.clone()),
            config,
            pending: VecDeque::new(),
            chasing: false,
            phase: PassPhase::Idle,
        }
    }

    pub fn phase(&self) -> PassPhase {
        self.phase
    }

    pub fn vision(&self) -> &VisionPlanner {
        &self.vision
    }

    fn take_urgent(&mut self, now: Tick) -> Option<Command> {
        while self.pending.front().is_some_and(|command| command.tick < now) {
            self.pending.pop_front();
        }
        match self.pending.front() {
            Some(command) if command.tick == now && command.urgent => self.pending.pop_front(),
            _ => None,
        }
    }

    fn run_planner(
        &self,
        planner: &dyn MotionPlanner,
        ctx: &PlanContext<'_>,
    ) -> CoreResult<Option<Plan>> {
        let plan = planner.plan(ctx)?;
        debug!(
            planner = planner.name(),
            tick = ctx.now,
            commands = plan.as_ref().map_or(0, |plan| plan.commands.len()),
            "planner finished"
        );
        Ok(plan)
    }

    fn plan_objective(
        &self,
        world: &WorldView,
        objective: Objective,
        ctx: &PlanContext<'_>,
    ) -> CoreResult<Option<Plan>> {
        let params = &self.config.planner;
        let ball = world
            .ball_relative(params.ball_max_age, params.self_max_age, ctx.model.physics().ball_decay)
            .map(|(relative, velocity)| (ctx.start.position + relative, velocity));

        let terminal = match objective {
            Objective::Intercept {
                kick_target,
                arrival_speed,
            } => Terminal::Kick {
                target: kick_target,
                arrival_speed,
            },
            Objective::Catch => Terminal::Catch,
            Objective::GoTo(target) => return self.run_planner(&GoToPlanner::new(target), ctx),
            Objective::Hold => return Ok(None),
        };

        let Some((ball, velocity)) = ball else {
            debug!(tick = ctx.now, "ball unknown, nothing to chase");
            return Ok(None);
        };

        let intercept = InterceptPlanner::new(ball, velocity, terminal).continuing(self.chasing);
        match self.run_planner(&intercept, ctx)? {
            Some(plan) => Ok(Some(plan)),
            // Plain pursuit when no interception is worth trusting
            None => self.run_planner(&GoToPlanner::new(ball), ctx),
        }
    }

    /// Run one planning pass and return the command for the current tick.
    ///
    /// Never fails: an invariant violation aborts only the locomotion part
    /// of the pass and the head still gets its command.
    pub fn plan_pass(
        &mut self,
        world: &WorldView,
        model: &KinematicModel,
        objective: Objective,
        max_dash_power: f64,
    ) -> PassOutcome {
        let config = Arc::clone(&self.config);
        let params = &config.planner;
        let now = world.sim_time;
        let deadline = Instant::now() + Duration::from_millis(params.pass_deadline_ms);

        let position = world.position.get_copied(now, params.self_max_age);
        let heading = world.body_heading(params.self_max_age);
        let start = match (position, heading) {
            (Some(position), Some(heading)) => Some(PredictedState::from_body(position, heading, &world.body)),
            _ => None,
        };

        let mut outcome = PassOutcome::default();
        let mut command = self.take_urgent(now);

        if command.is_none() {
            let ctx = PlanContext {
                model,
                params,
                now,
                start: start.unwrap_or(PredictedState::from_body(
                    Coordinate::ORIGIN,
                    0.0,
                    &world.body,
                )),
                max_dash_power,
                deadline,
            };

            let planned = match start {
                Some(_) => self.plan_objective(world, objective, &ctx),
                None => {
                    debug!(tick = now, "own pose unknown, orienting");
                    self.run_planner(&OrientPlanner, &ctx)
                }
            };

            match planned {
                Ok(plan) => outcome.plan = plan,
                Err(err) if err.is_fatal_to_pass() => {
                    error!(tick = now, "planning pass aborted: {}", err);
                    outcome.aborted = true;
                }
                Err(err) => warn!(tick = now, "planning failed: {}", err),
            }

            self.pending.clear();
            if let Some(plan) = &outcome.plan {
                if plan.clamps > 0 {
                    debug!(tick = now, clamps = plan.clamps, "control targets clamped");
                }
                if plan.is_urgent() {
                    self.pending.extend(plan.commands.iter().skip(1).cloned());
                }
                command = plan.first().cloned();
            }
            if command.is_none() {
                let mut builder = CommandBuilder::new(model, now, ctx.start);
                builder.idle();
                command = builder.finish().into_iter().next();
            }
        }

        let Some(mut command) = command else {
            return outcome;
        };

        self.attach_gaze(world, model, &mut command, start.is_some());
        outcome.phase = PassPhase::of(Some(&command));
        self.phase = outcome.phase;
        self.chasing = outcome
            .plan
            .as_ref()
            .is_some_and(|plan| plan.kind == PlanKind::Intercept)
            && matches!(outcome.phase, PassPhase::Orienting | PassPhase::Locomoting);

        if !command.is_empty() {
            outcome.command = Some(command);
        }
        outcome
    }

    fn attach_gaze(
        &mut self,
        world: &WorldView,
        model: &KinematicModel,
        command: &mut Command,
        pose_known: bool,
    ) {
        let params = &self.config.planner;
        let now = world.sim_time;
        let face = world.face_direction(params.self_max_age);
        // Plans leave the head alone, so it starts where the body says it is
        command.predicted.neck_angle = world.body.neck_angle;
        command.predicted.view_width = world.body.view_width;

        let ball = world
            .ball_relative(self.config.vision.stale_after, params.self_max_age, model.physics().ball_decay)
            .zip(world.ball.confirmed_at())
            .map(|((relative, _), seen_at)| (relative.direction(), relative.magnitude(), seen_at));

        let gaze = self.vision.decide(
            GazeInput {
                now,
                face,
                ball,
                self_age: world.position.age(now),
            },
            world.body.view_width,
        );

        if !pose_known {
            command.change_view(ViewWidth::Wide);
            return;
        }
        if let Some(face) = gaze.face {
            let neck = model.clamp_neck(neck_for(face, command.predicted.heading));
            command.turn_neck_to(neck);
        }
        command.change_view(gaze.width);
    }
}

impl LifecycleNode for NavigationStack {
    fn on_configure(&mut self) -> CoreResult<()> {
        info!(
            horizon = self.config.planner.intercept_horizon,
            "Configuring navigation stack"
        );
        if self.config.planner.intercept_horizon == 0 {
            return Err(CoreError::Lifecycle {
                component: self.base.name.clone(),
                reason: "intercept horizon must be positive".to_string(),
            });
        }
        self.base.transition(State::Unconfigured, State::Inactive)
    }

    fn on_activate(&mut self) -> CoreResult<()> {
        info!("Activating navigation stack");
        self.base.transition(State::Inactive, State::Active)
    }

    fn on_deactivate(&mut self) -> CoreResult<()> {
        info!("Deactivating navigation stack");
        self.pending.clear();
        self.chasing = false;
        self.base.transition(State::Active, State::Inactive)
    }

    fn on_cleanup(&mut self) -> CoreResult<()> {
        info!("Cleaning up navigation stack");
        self.vision = VisionPlanner::new(self.config.vision.clone());
        self.phase = PassPhase::Idle;
        self.base.transition(State::Inactive, State::Unconfigured)
    }

    fn state(&self) -> State {
        self.base.get_state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::navigation::command::Action;
    use crate::perception::sensors::ObjectSighting;
    use crate::world::ObservedBall;

    fn stack() -> (NavigationStack, KinematicModel) {
        let config = Arc::new(AgentConfig::default());
        let model = KinematicModel::new(config.physics.clone());
        (NavigationStack::new(config), model)
    }

    fn located_world(now: Tick) -> WorldView {
        let mut world = WorldView::new();
        world.sim_time = now;
        world.position.update(Coordinate::ORIGIN, now);
        world.heading.update(0.0, now);
        world
    }

    #[test]
    fn unknown_pose_orients_with_wide_view() {
        let (mut nav, model) = stack();
        let world = WorldView::new();
        let outcome = nav.plan_pass(&world, &model, Objective::Hold, 100.0);
        let command = outcome.command.unwrap();
        assert!(matches!(command.locomotion, Some(Action::Turn { .. })));
        assert_eq!(command.view, Some(ViewWidth::Wide));
        assert_eq!(outcome.phase, PassPhase::Orienting);
    }

    #[test]
    fn go_to_objective_moves_the_agent() {
        let (mut nav, model) = stack();
        let world = located_world(10);
        let outcome = nav.plan_pass(&world, &model, Objective::GoTo(Coordinate::new(10.0, 0.0)), 100.0);
        let command = outcome.command.unwrap();
        assert!(matches!(command.locomotion, Some(Action::Dash { .. })));
        assert_eq!(outcome.phase, PassPhase::Locomoting);
    }

    #[test]
    fn invariant_violation_keeps_only_the_gaze() {
        let (mut nav, model) = stack();
        let mut world = located_world(10);
        world.ball.update(
            ObservedBall::from_sighting(ObjectSighting {
                distance: 0.5,
                direction: 60.0,
                change: None,
            }),
            10,
        );
        // No kick can make the ball arrive backwards
        let objective = Objective::Intercept {
            kick_target: Coordinate::new(1.0, 1.0),
            arrival_speed: -2.0,
        };
        let outcome = nav.plan_pass(&world, &model, objective, 100.0);

        assert!(outcome.aborted);
        assert!(outcome.plan.is_none());
        assert_eq!(outcome.phase, PassPhase::Idle);
        let command = outcome.command.unwrap();
        assert_eq!(command.locomotion, None);
        assert!((command.neck.unwrap() - 60.0).abs() < 1e-9);
        assert_eq!(command.view, Some(ViewWidth::Narrow));
    }

    #[test]
    fn urgent_plan_is_followed_on_the_next_tick() {
        let (mut nav, model) = stack();
        let mut world = located_world(10);
        world.ball.update(
            ObservedBall {
                velocity: Some(Coordinate::new(-1.0, 0.0)),
                ..ObservedBall::from_sighting(ObjectSighting {
                    distance: 5.0,
                    direction: 0.0,
                    change: None,
                })
            },
            10,
        );
        let objective = Objective::Intercept {
            kick_target: Coordinate::new(52.5, 0.0),
            arrival_speed: 0.5,
        };
        let first = nav.plan_pass(&world, &model, objective, 100.0);
        assert!(first.plan.as_ref().unwrap().is_urgent());
        let second_planned = first.plan.as_ref().unwrap().commands[1].clone();

        // Next tick: nothing new was seen, the urgent plan continues as is
        world.sim_time = 11;
        let second = nav.plan_pass(&world, &model, objective, 100.0);
        assert!(second.plan.is_none());
        assert_eq!(second.command.unwrap().locomotion, second_planned.locomotion);
    }
}
