use pitch_core::common::Coordinate;
use pitch_core::config::{PhysicsParams, PlannerParams};
use pitch_core::control::kinematics::KinematicModel;
use pitch_core::control::trajectory::BallTrajectory;
use pitch_core::navigation::command::{Action, PredictedState};
use pitch_core::navigation::go_to::GoToPlanner;
use pitch_core::navigation::intercept::InterceptPlanner;
use pitch_core::navigation::planner::{MotionPlanner, PassPhase, PlanContext, Terminal};
use pitch_core::perception::sensors::ViewWidth;
use std::time::{Duration, Instant};

fn context<'a>(model: &'a KinematicModel, params: &'a PlannerParams) -> PlanContext<'a> {
    PlanContext {
        model,
        params,
        now: 0,
        start: PredictedState {
            position: Coordinate::ORIGIN,
            velocity: Coordinate::ORIGIN,
            heading: 0.0,
            neck_angle: 0.0,
            view_width: ViewWidth::Normal,
        },
        max_dash_power: 100.0,
        deadline: Instant::now() + Duration::from_secs(5),
    }
}

#[test]
fn interception_ends_within_kickable_margin() {
    let physics = PhysicsParams::default();
    let model = KinematicModel::new(physics.clone());
    let params = PlannerParams::default();
    let ctx = context(&model, &params);

    let ball = Coordinate::new(5.0, 0.0);
    let velocity = Coordinate::new(-1.0, 0.0);
    let terminal = Terminal::Kick {
        target: Coordinate::new(30.0, 0.0),
        arrival_speed: 0.5,
    };
    let plan = InterceptPlanner::new(ball, velocity, terminal)
        .plan(&ctx)
        .unwrap()
        .expect("interception plan");

    let deadline = plan.deadline.expect("deadline");
    let projected = BallTrajectory::new(ball, velocity, physics.ball_decay).position_at(deadline);
    assert!(plan.target.unwrap().distance_to(&projected) < 1e-9);

    // State in the tick of the kick
    let at_kick = &plan.commands[plan.commands.len() - 2].predicted;
    assert!(at_kick.position.distance_to(&projected) <= physics.kickable_margin);
    assert!(matches!(plan.commands.last().unwrap().locomotion, Some(Action::Kick { .. })));
}

#[test]
fn go_to_reaches_the_target() {
    let model = KinematicModel::new(PhysicsParams::default());
    let params = PlannerParams::default();
    let ctx = context(&model, &params);

    let target = Coordinate::new(0.0, 4.0);
    let plan = GoToPlanner::new(target).plan(&ctx).unwrap().expect("go-to plan");
    assert_eq!(plan.phase(), PassPhase::Orienting);
    let end = plan.final_state().unwrap();
    assert!(end.position.distance_to(&target) <= 1.0, "ended at {}", end.position);
}
