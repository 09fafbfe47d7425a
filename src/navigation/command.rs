//! Tick-indexed commands and the builder that forward-simulates them
//!
//! Planning never touches the world view. Every appended action advances a
//! [`PredictedState`] by one tick and records the [`Effects`] the action has
//! on the agent's body. The effects are applied only when the command is
//! actually dispatched.

use crate::common::angle::{angle_diff, normalize_deg};
use crate::common::types::{Degrees, Tick};
use crate::common::Coordinate;
use crate::control::kinematics::{ControlSolution, KinematicModel};
use crate::perception::sensors::ViewWidth;
use crate::world::AgentBodyState;

/// Smallest neck movement worth a command
const NECK_DEADBAND: Degrees = 0.5;

/// The agent's state as the planner expects it after some ticks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedState {
    pub position: Coordinate,
    pub velocity: Coordinate,
    /// Body heading in the field frame
    pub heading: Degrees,
    pub neck_angle: Degrees,
    pub view_width: ViewWidth,
}

impl PredictedState {
    /// State built from the agent's body, placed at `position`
    pub fn from_body(position: Coordinate, heading: Degrees, body: &AgentBodyState) -> Self {
        PredictedState {
            position,
            velocity: Coordinate::from_polar(body.speed, heading),
            heading,
            neck_angle: body.neck_angle,
            view_width: body.view_width,
        }
    }

    pub fn speed(&self) -> f64 {
        self.velocity.magnitude()
    }

    /// Speed component along the body heading
    pub fn forward_speed(&self) -> f64 {
        let unit = Coordinate::from_polar(1.0, self.heading);
        self.velocity.x * unit.x + self.velocity.y * unit.y
    }

    /// Direction the head faces in the field frame
    pub fn face(&self) -> Degrees {
        normalize_deg(self.heading + self.neck_angle)
    }
}

/// One locomotion primitive. Angles are counter-clockwise and relative to
/// the body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Action {
    Turn { moment: Degrees },
    Dash { power: f64 },
    Kick { power: f64, direction: Degrees },
    Catch { direction: Degrees },
}

impl Action {
    /// Server syntax; the server counts angles clockwise
    pub fn to_wire(&self) -> String {
        match *self {
            Action::Turn { moment } => format!("(turn {:.2})", -moment),
            Action::Dash { power } => format!("(dash {:.2})", power),
            Action::Kick { power, direction } => format!("(kick {:.2} {:.2})", power, -direction),
            Action::Catch { direction } => format!("(catch {:.2})", -direction),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Action::Kick { .. } | Action::Catch { .. })
    }
}

/// Changes to the agent's body that happen once a command is sent
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Effects {
    /// Realized body turn
    pub turned: Degrees,
    pub speed: Option<f64>,
    pub neck_angle: Option<Degrees>,
    pub view_width: Option<ViewWidth>,
}

impl Effects {
    pub fn apply(&self, body: &mut AgentBodyState) {
        body.pending_turn = normalize_deg(body.pending_turn + self.turned);
        if let Some(speed) = self.speed {
            body.speed = speed;
        }
        if let Some(neck) = self.neck_angle {
            body.neck_angle = neck;
        }
        if let Some(width) = self.view_width {
            body.view_width = width;
        }
    }
}

/// Everything to send in one simulation tick
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub tick: Tick,
    pub locomotion: Option<Action>,
    /// Relative neck turn
    pub neck: Option<Degrees>,
    pub view: Option<ViewWidth>,
    pub urgent: bool,
    pub effects: Effects,
    /// Predicted state once this tick has run
    pub predicted: PredictedState,
}

impl Command {
    pub fn to_wire(&self) -> Vec<String> {
        let mut out = Vec::with_capacity(3);
        if let Some(action) = &self.locomotion {
            out.push(action.to_wire());
        }
        if let Some(moment) = self.neck {
            out.push(format!("(turn_neck {:.2})", -moment));
        }
        if let Some(width) = self.view {
            out.push(format!("(change_view {} high)", width.keyword()));
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        self.locomotion.is_none() && self.neck.is_none() && self.view.is_none()
    }

    /// Add a neck turn that ends at `target`, relative to the body. False
    /// when the neck is already there.
    pub fn turn_neck_to(&mut self, target: Degrees) -> bool {
        let before = self.predicted.neck_angle - self.neck.unwrap_or(0.0);
        let moment = target - before;
        if moment.abs() < NECK_DEADBAND {
            return false;
        }
        self.neck = Some(moment);
        self.effects.neck_angle = Some(target);
        self.predicted.neck_angle = target;
        true
    }

    /// Add a view change unless the width is already in effect
    pub fn change_view(&mut self, width: ViewWidth) -> bool {
        if self.predicted.view_width == width {
            return false;
        }
        self.view = Some(width);
        self.effects.view_width = Some(width);
        self.predicted.view_width = width;
        true
    }
}

/// Accumulates one [`Command`] per future tick
#[derive(Debug, Clone)]
pub struct CommandBuilder<'m> {
    model: &'m KinematicModel,
    start_tick: Tick,
    state: PredictedState,
    commands: Vec<Command>,
    max_dash_power: f64,
    clamps: usize,
}

impl<'m> CommandBuilder<'m> {
    pub fn new(model: &'m KinematicModel, start_tick: Tick, state: PredictedState) -> Self {
        CommandBuilder {
            model,
            start_tick,
            state,
            commands: Vec::new(),
            max_dash_power: model.physics().max_power,
            clamps: 0,
        }
    }

    /// Cap forward dashes, for instance to save stamina
    pub fn with_max_dash_power(mut self, power: f64) -> Self {
        self.max_dash_power = power.clamp(0.0, self.model.physics().max_power);
        self
    }

    pub fn model(&self) -> &KinematicModel {
        self.model
    }

    pub fn state(&self) -> &PredictedState {
        &self.state
    }

    /// Ticks planned so far
    pub fn len(&self) -> Tick {
        self.commands.len() as Tick
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Inverse solves that had to be clamped
    pub fn clamps(&self) -> usize {
        self.clamps
    }

    fn record(&mut self, solution: &ControlSolution) -> f64 {
        if solution.is_clamped() {
            self.clamps += 1;
        }
        solution.value
    }

    /// Let the current velocity carry the agent one tick
    fn drift(&mut self) {
        self.state.position = self.state.position + self.state.velocity;
        self.state.velocity = self.state.velocity * self.model.physics().player_decay;
    }

    fn push(&mut self, locomotion: Option<Action>, turned: Degrees) {
        let tick = self.start_tick + self.len();
        self.commands.push(Command {
            tick,
            locomotion,
            neck: None,
            view: None,
            urgent: false,
            effects: Effects {
                turned,
                speed: Some(self.state.speed()),
                neck_angle: None,
                view_width: None,
            },
            predicted: self.state,
        });
    }

    /// Turn the body by `angle`, as far as one tick allows. Returns the
    /// realized turn.
    pub fn turn(&mut self, angle: Degrees) -> Degrees {
        let speed = self.state.speed();
        let solution = self.model.moment_for(speed, normalize_deg(angle));
        let moment = self.record(&solution);
        let turned = self.model.turn_realized(speed, moment);
        self.state.heading = normalize_deg(self.state.heading + turned);
        self.drift();
        self.push(Some(Action::Turn { moment }), turned);
        turned
    }

    /// Turn towards a field direction
    pub fn turn_to(&mut self, direction: Degrees) -> Degrees {
        let angle = angle_diff(self.state.heading, direction);
        self.turn(angle)
    }

    pub fn dash(&mut self, power: f64) {
        let power = self.model.clamp_power(power).min(self.max_dash_power);
        self.state.velocity = self
            .model
            .dash_velocity(self.state.velocity, self.state.heading, power);
        self.drift();
        self.push(Some(Action::Dash { power }), 0.0);
    }

    /// Dash so that the agent moves `speed` along its heading this tick
    pub fn dash_to_speed(&mut self, speed: f64) {
        let solution = self.model.dash_power_for(self.state.forward_speed(), speed);
        let power = self.record(&solution);
        self.dash(power);
    }

    /// Cancel as much forward motion as one dash can
    pub fn brake(&mut self) {
        self.dash_to_speed(0.0);
    }

    /// `direction` is in the field frame
    pub fn kick(&mut self, power: f64, direction: Degrees) {
        let relative = angle_diff(self.state.heading, direction);
        let power = power.clamp(0.0, self.model.physics().max_power);
        self.drift();
        self.push(
            Some(Action::Kick {
                power,
                direction: relative,
            }),
            0.0,
        );
    }

    /// `direction` is in the field frame
    pub fn catch(&mut self, direction: Degrees) {
        let relative = angle_diff(self.state.heading, direction);
        self.drift();
        self.push(Some(Action::Catch { direction: relative }), 0.0);
    }

    /// A tick without locomotion
    pub fn idle(&mut self) {
        self.drift();
        self.push(None, 0.0);
    }

    /// Turn the neck to `angle` relative to the body during the first tick
    pub fn set_neck(&mut self, angle: Degrees) {
        let target = self.model.clamp_neck(angle);
        if self.commands.is_empty() {
            self.idle();
        }
        if !self.commands[0].turn_neck_to(target) {
            return;
        }
        for command in self.commands.iter_mut().skip(1) {
            command.predicted.neck_angle = target;
        }
        self.state.neck_angle = target;
    }

    /// Switch the view width during the first tick, if it differs
    pub fn set_view(&mut self, width: ViewWidth) {
        if self.commands.is_empty() {
            self.idle();
        }
        if !self.commands[0].change_view(width) {
            return;
        }
        for command in self.commands.iter_mut().skip(1) {
            command.predicted.view_width = width;
        }
        self.state.view_width = width;
    }

    pub fn mark_urgent(&mut self) {
        for command in self.commands.iter_mut() {
            command.urgent = true;
        }
    }

    pub fn finish(self) -> Vec<Command> {
        self.commands
    }
}
