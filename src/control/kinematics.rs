//! Kinematic model of the agent and the ball
//!
//! Forward relations predict what a command does one tick later. Inverse
//! relations size a command for a wanted outcome. Both read the same
//! [`PhysicsParams`], so a command sized by an inverse solve predicts back
//! to its target.

use crate::common::types::{Degrees, Tick};
use crate::common::Coordinate;
use crate::config::PhysicsParams;
use crate::error::{CoreError, CoreResult};

/// `1 + r + r^2 + ... + r^(n-1)`
pub fn geometric_sum(ratio: f64, terms: Tick) -> f64 {
    if (1.0 - ratio).abs() < f64::EPSILON {
        return f64::from(terms);
    }
    (1.0 - ratio.powi(terms as i32)) / (1.0 - ratio)
}

/// Result of an inverse solve that may have been clamped into range
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlSolution {
    pub value: f64,
    pub requested: f64,
}

impl ControlSolution {
    fn clamped(requested: f64, min: f64, max: f64) -> Self {
        ControlSolution {
            value: requested.clamp(min, max),
            requested,
        }
    }

    pub fn is_clamped(&self) -> bool {
        (self.value - self.requested).abs() > 1e-9
    }

    /// The clamp as an error value, for recording
    pub fn shortfall(&self) -> Option<CoreError> {
        self.is_clamped().then(|| CoreError::UnreachableControlTarget {
            requested: self.requested,
            clamped: self.value,
        })
    }
}

/// Kick power needed to send the ball a given distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KickSolution {
    pub power: ControlSolution,
    /// Ball speed right after the kick
    pub departure_speed: f64,
    /// Ticks until the ball has covered the distance, if it ever does
    pub travel_ticks: Option<Tick>,
}

/// Kick for a ball that may already be rolling
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KickVector {
    pub power: ControlSolution,
    /// Kick direction in the field frame
    pub direction: Degrees,
    /// Ball velocity wanted right after the kick
    pub departure: Coordinate,
}

#[derive(Debug, Clone)]
pub struct KinematicModel {
    physics: PhysicsParams,
}

impl KinematicModel {
    pub fn new(physics: PhysicsParams) -> Self {
        KinematicModel { physics }
    }

    pub fn physics(&self) -> &PhysicsParams {
        &self.physics
    }

    pub fn clamp_power(&self, power: f64) -> f64 {
        power.clamp(self.physics.min_power, self.physics.max_power)
    }

    pub fn clamp_moment(&self, moment: Degrees) -> Degrees {
        moment.clamp(self.physics.min_moment, self.physics.max_moment)
    }

    pub fn clamp_neck(&self, angle: Degrees) -> Degrees {
        angle.clamp(self.physics.min_neck_angle, self.physics.max_neck_angle)
    }

    /// Speed during the tick a dash is executed
    pub fn speed_after_dash(&self, speed: f64, power: f64) -> f64 {
        speed + self.clamp_power(power) * self.physics.dash_power_rate
    }

    /// Speed carried into the next tick: the dash is applied, capped at the
    /// player's top speed, then decayed
    pub fn next_speed(&self, speed: f64, power: f64) -> f64 {
        let max = self.physics.player_max_speed;
        self.speed_after_dash(speed, power).clamp(-max, max) * self.physics.player_decay
    }

    /// Velocity vector after a dash along `heading`, before decay
    pub fn dash_velocity(&self, velocity: Coordinate, heading: Degrees, power: f64) -> Coordinate {
        let accelerated = velocity
            + Coordinate::from_polar(self.clamp_power(power) * self.physics.dash_power_rate, heading);
        let speed = accelerated.magnitude();
        if speed > self.physics.player_max_speed {
            accelerated * (self.physics.player_max_speed / speed)
        } else {
            accelerated
        }
    }

    /// Dash power that turns `speed` into `target` within one tick.
    /// Out-of-range requests are clamped.
    pub fn dash_power_for(&self, speed: f64, target: f64) -> ControlSolution {
        let requested = (target - speed) / self.physics.dash_power_rate;
        ControlSolution::clamped(requested, self.physics.min_power, self.physics.max_power)
    }

    /// Heading change produced by a turn command at the given speed
    pub fn turn_realized(&self, speed: f64, moment: Degrees) -> Degrees {
        self.clamp_moment(moment) / (1.0 + self.physics.inertia_moment * speed.abs())
    }

    /// Largest heading change one turn can produce at the given speed
    pub fn max_turn(&self, speed: f64) -> Degrees {
        self.turn_realized(speed, self.physics.max_moment)
    }

    /// Turn moment for the wanted heading change
    pub fn moment_for(&self, speed: f64, turn: Degrees) -> ControlSolution {
        let requested = turn * (1.0 + self.physics.inertia_moment * speed.abs());
        ControlSolution::clamped(requested, self.physics.min_moment, self.physics.max_moment)
    }

    /// Share of the kick power that reaches the ball. `direction_off` is the
    /// ball's angle off the body heading, `gap` its distance past contact.
    pub fn kick_effectiveness(&self, direction_off: Degrees, gap: f64) -> f64 {
        let direction_term = self.physics.kick_direction_penalty * (direction_off.abs().min(180.0) / 180.0);
        let distance_term = self.physics.kick_distance_penalty
            * (gap.clamp(0.0, self.physics.kickable_margin) / self.physics.kickable_margin);
        (1.0 - direction_term - distance_term).max(0.0)
    }

    /// Ball speed added by a kick
    pub fn kick_departure(&self, power: f64, effectiveness: f64) -> f64 {
        self.physics.kick_power_rate * power.clamp(0.0, self.physics.max_power) * effectiveness
    }

    /// Ball velocity after a kick towards `direction` (field frame)
    pub fn ball_velocity_after_kick(
        &self,
        ball_velocity: Coordinate,
        direction: Degrees,
        power: f64,
        effectiveness: f64,
    ) -> Coordinate {
        let kicked = ball_velocity
            + Coordinate::from_polar(self.kick_departure(power, effectiveness), direction);
        let speed = kicked.magnitude();
        if speed > self.physics.ball_max_speed {
            kicked * (self.physics.ball_max_speed / speed)
        } else {
            kicked
        }
    }

    /// Distance a ball leaving at `speed` covers in `ticks`
    pub fn ball_travel(&self, speed: f64, ticks: Tick) -> f64 {
        speed * geometric_sum(self.physics.ball_decay, ticks)
    }

    /// Ball speed on leaving the foot so that it has covered `distance`
    /// when it is down to `arrival_speed`. Negative means the request
    /// itself is inconsistent.
    fn departure_for(&self, distance: f64, arrival_speed: f64) -> CoreResult<f64> {
        let departure = arrival_speed + distance * (1.0 - self.physics.ball_decay);
        if departure < 0.0 || departure.is_nan() {
            return Err(CoreError::InvariantViolation(format!(
                "kick over {:.2} arriving at {:.2} needs departure speed {:.2}",
                distance, arrival_speed, departure
            )));
        }
        Ok(departure)
    }

    fn power_for_speed(&self, speed: f64, effectiveness: f64) -> ControlSolution {
        let scale = self.physics.kick_power_rate * effectiveness;
        let requested = if speed <= 0.0 {
            0.0
        } else if scale > 0.0 {
            speed / scale
        } else {
            f64::INFINITY
        };
        ControlSolution {
            value: requested.min(self.physics.max_power),
            requested,
        }
    }

    /// Kick power that sends a resting ball `distance` away so that it
    /// arrives with `arrival_speed`.
    ///
    /// A negative power means the request itself is inconsistent and is
    /// reported as [`CoreError::InvariantViolation`]. Powers beyond the
    /// maximum are clamped.
    pub fn kick_power_for(
        &self,
        distance: f64,
        arrival_speed: f64,
        effectiveness: f64,
    ) -> CoreResult<KickSolution> {
        let decay = self.physics.ball_decay;
        let power = self.power_for_speed(self.departure_for(distance, arrival_speed)?, effectiveness);
        let departure_speed = self
            .kick_departure(power.value, effectiveness)
            .min(self.physics.ball_max_speed);

        let travel_ticks = if departure_speed <= 0.0 {
            None
        } else if distance <= 0.0 {
            Some(0)
        } else {
            let remaining = 1.0 - distance * (1.0 - decay) / departure_speed;
            (remaining > 0.0).then(|| (remaining.ln() / decay.ln()).ceil() as Tick)
        };

        Ok(KickSolution {
            power,
            departure_speed,
            travel_ticks,
        })
    }

    /// Kick that sends a ball at `ball`, moving with `ball_velocity`, past
    /// `target` at `arrival_speed`. The kick adds to the velocity the ball
    /// already has, so it is solved as the difference between the wanted
    /// departure velocity and the current one.
    pub fn kick_toward(
        &self,
        ball: Coordinate,
        ball_velocity: Coordinate,
        target: Coordinate,
        arrival_speed: f64,
        effectiveness: f64,
    ) -> CoreResult<KickVector> {
        let offset = target - ball;
        let distance = offset.magnitude();
        let speed = self.departure_for(distance, arrival_speed)?;
        let departure = if distance > f64::EPSILON {
            offset * (speed / distance)
        } else {
            Coordinate::ORIGIN
        };

        let kick = departure - ball_velocity;
        Ok(KickVector {
            power: self.power_for_speed(kick.magnitude(), effectiveness),
            direction: kick.direction(),
            departure,
        })
    }
}
