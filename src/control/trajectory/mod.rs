//! Ball trajectory projection

use crate::common::types::Tick;
use crate::common::Coordinate;
use crate::control::kinematics::geometric_sum;

/// Free rolling ball under geometric speed decay
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BallTrajectory {
    origin: Coordinate,
    velocity: Coordinate,
    decay: f64,
}

impl BallTrajectory {
    /// Create a trajectory from the ball's position and velocity at tick 0
    pub fn new(origin: Coordinate, velocity: Coordinate, decay: f64) -> Self {
        BallTrajectory {
            origin,
            velocity,
            decay,
        }
    }

    /// Position `ticks` ticks from now
    pub fn position_at(&self, ticks: Tick) -> Coordinate {
        self.origin + self.velocity * geometric_sum(self.decay, ticks)
    }

    pub fn velocity_at(&self, ticks: Tick) -> Coordinate {
        self.velocity * self.decay.powi(ticks as i32)
    }
}
