//! Common utilities and types for the decision core
pub mod angle;
pub mod geometry;
pub mod precarious;

/// Common types and utilities used across the codebase
pub mod types {
    /// One discrete simulation step of the game server clock
    pub type Tick = u32;

    /// Angle in degrees
    pub type Degrees = f64;
}

pub use self::geometry::Coordinate;
pub use self::precarious::Precarious;
pub use self::types::{Degrees, Tick};
