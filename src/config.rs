//! Static parameter set for the agent
//!
//! Loaded once at startup and shared read-only through an `Arc`. Every
//! section may be omitted from the TOML file and falls back to the server
//! defaults below.

use crate::common::types::{Degrees, Tick};
use crate::common::Coordinate;
use crate::error::{CoreError, CoreResult};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// Physical constants of the simulated players and ball
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PhysicsParams {
    pub player_max_speed: f64,
    pub player_decay: f64,
    pub dash_power_rate: f64,
    pub inertia_moment: f64,
    pub ball_decay: f64,
    pub ball_max_speed: f64,
    pub kick_power_rate: f64,
    pub kickable_margin: f64,
    pub catchable_margin: f64,
    pub min_power: f64,
    pub max_power: f64,
    pub min_moment: Degrees,
    pub max_moment: Degrees,
    pub min_neck_angle: Degrees,
    pub max_neck_angle: Degrees,
    /// Kick effectiveness lost for a ball directly behind the body
    pub kick_direction_penalty: f64,
    /// Kick effectiveness lost for a ball at the edge of the kickable area
    pub kick_distance_penalty: f64,
}

impl Default for PhysicsParams {
    fn default() -> Self {
        Self {
            player_max_speed: 1.05,
            player_decay: 0.4,
            dash_power_rate: 0.006,
            inertia_moment: 5.0,
            ball_decay: 0.94,
            ball_max_speed: 3.0,
            kick_power_rate: 0.027,
            kickable_margin: 0.7,
            catchable_margin: 1.0,
            min_power: -100.0,
            max_power: 100.0,
            min_moment: -180.0,
            max_moment: 180.0,
            min_neck_angle: -90.0,
            max_neck_angle: 90.0,
            kick_direction_penalty: 0.25,
            kick_distance_penalty: 0.25,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FieldParams {
    pub half_length: f64,
    pub half_width: f64,
    /// Players may stand this far outside the lines
    pub boundary_margin: f64,
}

impl Default for FieldParams {
    fn default() -> Self {
        Self {
            half_length: 52.5,
            half_width: 34.0,
            boundary_margin: 5.0,
        }
    }
}

impl FieldParams {
    pub fn contains(&self, point: Coordinate) -> bool {
        point.is_finite()
            && point.x.abs() <= self.half_length + self.boundary_margin
            && point.y.abs() <= self.half_width + self.boundary_margin
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LocalizationParams {
    /// Nearest landmarks kept for trilateration
    pub max_landmarks: usize,
    pub cluster_tolerance: f64,
    pub heading_tolerance: Degrees,
    /// Oldest previous fix that still constrains new candidates
    pub prior_max_age: Tick,
    pub tangent_tolerance: f64,
    /// Widest gap between two fixes used to derive a velocity
    pub velocity_window: Tick,
}

impl Default for LocalizationParams {
    fn default() -> Self {
        Self {
            max_landmarks: 6,
            cluster_tolerance: 3.0,
            heading_tolerance: 3.0,
            prior_max_age: 10,
            tangent_tolerance: 0.5,
            velocity_window: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PlannerParams {
    pub intercept_horizon: Tick,
    pub comfortable_slack: Tick,
    pub min_reliable_slack: Tick,
    pub unreliable_ball_distance: f64,
    pub reaim_angle: Degrees,
    /// Sideways miss accepted when deciding whether we face a target
    pub lateral_deviation: f64,
    pub arrival_tolerance: f64,
    /// Distance short of the ball the agent aims to stop at
    pub kick_aim_distance: f64,
    pub go_to_budget: Tick,
    pub orient_turn: Degrees,
    /// Freshness needed before own position and heading are trusted
    pub self_max_age: Tick,
    pub ball_max_age: Tick,
    /// Planning budget inside one cycle, in milliseconds
    pub pass_deadline_ms: u64,
    /// Default arrival speed of a kicked ball at its target
    pub kick_arrival_speed: f64,
}

impl Default for PlannerParams {
    fn default() -> Self {
        Self {
            intercept_horizon: 15,
            comfortable_slack: 3,
            min_reliable_slack: 2,
            unreliable_ball_distance: 5.0,
            reaim_angle: 5.0,
            lateral_deviation: 0.5,
            arrival_tolerance: 0.1,
            kick_aim_distance: 0.4,
            go_to_budget: 40,
            orient_turn: 60.0,
            self_max_age: 3,
            ball_max_age: 5,
            pass_deadline_ms: 40,
            kick_arrival_speed: 0.5,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisionParams {
    pub narrow_width: Degrees,
    pub normal_width: Degrees,
    pub wide_width: Degrees,
    /// Ball closer than this is watched with the narrow cone
    pub narrow_distance: f64,
    /// Ticks of continuous ball tracking before a sweep
    pub sweep_interval: Tick,
    pub sectors: usize,
    /// Older ball or self data switches to the wide cone
    pub stale_after: Tick,
}

impl Default for VisionParams {
    fn default() -> Self {
        Self {
            narrow_width: 45.0,
            normal_width: 90.0,
            wide_width: 180.0,
            narrow_distance: 10.0,
            sweep_interval: 10,
            sectors: 8,
            stale_after: 3,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SchedulerParams {
    pub interval_ms: u64,
    /// How often the loop wakes up to look at the clock and the inbox
    pub poll_ms: u64,
}

impl Default for SchedulerParams {
    fn default() -> Self {
        Self {
            interval_ms: 100,
            poll_ms: 10,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyParams {
    pub enabled: bool,
    /// Advice requested longer ago than this is dropped; `None` keeps all
    pub max_result_age: Option<Tick>,
    /// Minimum ticks between two requests
    pub request_interval: Tick,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            enabled: false,
            max_result_age: Some(50),
            request_interval: 20,
        }
    }
}

/// The full parameter set
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub team_name: String,
    pub physics: PhysicsParams,
    pub field: FieldParams,
    pub localization: LocalizationParams,
    pub planner: PlannerParams,
    pub vision: VisionParams,
    pub scheduler: SchedulerParams,
    pub strategy: StrategyParams,
    pub landmarks: BTreeMap<String, Coordinate>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            team_name: "Team_1".to_string(),
            physics: PhysicsParams::default(),
            field: FieldParams::default(),
            localization: LocalizationParams::default(),
            planner: PlannerParams::default(),
            vision: VisionParams::default(),
            scheduler: SchedulerParams::default(),
            strategy: StrategyParams::default(),
            landmarks: default_landmarks(),
        }
    }
}

impl AgentConfig {
    pub fn from_toml_str(text: &str) -> CoreResult<Self> {
        let config: AgentConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> CoreResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Reject parameter sets the kinematic model cannot work with
    pub fn validate(&self) -> CoreResult<()> {
        let p = &self.physics;
        for (name, decay) in [("player_decay", p.player_decay), ("ball_decay", p.ball_decay)] {
            if !(decay > 0.0 && decay < 1.0) {
                return Err(CoreError::Config(format!("{} must lie in (0, 1)", name)));
            }
        }
        for (name, rate) in [
            ("dash_power_rate", p.dash_power_rate),
            ("kick_power_rate", p.kick_power_rate),
            ("player_max_speed", p.player_max_speed),
            ("kickable_margin", p.kickable_margin),
        ] {
            if rate <= 0.0 {
                return Err(CoreError::Config(format!("{} must be positive", name)));
            }
        }
        if p.min_power >= p.max_power || p.min_moment >= p.max_moment {
            return Err(CoreError::Config("control ranges must be non-empty".to_string()));
        }
        if self.landmarks.len() < 2 {
            return Err(CoreError::Config(
                "at least two landmarks are needed to localize".to_string(),
            ));
        }
        if self.localization.max_landmarks < 2 {
            return Err(CoreError::Config("max_landmarks must be at least 2".to_string()));
        }
        if self.vision.sectors == 0 {
            return Err(CoreError::Config("vision needs at least one sector".to_string()));
        }
        if self.scheduler.interval_ms == 0 {
            return Err(CoreError::Config("interval_ms must be positive".to_string()));
        }
        Ok(())
    }
}

/// Field markers as seen by the server, keyed by their id with spaces removed
pub fn default_landmarks() -> BTreeMap<String, Coordinate> {
    const FLAGS: &[(&str, f64, f64)] = &[
        ("tl50", -50.0, 39.0),
        ("tl40", -40.0, 39.0),
        ("tl30", -30.0, 39.0),
        ("tl20", -20.0, 39.0),
        ("tl10", -10.0, 39.0),
        ("t0", 0.0, 39.0),
        ("tr10", 10.0, 39.0),
        ("tr20", 20.0, 39.0),
        ("tr30", 30.0, 39.0),
        ("tr40", 40.0, 39.0),
        ("tr50", 50.0, 39.0),
        ("rt30", 57.5, 30.0),
        ("rt20", 57.5, 20.0),
        ("rt10", 57.5, 10.0),
        ("r0", 57.5, 0.0),
        ("rb10", 57.5, -10.0),
        ("rb20", 57.5, -20.0),
        ("rb30", 57.5, -30.0),
        ("bl50", -50.0, -39.0),
        ("bl40", -40.0, -39.0),
        ("bl30", -30.0, -39.0),
        ("bl20", -20.0, -39.0),
        ("bl10", -10.0, -39.0),
        ("b0", 0.0, -39.0),
        ("br10", 10.0, -39.0),
        ("br20", 20.0, -39.0),
        ("br30", 30.0, -39.0),
        ("br40", 40.0, -39.0),
        ("br50", 50.0, -39.0),
        ("lt30", -57.5, 30.0),
        ("lt20", -57.5, 20.0),
        ("lt10", -57.5, 10.0),
        ("l0", -57.5, 0.0),
        ("lb10", -57.5, -10.0),
        ("lb20", -57.5, -20.0),
        ("lb30", -57.5, -30.0),
        ("glt", -52.5, 7.01),
        ("gl", -52.5, 0.0),
        ("glb", -52.5, -7.01),
        ("grt", 52.5, 7.01),
        ("gr", 52.5, 0.0),
        ("grb", 52.5, -7.01),
        ("plt", -36.0, 20.16),
        ("plc", -36.0, 0.0),
        ("plb", -36.0, -20.16),
        ("prt", 36.0, 20.16),
        ("prc", 36.0, 0.0),
        ("prb", 36.0, -20.16),
        ("lt", -52.5, 34.0),
        ("ct", 0.0, 34.0),
        ("rt", 52.5, 34.0),
        ("lb", -52.5, -34.0),
        ("cb", 0.0, -34.0),
        ("rb", 52.5, -34.0),
        ("c", 0.0, 0.0),
    ];

    FLAGS
        .iter()
        .map(|&(id, x, y)| (id.to_string(), Coordinate::new(x, y)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = AgentConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.landmarks.len(), 55);
        assert_eq!(config.landmarks["gr"], Coordinate::new(52.5, 0.0));
    }

    #[test]
    fn partial_toml_falls_back_to_defaults() {
        let config = AgentConfig::from_toml_str(
            r#"
            team_name = "Robots"

            [physics]
            ball_decay = 0.9

            [planner]
            intercept_horizon = 20
            "#,
        )
        .unwrap();

        assert_eq!(config.team_name, "Robots");
        assert_eq!(config.physics.ball_decay, 0.9);
        assert_eq!(config.physics.player_decay, 0.4);
        assert_eq!(config.planner.intercept_horizon, 20);
        assert_eq!(config.landmarks.len(), 55);
    }

    #[test]
    fn rejects_non_physical_decay() {
        let err = AgentConfig::from_toml_str("[physics]\nplayer_decay = 1.5\n").unwrap_err();
        assert!(matches!(err, CoreError::Config(_)));
    }

    #[test]
    fn field_contains_margin() {
        let field = FieldParams::default();
        assert!(field.contains(Coordinate::new(-57.0, 38.0)));
        assert!(!field.contains(Coordinate::new(60.0, 0.0)));
        assert!(!field.contains(Coordinate::new(f64::NAN, 0.0)));
    }
}
