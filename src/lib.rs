pub mod behaviors;
pub mod common;
pub mod config;
pub mod control;
pub mod error;
pub mod lifecycle;
pub mod navigation;
pub mod perception;
pub mod scheduler;
pub mod world;

use crate::behaviors::{
    Recommendation, StaminaAdvisor, StrategyAdvice, StrategyAdvisor, StrategyCoordinator,
    StrategySnapshot,
};
use crate::common::Coordinate;
use crate::config::AgentConfig;
use crate::control::ControlStack;
use crate::error::{CoreError, CoreResult};
use crate::lifecycle::{bring_down, bring_up, LifecycleNode, State};
use crate::navigation::{NavigationStack, Objective, PassOutcome};
use crate::perception::sensors::{SensorMessage, Side, Token};
use crate::perception::PerceptionStack;
use crate::scheduler::{DecisionLoop, Inbound};
use crate::world::WorldView;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How far ahead of the agent a dribble kick is aimed
const DRIBBLE_DISTANCE: f64 = 5.0;

/// Decision core of one agent
pub struct PitchCore {
    config: Arc<AgentConfig>,
    world: WorldView,
    perception: PerceptionStack,
    control: ControlStack,
    navigation: NavigationStack,
    strategy: StrategyCoordinator,
    last_outcome: PassOutcome,
}

impl PitchCore {
    /// Create a core with the default stamina advisor
    pub fn new(config: AgentConfig) -> Self {
        Self::with_advisor(config, Arc::new(StaminaAdvisor::default()))
    }

    pub fn with_advisor(config: AgentConfig, advisor: Arc<dyn StrategyAdvisor>) -> Self {
        let config = Arc::new(config);
        PitchCore {
            world: WorldView::new(),
            perception: PerceptionStack::new(Arc::clone(&config)),
            control: ControlStack::new(Arc::clone(&config)),
            navigation: NavigationStack::new(Arc::clone(&config)),
            strategy: StrategyCoordinator::new(advisor, config.strategy.clone()),
            config,
            last_outcome: PassOutcome::default(),
        }
    }

    fn components(&mut self) -> [&mut dyn LifecycleNode; 3] {
        [
            &mut self.perception as &mut dyn LifecycleNode,
            &mut self.control,
            &mut self.navigation,
        ]
    }

    /// Configure and activate every stack
    pub fn init(&mut self) -> CoreResult<()> {
        for component in self.components() {
            bring_up(component)?;
        }
        info!(team = %self.config.team_name, "decision core ready");
        Ok(())
    }

    /// Deactivate and clean up every stack, in reverse order
    pub fn shutdown(&mut self) -> CoreResult<()> {
        for component in self.components().into_iter().rev() {
            bring_down(component)?;
        }
        info!("decision core shut down");
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        [
            self.perception.state(),
            self.control.state(),
            self.navigation.state(),
        ]
        .iter()
        .all(|&state| state == State::Active)
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn world(&self) -> &WorldView {
        &self.world
    }

    pub fn control(&self) -> &ControlStack {
        &self.control
    }

    pub fn navigation(&self) -> &NavigationStack {
        &self.navigation
    }

    pub fn strategy(&self) -> &StrategyCoordinator {
        &self.strategy
    }

    /// Outcome of the most recent planning pass
    pub fn last_outcome(&self) -> &PassOutcome {
        &self.last_outcome
    }

    /// Merge one tokenized sensor record. A malformed record is dropped and
    /// the belief state stays as it was.
    pub fn apply_message(&mut self, record: &Token) -> CoreResult<()> {
        self.perception
            .ingest(&mut self.world, record)
            .inspect_err(|err| match err {
                CoreError::MalformedInput(_) => debug!("dropping record: {}", err),
                _ => warn!("dropping record: {}", err),
            })
    }

    pub fn apply_sensor_message(&mut self, message: &SensorMessage) {
        self.perception.ingest_message(&mut self.world, message);
    }

    fn opponent_goal(&self) -> Coordinate {
        let x = self.config.field.half_length;
        match self.world.side {
            Some(Side::Right) => Coordinate::new(-x, 0.0),
            _ => Coordinate::new(x, 0.0),
        }
    }

    fn teammate_position(&self, unum: u8) -> Option<Coordinate> {
        self.world
            .players
            .get(&(self.config.team_name.clone(), unum))
            .and_then(|entry| entry.get(self.world.sim_time, self.config.planner.ball_max_age))
            .and_then(|player| player.position)
    }

    /// Objective and dash power cap for this cycle
    fn choose_objective(&self, advice: Option<&StrategyAdvice>) -> (Objective, f64) {
        let planner = &self.config.planner;
        let mut max_dash_power = self.config.physics.max_power;
        let mut kick_target = self.opponent_goal();

        if self.world.play_mode == "before_kick_off" {
            return (Objective::Hold, max_dash_power);
        }

        match advice.map(|advice| advice.recommendation) {
            Some(Recommendation::MoveTo { position }) => {
                return (Objective::GoTo(position), max_dash_power);
            }
            Some(Recommendation::PassTo { unum }) => match self.teammate_position(unum) {
                Some(teammate) => kick_target = teammate,
                None => debug!(unum, "pass target not in view, shooting instead"),
            },
            Some(Recommendation::Dribble { direction }) => {
                if let Some(position) = self
                    .world
                    .position
                    .get_copied(self.world.sim_time, planner.self_max_age)
                {
                    kick_target = position + Coordinate::from_polar(DRIBBLE_DISTANCE, direction);
                }
            }
            Some(Recommendation::DashPower { power }) => {
                max_dash_power = power.clamp(0.0, self.config.physics.max_power);
            }
            None => {}
        }

        (
            Objective::Intercept {
                kick_target,
                arrival_speed: planner.kick_arrival_speed,
            },
            max_dash_power,
        )
    }

    /// Run one decision pass and return the server commands for this cycle
    pub fn next_command_batch(&mut self) -> Vec<String> {
        if !self.is_active() {
            warn!("decision core is not active, no commands this cycle");
            return Vec::new();
        }
        let now = self.world.sim_time;
        self.perception.update_estimates(&mut self.world);

        if self.strategy.is_enabled() && !self.strategy.in_flight() {
            let snapshot = StrategySnapshot::capture(&self.world, &self.config);
            self.strategy.maybe_request(&snapshot);
        }
        let advice = self.strategy.poll(now).cloned();
        let (objective, max_dash_power) = self.choose_objective(advice.as_ref());
        debug!(tick = now, ?objective, max_dash_power, "objective chosen");

        let outcome = self
            .navigation
            .plan_pass(&self.world, self.control.model(), objective, max_dash_power);
        if let Some(plan) = &outcome.plan {
            self.control.record_clamps(plan.clamps);
        }

        let batch = match &outcome.command {
            Some(command) => self.control.dispatch(&mut self.world, command),
            None => Vec::new(),
        };
        self.last_outcome = outcome;
        batch
    }
}

impl DecisionLoop for PitchCore {
    fn ingest(&mut self, inbound: Inbound) {
        match inbound {
            Inbound::Tokens(record) => {
                // Already logged, the cycle carries on
                let _ = self.apply_message(&record);
            }
            Inbound::Message(message) => self.apply_sensor_message(&message),
        }
    }

    fn next_command_batch(&mut self) -> Vec<String> {
        PitchCore::next_command_batch(self)
    }
}
