//! Long-horizon strategy handoff
//!
//! A [`StrategyAdvisor`] may take arbitrarily long, so it runs on a blocking
//! task while the decision loop carries on. At most one request is in flight
//! per agent. Advice comes back through a channel and is picked up on a
//! later cycle.

use crate::common::types::{Degrees, Tick};
use crate::common::Coordinate;
use crate::config::{AgentConfig, StrategyParams};
use crate::world::{ObservedPlayer, WorldView};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// What the advisor suggests
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Recommendation {
    MoveTo { position: Coordinate },
    PassTo { unum: u8 },
    Dribble { direction: Degrees },
    DashPower { power: f64 },
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrategyAdvice {
    pub requested_at: Tick,
    pub recommendation: Recommendation,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSnapshot {
    pub unum: u8,
    pub position: Coordinate,
}

impl PlayerSnapshot {
    fn of(player: &ObservedPlayer) -> Option<Self> {
        Some(PlayerSnapshot {
            unum: player.unum?,
            position: player.position?,
        })
    }
}

/// The parts of the world view an advisor gets to see
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategySnapshot {
    pub tick: Tick,
    pub team: String,
    pub unum: Option<u8>,
    pub position: Option<Coordinate>,
    pub heading: Option<Degrees>,
    pub stamina: f64,
    pub dash_count: u32,
    pub ball: Option<Coordinate>,
    /// Identified player with the ball at their feet
    pub possessor: Option<PlayerSnapshot>,
    pub teammates: Vec<PlayerSnapshot>,
    pub opponents: Vec<PlayerSnapshot>,
}

impl StrategySnapshot {
    pub fn capture(world: &WorldView, config: &AgentConfig) -> Self {
        let now = world.sim_time;
        let max_age = config.planner.ball_max_age;
        let located = |players: Vec<&ObservedPlayer>| {
            players
                .into_iter()
                .filter_map(PlayerSnapshot::of)
                .collect::<Vec<_>>()
        };

        StrategySnapshot {
            tick: now,
            team: config.team_name.clone(),
            unum: world.unum,
            position: world.position.get_copied(now, config.planner.self_max_age),
            heading: world.heading.get_copied(now, config.planner.self_max_age),
            stamina: world.body.stamina,
            dash_count: world.body.dash_count,
            ball: world.ball.get(now, max_age).and_then(|ball| ball.position),
            possessor: world
                .ball_possessor(max_age, config.physics.kickable_margin)
                .and_then(PlayerSnapshot::of),
            teammates: located(world.players_of(&config.team_name, max_age, 0.0)),
            opponents: located(world.opponents_of(&config.team_name, max_age, 0.0)),
        }
    }
}

/// The opaque request handed to an advisor
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyRequest {
    pub requested_at: Tick,
    pub snapshot: serde_json::Value,
}

/// Stand-in for an external long-horizon planner
pub trait StrategyAdvisor: Send + Sync + 'static {
    fn name(&self) -> &str;

    /// Blocking. `Ok(None)` when there is no advice for this situation.
    fn advise(&self, request: &StrategyRequest) -> anyhow::Result<Option<Recommendation>>;
}

/// Picks a dash power from the current stamina band
#[derive(Debug, Clone)]
pub struct StaminaAdvisor {
    /// Dash power per thousand stamina points
    pub powers: Vec<f64>,
}

impl Default for StaminaAdvisor {
    fn default() -> Self {
        StaminaAdvisor {
            powers: vec![30.0, 40.0, 50.0, 60.0, 70.0, 80.0, 90.0, 100.0, 100.0],
        }
    }
}

impl StrategyAdvisor for StaminaAdvisor {
    fn name(&self) -> &str {
        "stamina"
    }

    fn advise(&self, request: &StrategyRequest) -> anyhow::Result<Option<Recommendation>> {
        let snapshot: StrategySnapshot = serde_json::from_value(request.snapshot.clone())?;
        let band = (snapshot.stamina.max(0.0) / 1000.0).floor() as usize;
        let power = self
            .powers
            .get(band)
            .or_else(|| self.powers.last())
            .copied();
        Ok(power.map(|power| Recommendation::DashPower { power }))
    }
}

/// Runs advisors in the background and collects their advice
pub struct StrategyCoordinator {
    advisor: Arc<dyn StrategyAdvisor>,
    params: StrategyParams,
    in_flight: Arc<AtomicBool>,
    results_tx: mpsc::UnboundedSender<StrategyAdvice>,
    results_rx: mpsc::UnboundedReceiver<StrategyAdvice>,
    last_request: Option<Tick>,
    missed_ticks: u64,
    current: Option<StrategyAdvice>,
}

impl StrategyCoordinator {
    pub fn new(advisor: Arc<dyn StrategyAdvisor>, params: StrategyParams) -> Self {
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        StrategyCoordinator {
            advisor,
            params,
            in_flight: Arc::new(AtomicBool::new(false)),
            results_tx,
            results_rx,
            last_request: None,
            missed_ticks: 0,
            current: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.params.enabled
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Cycles that passed while a request was in flight
    pub fn missed_ticks(&self) -> u64 {
        self.missed_ticks
    }

    /// Start a request unless one is running or the last one was too recent.
    /// Returns whether a request was started.
    pub fn maybe_request(&mut self, snapshot: &StrategySnapshot) -> bool {
        if !self.params.enabled || self.in_flight() {
            return false;
        }
        let now = snapshot.tick;
        if self
            .last_request
            .is_some_and(|tick| now.saturating_sub(tick) < self.params.request_interval)
        {
            return false;
        }

        let Ok(handle) = Handle::try_current() else {
            warn!("no async runtime, strategy request skipped");
            return false;
        };
        let snapshot = match serde_json::to_value(snapshot) {
            Ok(value) => value,
            Err(err) => {
                warn!("could not serialize strategy snapshot: {}", err);
                return false;
            }
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return false;
        }
        self.last_request = Some(now);

        let request = StrategyRequest {
            requested_at: now,
            snapshot,
        };
        let advisor = Arc::clone(&self.advisor);
        let in_flight = Arc::clone(&self.in_flight);
        let results = self.results_tx.clone();
        debug!(tick = now, advisor = advisor.name(), "strategy requested");

        handle.spawn_blocking(move || {
            match advisor.advise(&request) {
                Ok(Some(recommendation)) => {
                    let _ = results.send(StrategyAdvice {
                        requested_at: request.requested_at,
                        recommendation,
                    });
                }
                Ok(None) => debug!(tick = request.requested_at, "no strategy advice"),
                Err(err) => warn!(tick = request.requested_at, "strategy advisor failed: {:#}", err),
            }
            in_flight.store(false, Ordering::SeqCst);
        });
        true
    }

    fn is_fresh(&self, advice: &StrategyAdvice, now: Tick) -> bool {
        match self.params.max_result_age {
            Some(max_age) => now.saturating_sub(advice.requested_at) <= max_age,
            None => true,
        }
    }

    /// Collect finished advice; call once per cycle
    pub fn poll(&mut self, now: Tick) -> Option<&StrategyAdvice> {
        if self.in_flight() {
            self.missed_ticks += 1;
        }
        while let Ok(advice) = self.results_rx.try_recv() {
            if self.is_fresh(&advice, now) {
                debug!(tick = now, requested_at = advice.requested_at, "strategy advice received");
                self.current = Some(advice);
            } else {
                debug!(tick = now, requested_at = advice.requested_at, "stale strategy advice dropped");
            }
        }
        if self
            .current
            .as_ref()
            .is_some_and(|advice| !self.is_fresh(advice, now))
        {
            self.current = None;
        }
        self.current.as_ref()
    }
}
