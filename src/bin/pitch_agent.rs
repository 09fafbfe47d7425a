use anyhow::{Context, Result};
use pitch_core::common::angle::normalize_deg;
use pitch_core::common::Coordinate;
use pitch_core::config::AgentConfig;
use pitch_core::perception::sensors::Token;
use pitch_core::scheduler::{run_agent, Inbound};
use pitch_core::PitchCore;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Number of simulated ticks the scripted transport plays back
const SCRIPT_TICKS: u32 = 30;

/// Half of the normal view cone
const HALF_VIEW: f64 = 45.0;

/// A fixed scene: the agent stands still while the ball rolls towards it
struct Script {
    agent: Coordinate,
    heading: f64,
    ball: Coordinate,
    ball_velocity: Coordinate,
    ball_decay: f64,
    landmarks: Vec<(String, Coordinate)>,
}

fn atoms(words: &[&str]) -> Vec<Token> {
    words.iter().map(|word| Token::atom(*word)).collect()
}

fn number(value: f64) -> Token {
    Token::atom(format!("{:.2}", value))
}

impl Script {
    fn new(config: &AgentConfig) -> Self {
        Script {
            agent: Coordinate::new(-20.0, 5.0),
            heading: 0.0,
            ball: Coordinate::new(-10.0, 3.0),
            ball_velocity: Coordinate::new(-0.8, 0.1),
            ball_decay: config.physics.ball_decay,
            landmarks: config
                .landmarks
                .iter()
                .map(|(id, position)| (id.clone(), *position))
                .collect(),
        }
    }

    /// Distance and server-side direction of a point as seen by the agent
    fn polar(&self, point: Coordinate) -> Option<(f64, f64)> {
        let offset = point - self.agent;
        let bearing = normalize_deg(offset.direction() - self.heading);
        (bearing.abs() <= HALF_VIEW).then(|| (offset.magnitude(), -bearing))
    }

    fn name_of(id: &str) -> Vec<Token> {
        match id.strip_prefix('g').filter(|side| *side == "l" || *side == "r") {
            Some(side) => atoms(&["g", side]),
            None => atoms(&["f", id]),
        }
    }

    fn see(&self, tick: u32) -> Token {
        let mut items = vec![Token::atom("see"), Token::atom(tick.to_string())];
        for (id, position) in &self.landmarks {
            if let Some((distance, direction)) = self.polar(*position) {
                let mut entry = vec![Token::list(Self::name_of(id))];
                entry.extend([number(distance), number(direction)]);
                items.push(Token::list(entry));
            }
        }
        if let Some((distance, direction)) = self.polar(self.ball) {
            items.push(Token::list(vec![
                Token::list(atoms(&["b"])),
                number(distance),
                number(direction),
            ]));
        }
        Token::list(items)
    }

    fn sense_body(&self, tick: u32) -> Token {
        Token::list(vec![
            Token::atom("sense_body"),
            Token::atom(tick.to_string()),
            Token::list(atoms(&["view_mode", "high", "normal"])),
            Token::list(atoms(&["stamina", "8000", "1"])),
            Token::list(atoms(&["speed", "0", "0"])),
            Token::list(atoms(&["head_angle", "0"])),
        ])
    }

    fn advance(&mut self) {
        self.ball = self.ball + self.ball_velocity;
        self.ball_velocity = self.ball_velocity * self.ball_decay;
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AgentConfig::load(&path).with_context(|| format!("loading config from {}", path))?,
        None => AgentConfig::default(),
    };
    let scheduler = config.scheduler.clone();
    let interval = Duration::from_millis(scheduler.interval_ms);

    let mut script = Script::new(&config);
    let mut core = PitchCore::new(config);
    core.init().context("bringing up the decision core")?;

    let (inbox_tx, inbox_rx) = mpsc::channel(64);
    let (outbox_tx, mut outbox_rx) = mpsc::channel::<Vec<String>>(16);

    let transport = tokio::spawn(async move {
        let init = Token::list(atoms(&["init", "l", "7", "play_on"]));
        if inbox_tx.send(Inbound::Tokens(init)).await.is_err() {
            return;
        }
        for tick in 1..=SCRIPT_TICKS {
            for record in [script.sense_body(tick), script.see(tick)] {
                if inbox_tx.send(Inbound::Tokens(record)).await.is_err() {
                    warn!("decision loop gone, transport stopping");
                    return;
                }
            }
            script.advance();
            tokio::time::sleep(interval).await;
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(batch) = outbox_rx.recv().await {
            if !batch.is_empty() {
                println!("{}", batch.join(""));
            }
        }
    });

    let stats = run_agent(&mut core, &scheduler, inbox_rx, outbox_tx).await;
    transport.await.context("transport task")?;
    printer.await.context("printer task")?;

    let dispatch = core.control().stats();
    info!(
        cycles = stats.cycles,
        messages = stats.messages,
        commands = dispatch.commands,
        urgent = dispatch.urgent,
        clamped = dispatch.clamped,
        "agent finished"
    );
    core.shutdown().context("shutting down the decision core")?;
    Ok(())
}
