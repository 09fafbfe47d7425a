//! Fixed-interval decision loop
//!
//! The transport side pushes messages into an mpsc channel. Once per cycle
//! the loop drains that channel in arrival order and asks the agent for a
//! single command batch.

use crate::config::SchedulerParams;
use crate::perception::sensors::{SensorMessage, Token};
use std::time::Duration;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// One record handed over by the transport
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// A tokenized record straight from the lexer
    Tokens(Token),
    /// A record that was already interpreted
    Message(SensorMessage),
}

/// Anything the loop can drive
pub trait DecisionLoop {
    fn ingest(&mut self, inbound: Inbound);

    fn next_command_batch(&mut self) -> Vec<String>;
}

/// Tracks how far wall-clock time has run ahead of the nominal cycle
#[derive(Debug, Clone)]
pub struct CycleClock {
    interval: Duration,
    drift: Duration,
    resets: u64,
}

impl CycleClock {
    pub fn new(interval: Duration) -> Self {
        CycleClock {
            interval,
            drift: Duration::ZERO,
            resets: 0,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn drift(&self) -> Duration {
        self.drift
    }

    /// Times the backlog was thrown away after a stall
    pub fn resets(&self) -> u64 {
        self.resets
    }

    /// Account for `elapsed` wall-clock time. Returns true when a cycle is
    /// due. At most one cycle is due per call, however long the stall.
    pub fn on_elapsed(&mut self, elapsed: Duration) -> bool {
        self.drift += elapsed;
        if self.drift < self.interval {
            return false;
        }
        self.drift -= self.interval;
        if self.drift >= self.interval {
            debug!(drift_ms = self.drift.as_millis() as u64, "cycle backlog dropped");
            self.drift = Duration::ZERO;
            self.resets += 1;
        }
        true
    }
}

/// Counters returned when the loop stops
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub cycles: u64,
    pub messages: u64,
    pub resets: u64,
}

/// Drive `agent` until the inbox is closed and drained or nobody listens to
/// the outbox any more.
pub async fn run_agent<A: DecisionLoop + ?Sized>(
    agent: &mut A,
    params: &SchedulerParams,
    mut inbox: mpsc::Receiver<Inbound>,
    outbox: mpsc::Sender<Vec<String>>,
) -> LoopStats {
    let interval = Duration::from_millis(params.interval_ms);
    let poll = Duration::from_millis(params.poll_ms.clamp(1, params.interval_ms.max(1)));
    info!(
        interval_ms = params.interval_ms,
        poll_ms = poll.as_millis() as u64,
        "decision loop started"
    );

    let mut clock = CycleClock::new(interval);
    let mut ticker = time::interval(poll);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut stats = LoopStats::default();
    let mut last = Instant::now();

    loop {
        ticker.tick().await;
        let now = Instant::now();
        let due = clock.on_elapsed(now.duration_since(last));
        last = now;
        if !due {
            continue;
        }

        let mut closed = false;
        loop {
            match inbox.try_recv() {
                Ok(inbound) => {
                    agent.ingest(inbound);
                    stats.messages += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    closed = true;
                    break;
                }
            }
        }

        let batch = agent.next_command_batch();
        stats.cycles += 1;
        if outbox.send(batch).await.is_err() {
            warn!("command receiver dropped, stopping decision loop");
            break;
        }
        if closed {
            info!("transport closed, stopping decision loop");
            break;
        }
    }

    stats.resets = clock.resets();
    info!(cycles = stats.cycles, messages = stats.messages, resets = stats.resets, "decision loop stopped");
    stats
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fires_once_per_interval() {
        let mut clock = CycleClock::new(Duration::from_millis(100));
        let fired = (0..30)
            .filter(|_| clock.on_elapsed(Duration::from_millis(10)))
            .count();
        assert_eq!(fired, 3);
        assert_eq!(clock.resets(), 0);
    }

    #[test]
    fn stall_fires_once_and_drops_backlog() {
        let mut clock = CycleClock::new(Duration::from_millis(100));
        assert!(clock.on_elapsed(Duration::from_millis(650)));
        assert_eq!(clock.drift(), Duration::ZERO);
        assert_eq!(clock.resets(), 1);
        assert!(!clock.on_elapsed(Duration::from_millis(10)));
    }

    #[test]
    fn small_overrun_carries_over() {
        let mut clock = CycleClock::new(Duration::from_millis(100));
        assert!(clock.on_elapsed(Duration::from_millis(130)));
        assert_eq!(clock.drift(), Duration::from_millis(30));
        assert!(clock.on_elapsed(Duration::from_millis(70)));
        assert_eq!(clock.resets(), 0);
    }

    struct Recorder {
        seen: Vec<Inbound>,
    }

    impl DecisionLoop for Recorder {
        fn ingest(&mut self, inbound: Inbound) {
            self.seen.push(inbound);
        }

        fn next_command_batch(&mut self) -> Vec<String> {
            vec![format!("(seen {})", self.seen.len())]
        }
    }

    #[tokio::test]
    async fn drains_inbox_in_order_into_one_batch() {
        let params = SchedulerParams {
            interval_ms: 20,
            poll_ms: 2,
        };
        let (tx, rx) = mpsc::channel(8);
        let (out_tx, mut out_rx) = mpsc::channel(8);
        for name in ["a", "b", "c"] {
            tx.send(Inbound::Tokens(Token::Atom(name.to_string()))).await.unwrap();
        }
        drop(tx);

        let mut agent = Recorder { seen: Vec::new() };
        let stats = run_agent(&mut agent, &params, rx, out_tx).await;

        assert_eq!(stats.cycles, 1);
        assert_eq!(stats.messages, 3);
        assert_eq!(out_rx.recv().await.unwrap(), vec!["(seen 3)".to_string()]);
        assert_eq!(
            agent.seen,
            vec![
                Inbound::Tokens(Token::Atom("a".to_string())),
                Inbound::Tokens(Token::Atom("b".to_string())),
                Inbound::Tokens(Token::Atom("c".to_string())),
            ]
        );
    }
}
