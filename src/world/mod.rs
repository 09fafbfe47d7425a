//! Belief store: everything the agent currently believes about the match
//!
//! The [`WorldView`] is owned by the decision thread and changes only when a
//! whole sensor message is merged or a planned command is dispatched.

pub mod objects;

pub use self::objects::{AgentBodyState, LandmarkObservation, LandmarkTable, ObservedBall, ObservedPlayer};

use crate::common::angle::normalize_deg;
use crate::common::types::{Degrees, Tick};
use crate::common::{Coordinate, Precarious};
use crate::control::kinematics::geometric_sum;
use crate::perception::sensors::{
    BodySense, HearMessage, SeeMessage, SensorMessage, Side,
};
use std::collections::{BTreeMap, VecDeque};
use tracing::debug;

const HEARD_CAPACITY: usize = 16;

/// Identified players are keyed by team name and uniform number
pub type PlayerKey = (String, u8);

/// Aggregate belief state
#[derive(Debug, Clone, Default)]
pub struct WorldView {
    pub sim_time: Tick,
    pub side: Option<Side>,
    pub unum: Option<u8>,
    pub play_mode: String,
    pub position: Precarious<Coordinate>,
    pub heading: Precarious<Degrees>,
    pub body: AgentBodyState,
    pub ball: Precarious<ObservedBall>,
    pub players: BTreeMap<PlayerKey, Precarious<ObservedPlayer>>,
    pub unidentified: Precarious<Vec<ObservedPlayer>>,
    pub landmarks: Precarious<Vec<LandmarkObservation>>,
    pub heard: VecDeque<HearMessage>,
    ball_fixes: VecDeque<(Coordinate, Tick)>,
}

impl WorldView {
    pub fn new() -> Self {
        WorldView::default()
    }

    /// Merge one interpreted sensor message
    pub fn apply(&mut self, message: &SensorMessage, table: &LandmarkTable) {
        if let Some(tick) = message.tick() {
            self.sim_time = self.sim_time.max(tick);
        }

        match message {
            SensorMessage::Init {
                side,
                unum,
                play_mode,
            } => {
                self.side = Some(*side);
                self.unum = Some(*unum);
                self.play_mode = play_mode.clone();
            }
            SensorMessage::Hear(hear) => self.apply_hear(hear),
            SensorMessage::SenseBody(body) => self.apply_body(body),
            SensorMessage::See(see) => self.apply_see(see, table),
        }
    }

    fn apply_hear(&mut self, hear: &HearMessage) {
        match hear {
            HearMessage::Referee { play_mode, .. } => {
                debug!(play_mode = %play_mode, "play mode changed");
                self.play_mode = play_mode.clone();
            }
            HearMessage::SelfEcho { .. } => {}
            HearMessage::Player { .. } => {
                if self.heard.len() == HEARD_CAPACITY {
                    self.heard.pop_front();
                }
                self.heard.push_back(hear.clone());
            }
        }
    }

    fn apply_body(&mut self, sense: &BodySense) {
        self.body.confirm(sense);
    }

    fn apply_see(&mut self, see: &SeeMessage, table: &LandmarkTable) {
        let mut landmarks = Vec::with_capacity(see.landmarks.len());
        for sighting in &see.landmarks {
            match table.observe(sighting) {
                Ok(observation) => landmarks.push(observation),
                Err(err) => debug!(tick = see.tick, "skipping landmark: {}", err),
            }
        }

        let ball = see.ball.map(|sighting| ObservedBall {
            neck_angle: self.body.neck_angle,
            ..ObservedBall::from_sighting(sighting)
        });

        let mut unidentified = Vec::new();
        let mut identified = Vec::new();
        for player in &see.players {
            let observed = ObservedPlayer::from_sighting(player);
            match (&player.team, player.unum) {
                (Some(team), Some(unum)) => identified.push(((team.clone(), unum), observed)),
                _ => unidentified.push(observed),
            }
        }

        // Swap everything in at once so readers never see half a message
        self.landmarks.update(landmarks, see.tick);
        if let Some(ball) = ball {
            self.ball.update(ball, see.tick);
        }
        for (key, observed) in identified {
            self.players
                .entry(key)
                .or_default()
                .update(observed, see.tick);
        }
        self.unidentified.update(unidentified, see.tick);
    }

    /// Direction the head faces, if the heading is fresh enough
    pub fn face_direction(&self, max_age: Tick) -> Option<Degrees> {
        self.heading
            .get_copied(self.sim_time, max_age)
            .map(|heading| normalize_deg(heading + self.body.neck_angle))
    }

    /// Body heading including turns dispatched since the last estimate
    pub fn body_heading(&self, max_age: Tick) -> Option<Degrees> {
        self.heading
            .get_copied(self.sim_time, max_age)
            .map(|heading| normalize_deg(heading + self.body.pending_turn))
    }

    /// Own velocity, assuming the agent moves along its body heading
    pub fn own_velocity(&self, max_age: Tick) -> Coordinate {
        match self.body_heading(max_age) {
            Some(heading) => Coordinate::from_polar(self.body.speed, heading),
            None => Coordinate::ORIGIN,
        }
    }

    /// Attach field coordinates and velocities to the objects of the latest
    /// see message. Needs a self position and heading no older than
    /// `max_age` at the tick the objects were seen.
    pub fn resolve_objects(&mut self, max_age: Tick, velocity_window: Tick) {
        let now = self.sim_time;
        let (Some(position), Some(face)) = (
            self.position.get_copied(now, max_age),
            self.face_direction(max_age),
        ) else {
            return;
        };
        let own_velocity = self.own_velocity(max_age);

        if let Some(seen_at) = self.ball.confirmed_at().filter(|&tick| tick == now) {
            self.ball_fixes.retain(|&(_, tick)| tick < seen_at);
            let previous = self
                .ball_fixes
                .back()
                .copied()
                .filter(|&(_, tick)| seen_at - tick <= velocity_window);

            let mut resolved = None;
            if let Some((ball, _)) = self.ball.latest() {
                let mut ball = ball.clone();
                ball.resolve(position, face, own_velocity, previous, seen_at);
                resolved = Some(ball);
            }
            if let Some(ball) = resolved {
                if let Some(absolute) = ball.position {
                    self.ball_fixes.push_back((absolute, seen_at));
                    while self.ball_fixes.len() > 4 {
                        self.ball_fixes.pop_front();
                    }
                }
                self.ball.update(ball, seen_at);
            }
        }

        for entry in self.players.values_mut() {
            if entry.confirmed_at() != Some(now) {
                continue;
            }
            if let Some((player, tick)) = entry.latest() {
                let mut player = player.clone();
                player.resolve(position, face, own_velocity);
                entry.update(player, tick);
            }
        }

        if self.unidentified.confirmed_at() == Some(now) {
            if let Some((players, tick)) = self.unidentified.latest() {
                let resolved = players
                    .iter()
                    .cloned()
                    .map(|mut player| {
                        player.resolve(position, face, own_velocity);
                        player
                    })
                    .collect();
                self.unidentified.update(resolved, tick);
            }
        }
    }

    /// Ball position relative to the agent in field orientation, projected
    /// to the current tick under the ball decay.
    ///
    /// A ball with a field position is measured from the current own
    /// position. Otherwise the sighting is turned by the head direction it
    /// was taken with.
    pub fn ball_relative(&self, max_age: Tick, self_age: Tick, ball_decay: f64) -> Option<(Coordinate, Coordinate)> {
        let now = self.sim_time;
        let ball = self.ball.get(now, max_age)?;
        let seen_at = self.ball.confirmed_at()?;

        let relative = match (ball.position, self.position.get_copied(now, self_age)) {
            (Some(ball_at), Some(own)) => ball_at - own,
            _ => {
                let heading = self.heading.get_copied(now, self_age)?;
                ball.relative(normalize_deg(heading + ball.neck_angle))
            }
        };
        let velocity = ball.velocity.unwrap_or(Coordinate::ORIGIN);
        let elapsed = now.saturating_sub(seen_at);
        if elapsed == 0 {
            return Some((relative, velocity));
        }

        let travelled = velocity * geometric_sum(ball_decay, elapsed);
        let velocity_now = velocity * ball_decay.powi(elapsed as i32);
        Some((relative + travelled, velocity_now))
    }

    /// Identified players of a team seen within `max_age`, optionally
    /// ignoring those closer than `min_distance` to the agent
    pub fn players_of(&self, team: &str, max_age: Tick, min_distance: f64) -> Vec<&ObservedPlayer> {
        let now = self.sim_time;
        self.players
            .iter()
            .filter(|((name, _), _)| name == team)
            .filter_map(|(_, entry)| entry.get(now, max_age))
            .filter(|player| player.distance >= min_distance)
            .collect()
    }

    /// Identified players of every other team seen within `max_age`
    pub fn opponents_of(&self, team: &str, max_age: Tick, min_distance: f64) -> Vec<&ObservedPlayer> {
        let now = self.sim_time;
        self.players
            .iter()
            .filter(|((name, _), _)| name != team)
            .filter_map(|(_, entry)| entry.get(now, max_age))
            .filter(|player| player.distance >= min_distance)
            .collect()
    }

    /// The player closest to the ball, if within `kickable_margin` of it
    pub fn ball_possessor(&self, max_age: Tick, kickable_margin: f64) -> Option<&ObservedPlayer> {
        let now = self.sim_time;
        let ball = self.ball.get(now, max_age)?.position?;

        self.players
            .values()
            .filter_map(|entry| entry.get(now, max_age))
            .filter_map(|player| player.position.map(|p| (player, p.distance_to(&ball))))
            .filter(|&(_, distance)| distance <= kickable_margin)
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(player, _)| player)
    }

}
