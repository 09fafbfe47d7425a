//! Objects tracked in the belief store

use crate::common::types::{Degrees, Tick};
use crate::common::Coordinate;
use crate::error::{CoreError, CoreResult};
use crate::perception::sensors::{
    BodySense, ChangeRates, LandmarkSighting, ObjectSighting, PlayerSighting, ViewQuality, ViewWidth,
};
use std::collections::BTreeMap;

/// Read-only map from landmark id to field coordinate
#[derive(Debug, Clone)]
pub struct LandmarkTable {
    entries: BTreeMap<String, Coordinate>,
}

impl LandmarkTable {
    pub fn new(entries: BTreeMap<String, Coordinate>) -> Self {
        LandmarkTable { entries }
    }

    pub fn position_of(&self, id: &str) -> CoreResult<Coordinate> {
        self.entries
            .get(id)
            .copied()
            .ok_or_else(|| CoreError::UnknownReference(id.to_string()))
    }

    pub fn observe(&self, sighting: &LandmarkSighting) -> CoreResult<LandmarkObservation> {
        Ok(LandmarkObservation {
            id: sighting.id.clone(),
            position: self.position_of(&sighting.id)?,
            distance: sighting.distance,
            direction: sighting.direction,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A landmark sighting joined with the landmark's known position
#[derive(Debug, Clone, PartialEq)]
pub struct LandmarkObservation {
    pub id: String,
    pub position: Coordinate,
    pub distance: Option<f64>,
    /// Relative to the head
    pub direction: Degrees,
}

/// Velocity of an object relative to the observer, rotated into field
/// orientation, from the server's distance and direction change rates
fn velocity_from_change(
    distance: f64,
    direction: Degrees,
    change: ChangeRates,
    face: Degrees,
) -> Coordinate {
    let radial = Coordinate::from_polar(1.0, direction);
    let tangential = Coordinate::new(-radial.y, radial.x);
    let relative = radial * change.distance_change
        + tangential * (change.direction_change.to_radians() * distance);
    relative.rotated(face)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservedBall {
    pub distance: f64,
    pub direction: Degrees,
    pub change: Option<ChangeRates>,
    /// Neck angle at the time of the sighting
    pub neck_angle: Degrees,
    /// Field coordinate, once the observer's pose was known
    pub position: Option<Coordinate>,
    pub velocity: Option<Coordinate>,
}

impl ObservedBall {
    pub fn from_sighting(sighting: ObjectSighting) -> Self {
        ObservedBall {
            distance: sighting.distance,
            direction: sighting.direction,
            change: sighting.change,
            neck_angle: 0.0,
            position: None,
            velocity: None,
        }
    }

    /// Offset from the observer in field orientation
    pub fn relative(&self, face: Degrees) -> Coordinate {
        Coordinate::from_polar(self.distance, face + self.direction)
    }

    pub(crate) fn resolve(
        &mut self,
        observer: Coordinate,
        face: Degrees,
        own_velocity: Coordinate,
        previous: Option<(Coordinate, Tick)>,
        seen_at: Tick,
    ) {
        let position = observer + self.relative(face);
        self.position = Some(position);
        self.velocity = match (self.change, previous) {
            (Some(change), _) => {
                Some(velocity_from_change(self.distance, self.direction, change, face) + own_velocity)
            }
            (None, Some((earlier, tick))) if tick < seen_at => {
                Some((position - earlier) * (1.0 / f64::from(seen_at - tick)))
            }
            _ => None,
        };
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObservedPlayer {
    pub team: Option<String>,
    pub unum: Option<u8>,
    pub goalie: bool,
    pub distance: f64,
    pub direction: Degrees,
    pub change: Option<ChangeRates>,
    pub position: Option<Coordinate>,
    pub velocity: Option<Coordinate>,
}

impl ObservedPlayer {
    pub fn from_sighting(sighting: &PlayerSighting) -> Self {
        ObservedPlayer {
            team: sighting.team.clone(),
            unum: sighting.unum,
            goalie: sighting.goalie,
            distance: sighting.sighting.distance,
            direction: sighting.sighting.direction,
            change: sighting.sighting.change,
            position: None,
            velocity: None,
        }
    }

    pub(crate) fn resolve(&mut self, observer: Coordinate, face: Degrees, own_velocity: Coordinate) {
        self.position = Some(observer + Coordinate::from_polar(self.distance, face + self.direction));
        self.velocity = self
            .change
            .map(|change| velocity_from_change(self.distance, self.direction, change, face) + own_velocity);
    }
}

/// The agent's own body, as last confirmed or as predicted on dispatch
#[derive(Debug, Clone, PartialEq)]
pub struct AgentBodyState {
    pub speed: f64,
    pub stamina: f64,
    pub effort: f64,
    /// Head relative to body
    pub neck_angle: Degrees,
    pub view_width: ViewWidth,
    pub view_quality: ViewQuality,
    pub kick_count: u32,
    pub dash_count: u32,
    pub turn_count: u32,
    /// Realized turn dispatched since the heading was last confirmed
    pub pending_turn: Degrees,
    pub confirmed_at: Option<Tick>,
}

impl Default for AgentBodyState {
    fn default() -> Self {
        AgentBodyState {
            speed: 0.0,
            stamina: 8000.0,
            effort: 1.0,
            neck_angle: 0.0,
            view_width: ViewWidth::Normal,
            view_quality: ViewQuality::High,
            kick_count: 0,
            dash_count: 0,
            turn_count: 0,
            pending_turn: 0.0,
            confirmed_at: None,
        }
    }
}

impl AgentBodyState {
    pub(crate) fn confirm(&mut self, sense: &BodySense) {
        self.speed = sense.speed;
        self.stamina = sense.stamina;
        self.effort = sense.effort;
        self.neck_angle = sense.head_angle;
        self.view_width = sense.view_width;
        self.view_quality = sense.view_quality;
        self.kick_count = sense.kick_count;
        self.dash_count = sense.dash_count;
        self.turn_count = sense.turn_count;
        self.confirmed_at = Some(sense.tick);
    }
}
