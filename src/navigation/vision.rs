//! Where to look and how wide
//!
//! The head follows the ball every tick. After a run of ball tracking it
//! sweeps once towards the compass sector it has not looked at for the
//! longest time.

use crate::common::angle::{angle_diff, full_circle_deg, normalize_deg};
use crate::common::types::{Degrees, Tick};
use crate::config::VisionParams;
use crate::perception::sensors::ViewWidth;

/// What the head should do this tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Gaze {
    /// Field direction to face
    pub face: Option<Degrees>,
    pub width: ViewWidth,
    pub sweeping: bool,
}

/// Inputs for one gaze decision
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeInput {
    pub now: Tick,
    /// Current face direction, if the heading is known
    pub face: Option<Degrees>,
    /// Field direction and distance of the ball, with the tick it was seen
    pub ball: Option<(Degrees, f64, Tick)>,
    /// Age of the own position estimate
    pub self_age: Option<Tick>,
}

#[derive(Debug, Clone)]
pub struct VisionPlanner {
    params: VisionParams,
    last_viewed: Vec<Option<Tick>>,
    tracking_ticks: Tick,
}

impl VisionPlanner {
    pub fn new(params: VisionParams) -> Self {
        let sectors = params.sectors.max(1);
        VisionPlanner {
            params,
            last_viewed: vec![None; sectors],
            tracking_ticks: 0,
        }
    }

    fn sector_width(&self) -> Degrees {
        360.0 / self.last_viewed.len() as f64
    }

    pub fn sector_of(&self, direction: Degrees) -> usize {
        let index = (full_circle_deg(direction) / self.sector_width()) as usize;
        index.min(self.last_viewed.len() - 1)
    }

    fn sector_center(&self, sector: usize) -> Degrees {
        normalize_deg((sector as f64 + 0.5) * self.sector_width())
    }

    /// Mark every sector the current view cone covers
    pub fn mark_viewed(&mut self, face: Degrees, width: ViewWidth, now: Tick) {
        let half = self.cone(width) / 2.0;
        for sector in 0..self.last_viewed.len() {
            let center = self.sector_center(sector);
            if angle_diff(face, center).abs() <= half {
                self.last_viewed[sector] = Some(now);
            }
        }
        let own = self.sector_of(face);
        self.last_viewed[own] = Some(now);
    }

    pub fn last_viewed(&self, sector: usize) -> Option<Tick> {
        self.last_viewed.get(sector).copied().flatten()
    }

    fn cone(&self, width: ViewWidth) -> Degrees {
        match width {
            ViewWidth::Narrow => self.params.narrow_width,
            ViewWidth::Normal => self.params.normal_width,
            ViewWidth::Wide => self.params.wide_width,
        }
    }

    /// Sector that has gone unseen the longest; never-seen sectors first
    pub fn least_recent_sector(&self) -> usize {
        self.last_viewed
            .iter()
            .enumerate()
            .min_by_key(|(_, tick)| tick.map_or(0, |tick| u64::from(tick) + 1))
            .map(|(sector, _)| sector)
            .unwrap_or(0)
    }

    fn is_stale(&self, now: Tick, seen_at: Option<Tick>) -> bool {
        seen_at.map_or(true, |tick| now.saturating_sub(tick) > self.params.stale_after)
    }

    /// Decide the gaze for this tick
    pub fn decide(&mut self, input: GazeInput, current_width: ViewWidth) -> Gaze {
        if let Some(face) = input.face {
            self.mark_viewed(face, current_width, input.now);
        }

        let ball_seen_at = input.ball.map(|(_, _, tick)| tick);
        let ball_stale = self.is_stale(input.now, ball_seen_at);
        let self_stale = input
            .self_age
            .map_or(true, |age| age > self.params.stale_after);

        let width = match input.ball {
            _ if ball_stale || self_stale => ViewWidth::Wide,
            Some((_, distance, _)) if distance < self.params.narrow_distance => ViewWidth::Narrow,
            _ => ViewWidth::Normal,
        };

        let tracking = match input.ball {
            Some((direction, _, _)) if !ball_stale && self.tracking_ticks < self.params.sweep_interval => {
                Some(direction)
            }
            _ => None,
        };

        match tracking {
            Some(direction) => {
                self.tracking_ticks += 1;
                Gaze {
                    face: Some(direction),
                    width,
                    sweeping: false,
                }
            }
            None => {
                self.tracking_ticks = 0;
                let sector = self.least_recent_sector();
                Gaze {
                    face: Some(self.sector_center(sector)),
                    width,
                    sweeping: true,
                }
            }
        }
    }
}

/// Neck angle, relative to the body, that brings the head to `face`
pub fn neck_for(face: Degrees, body_heading: Degrees) -> Degrees {
    angle_diff(body_heading, face)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planner() -> VisionPlanner {
        VisionPlanner::new(VisionParams::default())
    }

    #[test]
    fn sectors_cover_the_circle() {
        let vision = planner();
        assert_eq!(vision.sector_of(0.0), 0);
        assert_eq!(vision.sector_of(-10.0), 7);
        assert_eq!(vision.sector_of(100.0), 2);
        assert_eq!(vision.sector_of(359.99), 7);
    }

    #[test]
    fn tracks_ball_then_sweeps() {
        let mut vision = planner();
        let mut sweeps = 0;
        for now in 1..=11 {
            let gaze = vision.decide(
                GazeInput {
                    now,
                    face: Some(0.0),
                    ball: Some((0.0, 20.0, now)),
                    self_age: Some(0),
                },
                ViewWidth::Normal,
            );
            if gaze.sweeping {
                sweeps += 1;
                let face = gaze.face.unwrap();
                // Pointed away from the area just watched
                assert!(angle_diff(0.0, face).abs() > 45.0);
            } else {
                assert_eq!(gaze.face, Some(0.0));
                assert_eq!(gaze.width, ViewWidth::Normal);
            }
        }
        assert_eq!(sweeps, 1);
    }

    #[test]
    fn close_ball_narrows_stale_ball_widens() {
        let mut vision = planner();
        let close = vision.decide(
            GazeInput {
                now: 5,
                face: Some(0.0),
                ball: Some((10.0, 3.0, 5)),
                self_age: Some(0),
            },
            ViewWidth::Normal,
        );
        assert_eq!(close.width, ViewWidth::Narrow);

        let stale = vision.decide(
            GazeInput {
                now: 20,
                face: Some(0.0),
                ball: Some((10.0, 3.0, 5)),
                self_age: Some(0),
            },
            ViewWidth::Narrow,
        );
        assert_eq!(stale.width, ViewWidth::Wide);
        assert!(stale.sweeping);
    }

    #[test]
    fn least_recent_sector_prefers_unseen() {
        let mut vision = planner();
        vision.mark_viewed(0.0, ViewWidth::Wide, 3);
        let sector = vision.least_recent_sector();
        assert!(vision.last_viewed(sector).is_none());
        assert_eq!(neck_for(30.0, 10.0), 20.0);
    }
}
