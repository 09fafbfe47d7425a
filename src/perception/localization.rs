//! Localization module
//!
//! Position comes from trilateration against ranged field markers, heading
//! from the bearings to every visible marker once the position is known.

use super::filters::{CircularMeanFilter, ClusterFilter, Filter};
use crate::common::angle::normalize_deg;
use crate::common::geometry::{bearing_from_origin_to, circle_intersections, Intersections};
use crate::common::types::{Degrees, Tick};
use crate::common::Coordinate;
use crate::config::{FieldParams, LocalizationParams};
use crate::error::{CoreError, CoreResult};
use crate::world::LandmarkObservation;
use tracing::debug;

/// A landmark position paired with its measured range
pub type RangedLandmark = (Coordinate, f64);

/// Both circle intersections of a landmark pair.
///
/// Swapping the two landmarks yields the same unordered set of points.
pub fn trilaterate(
    first: RangedLandmark,
    second: RangedLandmark,
    tolerance: f64,
) -> CoreResult<Intersections> {
    let (c1, r1) = first;
    let (c2, r2) = second;
    if c1.distance_to(&c2) <= f64::EPSILON {
        return Err(CoreError::DegenerateGeometry(format!(
            "landmarks coincide at {}",
            c1
        )));
    }
    Ok(circle_intersections(c1, r1, c2, r2, tolerance))
}

/// Previous fix used to rule out implausible jumps
#[derive(Debug, Clone, Copy)]
pub struct PriorFix {
    pub position: Coordinate,
    pub tick: Tick,
}

/// A localizer for the agent
#[derive(Debug, Clone)]
pub struct Localizer {
    params: LocalizationParams,
    field: FieldParams,
    max_speed: f64,
}

impl Localizer {
    /// Create a new localizer
    pub fn new(params: LocalizationParams, field: FieldParams, max_speed: f64) -> Self {
        Localizer {
            params,
            field,
            max_speed,
        }
    }

    pub fn params(&self) -> &LocalizationParams {
        &self.params
    }

    fn is_plausible(&self, candidate: Coordinate, prior: Option<PriorFix>, now: Tick) -> bool {
        if !self.field.contains(candidate) {
            return false;
        }
        match prior {
            Some(fix) => {
                let ticks = now.saturating_sub(fix.tick).max(1);
                let reach = self.max_speed * f64::from(ticks);
                candidate.distance_to(&fix.position) <= reach
            }
            None => true,
        }
    }

    /// Estimate the position seen at `now` from the visible landmarks.
    ///
    /// Fails with [`CoreError::AmbiguousEstimate`] when there is nothing to
    /// commit; the caller keeps its previous estimate in that case.
    pub fn estimate_position(
        &self,
        observations: &[LandmarkObservation],
        prior: Option<PriorFix>,
        now: Tick,
    ) -> CoreResult<Coordinate> {
        let mut ranged: Vec<RangedLandmark> = observations
            .iter()
            .filter_map(|obs| obs.distance.map(|d| (obs.position, d)))
            .collect();

        if ranged.len() < 2 {
            return Err(CoreError::AmbiguousEstimate(format!(
                "{} ranged landmark(s) visible",
                ranged.len()
            )));
        }

        if ranged.len() > self.params.max_landmarks {
            ranged.sort_by(|a, b| a.1.total_cmp(&b.1));
            ranged.truncate(self.params.max_landmarks);
        }

        let prior = prior.filter(|fix| now.saturating_sub(fix.tick) <= self.params.prior_max_age);

        let mut candidates = Vec::with_capacity(ranged.len() * (ranged.len() - 1));
        let mut pairs = 0usize;
        for i in 0..ranged.len() {
            for j in (i + 1)..ranged.len() {
                match trilaterate(ranged[i], ranged[j], self.params.tangent_tolerance) {
                    Ok(points) => {
                        pairs += 1;
                        candidates.extend(points.points());
                    }
                    Err(err) => debug!("skipping landmark pair: {}", err),
                }
            }
        }

        let plausible: Vec<Coordinate> = candidates
            .into_iter()
            .filter(|candidate| self.is_plausible(*candidate, prior, now))
            .collect();

        debug!(
            tick = now,
            landmarks = ranged.len(),
            pairs,
            plausible = plausible.len(),
            "trilateration candidates"
        );

        if ranged.len() == 2 {
            return match plausible.as_slice() {
                [only] => Ok(*only),
                _ => Err(CoreError::AmbiguousEstimate(format!(
                    "{} plausible solutions from two landmarks",
                    plausible.len()
                ))),
            };
        }

        ClusterFilter::new(self.params.cluster_tolerance, pairs.max(1))
            .filter(&plausible)
            .ok_or_else(|| {
                CoreError::AmbiguousEstimate("no agreeing trilateration candidates".to_string())
            })
    }

    /// Estimate the body heading from the bearing of every visible landmark.
    ///
    /// Each landmark votes for the direction the head faces; the neck angle
    /// is then taken off to get the body direction.
    pub fn estimate_heading(
        &self,
        observations: &[LandmarkObservation],
        position: Coordinate,
        neck_angle: Degrees,
    ) -> CoreResult<Degrees> {
        let votes: Vec<Degrees> = observations
            .iter()
            .filter(|obs| obs.position.distance_to(&position) > f64::EPSILON)
            .map(|obs| normalize_deg(bearing_from_origin_to(position, obs.position) - obs.direction))
            .collect();

        CircularMeanFilter::new(self.params.heading_tolerance)
            .filter(&votes)
            .map(|face| normalize_deg(face - neck_angle))
            .ok_or_else(|| {
                CoreError::AmbiguousEstimate(format!("{} heading votes disagree", votes.len()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::geometry::rotate;

    fn localizer() -> Localizer {
        Localizer::new(
            LocalizationParams::default(),
            FieldParams::default(),
            1.05,
        )
    }

    /// Ideal observations of `marks` from `position` with the head facing `face`
    fn observe(position: Coordinate, face: Degrees, marks: &[(f64, f64)]) -> Vec<LandmarkObservation> {
        marks
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                let mark = Coordinate::new(x, y);
                LandmarkObservation {
                    id: format!("m{}", i),
                    position: mark,
                    distance: Some(position.distance_to(&mark)),
                    direction: normalize_deg(bearing_from_origin_to(position, mark) - face),
                }
            })
            .collect()
    }

    #[test]
    fn three_landmarks_agree_on_position() {
        let truth = Coordinate::new(-12.0, 8.0);
        let obs = observe(truth, 30.0, &[(-52.5, 0.0), (0.0, 34.0), (-36.0, 20.16), (0.0, -34.0)]);
        let estimate = localizer().estimate_position(&obs, None, 5).unwrap();
        assert!(estimate.distance_to(&truth) < 1e-6, "estimate {}", estimate);
    }

    #[test]
    fn two_landmarks_need_a_prior_to_disambiguate() {
        let truth = Coordinate::new(0.0, 10.0);
        // Mirror solution (0, -10) is also inside the field
        let obs = observe(truth, 0.0, &[(-20.0, 0.0), (20.0, 0.0)]);
        let loc = localizer();
        assert!(matches!(
            loc.estimate_position(&obs, None, 3),
            Err(CoreError::AmbiguousEstimate(_))
        ));

        let prior = PriorFix {
            position: Coordinate::new(0.5, 9.5),
            tick: 2,
        };
        let estimate = loc.estimate_position(&obs, Some(prior), 3).unwrap();
        assert!(estimate.distance_to(&truth) < 1e-6);
    }

    #[test]
    fn close_mirror_pair_is_still_ambiguous() {
        // Mirrors (0, 1) and (0, -1) are within the cluster tolerance
        let obs = observe(Coordinate::new(0.0, 1.0), 0.0, &[(-20.0, 0.0), (20.0, 0.0)]);
        assert!(matches!(
            localizer().estimate_position(&obs, None, 3),
            Err(CoreError::AmbiguousEstimate(_))
        ));
    }

    #[test]
    fn stale_prior_does_not_constrain() {
        let truth = Coordinate::new(0.0, 10.0);
        let obs = observe(truth, 0.0, &[(-20.0, 0.0), (20.0, 0.0)]);
        let prior = PriorFix {
            position: Coordinate::new(0.0, 10.0),
            tick: 0,
        };
        // Far too old, both mirror solutions are back in play
        assert!(localizer().estimate_position(&obs, Some(prior), 100).is_err());
    }

    #[test]
    fn out_of_field_mirror_is_discarded() {
        let truth = Coordinate::new(40.0, 20.0);
        // Mirror lands at (65, 20), beyond the touch margin
        let obs = observe(truth, 0.0, &[(52.5, 34.0), (52.5, -34.0)]);
        let estimate = localizer().estimate_position(&obs, None, 1).unwrap();
        assert!(estimate.distance_to(&truth) < 1e-6);
    }

    #[test]
    fn heading_from_bearings() {
        let position = Coordinate::new(5.0, -3.0);
        let obs = observe(position, 120.0, &[(52.5, 0.0), (0.0, 34.0), (-52.5, 0.0)]);
        let heading = localizer().estimate_heading(&obs, position, 30.0).unwrap();
        assert!((heading - 90.0).abs() < 1e-6);
    }

    #[test]
    fn rotated_pair_matches_offset() {
        let a = (Coordinate::new(0.0, 0.0), 5.0);
        let b = (rotate(Coordinate::new(8.0, 0.0), 45.0), 5.0);
        let points = trilaterate(a, b, 0.5).unwrap().points();
        assert_eq!(points.len(), 2);
        for point in points {
            assert!((point.distance_to(&a.0) - 5.0).abs() < 1e-9);
            assert!((point.distance_to(&b.0) - 5.0).abs() < 1e-9);
        }
    }

    #[test]
    fn coincident_pair_is_degenerate() {
        let a = (Coordinate::new(1.0, 1.0), 2.0);
        assert!(matches!(
            trilaterate(a, a, 0.5),
            Err(CoreError::DegenerateGeometry(_))
        ));
    }
}
