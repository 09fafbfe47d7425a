use pitch_core::common::angle::circular_mean;
use pitch_core::common::Coordinate;
use pitch_core::config::{FieldParams, LocalizationParams};
use pitch_core::error::CoreError;
use pitch_core::perception::localization::{trilaterate, Localizer};
use pitch_core::world::LandmarkObservation;
use proptest::prelude::*;

fn candidates(first: (Coordinate, f64), second: (Coordinate, f64)) -> Vec<Coordinate> {
    trilaterate(first, second, 0.5)
        .expect("distinct landmarks")
        .points()
}

fn has_near(points: &[Coordinate], expected: Coordinate, tolerance: f64) -> bool {
    points
        .iter()
        .any(|point| point.distance_to(&expected) <= tolerance)
}

#[test]
fn horizontally_aligned_landmarks() {
    let points = candidates((Coordinate::new(10.0, 15.0), 11.5), (Coordinate::new(40.0, 15.0), 21.5));
    assert!(has_near(&points, Coordinate::new(19.535, 21.475), 0.1), "{:?}", points);
}

#[test]
fn landmarks_left_of_center() {
    let points = candidates((Coordinate::new(-40.0, 0.0), 22.36), (Coordinate::new(-10.0, 0.0), 14.14));
    assert!(has_near(&points, Coordinate::new(-20.0, 10.0), 0.1), "{:?}", points);
}

#[test]
fn rotated_landmark_pair() {
    let points = candidates((Coordinate::new(5.0, 5.0), 11.18), (Coordinate::new(-15.0, -10.0), 15.81));
    assert!(has_near(&points, Coordinate::new(0.0, -5.0), 0.1), "{:?}", points);
}

#[test]
fn coincident_landmarks_are_degenerate() {
    let mark = Coordinate::new(0.0, 34.0);
    let result = trilaterate((mark, 5.0), (mark, 6.0), 0.5);
    assert!(matches!(result, Err(CoreError::DegenerateGeometry(_))));
}

#[test]
fn one_landmark_leaves_position_unknown() {
    let localizer = Localizer::new(LocalizationParams::default(), FieldParams::default(), 1.05);
    let observations = vec![LandmarkObservation {
        id: "c".to_string(),
        position: Coordinate::ORIGIN,
        distance: Some(10.0),
        direction: 0.0,
    }];
    let result = localizer.estimate_position(&observations, None, 1);
    assert!(matches!(result, Err(CoreError::AmbiguousEstimate(_))));
}

#[test]
fn circular_mean_across_zero() {
    let mean = circular_mean(&[358.0, 2.0, 4.0], 3.0).unwrap();
    assert!((mean - 4.0 / 3.0).abs() < 0.01, "mean was {}", mean);
}

proptest! {
    #[test]
    fn trilateration_ignores_landmark_order(
        ax in -50.0f64..50.0, ay in -35.0f64..35.0,
        bx in -50.0f64..50.0, by in -35.0f64..35.0,
        px in -50.0f64..50.0, py in -35.0f64..35.0,
    ) {
        let a = Coordinate::new(ax, ay);
        let b = Coordinate::new(bx, by);
        let truth = Coordinate::new(px, py);
        prop_assume!(a.distance_to(&b) > 1.0);

        let first = (a, a.distance_to(&truth));
        let second = (b, b.distance_to(&truth));
        let forward = candidates(first, second);
        let backward = candidates(second, first);

        prop_assert!(!forward.is_empty());
        for point in &forward {
            prop_assert!(has_near(&backward, *point, 1e-4));
        }
        for point in &backward {
            prop_assert!(has_near(&forward, *point, 1e-4));
        }
        prop_assert!(has_near(&forward, truth, 1e-3));
    }
}
