//! Angle arithmetic in degrees
//!
//! The canonical convention is signed, `(-180, 180]`. Differences always
//! return the shortest rotation between two directions.

use super::types::Degrees;

const SLOP: f64 = 1e-9;

/// Canonicalize to `(-180, 180]`
pub fn normalize_deg(angle: Degrees) -> Degrees {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped > 180.0 {
        wrapped - 360.0
    } else {
        wrapped
    }
}

/// Canonicalize to `[0, 360)`
pub fn full_circle_deg(angle: Degrees) -> Degrees {
    let wrapped = angle.rem_euclid(360.0);
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Signed minimal rotation taking `from` onto `to`
pub fn angle_diff(from: Degrees, to: Degrees) -> Degrees {
    normalize_deg(to - from)
}

/// Mean of a set of directions that respects the 0/360 seam.
///
/// Looks for the largest subset of `angles` that fits inside a window of
/// `cluster_tolerance` on either side of some representative direction.
/// Returns `None` unless that subset reaches a quorum of `ceil(n/2) + 1`
/// (the sole value when `n == 1`). The result is the arithmetic mean of the
/// winning subset after unwrapping it around its first member.
pub fn circular_mean(angles: &[Degrees], cluster_tolerance: Degrees) -> Option<Degrees> {
    match angles.len() {
        0 => return None,
        1 => return Some(normalize_deg(angles[0])),
        _ => {}
    }

    let quorum = angles.len().div_ceil(2) + 1;
    let window = 2.0 * cluster_tolerance.abs();

    let mut best: Vec<Degrees> = Vec::new();
    for &start in angles {
        // Every window of the optimal cluster can be slid until its lower edge
        // touches a member, so trying each member as the lower edge suffices.
        let members: Vec<Degrees> = angles
            .iter()
            .map(|&angle| full_circle_deg(angle - start))
            .filter(|&offset| offset <= window + SLOP)
            .map(|offset| start + offset)
            .collect();

        if members.len() > best.len() {
            best = members;
            if best.len() == angles.len() {
                break;
            }
        }
    }

    if best.len() < quorum {
        return None;
    }

    let mean = best.iter().sum::<f64>() / best.len() as f64;
    Some(normalize_deg(mean))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_into_signed_range() {
        assert_eq!(normalize_deg(190.0), -170.0);
        assert_eq!(normalize_deg(-190.0), 170.0);
        assert_eq!(normalize_deg(180.0), 180.0);
        assert_eq!(normalize_deg(-180.0), 180.0);
        assert_eq!(normalize_deg(720.0), 0.0);
    }

    #[test]
    fn diff_takes_the_short_way_round() {
        assert!((angle_diff(350.0, 10.0) - 20.0).abs() < 1e-9);
        assert!((angle_diff(10.0, 350.0) + 20.0).abs() < 1e-9);
        assert!((angle_diff(-170.0, 170.0) + 20.0).abs() < 1e-9);
    }

    #[test]
    fn mean_wraps_around_zero() {
        let mean = circular_mean(&[358.0, 2.0, 4.0], 3.0).unwrap();
        assert!((mean - 4.0 / 3.0).abs() < 1e-6, "mean was {}", mean);

        let naive = (358.0 + 2.0 + 4.0) / 3.0;
        assert!((naive - mean).abs() > 100.0);
    }

    #[test]
    fn mean_ignores_outliers_when_quorum_holds() {
        let mean = circular_mean(&[10.0, 11.0, 12.0, 13.0, 100.0], 2.0).unwrap();
        assert!((mean - 11.5).abs() < 1e-6);
    }

    #[test]
    fn mean_without_quorum_is_none() {
        assert_eq!(circular_mean(&[0.0, 90.0, 180.0], 3.0), None);
        assert_eq!(circular_mean(&[0.0, 45.0], 3.0), None);
        assert_eq!(circular_mean(&[], 3.0), None);
    }

    #[test]
    fn single_angle_is_its_own_mean() {
        assert_eq!(circular_mean(&[270.0], 3.0), Some(-90.0));
    }
}
