//! Filtering algorithms for noisy estimates

use crate::common::angle::circular_mean;
use crate::common::geometry::centroid;
use crate::common::types::Degrees;
use crate::common::Coordinate;

/// A generic filter interface: many noisy samples in, one estimate out
pub trait Filter<T> {
    type Output;

    /// Reduce the samples, or `None` when they do not agree
    fn filter(&self, samples: &[T]) -> Option<Self::Output>;
}

/// A single candidate never counts as agreement
const MIN_CLUSTER: usize = 2;

/// Largest group of points that agree with one another
#[derive(Debug, Clone)]
pub struct ClusterFilter {
    tolerance: f64,
    /// Stop searching once a cluster this large is found
    max_agreement: usize,
}

impl ClusterFilter {
    pub fn new(tolerance: f64, max_agreement: usize) -> Self {
        ClusterFilter {
            tolerance,
            max_agreement,
        }
    }

    /// Largest group of samples that are all within the tolerance of one
    /// another. Each sample seeds a group that takes the seed's neighbours
    /// nearest first.
    pub fn best_cluster(&self, samples: &[Coordinate]) -> Vec<Coordinate> {
        let mut best: Vec<Coordinate> = Vec::new();

        for (i, seed) in samples.iter().enumerate() {
            let mut neighbours: Vec<&Coordinate> = samples
                .iter()
                .enumerate()
                .filter(|&(j, other)| i != j && seed.distance_to(other) < self.tolerance)
                .map(|(_, other)| other)
                .collect();
            neighbours.sort_by(|a, b| seed.distance_to(a).total_cmp(&seed.distance_to(b)));

            let mut cluster = vec![*seed];
            for other in neighbours {
                if cluster.iter().all(|member| member.distance_to(other) < self.tolerance) {
                    cluster.push(*other);
                }
            }

            if cluster.len() > best.len() {
                best = cluster;
                if best.len() >= self.max_agreement {
                    break;
                }
            }
        }

        best
    }
}

impl Filter<Coordinate> for ClusterFilter {
    type Output = Coordinate;

    fn filter(&self, samples: &[Coordinate]) -> Option<Coordinate> {
        let cluster = self.best_cluster(samples);
        if cluster.len() < MIN_CLUSTER {
            return None;
        }
        centroid(&cluster)
    }
}

/// Wraparound-aware majority mean of directions
#[derive(Debug, Clone)]
pub struct CircularMeanFilter {
    tolerance: Degrees,
}

impl CircularMeanFilter {
    pub fn new(tolerance: Degrees) -> Self {
        CircularMeanFilter { tolerance }
    }
}

impl Filter<Degrees> for CircularMeanFilter {
    type Output = Degrees;

    fn filter(&self, samples: &[Degrees]) -> Option<Degrees> {
        circular_mean(samples, self.tolerance)
    }
}
