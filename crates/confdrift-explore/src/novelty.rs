//! Novelty filtering — deduplicates raw violations against a scenario's
//! baseline corpus and counts determinism-confirmation majorities.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use confdrift_oracle::{Violation, ViolationKind};

/// Reruns per determinism confirmation.
pub const CONFIRM_RUNS: usize = 6;

/// How many of the reruns must reproduce a kind for it to count.
pub const CONFIRM_MAJORITY: usize = 4;

/// The clustering primitive, a black box over numeric feature rows.
///
/// Returns one label per row; negative labels are noise.  The only
/// contract is determinism for a fixed input matrix.
pub trait Clusterer {
    fn cluster(&self, points: &[Vec<f64>]) -> Vec<isize>;
}

/// Density clustering with an automatically chosen neighborhood radius.
///
/// The radius is read off the sorted nearest-neighbor-distance curve: the
/// point of maximum deviation from the curve's chord (its knee), falling
/// back to the median distance when the curve has no knee.
pub struct DensityClusterer {
    /// Minimum neighborhood size for a core point.
    min_points: usize,
}

impl Default for DensityClusterer {
    fn default() -> Self {
        Self { min_points: 2 }
    }
}

const UNVISITED: isize = -2;
const NOISE: isize = -1;

impl Clusterer for DensityClusterer {
    fn cluster(&self, points: &[Vec<f64>]) -> Vec<isize> {
        match points.len() {
            0 => return Vec::new(),
            1 => return vec![0],
            _ => {}
        }

        let mut curve = nearest_neighbor_distances(points);
        curve.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let radius = choose_radius(&curve);

        let mut labels = vec![UNVISITED; points.len()];
        let mut next_cluster = 0isize;
        for i in 0..points.len() {
            if labels[i] != UNVISITED {
                continue;
            }
            let neighbors = neighborhood(points, i, radius);
            if neighbors.len() < self.min_points {
                labels[i] = NOISE;
                continue;
            }

            labels[i] = next_cluster;
            let mut queue: VecDeque<usize> = neighbors.into_iter().collect();
            while let Some(j) = queue.pop_front() {
                if labels[j] == NOISE {
                    // Border point reached through a core point.
                    labels[j] = next_cluster;
                }
                if labels[j] != UNVISITED {
                    continue;
                }
                labels[j] = next_cluster;
                let reachable = neighborhood(points, j, radius);
                if reachable.len() >= self.min_points {
                    queue.extend(reachable);
                }
            }
            next_cluster += 1;
        }
        labels
    }
}

fn euclidean(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// Indices within `radius` of point `i`, inclusive, `i` itself included.
fn neighborhood(points: &[Vec<f64>], i: usize, radius: f64) -> Vec<usize> {
    points
        .iter()
        .enumerate()
        .filter(|(_, q)| euclidean(&points[i], q) <= radius)
        .map(|(j, _)| j)
        .collect()
}

/// Distance from every point to its nearest other point.
fn nearest_neighbor_distances(points: &[Vec<f64>]) -> Vec<f64> {
    points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            points
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .map(|(_, q)| euclidean(p, q))
                .fold(f64::INFINITY, f64::min)
        })
        .collect()
}

/// Pick the clustering radius from an ascending distance curve.
fn choose_radius(curve: &[f64]) -> f64 {
    let n = curve.len();
    if n == 0 {
        return 0.0;
    }
    let median = curve[n / 2];
    if n < 3 {
        return median;
    }

    let first = curve[0];
    let span = curve[n - 1] - first;
    if span <= f64::EPSILON {
        return median;
    }

    let mut knee = 0usize;
    let mut deviation = 0.0f64;
    for (i, &d) in curve.iter().enumerate() {
        let chord = first + span * (i as f64 / (n - 1) as f64);
        if (d - chord).abs() > deviation {
            deviation = (d - chord).abs();
            knee = i;
        }
    }
    if deviation <= f64::EPSILON {
        return median;
    }
    curve[knee]
}

/// Deduplicates candidate violations against a baseline corpus.
pub struct NoveltyFilter {
    clusterer: Box<dyn Clusterer>,
}

impl Default for NoveltyFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl NoveltyFilter {
    pub fn new() -> Self {
        Self {
            clusterer: Box::new(DensityClusterer::default()),
        }
    }

    pub fn with_clusterer(clusterer: Box<dyn Clusterer>) -> Self {
        Self { clusterer }
    }

    /// Whether `candidate` is novel against the baseline violations of the
    /// same kind.
    ///
    /// A matching distinguishing key is never novel, whatever the
    /// features.  Stack failures are deduplicated by key alone, never by
    /// feature similarity.  Everything else joins the baseline feature
    /// matrix, is min-max normalized per column, and is novel iff its
    /// cluster holds no baseline member.
    pub fn is_novel(&self, candidate: &Violation, baseline_of_kind: &[Violation]) -> bool {
        if baseline_of_kind
            .iter()
            .any(|b| b.distinguishing_key == candidate.distinguishing_key)
        {
            return false;
        }
        if candidate.kind.is_stack_failure() || baseline_of_kind.is_empty() {
            return true;
        }

        let columns = feature_columns(baseline_of_kind, candidate);
        if columns.is_empty() {
            return true;
        }
        let mut matrix: Vec<Vec<f64>> = baseline_of_kind
            .iter()
            .map(|v| feature_row(v, &columns))
            .collect();
        matrix.push(feature_row(candidate, &columns));
        normalize_columns(&mut matrix);

        let labels = self.clusterer.cluster(&matrix);
        let Some(&candidate_label) = labels.last() else {
            return true;
        };
        if candidate_label < 0 {
            return true;
        }
        !labels[..labels.len() - 1]
            .iter()
            .any(|&label| label == candidate_label)
    }
}

/// Sorted union of feature names across the baseline and the candidate.
fn feature_columns(baseline: &[Violation], candidate: &Violation) -> Vec<String> {
    let mut names: BTreeSet<&str> = candidate.features.keys().map(String::as_str).collect();
    for violation in baseline {
        names.extend(violation.features.keys().map(String::as_str));
    }
    names.into_iter().map(str::to_string).collect()
}

fn feature_row(violation: &Violation, columns: &[String]) -> Vec<f64> {
    columns
        .iter()
        .map(|column| violation.feature(column).unwrap_or(0.0))
        .collect()
}

/// Min-max normalize each column in place; constant columns collapse to 0.
fn normalize_columns(matrix: &mut [Vec<f64>]) {
    let width = matrix.first().map_or(0, Vec::len);
    for column in 0..width {
        let mut low = f64::INFINITY;
        let mut high = f64::NEG_INFINITY;
        for row in matrix.iter() {
            low = low.min(row[column]);
            high = high.max(row[column]);
        }
        let span = high - low;
        for row in matrix.iter_mut() {
            row[column] = if span <= f64::EPSILON {
                0.0
            } else {
                (row[column] - low) / span
            };
        }
    }
}

/// Retain the violation kinds observed in at least `threshold` of the
/// determinism-confirmation reruns.
pub fn majority_kinds(
    reruns: &[BTreeSet<ViolationKind>],
    threshold: usize,
) -> BTreeSet<ViolationKind> {
    let mut counts: BTreeMap<ViolationKind, usize> = BTreeMap::new();
    for rerun in reruns {
        for &kind in rerun {
            *counts.entry(kind).or_insert(0) += 1;
        }
    }
    counts
        .into_iter()
        .filter(|&(_, count)| count >= threshold)
        .map(|(kind, _)| kind)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comfort(key: &str, peak: f64, duration: f64) -> Violation {
        Violation::new(ViolationKind::Comfort, key)
            .with_feature("peak_mps2", peak)
            .with_feature("duration_s", duration)
    }

    #[test]
    fn test_matching_key_is_never_novel() {
        let filter = NoveltyFilter::new();
        let baseline = vec![comfort("fast-accel:5", 5.1, 0.4)];
        let candidate = comfort("fast-accel:5", 47.0, 12.0);
        assert!(!filter.is_novel(&candidate, &baseline));
    }

    #[test]
    fn test_empty_baseline_is_always_novel() {
        let filter = NoveltyFilter::new();
        assert!(filter.is_novel(&comfort("fast-accel:5", 5.1, 0.4), &[]));
    }

    #[test]
    fn test_stack_failures_dedup_by_key_alone() {
        let filter = NoveltyFilter::new();
        let baseline = vec![
            Violation::new(ViolationKind::StackFailure, "routing-never-received")
                .with_feature("events", 3.0),
        ];

        // Same class: duplicate, however far the features drift.
        let same = Violation::new(ViolationKind::StackFailure, "routing-never-received")
            .with_feature("events", 900.0);
        assert!(!filter.is_novel(&same, &baseline));

        // Different class with near-identical features: still novel.
        let other = Violation::new(ViolationKind::StackFailure, "vehicle-never-moved")
            .with_feature("events", 3.0);
        assert!(filter.is_novel(&other, &baseline));
    }

    #[test]
    fn test_feature_twin_joins_its_baseline_cluster() {
        let filter = NoveltyFilter::new();
        let baseline = vec![
            comfort("fast-accel:5", 5.0, 0.40),
            comfort("fast-accel:5.2", 5.2, 0.45),
            comfort("hard-brake:9", 9.0, 1.20),
            comfort("hard-brake:9.1", 9.1, 1.25),
        ];

        // Identical features to a baseline member under a fresh key: the
        // clustering step must place it with its twin.
        let twin = comfort("fast-accel:5.0b", 5.0, 0.40);
        assert!(!filter.is_novel(&twin, &baseline));
    }

    #[test]
    fn test_distant_outlier_is_novel() {
        let filter = NoveltyFilter::new();
        let baseline = vec![
            comfort("fast-accel:5", 5.0, 0.40),
            comfort("fast-accel:5.1", 5.1, 0.42),
            comfort("fast-accel:5.2", 5.2, 0.44),
        ];
        let outlier = comfort("hard-brake:45", 45.0, 8.0);
        assert!(filter.is_novel(&outlier, &baseline));
    }

    #[test]
    fn test_density_clusterer_separates_two_groups() {
        let clusterer = DensityClusterer::default();
        let points = vec![vec![0.0], vec![0.125], vec![16.0], vec![16.125]];
        let labels = clusterer.cluster(&points);

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[2], labels[3]);
        assert_ne!(labels[0], labels[2]);
        assert!(labels.iter().all(|&l| l >= 0));
    }

    #[test]
    fn test_density_clusterer_marks_lone_outliers_as_noise() {
        let clusterer = DensityClusterer::default();
        let points = vec![vec![0.0], vec![0.0625], vec![0.125], vec![64.0]];
        let labels = clusterer.cluster(&points);

        assert_eq!(labels[0], labels[1]);
        assert_eq!(labels[1], labels[2]);
        assert_eq!(labels[3], NOISE);
    }

    #[test]
    fn test_clustering_is_deterministic() {
        let clusterer = DensityClusterer::default();
        let points = vec![
            vec![0.3, 1.0],
            vec![0.35, 0.9],
            vec![7.0, 7.0],
            vec![7.1, 7.2],
            vec![100.0, 0.0],
        ];
        assert_eq!(clusterer.cluster(&points), clusterer.cluster(&points));
    }

    #[test]
    fn test_majority_boundary_at_four_of_six() {
        let mut reruns: Vec<BTreeSet<ViolationKind>> = Vec::new();
        for i in 0..CONFIRM_RUNS {
            let mut seen = BTreeSet::new();
            if i < 4 {
                seen.insert(ViolationKind::Comfort);
            }
            if i < 3 {
                seen.insert(ViolationKind::Speeding);
            }
            reruns.push(seen);
        }

        let confirmed = majority_kinds(&reruns, CONFIRM_MAJORITY);
        assert!(confirmed.contains(&ViolationKind::Comfort), "4 of 6 passes");
        assert!(
            !confirmed.contains(&ViolationKind::Speeding),
            "3 of 6 fails"
        );
    }
}
