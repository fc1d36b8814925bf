//! Pareto ranking — non-dominated fronts and crowding over the campaign
//! objectives.

use std::cmp::Ordering;

/// Number of campaign objectives.
pub const OBJECTIVE_COUNT: usize = 4;

/// Fitness of one evaluated candidate.  Higher is better on every axis.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Fitness {
    /// Confirmed novel violations summed over all scenarios.
    pub confirmed_novel: f64,
    /// Distinct violation kinds observed.
    pub distinct_kinds: f64,
    /// Planning branch decisions taken (code-path proxy).
    pub branch_count: f64,
    /// Trajectory sinuosity (behavior-variety proxy).
    pub sinuosity: f64,
}

impl Fitness {
    /// The objective vector, in a fixed axis order.
    pub fn objectives(&self) -> [f64; OBJECTIVE_COUNT] {
        [
            self.confirmed_novel,
            self.distinct_kinds,
            self.branch_count,
            self.sinuosity,
        ]
    }
}

/// Whether `a` Pareto-dominates `b`: no objective worse, at least one
/// strictly better.
pub fn dominates(a: &Fitness, b: &Fitness) -> bool {
    let (a, b) = (a.objectives(), b.objectives());
    let mut strictly_better = false;
    for axis in 0..OBJECTIVE_COUNT {
        if a[axis] < b[axis] {
            return false;
        }
        if a[axis] > b[axis] {
            strictly_better = true;
        }
    }
    strictly_better
}

/// Split indices `0..fitness.len()` into non-dominated fronts, best first.
///
/// Front 0 is the set nothing dominates; front k is what becomes
/// non-dominated once fronts `0..k` are removed.  Pairwise comparison,
/// quadratic in the population size, which stays small here.
pub fn non_dominated_sort(fitness: &[Fitness]) -> Vec<Vec<usize>> {
    let n = fitness.len();
    let mut dominated_by: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut domination_count = vec![0usize; n];

    for i in 0..n {
        for j in 0..n {
            if i == j {
                continue;
            }
            if dominates(&fitness[i], &fitness[j]) {
                dominated_by[i].push(j);
            } else if dominates(&fitness[j], &fitness[i]) {
                domination_count[i] += 1;
            }
        }
    }

    let mut fronts: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = (0..n).filter(|&i| domination_count[i] == 0).collect();
    while !current.is_empty() {
        let mut next = Vec::new();
        for &i in &current {
            for &j in &dominated_by[i] {
                domination_count[j] -= 1;
                if domination_count[j] == 0 {
                    next.push(j);
                }
            }
        }
        fronts.push(std::mem::take(&mut current));
        current = next;
    }
    fronts
}

/// Crowding distance of every member of one front, in front order.
///
/// Each objective contributes the normalized gap between a member's two
/// sorted neighbors; the extreme member on any axis gets infinity so
/// objective-space boundaries are always kept.
pub fn crowding_distance(fitness: &[Fitness], front: &[usize]) -> Vec<f64> {
    let n = front.len();
    if n <= 2 {
        return vec![f64::INFINITY; n];
    }
    let mut distance = vec![0.0f64; n];

    for axis in 0..OBJECTIVE_COUNT {
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| {
            let (a, b) = (
                fitness[front[a]].objectives()[axis],
                fitness[front[b]].objectives()[axis],
            );
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        });

        distance[order[0]] = f64::INFINITY;
        distance[order[n - 1]] = f64::INFINITY;

        let low = fitness[front[order[0]]].objectives()[axis];
        let high = fitness[front[order[n - 1]]].objectives()[axis];
        let span = high - low;
        if span <= f64::EPSILON {
            continue;
        }
        for k in 1..n - 1 {
            let gap = fitness[front[order[k + 1]]].objectives()[axis]
                - fitness[front[order[k - 1]]].objectives()[axis];
            distance[order[k]] += gap / span;
        }
    }
    distance
}

/// Full survivor order: by front first, by descending crowding within a
/// front.  Truncating this order to a target size is the selection rule.
pub fn pareto_order(fitness: &[Fitness]) -> Vec<usize> {
    let mut order = Vec::with_capacity(fitness.len());
    for front in non_dominated_sort(fitness) {
        let distance = crowding_distance(fitness, &front);
        let mut within: Vec<usize> = (0..front.len()).collect();
        within.sort_by(|&a, &b| distance[b].partial_cmp(&distance[a]).unwrap_or(Ordering::Equal));
        order.extend(within.into_iter().map(|k| front[k]));
    }
    order
}
