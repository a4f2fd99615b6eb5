use crate::core::utils::geometry::segments_cross;
use itertools::Itertools;
use nalgebra::Vector3;
use std::collections::BTreeMap;
use tracing::debug;

/// Endpoints closer than this are treated as a shared node when testing for crossings.
pub const CROSSING_TOLERANCE: f64 = 0.01;

/// Whether the links `first` and `second` cross in the x-y plane.
#[inline]
fn links_cross(first: (usize, usize), second: (usize, usize), positions: &[Vector3<f64>]) -> bool {
    segments_cross(
        &positions[first.0],
        &positions[first.1],
        &positions[second.0],
        &positions[second.1],
        CROSSING_TOLERANCE,
    )
}

/// All pairs of links that cross, as pairs of links in input order.
pub fn crossing_pairs(
    links: &[(usize, usize)],
    positions: &[Vector3<f64>],
) -> Vec<((usize, usize), (usize, usize))> {
    links
        .iter()
        .copied()
        .tuple_combinations()
        .filter(|&(first, second)| links_cross(first, second, positions))
        .collect()
}

/// Whether the segment between nodes `a` and `b` crosses any of `links`.
pub fn crosses_any(
    a: usize,
    b: usize,
    links: &[(usize, usize)],
    positions: &[Vector3<f64>],
) -> bool {
    links
        .iter()
        .any(|&link| links_cross((a, b), link, positions))
}

/// Picks links to remove until no two remaining links cross.
///
/// Each round removes the link involved in the most crossing pairs; ties go to the
/// smallest `(lower, higher)` pair. Only pairs that do not involve the removed link
/// survive into the next round.
///
/// # Return
///
/// The removed links in removal order.
pub fn greedy_uncrossing(links: &[(usize, usize)], positions: &[Vector3<f64>]) -> Vec<(usize, usize)> {
    let mut conflicts = crossing_pairs(links, positions);
    let mut removed = Vec::new();

    while !conflicts.is_empty() {
        let mut counts: BTreeMap<(usize, usize), usize> = BTreeMap::new();
        for &(first, second) in &conflicts {
            *counts.entry(first).or_default() += 1;
            *counts.entry(second).or_default() += 1;
        }
        // Reversed so that `max_by_key`, which keeps the last maximum, lands on the smallest key.
        let Some((&worst, &count)) = counts.iter().rev().max_by_key(|&(_, &c)| c) else {
            break;
        };
        debug!(link = ?worst, crossings = count, "Removing crossing link.");
        conflicts.retain(|&(first, second)| first != worst && second != worst);
        removed.push(worst);
    }
    removed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planar(coords: &[(f64, f64)]) -> Vec<Vector3<f64>> {
        coords.iter().map(|&(x, y)| Vector3::new(x, y, 0.0)).collect()
    }

    #[test]
    fn crossing_diagonals_are_detected() {
        let positions = planar(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let links = [(0, 2), (1, 3), (0, 1)];
        assert_eq!(crossing_pairs(&links, &positions), vec![((0, 2), (1, 3))]);
    }

    #[test]
    fn links_sharing_a_node_never_cross() {
        let positions = planar(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]);
        assert!(crossing_pairs(&[(0, 1), (0, 2), (1, 2)], &positions).is_empty());
    }

    #[test]
    fn greedy_uncrossing_removes_the_link_in_most_crossings() {
        // Link (0, 1) is a long horizontal bar crossed by the two verticals (2, 3) and
        // (4, 5); the short link (6, 7) crosses nothing.
        let positions = planar(&[
            (0.0, 0.0),
            (3.0, 0.0),
            (1.0, -1.0),
            (1.0, 1.0),
            (2.0, -1.0),
            (2.0, 1.0),
            (5.0, 5.0),
            (6.0, 5.0),
        ]);
        let links = [(0, 1), (2, 3), (4, 5), (6, 7)];
        assert_eq!(crossing_pairs(&links, &positions).len(), 2);
        assert_eq!(greedy_uncrossing(&links, &positions), vec![(0, 1)]);
    }

    #[test]
    fn greedy_uncrossing_breaks_ties_by_smallest_link() {
        let positions = planar(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert_eq!(greedy_uncrossing(&[(1, 3), (0, 2)], &positions), vec![(0, 2)]);
    }

    #[test]
    fn crosses_any_checks_candidate_against_existing_links() {
        let positions = planar(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        assert!(crosses_any(1, 3, &[(0, 2)], &positions));
        assert!(!crosses_any(0, 1, &[(0, 2), (2, 3)], &positions));
    }
}
