use super::delaunay::delaunay_edges;
use crate::core::models::dimension::Dimensionality;
use kiddo::{KdTree, SquaredEuclidean};
use nalgebra::{DVector, Vector3};
use serde::Deserialize;
use std::collections::BTreeSet;

/// How link-addition candidates are found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NeighborSearch {
    /// Pairs adjacent in the Delaunay triangulation of all nodes and sites.
    #[default]
    Delaunay,
    /// Every pair closer than the maximum link distance.
    Radius,
}

/// Neighbor pairs split by link kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NeighborPairs {
    /// Cell–cell pairs as `(lower, higher)`.
    pub cells: Vec<(usize, usize)>,
    /// Cell–substrate pairs as `(cell, site)`.
    pub substrate: Vec<(usize, usize)>,
}

impl NeighborSearch {
    /// Finds neighbor pairs among `cells` and between `cells` and `sites`.
    ///
    /// Points are combined as cells followed by sites; site–site pairs are dropped. The
    /// Delaunay search triangulates the x-y projection for planar networks and the full
    /// positions otherwise. `max_distance` only bounds the radius search; distance
    /// filtering of Delaunay pairs is left to the caller.
    pub fn find(
        self,
        dimensionality: Dimensionality,
        cells: &[Vector3<f64>],
        sites: &[Vector3<f64>],
        max_distance: f64,
    ) -> NeighborPairs {
        let combined: Vec<&Vector3<f64>> = cells.iter().chain(sites).collect();
        let edges = match self {
            Self::Delaunay => {
                let points: Vec<DVector<f64>> = combined
                    .iter()
                    .map(|p| match dimensionality {
                        Dimensionality::Planar => DVector::from_vec(vec![p.x, p.y]),
                        Dimensionality::Spatial => DVector::from_column_slice(p.as_slice()),
                    })
                    .collect();
                delaunay_edges(&points)
            }
            Self::Radius => radius_edges(&combined, cells.len(), max_distance),
        };

        let cell_count = cells.len();
        let mut pairs = NeighborPairs::default();
        for (a, b) in edges {
            match (a < cell_count, b < cell_count) {
                (true, true) => pairs.cells.push((a, b)),
                (true, false) => pairs.substrate.push((a, b - cell_count)),
                _ => {}
            }
        }
        pairs
    }
}

/// Pairs within `max_distance` that involve at least one of the first `query_count`
/// points.
fn radius_edges(
    points: &[&Vector3<f64>],
    query_count: usize,
    max_distance: f64,
) -> BTreeSet<(usize, usize)> {
    if points.is_empty() {
        return BTreeSet::new();
    }
    let coordinates: Vec<[f64; 3]> = points.iter().map(|p| [p.x, p.y, p.z]).collect();
    let kdtree: KdTree<f64, 3> = (&coordinates).into();
    let radius_sq = max_distance * max_distance;

    let mut edges = BTreeSet::new();
    for (a, query) in coordinates.iter().enumerate().take(query_count) {
        for neighbour in kdtree.within::<SquaredEuclidean>(query, radius_sq) {
            let b = neighbour.item as usize;
            if b != a {
                edges.insert((a.min(b), a.max(b)));
            }
        }
    }
    edges
}
