use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{trace, warn};

/// Relative size of the perturbation applied to input points.
const JOGGLE_SCALE: f64 = 1e-6;
/// Fixed seed so that the joggle, and therefore the triangulation, is reproducible.
const JOGGLE_SEED: u64 = 0x5eed_de1a;
/// Size of the enclosing simplex relative to the point cloud extent.
const SUPER_SIMPLEX_SCALE: f64 = 1e3;

#[derive(Debug, Clone)]
struct Simplex {
    /// Sorted vertex indices; indices past the input length belong to the super simplex.
    vertices: Vec<usize>,
    center: DVector<f64>,
    radius_sq: f64,
    /// A flat simplex has no circumsphere and is replaced by the next insertion.
    degenerate: bool,
}

impl Simplex {
    fn new(vertices: Vec<usize>, points: &[DVector<f64>]) -> Self {
        match circumsphere(&vertices, points) {
            Some((center, radius_sq)) => Self {
                vertices,
                center,
                radius_sq,
                degenerate: false,
            },
            None => Self {
                center: DVector::zeros(points[vertices[0]].len()),
                vertices,
                radius_sq: 0.0,
                degenerate: true,
            },
        }
    }

    fn encloses(&self, p: &DVector<f64>) -> bool {
        self.degenerate || (p - &self.center).norm_squared() < self.radius_sq
    }
}

/// Solves `2 (p_k - p_0) · c = |p_k - p_0|²` for the circumcenter relative to `p_0`.
fn circumsphere(vertices: &[usize], points: &[DVector<f64>]) -> Option<(DVector<f64>, f64)> {
    let origin = &points[vertices[0]];
    let dim = origin.len();
    let mut a = DMatrix::zeros(dim, dim);
    let mut b = DVector::zeros(dim);
    for (row, &v) in vertices[1..].iter().enumerate() {
        let offset = &points[v] - origin;
        for col in 0..dim {
            a[(row, col)] = 2.0 * offset[col];
        }
        b[row] = offset.norm_squared();
    }
    let relative = a.lu().solve(&b)?;
    if relative.iter().all(|x| x.is_finite()) {
        let radius_sq = relative.norm_squared();
        Some((origin + relative, radius_sq))
    } else {
        None
    }
}

/// Bowyer–Watson triangulation of `points` (all of the same dimension).
///
/// Returns every simplex of the final triangulation, including those that touch the
/// enclosing super simplex (vertex indices from `points.len()` on).
fn bowyer_watson(points: &[DVector<f64>]) -> Vec<Simplex> {
    let dim = points[0].len();
    let count = points.len();

    let mut lower = points[0].clone();
    let mut upper = points[0].clone();
    for p in points {
        lower = lower.inf(p);
        upper = upper.sup(p);
    }
    let extent = (&upper - &lower).max();
    let extent = if extent > 0.0 { extent } else { 1.0 };
    let center = (&lower + &upper) / 2.0;

    let mut rng = StdRng::seed_from_u64(JOGGLE_SEED);
    let mut vertices: Vec<DVector<f64>> = points
        .iter()
        .map(|p| p.map(|x| x + JOGGLE_SCALE * extent * (2.0 * rng.r#gen::<f64>() - 1.0)))
        .collect();

    let radius = SUPER_SIMPLEX_SCALE * extent;
    let edge = 10.0 * dim as f64 * radius;
    let corner = center.add_scalar(-3.0 * radius);
    vertices.push(corner.clone());
    for axis in 0..dim {
        let mut v = corner.clone();
        v[axis] += edge;
        vertices.push(v);
    }

    let mut simplices = vec![Simplex::new((count..count + dim + 1).collect(), &vertices)];
    for index in 0..count {
        let p = &vertices[index];
        let (bad, good): (Vec<Simplex>, Vec<Simplex>) =
            simplices.into_iter().partition(|s| s.encloses(p));

        let mut facets: BTreeMap<Vec<usize>, usize> = BTreeMap::new();
        for simplex in &bad {
            for skip in 0..simplex.vertices.len() {
                let facet: Vec<usize> = simplex
                    .vertices
                    .iter()
                    .enumerate()
                    .filter(|&(i, _)| i != skip)
                    .map(|(_, &v)| v)
                    .collect();
                *facets.entry(facet).or_default() += 1;
            }
        }

        simplices = good;
        for (mut facet, _) in facets.into_iter().filter(|&(_, n)| n == 1) {
            facet.push(index);
            facet.sort_unstable();
            simplices.push(Simplex::new(facet, &vertices));
        }
    }

    let degenerate = simplices.iter().filter(|s| s.degenerate).count();
    if degenerate > 0 {
        warn!(degenerate, "Triangulation contains flat simplices.");
    }
    trace!(points = count, simplices = simplices.len(), "Triangulation finished.");
    simplices
}

/// Edges of the Delaunay graph of `points`, each as `(lower, higher)` index.
///
/// Inputs too small to span a simplex are fully connected. A deterministic sub-micro
/// perturbation keeps cocircular or collinear inputs from stalling the construction.
pub fn delaunay_edges(points: &[DVector<f64>]) -> BTreeSet<(usize, usize)> {
    let count = points.len();
    let dim = points.first().map_or(0, |p| p.len());
    if count < 2 {
        return BTreeSet::new();
    }
    if count <= dim + 1 {
        return (0..count)
            .flat_map(|a| (a + 1..count).map(move |b| (a, b)))
            .collect();
    }

    let simplices = bowyer_watson(points);
    let mut edges = BTreeSet::new();
    for simplex in &simplices {
        let real: Vec<usize> = simplex.vertices.iter().copied().filter(|&v| v < count).collect();
        for (i, &a) in real.iter().enumerate() {
            for &b in &real[i + 1..] {
                edges.insert((a.min(b), a.max(b)));
            }
        }
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn planar(coords: &[(f64, f64)]) -> Vec<DVector<f64>> {
        coords
            .iter()
            .map(|&(x, y)| DVector::from_vec(vec![x, y]))
            .collect()
    }

    fn scattered(count: usize, dim: usize, seed: u64) -> Vec<DVector<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        (0..count)
            .map(|_| DVector::from_fn(dim, |_, _| rng.r#gen::<f64>() * 10.0))
            .collect()
    }

    /// Simplices whose vertices are all input points, as sorted index lists.
    fn triangulate(points: &[DVector<f64>]) -> Vec<Vec<usize>> {
        let count = points.len();
        bowyer_watson(points)
            .into_iter()
            .filter(|s| s.vertices.iter().all(|&v| v < count))
            .map(|s| s.vertices)
            .collect()
    }

    /// Delaunay edges by exhaustive search over all triangles.
    ///
    /// A triangle counts when no other point lies deeper than `margin` inside its
    /// circumcircle; a negative margin demands clearance instead.
    fn brute_force_edges(points: &[DVector<f64>], margin: f64) -> BTreeSet<(usize, usize)> {
        let n = points.len();
        let mut edges = BTreeSet::new();
        for a in 0..n {
            for b in a + 1..n {
                for c in b + 1..n {
                    let Some((center, radius_sq)) = circumsphere(&[a, b, c], points) else {
                        continue;
                    };
                    let radius = radius_sq.sqrt();
                    let empty = (0..n)
                        .filter(|&i| i != a && i != b && i != c)
                        .all(|i| (&points[i] - &center).norm() > radius - margin);
                    if empty {
                        edges.extend([(a, b), (a, c), (b, c)]);
                    }
                }
            }
        }
        edges
    }

    fn assert_empty_circumspheres(points: &[DVector<f64>]) {
        for simplex in triangulate(points) {
            let (center, radius_sq) = circumsphere(&simplex, points).unwrap();
            for (i, p) in points.iter().enumerate() {
                if simplex.contains(&i) {
                    continue;
                }
                assert!(
                    (p - &center).norm() > radius_sq.sqrt() - 1e-4,
                    "point {i} lies inside the circumsphere of {simplex:?}"
                );
            }
        }
    }

    #[test]
    fn small_inputs_are_fully_connected() {
        assert!(delaunay_edges(&planar(&[(0.0, 0.0)])).is_empty());
        let edges = delaunay_edges(&planar(&[(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)]));
        assert_eq!(edges, BTreeSet::from([(0, 1), (0, 2), (1, 2)]));
    }

    #[test]
    fn square_with_center_connects_center_to_all_corners() {
        let points = planar(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0), (0.5, 0.5)]);
        let edges = delaunay_edges(&points);
        let expected = BTreeSet::from([
            (0, 1),
            (1, 2),
            (2, 3),
            (0, 3),
            (0, 4),
            (1, 4),
            (2, 4),
            (3, 4),
        ]);
        assert_eq!(edges, expected);
    }

    #[test]
    fn cocircular_square_gets_exactly_one_diagonal() {
        let points = planar(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)]);
        let edges = delaunay_edges(&points);
        assert_eq!(edges.len(), 5);
        assert!(edges.contains(&(0, 2)) ^ edges.contains(&(1, 3)));
    }

    #[test]
    fn planar_triangulation_has_empty_circumcircles() {
        assert_empty_circumspheres(&scattered(40, 2, 7));
    }

    #[test]
    fn spatial_triangulation_has_empty_circumspheres() {
        assert_empty_circumspheres(&scattered(25, 3, 11));
    }

    #[test]
    fn planar_triangulation_covers_every_point() {
        let points = scattered(30, 2, 3);
        let edges = delaunay_edges(&points);
        for i in 0..points.len() {
            assert!(edges.iter().any(|&(a, b)| a == i || b == i));
        }
        // Euler bound for planar graphs.
        assert!(edges.len() <= 3 * points.len() - 6);
    }

    #[test]
    fn planar_edges_match_exhaustive_search() {
        for seed in [2, 13, 29] {
            let points = scattered(25, 2, seed);
            let edges = delaunay_edges(&points);
            let certain = brute_force_edges(&points, -1e-3);
            let possible = brute_force_edges(&points, 1e-3);
            let missing: Vec<_> = certain.difference(&edges).collect();
            let extra: Vec<_> = edges.difference(&possible).collect();
            assert!(missing.is_empty(), "seed {seed}: missing {missing:?}");
            assert!(extra.is_empty(), "seed {seed}: extra {extra:?}");
        }
    }

    #[test]
    fn collinear_chain_links_consecutive_points() {
        let points = planar(&[
            (0.0, 0.0),
            (1.0, 0.0),
            (2.0, 0.0),
            (3.0, 0.0),
            (4.0, 0.0),
            (5.0, 0.0),
        ]);
        let edges = delaunay_edges(&points);
        for i in 0..points.len() - 1 {
            assert!(edges.contains(&(i, i + 1)), "missing ({i}, {})", i + 1);
        }
    }

    #[test]
    fn coplanar_bilayer_links_nearest_neighbors() {
        // Two stacked 3x3 grids; every point's nearest neighbor sits directly across.
        let mut points = Vec::new();
        for layer in 0..2 {
            for i in 0..9 {
                let (x, y) = ((i % 3) as f64, (i / 3) as f64);
                points.push(DVector::from_vec(vec![x, y, 0.6 * layer as f64]));
            }
        }
        let edges = delaunay_edges(&points);
        for i in 0..9 {
            assert!(edges.contains(&(i, i + 9)), "missing vertical pair ({i}, {})", i + 9);
        }
        for layer in [0, 9] {
            for i in 0..9 {
                if i % 3 < 2 {
                    assert!(edges.contains(&(layer + i, layer + i + 1)));
                }
                if i < 6 {
                    assert!(edges.contains(&(layer + i, layer + i + 3)));
                }
            }
        }
    }

        #[test]
    fn triangulation_is_deterministic() {
        let points = scattered(20, 3, 5);
        assert_eq!(delaunay_edges(&points), delaunay_edges(&points));
    }
}
