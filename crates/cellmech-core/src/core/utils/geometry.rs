use nalgebra::{Rotation3, Vector3};

/// Cross-product norm below which a link direction counts as parallel to the
/// world "up" axis when a reference normal is constructed.
const PARALLEL_AXIS_TOLERANCE: f64 = 1e-5;

/// Returns `v / |v|`, or the zero vector if `v` has zero length.
///
/// Zero is the "undefined direction" marker used throughout the stores, so this never
/// produces NaN for coincident points.
#[inline]
pub fn normalize_or_zero(v: &Vector3<f64>) -> Vector3<f64> {
    normalize_with_norm(v).0
}

/// Returns the normalized vector together with the original norm.
#[inline]
pub fn normalize_with_norm(v: &Vector3<f64>) -> (Vector3<f64>, f64) {
    let norm = v.norm();
    if norm > 0.0 && norm.is_finite() {
        (v / norm, norm)
    } else {
        (Vector3::zeros(), 0.0)
    }
}

/// Builds the rotation encoded by an axis-angle vector (Rodrigues' formula).
///
/// The magnitude of `phi` is the rotation angle and its direction the rotation axis. A
/// vanishing vector yields the identity.
#[inline]
pub fn rotation_from_axis_angle(phi: &Vector3<f64>) -> Rotation3<f64> {
    Rotation3::new(*phi)
}

/// Rotates a node-local vector into the world frame.
#[inline]
pub fn local_to_world(phi: &Vector3<f64>, local: &Vector3<f64>) -> Vector3<f64> {
    rotation_from_axis_angle(phi) * local
}

/// Rotates a world vector into the node-local frame, i.e. applies the inverse rotation.
#[inline]
pub fn world_to_local(phi: &Vector3<f64>, world: &Vector3<f64>) -> Vector3<f64> {
    rotation_from_axis_angle(&(-phi)) * world
}

/// Unit direction from `from` to `to` and the distance between them.
///
/// Coincident points give a zero direction and zero distance.
#[inline]
pub fn separation(from: &Vector3<f64>, to: &Vector3<f64>) -> (Vector3<f64>, f64) {
    normalize_with_norm(&(to - from))
}

/// Constructs a unit normal perpendicular to the link direction `e`.
///
/// The normal is taken perpendicular to the world z axis; when `e` is (nearly) parallel to
/// z it is taken perpendicular to the x axis instead. A zero `e` yields a zero normal.
pub fn reference_normal(e: &Vector3<f64>) -> Vector3<f64> {
    let (n, q) = normalize_with_norm(&e.cross(&Vector3::z()));
    if q < PARALLEL_AXIS_TOLERANCE {
        normalize_or_zero(&e.cross(&Vector3::x()))
    } else {
        n
    }
}

/// Component of `v` perpendicular to the unit vector `e`, renormalized.
#[inline]
pub fn perpendicular_unit(v: &Vector3<f64>, e: &Vector3<f64>) -> Vector3<f64> {
    normalize_or_zero(&(v - e * v.dot(e)))
}

/// Counter-clockwise turn test of the triangle `a, b, c` in the x-y plane.
#[inline]
pub fn ccw(a: &Vector3<f64>, b: &Vector3<f64>, c: &Vector3<f64>) -> bool {
    (c.y - a.y) * (b.x - a.x) > (b.y - a.y) * (c.x - a.x)
}

#[inline]
fn planar_distance(p: &Vector3<f64>, q: &Vector3<f64>) -> f64 {
    (p.x - q.x).hypot(p.y - q.y)
}

/// Whether the segments `ab` and `cd` cross in the x-y plane.
///
/// Segments whose endpoints lie within `tolerance` of each other are treated as sharing a
/// node and never cross.
pub fn segments_cross(
    a: &Vector3<f64>,
    b: &Vector3<f64>,
    c: &Vector3<f64>,
    d: &Vector3<f64>,
    tolerance: f64,
) -> bool {
    if planar_distance(a, c) <= tolerance
        || planar_distance(a, d) <= tolerance
        || planar_distance(b, c) <= tolerance
        || planar_distance(b, d) <= tolerance
    {
        return false;
    }
    ccw(a, c, d) != ccw(b, c, d) && ccw(a, b, c) != ccw(a, b, d)
}
