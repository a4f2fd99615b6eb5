use crate::core::models::dimension::Dimensionality;
use crate::core::models::link::{LinkMechanics, LinkState};
use crate::core::utils::geometry::{local_to_world, perpendicular_unit};
use nalgebra::Vector3;
use std::fmt::Debug;

/// Discrete elastic-rod law turning link geometry into loads.
///
/// Implementors only decide the torques at both ends; the force follows from them in the
/// same way for every dimensionality (see [`ForceLaw::evaluate`]).
pub trait ForceLaw: Debug + Send + Sync {
    /// Torques on the first and second endpoint.
    ///
    /// `direction` is the unit vector from the first to the second endpoint; `phi_a` and
    /// `phi_b` are the endpoint orientations.
    fn torques(
        &self,
        mechanics: &LinkMechanics,
        direction: &Vector3<f64>,
        phi_a: &Vector3<f64>,
        phi_b: &Vector3<f64>,
    ) -> [Vector3<f64>; 2];

    /// Full link state: stretch force plus the transverse force balancing both torques.
    ///
    /// The returned force acts on the first endpoint. For coincident endpoints the
    /// transverse part is dropped instead of dividing by zero.
    fn evaluate(
        &self,
        mechanics: &LinkMechanics,
        direction: &Vector3<f64>,
        distance: f64,
        phi_a: &Vector3<f64>,
        phi_b: &Vector3<f64>,
    ) -> LinkState {
        let torques = self.torques(mechanics, direction, phi_a, phi_b);
        let stretch = direction * (mechanics.spring_constant * (distance - mechanics.rest_length));
        let transverse = if distance > 0.0 {
            (torques[0] + torques[1]).cross(direction) / distance
        } else {
            Vector3::zeros()
        };
        LinkState {
            direction: *direction,
            distance,
            force: stretch + transverse,
            torques,
        }
    }
}

/// Bending only; links in the plane carry no normals.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlanarLaw;

/// Bending plus twist about the link axis.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpatialLaw;

#[inline]
fn bending_torques(
    mechanics: &LinkMechanics,
    direction: &Vector3<f64>,
    phi_a: &Vector3<f64>,
    phi_b: &Vector3<f64>,
) -> [Vector3<f64>; 2] {
    let t_a = local_to_world(phi_a, &mechanics.tangents[0]);
    let t_b = local_to_world(phi_b, &mechanics.tangents[1]);
    [
        t_a.cross(direction) * mechanics.bending_rigidity,
        t_b.cross(&(-direction)) * mechanics.bending_rigidity,
    ]
}

impl ForceLaw for PlanarLaw {
    fn torques(
        &self,
        mechanics: &LinkMechanics,
        direction: &Vector3<f64>,
        phi_a: &Vector3<f64>,
        phi_b: &Vector3<f64>,
    ) -> [Vector3<f64>; 2] {
        bending_torques(mechanics, direction, phi_a, phi_b)
    }
}

impl ForceLaw for SpatialLaw {
    fn torques(
        &self,
        mechanics: &LinkMechanics,
        direction: &Vector3<f64>,
        phi_a: &Vector3<f64>,
        phi_b: &Vector3<f64>,
    ) -> [Vector3<f64>; 2] {
        let [bend_a, bend_b] = bending_torques(mechanics, direction, phi_a, phi_b);
        let n_a = perpendicular_unit(&local_to_world(phi_a, &mechanics.normals[0]), direction);
        let n_b = perpendicular_unit(&local_to_world(phi_b, &mechanics.normals[1]), direction);
        let twist = n_a.cross(&n_b) * mechanics.twist_modulus;
        [bend_a + twist, bend_b - twist]
    }
}

static PLANAR: PlanarLaw = PlanarLaw;
static SPATIAL: SpatialLaw = SpatialLaw;

impl Dimensionality {
    /// The force law matching this dimensionality.
    pub fn force_law(self) -> &'static dyn ForceLaw {
        match self {
            Self::Planar => &PLANAR,
            Self::Spatial => &SPATIAL,
        }
    }
}
