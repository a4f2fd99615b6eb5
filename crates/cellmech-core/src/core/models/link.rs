use super::dimension::Dimensionality;
use super::error::StoreError;
use crate::core::utils::geometry::{normalize_or_zero, reference_normal, world_to_local};
use nalgebra::Vector3;
use serde::Deserialize;

/// Canonical key of an undirected cell–cell link, lower node index first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkKey(usize, usize);

impl LinkKey {
    /// Builds the canonical key for the pair, or `None` for a self pair.
    pub fn new(a: usize, b: usize) -> Option<Self> {
        match a.cmp(&b) {
            std::cmp::Ordering::Less => Some(Self(a, b)),
            std::cmp::Ordering::Greater => Some(Self(b, a)),
            std::cmp::Ordering::Equal => None,
        }
    }

    #[inline]
    pub fn lo(&self) -> usize {
        self.0
    }

    #[inline]
    pub fn hi(&self) -> usize {
        self.1
    }

    #[inline]
    pub fn pair(&self) -> (usize, usize) {
        (self.0, self.1)
    }
}

/// Stiffness values used when a link is created without explicit parameters.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct LinkDefaults {
    pub spring_constant: f64,
    pub bending_rigidity: f64,
    pub twist_modulus: f64,
}

impl Default for LinkDefaults {
    fn default() -> Self {
        Self {
            spring_constant: 15.0,
            bending_rigidity: 10.0,
            twist_modulus: 1.0,
        }
    }
}

/// Optional overrides for a new link.
///
/// Every field left as `None` is derived from the defaults or from the current geometry:
/// the rest length becomes the current distance, tangents follow the current link
/// direction, and the normal is built perpendicular to it. Tangents and the shared normal
/// are given in world coordinates; `local_normal_*` are taken as already expressed in the
/// respective endpoint's frame.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LinkParams {
    pub spring_constant: Option<f64>,
    pub bending_rigidity: Option<f64>,
    pub twist_modulus: Option<f64>,
    pub rest_length: Option<f64>,
    pub tangent_a: Option<Vector3<f64>>,
    pub tangent_b: Option<Vector3<f64>>,
    pub normal: Option<Vector3<f64>>,
    pub local_normal_a: Option<Vector3<f64>>,
    pub local_normal_b: Option<Vector3<f64>>,
}

impl LinkParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spring_constant(mut self, k: f64) -> Self {
        self.spring_constant = Some(k);
        self
    }
    pub fn bending_rigidity(mut self, bend: f64) -> Self {
        self.bending_rigidity = Some(bend);
        self
    }
    pub fn twist_modulus(mut self, twist: f64) -> Self {
        self.twist_modulus = Some(twist);
        self
    }
    pub fn rest_length(mut self, d0: f64) -> Self {
        self.rest_length = Some(d0);
        self
    }
    pub fn tangents(mut self, a: Vector3<f64>, b: Vector3<f64>) -> Self {
        self.tangent_a = Some(a);
        self.tangent_b = Some(b);
        self
    }
    pub fn normal(mut self, n: Vector3<f64>) -> Self {
        self.normal = Some(n);
        self
    }
    /// Preferred normals given directly in each endpoint's local frame.
    ///
    /// They take precedence over [`normal`](Self::normal) and need not agree with each
    /// other, which leaves the link twisted at its rest geometry.
    pub fn with_local_normals(mut self, a: Vector3<f64>, b: Vector3<f64>) -> Self {
        self.local_normal_a = Some(a);
        self.local_normal_b = Some(b);
        self
    }
}

/// Material and preferred-geometry parameters of one link.
///
/// Index 0 of the per-end arrays belongs to the first endpoint (the lower node index for
/// cell–cell links, the cell for substrate links), index 1 to the second. Tangents and
/// normals are stored in the local frame of their own endpoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkMechanics {
    pub spring_constant: f64,
    pub bending_rigidity: f64,
    pub twist_modulus: f64,
    pub rest_length: f64,
    pub tangents: [Vector3<f64>; 2],
    pub normals: [Vector3<f64>; 2],
}

/// Geometry and loads of a link from the most recent force evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkState {
    /// Unit vector from the first to the second endpoint.
    pub direction: Vector3<f64>,
    pub distance: f64,
    /// Force exerted on the first endpoint; the second receives the opposite.
    pub force: Vector3<f64>,
    pub torques: [Vector3<f64>; 2],
}

impl Default for LinkState {
    fn default() -> Self {
        Self {
            direction: Vector3::zeros(),
            distance: 0.0,
            force: Vector3::zeros(),
            torques: [Vector3::zeros(); 2],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Link {
    pub mechanics: LinkMechanics,
    pub state: LinkState,
}

impl Link {
    /// Captures the current geometry of the pair into a new link.
    ///
    /// `direction` and `distance` describe the vector from endpoint `a` to endpoint `b`;
    /// `phi_a` and `phi_b` are the current endpoint orientations used to move the
    /// preferred directions into local frames.
    pub(crate) fn capture(
        params: &LinkParams,
        defaults: &LinkDefaults,
        dims: Dimensionality,
        direction: &Vector3<f64>,
        distance: f64,
        phi_a: &Vector3<f64>,
        phi_b: &Vector3<f64>,
    ) -> Result<Self, StoreError> {
        let spring_constant = checked(
            "spring_constant",
            params.spring_constant.unwrap_or(defaults.spring_constant),
        )?;
        let bending_rigidity = checked(
            "bending_rigidity",
            params.bending_rigidity.unwrap_or(defaults.bending_rigidity),
        )?;
        let twist_modulus = checked(
            "twist_modulus",
            params.twist_modulus.unwrap_or(defaults.twist_modulus),
        )?;
        let rest_length = checked("rest_length", params.rest_length.unwrap_or(distance))?;

        let world_tangent_a = params
            .tangent_a
            .map(|t| normalize_or_zero(&t))
            .unwrap_or(*direction);
        let world_tangent_b = params
            .tangent_b
            .map(|t| normalize_or_zero(&t))
            .unwrap_or(-direction);
        let tangents = [
            world_to_local(phi_a, &world_tangent_a),
            world_to_local(phi_b, &world_tangent_b),
        ];

        // Planar networks never twist, so normals stay undefined.
        let normals = if dims.is_planar() {
            [Vector3::zeros(); 2]
        } else {
            let n = params
                .normal
                .map(|n| normalize_or_zero(&n))
                .unwrap_or_else(|| reference_normal(direction));
            [
                params
                    .local_normal_a
                    .map(|n| normalize_or_zero(&n))
                    .unwrap_or_else(|| world_to_local(phi_a, &n)),
                params
                    .local_normal_b
                    .map(|n| normalize_or_zero(&n))
                    .unwrap_or_else(|| world_to_local(phi_b, &n)),
            ]
        };

        Ok(Self {
            mechanics: LinkMechanics {
                spring_constant,
                bending_rigidity,
                twist_modulus,
                rest_length,
                tangents,
                normals,
            },
            state: LinkState {
                direction: *direction,
                distance,
                ..LinkState::default()
            },
        })
    }

    /// Rejects a rest length above `limit`.
    pub(crate) fn check_rest_length(&self, limit: f64) -> Result<(), StoreError> {
        let rest_length = self.mechanics.rest_length;
        if rest_length <= limit {
            Ok(())
        } else {
            Err(StoreError::InvalidLinkParameter {
                name: "rest_length",
                value: rest_length,
            })
        }
    }
}

fn checked(name: &'static str, value: f64) -> Result<f64, StoreError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(StoreError::InvalidLinkParameter { name, value })
    }
}

/// Dense snapshot of a link map: endpoints and mechanics in matching order.
///
/// This is the representation the force evaluator iterates; it is taken once per
/// relaxation and stays valid while the topology is unchanged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactLinkSet {
    pub endpoints: Vec<(usize, usize)>,
    pub mechanics: Vec<LinkMechanics>,
}

impl CompactLinkSet {
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&(usize, usize), &LinkMechanics)> {
        self.endpoints.iter().zip(self.mechanics.iter())
    }
}

impl FromIterator<((usize, usize), LinkMechanics)> for CompactLinkSet {
    fn from_iter<I: IntoIterator<Item = ((usize, usize), LinkMechanics)>>(iter: I) -> Self {
        let (endpoints, mechanics) = iter.into_iter().unzip();
        Self {
            endpoints,
            mechanics,
        }
    }
}
