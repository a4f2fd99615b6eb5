use super::dimension::Dimensionality;
use super::error::StoreError;
use super::link::{CompactLinkSet, Link, LinkDefaults, LinkKey, LinkParams, LinkState};
use super::loading::NodeLoading;
use crate::core::utils::geometry::separation;
use nalgebra::Vector3;
use std::collections::BTreeMap;
use tracing::trace;

/// The cell population and its cell–cell links.
///
/// Node state is kept as parallel vectors indexed by node; links live in an ordered map
/// keyed by the canonical pair so that iteration order (and therefore every seeded
/// stochastic decision made while walking the links) is reproducible.
#[derive(Debug, Clone)]
pub struct CellNetwork {
    /// Number of spatial dimensions the network lives in.
    dimensionality: Dimensionality,
    /// Node positions.
    positions: Vec<Vector3<f64>>,
    /// Node orientations as axis-angle vectors (local frame to world frame).
    orientations: Vec<Vector3<f64>>,
    /// Total force on each node from the last force evaluation.
    forces: Vec<Vector3<f64>>,
    /// Total torque on each node from the last force evaluation.
    torques: Vec<Vector3<f64>>,
    /// External forces and anchors.
    loading: NodeLoading,
    /// Existing links, keyed by canonical pair.
    links: BTreeMap<LinkKey, Link>,
    /// Stiffness used for links created without explicit values.
    defaults: LinkDefaults,
    /// Largest rest length accepted for new links, cell–cell and substrate alike.
    max_rest_length: f64,
}

impl CellNetwork {
    /// Creates a network of unlinked, unrotated nodes at the given positions.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptyNetwork`] if `positions` is empty.
    pub fn new(
        dimensionality: Dimensionality,
        positions: Vec<Vector3<f64>>,
        defaults: LinkDefaults,
    ) -> Result<Self, StoreError> {
        if positions.is_empty() {
            return Err(StoreError::EmptyNetwork);
        }
        let count = positions.len();
        Ok(Self {
            dimensionality,
            positions,
            orientations: vec![Vector3::zeros(); count],
            forces: vec![Vector3::zeros(); count],
            torques: vec![Vector3::zeros(); count],
            loading: NodeLoading::None,
            links: BTreeMap::new(),
            defaults,
            max_rest_length: f64::INFINITY,
        })
    }

    /// Replaces all node orientations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::LengthMismatch`] if the number of orientations differs from
    /// the node count.
    pub fn with_orientations(mut self, orientations: Vec<Vector3<f64>>) -> Result<Self, StoreError> {
        self.check_len("orientations", orientations.len())?;
        self.orientations = orientations;
        Ok(self)
    }

    pub fn dimensionality(&self) -> Dimensionality {
        self.dimensionality
    }

    pub fn node_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn orientations(&self) -> &[Vector3<f64>] {
        &self.orientations
    }

    pub fn forces(&self) -> &[Vector3<f64>] {
        &self.forces
    }

    pub fn torques(&self) -> &[Vector3<f64>] {
        &self.torques
    }

    pub fn loading(&self) -> &NodeLoading {
        &self.loading
    }

    pub fn link_defaults(&self) -> &LinkDefaults {
        &self.defaults
    }

    pub fn max_rest_length(&self) -> f64 {
        self.max_rest_length
    }

    /// Caps the rest length of existing and future links at `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidLinkParameter`] for a negative or non-finite limit, or
    /// naming the first existing rest length above it. The limit is unchanged on error.
    pub fn limit_rest_length(&mut self, limit: f64) -> Result<(), StoreError> {
        if !(limit.is_finite() && limit >= 0.0) {
            return Err(StoreError::InvalidLinkParameter {
                name: "max_rest_length",
                value: limit,
            });
        }
        for link in self.links.values() {
            link.check_rest_length(limit)?;
        }
        self.max_rest_length = limit;
        Ok(())
    }

    pub fn set_position(&mut self, node: usize, position: Vector3<f64>) -> Result<(), StoreError> {
        self.check_node(node)?;
        self.positions[node] = position;
        Ok(())
    }

    pub fn set_orientation(&mut self, node: usize, phi: Vector3<f64>) -> Result<(), StoreError> {
        self.check_node(node)?;
        self.orientations[node] = phi;
        Ok(())
    }

    /// Sets a constant external force on a node, enabling external forces if needed.
    pub fn set_external_force(&mut self, node: usize, force: Vector3<f64>) -> Result<(), StoreError> {
        self.check_node(node)?;
        let count = self.node_count();
        self.loading.set_external_force(count, node, force);
        Ok(())
    }

    /// Anchors a node to `point` with a linear spring of the given stiffness.
    pub fn set_anchor(
        &mut self,
        node: usize,
        point: Vector3<f64>,
        stiffness: f64,
    ) -> Result<(), StoreError> {
        self.check_node(node)?;
        if !(stiffness.is_finite() && stiffness >= 0.0) {
            return Err(StoreError::InvalidLinkParameter {
                name: "anchor_stiffness",
                value: stiffness,
            });
        }
        let count = self.node_count();
        self.loading.set_anchor(count, node, point, stiffness);
        Ok(())
    }

    /// Links nodes `a` and `b`, capturing the current geometry as the preferred one.
    ///
    /// # Errors
    ///
    /// Fails for out-of-range indices, a self link, an existing link, negative
    /// stiffness/rest-length parameters, or a rest length above
    /// [`max_rest_length`](Self::max_rest_length). The store is unchanged on error.
    pub fn add_link(&mut self, a: usize, b: usize, params: &LinkParams) -> Result<(), StoreError> {
        self.check_node(a)?;
        self.check_node(b)?;
        let key = LinkKey::new(a, b).ok_or(StoreError::SelfLink(a))?;
        if self.links.contains_key(&key) {
            return Err(StoreError::DuplicateLink(key.lo(), key.hi()));
        }

        let (direction, distance) = separation(&self.positions[a], &self.positions[b]);
        let mut link = Link::capture(
            params,
            &self.defaults,
            self.dimensionality,
            &direction,
            distance,
            &self.orientations[a],
            &self.orientations[b],
        )?;
        link.check_rest_length(self.max_rest_length)?;
        // The map stores the link oriented from the lower to the higher index.
        if a != key.lo() {
            link.mechanics.tangents.swap(0, 1);
            link.mechanics.normals.swap(0, 1);
            link.state.direction = -link.state.direction;
        }
        trace!(a, b, rest_length = link.mechanics.rest_length, "Link added.");
        self.links.insert(key, link);
        Ok(())
    }

    /// Removes the link between `a` and `b`; returns whether a link was removed.
    ///
    /// Repeating the call is a no-op. All link parameters, loads and preferred directions
    /// disappear with the entry, so every accessor reports zero afterwards.
    pub fn remove_link(&mut self, a: usize, b: usize) -> bool {
        let removed = LinkKey::new(a, b)
            .and_then(|key| self.links.remove(&key))
            .is_some();
        if removed {
            trace!(a, b, "Link removed.");
        }
        removed
    }

    pub fn is_linked(&self, a: usize, b: usize) -> bool {
        LinkKey::new(a, b).is_some_and(|key| self.links.contains_key(&key))
    }

    pub fn link(&self, a: usize, b: usize) -> Option<&Link> {
        LinkKey::new(a, b).and_then(|key| self.links.get(&key))
    }

    pub fn links(&self) -> impl Iterator<Item = (&LinkKey, &Link)> {
        self.links.iter()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn spring_constant(&self, a: usize, b: usize) -> f64 {
        self.link(a, b).map_or(0.0, |l| l.mechanics.spring_constant)
    }

    pub fn bending_rigidity(&self, a: usize, b: usize) -> f64 {
        self.link(a, b).map_or(0.0, |l| l.mechanics.bending_rigidity)
    }

    pub fn twist_modulus(&self, a: usize, b: usize) -> f64 {
        self.link(a, b).map_or(0.0, |l| l.mechanics.twist_modulus)
    }

    pub fn rest_length(&self, a: usize, b: usize) -> f64 {
        self.link(a, b).map_or(0.0, |l| l.mechanics.rest_length)
    }

    /// Preferred tangent of the link `a`–`b` at node `a`, in `a`'s local frame.
    pub fn tangent(&self, a: usize, b: usize) -> Vector3<f64> {
        self.end_value(a, b, |link, end| link.mechanics.tangents[end])
    }

    /// Preferred normal of the link `a`–`b` at node `a`, in `a`'s local frame.
    pub fn normal(&self, a: usize, b: usize) -> Vector3<f64> {
        self.end_value(a, b, |link, end| link.mechanics.normals[end])
    }

    /// Force the link `a`–`b` exerts on node `a`.
    pub fn link_force(&self, a: usize, b: usize) -> Vector3<f64> {
        self.end_value(a, b, |link, end| {
            if end == 0 {
                link.state.force
            } else {
                -link.state.force
            }
        })
    }

    /// Torque the link `a`–`b` exerts on node `a`.
    pub fn link_torque(&self, a: usize, b: usize) -> Vector3<f64> {
        self.end_value(a, b, |link, end| link.state.torques[end])
    }

    /// Unit direction from `a` to `b` and their distance at the current positions.
    pub fn pair_geometry(&self, a: usize, b: usize) -> Result<(Vector3<f64>, f64), StoreError> {
        self.check_node(a)?;
        self.check_node(b)?;
        Ok(separation(&self.positions[a], &self.positions[b]))
    }

    /// Recomputes the cached direction and distance of every link from `positions`.
    pub fn update_distances(&mut self, positions: &[Vector3<f64>]) -> Result<(), StoreError> {
        self.check_len("positions", positions.len())?;
        for (key, link) in self.links.iter_mut() {
            let (direction, distance) = separation(&positions[key.lo()], &positions[key.hi()]);
            link.state.direction = direction;
            link.state.distance = distance;
        }
        Ok(())
    }

    /// Dense copy of all links in canonical orientation for the force evaluator.
    pub fn compact_links(&self) -> CompactLinkSet {
        self.links
            .iter()
            .map(|(key, link)| (key.pair(), link.mechanics))
            .collect()
    }

    /// Existing links as `(lower, higher)` node pairs, sorted.
    pub fn link_list(&self) -> Vec<(usize, usize)> {
        self.links.keys().map(LinkKey::pair).collect()
    }

    /// Magnitudes of the link forces, in [`Self::link_list`] order.
    pub fn link_force_magnitudes(&self) -> Vec<f64> {
        self.links.values().map(|l| l.state.force.norm()).collect()
    }

    pub(crate) fn links_mut(&mut self) -> impl Iterator<Item = (&LinkKey, &mut Link)> {
        self.links.iter_mut()
    }

    pub(crate) fn set_configuration(
        &mut self,
        positions: Vec<Vector3<f64>>,
        orientations: Vec<Vector3<f64>>,
    ) -> Result<(), StoreError> {
        self.check_len("positions", positions.len())?;
        self.check_len("orientations", orientations.len())?;
        self.positions = positions;
        self.orientations = orientations;
        Ok(())
    }

    /// Stores the result of a force evaluation made on `compact`.
    pub(crate) fn store_loads(
        &mut self,
        forces: Vec<Vector3<f64>>,
        torques: Vec<Vector3<f64>>,
        compact: &CompactLinkSet,
        states: &[LinkState],
    ) -> Result<(), StoreError> {
        self.check_len("node forces", forces.len())?;
        self.check_len("node torques", torques.len())?;
        self.forces = forces;
        self.torques = torques;
        for (&(a, b), state) in compact.endpoints.iter().zip(states) {
            if let Some(link) = LinkKey::new(a, b).and_then(|key| self.links.get_mut(&key)) {
                link.state = *state;
            }
        }
        Ok(())
    }

    fn end_value<F>(&self, a: usize, b: usize, f: F) -> Vector3<f64>
    where
        F: Fn(&Link, usize) -> Vector3<f64>,
    {
        match LinkKey::new(a, b).and_then(|key| self.links.get(&key).map(|l| (key, l))) {
            Some((key, link)) => f(link, if a == key.lo() { 0 } else { 1 }),
            None => Vector3::zeros(),
        }
    }

    fn check_node(&self, index: usize) -> Result<(), StoreError> {
        if index < self.node_count() {
            Ok(())
        } else {
            Err(StoreError::NodeOutOfRange {
                index,
                count: self.node_count(),
            })
        }
    }

    fn check_len(&self, what: &'static str, actual: usize) -> Result<(), StoreError> {
        if actual == self.node_count() {
            Ok(())
        } else {
            Err(StoreError::LengthMismatch {
                what,
                expected: self.node_count(),
                actual,
            })
        }
    }
}
