use super::error::StoreError;
use super::link::{CompactLinkSet, Link, LinkParams, LinkState};
use super::network::CellNetwork;
use crate::core::utils::geometry::separation;
use nalgebra::Vector3;
use std::collections::BTreeMap;
use tracing::trace;

/// Key of a cell–substrate link. Unlike [`LinkKey`](super::link::LinkKey) the order is
/// fixed: cell first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SubstrateKey {
    pub cell: usize,
    pub site: usize,
}

impl SubstrateKey {
    pub fn new(cell: usize, site: usize) -> Self {
        Self { cell, site }
    }

    #[inline]
    pub fn pair(&self) -> (usize, usize) {
        (self.cell, self.site)
    }
}

/// Attachment sites that cells can link to.
///
/// Site positions never move. Their orientations may creep under the torque the links
/// exert on them. Each link stores its cell-side preferred directions at index 0 and its
/// site-side ones at index 1; the link force acts on the cell only.
#[derive(Debug, Clone)]
pub struct SubstrateStore {
    positions: Vec<Vector3<f64>>,
    orientations: Vec<Vector3<f64>>,
    torques: Vec<Vector3<f64>>,
    links: BTreeMap<SubstrateKey, Link>,
}

impl SubstrateStore {
    /// Creates a substrate of unrotated sites.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptySubstrate`] if `positions` is empty.
    pub fn new(positions: Vec<Vector3<f64>>) -> Result<Self, StoreError> {
        if positions.is_empty() {
            return Err(StoreError::EmptySubstrate);
        }
        let count = positions.len();
        Ok(Self {
            positions,
            orientations: vec![Vector3::zeros(); count],
            torques: vec![Vector3::zeros(); count],
            links: BTreeMap::new(),
        })
    }

    pub fn with_orientations(mut self, orientations: Vec<Vector3<f64>>) -> Result<Self, StoreError> {
        self.check_len("site orientations", orientations.len())?;
        self.orientations = orientations;
        Ok(self)
    }

    pub fn site_count(&self) -> usize {
        self.positions.len()
    }

    pub fn positions(&self) -> &[Vector3<f64>] {
        &self.positions
    }

    pub fn orientations(&self) -> &[Vector3<f64>] {
        &self.orientations
    }

    pub fn torques(&self) -> &[Vector3<f64>] {
        &self.torques
    }

    /// Links `cell` of `network` to `site`, capturing the current geometry.
    ///
    /// Stiffness defaults come from the network. When tangents are supplied, the first is
    /// the cell-side and the second the site-side direction. The rest length is bounded by
    /// the network's [`max_rest_length`](CellNetwork::max_rest_length).
    pub fn add_link(
        &mut self,
        network: &CellNetwork,
        cell: usize,
        site: usize,
        params: &LinkParams,
    ) -> Result<(), StoreError> {
        if cell >= network.node_count() {
            return Err(StoreError::NodeOutOfRange {
                index: cell,
                count: network.node_count(),
            });
        }
        self.check_site(site)?;
        let key = SubstrateKey::new(cell, site);
        if self.links.contains_key(&key) {
            return Err(StoreError::DuplicateSubstrateLink { cell, site });
        }

        let (direction, distance) = separation(&network.positions()[cell], &self.positions[site]);
        let link = Link::capture(
            params,
            network.link_defaults(),
            network.dimensionality(),
            &direction,
            distance,
            &network.orientations()[cell],
            &self.orientations[site],
        )?;
        link.check_rest_length(network.max_rest_length())?;
        trace!(cell, site, rest_length = link.mechanics.rest_length, "Substrate link added.");
        self.links.insert(key, link);
        Ok(())
    }

    /// Removes the link between `cell` and `site`; returns whether a link was removed.
    pub fn remove_link(&mut self, cell: usize, site: usize) -> bool {
        let removed = self.links.remove(&SubstrateKey::new(cell, site)).is_some();
        if removed {
            trace!(cell, site, "Substrate link removed.");
        }
        removed
    }

    pub fn is_linked(&self, cell: usize, site: usize) -> bool {
        self.links.contains_key(&SubstrateKey::new(cell, site))
    }

    pub fn link(&self, cell: usize, site: usize) -> Option<&Link> {
        self.links.get(&SubstrateKey::new(cell, site))
    }

    pub fn links(&self) -> impl Iterator<Item = (&SubstrateKey, &Link)> {
        self.links.iter()
    }

    pub fn link_count(&self) -> usize {
        self.links.len()
    }

    pub fn rest_length(&self, cell: usize, site: usize) -> f64 {
        self.link(cell, site).map_or(0.0, |l| l.mechanics.rest_length)
    }

    /// Force the link exerts on `cell`.
    pub fn link_force(&self, cell: usize, site: usize) -> Vector3<f64> {
        self.link(cell, site)
            .map_or_else(Vector3::zeros, |l| l.state.force)
    }

    /// Existing links as `(cell, site)` pairs, sorted.
    pub fn link_list(&self) -> Vec<(usize, usize)> {
        self.links.keys().map(SubstrateKey::pair).collect()
    }

    pub fn link_force_magnitudes(&self) -> Vec<f64> {
        self.links.values().map(|l| l.state.force.norm()).collect()
    }

    /// Recomputes the cached direction and distance of every link from cell positions.
    pub fn update_distances(&mut self, cell_positions: &[Vector3<f64>]) -> Result<(), StoreError> {
        for (key, link) in self.links.iter_mut() {
            let cell = cell_positions
                .get(key.cell)
                .ok_or(StoreError::NodeOutOfRange {
                    index: key.cell,
                    count: cell_positions.len(),
                })?;
            let (direction, distance) = separation(cell, &self.positions[key.site]);
            link.state.direction = direction;
            link.state.distance = distance;
        }
        Ok(())
    }

    /// Dense copy of all links as `(cell, site)` endpoints for the force evaluator.
    pub fn compact_links(&self) -> CompactLinkSet {
        self.links
            .iter()
            .map(|(key, link)| (key.pair(), link.mechanics))
            .collect()
    }

    pub(crate) fn links_mut(&mut self) -> impl Iterator<Item = (&SubstrateKey, &mut Link)> {
        self.links.iter_mut()
    }

    pub(crate) fn set_orientations(&mut self, orientations: Vec<Vector3<f64>>) -> Result<(), StoreError> {
        self.check_len("site orientations", orientations.len())?;
        self.orientations = orientations;
        Ok(())
    }

    pub(crate) fn store_loads(
        &mut self,
        torques: Vec<Vector3<f64>>,
        compact: &CompactLinkSet,
        states: &[LinkState],
    ) -> Result<(), StoreError> {
        self.check_len("site torques", torques.len())?;
        self.torques = torques;
        for (&(cell, site), state) in compact.endpoints.iter().zip(states) {
            if let Some(link) = self.links.get_mut(&SubstrateKey::new(cell, site)) {
                link.state = *state;
            }
        }
        Ok(())
    }

    fn check_site(&self, index: usize) -> Result<(), StoreError> {
        if index < self.site_count() {
            Ok(())
        } else {
            Err(StoreError::SiteOutOfRange {
                index,
                count: self.site_count(),
            })
        }
    }

    fn check_len(&self, what: &'static str, actual: usize) -> Result<(), StoreError> {
        if actual == self.site_count() {
            Ok(())
        } else {
            Err(StoreError::LengthMismatch {
                what,
                expected: self.site_count(),
                actual,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::dimension::Dimensionality;
    use crate::core::models::link::LinkDefaults;

    fn fixture() -> (CellNetwork, SubstrateStore) {
        let network = CellNetwork::new(
            Dimensionality::Spatial,
            vec![Vector3::new(0.0, 0.0, 1.0), Vector3::new(1.0, 0.0, 1.0)],
            LinkDefaults::default(),
        )
        .unwrap();
        let substrate =
            SubstrateStore::new(vec![Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0)]).unwrap();
        (network, substrate)
    }

    #[test]
    fn new_rejects_empty_substrate() {
        assert_eq!(
            SubstrateStore::new(vec![]).unwrap_err(),
            StoreError::EmptySubstrate
        );
    }

    #[test]
    fn add_link_points_from_cell_to_site() {
        let (network, mut substrate) = fixture();
        substrate.add_link(&network, 1, 0, &LinkParams::new()).unwrap();
        let link = substrate.link(1, 0).unwrap();
        let expected = Vector3::new(-1.0, 0.0, -1.0).normalize();
        assert!((link.state.direction - expected).norm() < 1e-12);
        assert!((link.mechanics.rest_length - 2f64.sqrt()).abs() < 1e-12);
        assert!((link.mechanics.tangents[1] + expected).norm() < 1e-12);
    }

    #[test]
    fn add_link_respects_network_rest_length_limit() {
        let (mut network, mut substrate) = fixture();
        network.limit_rest_length(1.2).unwrap();
        assert!(matches!(
            substrate.add_link(&network, 1, 0, &LinkParams::new()),
            Err(StoreError::InvalidLinkParameter { name: "rest_length", value })
                if (value - 2f64.sqrt()).abs() < 1e-12
        ));
        substrate.add_link(&network, 0, 0, &LinkParams::new()).unwrap();
        assert_eq!(substrate.link_count(), 1);
    }

    #[test]
    fn add_link_rejects_duplicates_and_bad_indices() {
        let (network, mut substrate) = fixture();
        substrate.add_link(&network, 0, 0, &LinkParams::new()).unwrap();
        assert_eq!(
            substrate.add_link(&network, 0, 0, &LinkParams::new()),
            Err(StoreError::DuplicateSubstrateLink { cell: 0, site: 0 })
        );
        assert!(matches!(
            substrate.add_link(&network, 0, 9, &LinkParams::new()),
            Err(StoreError::SiteOutOfRange { index: 9, .. })
        ));
        assert!(matches!(
            substrate.add_link(&network, 4, 0, &LinkParams::new()),
            Err(StoreError::NodeOutOfRange { index: 4, .. })
        ));
    }

    #[test]
    fn remove_link_clears_state_and_is_idempotent() {
        let (network, mut substrate) = fixture();
        substrate.add_link(&network, 0, 1, &LinkParams::new()).unwrap();
        assert!(substrate.remove_link(0, 1));
        assert!(!substrate.remove_link(0, 1));
        assert_eq!(substrate.rest_length(0, 1), 0.0);
        assert_eq!(substrate.link_force(0, 1), Vector3::zeros());
        assert!(substrate.link_list().is_empty());
    }

    #[test]
    fn update_distances_follows_cell_positions() {
        let (network, mut substrate) = fixture();
        substrate.add_link(&network, 0, 0, &LinkParams::new()).unwrap();
        substrate
            .update_distances(&[Vector3::new(0.0, 0.0, 3.0), Vector3::zeros()])
            .unwrap();
        let state = substrate.link(0, 0).unwrap().state;
        assert_eq!(state.distance, 3.0);
        assert_eq!(state.direction, -Vector3::z());
    }
}
