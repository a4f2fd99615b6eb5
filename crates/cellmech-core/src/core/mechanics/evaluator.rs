use super::law::ForceLaw;
use crate::core::models::error::StoreError;
use crate::core::models::link::{CompactLinkSet, LinkState};
use crate::core::models::loading::NodeLoading;
use crate::core::models::network::CellNetwork;
use crate::core::models::substrate::SubstrateStore;
use crate::core::utils::geometry::separation;
use nalgebra::Vector3;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Substrate links together with the fixed site positions they attach to.
#[derive(Debug, Clone)]
struct SubstrateLinks {
    links: CompactLinkSet,
    positions: Vec<Vector3<f64>>,
}

/// Per-node totals and per-link loads from one evaluation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Evaluation {
    pub forces: Vec<Vector3<f64>>,
    pub torques: Vec<Vector3<f64>>,
    /// Torque on each substrate site; empty without a substrate.
    pub site_torques: Vec<Vector3<f64>>,
    pub cell_links: Vec<LinkState>,
    pub substrate_links: Vec<LinkState>,
}

/// Assembles node forces and torques for a fixed link topology.
///
/// The evaluator takes a dense copy of the link sets when it is built, so it can be
/// called many times by an integrator with trial positions and orientations while the
/// stores stay untouched. Per-link loads are computed independently (in parallel with the
/// `parallel` feature) and then summed onto nodes sequentially.
#[derive(Debug, Clone)]
pub struct ForceEvaluator {
    law: &'static dyn ForceLaw,
    cell_links: CompactLinkSet,
    substrate: Option<SubstrateLinks>,
    loading: NodeLoading,
}

impl ForceEvaluator {
    pub fn new(network: &CellNetwork, substrate: Option<&SubstrateStore>) -> Self {
        Self {
            law: network.dimensionality().force_law(),
            cell_links: network.compact_links(),
            substrate: substrate.map(|s| SubstrateLinks {
                links: s.compact_links(),
                positions: s.positions().to_vec(),
            }),
            loading: network.loading().clone(),
        }
    }

    pub fn cell_link_count(&self) -> usize {
        self.cell_links.len()
    }

    pub fn substrate_link_count(&self) -> usize {
        self.substrate.as_ref().map_or(0, |s| s.links.len())
    }

    /// Evaluates all loads for the given cell state and site orientations.
    ///
    /// # Arguments
    ///
    /// * `positions` - Cell positions, one per node.
    /// * `orientations` - Cell orientations, one per node.
    /// * `site_orientations` - Substrate site orientations; ignored without a substrate.
    ///
    /// # Return
    ///
    /// Node force and torque totals including external forces and anchors, site torques,
    /// and the state of every link in compact order.
    pub fn evaluate(
        &self,
        positions: &[Vector3<f64>],
        orientations: &[Vector3<f64>],
        site_orientations: &[Vector3<f64>],
    ) -> Evaluation {
        let node_count = positions.len();

        let cell_links = link_states(self.law, &self.cell_links, |a, b| {
            let (direction, distance) = separation(&positions[a], &positions[b]);
            (direction, distance, &orientations[a], &orientations[b])
        });

        let mut forces: Vec<Vector3<f64>> = (0..node_count)
            .map(|node| self.loading.contribution(node, &positions[node]))
            .collect();
        let mut torques = vec![Vector3::zeros(); node_count];
        for (&(a, b), state) in self.cell_links.endpoints.iter().zip(&cell_links) {
            forces[a] += state.force;
            forces[b] -= state.force;
            torques[a] += state.torques[0];
            torques[b] += state.torques[1];
        }

        let (site_torques, substrate_links) = match &self.substrate {
            Some(substrate) => {
                let states = link_states(self.law, &substrate.links, |cell, site| {
                    let (direction, distance) =
                        separation(&positions[cell], &substrate.positions[site]);
                    (direction, distance, &orientations[cell], &site_orientations[site])
                });
                let mut site_torques = vec![Vector3::zeros(); substrate.positions.len()];
                for (&(cell, site), state) in substrate.links.endpoints.iter().zip(&states) {
                    forces[cell] += state.force;
                    torques[cell] += state.torques[0];
                    site_torques[site] += state.torques[1];
                }
                (site_torques, states)
            }
            None => (Vec::new(), Vec::new()),
        };

        Evaluation {
            forces,
            torques,
            site_torques,
            cell_links,
            substrate_links,
        }
    }

    /// Evaluates the loads at the stores' current state and writes them back.
    pub fn apply(
        &self,
        network: &mut CellNetwork,
        substrate: Option<&mut SubstrateStore>,
    ) -> Result<(), StoreError> {
        let site_orientations = substrate
            .as_ref()
            .map(|s| s.orientations().to_vec())
            .unwrap_or_default();
        let evaluation = self.evaluate(
            network.positions(),
            network.orientations(),
            &site_orientations,
        );
        self.store(evaluation, network, substrate)
    }

    /// Writes an evaluation made by this evaluator back into the stores.
    pub fn store(
        &self,
        evaluation: Evaluation,
        network: &mut CellNetwork,
        substrate: Option<&mut SubstrateStore>,
    ) -> Result<(), StoreError> {
        let Evaluation {
            forces,
            torques,
            site_torques,
            cell_links,
            substrate_links,
        } = evaluation;
        network.store_loads(forces, torques, &self.cell_links, &cell_links)?;
        if let (Some(store), Some(links)) = (substrate, &self.substrate) {
            store.store_loads(site_torques, &links.links, &substrate_links)?;
        }
        Ok(())
    }
}

/// Evaluates every link of `set` independently.
///
/// `geometry` maps the endpoints to the link direction, distance and both endpoint
/// orientations.
fn link_states<'g, G>(law: &dyn ForceLaw, set: &CompactLinkSet, geometry: G) -> Vec<LinkState>
where
    G: Fn(usize, usize) -> (Vector3<f64>, f64, &'g Vector3<f64>, &'g Vector3<f64>) + Sync,
{
    #[cfg(not(feature = "parallel"))]
    let iterator = set.endpoints.iter().zip(set.mechanics.iter());

    #[cfg(feature = "parallel")]
    let iterator = set.endpoints.par_iter().zip(set.mechanics.par_iter());

    iterator
        .map(|(&(a, b), mechanics)| {
            let (direction, distance, phi_a, phi_b) = geometry(a, b);
            law.evaluate(mechanics, &direction, distance, phi_a, phi_b)
        })
        .collect()
}
