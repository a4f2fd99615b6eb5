use crate::core::models::network::CellNetwork;
use crate::core::models::substrate::SubstrateStore;
use nalgebra::Vector3;
use serde::Serialize;

/// State of the network at one instant.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub time: f64,
    pub positions: Vec<Vector3<f64>>,
    /// Net force on each cell.
    pub forces: Vec<Vector3<f64>>,
    /// Cell links, lower index first, sorted.
    pub links: Vec<(usize, usize)>,
    /// Force magnitude of each entry of `links`.
    pub link_forces: Vec<f64>,
    /// Substrate links as `(cell, site)`; empty without a substrate.
    pub substrate_links: Vec<(usize, usize)>,
    pub substrate_link_forces: Vec<f64>,
}

impl Snapshot {
    pub fn capture(time: f64, network: &CellNetwork, substrate: Option<&SubstrateStore>) -> Self {
        let (substrate_links, substrate_link_forces) = substrate
            .map(|s| (s.link_list(), s.link_force_magnitudes()))
            .unwrap_or_default();
        Self {
            time,
            positions: network.positions().to_vec(),
            forces: network.forces().to_vec(),
            links: network.link_list(),
            link_forces: network.link_force_magnitudes(),
            substrate_links,
            substrate_link_forces,
        }
    }
}

/// Time-ordered sequence of snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Trace {
    snapshots: Vec<Snapshot>,
}

impl Trace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a snapshot; its time must not precede the last one.
    pub fn push(&mut self, snapshot: Snapshot) {
        debug_assert!(self.snapshots.last().is_none_or(|last| last.time <= snapshot.time));
        self.snapshots.push(snapshot);
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn last(&self) -> Option<&Snapshot> {
        self.snapshots.last()
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn times(&self) -> impl Iterator<Item = f64> + '_ {
        self.snapshots.iter().map(|s| s.time)
    }
}

impl IntoIterator for Trace {
    type Item = Snapshot;
    type IntoIter = std::vec::IntoIter<Snapshot>;

    fn into_iter(self) -> Self::IntoIter {
        self.snapshots.into_iter()
    }
}
