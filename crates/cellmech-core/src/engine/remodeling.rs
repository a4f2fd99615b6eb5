use super::config::RemodelingConfig;
use super::gillespie::{self, Selection};
use crate::core::mechanics::evaluator::ForceEvaluator;
use crate::core::models::error::StoreError;
use crate::core::models::link::{Link, LinkParams};
use crate::core::models::network::CellNetwork;
use crate::core::models::substrate::SubstrateStore;
use crate::core::topology::crossing::{crosses_any, greedy_uncrossing};
use rand::Rng;
use tracing::{debug, info, instrument};

/// Pairs closer than this are never proposed as new links.
const MIN_LINK_DISTANCE: f64 = 1e-5;

/// A link in either store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LinkTarget {
    /// Cell–cell link, lower index first.
    Cells(usize, usize),
    Substrate { cell: usize, site: usize },
}

/// A possible remodeling event and its rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub target: LinkTarget,
    pub propensity: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemodelEvent {
    Added(LinkTarget),
    Removed(LinkTarget),
    /// Total propensity was negligible.
    Idle,
    /// The drawn waiting time exceeded one time unit.
    Deferred,
}

/// What one remodeling step did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RemodelOutcome {
    /// Simulated time consumed by the step.
    pub elapsed: f64,
    pub event: RemodelEvent,
    /// Links removed by crossing resolution before the event was drawn.
    pub crossings_removed: usize,
}

/// Removal candidates: every link that is not compressed.
///
/// The propensity grows exponentially with the link force, `exp(|F| / force_limit)`,
/// scaled by the removal rate. Link forces are read from the stores, so they must be
/// current.
pub fn removal_candidates(
    network: &CellNetwork,
    substrate: Option<&SubstrateStore>,
    config: &RemodelingConfig,
) -> Vec<Candidate> {
    let propensity = |link: &Link| {
        (link.state.distance >= link.mechanics.rest_length).then(|| {
            (link.state.force.norm() / config.force_limit).exp() * config.removal_rate
        })
    };

    let cells = network.links().filter_map(|(key, link)| {
        propensity(link).map(|p| Candidate {
            target: LinkTarget::Cells(key.lo(), key.hi()),
            propensity: p,
        })
    });
    let sites = substrate
        .into_iter()
        .flat_map(|s| s.links())
        .filter_map(|(key, link)| {
            propensity(link).map(|p| Candidate {
                target: LinkTarget::Substrate {
                    cell: key.cell,
                    site: key.site,
                },
                propensity: p,
            })
        });
    cells.chain(sites).collect()
}

/// Addition candidates: unlinked spatial neighbors within the maximum link distance.
///
/// Planar networks also reject cell pairs whose segment would cross an existing link.
/// The propensity falls linearly with distance, `1 - d / max_link_distance`, scaled by
/// the addition rate.
pub fn addition_candidates(
    network: &CellNetwork,
    substrate: Option<&SubstrateStore>,
    config: &RemodelingConfig,
) -> Vec<Candidate> {
    let max_distance = config.max_link_distance;
    let sites = substrate.map_or(&[][..], |s| s.positions());
    let pairs = config.neighbor_search.find(
        network.dimensionality(),
        network.positions(),
        sites,
        max_distance,
    );
    let propensity = |d: f64| {
        (d > MIN_LINK_DISTANCE && d <= max_distance)
            .then(|| (1.0 - d / max_distance) * config.addition_rate)
    };

    let existing = network.link_list();
    let planar = network.dimensionality().is_planar();
    let mut candidates = Vec::new();

    for (a, b) in pairs.cells {
        if network.is_linked(a, b) {
            continue;
        }
        let Some(p) = network
            .pair_geometry(a, b)
            .ok()
            .and_then(|(_, d)| propensity(d))
        else {
            continue;
        };
        if planar && crosses_any(a, b, &existing, network.positions()) {
            continue;
        }
        candidates.push(Candidate {
            target: LinkTarget::Cells(a, b),
            propensity: p,
        });
    }

    if let Some(store) = substrate {
        for (cell, site) in pairs.substrate {
            if store.is_linked(cell, site) {
                continue;
            }
            let d = (network.positions()[cell] - sites[site]).norm();
            if let Some(p) = propensity(d) {
                candidates.push(Candidate {
                    target: LinkTarget::Substrate { cell, site },
                    propensity: p,
                });
            }
        }
    }
    candidates
}

/// Mean-reverting random walk of every rest length over a time `dt`.
///
/// Each link draws its own uniform `U` and moves by
/// `rate (d0_eq - d0) dt + noise (2 sqrt(dt) U - sqrt(dt))`; the result is clamped into
/// `[0, max_link_distance]`.
pub fn drift_rest_lengths(
    network: &mut CellNetwork,
    substrate: Option<&mut SubstrateStore>,
    config: &RemodelingConfig,
    dt: f64,
    rng: &mut impl Rng,
) {
    let sqrt_dt = dt.sqrt();
    let mut drift = |link: &mut Link| {
        let d0 = link.mechanics.rest_length;
        let noise = 2.0 * sqrt_dt * rng.r#gen::<f64>() - sqrt_dt;
        let next = d0
            + config.rest_length_drift_rate * (config.rest_length_equilibrium - d0) * dt
            + config.rest_length_noise * noise;
        link.mechanics.rest_length = next.clamp(0.0, config.max_link_distance);
    };
    for (_, link) in network.links_mut() {
        drift(link);
    }
    if let Some(store) = substrate {
        for (_, link) in store.links_mut() {
            drift(link);
        }
    }
}

fn apply_event(
    event: RemodelEvent,
    network: &mut CellNetwork,
    substrate: Option<&mut SubstrateStore>,
) -> Result<(), StoreError> {
    match event {
        RemodelEvent::Removed(LinkTarget::Cells(a, b)) => {
            network.remove_link(a, b);
        }
        RemodelEvent::Removed(LinkTarget::Substrate { cell, site }) => {
            if let Some(store) = substrate {
                store.remove_link(cell, site);
            }
        }
        RemodelEvent::Added(LinkTarget::Cells(a, b)) => {
            network.add_link(a, b, &LinkParams::new())?;
        }
        RemodelEvent::Added(LinkTarget::Substrate { cell, site }) => {
            if let Some(store) = substrate {
                store.add_link(network, cell, site, &LinkParams::new())?;
            }
        }
        RemodelEvent::Idle | RemodelEvent::Deferred => {}
    }
    Ok(())
}

/// Performs one remodeling step on relaxed stores.
///
/// Optionally resolves crossings (planar networks only), draws one event among removal
/// and addition candidates, applies it, drifts all rest lengths over the drawn time and
/// finally re-evaluates link loads for the new topology.
///
/// # Errors
///
/// Returns [`StoreError`] if the stores reject the chosen mutation.
#[instrument(skip_all, name = "remodeling")]
pub fn remodel(
    network: &mut CellNetwork,
    mut substrate: Option<&mut SubstrateStore>,
    config: &RemodelingConfig,
    rng: &mut impl Rng,
) -> Result<RemodelOutcome, StoreError> {
    let mut crossings_removed = 0;
    if config.check_crossings && network.dimensionality().is_planar() {
        for (a, b) in greedy_uncrossing(&network.link_list(), network.positions()) {
            network.remove_link(a, b);
            crossings_removed += 1;
        }
        if crossings_removed > 0 {
            info!(removed = crossings_removed, "Resolved crossing links.");
        }
    }

    let removals = removal_candidates(network, substrate.as_deref(), config);
    let additions = addition_candidates(network, substrate.as_deref(), config);
    let propensities: Vec<f64> = removals
        .iter()
        .chain(&additions)
        .map(|c| c.propensity)
        .collect();
    debug!(
        removals = removals.len(),
        additions = additions.len(),
        total = propensities.iter().sum::<f64>(),
        "Candidates collected."
    );

    let selection = gillespie::select(&propensities, rng);
    let event = match selection {
        Selection::Idle { .. } => RemodelEvent::Idle,
        Selection::Deferred { .. } => RemodelEvent::Deferred,
        Selection::Event { index, .. } if index < removals.len() => {
            RemodelEvent::Removed(removals[index].target)
        }
        Selection::Event { index, .. } => {
            RemodelEvent::Added(additions[index - removals.len()].target)
        }
    };
    apply_event(event, network, substrate.as_deref_mut())?;

    let elapsed = selection.wait();
    drift_rest_lengths(network, substrate.as_deref_mut(), config, elapsed, rng);
    ForceEvaluator::new(network, substrate.as_deref()).apply(network, substrate)?;

    debug!(?event, elapsed, links = network.link_count(), "Remodeling step done.");
    Ok(RemodelOutcome {
        elapsed,
        event,
        crossings_removed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::dimension::Dimensionality;
    use crate::core::models::link::LinkDefaults;
    use crate::core::topology::neighbors::NeighborSearch;
    use nalgebra::Vector3;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn unit_square(dims: Dimensionality) -> CellNetwork {
        CellNetwork::new(
            dims,
            vec![
                Vector3::new(0.0, 0.0, 0.0),
                Vector3::new(1.0, 0.0, 0.0),
                Vector3::new(1.0, 1.0, 0.0),
                Vector3::new(0.0, 1.0, 0.0),
                Vector3::new(3.0, 0.0, 0.0),
            ],
            LinkDefaults::default(),
        )
        .unwrap()
    }

    fn radius_config(max_link_distance: f64) -> RemodelingConfig {
        RemodelingConfig {
            max_link_distance,
            neighbor_search: NeighborSearch::Radius,
            ..RemodelingConfig::default()
        }
    }

    fn targets(candidates: &[Candidate]) -> Vec<LinkTarget> {
        candidates.iter().map(|c| c.target).collect()
    }

    #[test]
    fn removal_skips_compressed_links() {
        let mut network = CellNetwork::new(
            Dimensionality::Spatial,
            vec![Vector3::zeros(), Vector3::new(1.0, 0.0, 0.0), Vector3::new(2.5, 0.0, 0.0)],
            LinkDefaults::default(),
        )
        .unwrap();
        network.add_link(0, 1, &LinkParams::new().rest_length(1.5)).unwrap();
        network.add_link(1, 2, &LinkParams::new().rest_length(1.0)).unwrap();
        ForceEvaluator::new(&network, None).apply(&mut network, None).unwrap();

        let config = RemodelingConfig::default();
        let candidates = removal_candidates(&network, None, &config);
        assert_eq!(targets(&candidates), vec![LinkTarget::Cells(1, 2)]);
        let expected = (network.link_force(1, 2).norm() / 15.0).exp() * 0.2;
        assert!((candidates[0].propensity - expected).abs() < 1e-12);
    }

    #[test]
    fn addition_skips_linked_distant_and_crossing_pairs() {
        let mut network = unit_square(Dimensionality::Planar);
        network.add_link(0, 2, &LinkParams::new()).unwrap();
        let candidates = addition_candidates(&network, None, &radius_config(1.5));
        let mut found = targets(&candidates);
        found.sort();
        assert_eq!(
            found,
            vec![
                LinkTarget::Cells(0, 1),
                LinkTarget::Cells(0, 3),
                LinkTarget::Cells(1, 2),
                LinkTarget::Cells(2, 3),
            ]
        );
        for c in &candidates {
            assert!((c.propensity - (1.0 - 1.0 / 1.5)).abs() < 1e-12);
        }
    }

    #[test]
    fn spatial_networks_do_not_filter_crossings() {
        let mut network = unit_square(Dimensionality::Spatial);
        network.add_link(0, 2, &LinkParams::new()).unwrap();
        let candidates = addition_candidates(&network, None, &radius_config(1.5));
        assert!(targets(&candidates).contains(&LinkTarget::Cells(1, 3)));
    }

    #[test]
    fn delaunay_candidates_respect_distance_limit() {
        let network = unit_square(Dimensionality::Planar);
        let config = RemodelingConfig {
            max_link_distance: 1.2,
            ..RemodelingConfig::default()
        };
        for c in addition_candidates(&network, None, &config) {
            let LinkTarget::Cells(a, b) = c.target else {
                panic!("no substrate present");
            };
            assert!(network.pair_geometry(a, b).unwrap().1 <= 1.2);
            assert!(!network.is_linked(a, b));
        }
    }

    #[test]
    fn substrate_pairs_become_candidates() {
        let network = CellNetwork::new(
            Dimensionality::Spatial,
            vec![Vector3::new(0.0, 0.0, 0.5)],
            LinkDefaults::default(),
        )
        .unwrap();
        let substrate = SubstrateStore::new(vec![Vector3::zeros(), Vector3::new(5.0, 0.0, 0.0)]).unwrap();
        let candidates = addition_candidates(&network, Some(&substrate), &radius_config(2.0));
        assert_eq!(
            targets(&candidates),
            vec![LinkTarget::Substrate { cell: 0, site: 0 }]
        );
        assert!((candidates[0].propensity - 0.75).abs() < 1e-12);
    }

    #[test]
    fn drift_reverts_toward_equilibrium_without_noise() {
        let mut network = unit_square(Dimensionality::Spatial);
        network.add_link(0, 1, &LinkParams::new().rest_length(2.0)).unwrap();
        let config = RemodelingConfig {
            rest_length_noise: 0.0,
            ..RemodelingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(0);
        drift_rest_lengths(&mut network, None, &config, 1.0, &mut rng);
        assert!((network.rest_length(0, 1) - 1.8).abs() < 1e-12);
    }

    #[test]
    fn drift_keeps_rest_lengths_in_bounds() {
        let mut network = unit_square(Dimensionality::Spatial);
        network.add_link(0, 1, &LinkParams::new()).unwrap();
        network.add_link(1, 2, &LinkParams::new()).unwrap();
        let config = RemodelingConfig {
            rest_length_noise: 5.0,
            ..RemodelingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..200 {
            drift_rest_lengths(&mut network, None, &config, 1.0, &mut rng);
            for (a, b) in network.link_list() {
                let d0 = network.rest_length(a, b);
                assert!((0.0..=2.0).contains(&d0));
            }
        }
    }

    #[test]
    fn isolated_node_step_is_idle() {
        let mut network = CellNetwork::new(
            Dimensionality::Spatial,
            vec![Vector3::zeros()],
            LinkDefaults::default(),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = remodel(&mut network, None, &RemodelingConfig::default(), &mut rng).unwrap();
        assert_eq!(outcome.event, RemodelEvent::Idle);
        assert_eq!(outcome.elapsed, 1.0);
    }

    #[test]
    fn crossing_resolution_runs_before_event_selection() {
        let mut network = unit_square(Dimensionality::Planar);
        network.add_link(0, 2, &LinkParams::new()).unwrap();
        network.add_link(1, 3, &LinkParams::new()).unwrap();
        let config = RemodelingConfig {
            check_crossings: true,
            addition_rate: 0.0,
            removal_rate: 0.0,
            ..RemodelingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(1);
        let outcome = remodel(&mut network, None, &config, &mut rng).unwrap();
        assert_eq!(outcome.crossings_removed, 1);
        assert_eq!(outcome.event, RemodelEvent::Idle);
        assert_eq!(network.link_list(), vec![(1, 3)]);
    }

    #[test]
    fn strong_removal_rate_removes_the_only_link() {
        let mut network = CellNetwork::new(
            Dimensionality::Spatial,
            vec![Vector3::zeros(), Vector3::new(1.5, 0.0, 0.0)],
            LinkDefaults::default(),
        )
        .unwrap();
        network.add_link(0, 1, &LinkParams::new().rest_length(1.0)).unwrap();
        ForceEvaluator::new(&network, None).apply(&mut network, None).unwrap();
        let config = RemodelingConfig {
            removal_rate: 1e3,
            ..RemodelingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(2);
        let outcome = remodel(&mut network, None, &config, &mut rng).unwrap();
        assert_eq!(outcome.event, RemodelEvent::Removed(LinkTarget::Cells(0, 1)));
        assert!(outcome.elapsed < 1.0);
        assert_eq!(network.link_count(), 0);
        assert_eq!(network.link_force(0, 1), Vector3::zeros());
    }

    #[test]
    fn added_link_captures_current_distance() {
        let mut network = CellNetwork::new(
            Dimensionality::Spatial,
            vec![Vector3::zeros(), Vector3::new(0.5, 0.0, 0.0)],
            LinkDefaults::default(),
        )
        .unwrap();
        let config = RemodelingConfig {
            addition_rate: 1e3,
            rest_length_noise: 0.0,
            rest_length_drift_rate: 0.0,
            ..RemodelingConfig::default()
        };
        let mut rng = StdRng::seed_from_u64(3);
        let outcome = remodel(&mut network, None, &config, &mut rng).unwrap();
        assert_eq!(outcome.event, RemodelEvent::Added(LinkTarget::Cells(0, 1)));
        assert!((network.rest_length(0, 1) - 0.5).abs() < 1e-12);
    }
}
