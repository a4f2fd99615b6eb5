use super::config::{IntegrationScheme, RelaxationConfig, ResidualNorm};
use super::solvers::{DormandPrince, DynamicalSystem, Rk4, StepOutcome};
use crate::core::mechanics::evaluator::ForceEvaluator;
use crate::core::models::error::StoreError;
use crate::core::models::network::CellNetwork;
use crate::core::models::substrate::SubstrateStore;
use nalgebra::Vector3;
use tracing::{debug, info, instrument, warn};

/// Steps below this size mean the adaptive integrator cannot make progress.
const MIN_STEP: f64 = 1e-12;

/// Outcome of one relaxation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelaxationReport {
    /// Simulated time integrated.
    pub elapsed: f64,
    /// Accepted integrator steps.
    pub steps: usize,
    /// Residual at the final state.
    pub residual: f64,
    /// Whether the residual dropped below `qmin` within the budget.
    pub converged: bool,
}

/// Over-damped equations of motion of a network with fixed topology.
///
/// The state vector holds cell positions, then cell orientations, then substrate
/// orientations, three components each. Positions move with the node force, orientations
/// with the node torque, and substrate orientations with the site torque scaled by the
/// creep rate.
pub struct MechanicalSystem<'a> {
    evaluator: &'a ForceEvaluator,
    cell_count: usize,
    site_count: usize,
    creep_rate: f64,
}

impl<'a> MechanicalSystem<'a> {
    pub fn new(
        evaluator: &'a ForceEvaluator,
        cell_count: usize,
        site_count: usize,
        creep_rate: f64,
    ) -> Self {
        Self {
            evaluator,
            cell_count,
            site_count,
            creep_rate,
        }
    }

    /// Residual of a derivative vector; only cell forces and torques count.
    pub fn residual(&self, derivative: &[f64], norm: ResidualNorm) -> f64 {
        let n = 3 * self.cell_count;
        let (forces, torques) = (&derivative[..n], &derivative[n..2 * n]);
        match norm {
            ResidualNorm::MeanSquare => {
                let sum: f64 = forces.iter().chain(torques).map(|x| x * x).sum();
                sum / self.cell_count as f64
            }
            ResidualNorm::MaxAbs => forces
                .chunks_exact(3)
                .chain(torques.chunks_exact(3))
                .map(|v| Vector3::from_column_slice(v).norm())
                .fold(0.0, f64::max),
        }
    }
}

impl DynamicalSystem for MechanicalSystem<'_> {
    fn dimension(&self) -> usize {
        3 * (2 * self.cell_count + self.site_count)
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let n = 3 * self.cell_count;
        let positions = unpack(&x[..n]);
        let orientations = unpack(&x[n..2 * n]);
        let site_orientations = unpack(&x[2 * n..]);
        let evaluation = self
            .evaluator
            .evaluate(&positions, &orientations, &site_orientations);

        pack_into(&evaluation.forces, &mut out[..n]);
        pack_into(&evaluation.torques, &mut out[n..2 * n]);
        let creep = &mut out[2 * n..];
        if evaluation.site_torques.is_empty() {
            creep.fill(0.0);
        } else {
            pack_into(&evaluation.site_torques, creep);
            creep.iter_mut().for_each(|c| *c *= self.creep_rate);
        }
    }
}

fn unpack(flat: &[f64]) -> Vec<Vector3<f64>> {
    flat.chunks_exact(3).map(Vector3::from_column_slice).collect()
}

fn pack_into(vectors: &[Vector3<f64>], out: &mut [f64]) {
    for (chunk, v) in out.chunks_exact_mut(3).zip(vectors) {
        chunk.copy_from_slice(v.as_slice());
    }
}

fn pack_state(network: &CellNetwork, substrate: Option<&SubstrateStore>) -> Vec<f64> {
    let sites = substrate.map_or(&[][..], |s| s.orientations());
    network
        .positions()
        .iter()
        .chain(network.orientations())
        .chain(sites)
        .flat_map(|v| v.iter().copied())
        .collect()
}

/// Writes an integrator state back into the stores and refreshes all loads.
fn commit(
    state: &[f64],
    evaluator: &ForceEvaluator,
    network: &mut CellNetwork,
    mut substrate: Option<&mut SubstrateStore>,
) -> Result<(), StoreError> {
    let n = 3 * network.node_count();
    network.set_configuration(unpack(&state[..n]), unpack(&state[n..2 * n]))?;
    if let Some(store) = substrate.as_deref_mut() {
        store.set_orientations(unpack(&state[2 * n..]))?;
    }
    evaluator.apply(network, substrate)
}

/// Relaxes the network toward mechanical equilibrium without changing its topology.
///
/// Integrates until the residual drops below `qmin`, `max_steps` steps were taken, or the
/// time budget `dt * max_steps` is spent. Non-convergence is reported, not raised. The
/// stores are left at the final state with forces, torques and link loads evaluated there.
///
/// # Arguments
///
/// * `network` - Cells and links to relax.
/// * `substrate` - Optional substrate whose orientations creep alongside.
/// * `config` - Integrator settings.
/// * `creep_rate` - Factor on the substrate torque in the substrate equation of motion.
/// * `observer` - Called after every accepted step with the elapsed time and the updated
///   stores; stores are kept current only while an observer is present.
///
/// # Errors
///
/// Returns [`StoreError`] if writing the state back into the stores fails.
#[instrument(skip_all, name = "relaxation")]
pub fn relax(
    network: &mut CellNetwork,
    mut substrate: Option<&mut SubstrateStore>,
    config: &RelaxationConfig,
    creep_rate: f64,
    mut observer: Option<&mut dyn FnMut(f64, &CellNetwork, Option<&SubstrateStore>)>,
) -> Result<RelaxationReport, StoreError> {
    let evaluator = ForceEvaluator::new(network, substrate.as_deref());
    let site_count = substrate.as_deref().map_or(0, SubstrateStore::site_count);
    let system = MechanicalSystem::new(&evaluator, network.node_count(), site_count, creep_rate);

    debug!(
        cell_links = evaluator.cell_link_count(),
        substrate_links = evaluator.substrate_link_count(),
        dimension = system.dimension(),
        scheme = ?config.scheme,
        "Relaxation started."
    );

    let mut state = pack_state(network, substrate.as_deref());
    let mut derivative = vec![0.0; system.dimension()];
    let budget = config.dt * config.max_steps as f64;
    let mut t = 0.0;
    let mut steps = 0;
    let mut residual;
    let converged;

    match config.scheme {
        IntegrationScheme::Rk4 => {
            let mut solver = Rk4::new(system.dimension());
            loop {
                system.apply(t, &state, &mut derivative);
                residual = system.residual(&derivative, config.residual_norm);
                if residual < config.qmin || steps >= config.max_steps {
                    converged = residual < config.qmin;
                    break;
                }
                // `t` counts integrated steps only; the final evaluation is not a step.
                solver.step_from(&system, &mut t, &mut state, config.dt, &derivative);
                steps += 1;
                if let Some(observe) = observer.as_deref_mut() {
                    commit(&state, &evaluator, network, substrate.as_deref_mut())?;
                    observe(t, network, substrate.as_deref());
                }
            }
        }
        IntegrationScheme::Adaptive => {
            let mut solver =
                DormandPrince::new(system.dimension(), config.abs_tolerance, config.rel_tolerance);
            solver.prime(&system, t, &state);
            let mut h = config.dt;
            loop {
                residual = system.residual(solver.derivative(), config.residual_norm);
                if residual < config.qmin {
                    converged = true;
                    break;
                }
                let remaining = budget - t;
                if steps >= config.max_steps || remaining <= MIN_STEP {
                    converged = false;
                    break;
                }
                if h < MIN_STEP {
                    warn!(t, h, "Step size underflow; stopping relaxation.");
                    converged = false;
                    break;
                }
                match solver.try_step(&system, &mut t, &mut state, h.min(remaining)) {
                    StepOutcome::Accepted { next, .. } => {
                        steps += 1;
                        h = next;
                        if let Some(observe) = observer.as_deref_mut() {
                            commit(&state, &evaluator, network, substrate.as_deref_mut())?;
                            observe(t, network, substrate.as_deref());
                        }
                    }
                    StepOutcome::Rejected { next } => {
                        debug!(t, h, next, "Step rejected.");
                        h = next;
                    }
                }
            }
        }
    }

    commit(&state, &evaluator, network, substrate)?;

    if converged {
        info!(elapsed = t, steps, residual, "Relaxation converged.");
    } else {
        warn!(
            elapsed = t,
            steps, residual, "Relaxation stopped before reaching equilibrium."
        );
    }

    Ok(RelaxationReport {
        elapsed: t,
        steps,
        residual,
        converged,
    })
}
