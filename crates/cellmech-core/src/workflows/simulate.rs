use crate::core::mechanics::evaluator::ForceEvaluator;
use crate::core::models::network::CellNetwork;
use crate::core::models::substrate::SubstrateStore;
use crate::engine::config::SimulationConfig;
use crate::engine::error::SimulationError;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::relaxation::{self, RelaxationReport};
use crate::engine::remodeling::{self, RemodelEvent, RemodelOutcome};
use crate::engine::trace::{Snapshot, Trace};
use nalgebra::Vector3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::{debug, info, instrument};

/// Owner of a cell network, its optional substrate and the random source driving it.
///
/// Time only moves forward: every relaxation advances it by the integrated time and every
/// remodeling step by the drawn waiting time.
#[derive(Debug)]
pub struct Simulation {
    network: CellNetwork,
    substrate: Option<SubstrateStore>,
    config: SimulationConfig,
    rng: StdRng,
    time: f64,
}

impl Simulation {
    /// Takes ownership of the stores and evaluates their initial loads.
    ///
    /// Links created later by remodeling use the network's own link defaults. The random
    /// source is seeded from `config.seed`, or from the operating system when absent.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Config`] for an invalid configuration,
    /// [`SimulationError::DimensionalityMismatch`] if the network and configuration disagree,
    /// and [`SimulationError::Store`] if a link rests longer than
    /// `config.remodeling.max_link_distance`. That distance also caps links added later.
    pub fn new(
        mut network: CellNetwork,
        mut substrate: Option<SubstrateStore>,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        config.validate()?;
        if network.dimensionality() != config.dimensionality {
            return Err(SimulationError::DimensionalityMismatch {
                network: network.dimensionality(),
                config: config.dimensionality,
            });
        }
        let max_rest_length = config.remodeling.max_link_distance;
        network.limit_rest_length(max_rest_length)?;
        if let Some(store) = &substrate {
            for (_, link) in store.links() {
                link.check_rest_length(max_rest_length)?;
            }
        }
        ForceEvaluator::new(&network, substrate.as_ref()).apply(&mut network, substrate.as_mut())?;

        let rng = config
            .seed
            .map_or_else(StdRng::from_entropy, StdRng::seed_from_u64);
        info!(
            dimensionality = %config.dimensionality,
            nodes = network.node_count(),
            links = network.link_count(),
            sites = substrate.as_ref().map_or(0, SubstrateStore::site_count),
            seed = ?config.seed,
            "Simulation initialized."
        );
        Ok(Self {
            network,
            substrate,
            config,
            rng,
            time: 0.0,
        })
    }

    /// Creates an unlinked network from positions using the configured dimensionality
    /// and link defaults.
    pub fn from_positions(
        positions: Vec<Vector3<f64>>,
        config: SimulationConfig,
    ) -> Result<Self, SimulationError> {
        let network = CellNetwork::new(config.dimensionality, positions, config.links)?;
        Self::new(network, None, config)
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn network(&self) -> &CellNetwork {
        &self.network
    }

    /// Mutable access for setup such as anchors, external forces or extra links.
    ///
    /// Loads are refreshed by the next relaxation.
    pub fn network_mut(&mut self) -> &mut CellNetwork {
        &mut self.network
    }

    pub fn substrate(&self) -> Option<&SubstrateStore> {
        self.substrate.as_ref()
    }

    /// Mutable access to the substrate, together with the network its links refer to.
    pub fn substrate_mut(&mut self) -> Option<(&mut SubstrateStore, &CellNetwork)> {
        self.substrate.as_mut().map(|s| (s, &self.network))
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Current state stamped with the current time.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(self.time, &self.network, self.substrate.as_ref())
    }

    /// Relaxes the network at fixed topology and advances time by the integrated time.
    ///
    /// Running out of budget is not an error; check [`RelaxationReport::converged`].
    pub fn run_mechanical_relaxation(&mut self) -> Result<RelaxationReport, SimulationError> {
        let report = relaxation::relax(
            &mut self.network,
            self.substrate.as_mut(),
            &self.config.relaxation,
            self.config.substrate_creep_rate,
            None,
        )?;
        self.time += report.elapsed;
        Ok(report)
    }

    /// Relaxes like [`run_mechanical_relaxation`](Self::run_mechanical_relaxation) and
    /// records a snapshot before the first and after every accepted integrator step.
    pub fn relax_recorded(&mut self) -> Result<(RelaxationReport, Trace), SimulationError> {
        let start = self.time;
        let mut trace = Trace::new();
        trace.push(self.snapshot());

        let mut record = |t: f64, network: &CellNetwork, substrate: Option<&SubstrateStore>| {
            trace.push(Snapshot::capture(start + t, network, substrate));
        };
        let observer: &mut dyn FnMut(f64, &CellNetwork, Option<&SubstrateStore>) = &mut record;
        let report = relaxation::relax(
            &mut self.network,
            self.substrate.as_mut(),
            &self.config.relaxation,
            self.config.substrate_creep_rate,
            Some(observer),
        )?;
        self.time += report.elapsed;
        Ok((report, trace))
    }

    /// Performs one remodeling step and advances time by its waiting time.
    pub fn run_remodeling_step(&mut self) -> Result<RemodelOutcome, SimulationError> {
        let outcome = remodeling::remodel(
            &mut self.network,
            self.substrate.as_mut(),
            &self.config.remodeling,
            &mut self.rng,
        )?;
        self.time += outcome.elapsed;
        Ok(outcome)
    }

    /// Alternates relaxation and remodeling until the time reaches `target`.
    ///
    /// With `record` set the trace holds the starting state plus one snapshot after each
    /// relaxation and one after each remodeling step.
    pub fn run_until(&mut self, target: f64, record: bool) -> Result<Trace, SimulationError> {
        self.run_until_with(target, record, &ProgressReporter::new())
    }

    /// [`run_until`](Self::run_until) with progress events and cooperative cancellation.
    ///
    /// # Errors
    ///
    /// Returns [`SimulationError::Cancelled`] if the reporter's flag is raised; the check
    /// runs before each relaxation and before each remodeling step, and the stores keep
    /// the state reached so far.
    #[instrument(skip_all, name = "simulation_run", fields(horizon = target))]
    pub fn run_until_with(
        &mut self,
        target: f64,
        record: bool,
        reporter: &ProgressReporter,
    ) -> Result<Trace, SimulationError> {
        let mut trace = Trace::new();
        if record {
            trace.push(self.snapshot());
        }
        let mut cycles = 0usize;
        let mut events = 0usize;
        let mut unconverged = 0usize;

        while self.time < target {
            self.check_cancelled(reporter)?;
            reporter.report(Progress::PhaseStart { name: "Relaxation" });
            let report = self.run_mechanical_relaxation()?;
            reporter.report(Progress::PhaseFinish);
            if !report.converged {
                unconverged += 1;
                reporter.report(Progress::Message(format!(
                    "Relaxation stopped after {} steps with residual {:.3e}",
                    report.steps, report.residual
                )));
            }
            if record {
                trace.push(self.snapshot());
            }

            self.check_cancelled(reporter)?;
            reporter.report(Progress::PhaseStart { name: "Remodeling" });
            let outcome = self.run_remodeling_step()?;
            reporter.report(Progress::PhaseFinish);
            if matches!(outcome.event, RemodelEvent::Added(_) | RemodelEvent::Removed(_)) {
                events += 1;
            }
            if record {
                trace.push(self.snapshot());
            }

            cycles += 1;
            debug!(cycle = cycles, time = self.time, event = ?outcome.event, "Cycle complete.");
            reporter.report(Progress::TimeAdvanced {
                time: self.time,
                horizon: target,
            });
        }

        info!(
            time = self.time,
            cycles,
            events,
            unconverged,
            links = self.network.link_count(),
            "Simulation reached target time."
        );
        Ok(trace)
    }

    fn check_cancelled(&self, reporter: &ProgressReporter) -> Result<(), SimulationError> {
        if reporter.is_cancelled() {
            info!(time = self.time, "Simulation cancelled.");
            return Err(SimulationError::Cancelled { time: self.time });
        }
        Ok(())
    }
}
