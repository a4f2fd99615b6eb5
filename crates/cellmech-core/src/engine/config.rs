use crate::core::models::dimension::{Dimensionality, UnsupportedDimensions};
use crate::core::models::link::LinkDefaults;
use crate::core::topology::neighbors::NeighborSearch;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid dimensionality: {0}")]
    InvalidDimensionality(#[from] UnsupportedDimensions),

    #[error("Invalid value {value} for '{name}': {reason}")]
    InvalidParameter {
        name: &'static str,
        value: f64,
        reason: &'static str,
    },

    #[error("File I/O error for '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("TOML parsing error for '{path}': {source}")]
    Toml {
        path: String,
        source: toml::de::Error,
    },
}

/// Integrator used for mechanical relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IntegrationScheme {
    /// Classic fourth-order Runge–Kutta with the fixed step `dt`.
    Rk4,
    /// Dormand–Prince 5(4) with error-controlled step size, starting from `dt`.
    #[default]
    Adaptive,
}

/// Scalar measure of the remaining force and torque imbalance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResidualNorm {
    /// `(Σ|F|² + Σ|M|²) / N` over all cells.
    #[default]
    MeanSquare,
    /// Largest force or torque magnitude on any cell.
    MaxAbs,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RelaxationConfig {
    pub dt: f64,
    pub max_steps: usize,
    /// Relaxation stops once the residual drops below this value.
    pub qmin: f64,
    pub scheme: IntegrationScheme,
    pub residual_norm: ResidualNorm,
    pub abs_tolerance: f64,
    pub rel_tolerance: f64,
}

impl Default for RelaxationConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            max_steps: 3000,
            qmin: 0.001,
            scheme: IntegrationScheme::default(),
            residual_norm: ResidualNorm::default(),
            abs_tolerance: 1e-6,
            rel_tolerance: 1e-3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct RemodelingConfig {
    /// Value rest lengths relax toward.
    pub rest_length_equilibrium: f64,
    /// Force scale of the removal propensity.
    pub force_limit: f64,
    pub addition_rate: f64,
    pub removal_rate: f64,
    /// Longest link that may be created; also the upper rest-length bound.
    pub max_link_distance: f64,
    /// Remove crossing links before each step (planar networks only).
    pub check_crossings: bool,
    pub neighbor_search: NeighborSearch,
    pub rest_length_drift_rate: f64,
    pub rest_length_noise: f64,
}

impl Default for RemodelingConfig {
    fn default() -> Self {
        Self {
            rest_length_equilibrium: 1.0,
            force_limit: 15.0,
            addition_rate: 1.0,
            removal_rate: 0.2,
            max_link_distance: 2.0,
            check_crossings: false,
            neighbor_search: NeighborSearch::default(),
            rest_length_drift_rate: 0.2,
            rest_length_noise: 0.05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "kebab-case")]
pub struct SimulationConfig {
    #[serde(rename = "dimensions")]
    pub dimensionality: Dimensionality,
    /// Seed of the simulation's random source; drawn from the OS when absent.
    pub seed: Option<u64>,
    pub relaxation: RelaxationConfig,
    pub remodeling: RemodelingConfig,
    pub links: LinkDefaults,
    /// Factor on the torque driving substrate orientations; zero freezes them.
    pub substrate_creep_rate: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            dimensionality: Dimensionality::default(),
            seed: None,
            relaxation: RelaxationConfig::default(),
            remodeling: RemodelingConfig::default(),
            links: LinkDefaults::default(),
            substrate_creep_rate: 1.0,
        }
    }
}

fn positive(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value,
            reason: "must be positive",
        })
    }
}

fn non_negative(name: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value,
            reason: "must be non-negative",
        })
    }
}

impl SimulationConfig {
    /// Reads a configuration from a TOML file and validates it.
    ///
    /// Missing keys take their default values; unknown keys are rejected.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::Toml {
            path: path.to_string_lossy().to_string(),
            source: e,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let relax = &self.relaxation;
        positive("dt", relax.dt)?;
        positive("max_steps", relax.max_steps as f64)?;
        positive("qmin", relax.qmin)?;
        positive("abs_tolerance", relax.abs_tolerance)?;
        non_negative("rel_tolerance", relax.rel_tolerance)?;

        let remodel = &self.remodeling;
        non_negative("rest_length_equilibrium", remodel.rest_length_equilibrium)?;
        positive("force_limit", remodel.force_limit)?;
        non_negative("addition_rate", remodel.addition_rate)?;
        non_negative("removal_rate", remodel.removal_rate)?;
        positive("max_link_distance", remodel.max_link_distance)?;
        non_negative("rest_length_drift_rate", remodel.rest_length_drift_rate)?;
        non_negative("rest_length_noise", remodel.rest_length_noise)?;
        if remodel.rest_length_equilibrium > remodel.max_link_distance {
            return Err(ConfigError::InvalidParameter {
                name: "rest_length_equilibrium",
                value: remodel.rest_length_equilibrium,
                reason: "must not exceed max_link_distance",
            });
        }

        non_negative("spring_constant", self.links.spring_constant)?;
        non_negative("bending_rigidity", self.links.bending_rigidity)?;
        non_negative("twist_modulus", self.links.twist_modulus)?;
        non_negative("substrate_creep_rate", self.substrate_creep_rate)?;
        Ok(())
    }
}

/// Consuming builder for [`SimulationConfig`].
///
/// Unset values fall back to the defaults; [`build`](Self::build) validates the result.
#[derive(Default)]
pub struct SimulationConfigBuilder {
    dimensions: Option<u8>,
    seed: Option<u64>,
    dt: Option<f64>,
    max_steps: Option<usize>,
    qmin: Option<f64>,
    scheme: Option<IntegrationScheme>,
    residual_norm: Option<ResidualNorm>,
    tolerances: Option<(f64, f64)>,
    rest_length_equilibrium: Option<f64>,
    force_limit: Option<f64>,
    addition_rate: Option<f64>,
    removal_rate: Option<f64>,
    max_link_distance: Option<f64>,
    check_crossings: Option<bool>,
    neighbor_search: Option<NeighborSearch>,
    rest_length_drift: Option<(f64, f64)>,
    link_defaults: Option<LinkDefaults>,
    substrate_creep_rate: Option<f64>,
}

impl SimulationConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimensions(mut self, dims: u8) -> Self {
        self.dimensions = Some(dims);
        self
    }
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }
    pub fn max_steps(mut self, steps: usize) -> Self {
        self.max_steps = Some(steps);
        self
    }
    pub fn qmin(mut self, qmin: f64) -> Self {
        self.qmin = Some(qmin);
        self
    }
    pub fn scheme(mut self, scheme: IntegrationScheme) -> Self {
        self.scheme = Some(scheme);
        self
    }
    pub fn residual_norm(mut self, norm: ResidualNorm) -> Self {
        self.residual_norm = Some(norm);
        self
    }
    pub fn tolerances(mut self, abs: f64, rel: f64) -> Self {
        self.tolerances = Some((abs, rel));
        self
    }
    pub fn rest_length_equilibrium(mut self, d0: f64) -> Self {
        self.rest_length_equilibrium = Some(d0);
        self
    }
    pub fn force_limit(mut self, limit: f64) -> Self {
        self.force_limit = Some(limit);
        self
    }
    pub fn addition_rate(mut self, rate: f64) -> Self {
        self.addition_rate = Some(rate);
        self
    }
    pub fn removal_rate(mut self, rate: f64) -> Self {
        self.removal_rate = Some(rate);
        self
    }
    pub fn max_link_distance(mut self, d0max: f64) -> Self {
        self.max_link_distance = Some(d0max);
        self
    }
    pub fn check_crossings(mut self, check: bool) -> Self {
        self.check_crossings = Some(check);
        self
    }
    pub fn neighbor_search(mut self, search: NeighborSearch) -> Self {
        self.neighbor_search = Some(search);
        self
    }
    pub fn rest_length_drift(mut self, rate: f64, noise: f64) -> Self {
        self.rest_length_drift = Some((rate, noise));
        self
    }
    pub fn link_defaults(mut self, defaults: LinkDefaults) -> Self {
        self.link_defaults = Some(defaults);
        self
    }
    pub fn substrate_creep_rate(mut self, rate: f64) -> Self {
        self.substrate_creep_rate = Some(rate);
        self
    }

    pub fn build(self) -> Result<SimulationConfig, ConfigError> {
        let mut config = SimulationConfig::default();
        if let Some(dims) = self.dimensions {
            config.dimensionality = Dimensionality::try_from(dims)?;
        }
        config.seed = self.seed;

        let relax = &mut config.relaxation;
        relax.dt = self.dt.unwrap_or(relax.dt);
        relax.max_steps = self.max_steps.unwrap_or(relax.max_steps);
        relax.qmin = self.qmin.unwrap_or(relax.qmin);
        relax.scheme = self.scheme.unwrap_or(relax.scheme);
        relax.residual_norm = self.residual_norm.unwrap_or(relax.residual_norm);
        if let Some((abs, rel)) = self.tolerances {
            relax.abs_tolerance = abs;
            relax.rel_tolerance = rel;
        }

        let remodel = &mut config.remodeling;
        remodel.rest_length_equilibrium = self
            .rest_length_equilibrium
            .unwrap_or(remodel.rest_length_equilibrium);
        remodel.force_limit = self.force_limit.unwrap_or(remodel.force_limit);
        remodel.addition_rate = self.addition_rate.unwrap_or(remodel.addition_rate);
        remodel.removal_rate = self.removal_rate.unwrap_or(remodel.removal_rate);
        remodel.max_link_distance = self.max_link_distance.unwrap_or(remodel.max_link_distance);
        remodel.check_crossings = self.check_crossings.unwrap_or(remodel.check_crossings);
        remodel.neighbor_search = self.neighbor_search.unwrap_or(remodel.neighbor_search);
        if let Some((rate, noise)) = self.rest_length_drift {
            remodel.rest_length_drift_rate = rate;
            remodel.rest_length_noise = noise;
        }

        config.links = self.link_defaults.unwrap_or(config.links);
        config.substrate_creep_rate = self
            .substrate_creep_rate
            .unwrap_or(config.substrate_creep_rate);

        config.validate()?;
        Ok(config)
    }
}
