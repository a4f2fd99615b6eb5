use thiserror::Error;

use super::config::ConfigError;
use crate::core::models::dimension::Dimensionality;
use crate::core::models::error::StoreError;

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("Configuration error: {source}")]
    Config {
        #[from]
        source: ConfigError,
    },

    #[error("Network store error: {source}")]
    Store {
        #[from]
        source: StoreError,
    },

    #[error("Network is {network} but the configuration requests {config}")]
    DimensionalityMismatch {
        network: Dimensionality,
        config: Dimensionality,
    },

    #[error("Simulation was cancelled at t = {time}")]
    Cancelled { time: f64 },
}
