//! # Engine Module
//!
//! The stateful processes that move a cell network forward in time.
//!
//! ## Overview
//!
//! A simulation alternates two processes. **Relaxation** integrates the over-damped
//! equations of motion of a network with fixed topology until the remaining force and
//! torque imbalance falls below a threshold or the step budget runs out. **Remodeling**
//! then changes the topology through one stochastic event chosen with the Gillespie
//! algorithm and lets every rest length drift over the drawn waiting time.
//!
//! ## Architecture
//!
//! - **Configuration** ([`config`]) - Parameters of both processes, TOML loading and a builder
//! - **Integrators** ([`solvers`]) - Fixed-step RK4 and adaptive Dormand–Prince 5(4)
//! - **Relaxation** ([`relaxation`]) - The mechanical system and its relaxation loop
//! - **Event Selection** ([`gillespie`]) - Waiting time and event draw from propensities
//! - **Remodeling** ([`remodeling`]) - Candidate generation, events and rest-length drift
//! - **Recording** ([`trace`]) - Time-stamped snapshots of the network
//! - **Progress Monitoring** ([`progress`]) - Callbacks and cooperative cancellation
//! - **Error Handling** ([`error`]) - Errors surfaced by the simulation driver

pub mod config;
pub mod error;
pub mod gillespie;
pub mod progress;
pub mod relaxation;
pub mod remodeling;
pub mod solvers;
pub mod trace;
