//! # cellmech
//!
//! Mechanics of dynamic networks of elastic cells. Cells are point nodes with a position
//! and an orientation; links between them behave as discrete elastic rods resisting
//! stretching, bending and twisting. Links appear and disappear stochastically, with
//! removal favoured under tension, while the network relaxes toward quasi-static
//! equilibrium between topology changes.
//!
//! ## Architectural Philosophy
//!
//! The library follows a three-layer architecture.
//!
//! - **[`core`]: The Foundation.** Network stores (`CellNetwork`, `SubstrateStore`), the
//!   per-dimension force laws and the spatial queries (Delaunay adjacency, crossings).
//!
//! - **[`engine`]: The Logic Core.** Configuration, the ODE integrators, relaxation,
//!   Gillespie event selection, remodeling and trace recording.
//!
//! - **[`workflows`]: The Public API.** The [`Simulation`](workflows::simulate::Simulation)
//!   driver, which owns the stores and the random source and alternates relaxation with
//!   remodeling up to a requested time.
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod core;
pub mod engine;
pub mod workflows;
