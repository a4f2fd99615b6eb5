//! # Core Models Module
//!
//! Data structures describing the mechanical state of a cell network.
//!
//! ## Overview
//!
//! A simulation owns one [`network::CellNetwork`] (the cells and the links between them)
//! and optionally one [`substrate::SubstrateStore`] (fixed attachment sites cells can link
//! to). Both keep their links in ordered maps so that every walk over the link set, and
//! therefore every seeded stochastic decision, happens in a reproducible order.
//!
//! ## Key Components
//!
//! - [`dimension`] - Planar or spatial networks
//! - [`link`] - Link keys, creation parameters, stored mechanics and per-evaluation state
//! - [`loading`] - External forces and anchor springs acting on nodes
//! - [`network`] - The cell–cell store
//! - [`substrate`] - The cell–substrate store
//! - [`error`] - Errors raised by store mutations
//!
//! ## Usage
//!
//! ```ignore
//! use cellmech::core::models::{dimension::Dimensionality, link::*, network::CellNetwork};
//!
//! let mut network = CellNetwork::new(Dimensionality::Spatial, positions, LinkDefaults::default())?;
//! network.add_link(0, 1, &LinkParams::new().rest_length(1.0))?;
//! assert!(network.is_linked(1, 0));
//! ```

pub mod dimension;
pub mod error;
pub mod link;
pub mod loading;
pub mod network;
pub mod substrate;
