//! # Core Module
//!
//! Stateless building blocks of the simulation: the network stores, the elastic link law
//! and the spatial queries that drive topology changes.
//!
//! ## Architecture
//!
//! - **Network State** ([`models`]) - Cells, substrate sites, links and node loading
//! - **Link Mechanics** ([`mechanics`]) - Stretch, bend and twist loads and their assembly
//! - **Spatial Structure** ([`topology`]) - Delaunay and radius neighbors, link crossings
//! - **Geometry** ([`utils`]) - Rotations and segment tests on `nalgebra` vectors
//!
//! Nothing in this layer owns a random source or advances time; that is the job of the
//! [`engine`](crate::engine).

pub mod mechanics;
pub mod models;
pub mod topology;
pub mod utils;
