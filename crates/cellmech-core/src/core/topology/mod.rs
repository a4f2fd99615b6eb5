//! # Topology Module
//!
//! Spatial adjacency and planar crossing tests used to propose and vet links.
//!
//! ## Overview
//!
//! New links may only join nodes that are spatial neighbors. Neighbors come either from
//! a Delaunay triangulation of all nodes and substrate sites (the default) or from a
//! radius query on a k-d tree. In planar networks two links must not cross, so the same
//! module also detects crossings and resolves them greedily.
//!
//! ## Key Components
//!
//! - [`delaunay`] - Bowyer–Watson triangulation in two or three dimensions
//! - [`neighbors`] - [`neighbors::NeighborSearch`] strategies producing candidate pairs
//! - [`crossing`] - Segment crossing detection and greedy uncrossing

pub mod crossing;
pub mod delaunay;
pub mod neighbors;
