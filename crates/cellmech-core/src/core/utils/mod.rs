//! Stateless numeric helpers shared by the stores and the engine.

pub mod geometry;
