//! # Workflows Module
//!
//! Top-level entry points that tie the stores and the engine together.
//!
//! - **Simulation** ([`simulate`]) - Alternating relaxation and remodeling with optional
//!   recording, progress reporting and cancellation.

pub mod simulate;
