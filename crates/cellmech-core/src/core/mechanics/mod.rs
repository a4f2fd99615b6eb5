//! # Mechanics Module
//!
//! Elastic loads carried by links and their reduction to node totals.
//!
//! ## Overview
//!
//! Every link behaves as a short discrete elastic rod. It resists
//!
//! - **stretching** through a linear spring with stiffness `k` and rest length `d0`,
//! - **bending** by torquing each end's preferred tangent back toward the link axis,
//! - **twisting** (3D only) by torquing the preferred normals of both ends into alignment.
//!
//! The torques at both ends induce an additional transverse force so that every link
//! conserves linear and angular momentum on its own.
//!
//! ## Key Components
//!
//! - [`law`] - The [`law::ForceLaw`] strategy with planar and spatial implementations
//! - [`evaluator`] - [`evaluator::ForceEvaluator`], which assembles node forces and torques

pub mod evaluator;
pub mod law;
