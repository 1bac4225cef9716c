//! # moorage-schedule
//!
//! Startup planning: builds a service dependency graph from fragment
//! documents and computes startup waves, where every service in a wave
//! can start concurrently once the previous wave is up.

pub mod graph;
pub mod waves;

pub use graph::DependencyGraph;
pub use waves::{CycleError, compute_waves, two_phase_fallback};
