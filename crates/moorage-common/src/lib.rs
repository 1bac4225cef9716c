//! # moorage-common
//!
//! Shared error definitions, constants, the env-profile value accessor,
//! and the per-invocation file cache used across the Moorage workspace.
//!
//! This crate is the leaf of the dependency graph — it depends on no other
//! internal crate and provides the foundational primitives that all other
//! crates build upon.

pub mod cache;
pub mod constants;
pub mod error;
pub mod profile;
