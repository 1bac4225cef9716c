//! # moorage-compose
//!
//! Composition core: resolves service/capability selectors into a set of
//! compose fragments, deep-merges them into a single manifest, and runs a
//! sequential transform-module pipeline over the result.
//!
//! Handles:
//! - **Select**: Selector resolution against persisted defaults.
//! - **Resolve**: Fragment file matching by filename shape.
//! - **Merge**: Deterministic deep merge of fragment documents.
//! - **Pipeline**: Registry-backed transform modules with tagged failures.
//! - **Upstream**: Import of third-party manifests under a prefix namespace.
//! - **Native**: Native execution contracts and their proxy fragments.

pub mod compose;
pub mod manifest;
pub mod merge;
pub mod metadata;
pub mod modules;
pub mod native;
pub mod pipeline;
pub mod resolve;
pub mod select;
pub mod upstream;
