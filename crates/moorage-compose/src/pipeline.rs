//! Sequential transform-module pipeline.
//!
//! Programmatic fragments are small descriptors (`compose.*.mod.yml`) that
//! name their transform entry point; the transforms themselves are
//! compiled-in [`ComposeModule`] implementations held by a
//! [`ModuleRegistry`] keyed by module name. Each matched descriptor is
//! resolved and executed in file match order against the current
//! accumulated manifest; the manifest is replaced with the transform's
//! return value, so later modules observe all earlier mutations.
//!
//! The pipeline is fail-fast: any failure aborts the composition with no
//! partial output. Three failure classes are distinguished — a descriptor
//! without a transform entry point, a module that cannot be resolved, and
//! a transform that fails during execution.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use moorage_common::cache::FileCache;
use moorage_common::constants::{CROSS_MARKER, FRAGMENT_PREFIX, MODULE_EXTENSION};
use moorage_common::profile::EnvProfile;
use thiserror::Error;

use crate::manifest::Manifest;
use crate::resolve::MatchedFiles;
use crate::select::Selection;

/// Failure classes of the module pipeline.
#[derive(Debug, Error)]
pub enum ModuleError {
    /// The descriptor does not declare exactly one transform entry point.
    #[error("module {path} does not declare a transform entry point")]
    MissingEntryPoint {
        /// Path of the offending descriptor.
        path: PathBuf,
    },

    /// The descriptor or its named transform could not be resolved.
    #[error("failed to load module {path}: {reason}")]
    Load {
        /// Path of the offending descriptor.
        path: PathBuf,
        /// Underlying cause.
        reason: String,
    },

    /// The transform raised an error during execution.
    #[error("module {path} failed during execution: {source}")]
    Execution {
        /// Path of the offending descriptor.
        path: PathBuf,
        /// Underlying cause.
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

/// Error type returned by transform implementations.
pub type TransformError = Box<dyn std::error::Error + Send + Sync>;

/// Read-only view handed to each transform, bound to the current
/// accumulated manifest.
#[derive(Debug)]
pub struct TransformContext<'a> {
    /// The accumulated manifest; the transform returns its successor.
    pub manifest: Manifest,
    /// Service handle the module fragment is named for, `None` for base
    /// and cross-cutting modules.
    pub service: Option<String>,
    /// Full active service list, defaults included.
    pub services: &'a [String],
    /// Explicitly requested services, requester order preserved.
    pub explicit: &'a [String],
    /// Active capabilities.
    pub capabilities: &'a [String],
    /// Remaining CLI arguments after selector consumption.
    pub args: &'a [String],
    /// Resolved fragment scan directory.
    pub dir: &'a Path,
    /// Environment value accessor.
    pub env: &'a EnvProfile,
    /// All matched source files for this run.
    pub files: &'a MatchedFiles,
}

/// A single compiled-in transform.
pub trait ComposeModule: Send + Sync {
    /// Registry key the descriptor's `module` field resolves against.
    fn name(&self) -> &'static str;

    /// Applies the transform, returning the successor manifest.
    ///
    /// # Errors
    ///
    /// Any error aborts the pipeline as an execution failure.
    fn apply(&self, ctx: TransformContext<'_>) -> Result<Manifest, TransformError>;
}

/// Registry of transforms keyed by module name.
#[derive(Default, Clone)]
pub struct ModuleRegistry {
    modules: BTreeMap<&'static str, Arc<dyn ComposeModule>>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleRegistry")
            .field("modules", &self.modules.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl ModuleRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a transform under its own name.
    pub fn register(&mut self, module: Arc<dyn ComposeModule>) {
        let _ = self.modules.insert(module.name(), module);
    }

    /// Looks up a transform by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Arc<dyn ComposeModule>> {
        self.modules.get(name)
    }
}

/// Derives the current service handle from a module fragment path:
/// `compose.<svc>.mod.yml` yields `Some(svc)`, base and cross-cutting
/// fragments yield `None`.
#[must_use]
pub fn module_service_handle(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let stem = name
        .strip_prefix(FRAGMENT_PREFIX)?
        .strip_suffix(MODULE_EXTENSION)?;
    if stem.is_empty() || stem.contains('.') || stem == CROSS_MARKER {
        return None;
    }
    Some(stem.to_owned())
}

/// Extracts the transform entry-point name from descriptor contents.
fn entry_point(path: &Path, contents: &str) -> Result<String, ModuleError> {
    let descriptor: serde_yaml::Value =
        serde_yaml::from_str(contents).map_err(|e| ModuleError::Load {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

    match descriptor.get("module") {
        Some(serde_yaml::Value::String(name)) if !name.is_empty() => Ok(name.clone()),
        _ => Err(ModuleError::MissingEntryPoint {
            path: path.to_path_buf(),
        }),
    }
}

/// Inputs shared by every module invocation within one run.
#[derive(Debug)]
pub struct PipelineEnv<'a> {
    /// Resolved working set.
    pub selection: &'a Selection,
    /// Remaining CLI arguments.
    pub args: &'a [String],
    /// Fragment scan directory.
    pub dir: &'a Path,
    /// Environment value accessor.
    pub env: &'a EnvProfile,
    /// All matched source files.
    pub files: &'a MatchedFiles,
}

/// Runs every matched module fragment, in resolved order, against
/// `manifest`.
///
/// # Errors
///
/// Returns the first [`ModuleError`] encountered; no partial manifest is
/// produced past a failure.
pub fn run_pipeline(
    mut manifest: Manifest,
    registry: &ModuleRegistry,
    env: &PipelineEnv<'_>,
    cache: &mut FileCache,
) -> Result<Manifest, ModuleError> {
    for path in &env.files.modules {
        let contents = cache
            .read(path)
            .map_err(|e| ModuleError::Load {
                path: path.clone(),
                reason: e.to_string(),
            })?
            .to_owned();

        let entry = entry_point(path, &contents)?;
        let module = registry.get(&entry).ok_or_else(|| ModuleError::Load {
            path: path.clone(),
            reason: format!("no registered transform named {entry:?}"),
        })?;

        tracing::debug!(module = %entry, path = %path.display(), "applying transform module");

        let ctx = TransformContext {
            manifest,
            service: module_service_handle(path),
            services: &env.selection.services,
            explicit: &env.selection.explicit,
            capabilities: &env.selection.capabilities,
            args: env.args,
            dir: env.dir,
            env: env.env,
            files: env.files,
        };

        manifest = module.apply(ctx).map_err(|source| ModuleError::Execution {
            path: path.clone(),
            source,
        })?;
    }

    Ok(manifest)
}
