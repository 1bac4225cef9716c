//! End-to-end composition run.
//!
//! Ties the stages together: selector resolution, fragment resolution,
//! fragment reading (with native contract rendering), deep merge, the
//! module pipeline, metadata expansion, and emission of the merged
//! manifest plus the external orchestrator command line.

use std::path::{Path, PathBuf};

use moorage_common::cache::FileCache;
use moorage_common::constants::{COMPOSE_COMMAND_KEY, DEFAULT_COMPOSE_COMMAND, MERGED_MANIFEST};
use moorage_common::error::MoorageError;
use moorage_common::profile::EnvProfile;
use thiserror::Error;

use crate::manifest::Manifest;
use crate::merge::merge_documents;
use crate::metadata::process_metadata;
use crate::native::{is_native_contract, render_contract};
use crate::pipeline::{ModuleError, ModuleRegistry, PipelineEnv, run_pipeline};
use crate::resolve::{MatchedFiles, resolve_fragments};
use crate::select::{Selection, resolve_selection};

/// Failures of a composition run.
#[derive(Debug, Error)]
pub enum ComposeError {
    /// Selection, resolution, I/O, or parse failure.
    #[error(transparent)]
    Common(#[from] MoorageError),

    /// A transform module failed.
    #[error(transparent)]
    Module(#[from] ModuleError),
}

/// Inputs of one composition run.
#[derive(Debug, Clone, Default)]
pub struct ComposeOptions {
    /// Service and capability selectors.
    pub selectors: Vec<String>,
    /// Skip the persisted default selectors.
    pub no_defaults: bool,
    /// Fragment scan directory.
    pub dir: PathBuf,
    /// Services to run natively instead of in containers.
    pub exclude: Vec<String>,
    /// Merged manifest destination, defaults to the scan directory.
    pub output: Option<PathBuf>,
    /// Arguments forwarded to transform modules.
    pub args: Vec<String>,
}

/// Result of a successful composition run.
#[derive(Debug)]
pub struct ComposeOutcome {
    /// The fully processed manifest.
    pub manifest: Manifest,
    /// Where the merged manifest was written.
    pub manifest_path: PathBuf,
    /// Orchestrator command line to print.
    pub command: String,
}

/// Reads one fragment, rendering native contract templates first.
///
/// # Errors
///
/// Returns I/O errors with the path and contract validation failures.
pub fn read_fragment(path: &Path, cache: &mut FileCache) -> Result<String, MoorageError> {
    let contents = cache.read(path)?.to_owned();
    if is_native_contract(path) {
        return render_contract(path, &contents);
    }
    Ok(contents)
}

fn parse_documents(
    files: &MatchedFiles,
    cache: &mut FileCache,
) -> Result<Vec<serde_yaml::Value>, MoorageError> {
    let mut documents = Vec::with_capacity(files.data.len());
    for path in &files.data {
        let contents = read_fragment(path, cache)?;
        let document =
            serde_yaml::from_str(&contents).map_err(|e| MoorageError::parse(path, e))?;
        documents.push(document);
    }
    Ok(documents)
}

/// Lists the sorted union of service names defined by the matched data
/// fragments. Unreadable or malformed fragments are logged and skipped.
#[must_use]
pub fn discover_services(files: &MatchedFiles, cache: &mut FileCache) -> Vec<String> {
    let mut names = std::collections::BTreeSet::new();
    for path in &files.data {
        let document: serde_yaml::Value = match read_fragment(path, cache)
            .map_err(|e| e.to_string())
            .and_then(|c| serde_yaml::from_str(&c).map_err(|e| e.to_string()))
        {
            Ok(document) => document,
            Err(reason) => {
                tracing::warn!(path = %path.display(), %reason, "skipping unreadable fragment");
                continue;
            }
        };
        if let Some(services) = document.get("services").and_then(|s| s.as_mapping()) {
            for key in services.keys() {
                if let Some(name) = key.as_str() {
                    let _ = names.insert(name.to_owned());
                }
            }
        }
    }
    names.into_iter().collect()
}

fn orchestrator_command(profile: &EnvProfile, manifest_path: &Path) -> String {
    let command = profile
        .get_optional(COMPOSE_COMMAND_KEY)
        .unwrap_or_else(|| DEFAULT_COMPOSE_COMMAND.to_owned());
    format!("{command} -f {}", manifest_path.display())
}

/// Runs the full composition and writes the merged manifest.
///
/// `host_env` resolves host environment variables for conditional
/// shared-volume mounts.
///
/// # Errors
///
/// Any stage failure aborts the run with no partial manifest written.
pub fn compose_run(
    options: &ComposeOptions,
    profile: &EnvProfile,
    registry: &ModuleRegistry,
    host_env: impl Fn(&str) -> Option<String>,
) -> Result<ComposeOutcome, ComposeError> {
    let selection = resolve_selection(&options.selectors, options.no_defaults, profile);
    let files = resolve_fragments(&options.dir, &selection, &options.exclude)?;

    let mut cache = FileCache::new();
    let documents = parse_documents(&files, &mut cache)?;
    let merged = merge_documents(documents);
    let manifest = Manifest::from_value(merged).map_err(|e| {
        MoorageError::config(format!("merged manifest has invalid shape: {e}"))
    })?;

    let env = PipelineEnv {
        selection: &selection,
        args: &options.args,
        dir: &options.dir,
        env: profile,
        files: &files,
    };
    let mut manifest = run_pipeline(manifest, registry, &env, &mut cache)?;

    process_metadata(&mut manifest, host_env);

    let manifest_path = options
        .output
        .clone()
        .unwrap_or_else(|| options.dir.join(MERGED_MANIFEST));
    let rendered = serde_yaml::to_string(&manifest).map_err(|e| {
        MoorageError::config(format!("failed to serialize merged manifest: {e}"))
    })?;
    std::fs::write(&manifest_path, rendered)
        .map_err(|e| MoorageError::io(&manifest_path, e))?;

    let absolute = std::path::absolute(&manifest_path)
        .map_err(|e| MoorageError::io(&manifest_path, e))?;
    let command = orchestrator_command(profile, &absolute);

    tracing::info!(
        services = manifest.services.len(),
        manifest = %absolute.display(),
        "composition complete"
    );

    Ok(ComposeOutcome {
        manifest,
        manifest_path,
        command,
    })
}

/// Resolves selection and fragments without running the pipeline, for
/// discovery and planning callers.
///
/// # Errors
///
/// Propagates fragment resolution failures.
pub fn resolve_run(
    options: &ComposeOptions,
    profile: &EnvProfile,
) -> Result<(Selection, MatchedFiles), MoorageError> {
    let selection = resolve_selection(&options.selectors, options.no_defaults, profile);
    let files = resolve_fragments(&options.dir, &selection, &options.exclude)?;
    Ok((selection, files))
}
