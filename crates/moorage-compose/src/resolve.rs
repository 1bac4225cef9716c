//! Fragment file resolution.
//!
//! Enumerates `compose.*` fragment files in a scan directory and matches
//! them against the working set by filename shape:
//!
//! - `compose.yml` — base fragment, always included.
//! - `compose.<service>.yml` — included iff the service is active.
//! - `compose.x.<parts>.yml` — cross-cutting fragment; every dot-separated
//!   part must match (capabilities exactly, services directly or via the
//!   wildcard token).
//! - `compose.<parts>.mod.yml` — programmatic fragment, same rules.
//!
//! The wildcard token never matches a capability-tagged fragment, so opt-in
//! hardware variants are not pulled in accidentally. Both passes return
//! lists ordered by dot count ascending then lexicographically, so more
//! specific combinators apply after more general ones.

use std::path::{Path, PathBuf};

use moorage_common::constants::{
    BASE_FRAGMENT, CROSS_MARKER, DATA_EXTENSION, FRAGMENT_PREFIX, MODULE_EXTENSION, NATIVE_SUFFIX,
    WILDCARD, is_capability,
};
use moorage_common::error::{MoorageError, Result};

use crate::select::Selection;

/// Fragment files matched for one composition run.
#[derive(Debug, Clone, Default)]
pub struct MatchedFiles {
    /// Plain data fragments, base fragment first, resolution order.
    pub data: Vec<PathBuf>,
    /// Programmatic (transform-module) fragments, resolution order.
    pub modules: Vec<PathBuf>,
}

/// Returns the fragment stem (`compose.a.b`) of a data fragment filename,
/// or `None` when the name is not a data fragment.
fn data_stem(name: &str) -> Option<&str> {
    if !name.starts_with(FRAGMENT_PREFIX) || name == BASE_FRAGMENT {
        return None;
    }
    if name.ends_with(MODULE_EXTENSION) {
        return None;
    }
    name.strip_suffix(DATA_EXTENSION)
}

/// Returns the fragment stem of a module fragment filename, or `None`.
fn module_stem(name: &str) -> Option<&str> {
    if !name.starts_with(FRAGMENT_PREFIX) {
        return None;
    }
    name.strip_suffix(MODULE_EXTENSION)
}

/// Selector parts of a stem: everything after the `compose` segment.
fn stem_parts(stem: &str) -> impl Iterator<Item = &str> {
    stem.split('.').skip(1)
}

/// Whether the stem carries any capability tag.
fn is_capability_stem(stem: &str) -> bool {
    stem_parts(stem).any(is_capability)
}

/// Matching rules shared by the data and module passes.
fn stem_matches(stem: &str, selection: &Selection) -> bool {
    let cross_prefix = format!("{FRAGMENT_PREFIX}{CROSS_MARKER}.");
    if let Some(cross) = stem.strip_prefix(&cross_prefix) {
        // Every part must match; capabilities never match through the
        // wildcard token.
        return cross.split('.').all(|part| {
            if is_capability(part) {
                selection.has_capability(part)
            } else {
                selection.has_service(part) || selection.has_wildcard()
            }
        });
    }

    if selection.has_wildcard() && !is_capability_stem(stem) {
        return true;
    }

    stem_parts(stem).any(|part| selection.has_service(part) || selection.has_capability(part))
}

/// Sorts stems by dot count ascending, then lexicographically.
fn sort_stems(stems: &mut [String]) {
    stems.sort_by(|a, b| {
        let dots_a = a.matches('.').count();
        let dots_b = b.matches('.').count();
        dots_a.cmp(&dots_b).then_with(|| a.cmp(b))
    });
}

fn list_stems(dir: &Path, classify: fn(&str) -> Option<&str>) -> Result<Vec<String>> {
    let entries = std::fs::read_dir(dir).map_err(|e| MoorageError::io(dir, e))?;
    let mut stems = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| MoorageError::io(dir, e))?;
        let name = entry.file_name();
        if let Some(stem) = name.to_str().and_then(classify) {
            stems.push(stem.to_owned());
        }
    }
    sort_stems(&mut stems);
    Ok(stems)
}

/// Path of the native execution contract file for `service`.
#[must_use]
pub fn native_contract_path(dir: &Path, service: &str) -> PathBuf {
    dir.join(format!("{service}{NATIVE_SUFFIX}"))
}

/// Resolves the fragment files governing `selection` under `dir`.
///
/// Services in `exclude` have their defining `compose.<service>.yml`
/// fragment replaced with the service's native-proxy contract file, and
/// their module fragments dropped.
///
/// # Errors
///
/// Returns an error if the scan directory cannot be read, or if an
/// excluded service has no native contract file to substitute.
pub fn resolve_fragments(
    dir: &Path,
    selection: &Selection,
    exclude: &[String],
) -> Result<MatchedFiles> {
    let mut matched = MatchedFiles {
        data: vec![dir.join(BASE_FRAGMENT)],
        modules: Vec::new(),
    };

    for stem in list_stems(dir, data_stem)? {
        if !stem_matches(&stem, selection) {
            continue;
        }

        let excluded = exclude
            .iter()
            .find(|svc| stem == format!("{FRAGMENT_PREFIX}{svc}"));
        if let Some(service) = excluded {
            let native = native_contract_path(dir, service);
            if !native.exists() {
                return Err(MoorageError::NotFound {
                    kind: "native contract",
                    id: native.display().to_string(),
                });
            }
            tracing::debug!(service = %service, "substituting native proxy fragment");
            matched.data.push(native);
        } else {
            matched.data.push(dir.join(format!("{stem}{DATA_EXTENSION}")));
        }
    }

    for stem in list_stems(dir, module_stem)? {
        let for_excluded = exclude
            .iter()
            .any(|svc| stem == format!("{FRAGMENT_PREFIX}{svc}"));
        if for_excluded || !stem_matches(&stem, selection) {
            continue;
        }
        matched
            .modules
            .push(dir.join(format!("{stem}{MODULE_EXTENSION}")));
    }

    tracing::debug!(
        data = matched.data.len(),
        modules = matched.modules.len(),
        "matched compose fragments"
    );
    Ok(matched)
}
