//! Selector resolution.
//!
//! Expands explicit service/capability requests with persisted defaults
//! into one working set, then partitions capabilities (a small closed set)
//! from services. Unknown names are treated as services; there are no
//! error conditions here.

use moorage_common::constants::{
    DEFAULT_CAPABILITIES_KEY, DEFAULT_SERVICES_KEY, WILDCARD, is_capability,
};
use moorage_common::profile::EnvProfile;

/// The resolved working set for one composition run.
#[derive(Debug, Clone, Default)]
pub struct Selection {
    /// Active services, defaults first, ordered and deduplicated. May
    /// contain the wildcard token.
    pub services: Vec<String>,
    /// Active capabilities, ordered and deduplicated.
    pub capabilities: Vec<String>,
    /// Explicitly requested services only, requester order preserved.
    pub explicit: Vec<String>,
}

impl Selection {
    /// Whether the wildcard token is part of the working set.
    #[must_use]
    pub fn has_wildcard(&self) -> bool {
        self.services.iter().any(|s| s == WILDCARD)
    }

    /// Whether `name` is an active service (exact match, not wildcard).
    #[must_use]
    pub fn has_service(&self, name: &str) -> bool {
        self.services.iter().any(|s| s == name)
    }

    /// Whether `name` is an active capability.
    #[must_use]
    pub fn has_capability(&self, name: &str) -> bool {
        self.capabilities.iter().any(|c| c == name)
    }

    /// Active service handles excluding the wildcard token, for callers
    /// that need concrete names (graph building, discovery).
    #[must_use]
    pub fn concrete_services(&self) -> Vec<String> {
        self.services
            .iter()
            .filter(|s| *s != WILDCARD)
            .cloned()
            .collect()
    }
}

/// Resolves `explicit` selectors against the persisted defaults in
/// `profile`, skipping the defaults entirely when `no_defaults` is set.
#[must_use]
pub fn resolve_selection(explicit: &[String], no_defaults: bool, profile: &EnvProfile) -> Selection {
    let mut combined: Vec<String> = Vec::new();

    if !no_defaults {
        combined.extend(profile.get_list(DEFAULT_CAPABILITIES_KEY));
        combined.extend(profile.get_list(DEFAULT_SERVICES_KEY));
    }
    combined.extend(explicit.iter().cloned());

    let mut selection = Selection::default();
    for name in combined {
        if name.is_empty() {
            continue;
        }
        if is_capability(&name) {
            if !selection.has_capability(&name) {
                selection.capabilities.push(name);
            }
        } else if !selection.has_service(&name) {
            selection.services.push(name);
        }
    }

    selection.explicit = explicit
        .iter()
        .filter(|name| !name.is_empty() && !is_capability(name))
        .cloned()
        .collect();

    tracing::debug!(
        services = selection.services.len(),
        capabilities = selection.capabilities.len(),
        "resolved selection"
    );
    selection
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile_with_defaults() -> EnvProfile {
        EnvProfile::from_contents(
            ".env",
            "MOORAGE_SERVICES_DEFAULT='ollama;webui'\nMOORAGE_CAPABILITIES_DEFAULT=nvidia\n",
        )
    }

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn defaults_come_before_explicit() {
        let selection = resolve_selection(&names(&["dify"]), false, &profile_with_defaults());
        assert_eq!(selection.services, vec!["ollama", "webui", "dify"]);
        assert_eq!(selection.capabilities, vec!["nvidia"]);
    }

    #[test]
    fn no_defaults_flag_skips_persisted_lists() {
        let selection = resolve_selection(&names(&["dify"]), true, &profile_with_defaults());
        assert_eq!(selection.services, vec!["dify"]);
        assert!(selection.capabilities.is_empty());
    }

    #[test]
    fn union_is_deduplicated() {
        let selection =
            resolve_selection(&names(&["ollama", "nvidia"]), false, &profile_with_defaults());
        assert_eq!(selection.services, vec!["ollama", "webui"]);
        assert_eq!(selection.capabilities, vec!["nvidia"]);
    }

    #[test]
    fn explicit_excludes_capabilities_and_preserves_order() {
        let selection = resolve_selection(
            &names(&["vllm", "nvidia", "dify"]),
            false,
            &profile_with_defaults(),
        );
        assert_eq!(selection.explicit, vec!["vllm", "dify"]);
    }

    #[test]
    fn wildcard_is_a_service_entry() {
        let empty = EnvProfile::from_contents(".env", "");
        let selection = resolve_selection(&names(&["*"]), true, &empty);
        assert!(selection.has_wildcard());
        assert!(selection.concrete_services().is_empty());
    }

    #[test]
    fn unknown_names_are_services() {
        let empty = EnvProfile::from_contents(".env", "");
        let selection = resolve_selection(&names(&["definitely-not-a-cap"]), true, &empty);
        assert_eq!(selection.services, vec!["definitely-not-a-cap"]);
    }
}
