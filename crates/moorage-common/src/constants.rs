//! System-wide constants for fragment naming, selection, and configuration.

/// Capabilities are a closed set of opt-in hardware flags, distinct from
/// services but matched with the same selection machinery.
pub const BUILTIN_CAPABILITIES: &[&str] = &["nvidia", "mdc", "cdi"];

/// Selector token matching every non-capability fragment.
pub const WILDCARD: &str = "*";

/// Prefix applied to env-profile keys derived from dotted config keys.
pub const CONFIG_PREFIX: &str = "MOORAGE_";

/// Separator used to encode list-typed profile values.
pub const LIST_SEPARATOR: char = ';';

/// Filename prefix shared by every compose fragment.
pub const FRAGMENT_PREFIX: &str = "compose.";

/// Extension of plain data fragments.
pub const DATA_EXTENSION: &str = ".yml";

/// Extension of programmatic (transform-module) fragments.
pub const MODULE_EXTENSION: &str = ".mod.yml";

/// Marker segment that introduces a cross-service fragment
/// (`compose.x.<parts>.yml`).
pub const CROSS_MARKER: &str = "x";

/// Filename suffix of native execution contract files.
pub const NATIVE_SUFFIX: &str = "_native.yml";

/// Shared network every composed service can reach peers on.
pub const SHARED_NETWORK: &str = "moorage-network";

/// Default relative path of the merged manifest artifact.
pub const MERGED_MANIFEST: &str = "__moorage.yml";

/// Base fragment that is included in every composition.
pub const BASE_FRAGMENT: &str = "compose.yml";

/// Per-service import descriptor filename.
pub const DESCRIPTOR_FILE: &str = "moorage.yml";

/// Default env profile filename.
pub const DEFAULT_PROFILE: &str = ".env";

/// Profile key holding the external orchestrator command.
pub const COMPOSE_COMMAND_KEY: &str = "compose.command";

/// Orchestrator command used when `compose.command` is unset.
pub const DEFAULT_COMPOSE_COMMAND: &str = "docker compose";

/// Profile key holding the default service list.
pub const DEFAULT_SERVICES_KEY: &str = "services.default";

/// Profile key holding the default capability list.
pub const DEFAULT_CAPABILITIES_KEY: &str = "capabilities.default";

/// Application name used in CLI output.
pub const APP_NAME: &str = "moorage";

/// Binary name for the CLI.
pub const BIN_NAME: &str = "moor";

/// Returns whether `name` belongs to the closed built-in capability set.
#[must_use]
pub fn is_capability(name: &str) -> bool {
    BUILTIN_CAPABILITIES.contains(&name)
}
