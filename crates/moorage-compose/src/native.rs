//! Native execution contracts.
//!
//! A service that can run on the host instead of in a container ships a
//! `<svc>_native.yml` contract: a proxy service block forwarding traffic
//! to the host process plus an `x-moorage-native` metadata block
//! describing the host-side executable. The contract's raw text may use
//! the `{{.native_port}}` template token, substituted from the metadata
//! before the document is parsed as a fragment.

use std::collections::BTreeMap;
use std::path::Path;

use moorage_common::constants::NATIVE_SUFFIX;
use moorage_common::error::{MoorageError, Result};
use serde::{Deserialize, Serialize};

/// Template token replaced with the contract's port.
const PORT_TEMPLATE: &str = "{{.native_port}}";

/// Metadata key carried by the proxy service block.
pub const NATIVE_METADATA_KEY: &str = "x-moorage-native";

/// Host-side execution metadata of a native contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeMetadata {
    /// Host executable the service runs as.
    pub executable: String,

    /// Command that starts the host daemon, defaults to the executable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub daemon_command: Option<String>,

    /// Port the host process listens on.
    pub port: u16,

    /// Whether the host process needs GPU access.
    #[serde(default)]
    pub requires_gpu: bool,

    /// Environment variables forwarded to the host process.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<String>,

    /// Containers the host process still depends on.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on_containers: Vec<String>,

    /// Environment overrides applied when running natively.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env_overrides: BTreeMap<String, String>,
}

/// A parsed and validated native contract.
#[derive(Debug, Clone)]
pub struct NativeContract {
    /// Service handle the contract substitutes for.
    pub service: String,
    /// Host-side execution metadata.
    pub metadata: NativeMetadata,
}

/// Whether `path` names a native contract file.
#[must_use]
pub fn is_native_contract(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.ends_with(NATIVE_SUFFIX))
}

/// Derives the service handle from a contract filename
/// (`ollama_native.yml` yields `ollama`).
#[must_use]
pub fn contract_service(path: &Path) -> Option<String> {
    let name = path.file_name()?.to_str()?;
    let service = name.strip_suffix(NATIVE_SUFFIX)?;
    if service.is_empty() {
        return None;
    }
    Some(service.to_owned())
}

impl NativeContract {
    /// Parses and validates the contract at `path` from its raw text.
    ///
    /// # Errors
    ///
    /// Returns a parse error on malformed YAML and a configuration error
    /// when the metadata block or a required field is missing.
    pub fn parse(path: &Path, contents: &str) -> Result<Self> {
        let service = contract_service(path).ok_or_else(|| {
            MoorageError::config(format!(
                "{} is not a native contract filename",
                path.display()
            ))
        })?;

        // Template tokens only ever appear in string positions, so the
        // raw text already parses; substitution happens on the text
        // after validation.
        let document: serde_yaml::Value =
            serde_yaml::from_str(contents).map_err(|e| MoorageError::parse(path, e))?;

        let metadata_value = document
            .get("services")
            .and_then(|s| s.get(service.as_str()))
            .and_then(|s| s.get(NATIVE_METADATA_KEY))
            .ok_or_else(|| {
                MoorageError::config(format!(
                    "{}: missing {NATIVE_METADATA_KEY} block for service {service}",
                    path.display()
                ))
            })?;

        let metadata: NativeMetadata = serde_yaml::from_value(metadata_value.clone())
            .map_err(|e| {
                MoorageError::config(format!(
                    "{}: invalid {NATIVE_METADATA_KEY} block: {e}",
                    path.display()
                ))
            })?;

        if metadata.executable.is_empty() {
            return Err(MoorageError::config(format!(
                "{}: {NATIVE_METADATA_KEY} requires a non-empty executable",
                path.display()
            )));
        }

        Ok(Self { service, metadata })
    }

    /// Command that starts the host daemon.
    #[must_use]
    pub fn daemon_command(&self) -> &str {
        self.metadata
            .daemon_command
            .as_deref()
            .unwrap_or(&self.metadata.executable)
    }
}

/// Renders the raw text of the contract at `path`: validates the
/// contract and substitutes the port template token.
///
/// # Errors
///
/// Propagates contract parse and validation failures.
pub fn render_contract(path: &Path, contents: &str) -> Result<String> {
    let contract = NativeContract::parse(path, contents)?;
    tracing::debug!(
        service = %contract.service,
        port = contract.metadata.port,
        "rendering native contract"
    );
    Ok(contents.replace(PORT_TEMPLATE, &contract.metadata.port.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONTRACT: &str = "\
services:
  ollama:
    image: alpine/socat
    command: TCP-LISTEN:{{.native_port}},fork TCP:host.docker.internal:{{.native_port}}
    x-moorage-native:
      executable: ollama
      daemon_command: ollama serve
      port: 11434
      requires_gpu: true
      env_vars: [OLLAMA_HOST]
";

    #[test]
    fn parse_extracts_metadata() {
        let contract =
            NativeContract::parse(Path::new("ollama_native.yml"), CONTRACT).expect("contract");
        assert_eq!(contract.service, "ollama");
        assert_eq!(contract.metadata.executable, "ollama");
        assert_eq!(contract.metadata.port, 11434);
        assert!(contract.metadata.requires_gpu);
        assert_eq!(contract.daemon_command(), "ollama serve");
    }

    #[test]
    fn daemon_command_defaults_to_executable() {
        let contents = "\
services:
  vllm:
    x-moorage-native:
      executable: vllm
      port: 8000
";
        let contract =
            NativeContract::parse(Path::new("vllm_native.yml"), contents).expect("contract");
        assert_eq!(contract.daemon_command(), "vllm");
        assert!(!contract.metadata.requires_gpu);
    }

    #[test]
    fn missing_metadata_block_is_config_error() {
        let contents = "services:\n  ollama:\n    image: alpine/socat\n";
        let err = NativeContract::parse(Path::new("ollama_native.yml"), contents)
            .expect_err("should fail");
        assert!(matches!(err, MoorageError::Config { .. }));
        assert!(err.to_string().contains("x-moorage-native"));
    }

    #[test]
    fn missing_port_is_config_error() {
        let contents = "\
services:
  ollama:
    x-moorage-native:
      executable: ollama
";
        let err = NativeContract::parse(Path::new("ollama_native.yml"), contents)
            .expect_err("should fail");
        assert!(matches!(err, MoorageError::Config { .. }));
    }

    #[test]
    fn render_substitutes_port_everywhere() {
        let rendered = render_contract(Path::new("ollama_native.yml"), CONTRACT).expect("render");
        assert!(!rendered.contains(PORT_TEMPLATE));
        assert!(rendered.contains("TCP-LISTEN:11434,fork TCP:host.docker.internal:11434"));
    }

    #[test]
    fn contract_filename_detection() {
        assert!(is_native_contract(Path::new("dir/ollama_native.yml")));
        assert!(!is_native_contract(Path::new("compose.ollama.yml")));
        assert_eq!(
            contract_service(Path::new("ollama_native.yml")).as_deref(),
            Some("ollama")
        );
        assert_eq!(contract_service(Path::new("_native.yml")), None);
    }
}
