//! Post-merge manifest metadata expansion.
//!
//! Two vendor-extension keys on service definitions are interpreted by
//! the core and removed after expansion:
//!
//! - `x-moorage-config-templates` mounts each template read-only next to
//!   its target and prefixes the service command with `envsubst` render
//!   steps.
//! - `x-moorage-shared-volumes` adds a mount only when the named host
//!   environment variable is set to a non-blank path.
//!
//! Malformed entries are logged and skipped; expansion never fails the
//! run.

use serde::Deserialize;

use crate::manifest::{Command, Manifest, ServiceDefinition, VolumeEntry};

/// Config-template metadata key.
pub const CONFIG_TEMPLATES_KEY: &str = "x-moorage-config-templates";
/// Shared-volume metadata key.
pub const SHARED_VOLUMES_KEY: &str = "x-moorage-shared-volumes";

#[derive(Debug, Deserialize)]
struct ConfigTemplate {
    source: String,
    target: String,
}

#[derive(Debug, Deserialize)]
struct SharedVolume {
    source_variable: String,
    target: String,
    #[serde(default)]
    read_only: bool,
}

fn wrap_command(service: &mut ServiceDefinition, render_steps: &[String]) {
    if render_steps.is_empty() {
        return;
    }
    let rendering = render_steps.join(" && ");
    let original = service
        .command
        .as_ref()
        .or(service.entrypoint.as_ref())
        .map(Command::to_shell);

    let wrapped = match original {
        Some(original) if !original.is_empty() => {
            format!("/bin/sh -c \"{rendering} && {original}\"")
        }
        _ => format!("/bin/sh -c \"{rendering}\""),
    };
    service.command = Some(Command::Shell(wrapped));
}

fn expand_config_templates(service: &mut ServiceDefinition, name: &str, value: serde_yaml::Value) {
    let Ok(templates) = serde_yaml::from_value::<Vec<serde_yaml::Value>>(value) else {
        tracing::warn!(service = name, "{CONFIG_TEMPLATES_KEY} must be a list, skipping");
        return;
    };

    let mut render_steps = Vec::new();
    for entry in templates {
        let Ok(template) = serde_yaml::from_value::<ConfigTemplate>(entry) else {
            tracing::warn!(
                service = name,
                "config template entry missing source or target, skipping"
            );
            continue;
        };
        service.volumes.push(VolumeEntry::Short(format!(
            "{}:{}.template:ro",
            template.source, template.target
        )));
        render_steps.push(format!(
            "envsubst < {0}.template > {0}",
            template.target
        ));
        tracing::debug!(
            service = name,
            source = %template.source,
            target = %template.target,
            "added config template"
        );
    }

    wrap_command(service, &render_steps);
}

fn expand_shared_volumes(
    service: &mut ServiceDefinition,
    name: &str,
    value: serde_yaml::Value,
    host_env: &impl Fn(&str) -> Option<String>,
) {
    let Ok(volumes) = serde_yaml::from_value::<Vec<serde_yaml::Value>>(value) else {
        tracing::warn!(service = name, "{SHARED_VOLUMES_KEY} must be a list, skipping");
        return;
    };

    for entry in volumes {
        let Ok(volume) = serde_yaml::from_value::<SharedVolume>(entry) else {
            tracing::warn!(
                service = name,
                "shared volume entry missing source_variable or target, skipping"
            );
            continue;
        };
        match host_env(&volume.source_variable) {
            Some(host_path) if !host_path.trim().is_empty() => {
                let suffix = if volume.read_only { ":ro" } else { "" };
                service.volumes.push(VolumeEntry::Short(format!(
                    "{host_path}:{}{suffix}",
                    volume.target
                )));
            }
            _ => {
                tracing::debug!(
                    service = name,
                    variable = %volume.source_variable,
                    "shared volume variable unset, skipping mount"
                );
            }
        }
    }
}

/// Expands and removes interpreted metadata keys across all services.
/// `host_env` resolves host environment variables for conditional mounts.
pub fn process_metadata(manifest: &mut Manifest, host_env: impl Fn(&str) -> Option<String>) {
    for (name, service) in &mut manifest.services {
        if let Some(value) = service.extra.remove(CONFIG_TEMPLATES_KEY) {
            expand_config_templates(service, name, value);
        }
        if let Some(value) = service.extra.remove(SHARED_VOLUMES_KEY) {
            expand_shared_volumes(service, name, value, &host_env);
        }
    }
}
