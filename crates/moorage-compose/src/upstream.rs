//! Upstream manifest import.
//!
//! Absorbs a third-party manifest under a private namespace prefix:
//! selected services are renamed `<prefix>-<original>`, internal
//! references (`depends_on`, `network_mode: service:X`, named volume
//! mounts) are rewritten to the renamed targets, every imported service
//! joins the shared network unless it declares an incompatible
//! `network_mode`, named volumes are prefixed, and project-standard env
//! files are appended. An optional initialization descriptor synthesizes
//! one extra init service that every other imported service waits on to
//! complete successfully.

use std::collections::BTreeSet;
use std::path::Path;

use moorage_common::constants::{DESCRIPTOR_FILE, SHARED_NETWORK};
use moorage_common::error::{MoorageError, Result};
use serde::{Deserialize, Serialize};

use crate::manifest::{Command, EnvFile, Manifest, Networks, ServiceDefinition, VolumeEntry};

/// Upstream import rules for one service directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Source manifest path, relative to the service directory.
    pub source: String,
    /// Mandatory namespace prefix applied to services and volumes.
    pub prefix: String,
    /// Service names to import; when non-empty, wins over `exclude`.
    #[serde(default)]
    pub include: Vec<String>,
    /// Service names to leave behind.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Optional initialization container.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init: Option<InitSpec>,
}

/// Initialization container descriptor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitSpec {
    /// Image to run the init script in.
    pub image: String,
    /// Init script path, relative to the service directory.
    pub script: String,
    /// Extra volume mounts; `{prefix}` expands to the namespace prefix.
    #[serde(default)]
    pub volumes: Vec<String>,
}

/// Per-service import descriptor (`moorage.yml`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ImportDescriptor {
    /// Upstream import rules, when the service wraps a third-party stack.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upstream: Option<UpstreamConfig>,
    /// Arbitrary metadata, not interpreted by the import transform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DescriptorMetadata>,
}

/// Free-form descriptor metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DescriptorMetadata {
    /// Classification tags.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Documentation link.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_url: Option<String>,
}

/// Loads the import descriptor for a service directory, `None` when the
/// directory carries no descriptor.
///
/// # Errors
///
/// Returns a parse error when a present descriptor is malformed.
pub fn load_descriptor(service_dir: &Path) -> Result<Option<ImportDescriptor>> {
    let path = service_dir.join(DESCRIPTOR_FILE);
    let contents = match std::fs::read_to_string(&path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(MoorageError::io(&path, e)),
    };
    let descriptor =
        serde_yaml::from_str(&contents).map_err(|e| MoorageError::parse(&path, e))?;
    Ok(Some(descriptor))
}

fn prefixed(prefix: &str, name: &str) -> String {
    format!("{prefix}-{name}")
}

fn selected_services(source: &Manifest, config: &UpstreamConfig) -> BTreeSet<String> {
    source
        .service_names()
        .filter(|name| {
            if !config.include.is_empty() {
                config.include.iter().any(|i| i == name)
            } else if !config.exclude.is_empty() {
                !config.exclude.iter().any(|e| e == name)
            } else {
                true
            }
        })
        .map(str::to_owned)
        .collect()
}

fn rewrite_volume(entry: VolumeEntry, prefix: &str, service_dir_name: &str) -> VolumeEntry {
    match entry {
        VolumeEntry::Long(mut vol) => {
            // Only named volumes are renamed, never bind mounts.
            if vol.kind.as_deref() == Some("volume") {
                if let Some(source) = vol.source.take() {
                    vol.source = Some(prefixed(prefix, &source));
                }
            }
            VolumeEntry::Long(vol)
        }
        VolumeEntry::Short(spec) => {
            let mut parts: Vec<&str> = spec.split(':').collect();
            if parts.len() < 2 {
                return VolumeEntry::Short(spec);
            }
            let source = parts[0];
            let rewritten = if source.starts_with("./") {
                // Source paths were relative to the upstream checkout; they
                // become relative to the project root.
                Some(format!("./{service_dir_name}/upstream/{}", &source[2..]))
            } else if source.starts_with('.') || source.starts_with('/') {
                None
            } else {
                Some(prefixed(prefix, source))
            };
            match rewritten {
                Some(new_source) => {
                    parts[0] = &new_source;
                    VolumeEntry::Short(parts.join(":"))
                }
                None => VolumeEntry::Short(spec),
            }
        }
    }
}

fn transform_service(
    mut service: ServiceDefinition,
    original_name: &str,
    config: &UpstreamConfig,
    selected: &BTreeSet<String>,
    service_dir_name: &str,
) -> ServiceDefinition {
    let prefix = &config.prefix;

    service.container_name = Some(format!(
        "${{MOORAGE_CONTAINER_PREFIX}}.{}",
        prefixed(prefix, original_name)
    ));

    if let Some(deps) = service.depends_on.as_mut() {
        deps.rename_targets(|target| {
            if selected.contains(target) {
                prefixed(prefix, target)
            } else {
                target.to_owned()
            }
        });
    }

    if let Some(mode) = service.network_mode.as_mut() {
        if let Some(target) = mode.strip_prefix("service:") {
            if selected.contains(target) {
                *mode = format!("service:{}", prefixed(prefix, target));
            }
        }
    } else {
        service
            .networks
            .get_or_insert_with(|| Networks::List(Vec::new()))
            .insert(SHARED_NETWORK);
    }

    service.volumes = service
        .volumes
        .into_iter()
        .map(|entry| rewrite_volume(entry, prefix, service_dir_name))
        .collect();

    let standard_env_files = vec![
        "./.env".to_owned(),
        format!("./{service_dir_name}/override.env"),
    ];
    service.env_file = Some(match service.env_file.take() {
        Some(existing) => existing.prepend(&standard_env_files),
        None => EnvFile::List(standard_env_files),
    });

    service
}

fn init_service(config: &UpstreamConfig, init: &InitSpec, service_dir_name: &str) -> ServiceDefinition {
    let prefix = &config.prefix;
    let mut volumes = vec![VolumeEntry::Short(format!(
        "./{service_dir_name}/{}:/scripts/init.sh:ro",
        init.script
    ))];
    volumes.extend(
        init.volumes
            .iter()
            .map(|v| VolumeEntry::Short(v.replace("{prefix}", prefix))),
    );

    ServiceDefinition {
        image: Some(init.image.clone()),
        container_name: Some(format!(
            "${{MOORAGE_CONTAINER_PREFIX}}.{}",
            prefixed(prefix, "init")
        )),
        command: Some(Command::Argv(vec![
            "sh".to_owned(),
            "-c".to_owned(),
            "sh /scripts/init.sh".to_owned(),
        ])),
        volumes,
        networks: Some(Networks::List(vec![SHARED_NETWORK.to_owned()])),
        restart: Some("no".to_owned()),
        ..ServiceDefinition::default()
    }
}

/// Transforms a source manifest per `config` into a fragment suitable for
/// merging into the main composition.
#[must_use]
pub fn transform_upstream(
    source: Manifest,
    config: &UpstreamConfig,
    service_dir: &Path,
) -> Manifest {
    let service_dir_name = service_dir
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default()
        .to_owned();

    let selected = selected_services(&source, config);
    let mut transformed = Manifest::default();

    for (name, service) in source.services {
        if !selected.contains(&name) {
            continue;
        }
        let renamed = prefixed(&config.prefix, &name);
        let _ = transformed.services.insert(
            renamed,
            transform_service(service, &name, config, &selected, &service_dir_name),
        );
    }

    for (name, declaration) in source.volumes {
        let _ = transformed
            .volumes
            .insert(prefixed(&config.prefix, &name), declaration);
    }

    let _ = transformed.networks.insert(
        SHARED_NETWORK.to_owned(),
        serde_yaml::from_str("external: true").unwrap_or(serde_yaml::Value::Null),
    );

    // Vendor-extension keys survive the import verbatim.
    transformed.extensions = source.extensions;

    if let Some(init) = config.init.as_ref() {
        let init_name = prefixed(&config.prefix, "init");
        for service in transformed.services.values_mut() {
            service.depends_on_mut().require_completion(&init_name);
        }
        let _ = transformed
            .services
            .insert(init_name, init_service(config, init, &service_dir_name));
    }

    tracing::debug!(
        prefix = %config.prefix,
        services = transformed.services.len(),
        "transformed upstream manifest"
    );
    transformed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{CONDITION_COMPLETED, DependsOn};

    fn source_manifest() -> Manifest {
        serde_yaml::from_str(
            r"
services:
  web:
    image: app/web
    volumes:
      - data:/var/data
      - ./conf:/etc/app:ro
      - /host:/mnt
  worker:
    image: app/worker
    depends_on: [web, external-db]
  helper:
    image: app/helper
    network_mode: service:web
volumes:
  data: {}
x-app-meta:
  version: 2
",
        )
        .expect("source manifest")
    }

    fn config() -> UpstreamConfig {
        UpstreamConfig {
            source: "upstream/compose.yml".into(),
            prefix: "app".into(),
            include: Vec::new(),
            exclude: Vec::new(),
            init: None,
        }
    }

    #[test]
    fn services_and_volumes_are_prefixed() {
        let out = transform_upstream(source_manifest(), &config(), Path::new("stacks/app"));
        assert!(out.services.contains_key("app-web"));
        assert!(out.services.contains_key("app-worker"));
        assert!(out.volumes.contains_key("app-data"));
        assert!(!out.services.contains_key("web"));
    }

    #[test]
    fn internal_dependencies_are_rewritten_external_kept() {
        let out = transform_upstream(source_manifest(), &config(), Path::new("stacks/app"));
        let deps = out.services["app-worker"]
            .depends_on
            .as_ref()
            .expect("deps");
        assert!(deps.contains("app-web"));
        assert!(deps.contains("external-db"));
        assert!(!deps.contains("web"));
    }

    #[test]
    fn network_mode_reference_is_rewritten_and_skips_shared_network() {
        let out = transform_upstream(source_manifest(), &config(), Path::new("stacks/app"));
        let helper = &out.services["app-helper"];
        assert_eq!(helper.network_mode.as_deref(), Some("service:app-web"));
        assert!(helper.networks.is_none());

        let web = &out.services["app-web"];
        let networks = web.networks.as_ref().expect("networks");
        assert!(networks.names().contains(&SHARED_NETWORK.to_owned()));
    }

    #[test]
    fn volume_mounts_rewritten_by_kind() {
        let out = transform_upstream(source_manifest(), &config(), Path::new("stacks/app"));
        let volumes: Vec<String> = out.services["app-web"]
            .volumes
            .iter()
            .map(|v| match v {
                VolumeEntry::Short(s) => s.clone(),
                VolumeEntry::Long(_) => String::new(),
            })
            .collect();
        assert_eq!(
            volumes,
            vec![
                "app-data:/var/data",
                "./app/upstream/conf:/etc/app:ro",
                "/host:/mnt",
            ]
        );
    }

    #[test]
    fn env_files_are_appended() {
        let out = transform_upstream(source_manifest(), &config(), Path::new("stacks/app"));
        let EnvFile::List(files) = out.services["app-web"].env_file.as_ref().expect("env_file")
        else {
            panic!("expected list form");
        };
        assert_eq!(files[0], "./.env");
        assert_eq!(files[1], "./app/override.env");
    }

    #[test]
    fn include_wins_over_exclude() {
        let mut cfg = config();
        cfg.include = vec!["web".into()];
        cfg.exclude = vec!["web".into()];
        let out = transform_upstream(source_manifest(), &cfg, Path::new("stacks/app"));
        assert!(out.services.contains_key("app-web"));
        assert!(!out.services.contains_key("app-worker"));
    }

    #[test]
    fn exclude_filters_when_no_include() {
        let mut cfg = config();
        cfg.exclude = vec!["helper".into()];
        let out = transform_upstream(source_manifest(), &cfg, Path::new("stacks/app"));
        assert!(out.services.contains_key("app-web"));
        assert!(!out.services.contains_key("app-helper"));
    }

    #[test]
    fn excluded_dependency_reference_is_not_rewritten() {
        let mut cfg = config();
        cfg.exclude = vec!["web".into()];
        let out = transform_upstream(source_manifest(), &cfg, Path::new("stacks/app"));
        let deps = out.services["app-worker"]
            .depends_on
            .as_ref()
            .expect("deps");
        assert!(deps.contains("web"));
        assert!(!deps.contains("app-web"));
    }

    #[test]
    fn extension_keys_survive() {
        let out = transform_upstream(source_manifest(), &config(), Path::new("stacks/app"));
        assert!(out.extensions.contains_key("x-app-meta"));
    }

    #[test]
    fn init_service_rewires_completion_dependencies() {
        let mut cfg = config();
        cfg.init = Some(InitSpec {
            image: "busybox".into(),
            script: "init.sh".into(),
            volumes: vec!["{prefix}-data:/seed".into()],
        });
        let out = transform_upstream(source_manifest(), &cfg, Path::new("stacks/app"));

        let init = &out.services["app-init"];
        assert_eq!(init.image.as_deref(), Some("busybox"));
        assert_eq!(init.restart.as_deref(), Some("no"));
        let mounts: Vec<&str> = init
            .volumes
            .iter()
            .filter_map(|v| match v {
                VolumeEntry::Short(s) => Some(s.as_str()),
                VolumeEntry::Long(_) => None,
            })
            .collect();
        assert!(mounts.contains(&"./app/init.sh:/scripts/init.sh:ro"));
        assert!(mounts.contains(&"app-data:/seed"));

        let DependsOn::Map(deps) = out.services["app-web"]
            .depends_on
            .as_ref()
            .expect("deps")
        else {
            panic!("expected map form");
        };
        assert_eq!(
            deps["app-init"].condition.as_deref(),
            Some(CONDITION_COMPLETED)
        );
        assert!(init.depends_on.is_none());
    }

    #[test]
    fn load_descriptor_absent_is_none() {
        let dir = tempfile::tempdir().expect("tempdir");
        assert!(load_descriptor(dir.path()).expect("load").is_none());
    }

    #[test]
    fn load_descriptor_parses_upstream_config() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(
            dir.path().join(DESCRIPTOR_FILE),
            "upstream:\n  source: upstream/compose.yml\n  prefix: app\nmetadata:\n  tags: [inference]\n",
        )
        .expect("write descriptor");

        let descriptor = load_descriptor(dir.path())
            .expect("load")
            .expect("descriptor");
        let upstream = descriptor.upstream.expect("upstream");
        assert_eq!(upstream.prefix, "app");
        let metadata = descriptor.metadata.expect("metadata");
        assert_eq!(metadata.tags, vec!["inference"]);
    }

    #[test]
    fn load_descriptor_malformed_is_parse_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(DESCRIPTOR_FILE), "upstream: [not a map\n")
            .expect("write descriptor");
        let err = load_descriptor(dir.path()).expect_err("should fail");
        assert!(matches!(err, MoorageError::Parse { .. }));
    }
}
