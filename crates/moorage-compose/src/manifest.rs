//! In-memory manifest model.
//!
//! The manifest is a mapping of service handles to service definitions plus
//! named volume and network declarations. Vendor-extension (`x-*`) keys and
//! unknown service fields are preserved verbatim through `#[serde(flatten)]`
//! so fragments can carry data this core does not interpret.
//!
//! `depends_on`, `environment`, `networks`, and `env_file` each allow two
//! on-disk shapes; they are modeled as untagged unions with accessor
//! helpers so callers never branch on shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

/// Condition attached to a map-form `depends_on` entry.
pub const CONDITION_STARTED: &str = "service_started";
/// Condition requiring successful completion, used for init services.
pub const CONDITION_COMPLETED: &str = "service_completed_successfully";

fn null_to_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    let value = Option::<T>::deserialize(deserializer)?;
    Ok(value.unwrap_or_default())
}

/// A complete orchestration manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Manifest {
    /// Service handle to definition mapping.
    #[serde(
        default,
        deserialize_with = "null_to_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub services: BTreeMap<String, ServiceDefinition>,

    /// Named volume declarations.
    #[serde(
        default,
        deserialize_with = "null_to_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub volumes: BTreeMap<String, serde_yaml::Value>,

    /// Named network declarations.
    #[serde(
        default,
        deserialize_with = "null_to_default",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub networks: BTreeMap<String, serde_yaml::Value>,

    /// Vendor-extension keys (`x-*`) and anything else, preserved verbatim.
    #[serde(flatten)]
    pub extensions: BTreeMap<String, serde_yaml::Value>,
}

impl Manifest {
    /// Deserializes a manifest from a merged YAML document.
    ///
    /// # Errors
    ///
    /// Returns the underlying YAML error when the document does not have
    /// manifest shape.
    pub fn from_value(value: serde_yaml::Value) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_value(value)
    }

    /// Serializes the manifest back into a YAML document value.
    ///
    /// # Errors
    ///
    /// Returns the underlying YAML error on non-serializable content.
    pub fn to_value(&self) -> Result<serde_yaml::Value, serde_yaml::Error> {
        serde_yaml::to_value(self)
    }

    /// Service handles defined by this manifest.
    pub fn service_names(&self) -> impl Iterator<Item = &str> {
        self.services.keys().map(String::as_str)
    }
}

/// One service inside a manifest.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDefinition {
    /// Container image reference.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    /// Explicit container name.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_name: Option<String>,

    /// Command, shell or argv form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<Command>,

    /// Entrypoint override, shell or argv form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entrypoint: Option<Command>,

    /// Volume mounts, short or long syntax.
    #[serde(
        default,
        deserialize_with = "null_to_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub volumes: Vec<VolumeEntry>,

    /// Environment variables, list or map form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub environment: Option<Environment>,

    /// Env file references, single or list form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env_file: Option<EnvFile>,

    /// Port bindings, kept opaque.
    #[serde(
        default,
        deserialize_with = "null_to_default",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub ports: Vec<serde_yaml::Value>,

    /// Startup dependencies, list or condition-map form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<DependsOn>,

    /// Network memberships, list or map form.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub networks: Option<Networks>,

    /// Shared-namespace mode, e.g. `service:ollama`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_mode: Option<String>,

    /// Healthcheck descriptor, kept opaque.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<serde_yaml::Value>,

    /// Restart policy.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart: Option<String>,

    /// Pass-through unknown fields, preserved verbatim.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl ServiceDefinition {
    /// Mutable access to `depends_on`, inserting an empty list form first
    /// when the field is absent.
    pub fn depends_on_mut(&mut self) -> &mut DependsOn {
        self.depends_on
            .get_or_insert_with(|| DependsOn::List(Vec::new()))
    }

    /// Mutable access to `environment`, inserting an empty map form first
    /// when the field is absent.
    pub fn environment_mut(&mut self) -> &mut Environment {
        self.environment
            .get_or_insert_with(|| Environment::Map(BTreeMap::new()))
    }
}

/// Command in shell (`string`) or argv (`[string]`) form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Command {
    /// Single shell string.
    Shell(String),
    /// Argv list.
    Argv(Vec<String>),
}

impl Command {
    /// Renders the command as a single shell string.
    #[must_use]
    pub fn to_shell(&self) -> String {
        match self {
            Self::Shell(s) => s.clone(),
            Self::Argv(parts) => parts.join(" "),
        }
    }
}

/// Startup dependencies in ordered-list or condition-map form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DependsOn {
    /// `depends_on: [a, b]`
    List(Vec<String>),
    /// `depends_on: {a: {condition: service_healthy}}`
    Map(BTreeMap<String, DependsOnEntry>),
}

/// Per-dependency options in the map form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DependsOnEntry {
    /// Readiness condition, e.g. `service_healthy`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub condition: Option<String>,

    /// Pass-through unknown fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

impl DependsOn {
    /// Referenced service names, regardless of representation.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::List(names) => names.clone(),
            Self::Map(map) => map.keys().cloned().collect(),
        }
    }

    /// Whether `name` is already a dependency.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        match self {
            Self::List(names) => names.iter().any(|n| n == name),
            Self::Map(map) => map.contains_key(name),
        }
    }

    /// Adds a dependency in the current representation, deduplicating.
    pub fn insert(&mut self, name: &str) {
        if self.contains(name) {
            return;
        }
        match self {
            Self::List(names) => names.push(name.to_owned()),
            Self::Map(map) => {
                let _ = map.insert(name.to_owned(), DependsOnEntry::default());
            }
        }
    }

    /// Adds a dependency on the successful *completion* of `name`.
    ///
    /// The list form cannot express a condition, so it is normalized into
    /// the map form first, existing entries keeping [`CONDITION_STARTED`].
    pub fn require_completion(&mut self, name: &str) {
        if let Self::List(names) = self {
            let map: BTreeMap<String, DependsOnEntry> = names
                .iter()
                .map(|dep| {
                    (
                        dep.clone(),
                        DependsOnEntry {
                            condition: Some(CONDITION_STARTED.to_owned()),
                            extra: BTreeMap::new(),
                        },
                    )
                })
                .collect();
            *self = Self::Map(map);
        }

        if let Self::Map(map) = self {
            let _ = map.insert(
                name.to_owned(),
                DependsOnEntry {
                    condition: Some(CONDITION_COMPLETED.to_owned()),
                    extra: BTreeMap::new(),
                },
            );
        }
    }

    /// Applies `rename` to every referenced name, keeping representation
    /// and per-entry options.
    pub fn rename_targets(&mut self, mut rename: impl FnMut(&str) -> String) {
        match self {
            Self::List(names) => {
                for name in names.iter_mut() {
                    *name = rename(name);
                }
            }
            Self::Map(map) => {
                let renamed: BTreeMap<String, DependsOnEntry> = std::mem::take(map)
                    .into_iter()
                    .map(|(name, entry)| (rename(&name), entry))
                    .collect();
                *map = renamed;
            }
        }
    }
}

/// Environment variables in list (`K=V`) or map form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Environment {
    /// `environment: ["K=V"]`
    List(Vec<String>),
    /// `environment: {K: V}`
    Map(BTreeMap<String, serde_yaml::Value>),
}

impl Environment {
    /// Sets `key` to `value` in the current representation, replacing an
    /// existing assignment.
    pub fn set(&mut self, key: &str, value: &str) {
        match self {
            Self::List(entries) => {
                let assignment = format!("{key}={value}");
                let prefix = format!("{key}=");
                if let Some(existing) = entries.iter_mut().find(|e| e.starts_with(&prefix)) {
                    *existing = assignment;
                } else {
                    entries.push(assignment);
                }
            }
            Self::Map(map) => {
                let _ = map.insert(key.to_owned(), serde_yaml::Value::String(value.to_owned()));
            }
        }
    }

    /// Reads the value of `key`, regardless of representation.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        match self {
            Self::List(entries) => {
                let prefix = format!("{key}=");
                entries
                    .iter()
                    .find(|e| e.starts_with(&prefix))
                    .map(|e| e[prefix.len()..].to_owned())
            }
            Self::Map(map) => map.get(key).map(|v| match v {
                serde_yaml::Value::String(s) => s.clone(),
                other => serde_yaml::to_string(other)
                    .map(|s| s.trim_end().to_owned())
                    .unwrap_or_default(),
            }),
        }
    }
}

/// Network memberships in list or map form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Networks {
    /// `networks: [a, b]`
    List(Vec<String>),
    /// `networks: {a: {aliases: [..]}}`
    Map(BTreeMap<String, serde_yaml::Value>),
}

impl Networks {
    /// Adds a membership in the current representation, deduplicating.
    pub fn insert(&mut self, name: &str) {
        match self {
            Self::List(names) => {
                if !names.iter().any(|n| n == name) {
                    names.push(name.to_owned());
                }
            }
            Self::Map(map) => {
                if !map.contains_key(name) {
                    let _ = map.insert(name.to_owned(), serde_yaml::Value::Null);
                }
            }
        }
    }

    /// Member network names.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        match self {
            Self::List(names) => names.clone(),
            Self::Map(map) => map.keys().cloned().collect(),
        }
    }
}

/// Env-file references in single or list form.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EnvFile {
    /// `env_file: .env`
    Single(String),
    /// `env_file: [.env, override.env]`
    List(Vec<String>),
}

impl EnvFile {
    /// Normalizes into the list form with `files` prepended.
    #[must_use]
    pub fn prepend(self, files: &[String]) -> Self {
        let mut merged: Vec<String> = files.to_vec();
        match self {
            Self::Single(existing) => merged.push(existing),
            Self::List(existing) => merged.extend(existing),
        }
        Self::List(merged)
    }
}

/// A volume mount in short (`string`) or long (map) syntax.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum VolumeEntry {
    /// `volumes: ["data:/var/data:ro"]`
    Short(String),
    /// `volumes: [{type: volume, source: data, target: /var/data}]`
    Long(LongVolume),
}

/// Long-syntax volume mount.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LongVolume {
    /// Mount type: `volume`, `bind`, `tmpfs`, ...
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Named volume or host path.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Mount point inside the container.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    /// Read-only flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_only: Option<bool>,

    /// Pass-through unknown fields.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Manifest {
        serde_yaml::from_str(yaml).expect("manifest should parse")
    }

    #[test]
    fn parse_minimal_manifest() {
        let manifest = parse("services:\n  web:\n    image: nginx\n");
        assert_eq!(manifest.services["web"].image.as_deref(), Some("nginx"));
    }

    #[test]
    fn null_sections_parse_as_empty() {
        let manifest = parse("services:\nvolumes:\nnetworks:\n");
        assert!(manifest.services.is_empty());
        assert!(manifest.volumes.is_empty());
    }

    #[test]
    fn extension_keys_roundtrip() {
        let manifest = parse("services: {}\nx-vendor:\n  flag: true\n");
        let value = manifest.to_value().expect("serialize");
        assert_eq!(value["x-vendor"]["flag"], serde_yaml::Value::Bool(true));
    }

    #[test]
    fn unknown_service_fields_roundtrip() {
        let manifest = parse("services:\n  web:\n    image: nginx\n    labels:\n      - a=b\n");
        let value = manifest.to_value().expect("serialize");
        assert_eq!(
            value["services"]["web"]["labels"][0],
            serde_yaml::Value::String("a=b".into())
        );
    }

    #[test]
    fn depends_on_both_forms() {
        let manifest = parse(
            "services:\n  a:\n    depends_on: [db]\n  b:\n    depends_on:\n      db:\n        condition: service_healthy\n",
        );
        let a = manifest.services["a"].depends_on.as_ref().expect("a deps");
        let b = manifest.services["b"].depends_on.as_ref().expect("b deps");
        assert_eq!(a.names(), vec!["db"]);
        assert_eq!(b.names(), vec!["db"]);
    }

    #[test]
    fn depends_on_insert_deduplicates() {
        let mut deps = DependsOn::List(vec!["db".into()]);
        deps.insert("db");
        deps.insert("cache");
        assert_eq!(deps.names(), vec!["db", "cache"]);
    }

    #[test]
    fn require_completion_normalizes_list_form() {
        let mut deps = DependsOn::List(vec!["db".into()]);
        deps.require_completion("stack-init");

        let DependsOn::Map(map) = deps else {
            panic!("expected map form");
        };
        assert_eq!(map["db"].condition.as_deref(), Some(CONDITION_STARTED));
        assert_eq!(
            map["stack-init"].condition.as_deref(),
            Some(CONDITION_COMPLETED)
        );
    }

    #[test]
    fn environment_set_replaces_in_list_form() {
        let mut env = Environment::List(vec!["A=1".into(), "B=2".into()]);
        env.set("A", "3");
        env.set("C", "4");
        assert_eq!(env.get("A").as_deref(), Some("3"));
        assert_eq!(env.get("C").as_deref(), Some("4"));

        let Environment::List(entries) = env else {
            panic!("expected list form");
        };
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn environment_set_in_map_form() {
        let mut env = Environment::Map(BTreeMap::new());
        env.set("KEY", "value");
        assert_eq!(env.get("KEY").as_deref(), Some("value"));
    }

    #[test]
    fn networks_insert_both_forms() {
        let mut list = Networks::List(vec!["internal".into()]);
        list.insert("moorage-network");
        list.insert("internal");
        assert_eq!(list.names(), vec!["internal", "moorage-network"]);

        let mut map = Networks::Map(BTreeMap::new());
        map.insert("moorage-network");
        assert_eq!(map.names(), vec!["moorage-network"]);
    }

    #[test]
    fn env_file_prepend_normalizes() {
        let single = EnvFile::Single("custom.env".into());
        let EnvFile::List(files) = single.prepend(&["./.env".into()]) else {
            panic!("expected list form");
        };
        assert_eq!(files, vec!["./.env", "custom.env"]);
    }

    #[test]
    fn volume_long_syntax_parses() {
        let manifest = parse(
            "services:\n  db:\n    volumes:\n      - type: volume\n        source: data\n        target: /var/lib/db\n",
        );
        let VolumeEntry::Long(vol) = &manifest.services["db"].volumes[0] else {
            panic!("expected long syntax");
        };
        assert_eq!(vol.kind.as_deref(), Some("volume"));
        assert_eq!(vol.source.as_deref(), Some("data"));
    }
}
