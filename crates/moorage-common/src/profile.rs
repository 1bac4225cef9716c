//! Env-profile value accessor.
//!
//! Configuration lives in a shell-sourceable profile file (`.env` by
//! default). Dotted config keys are mangled into profile keys by
//! upper-casing, converting dots and dashes to underscores, and prefixing
//! [`CONFIG_PREFIX`]. Values are stored shell-quoted so the profile stays
//! usable from an interactive shell.

use std::path::{Path, PathBuf};

use crate::constants::{CONFIG_PREFIX, LIST_SEPARATOR};
use crate::error::{MoorageError, Result};

/// Converts a dotted config key into its profile key name.
///
/// `compose.command` becomes `MOORAGE_COMPOSE_COMMAND`.
#[must_use]
pub fn env_key(key: &str) -> String {
    let mangled: String = key
        .chars()
        .map(|c| match c {
            '.' | '-' => '_',
            other => other.to_ascii_uppercase(),
        })
        .collect();

    format!("{CONFIG_PREFIX}{mangled}")
}

/// Decodes a shell-quoted profile value.
///
/// Single-quoted content is literal; double-quoted content interprets the
/// usual backslash escapes; unquoted content strips backslash escapes.
#[must_use]
pub fn decode_shell_value(input: &str) -> String {
    let input = input.trim();

    if input.len() >= 2 && input.starts_with('\'') && input.ends_with('\'') {
        return input[1..input.len() - 1].to_owned();
    }

    if input.len() >= 2 && input.starts_with('"') && input.ends_with('"') {
        let inner = &input[1..input.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c == '\\' {
                match chars.next() {
                    Some('n') => out.push('\n'),
                    Some('r') => out.push('\r'),
                    Some('t') => out.push('\t'),
                    Some(other @ ('"' | '\\' | '$' | '`')) => out.push(other),
                    Some(other) => {
                        out.push('\\');
                        out.push(other);
                    }
                    None => out.push('\\'),
                }
            } else {
                out.push(c);
            }
        }
        return out;
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Encodes a value for storage in the profile.
///
/// Plain identifier-ish values stay unquoted; otherwise single quotes are
/// preferred, falling back to escaped double quotes when the value itself
/// contains a single quote.
#[must_use]
pub fn encode_shell_value(value: &str) -> String {
    if value.is_empty() {
        return "\"\"".to_owned();
    }

    let safe_unquoted = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '/' | '-'));
    if safe_unquoted {
        return value.to_owned();
    }

    if !value.contains('\'') {
        return format!("'{value}'");
    }

    let mut escaped = String::with_capacity(value.len() + 2);
    for c in value.chars() {
        match c {
            '"' | '\\' | '$' | '`' => {
                escaped.push('\\');
                escaped.push(c);
            }
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            other => escaped.push(other),
        }
    }
    format!("\"{escaped}\"")
}

/// Read/write accessor over one env profile file.
///
/// Contents are read once per instance; an instance is scoped to a single
/// composition run.
#[derive(Debug, Clone)]
pub struct EnvProfile {
    path: PathBuf,
    contents: String,
}

impl EnvProfile {
    /// Loads the profile at `path`. A missing file yields an empty profile
    /// so fresh checkouts work without setup.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let contents = match std::fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(MoorageError::io(&path, e)),
        };
        Ok(Self { path, contents })
    }

    /// Builds an in-memory profile from raw contents. Used by tests and by
    /// callers that already hold the profile text.
    #[must_use]
    pub fn from_contents(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }

    /// Path of the backing profile file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Looks up a dotted config key, returning `None` when absent.
    #[must_use]
    pub fn get_optional(&self, key: &str) -> Option<String> {
        let final_key = env_key(key);
        let needle = format!("{final_key}=");
        self.contents
            .lines()
            .find(|line| line.starts_with(&needle))
            .map(|line| decode_shell_value(&line[needle.len()..]))
    }

    /// Looks up a dotted config key, returning an empty string (and logging)
    /// when absent.
    #[must_use]
    pub fn get(&self, key: &str) -> String {
        self.get_optional(key).unwrap_or_else(|| {
            tracing::debug!(
                key = %env_key(key),
                profile = %self.path.display(),
                "profile key not set"
            );
            String::new()
        })
    }

    /// Looks up a list-typed value, splitting on [`LIST_SEPARATOR`].
    #[must_use]
    pub fn get_list(&self, key: &str) -> Vec<String> {
        self.get_optional(key)
            .map(|raw| {
                raw.split(LIST_SEPARATOR)
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .map(str::to_owned)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Looks up a JSON-typed value; an unset key yields an empty object.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored value is not valid JSON.
    pub fn get_json(&self, key: &str) -> Result<serde_json::Value> {
        let raw = self.get(key);
        if raw.is_empty() {
            return Ok(serde_json::Value::Object(serde_json::Map::new()));
        }
        serde_json::from_str(&raw).map_err(|e| {
            MoorageError::config(format!("profile key {} holds malformed JSON: {e}", env_key(key)))
        })
    }

    /// Sets a dotted config key, rewriting the existing line or appending a
    /// new one, and persists the profile.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be written.
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        let final_key = env_key(key);
        let needle = format!("{final_key}=");
        let encoded = format!("{final_key}={}", encode_shell_value(value));

        let mut updated = false;
        let mut lines: Vec<String> = self
            .contents
            .lines()
            .map(|line| {
                if line.starts_with(&needle) {
                    updated = true;
                    encoded.clone()
                } else {
                    line.to_owned()
                }
            })
            .collect();

        if !updated {
            lines.push(encoded);
        }

        self.contents = lines.join("\n");
        if !self.contents.ends_with('\n') {
            self.contents.push('\n');
        }
        std::fs::write(&self.path, &self.contents).map_err(|e| MoorageError::io(&self.path, e))
    }

    /// Sets a list-typed value.
    ///
    /// # Errors
    ///
    /// Returns an error if the profile cannot be written.
    pub fn set_list(&mut self, key: &str, values: &[String]) -> Result<()> {
        let joined = values.join(&LIST_SEPARATOR.to_string());
        self.set(key, &joined)
    }
}
