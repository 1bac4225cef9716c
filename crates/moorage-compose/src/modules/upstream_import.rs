//! Upstream manifest import transform.
//!
//! When a service directory carries an import descriptor with an
//! `upstream` section, this transform loads the referenced third-party
//! manifest, rewrites it into the project namespace, and deep-merges the
//! result into the accumulated manifest. The import overlays the
//! accumulated document, so its renamed keys never collide with local
//! fragment keys.

use moorage_common::error::MoorageError;

use crate::manifest::Manifest;
use crate::merge::deep_merge;
use crate::pipeline::{ComposeModule, TransformContext, TransformError};
use crate::upstream::{load_descriptor, transform_upstream};

/// `upstream-import` transform.
#[derive(Debug, Clone, Copy)]
pub struct UpstreamImport;

impl ComposeModule for UpstreamImport {
    fn name(&self) -> &'static str {
        "upstream-import"
    }

    fn apply(&self, ctx: TransformContext<'_>) -> Result<Manifest, TransformError> {
        let Some(service) = ctx.service.as_deref() else {
            return Err("upstream-import must be attached to a service fragment".into());
        };

        let service_dir = ctx.dir.join(service);
        let Some(descriptor) = load_descriptor(&service_dir)? else {
            return Err(format!("{service}: no import descriptor found").into());
        };
        let Some(config) = descriptor.upstream else {
            return Err(format!("{service}: descriptor has no upstream section").into());
        };

        let source_path = service_dir.join(&config.source);
        let contents = std::fs::read_to_string(&source_path)
            .map_err(|e| MoorageError::io(&source_path, e))?;
        let source: Manifest = serde_yaml::from_str(&contents)
            .map_err(|e| MoorageError::parse(&source_path, e))?;

        tracing::info!(
            service,
            source = %source_path.display(),
            prefix = %config.prefix,
            "importing upstream manifest"
        );

        let imported = transform_upstream(source, &config, &service_dir);
        let merged = deep_merge(ctx.manifest.to_value()?, imported.to_value()?);
        Ok(Manifest::from_value(merged)?)
    }
}
