//! Inference-backend wiring transform.
//!
//! Frontend services (chat UIs, API gateways) need one upstream
//! inference backend out of however many are active. The transform picks
//! a single backend deterministically, injects its identity and internal
//! URL into the module's service, and adds a startup dependency on it.

use moorage_common::profile::EnvProfile;

use crate::manifest::Manifest;
use crate::pipeline::{ComposeModule, TransformContext, TransformError};

/// A known OpenAI-compatible inference backend and its internal port.
#[derive(Debug, Clone, Copy)]
pub struct Backend {
    /// Service handle of the backend.
    pub service: &'static str,
    /// Human-readable backend name surfaced to the frontend.
    pub name: &'static str,
    /// Internal API port on the shared network.
    pub port: u16,
}

impl Backend {
    /// Internal URL of the backend on the shared network.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.service, self.port)
    }
}

/// Known backends, in fallback priority order.
pub const KNOWN_BACKENDS: &[Backend] = &[
    Backend { service: "ollama", name: "Ollama", port: 11434 },
    Backend { service: "llamacpp", name: "llama.cpp", port: 8080 },
    Backend { service: "vllm", name: "vLLM", port: 8000 },
    Backend { service: "tabbyapi", name: "TabbyAPI", port: 5000 },
    Backend { service: "mistralrs", name: "mistral.rs", port: 8021 },
    Backend { service: "sglang", name: "SGLang", port: 30000 },
    Backend { service: "lmdeploy", name: "LMDeploy", port: 23333 },
    Backend { service: "aphrodite", name: "Aphrodite", port: 2242 },
    Backend { service: "ktransformers", name: "KTransformers", port: 8088 },
];

fn lookup(service: &str) -> Option<&'static Backend> {
    KNOWN_BACKENDS.iter().find(|b| b.service == service)
}

/// Picks the backend to wire: the first explicitly requested known
/// backend wins, otherwise the highest-priority known backend among the
/// active services, otherwise `None`.
#[must_use]
pub fn detect_backend(services: &[String], explicit: &[String]) -> Option<&'static Backend> {
    explicit
        .iter()
        .find_map(|s| lookup(s))
        .or_else(|| {
            KNOWN_BACKENDS
                .iter()
                .find(|b| services.iter().any(|s| s == b.service))
        })
}

/// `backend-wiring` transform.
#[derive(Debug, Clone, Copy)]
pub struct BackendWiring;

impl BackendWiring {
    fn wire(
        manifest: &mut Manifest,
        service: &str,
        backend: &Backend,
        env: &EnvProfile,
    ) {
        let Some(def) = manifest.services.get_mut(service) else {
            return;
        };

        let url = env
            .get_optional(&format!("{}.url", backend.service))
            .unwrap_or_else(|| backend.url());
        let environment = def.environment_mut();
        environment.set("MOORAGE_BACKEND_NAME", backend.name);
        environment.set("MOORAGE_BACKEND_URL", &url);

        def.depends_on_mut().insert(backend.service);
    }
}

impl ComposeModule for BackendWiring {
    fn name(&self) -> &'static str {
        "backend-wiring"
    }

    fn apply(&self, mut ctx: TransformContext<'_>) -> Result<Manifest, TransformError> {
        let Some(service) = ctx.service.clone() else {
            return Err("backend-wiring must be attached to a service fragment".into());
        };

        match detect_backend(ctx.services, ctx.explicit) {
            Some(backend) if backend.service != service => {
                tracing::debug!(
                    frontend = %service,
                    backend = backend.service,
                    "wiring inference backend"
                );
                Self::wire(&mut ctx.manifest, &service, backend, ctx.env);
            }
            Some(_) => {
                tracing::debug!(service = %service, "service is its own backend, nothing to wire");
            }
            None => {
                tracing::debug!(service = %service, "no known backend active");
            }
        }
        Ok(ctx.manifest)
    }
}
