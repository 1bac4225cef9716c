//! End-to-end composition over a realistic fragment directory.

use std::path::Path;

use moorage_common::profile::EnvProfile;
use moorage_compose::compose::{ComposeOptions, compose_run};
use moorage_compose::manifest::Command;
use moorage_compose::modules::builtin_registry;

fn write(dir: &Path, name: &str, contents: &str) {
    std::fs::write(dir.join(name), contents).expect("write fixture");
}

fn fixture(dir: &Path) {
    write(
        dir,
        "compose.yml",
        "\
networks:
  moorage-network:
    name: moorage-network
services: {}
",
    );
    write(
        dir,
        "compose.ollama.yml",
        "\
services:
  ollama:
    image: ollama/ollama
    ports: ['11434:11434']
    networks: [moorage-network]
",
    );
    write(
        dir,
        "compose.webui.yml",
        "\
services:
  webui:
    image: open-webui
    networks: [moorage-network]
",
    );
    write(
        dir,
        "compose.ollama.nvidia.yml",
        "\
services:
  ollama:
    deploy:
      resources:
        reservations:
          devices:
            - driver: nvidia
",
    );
    write(
        dir,
        "compose.x.webui.ollama.yml",
        "\
services:
  webui:
    volumes: ['./webui/ollama.json:/config/ollama.json:ro']
",
    );
    write(dir, "compose.webui.mod.yml", "module: backend-wiring\n");
}

#[test]
fn full_run_merges_wires_and_emits() {
    let dir = tempfile::tempdir().expect("tempdir");
    fixture(dir.path());

    let profile = EnvProfile::from_contents(
        ".env",
        "MOORAGE_SERVICES_DEFAULT='ollama;webui'\nMOORAGE_CAPABILITIES_DEFAULT=nvidia\n",
    );
    let options = ComposeOptions {
        selectors: Vec::new(),
        no_defaults: false,
        dir: dir.path().to_path_buf(),
        ..ComposeOptions::default()
    };

    let outcome = compose_run(&options, &profile, &builtin_registry(), |_| None)
        .expect("composition should succeed");

    // Defaults pulled both services and the capability variant in.
    let ollama = &outcome.manifest.services["ollama"];
    assert_eq!(ollama.image.as_deref(), Some("ollama/ollama"));
    assert!(ollama.extra.contains_key("deploy"));

    // The cross fragment only applies with both services active, and the
    // wiring module injected the backend env plus the startup dependency.
    let webui = &outcome.manifest.services["webui"];
    assert_eq!(webui.volumes.len(), 1);
    let environment = webui.environment.as_ref().expect("environment");
    assert_eq!(
        environment.get("MOORAGE_BACKEND_URL").as_deref(),
        Some("http://ollama:11434")
    );
    assert!(webui.depends_on.as_ref().expect("deps").contains("ollama"));

    // The merged artifact round-trips.
    let written = std::fs::read_to_string(&outcome.manifest_path).expect("read artifact");
    let reparsed: moorage_compose::manifest::Manifest =
        serde_yaml::from_str(&written).expect("artifact parses");
    assert_eq!(reparsed.services.len(), 2);
    assert!(outcome.command.starts_with("docker compose -f "));
}

#[test]
fn no_defaults_narrows_the_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    fixture(dir.path());

    let profile = EnvProfile::from_contents(
        ".env",
        "MOORAGE_SERVICES_DEFAULT='ollama;webui'\n",
    );
    let options = ComposeOptions {
        selectors: vec!["ollama".into()],
        no_defaults: true,
        dir: dir.path().to_path_buf(),
        ..ComposeOptions::default()
    };

    let outcome = compose_run(&options, &profile, &builtin_registry(), |_| None)
        .expect("composition should succeed");
    assert!(outcome.manifest.services.contains_key("ollama"));
    assert!(!outcome.manifest.services.contains_key("webui"));
}

#[test]
fn config_templates_expand_after_the_pipeline() {
    let dir = tempfile::tempdir().expect("tempdir");
    write(
        dir.path(),
        "compose.yml",
        "services: {}\n",
    );
    write(
        dir.path(),
        "compose.proxy.yml",
        "\
services:
  proxy:
    image: nginx
    command: nginx -g 'daemon off;'
    x-moorage-config-templates:
      - source: ./proxy/default.conf
        target: /etc/nginx/conf.d/default.conf
",
    );

    let profile = EnvProfile::from_contents(".env", "");
    let options = ComposeOptions {
        selectors: vec!["proxy".into()],
        no_defaults: true,
        dir: dir.path().to_path_buf(),
        ..ComposeOptions::default()
    };

    let outcome = compose_run(&options, &profile, &builtin_registry(), |_| None)
        .expect("composition should succeed");
    let proxy = &outcome.manifest.services["proxy"];
    assert!(!proxy.extra.contains_key("x-moorage-config-templates"));
    let Some(Command::Shell(command)) = &proxy.command else {
        panic!("expected wrapped shell command");
    };
    assert!(command.contains("envsubst"));
}
