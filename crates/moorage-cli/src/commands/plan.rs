//! `moor plan` — Show the startup wave plan for the matched services.

use clap::Args;
use moorage_common::cache::FileCache;
use moorage_common::profile::EnvProfile;
use moorage_compose::compose::{ComposeOptions, discover_services, read_fragment, resolve_run};
use moorage_schedule::{DependencyGraph, compute_waves, two_phase_fallback};

/// Arguments for the `plan` command.
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Service and capability selectors; `*` selects every service.
    pub selectors: Vec<String>,

    /// Skip the persisted default service and capability lists.
    #[arg(long)]
    pub no_defaults: bool,

    /// Directory to scan for compose fragments.
    #[arg(long, default_value = ".")]
    pub dir: String,

    /// Services that run natively on the host.
    #[arg(long = "native", value_name = "SERVICE")]
    pub native: Vec<String>,
}

/// Executes the `plan` command.
///
/// Builds the dependency graph from the matched fragments and prints one
/// startup wave per line. A cyclic graph is reported along with the
/// coarse native-then-container fallback plan.
///
/// # Errors
///
/// Returns an error if the profile cannot be read or any fragment fails
/// to resolve or parse.
pub fn execute(args: PlanArgs, profile_path: &str) -> anyhow::Result<()> {
    let profile = EnvProfile::load(profile_path)?;
    let options = ComposeOptions {
        selectors: args.selectors,
        no_defaults: args.no_defaults,
        dir: args.dir.into(),
        ..ComposeOptions::default()
    };

    let (selection, files) = resolve_run(&options, &profile)?;
    let mut cache = FileCache::new();

    let mut documents = Vec::with_capacity(files.data.len());
    for path in &files.data {
        let contents = read_fragment(path, &mut cache)?;
        let document: serde_yaml::Value = serde_yaml::from_str(&contents)
            .map_err(|e| moorage_common::error::MoorageError::parse(path, e))?;
        documents.push(document);
    }

    // With the wildcard active the working set is whatever the fragments
    // define, not the selector list.
    let active = if selection.has_wildcard() {
        discover_services(&files, &mut cache)
    } else {
        selection.concrete_services()
    };

    let graph = DependencyGraph::from_documents(&documents, &active);
    let annotate = |name: &String| {
        if args.native.contains(name) {
            format!("{name} (native)")
        } else {
            name.clone()
        }
    };

    match compute_waves(&graph) {
        Ok(waves) => {
            for (i, wave) in waves.iter().enumerate() {
                let members: Vec<String> = wave.iter().map(annotate).collect();
                println!("wave {}: {}", i + 1, members.join(", "));
            }
        }
        Err(cycle) => {
            println!("{cycle}");
            println!("falling back to two-phase startup:");
            let containers: Vec<String> = active
                .iter()
                .filter(|name| !args.native.contains(name))
                .cloned()
                .collect();
            for (i, phase) in two_phase_fallback(&args.native, &containers).iter().enumerate() {
                println!("phase {}: {}", i + 1, phase.join(", "));
            }
        }
    }
    Ok(())
}
