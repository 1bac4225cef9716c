//! `moor compose` — Merge matched fragments and print the orchestrator
//! command line.

use clap::Args;
use moorage_common::profile::EnvProfile;
use moorage_compose::compose::{ComposeOptions, compose_run};
use moorage_compose::modules::builtin_registry;

/// Arguments for the `compose` command.
#[derive(Args, Debug)]
pub struct ComposeArgs {
    /// Service and capability selectors; `*` selects every service.
    pub selectors: Vec<String>,

    /// Skip the persisted default service and capability lists.
    #[arg(long)]
    pub no_defaults: bool,

    /// Directory to scan for compose fragments.
    #[arg(long, default_value = ".")]
    pub dir: String,

    /// Services to run natively; their container fragment is replaced by
    /// the native proxy contract.
    #[arg(short = 'x', long = "exclude", value_name = "SERVICE")]
    pub exclude: Vec<String>,

    /// Where to write the merged manifest.
    #[arg(long)]
    pub output: Option<String>,

    /// Extra arguments forwarded to transform modules.
    #[arg(last = true)]
    pub args: Vec<String>,
}

/// Executes the `compose` command.
///
/// # Errors
///
/// Returns an error if the profile cannot be read or any composition
/// stage fails.
pub fn execute(args: ComposeArgs, profile_path: &str) -> anyhow::Result<()> {
    let profile = EnvProfile::load(profile_path)?;
    let options = ComposeOptions {
        selectors: args.selectors,
        no_defaults: args.no_defaults,
        dir: args.dir.into(),
        exclude: args.exclude,
        output: args.output.map(Into::into),
        args: args.args,
    };

    let outcome = compose_run(&options, &profile, &builtin_registry(), |var| {
        std::env::var(var).ok()
    })?;
    tracing::debug!(manifest = %outcome.manifest_path.display(), "wrote merged manifest");

    println!("{}", outcome.command);
    Ok(())
}
