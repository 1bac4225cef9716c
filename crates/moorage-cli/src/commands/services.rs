//! `moor services` — List the services defined by the matched fragments.

use clap::Args;
use moorage_common::cache::FileCache;
use moorage_common::profile::EnvProfile;
use moorage_compose::compose::{ComposeOptions, discover_services, resolve_run};

/// Arguments for the `services` command.
#[derive(Args, Debug)]
pub struct ServicesArgs {
    /// Service and capability selectors; `*` selects every service.
    pub selectors: Vec<String>,

    /// Skip the persisted default service and capability lists.
    #[arg(long)]
    pub no_defaults: bool,

    /// Directory to scan for compose fragments.
    #[arg(long, default_value = ".")]
    pub dir: String,
}

/// Executes the `services` command, printing one name per line.
///
/// # Errors
///
/// Returns an error if the profile cannot be read or fragment
/// resolution fails.
pub fn execute(args: ServicesArgs, profile_path: &str) -> anyhow::Result<()> {
    let profile = EnvProfile::load(profile_path)?;
    let options = ComposeOptions {
        selectors: args.selectors,
        no_defaults: args.no_defaults,
        dir: args.dir.into(),
        ..ComposeOptions::default()
    };

    let (_, files) = resolve_run(&options, &profile)?;
    for name in discover_services(&files, &mut FileCache::new()) {
        println!("{name}");
    }
    Ok(())
}
