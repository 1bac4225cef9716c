//! `moor config` — Read and write env profile values.

use clap::{Args, Subcommand};
use moorage_common::error::MoorageError;
use moorage_common::profile::{EnvProfile, env_key};

/// Arguments for the `config` command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    /// Config operation to perform.
    #[command(subcommand)]
    pub operation: ConfigOperation,
}

/// Profile operations.
#[derive(Subcommand, Debug)]
pub enum ConfigOperation {
    /// Print the value of a dotted config key.
    Get {
        /// Dotted config key, e.g. `compose.command`.
        key: String,
    },
    /// Set a dotted config key.
    Set {
        /// Dotted config key, e.g. `compose.command`.
        key: String,
        /// Value to store; multiple values are stored as a list.
        #[arg(required = true)]
        values: Vec<String>,
    },
}

/// Executes the `config` command.
///
/// # Errors
///
/// Returns an error if the profile cannot be read or written, or when
/// `get` names a key that is not set.
pub fn execute(args: ConfigArgs, profile_path: &str) -> anyhow::Result<()> {
    let mut profile = EnvProfile::load(profile_path)?;

    match args.operation {
        ConfigOperation::Get { key } => {
            let value = profile.get_optional(&key).ok_or(MoorageError::NotFound {
                kind: "profile key",
                id: env_key(&key),
            })?;
            println!("{value}");
        }
        ConfigOperation::Set { key, values } => {
            if let [value] = values.as_slice() {
                profile.set(&key, value)?;
            } else {
                profile.set_list(&key, &values)?;
            }
        }
    }
    Ok(())
}
