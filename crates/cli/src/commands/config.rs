// `tripline config`: inspect or create the client config file.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Args, Subcommand};
use serde::Serialize;
use tripline_sync::config::config_path;
use tripline_sync::ClientConfig;

use super::GlobalArgs;
use crate::output;

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    action: ConfigAction,
}

#[derive(Debug, Subcommand)]
enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the config file location
    Path,
    /// Write a config file with default values
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Serialize)]
struct PathResult {
    path: PathBuf,
    exists: bool,
}

pub fn run(global: &GlobalArgs, args: ConfigArgs) -> anyhow::Result<()> {
    let format = global.format();
    let path = target_path(global)?;
    match args.action {
        ConfigAction::Show => {
            let config = global.load_config()?;
            output::print_output(format, &config, |c| {
                toml::to_string_pretty(c).unwrap_or_else(|e| format!("<unprintable config: {e}>"))
            })?;
        }
        ConfigAction::Path => {
            let result = PathResult { exists: path.exists(), path };
            output::print_output(format, &result, |r| r.path.display().to_string())?;
        }
        ConfigAction::Init { force } => {
            init(&path, force)?;
            let result = PathResult { exists: true, path };
            output::print_output(format, &result, |r| format!("Wrote {}", r.path.display()))?;
        }
    }
    Ok(())
}

fn target_path(global: &GlobalArgs) -> anyhow::Result<PathBuf> {
    match &global.config {
        Some(path) => Ok(path.clone()),
        None => config_path().context("could not determine home directory"),
    }
}

fn init(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        anyhow::bail!("{} already exists; pass --force to overwrite", path.display());
    }
    ClientConfig::default().save_to(path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn init_writes_loadable_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(".tripline").join("config.toml");

        init(&path, false).unwrap();
        assert_eq!(ClientConfig::load_from(&path).unwrap(), ClientConfig::default());
    }

    #[test]
    fn init_refuses_to_overwrite_without_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "api_url = \"https://trips.example.com/api\"\n").unwrap();

        let error = init(&path, false).unwrap_err();
        assert!(error.to_string().contains("--force"));

        init(&path, true).unwrap();
        assert_eq!(ClientConfig::load_from(&path).unwrap(), ClientConfig::default());
    }
}
