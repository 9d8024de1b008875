//! Session options from the config file and command-line overrides.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use portal::SessionOptions;
use tracing::debug;

use crate::cli::Cli;

/// `$XDG_CONFIG_HOME/pie-portal/config.json`
pub fn default_config_path() -> Option<PathBuf> {
	dirs::config_dir().map(|dir| dir.join("pie-portal").join("config.json"))
}

/// Reads options from `path`. A missing file yields the defaults.
pub fn load(path: &Path) -> Result<SessionOptions> {
	let raw = match std::fs::read_to_string(path) {
		Ok(raw) => raw,
		Err(err) if err.kind() == ErrorKind::NotFound => {
			debug!(target = "portal.cli", path = %path.display(), "no config file, using defaults");
			return Ok(SessionOptions::default());
		}
		Err(err) => return Err(err).with_context(|| format!("failed to read {}", path.display())),
	};

	debug!(target = "portal.cli", path = %path.display(), "loaded config file");
	serde_json::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
}

/// Effective options: the config file with flag overrides applied.
pub fn resolve(cli: &Cli) -> Result<SessionOptions> {
	let options = match cli.config.clone().or_else(default_config_path) {
		Some(path) => load(&path)?,
		None => SessionOptions::default(),
	};
	Ok(apply_overrides(options, cli))
}

pub fn apply_overrides(mut options: SessionOptions, cli: &Cli) -> SessionOptions {
	if let Some(parent_window) = &cli.parent_window {
		options = options.with_parent_window(parent_window.clone());
	}
	if let Some(ms) = cli.timeout_ms {
		options = options.with_request_timeout(Some(Duration::from_millis(ms)));
	}
	if let Some(persist) = cli.persist {
		options = options.with_persist_mode(persist.into());
	}
	options
}
