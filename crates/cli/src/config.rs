//! Locating and loading the provider set.
//!
//! Precedence: `--providers FILE`, then `$PROMPTCAST_PROVIDERS`, then
//! `<config_dir>/promptcast/providers.json` if it exists, then the builtins.

use std::fmt;
use std::path::{Path, PathBuf};

use promptcast::ProviderSet;
use tracing::debug;

use crate::error::Result;

pub const PROVIDERS_ENV: &str = "PROMPTCAST_PROVIDERS";
pub const APP_DIR: &str = "promptcast";
pub const PROVIDERS_FILE: &str = "providers.json";

/// Where the provider set came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderSource {
	Flag(PathBuf),
	Env(PathBuf),
	UserConfig(PathBuf),
	Builtin,
}

impl ProviderSource {
	pub fn path(&self) -> Option<&Path> {
		match self {
			ProviderSource::Flag(path) | ProviderSource::Env(path) | ProviderSource::UserConfig(path) => Some(path),
			ProviderSource::Builtin => None,
		}
	}
}

impl fmt::Display for ProviderSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ProviderSource::Flag(path) => write!(f, "--providers {}", path.display()),
			ProviderSource::Env(path) => write!(f, "${PROVIDERS_ENV} ({})", path.display()),
			ProviderSource::UserConfig(path) => write!(f, "{}", path.display()),
			ProviderSource::Builtin => write!(f, "builtin"),
		}
	}
}

/// Picks the provider file without reading it. An explicit flag or env path
/// wins even if the file is missing, so the load reports the typo.
pub fn resolve_provider_source(flag: Option<&Path>, env: Option<&str>, config_dir: Option<&Path>) -> ProviderSource {
	if let Some(path) = flag {
		return ProviderSource::Flag(path.to_path_buf());
	}
	if let Some(raw) = env.filter(|raw| !raw.trim().is_empty()) {
		return ProviderSource::Env(PathBuf::from(raw));
	}
	if let Some(dir) = config_dir {
		let candidate = dir.join(APP_DIR).join(PROVIDERS_FILE);
		if candidate.is_file() {
			return ProviderSource::UserConfig(candidate);
		}
	}
	ProviderSource::Builtin
}

/// Resolves against the real environment and loads the set.
pub fn load_providers(flag: Option<&Path>) -> Result<(ProviderSet, ProviderSource)> {
	let env = std::env::var(PROVIDERS_ENV).ok();
	let config_dir = dirs::config_dir();
	let source = resolve_provider_source(flag, env.as_deref(), config_dir.as_deref());
	let set = load_from(&source)?;
	debug!(target = "promptcast.config", %source, providers = set.len(), "loaded provider set");
	Ok((set, source))
}

pub fn load_from(source: &ProviderSource) -> Result<ProviderSet> {
	Ok(match source.path() {
		Some(path) => ProviderSet::load(path)?,
		None => ProviderSet::builtin(),
	})
}
