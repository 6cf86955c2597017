use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::{env_subst::substitute_env, schema::PortalConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["portal.toml", "portal.yaml", "portal.yml", "portal.json"];

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> anyhow::Result<PortalConfig> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("failed to read {}: {e}", path.display()))?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations.
///
/// Search order:
/// 1. `./portal.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/portal/portal.{toml,yaml,yml,json}` (user-global)
///
/// Returns `PortalConfig::default()` if no config file is found.
pub fn discover_and_load() -> PortalConfig {
    if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => return cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
            },
        }
    } else {
        debug!("no config file found, using defaults");
    }
    PortalConfig::default()
}

/// Find the first config file in standard locations.
pub(crate) fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir()?;
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// Returns the user-global config directory (`~/.config/portal/`).
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "portal").map(|d| d.config_dir().to_path_buf())
}

/// Returns the user-global data directory.
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "portal").map(|d| d.data_dir().to_path_buf())
}

/// Resolve the store file: the configured path, or `<data dir>/store.json`.
pub fn store_path(config: &PortalConfig) -> PathBuf {
    if let Some(path) = &config.storage.path {
        return path.clone();
    }
    data_dir()
        .unwrap_or_else(|| PathBuf::from(".portal"))
        .join("store.json")
}

/// Apply `PORTAL_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: PortalConfig) -> PortalConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: PortalConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> PortalConfig {
    if let Some(brand) = lookup("PORTAL_BRAND").filter(|b| !b.trim().is_empty()) {
        info!(brand = %brand, "brand overridden from environment");
        config.brand = brand;
    }
    if let Some(raw) = lookup("PORTAL_LOAD_ACCOUNT_DETAILS") {
        match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => config.load_account_details = true,
            "0" | "false" | "no" | "off" => config.load_account_details = false,
            other => warn!(value = other, "ignoring invalid PORTAL_LOAD_ACCOUNT_DETAILS"),
        }
    }
    config
}

fn parse_config(raw: &str, path: &Path) -> anyhow::Result<PortalConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => anyhow::bail!("unsupported config format: .{ext}"),
    }
}
