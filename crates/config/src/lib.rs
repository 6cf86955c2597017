//! Configuration loading, env substitution, and validation.
//!
//! Config files: `portal.toml`, `portal.yaml`, or `portal.json`
//! Searched in `./` then `~/.config/portal/`.
//!
//! Supports `${ENV_VAR}` substitution in all string values.

pub mod env_subst;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;

pub use {
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, load_config, store_path,
    },
    schema::{HttpConfig, PortalConfig, StorageConfig, UrlsConfig},
    template::default_config_template,
    validate::{Diagnostic, Severity, ValidationResult},
};
