/// Config schema types (brand, endpoints, storage, http client).
use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalConfig {
    /// Tenant/product namespace used to scope persisted keys.
    pub brand: String,
    /// Whether widgets need the account detail record or only the selection.
    pub load_account_details: bool,
    pub urls: UrlsConfig,
    pub storage: StorageConfig,
    pub http: HttpConfig,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            brand: "portal".into(),
            load_account_details: false,
            urls: UrlsConfig::default(),
            storage: StorageConfig::default(),
            http: HttpConfig::default(),
        }
    }
}

/// Named server endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct UrlsConfig {
    /// GET, returns `{ "Accounts": [...] }` for the signed-in identity.
    pub accounts: Option<String>,
    /// GET, `?accessToken=` selects the account.
    pub account_details: Option<String>,
    /// POST, returns `{ "redirectToUrl": "..." }`.
    pub logout: Option<String>,
    /// Any other named endpoint a page widget needs.
    #[serde(flatten)]
    pub other: BTreeMap<String, String>,
}

impl UrlsConfig {
    /// Look up an endpoint by name, covering both the well-known and the
    /// free-form entries.
    pub fn get(&self, name: &str) -> Option<&str> {
        match name {
            "accounts" => self.accounts.as_deref(),
            "account_details" => self.account_details.as_deref(),
            "logout" => self.logout.as_deref(),
            other => self.other.get(other).map(String::as_str),
        }
    }
}

/// Persistent key/value store settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Store file. Defaults to `<data dir>/store.json`.
    pub path: Option<PathBuf>,
    /// Expire cached account selections after this many seconds.
    /// Unset means selections never expire.
    pub selection_ttl_secs: Option<u64>,
}

/// HTTP client settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout. Unset means no timeout.
    pub timeout_secs: Option<u64>,
    pub user_agent: Option<String>,
}
