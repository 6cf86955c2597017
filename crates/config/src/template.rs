//! Default configuration template with all options documented.
//!
//! Written by `portal config init`. Every option is listed so users can see
//! what is configurable without reading the schema.

/// Generate the default config template for `brand`.
pub fn default_config_template(brand: &str) -> String {
    format!(
        r##"# Portal Configuration
# ====================
# Environment variable substitution is supported: ${{ENV_VAR}}
# Example: accounts = "${{PORTAL_API}}/api/accounts"

# Namespace for stored selections. Several brands can share one store file;
# each only reads and writes its own Accounts_<brand> / SelectedAccount_<brand>.
brand = "{brand}"

# Fetch the account detail record before notifying widgets.
# Requires urls.account_details.
load_account_details = false

# ══════════════════════════════════════════════════════════════════════════════
# ENDPOINTS
# ══════════════════════════════════════════════════════════════════════════════

[urls]
accounts = "https://portal.example.com/api/accounts"               # GET, returns {{ "Accounts": [...] }}
# account_details = "https://portal.example.com/api/account-details" # GET ?accessToken=...
logout = "https://portal.example.com/account/logout"               # POST, returns {{ "redirectToUrl": "..." }}
# Any other named endpoint a widget needs:
# renewal_plans = "https://portal.example.com/api/renewal-plans"

# ══════════════════════════════════════════════════════════════════════════════
# STORAGE
# ══════════════════════════════════════════════════════════════════════════════

[storage]
# path = "/var/lib/portal/store.json"   # Default: <data dir>/store.json
# selection_ttl_secs = 3600              # Default: selections never expire

# ══════════════════════════════════════════════════════════════════════════════
# HTTP CLIENT
# ══════════════════════════════════════════════════════════════════════════════

[http]
# timeout_secs = 30                      # Default: no timeout
# user_agent = "portal"
"##
    )
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{schema::PortalConfig, validate::validate_toml_str};

    #[test]
    fn template_parses_with_brand() {
        let cfg: PortalConfig = toml::from_str(&default_config_template("acme")).unwrap();
        assert_eq!(cfg.brand, "acme");
        assert!(!cfg.load_account_details);
        assert!(cfg.urls.accounts.is_some());
        assert!(cfg.urls.account_details.is_none());
    }

    #[test]
    fn template_validates_without_errors() {
        let result = validate_toml_str(&default_config_template("acme"));
        assert!(!result.has_errors(), "{:?}", result.diagnostics);
    }
}
