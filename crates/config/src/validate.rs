//! Configuration validation engine.
//!
//! Validates TOML configuration files against the known schema, detects
//! unknown/misspelled fields, and reports endpoint and storage problems.

use std::{collections::HashMap, path::Path};

use url::Url;

use crate::schema::PortalConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "endpoint",
    /// "brand", "storage", "http", "file-ref"
    pub category: &'static str,
    /// Dotted path, e.g. "urls.accounts"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration file.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<std::path::PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

// ── Schema tree for unknown-field detection ─────────────────────────────────

/// Represents the expected shape of the configuration schema.
enum KnownKeys {
    /// A struct with fixed field names.
    Struct(HashMap<&'static str, KnownKeys>),
    /// A table whose keys are free-form (named endpoints).
    OpenTable,
    /// Scalar value, stop recursion.
    Leaf,
}

/// Build the full schema map mirroring every field in `schema.rs`.
fn build_schema_map() -> KnownKeys {
    use KnownKeys::*;

    let storage = Struct(HashMap::from([("path", Leaf), ("selection_ttl_secs", Leaf)]));
    let http = Struct(HashMap::from([("timeout_secs", Leaf), ("user_agent", Leaf)]));

    Struct(HashMap::from([
        ("brand", Leaf),
        ("load_account_details", Leaf),
        ("urls", OpenTable),
        ("storage", storage),
        ("http", http),
    ]))
}

// ── Levenshtein distance ────────────────────────────────────────────────────

/// Compute the Levenshtein edit distance between two strings.
fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}

/// Find the best match for `needle` among `candidates` using Levenshtein
/// distance. Returns `Some(best)` if the distance is <= `max_distance`.
fn suggest<'a>(needle: &str, candidates: &[&'a str], max_distance: usize) -> Option<&'a str> {
    let mut best: Option<(&'a str, usize)> = None;
    for &candidate in candidates {
        let d = levenshtein(needle, candidate);
        if d > 0 && d <= max_distance && best.as_ref().is_none_or(|(_, bd)| d < *bd) {
            best = Some((candidate, d));
        }
    }
    best.map(|(s, _)| s)
}

// ── Core validation ─────────────────────────────────────────────────────────

/// Validate a config file at the given path, or discover the default config
/// file location if `path` is `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = if let Some(p) = path {
        Some(p.to_path_buf())
    } else {
        crate::loader::find_config_file()
    };

    let Some(ref actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "file-ref",
                path: String::new(),
                message: "no config file found; using defaults".into(),
            }],
            config_path: None,
        };
    };

    match std::fs::read_to_string(actual_path) {
        Ok(content) => {
            let content = crate::env_subst::substitute_env(&content);
            let mut result = validate_toml_str(&content);
            result.config_path = Some(actual_path.clone());
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("failed to read config file: {e}"),
            }],
            config_path: Some(actual_path.clone()),
        },
    }
}

/// Validate a TOML string without file-system side effects.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let mut diagnostics = Vec::new();

    // 1. Syntax
    let toml_value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: format!("TOML syntax error: {e}"),
            });
            return ValidationResult {
                diagnostics,
                config_path: None,
            };
        },
    };

    // 2. Unknown fields
    let schema = build_schema_map();
    check_unknown_fields(&toml_value, &schema, "", &mut diagnostics);

    // 3. Types, then semantics on the parsed config
    match toml::from_str::<PortalConfig>(toml_str) {
        Ok(config) => check_semantics(&config, &mut diagnostics),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: String::new(),
            message: format!("type error: {e}"),
        }),
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

/// Walk the TOML value tree against the schema tree and flag unknown keys.
fn check_unknown_fields(
    value: &toml::Value,
    schema: &KnownKeys,
    prefix: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let (toml::Value::Table(table), KnownKeys::Struct(fields)) = (value, schema) else {
        return;
    };

    let known_keys: Vec<&str> = fields.keys().copied().collect();
    for (key, child_value) in table {
        let path = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        if let Some(child_schema) = fields.get(key.as_str()) {
            check_unknown_fields(child_value, child_schema, &path, diagnostics);
            continue;
        }
        let level = if prefix.is_empty() {
            "at top level "
        } else {
            ""
        };
        let msg = match suggest(key, &known_keys, 3) {
            Some(s) => format!("unknown field {level}(did you mean \"{s}\"?)"),
            None => format!("unknown field {level}"),
        };
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "unknown-field",
            path,
            message: msg.trim().to_string(),
        });
    }
}

fn check_semantics(config: &PortalConfig, diagnostics: &mut Vec<Diagnostic>) {
    let brand = config.brand.trim();
    if brand.is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "brand",
            path: "brand".into(),
            message: "brand must not be empty; it namespaces the stored account keys".into(),
        });
    } else if config.brand.chars().any(char::is_whitespace) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "brand",
            path: "brand".into(),
            message: format!(
                "brand \"{}\" contains whitespace; stored keys become \"Accounts_{}\"",
                config.brand, config.brand
            ),
        });
    }

    match config.urls.accounts.as_deref() {
        None => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "endpoint",
            path: "urls.accounts".into(),
            message: "account-list endpoint is required".into(),
        }),
        Some(raw) => check_url("urls.accounts", raw, diagnostics),
    }

    match config.urls.account_details.as_deref() {
        None if config.load_account_details => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "endpoint",
            path: "urls.account_details".into(),
            message: "load_account_details is enabled but no account-details endpoint is set"
                .into(),
        }),
        None => {},
        Some(raw) => check_url("urls.account_details", raw, diagnostics),
    }

    match config.urls.logout.as_deref() {
        None => diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "endpoint",
            path: "urls.logout".into(),
            message: "no logout endpoint; logout will only clear local state".into(),
        }),
        Some(raw) => check_url("urls.logout", raw, diagnostics),
    }

    for (name, raw) in &config.urls.other {
        check_url(&format!("urls.{name}"), raw, diagnostics);
    }

    if config.http.timeout_secs == Some(0) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "http",
            path: "http.timeout_secs".into(),
            message: "a zero timeout disables the request timeout; remove it or set a positive value".into(),
        });
    }

    if config.storage.selection_ttl_secs == Some(0) {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "storage",
            path: "storage.selection_ttl_secs".into(),
            message: "a zero TTL expires the account selection immediately".into(),
        });
    }
}

fn check_url(path: &str, raw: &str, diagnostics: &mut Vec<Diagnostic>) {
    match Url::parse(raw) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {},
        Ok(url) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "endpoint",
            path: path.to_string(),
            message: format!("unsupported scheme \"{}\"", url.scheme()),
        }),
        Err(e) => diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "endpoint",
            path: path.to_string(),
            message: format!("invalid URL \"{raw}\": {e}"),
        }),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"
brand = "acme"
load_account_details = true

[urls]
accounts = "https://portal.example.com/api/accounts"
account_details = "https://portal.example.com/api/account-details"
logout = "https://portal.example.com/logout"
renewal_plans = "https://portal.example.com/api/renewal"

[storage]
selection_ttl_secs = 3600

[http]
timeout_secs = 30
"#;

    fn find<'a>(result: &'a ValidationResult, path: &str) -> Option<&'a Diagnostic> {
        result.diagnostics.iter().find(|d| d.path == path)
    }

    #[test]
    fn levenshtein_basics() {
        assert_eq!(levenshtein("brand", "brand"), 0);
        assert_eq!(levenshtein("", "abc"), 3);
        assert_eq!(levenshtein("brnad", "brand"), 2);
        assert_eq!(levenshtein("url", "urls"), 1);
    }

    #[test]
    fn full_valid_config_no_diagnostics() {
        let result = validate_toml_str(VALID);
        assert!(
            result.diagnostics.is_empty(),
            "expected no diagnostics, got: {:?}",
            result.diagnostics
        );
    }

    #[test]
    fn syntax_error_detected() {
        let result = validate_toml_str("brand = ");
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn unknown_top_level_key_with_suggestion() {
        let result = validate_toml_str(&format!("url = \"x\"\n{VALID}"));
        let d = find(&result, "url").expect("diagnostic for url");
        assert_eq!(d.category, "unknown-field");
        assert!(d.message.contains("did you mean \"urls\""), "{}", d.message);
    }

    #[test]
    fn unknown_nested_key_with_suggestion() {
        let toml = VALID.replace("timeout_secs = 30", "timeout_sec = 30");
        let result = validate_toml_str(&toml);
        let d = find(&result, "http.timeout_sec").expect("diagnostic");
        assert!(d.message.contains("timeout_secs"));
    }

    #[test]
    fn free_form_urls_are_not_unknown_fields() {
        let result = validate_toml_str(VALID);
        assert!(find(&result, "urls.renewal_plans").is_none());
    }

    #[test]
    fn empty_config_requires_accounts_endpoint() {
        let result = validate_toml_str("");
        let d = find(&result, "urls.accounts").expect("missing accounts endpoint");
        assert_eq!(d.severity, Severity::Error);
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn empty_brand_is_error() {
        let toml = VALID.replace("brand = \"acme\"", "brand = \"  \"");
        let result = validate_toml_str(&toml);
        assert_eq!(find(&result, "brand").unwrap().severity, Severity::Error);
    }

    #[test]
    fn brand_with_space_is_warning() {
        let toml = VALID.replace("brand = \"acme\"", "brand = \"acme energy\"");
        let result = validate_toml_str(&toml);
        assert_eq!(find(&result, "brand").unwrap().severity, Severity::Warning);
    }

    #[test]
    fn details_endpoint_required_when_loading_details() {
        let toml = VALID.replace(
            "account_details = \"https://portal.example.com/api/account-details\"\n",
            "",
        );
        let result = validate_toml_str(&toml);
        let d = find(&result, "urls.account_details").unwrap();
        assert_eq!(d.severity, Severity::Error);
    }

    #[test]
    fn invalid_and_non_http_urls_rejected() {
        let toml = VALID
            .replace(
                "logout = \"https://portal.example.com/logout\"",
                "logout = \"not a url\"",
            )
            .replace(
                "renewal_plans = \"https://portal.example.com/api/renewal\"",
                "renewal_plans = \"ftp://portal.example.com/renewal\"",
            );
        let result = validate_toml_str(&toml);
        assert!(find(&result, "urls.logout").unwrap().message.contains("invalid URL"));
        assert!(
            find(&result, "urls.renewal_plans")
                .unwrap()
                .message
                .contains("unsupported scheme")
        );
    }

    #[test]
    fn zero_timeout_and_ttl_warned() {
        let toml = VALID
            .replace("timeout_secs = 30", "timeout_secs = 0")
            .replace("selection_ttl_secs = 3600", "selection_ttl_secs = 0");
        let result = validate_toml_str(&toml);
        assert_eq!(result.count(Severity::Warning), 2);
        assert!(!result.has_errors());
        let timeout = find(&result, "http.timeout_secs").expect("diagnostic");
        assert!(timeout.message.contains("disables the request timeout"));
    }

    #[test]
    fn type_error_reported() {
        let toml = VALID.replace("load_account_details = true", "load_account_details = \"yes\"");
        let result = validate_toml_str(&toml);
        assert!(result.diagnostics.iter().any(|d| d.category == "type-error"));
    }

    #[test]
    fn validate_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("portal.toml");
        std::fs::write(&path, VALID).unwrap();
        let result = validate(Some(&path));
        assert!(!result.has_errors());
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
    }
}
