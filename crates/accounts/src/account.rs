//! Accounts, the composite account identifier, and account detail records.

use std::{fmt, str::FromStr};

use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Deserializer, Serialize, Serializer},
    serde_json::Value,
};

use crate::error::{Error, Result};

// ── Account ─────────────────────────────────────────────────────────────────

/// One account belonging to the signed-in identity, as listed by the server.
///
/// Field names match the server payload and the stored `Accounts_<Brand>` list.
#[derive(Clone, Serialize, Deserialize)]
pub struct Account {
    #[serde(rename = "CustomerNumber", deserialize_with = "string_or_number")]
    pub customer_number: String,
    #[serde(rename = "AccountId", deserialize_with = "string_or_number")]
    pub account_id: String,
    #[serde(rename = "AccessToken", serialize_with = "serialize_secret")]
    pub access_token: Secret<String>,
    #[serde(rename = "DisplayValue", default)]
    pub display_value: String,
}

impl Account {
    pub fn new(
        customer_number: impl Into<String>,
        account_id: impl Into<String>,
        access_token: impl Into<String>,
        display_value: impl Into<String>,
    ) -> Self {
        Self {
            customer_number: customer_number.into(),
            account_id: account_id.into(),
            access_token: Secret::new(access_token.into()),
            display_value: display_value.into(),
        }
    }

    /// The composite identifier selecting this account.
    pub fn composite_id(&self) -> Result<CompositeAccountId> {
        CompositeAccountId::new(
            self.customer_number.clone(),
            self.account_id.clone(),
            self.access_token.expose_secret().clone(),
        )
    }

    /// Whether `id` names this account (customer number, account id and token).
    pub fn matches(&self, id: &CompositeAccountId) -> bool {
        self.customer_number == id.customer_number
            && self.account_id == id.account_id
            && self.access_token.expose_secret() == id.access_token.expose_secret()
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.customer_number == other.customer_number
            && self.account_id == other.account_id
            && self.display_value == other.display_value
            && self.access_token.expose_secret() == other.access_token.expose_secret()
    }
}

impl Eq for Account {}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("customer_number", &self.customer_number)
            .field("account_id", &self.account_id)
            .field("access_token", &"[REDACTED]")
            .field("display_value", &self.display_value)
            .finish()
    }
}

// ── CompositeAccountId ──────────────────────────────────────────────────────

/// `"{CustomerNumber}-{AccountId}*{AccessToken}"`, the account handle shared
/// with the backend and every other client reading the store.
///
/// Parsing splits on the first `*` (the access token is the whole remainder)
/// and then on the first `-`. Components that would make that split
/// ambiguous are rejected at construction.
#[derive(Clone)]
pub struct CompositeAccountId {
    customer_number: String,
    account_id: String,
    access_token: Secret<String>,
}

impl CompositeAccountId {
    pub fn new(
        customer_number: impl Into<String>,
        account_id: impl Into<String>,
        access_token: impl Into<String>,
    ) -> Result<Self> {
        let customer_number = customer_number.into();
        let account_id = account_id.into();
        let access_token = access_token.into();

        if customer_number.is_empty() {
            return Err(Error::invalid_account_id("customer number is empty"));
        }
        if customer_number.contains(['-', '*']) {
            return Err(Error::invalid_account_id(format!(
                "customer number {customer_number:?} contains '-' or '*'"
            )));
        }
        if account_id.is_empty() {
            return Err(Error::invalid_account_id("account id is empty"));
        }
        if account_id.contains('*') {
            return Err(Error::invalid_account_id(format!(
                "account id {account_id:?} contains '*'"
            )));
        }
        if access_token.is_empty() {
            return Err(Error::invalid_account_id("access token is empty"));
        }

        Ok(Self {
            customer_number,
            account_id,
            access_token: Secret::new(access_token),
        })
    }

    pub fn parse(raw: &str) -> Result<Self> {
        let (account_part, access_token) = raw
            .split_once('*')
            .ok_or_else(|| Error::invalid_account_id("missing '*' before the access token"))?;
        let (customer_number, account_id) = account_part.split_once('-').ok_or_else(|| {
            Error::invalid_account_id("missing '-' between customer number and account id")
        })?;
        Self::new(customer_number, account_id, access_token)
    }

    /// Wire form. Contains the access token.
    pub fn encode(&self) -> String {
        format!(
            "{}-{}*{}",
            self.customer_number,
            self.account_id,
            self.access_token.expose_secret()
        )
    }

    pub fn customer_number(&self) -> &str {
        &self.customer_number
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    pub fn access_token(&self) -> &Secret<String> {
        &self.access_token
    }

    /// `"{CustomerNumber}-{AccountId}"`, safe to log.
    pub fn account_key(&self) -> String {
        format!("{}-{}", self.customer_number, self.account_id)
    }
}

impl PartialEq for CompositeAccountId {
    fn eq(&self, other: &Self) -> bool {
        self.customer_number == other.customer_number
            && self.account_id == other.account_id
            && self.access_token.expose_secret() == other.access_token.expose_secret()
    }
}

impl Eq for CompositeAccountId {}

impl fmt::Debug for CompositeAccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositeAccountId")
            .field("customer_number", &self.customer_number)
            .field("account_id", &self.account_id)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl FromStr for CompositeAccountId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for CompositeAccountId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for CompositeAccountId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ── AccountDetails ──────────────────────────────────────────────────────────

/// Detail record for the selected account, passed through as received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountDetails(Value);

impl AccountDetails {
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    /// String field; numbers are rendered, empty strings read as absent.
    pub fn text(&self, field: &str) -> Option<String> {
        match self.get(field)? {
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Boolean field, accepting `true`/`false` strings; absent or null is false.
    pub fn flag(&self, field: &str) -> bool {
        match self.get(field) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            Some(Value::Number(n)) => n.as_f64().is_some_and(|v| v != 0.0),
            _ => false,
        }
    }

    /// Numeric field, accepting numbers and amount strings such as `"$1,204.50"`.
    pub fn amount(&self, field: &str) -> Option<f64> {
        match self.get(field)? {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => {
                let cleaned: String = s
                    .trim()
                    .chars()
                    .filter(|c| !matches!(c, '$' | ',' | ' '))
                    .collect();
                cleaned.parse().ok()
            },
            _ => None,
        }
    }

    pub fn account_status(&self) -> Option<String> {
        self.text("AccountStatus")
    }

    pub fn is_suspended(&self) -> bool {
        self.account_status()
            .is_some_and(|s| s.eq_ignore_ascii_case("suspended"))
    }

    pub fn auto_pay(&self) -> bool {
        self.flag("Auto_Pay")
    }

    pub fn paperless(&self) -> bool {
        self.flag("Paperless")
    }

    pub fn is_past_due(&self) -> bool {
        self.flag("IsPastDue")
    }

    pub fn total_due(&self) -> Option<f64> {
        self.amount("TotalDue")
    }

    pub fn has_at_least_one_payment(&self) -> bool {
        self.flag("HasAtleastOnePayment")
    }

    pub fn my_bill_display_view(&self) -> Option<String> {
        self.text("MyBillDisplayView")
    }
}

// ── Serde helpers ───────────────────────────────────────────────────────────

fn serialize_secret<S: Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn string_or_number<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> std::result::Result<String, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "expected string or number, got {other}"
        ))),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn composite_id_format_and_parse() {
        let id = CompositeAccountId::new("123456", "7", "tok3n").unwrap();
        assert_eq!(id.encode(), "123456-7*tok3n");

        let parsed: CompositeAccountId = "123456-7*tok3n".parse().unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.account_key(), "123456-7");
    }

    #[test]
    fn access_token_keeps_full_remainder() {
        let id = CompositeAccountId::parse("123456-7*abc*def-1").unwrap();
        assert_eq!(id.customer_number(), "123456");
        assert_eq!(id.account_id(), "7");
        assert_eq!(id.access_token().expose_secret(), "abc*def-1");
        assert_eq!(id.encode(), "123456-7*abc*def-1");
    }

    #[test]
    fn account_id_may_contain_dash() {
        let id = CompositeAccountId::parse("42-7-B*t").unwrap();
        assert_eq!(id.customer_number(), "42");
        assert_eq!(id.account_id(), "7-B");
    }

    #[test]
    fn ambiguous_components_rejected() {
        assert!(CompositeAccountId::new("12-34", "7", "t").is_err());
        assert!(CompositeAccountId::new("12*34", "7", "t").is_err());
        assert!(CompositeAccountId::new("1234", "7*", "t").is_err());
        assert!(CompositeAccountId::new("", "7", "t").is_err());
        assert!(CompositeAccountId::new("1234", "7", "").is_err());
    }

    #[test]
    fn malformed_wire_values_rejected() {
        for raw in ["", "123456-7", "1234567*tok", "-7*tok", "123-*tok", "123-7*"] {
            assert!(
                CompositeAccountId::parse(raw).is_err(),
                "{raw:?} should not parse"
            );
        }
    }

    #[test]
    fn debug_redacts_token() {
        let id = CompositeAccountId::parse("1-2*super-secret").unwrap();
        let account = Account::new("1", "2", "super-secret", "Main St");
        assert!(!format!("{id:?}").contains("super-secret"));
        assert!(!format!("{account:?}").contains("super-secret"));
    }

    #[test]
    fn account_uses_server_field_names() {
        let account: Account = serde_json::from_value(json!({
            "CustomerNumber": 100200,
            "AccountId": "3",
            "AccessToken": "tok",
            "DisplayValue": "12 Elm St"
        }))
        .unwrap();
        assert_eq!(account.customer_number, "100200");
        assert_eq!(account.composite_id().unwrap().encode(), "100200-3*tok");

        let back = serde_json::to_value(&account).unwrap();
        assert_eq!(back["AccessToken"], "tok");
        assert_eq!(back["CustomerNumber"], "100200");
    }

    #[test]
    fn account_matches_its_composite_id() {
        let account = Account::new("9", "1", "t", "Home");
        let id = account.composite_id().unwrap();
        assert!(account.matches(&id));
        assert!(!Account::new("9", "1", "other", "Home").matches(&id));
    }

    #[test]
    fn composite_id_serializes_as_string() {
        let id = CompositeAccountId::parse("5-6*x").unwrap();
        assert_eq!(serde_json::to_value(&id).unwrap(), json!("5-6*x"));
        let back: CompositeAccountId = serde_json::from_value(json!("5-6*x")).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_value::<CompositeAccountId>(json!("nope")).is_err());
    }

    #[test]
    fn detail_accessors_are_lenient() {
        let details = AccountDetails::new(json!({
            "AccountStatus": "Suspended",
            "Auto_Pay": "true",
            "Paperless": false,
            "TotalDue": "$1,204.50",
            "IsPastDue": null,
            "MyBillDisplayView": ""
        }));
        assert!(details.is_suspended());
        assert!(details.auto_pay());
        assert!(!details.paperless());
        assert!(!details.is_past_due());
        assert_eq!(details.total_due(), Some(1204.5));
        assert!(details.my_bill_display_view().is_none());
        assert!(details.amount("Missing").is_none());
    }
}
