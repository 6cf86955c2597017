//! Portal HTTP API: account list, account details, and logout.
//!
//! Every endpoint follows the same status contract:
//!
//! | status        | result                                           |
//! |---------------|--------------------------------------------------|
//! | 204, 205      | no payload                                       |
//! | other 2xx     | JSON body (an empty body is treated as none)     |
//! | 401           | [`ApiError::Unauthorized`]                       |
//! | other 4xx     | [`ApiError::Client`] with the body's message     |
//! | 5xx           | [`ApiError::Server`]                             |
//! | anything else | [`ApiError::UnexpectedStatus`]                   |
//! | no response   | [`ApiError::Connectivity`]                       |

use std::time::Duration;

use {
    async_trait::async_trait,
    portal_config::{PortalConfig, UrlsConfig},
    reqwest::{Client, RequestBuilder, header::CONTENT_TYPE},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    serde_json::Value,
    thiserror::Error,
    tracing::{debug, warn},
    url::Url,
};

use crate::{
    account::{Account, AccountDetails},
    error::{self, Result},
};

/// Shown to the user when the server could not be reached at all.
pub const CONNECTIVITY_MESSAGE: &str =
    "Cannot connect. Please make sure you are connected to internet and the API is up and running.";

// ── Errors ──────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{CONNECTIVITY_MESSAGE}")]
    Connectivity { detail: String },

    #[error("{message}")]
    Client {
        status: u16,
        message: String,
        body: Value,
    },

    #[error("unauthorized")]
    Unauthorized,

    #[error("server error (HTTP {status}){}", server_suffix(.message))]
    Server {
        status: u16,
        message: Option<String>,
    },

    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    #[error("could not decode {endpoint} response: {detail}")]
    Decode { endpoint: String, detail: String },

    #[error("endpoint {name} is not configured")]
    NotConfigured { name: String },

    #[error("invalid URL for endpoint {name}: {detail}")]
    InvalidUrl { name: String, detail: String },
}

fn server_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|m| format!(": {m}"))
        .unwrap_or_default()
}

/// Coarse failure classes shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connectivity,
    Client,
    Unauthorized,
    Server,
}

/// A user-facing failure message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureNotice {
    pub kind: FailureKind,
    pub message: String,
}

impl FailureNotice {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl ApiError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Connectivity { .. } => FailureKind::Connectivity,
            Self::Unauthorized => FailureKind::Unauthorized,
            Self::Client { .. } | Self::NotConfigured { .. } | Self::InvalidUrl { .. } => {
                FailureKind::Client
            },
            Self::Server { .. } | Self::UnexpectedStatus { .. } | Self::Decode { .. } => {
                FailureKind::Server
            },
        }
    }

    pub fn notice(&self) -> FailureNotice {
        FailureNotice::new(self.kind(), self.to_string())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }
}

// ── Status contract ─────────────────────────────────────────────────────────

/// Map a response status and body to a payload or an error.
pub fn classify(status: u16, body: &str) -> std::result::Result<Option<Value>, ApiError> {
    match status {
        204 | 205 => Ok(None),
        200..=299 => {
            if body.trim().is_empty() {
                return Ok(None);
            }
            serde_json::from_str(body)
                .map(Some)
                .map_err(|e| ApiError::Decode {
                    endpoint: "response".into(),
                    detail: e.to_string(),
                })
        },
        401 => Err(ApiError::Unauthorized),
        400..=499 => {
            let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
            let message = extract_message(&parsed)
                .unwrap_or_else(|| format!("request failed with HTTP {status}"));
            Err(ApiError::Client {
                status,
                message,
                body: parsed,
            })
        },
        500..=599 => {
            let parsed: Value = serde_json::from_str(body).unwrap_or(Value::Null);
            Err(ApiError::Server {
                status,
                message: extract_message(&parsed),
            })
        },
        _ => Err(ApiError::UnexpectedStatus { status }),
    }
}

/// The human-readable message of a structured error body, if any.
pub fn extract_message(body: &Value) -> Option<String> {
    ["Message", "message", "error"]
        .iter()
        .find_map(|field| {
            body.get(field)?
                .as_str()
                .filter(|m| !m.trim().is_empty())
        })
        .map(str::to_string)
}

// ── API trait ───────────────────────────────────────────────────────────────

/// Body of a successful logout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogoutRedirect {
    #[serde(rename = "redirectToUrl")]
    pub redirect_to_url: String,
}

#[derive(Deserialize)]
struct AccountsResponse {
    #[serde(rename = "Accounts", default)]
    accounts: Vec<Account>,
}

#[async_trait]
pub trait AccountsApi: Send + Sync {
    /// Accounts of the signed-in identity.
    async fn list_accounts(&self) -> std::result::Result<Vec<Account>, ApiError>;

    /// Detail record for the account owning `access_token`. `None` on 204/205.
    async fn account_details(
        &self,
        access_token: &Secret<String>,
    ) -> std::result::Result<Option<AccountDetails>, ApiError>;

    /// End the server session for `access_token`.
    async fn logout(
        &self,
        access_token: &Secret<String>,
    ) -> std::result::Result<Option<LogoutRedirect>, ApiError>;
}

// ── HTTP implementation ─────────────────────────────────────────────────────

#[derive(Debug)]
pub struct HttpAccountsApi {
    client: Client,
    urls: UrlsConfig,
}

impl HttpAccountsApi {
    pub fn new(urls: UrlsConfig) -> Self {
        Self::with_client(Client::new(), urls)
    }

    pub fn with_client(client: Client, urls: UrlsConfig) -> Self {
        Self { client, urls }
    }

    /// Build a client honouring `http.timeout_secs` and `http.user_agent`.
    pub fn from_config(config: &PortalConfig) -> Result<Self> {
        let mut builder = Client::builder();
        if let Some(secs) = config.http.timeout_secs
            && secs > 0
        {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        if let Some(agent) = &config.http.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        let client = builder.build().map_err(error::Error::HttpClient)?;
        Ok(Self::with_client(client, config.urls.clone()))
    }

    fn endpoint(&self, name: &str) -> std::result::Result<Url, ApiError> {
        let raw = self.urls.get(name).ok_or_else(|| ApiError::NotConfigured {
            name: name.to_string(),
        })?;
        Url::parse(raw).map_err(|e| ApiError::InvalidUrl {
            name: name.to_string(),
            detail: e.to_string(),
        })
    }

    async fn execute(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> std::result::Result<Option<Value>, ApiError> {
        let resp = request
            .header(CONTENT_TYPE, "application/json")
            .send()
            .await
            .map_err(|e| {
                warn!(endpoint, error = %e, "portal api unreachable");
                ApiError::Connectivity {
                    detail: e.to_string(),
                }
            })?;

        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| {
            warn!(endpoint, status, error = %e, "portal api response body unreadable");
            ApiError::Connectivity {
                detail: e.to_string(),
            }
        })?;
        debug!(endpoint, status, "portal api responded");

        classify(status, &body).map_err(|e| match e {
            ApiError::Decode { detail, .. } => ApiError::Decode {
                endpoint: endpoint.to_string(),
                detail,
            },
            other => other,
        })
    }
}

fn decode<T: DeserializeOwned>(endpoint: &str, value: Value) -> std::result::Result<T, ApiError> {
    serde_json::from_value(value).map_err(|e| ApiError::Decode {
        endpoint: endpoint.to_string(),
        detail: e.to_string(),
    })
}

#[async_trait]
impl AccountsApi for HttpAccountsApi {
    async fn list_accounts(&self) -> std::result::Result<Vec<Account>, ApiError> {
        let url = self.endpoint("accounts")?;
        let request = self.client.get(url);
        match self.execute("accounts", request).await? {
            Some(body) => Ok(decode::<AccountsResponse>("accounts", body)?.accounts),
            None => Ok(Vec::new()),
        }
    }

    async fn account_details(
        &self,
        access_token: &Secret<String>,
    ) -> std::result::Result<Option<AccountDetails>, ApiError> {
        let mut url = self.endpoint("account_details")?;
        url.query_pairs_mut()
            .append_pair("accessToken", access_token.expose_secret());
        let request = self.client.get(url);
        Ok(self
            .execute("account_details", request)
            .await?
            .map(AccountDetails::new))
    }

    async fn logout(
        &self,
        access_token: &Secret<String>,
    ) -> std::result::Result<Option<LogoutRedirect>, ApiError> {
        let url = self.endpoint("logout")?;
        let request = self
            .client
            .post(url)
            .header("Access_Token", access_token.expose_secret().as_str())
            .header("Is_Ajax_Request", "true");
        match self.execute("logout", request).await? {
            Some(body) => Ok(Some(decode("logout", body)?)),
            None => Ok(None),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn success_with_body() {
        let value = classify(200, r#"{"Accounts": []}"#).unwrap();
        assert_eq!(value, Some(json!({"Accounts": []})));
    }

    #[test]
    fn no_content_statuses_carry_no_payload() {
        assert_eq!(classify(204, "").unwrap(), None);
        assert_eq!(classify(205, "ignored").unwrap(), None);
        assert_eq!(classify(200, "  ").unwrap(), None);
    }

    #[test]
    fn bad_json_on_success_is_decode_error() {
        let err = classify(200, "<html>").unwrap_err();
        assert!(matches!(err, ApiError::Decode { .. }));
        assert_eq!(err.kind(), FailureKind::Server);
    }

    #[test]
    fn client_error_carries_structured_message() {
        let err = classify(400, r#"{"Message": "Account is closed"}"#).unwrap_err();
        match &err {
            ApiError::Client {
                status,
                message,
                body,
            } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "Account is closed");
                assert_eq!(body["Message"], "Account is closed");
            },
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(err.notice().message, "Account is closed");
    }

    #[test]
    fn not_found_without_body_still_classified() {
        let err = classify(404, "").unwrap_err();
        assert_eq!(err.kind(), FailureKind::Client);
        assert_eq!(err.to_string(), "request failed with HTTP 404");
    }

    #[test]
    fn unauthorized_is_distinct() {
        let err = classify(401, r#"{"Message": "expired"}"#).unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(err.kind(), FailureKind::Unauthorized);
    }

    #[test]
    fn server_errors() {
        let err = classify(500, r#"{"message": "boom"}"#).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Server);
        assert_eq!(err.to_string(), "server error (HTTP 500): boom");
        assert_eq!(
            classify(503, "").unwrap_err().to_string(),
            "server error (HTTP 503)"
        );
    }

    #[test]
    fn informational_and_redirect_statuses_are_unexpected() {
        assert!(matches!(
            classify(302, "").unwrap_err(),
            ApiError::UnexpectedStatus { status: 302 }
        ));
    }

    #[test]
    fn connectivity_notice_text() {
        let err = ApiError::Connectivity {
            detail: "connection refused".into(),
        };
        let notice = err.notice();
        assert_eq!(notice.kind, FailureKind::Connectivity);
        assert_eq!(notice.message, CONNECTIVITY_MESSAGE);
    }

    #[test]
    fn message_fields_in_priority_order() {
        assert_eq!(
            extract_message(&json!({"error": "e", "Message": "M"})),
            Some("M".into())
        );
        assert_eq!(extract_message(&json!({"error": "e"})), Some("e".into()));
        assert_eq!(extract_message(&json!({"Message": "  "})), None);
        assert_eq!(extract_message(&Value::Null), None);
    }

    #[test]
    fn blank_message_falls_through_to_later_fields() {
        assert_eq!(
            extract_message(&json!({"Message": " ", "message": "", "error": "Account locked"})),
            Some("Account locked".into())
        );
        let err = classify(400, r#"{"Message": "", "error": "Account locked"}"#).unwrap_err();
        assert_eq!(err.notice().message, "Account locked");
    }

    #[test]
    fn invalid_user_agent_fails_client_build() {
        let mut config = PortalConfig::default();
        config.http.user_agent = Some("bad\nagent".into());
        let err = HttpAccountsApi::from_config(&config).unwrap_err();
        assert!(matches!(err, error::Error::HttpClient(_)));
    }

    #[test]
    fn missing_endpoint_is_reported_by_name() {
        let api = HttpAccountsApi::new(UrlsConfig::default());
        let err = api.endpoint("accounts").unwrap_err();
        assert_eq!(err.to_string(), "endpoint accounts is not configured");
    }
}
