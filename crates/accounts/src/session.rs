//! Session teardown: the 401 handler and explicit logout.

use std::sync::Arc;

use {
    portal_store::KeyValueStore,
    tracing::{info, warn},
};

use crate::{
    account::CompositeAccountId,
    api::{AccountsApi, ApiError},
    error::Result,
};

/// Host navigation hooks.
pub trait SessionControl: Send + Sync {
    /// Reload the whole page so the host re-authenticates.
    fn force_reload(&self);

    /// Navigate away to `url`.
    fn redirect(&self, url: &str);
}

/// Reacts to an unauthorized response: forget everything stored for every
/// brand, then force a full reload.
pub struct UnauthorizedHandler {
    store: Arc<dyn KeyValueStore>,
    session: Arc<dyn SessionControl>,
}

impl UnauthorizedHandler {
    pub fn new(store: Arc<dyn KeyValueStore>, session: Arc<dyn SessionControl>) -> Self {
        Self { store, session }
    }

    /// The reload is requested even when clearing the store fails.
    pub fn handle(&self) -> Result<()> {
        warn!("session unauthorized, clearing stored state");
        let cleared = self.store.clear_all();
        self.session.force_reload();
        cleared.map_err(Into::into)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogoutOutcome {
    /// The server ended the session and named where to go next.
    Redirected { url: String },
    /// The server rejected the token; the unauthorized handler ran.
    Unauthorized,
    /// Local state was cleared but no server round trip completed with a
    /// redirect (no selection, no logout endpoint, or an empty response).
    LocalOnly,
}

pub struct LogoutHandler {
    api: Arc<dyn AccountsApi>,
    store: Arc<dyn KeyValueStore>,
    session: Arc<dyn SessionControl>,
    unauthorized: Arc<UnauthorizedHandler>,
}

impl LogoutHandler {
    pub fn new(
        api: Arc<dyn AccountsApi>,
        store: Arc<dyn KeyValueStore>,
        session: Arc<dyn SessionControl>,
        unauthorized: Arc<UnauthorizedHandler>,
    ) -> Self {
        Self {
            api,
            store,
            session,
            unauthorized,
        }
    }

    /// Clear the store, then end the server session of `selected`.
    pub async fn logout(&self, selected: Option<&CompositeAccountId>) -> Result<LogoutOutcome> {
        self.store.clear_all()?;

        let Some(selected) = selected else {
            info!("logged out locally, no account selected");
            return Ok(LogoutOutcome::LocalOnly);
        };

        match self.api.logout(selected.access_token()).await {
            Ok(Some(redirect)) => {
                info!(account = %selected.account_key(), "logged out");
                self.session.redirect(&redirect.redirect_to_url);
                Ok(LogoutOutcome::Redirected {
                    url: redirect.redirect_to_url,
                })
            },
            Ok(None) => Ok(LogoutOutcome::LocalOnly),
            Err(ApiError::Unauthorized) => {
                self.unauthorized.handle()?;
                Ok(LogoutOutcome::Unauthorized)
            },
            Err(ApiError::NotConfigured { name }) => {
                warn!(endpoint = %name, "logout endpoint not configured, logged out locally");
                Ok(LogoutOutcome::LocalOnly)
            },
            Err(e) => Err(e.into()),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use {
        async_trait::async_trait,
        portal_store::MemoryStore,
        secrecy::{ExposeSecret, Secret},
        serde_json::json,
    };

    use {
        super::*,
        crate::{
            account::{Account, AccountDetails},
            api::LogoutRedirect,
        },
    };

    #[derive(Default)]
    struct RecordingSession {
        events: Mutex<Vec<String>>,
    }

    impl SessionControl for RecordingSession {
        fn force_reload(&self) {
            self.events.lock().unwrap().push("reload".into());
        }

        fn redirect(&self, url: &str) {
            self.events.lock().unwrap().push(format!("redirect:{url}"));
        }
    }

    struct LogoutApi {
        status: u16,
        seen_token: Mutex<Option<String>>,
    }

    #[async_trait]
    impl AccountsApi for LogoutApi {
        async fn list_accounts(&self) -> std::result::Result<Vec<Account>, ApiError> {
            Ok(Vec::new())
        }

        async fn account_details(
            &self,
            _access_token: &Secret<String>,
        ) -> std::result::Result<Option<AccountDetails>, ApiError> {
            Ok(None)
        }

        async fn logout(
            &self,
            access_token: &Secret<String>,
        ) -> std::result::Result<Option<LogoutRedirect>, ApiError> {
            *self.seen_token.lock().unwrap() = Some(access_token.expose_secret().clone());
            match self.status {
                200 => Ok(Some(LogoutRedirect {
                    redirect_to_url: "https://portal.example.com/login".into(),
                })),
                401 => Err(ApiError::Unauthorized),
                status => Err(ApiError::Server {
                    status,
                    message: None,
                }),
            }
        }
    }

    fn setup(status: u16) -> (Arc<MemoryStore>, Arc<RecordingSession>, Arc<LogoutApi>, LogoutHandler) {
        let store = Arc::new(MemoryStore::new());
        store.set("Accounts_acme", json!([]), None).unwrap();
        store.set("SelectedAccount_rge", json!("1-2*t"), None).unwrap();
        let session = Arc::new(RecordingSession::default());
        let api = Arc::new(LogoutApi {
            status,
            seen_token: Mutex::new(None),
        });
        let unauthorized = Arc::new(UnauthorizedHandler::new(store.clone(), session.clone()));
        let handler = LogoutHandler::new(api.clone(), store.clone(), session.clone(), unauthorized);
        (store, session, api, handler)
    }

    #[test]
    fn unauthorized_clears_every_brand_and_reloads() {
        let store = Arc::new(MemoryStore::new());
        store.set("Accounts_acme", json!([]), None).unwrap();
        store.set("SelectedAccount_rge", json!("1-2*t"), None).unwrap();
        let session = Arc::new(RecordingSession::default());

        UnauthorizedHandler::new(store.clone(), session.clone())
            .handle()
            .unwrap();

        assert!(store.keys().unwrap().is_empty());
        assert_eq!(*session.events.lock().unwrap(), vec!["reload".to_string()]);
    }

    #[tokio::test]
    async fn logout_redirects_with_selected_token() {
        let (store, session, api, handler) = setup(200);
        let selected = CompositeAccountId::parse("100-1*tok*en").unwrap();

        let outcome = handler.logout(Some(&selected)).await.unwrap();

        assert_eq!(outcome, LogoutOutcome::Redirected {
            url: "https://portal.example.com/login".into()
        });
        assert!(store.keys().unwrap().is_empty());
        assert_eq!(api.seen_token.lock().unwrap().as_deref(), Some("tok*en"));
        assert_eq!(*session.events.lock().unwrap(), vec![
            "redirect:https://portal.example.com/login".to_string()
        ]);
    }

    #[tokio::test]
    async fn logout_rejected_token_runs_unauthorized_handler() {
        let (_store, session, _api, handler) = setup(401);
        let selected = CompositeAccountId::parse("100-1*tok").unwrap();

        let outcome = handler.logout(Some(&selected)).await.unwrap();

        assert_eq!(outcome, LogoutOutcome::Unauthorized);
        assert_eq!(*session.events.lock().unwrap(), vec!["reload".to_string()]);
    }

    #[tokio::test]
    async fn logout_server_failure_is_returned_after_local_clear() {
        let (store, session, _api, handler) = setup(500);
        let selected = CompositeAccountId::parse("100-1*tok").unwrap();

        let err = handler.logout(Some(&selected)).await.unwrap_err();

        assert!(matches!(err, crate::Error::Api(ApiError::Server { .. })));
        assert!(store.keys().unwrap().is_empty());
        assert!(session.events.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn logout_without_selection_is_local() {
        let (store, _session, api, handler) = setup(200);
        let outcome = handler.logout(None).await.unwrap();
        assert_eq!(outcome, LogoutOutcome::LocalOnly);
        assert!(store.keys().unwrap().is_empty());
        assert!(api.seen_token.lock().unwrap().is_none());
    }
}
