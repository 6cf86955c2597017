//! Decides which account is active and broadcasts it to page widgets.
//!
//! Two subscriber lists are kept:
//!
//! - account-list subscribers (the selector dropdown) receive
//!   [`AccountContext::Listed`] whenever a selection is made or restored;
//! - widget subscribers receive [`AccountContext::Selected`] or
//!   [`AccountContext::Detailed`] for every publication.
//!
//! Every publication takes a sequence number. A detail response that arrives
//! after a newer publication started is dropped instead of overwriting the
//! newer selection.

use std::{
    sync::{
        Arc, Mutex,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use {
    portal_common::{NotifyReport, Observable, SubscriberRef},
    portal_config::PortalConfig,
    portal_store::KeyValueStore,
    tracing::{debug, info, warn},
};

use crate::{
    account::{Account, CompositeAccountId},
    api::{AccountsApi, ApiError, FailureKind, FailureNotice, HttpAccountsApi},
    context::AccountContext,
    error::{Error, Result},
    prompt::AccountPrompt,
    selection::SelectionStore,
    session::{SessionControl, UnauthorizedHandler},
};

/// Shown when the signed-in identity owns no accounts.
pub const NO_ACCOUNTS_MESSAGE: &str = "No accounts are associated with this login.";

/// Shown when the chosen account could not be persisted.
pub const SAVE_FAILED_MESSAGE: &str = "The account selection could not be saved.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BroadcasterOptions {
    /// Store namespace.
    pub brand: String,
    /// Fetch the detail record before notifying widgets.
    pub load_account_details: bool,
    /// Expire persisted selections after this long.
    pub selection_ttl: Option<Duration>,
}

impl BroadcasterOptions {
    pub fn new(brand: impl Into<String>) -> Self {
        Self {
            brand: brand.into(),
            load_account_details: false,
            selection_ttl: None,
        }
    }

    #[must_use]
    pub fn with_account_details(mut self, load: bool) -> Self {
        self.load_account_details = load;
        self
    }

    #[must_use]
    pub fn with_selection_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.selection_ttl = ttl;
        self
    }

    pub fn from_config(config: &PortalConfig) -> Self {
        Self::new(config.brand.clone())
            .with_account_details(config.load_account_details)
            .with_selection_ttl(config.storage.selection_ttl_secs.map(Duration::from_secs))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionState {
    Idle,
    Loading,
    /// Several accounts were listed; waiting for [`AccountContextBroadcaster::choose`].
    AwaitingSelection { accounts: Vec<Account> },
    Selected { selected: CompositeAccountId },
}

/// Result of one publication to widget subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    Notified(NotifyReport),
    /// The detail endpoint answered 204/205; nobody was notified.
    NoDetails,
    /// A newer publication started while details were in flight.
    Stale,
    DetailsUnavailable(FailureNotice),
    /// The detail endpoint answered 401; the unauthorized handler ran.
    Unauthorized,
}

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome {
    /// Both keys were in the store; no account list was requested.
    Cached(PublishOutcome),
    /// The identity owns exactly one account, which was selected.
    AutoSelected(PublishOutcome),
    /// The prompt is presenting `count` accounts.
    AwaitingSelection { count: usize },
    NoAccounts,
    Unauthorized,
    Failed(FailureNotice),
}

pub struct AccountContextBroadcaster {
    options: BroadcasterOptions,
    api: Arc<dyn AccountsApi>,
    selection: SelectionStore,
    prompt: Arc<dyn AccountPrompt>,
    unauthorized: Arc<UnauthorizedHandler>,
    account_subscribers: Observable<AccountContext>,
    widget_subscribers: Observable<AccountContext>,
    state: Mutex<SelectionState>,
    sequence: AtomicU64,
}

impl AccountContextBroadcaster {
    pub fn new(
        options: BroadcasterOptions,
        api: Arc<dyn AccountsApi>,
        store: Arc<dyn KeyValueStore>,
        prompt: Arc<dyn AccountPrompt>,
        session: Arc<dyn SessionControl>,
    ) -> Self {
        let selection = SelectionStore::new(Arc::clone(&store), options.brand.clone())
            .with_ttl(options.selection_ttl);
        let unauthorized = Arc::new(UnauthorizedHandler::new(store, session));
        Self {
            options,
            api,
            selection,
            prompt,
            unauthorized,
            account_subscribers: Observable::new(),
            widget_subscribers: Observable::new(),
            state: Mutex::new(SelectionState::Idle),
            sequence: AtomicU64::new(0),
        }
    }

    /// Wire up an HTTP-backed broadcaster from loaded configuration.
    pub fn from_config(
        config: &PortalConfig,
        store: Arc<dyn KeyValueStore>,
        prompt: Arc<dyn AccountPrompt>,
        session: Arc<dyn SessionControl>,
    ) -> Result<Self> {
        let api = Arc::new(HttpAccountsApi::from_config(config)?);
        Ok(Self::new(
            BroadcasterOptions::from_config(config),
            api,
            store,
            prompt,
            session,
        ))
    }

    pub fn options(&self) -> &BroadcasterOptions {
        &self.options
    }

    pub fn api(&self) -> &Arc<dyn AccountsApi> {
        &self.api
    }

    pub fn selection_store(&self) -> &SelectionStore {
        &self.selection
    }

    pub fn unauthorized_handler(&self) -> &Arc<UnauthorizedHandler> {
        &self.unauthorized
    }

    pub fn state(&self) -> SelectionState {
        self.state.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    // ── Subscriptions ───────────────────────────────────────────────────────

    /// Receive every widget publication from now on.
    pub fn subscribe(&self, subscriber: SubscriberRef<AccountContext>) {
        self.widget_subscribers.subscribe(subscriber);
    }

    pub fn subscribe_fn<F>(&self, name: impl Into<String>, f: F) -> SubscriberRef<AccountContext>
    where
        F: Fn(&AccountContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.widget_subscribers.subscribe_fn(name, f)
    }

    pub fn unsubscribe(&self, subscriber: &SubscriberRef<AccountContext>) {
        self.widget_subscribers.unsubscribe(subscriber);
    }

    /// Receive the account list each time a selection is made or restored.
    pub fn subscribe_accounts(&self, subscriber: SubscriberRef<AccountContext>) {
        self.account_subscribers.subscribe(subscriber);
    }

    pub fn unsubscribe_accounts(&self, subscriber: &SubscriberRef<AccountContext>) {
        self.account_subscribers.unsubscribe(subscriber);
    }

    // ── Operations ──────────────────────────────────────────────────────────

    /// Restore, auto-select, or ask for the active account.
    pub async fn load(&self) -> Result<LoadOutcome> {
        if let Some(cached) = self.selection.load()? {
            debug!(
                brand = %self.options.brand,
                account = %cached.selected.account_key(),
                "restoring cached account selection"
            );
            self.set_state(SelectionState::Selected {
                selected: cached.selected.clone(),
            });
            self.notify_accounts(AccountContext::Listed {
                accounts: cached.accounts,
                selected: cached.selected.clone(),
            });
            let outcome = self.publish(&cached.selected).await?;
            return Ok(LoadOutcome::Cached(outcome));
        }

        self.set_state(SelectionState::Loading);
        self.prompt.show_loading();
        let listed = self.api.list_accounts().await;
        self.prompt.finish_loading();

        let accounts = match listed {
            Ok(accounts) => accounts,
            Err(ApiError::Unauthorized) => {
                self.set_state(SelectionState::Idle);
                self.unauthorized.handle()?;
                return Ok(LoadOutcome::Unauthorized);
            },
            Err(e) => {
                let notice = e.notice();
                warn!(brand = %self.options.brand, error = %e, "account list request failed");
                self.prompt.show_failure(&notice);
                self.set_state(SelectionState::Idle);
                return Ok(LoadOutcome::Failed(notice));
            },
        };

        if accounts.len() > 1 {
            let count = accounts.len();
            info!(brand = %self.options.brand, count, "multiple accounts, awaiting selection");
            self.prompt.present_accounts(&accounts);
            self.set_state(SelectionState::AwaitingSelection { accounts });
            return Ok(LoadOutcome::AwaitingSelection { count });
        }

        let Some(only) = accounts.first() else {
            warn!(brand = %self.options.brand, "no accounts for this login");
            self.prompt
                .show_failure(&FailureNotice::new(FailureKind::Client, NO_ACCOUNTS_MESSAGE));
            self.set_state(SelectionState::Idle);
            return Ok(LoadOutcome::NoAccounts);
        };

        let selected = match only.composite_id() {
            Ok(id) => id,
            Err(e) => {
                warn!(brand = %self.options.brand, error = %e, "account list returned an unusable account");
                self.prompt
                    .show_failure(&FailureNotice::new(FailureKind::Client, e.to_string()));
                self.set_state(SelectionState::Idle);
                return Err(e);
            },
        };
        info!(brand = %self.options.brand, account = %selected.account_key(), "single account, auto-selecting");
        match self.establish(accounts, selected).await {
            Ok(outcome) => Ok(LoadOutcome::AutoSelected(outcome)),
            Err(e) => {
                if self.state() == SelectionState::Loading {
                    self.set_state(SelectionState::Idle);
                }
                Err(e)
            },
        }
    }

    /// The user picked `selected` from the presented list.
    pub async fn choose(&self, selected: CompositeAccountId) -> Result<PublishOutcome> {
        let accounts = match &*self.state.lock().unwrap_or_else(|e| e.into_inner()) {
            SelectionState::AwaitingSelection { accounts } => accounts.clone(),
            _ => return Err(Error::NotAwaitingSelection),
        };
        if !accounts.iter().any(|a| a.matches(&selected)) {
            return Err(Error::UnknownAccount {
                account: selected.account_key(),
            });
        }
        info!(brand = %self.options.brand, account = %selected.account_key(), "account chosen");
        self.establish(accounts, selected).await
    }

    /// The dropdown switched to `selected`.
    pub async fn change_selection(&self, selected: CompositeAccountId) -> Result<PublishOutcome> {
        self.selection.save_selected(&selected)?;
        info!(brand = %self.options.brand, account = %selected.account_key(), "selected account changed");
        self.set_state(SelectionState::Selected {
            selected: selected.clone(),
        });
        self.publish(&selected).await
    }

    /// Publish the stored selection again without changing it.
    pub async fn reload(&self) -> Result<PublishOutcome> {
        let selected = self
            .selection
            .selected()?
            .ok_or_else(|| Error::NoSelection {
                brand: self.options.brand.clone(),
            })?;
        debug!(brand = %self.options.brand, account = %selected.account_key(), "reloading account context");
        self.publish(&selected).await
    }

    /// Notify widget subscribers about `selected`, fetching details first
    /// when configured to.
    pub async fn publish(&self, selected: &CompositeAccountId) -> Result<PublishOutcome> {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;

        if !self.options.load_account_details {
            let report = self.widget_subscribers.notify(&AccountContext::Selected {
                selected: selected.clone(),
            });
            return Ok(PublishOutcome::Notified(report));
        }

        let fetched = self.api.account_details(selected.access_token()).await;

        if matches!(fetched, Err(ApiError::Unauthorized)) {
            self.unauthorized.handle()?;
            return Ok(PublishOutcome::Unauthorized);
        }

        if self.sequence.load(Ordering::SeqCst) != sequence {
            debug!(
                account = %selected.account_key(),
                sequence,
                "discarding stale account details"
            );
            return Ok(PublishOutcome::Stale);
        }

        match fetched {
            Ok(Some(details)) => {
                let report = self.widget_subscribers.notify(&AccountContext::Detailed {
                    selected: selected.clone(),
                    details,
                });
                Ok(PublishOutcome::Notified(report))
            },
            Ok(None) => {
                debug!(account = %selected.account_key(), "account details empty, nothing to publish");
                Ok(PublishOutcome::NoDetails)
            },
            Err(e) => {
                warn!(account = %selected.account_key(), error = %e, "account details request failed");
                Ok(PublishOutcome::DetailsUnavailable(e.notice()))
            },
        }
    }

    async fn establish(
        &self,
        accounts: Vec<Account>,
        selected: CompositeAccountId,
    ) -> Result<PublishOutcome> {
        if let Err(e) = self.selection.save(&accounts, &selected) {
            warn!(brand = %self.options.brand, error = %e, "failed to save account selection");
            self.prompt
                .show_failure(&FailureNotice::new(FailureKind::Client, SAVE_FAILED_MESSAGE));
            return Err(e);
        }
        self.set_state(SelectionState::Selected {
            selected: selected.clone(),
        });
        self.prompt.hide();
        self.notify_accounts(AccountContext::Listed {
            accounts,
            selected: selected.clone(),
        });
        self.publish(&selected).await
    }

    fn notify_accounts(&self, context: AccountContext) {
        let report = self.account_subscribers.notify(&context);
        debug!(
            delivered = report.delivered(),
            failed = report.failures.len(),
            "account list published"
        );
    }

    fn set_state(&self, state: SelectionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }
}
