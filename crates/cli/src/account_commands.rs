use std::sync::Arc;

use {
    anyhow::{Context, Result, bail},
    portal_accounts::{
        AccountContextBroadcaster, BillSummaryWidget, CompositeAccountId, HttpAccountsApi,
        LoadOutcome, LogoutHandler, LogoutOutcome, LowerPanelWidget, PublishOutcome,
        SelectionState, SelectionStore, UnauthorizedHandler,
    },
    portal_config::PortalConfig,
    portal_store::{FileStore, KeyValueStore},
    tracing::{debug, warn},
};

use crate::terminal::{CliSession, TerminalPrompt, json_printer, read_choice};

fn open_store(config: &PortalConfig) -> Arc<dyn KeyValueStore> {
    let path = portal_config::store_path(config);
    debug!(path = %path.display(), "using store");
    Arc::new(FileStore::new(path))
}

struct Host {
    broadcaster: AccountContextBroadcaster,
    lower_panel: Arc<LowerPanelWidget>,
    bill: Arc<BillSummaryWidget>,
}

fn host(config: &PortalConfig) -> Result<Host> {
    let broadcaster = AccountContextBroadcaster::from_config(
        config,
        open_store(config),
        Arc::new(TerminalPrompt),
        Arc::new(CliSession),
    )?;
    broadcaster.subscribe_accounts(json_printer("stdout-accounts"));
    broadcaster.subscribe(json_printer("stdout"));

    let lower_panel = Arc::new(LowerPanelWidget::new());
    let bill = Arc::new(BillSummaryWidget::new());
    if config.load_account_details {
        broadcaster.subscribe(lower_panel.clone());
        broadcaster.subscribe(bill.clone());
    }

    Ok(Host {
        broadcaster,
        lower_panel,
        bill,
    })
}

impl Host {
    fn report(&self, outcome: PublishOutcome) -> Result<()> {
        match outcome {
            PublishOutcome::Notified(report) => {
                for failure in &report.failures {
                    warn!(subscriber = %failure.subscriber, error = %failure.message, "widget failed");
                }
                if let Some(panel) = self.lower_panel.panel() {
                    eprintln!("Dashboard panel: {panel:?}");
                }
                if let Some(summary) = self.bill.summary() {
                    eprintln!("Bill: {}", serde_json::to_string(&summary)?);
                }
                Ok(())
            },
            PublishOutcome::NoDetails => {
                eprintln!("No account details available.");
                Ok(())
            },
            PublishOutcome::Stale => Ok(()),
            PublishOutcome::DetailsUnavailable(notice) => bail!(notice.message),
            PublishOutcome::Unauthorized => bail!("session is no longer authorized"),
        }
    }
}

pub async fn accounts(config: &PortalConfig) -> Result<()> {
    let host = host(config)?;

    match host.broadcaster.load().await? {
        LoadOutcome::Cached(outcome) | LoadOutcome::AutoSelected(outcome) => host.report(outcome),
        LoadOutcome::AwaitingSelection { count } => {
            let SelectionState::AwaitingSelection { accounts } = host.broadcaster.state() else {
                bail!("account list is no longer awaiting a selection");
            };
            let index = read_choice(std::io::stdin().lock(), count)?;
            let account = accounts.get(index).context("choice out of range")?;
            let outcome = host.broadcaster.choose(account.composite_id()?).await?;
            host.report(outcome)
        },
        LoadOutcome::NoAccounts => bail!(portal_accounts::broadcaster::NO_ACCOUNTS_MESSAGE),
        LoadOutcome::Unauthorized => bail!("session is no longer authorized"),
        LoadOutcome::Failed(notice) => bail!(notice.message),
    }
}

pub async fn select(config: &PortalConfig, account: &str) -> Result<()> {
    let selected: CompositeAccountId = account.parse()?;
    let host = host(config)?;
    let outcome = host.broadcaster.change_selection(selected).await?;
    host.report(outcome)
}

pub async fn reload(config: &PortalConfig) -> Result<()> {
    let host = host(config)?;
    let outcome = host.broadcaster.reload().await?;
    host.report(outcome)
}

pub async fn logout(config: &PortalConfig) -> Result<()> {
    let store = open_store(config);
    let session = Arc::new(CliSession);
    let selected = SelectionStore::new(Arc::clone(&store), config.brand.clone()).selected()?;

    let unauthorized = Arc::new(UnauthorizedHandler::new(
        Arc::clone(&store),
        session.clone(),
    ));
    let handler = LogoutHandler::new(
        Arc::new(HttpAccountsApi::from_config(config)?),
        store,
        session,
        unauthorized,
    );

    match handler.logout(selected.as_ref()).await? {
        LogoutOutcome::Redirected { .. } => {},
        LogoutOutcome::Unauthorized => bail!("session is no longer authorized"),
        LogoutOutcome::LocalOnly => eprintln!("Logged out locally."),
    }
    Ok(())
}

pub fn clear(config: &PortalConfig) -> Result<()> {
    let store = open_store(config);
    store.clear_all()?;
    eprintln!("Store cleared.");
    Ok(())
}
