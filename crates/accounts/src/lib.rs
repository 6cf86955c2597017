//! Account selection and account-context broadcast for the customer portal.
//!
//! The [`AccountContextBroadcaster`] decides which account is active for the
//! session (restoring it from the brand-scoped store, auto-selecting a lone
//! account, or waiting for the user to pick one), optionally fetches that
//! account's detail record, and notifies every subscribed page widget.

pub mod account;
pub mod api;
pub mod broadcaster;
pub mod context;
pub mod error;
pub mod prompt;
pub mod selection;
pub mod session;
pub mod widgets;

pub use {
    account::{Account, AccountDetails, CompositeAccountId},
    api::{AccountsApi, ApiError, FailureKind, FailureNotice, HttpAccountsApi, LogoutRedirect},
    broadcaster::{
        AccountContextBroadcaster, BroadcasterOptions, LoadOutcome, PublishOutcome,
        SelectionState,
    },
    context::AccountContext,
    error::{Error, Result},
    prompt::{AccountPrompt, HeadlessPrompt},
    selection::{CachedSelection, SelectionStore},
    session::{LogoutHandler, LogoutOutcome, SessionControl, UnauthorizedHandler},
    widgets::{
        BillAction, BillSummary, BillSummaryWidget, BillTone, LatestPayment, LowerPanel,
        LowerPanelWidget, PastDueBanner, SelectionTracker,
    },
};
