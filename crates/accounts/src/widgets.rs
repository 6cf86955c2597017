//! Bundled page widgets.
//!
//! A widget is any [`Subscriber<AccountContext>`]. Each one here keeps the
//! view it derived from the latest context so hosts can render it; a repeated
//! notification (after a reload) simply replaces that view.

use std::sync::Mutex;

use {
    anyhow::{Result, anyhow},
    portal_common::Subscriber,
    serde::Serialize,
    tracing::debug,
};

use crate::{
    account::{AccountDetails, CompositeAccountId},
    context::AccountContext,
};

fn require_details(context: &AccountContext) -> Result<&AccountDetails> {
    context.details().ok_or_else(|| {
        anyhow!(
            "no account details published for {}",
            context.selected().account_key()
        )
    })
}

// ── SelectionTracker ────────────────────────────────────────────────────────

/// Remembers the most recent context, e.g. to find the token for logout.
#[derive(Debug, Default)]
pub struct SelectionTracker {
    latest: Mutex<Option<AccountContext>>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<AccountContext> {
        self.latest
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn selected(&self) -> Option<CompositeAccountId> {
        self.latest().map(|ctx| ctx.selected().clone())
    }
}

impl Subscriber<AccountContext> for SelectionTracker {
    fn name(&self) -> &str {
        "selection-tracker"
    }

    fn on_notify(&self, context: &AccountContext) -> Result<()> {
        *self.latest.lock().unwrap_or_else(|e| e.into_inner()) = Some(context.clone());
        Ok(())
    }
}

// ── Dashboard lower panel ───────────────────────────────────────────────────

/// The call to action shown below the dashboard summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LowerPanel {
    AutoPaySignUp,
    BudgetBillingSignUp,
    EnergySavingTips,
}

impl LowerPanel {
    pub fn for_details(details: &AccountDetails) -> Self {
        if !details.auto_pay() {
            Self::AutoPaySignUp
        } else if !details.paperless() {
            Self::BudgetBillingSignUp
        } else {
            Self::EnergySavingTips
        }
    }
}

#[derive(Debug, Default)]
pub struct LowerPanelWidget {
    panel: Mutex<Option<LowerPanel>>,
}

impl LowerPanelWidget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn panel(&self) -> Option<LowerPanel> {
        *self.panel.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Subscriber<AccountContext> for LowerPanelWidget {
    fn name(&self) -> &str {
        "dashboard-lower-panel"
    }

    fn on_notify(&self, context: &AccountContext) -> Result<()> {
        let panel = LowerPanel::for_details(require_details(context)?);
        debug!(panel = ?panel, "lower panel updated");
        *self.panel.lock().unwrap_or_else(|e| e.into_inner()) = Some(panel);
        Ok(())
    }
}

// ── My bill ─────────────────────────────────────────────────────────────────

/// Heading colour of the bill card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BillTone {
    PastDue,
    Paid,
}

/// The payment action panel, driven by the server's `MyBillDisplayView`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BillAction {
    PastDuePayNow,
    /// `message` is set only when the account is not on auto pay.
    PaymentPending { message: Option<String> },
    AutoPay { label: String },
    PaymentScheduled { label: String },
    MakePayment,
}

impl BillAction {
    fn for_details(details: &AccountDetails) -> Option<Self> {
        let view = details.my_bill_display_view()?;
        let last_payment = details.text("LastPaymentAmountDisplayValue").unwrap_or_default();
        let scheduled = details.text("ScheduledAutoBillPaymentDateDisplayValue");

        let action = match view.as_str() {
            "PastDuePayNow" => Self::PastDuePayNow,
            "PaymentPending" => Self::PaymentPending {
                message: (!details.auto_pay())
                    .then(|| format!("Your payment of {last_payment} is received")),
            },
            "AutoPay" => Self::AutoPay {
                label: match scheduled {
                    Some(date) => format!("Auto Pay is scheduled for {date}"),
                    None => "Auto Pay is scheduled for your next payment date".into(),
                },
            },
            "PaymentScheduled" => Self::PaymentScheduled {
                label: format!(
                    "Your payment of {last_payment} is scheduled for {}",
                    scheduled.unwrap_or_default()
                ),
            },
            _ => Self::MakePayment,
        };
        Some(action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PastDueBanner {
    pub due_date: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestPayment {
    pub amount: Option<String>,
    pub date: Option<String>,
}

/// Everything the bill card shows for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BillSummary {
    pub suspended: bool,
    pub past_due_banner: Option<PastDueBanner>,
    pub latest_payment: Option<LatestPayment>,
    pub tone: BillTone,
    pub total_due: Option<String>,
    pub current_due: Option<String>,
    pub past_due: Option<String>,
    pub action: Option<BillAction>,
}

impl BillSummary {
    pub fn from_details(details: &AccountDetails) -> Self {
        let total_due = details.total_due();
        let is_past_due = details.is_past_due();
        let has_payment = details.has_at_least_one_payment();

        let owes = is_past_due || total_due.is_some_and(|t| t > 0.0);
        let past_due_banner = (owes && has_payment).then(|| PastDueBanner {
            due_date: details.text("LatestInvoiceDueDate"),
        });

        let settled = !is_past_due && has_payment && total_due.is_some_and(|t| t <= 0.0);
        let latest_payment = settled.then(|| LatestPayment {
            amount: details.text("LastPaymentAmountDisplayValue"),
            date: details.text("LastPaymentDateDisplayValue"),
        });

        Self {
            suspended: details.is_suspended(),
            past_due_banner,
            latest_payment,
            tone: if is_past_due {
                BillTone::PastDue
            } else {
                BillTone::Paid
            },
            total_due: details.text("TotalDueDisplayValue"),
            current_due: details.text("CurrentBalaceDisplayValue"),
            past_due: details.text("PastDueDisplayValue"),
            action: BillAction::for_details(details),
        }
    }
}

#[derive(Debug, Default)]
pub struct BillSummaryWidget {
    summary: Mutex<Option<BillSummary>>,
}

impl BillSummaryWidget {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn summary(&self) -> Option<BillSummary> {
        self.summary
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }
}

impl Subscriber<AccountContext> for BillSummaryWidget {
    fn name(&self) -> &str {
        "my-bill"
    }

    fn on_notify(&self, context: &AccountContext) -> Result<()> {
        let summary = BillSummary::from_details(require_details(context)?);
        *self.summary.lock().unwrap_or_else(|e| e.into_inner()) = Some(summary);
        Ok(())
    }
}
