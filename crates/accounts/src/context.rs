//! The payload broadcast to page widgets.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::account::{Account, AccountDetails, CompositeAccountId};

/// What the portal knows about the active account at one point in time.
///
/// Serializes to the loosely-shaped object other portal clients expect:
/// `{ "Accounts"?, "SelectedAccount", "SelectedAccountDetails"? }`.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountContext {
    /// The account list together with the selection made from it.
    Listed {
        accounts: Vec<Account>,
        selected: CompositeAccountId,
    },
    /// Selection only; details were not requested.
    Selected { selected: CompositeAccountId },
    /// Selection plus the detail record fetched for exactly that selection.
    Detailed {
        selected: CompositeAccountId,
        details: AccountDetails,
    },
}

impl AccountContext {
    pub fn selected(&self) -> &CompositeAccountId {
        match self {
            Self::Listed { selected, .. }
            | Self::Selected { selected }
            | Self::Detailed { selected, .. } => selected,
        }
    }

    pub fn accounts(&self) -> Option<&[Account]> {
        match self {
            Self::Listed { accounts, .. } => Some(accounts),
            _ => None,
        }
    }

    pub fn details(&self) -> Option<&AccountDetails> {
        match self {
            Self::Detailed { details, .. } => Some(details),
            _ => None,
        }
    }
}

#[derive(Serialize)]
struct WireRef<'a> {
    #[serde(rename = "Accounts", skip_serializing_if = "Option::is_none")]
    accounts: Option<&'a [Account]>,
    #[serde(rename = "SelectedAccount")]
    selected: &'a CompositeAccountId,
    #[serde(rename = "SelectedAccountDetails", skip_serializing_if = "Option::is_none")]
    details: Option<&'a AccountDetails>,
}

#[derive(Deserialize)]
struct Wire {
    #[serde(rename = "Accounts", default)]
    accounts: Option<Vec<Account>>,
    #[serde(rename = "SelectedAccount")]
    selected: CompositeAccountId,
    #[serde(rename = "SelectedAccountDetails", default)]
    details: Option<AccountDetails>,
}

impl Serialize for AccountContext {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        WireRef {
            accounts: self.accounts(),
            selected: self.selected(),
            details: self.details(),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for AccountContext {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = Wire::deserialize(deserializer)?;
        match (wire.accounts, wire.details) {
            (Some(_), Some(_)) => Err(serde::de::Error::custom(
                "Accounts and SelectedAccountDetails are never sent together",
            )),
            (Some(accounts), None) => Ok(Self::Listed {
                accounts,
                selected: wire.selected,
            }),
            (None, Some(details)) => Ok(Self::Detailed {
                selected: wire.selected,
                details,
            }),
            (None, None) => Ok(Self::Selected {
                selected: wire.selected,
            }),
        }
    }
}
