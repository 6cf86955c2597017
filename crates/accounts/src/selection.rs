//! Brand-scoped persistence of the account list and the active selection.
//!
//! Two keys per brand: `Accounts_<Brand>` holds the JSON account list and
//! `SelectedAccount_<Brand>` the composite identifier string. Several brands
//! share one store, so writes only touch the current brand's keys.

use std::{sync::Arc, time::Duration};

use {
    portal_store::{KeyValueStore, expiry_after},
    serde_json::Value,
    tracing::{debug, warn},
};

use crate::{
    account::{Account, CompositeAccountId},
    error::Result,
};

/// Both halves of a previously persisted selection.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSelection {
    pub accounts: Vec<Account>,
    pub selected: CompositeAccountId,
}

pub struct SelectionStore {
    store: Arc<dyn KeyValueStore>,
    brand: String,
    ttl: Option<Duration>,
}

impl SelectionStore {
    pub fn new(store: Arc<dyn KeyValueStore>, brand: impl Into<String>) -> Self {
        Self {
            store,
            brand: brand.into(),
            ttl: None,
        }
    }

    /// Expire written entries after `ttl`. `None` keeps them until cleared.
    #[must_use]
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn brand(&self) -> &str {
        &self.brand
    }

    pub fn accounts_key(&self) -> String {
        format!("Accounts_{}", self.brand)
    }

    pub fn selected_key(&self) -> String {
        format!("SelectedAccount_{}", self.brand)
    }

    pub fn store(&self) -> &Arc<dyn KeyValueStore> {
        &self.store
    }

    /// The cached selection, if both keys are present and readable.
    pub fn load(&self) -> Result<Option<CachedSelection>> {
        let Some(accounts) = self.accounts()? else {
            return Ok(None);
        };
        let Some(selected) = self.selected()? else {
            return Ok(None);
        };
        Ok(Some(CachedSelection { accounts, selected }))
    }

    pub fn accounts(&self) -> Result<Option<Vec<Account>>> {
        let key = self.accounts_key();
        let Some(value) = self.store.get(&key)? else {
            return Ok(None);
        };
        match serde_json::from_value(value) {
            Ok(accounts) => Ok(Some(accounts)),
            Err(e) => {
                warn!(key = %key, error = %e, "stored account list unreadable, ignoring");
                Ok(None)
            },
        }
    }

    pub fn selected(&self) -> Result<Option<CompositeAccountId>> {
        let key = self.selected_key();
        let Some(value) = self.store.get(&key)? else {
            return Ok(None);
        };
        let parsed = match &value {
            Value::String(raw) => CompositeAccountId::parse(raw),
            _ => Err(crate::Error::invalid_account_id("stored value is not a string")),
        };
        match parsed {
            Ok(id) => Ok(Some(id)),
            Err(e) => {
                warn!(key = %key, error = %e, "stored selection unreadable, ignoring");
                Ok(None)
            },
        }
    }

    /// Persist both keys.
    pub fn save(&self, accounts: &[Account], selected: &CompositeAccountId) -> Result<()> {
        let expires_at = self.expires_at();
        self.store.set(
            &self.accounts_key(),
            serde_json::to_value(accounts)?,
            expires_at,
        )?;
        self.store.set(
            &self.selected_key(),
            Value::String(selected.encode()),
            expires_at,
        )?;
        debug!(
            brand = %self.brand,
            account = %selected.account_key(),
            accounts = accounts.len(),
            "account selection saved"
        );
        Ok(())
    }

    /// Persist the selection key only.
    pub fn save_selected(&self, selected: &CompositeAccountId) -> Result<()> {
        self.store.set(
            &self.selected_key(),
            Value::String(selected.encode()),
            self.expires_at(),
        )?;
        debug!(brand = %self.brand, account = %selected.account_key(), "selected account saved");
        Ok(())
    }

    /// Remove this brand's keys. Other brands are left untouched.
    pub fn clear(&self) -> Result<()> {
        self.store.remove(&self.accounts_key())?;
        self.store.remove(&self.selected_key())?;
        Ok(())
    }

    fn expires_at(&self) -> Option<u64> {
        self.ttl.map(expiry_after)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {portal_store::MemoryStore, serde_json::json};

    use super::*;

    fn accounts() -> Vec<Account> {
        vec![
            Account::new("100", "1", "t1", "1 Main St"),
            Account::new("100", "2", "t2", "2 Main St"),
        ]
    }

    #[test]
    fn keys_are_brand_scoped() {
        let sel = SelectionStore::new(Arc::new(MemoryStore::new()), "acme");
        assert_eq!(sel.accounts_key(), "Accounts_acme");
        assert_eq!(sel.selected_key(), "SelectedAccount_acme");
    }

    #[test]
    fn save_then_load() {
        let sel = SelectionStore::new(Arc::new(MemoryStore::new()), "acme");
        assert!(sel.load().unwrap().is_none());

        let list = accounts();
        let chosen = list[1].composite_id().unwrap();
        sel.save(&list, &chosen).unwrap();

        let cached = sel.load().unwrap().unwrap();
        assert_eq!(cached.accounts, list);
        assert_eq!(cached.selected, chosen);
    }

    #[test]
    fn partial_cache_is_a_miss() {
        let sel = SelectionStore::new(Arc::new(MemoryStore::new()), "acme");
        sel.save_selected(&CompositeAccountId::parse("1-2*t").unwrap())
            .unwrap();
        assert!(sel.load().unwrap().is_none());
        assert!(sel.selected().unwrap().is_some());
    }

    #[test]
    fn brands_do_not_collide() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let acme = SelectionStore::new(Arc::clone(&store), "acme");
        let other = SelectionStore::new(Arc::clone(&store), "rge");

        let list = accounts();
        acme.save(&list, &list[0].composite_id().unwrap()).unwrap();
        assert!(other.load().unwrap().is_none());

        other.save(&list, &list[1].composite_id().unwrap()).unwrap();
        acme.clear().unwrap();
        assert!(acme.load().unwrap().is_none());
        assert!(other.load().unwrap().is_some());
    }

    #[test]
    fn corrupt_values_read_as_absent() {
        let store = Arc::new(MemoryStore::new());
        store.set("Accounts_acme", json!("not a list"), None).unwrap();
        store.set("SelectedAccount_acme", json!(42), None).unwrap();
        let sel = SelectionStore::new(store, "acme");
        assert!(sel.accounts().unwrap().is_none());
        assert!(sel.selected().unwrap().is_none());
    }

    #[test]
    fn ttl_sets_expiry_on_both_keys() {
        let store = Arc::new(MemoryStore::new());
        let sel = SelectionStore::new(Arc::clone(&store) as Arc<dyn KeyValueStore>, "acme")
            .with_ttl(Some(Duration::from_secs(600)));
        let list = accounts();
        sel.save(&list, &list[0].composite_id().unwrap()).unwrap();

        assert!(store.entry("Accounts_acme").unwrap().expires_at.is_some());
        assert!(
            store
                .entry("SelectedAccount_acme")
                .unwrap()
                .expires_at
                .is_some()
        );
    }

    #[test]
    fn without_ttl_entries_never_expire() {
        let store = Arc::new(MemoryStore::new());
        let sel = SelectionStore::new(Arc::clone(&store) as Arc<dyn KeyValueStore>, "acme");
        sel.save_selected(&CompositeAccountId::parse("1-2*t").unwrap())
            .unwrap();
        assert!(
            store
                .entry("SelectedAccount_acme")
                .unwrap()
                .expires_at
                .is_none()
        );
    }
}
