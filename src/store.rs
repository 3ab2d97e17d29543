use std::collections::HashMap;
use std::convert::TryFrom;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::money::Amount;
use crate::service::{ServiceError, TransactionService};
use crate::session::Session;
use crate::storage::LocalStorage;
use crate::summary::Snapshot;
use crate::transactions::{
    validate_description, NewTransaction, SyncEvent, SyncState, Transaction, TransactionDraft,
    TransactionId,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// upper bound for every request to the transaction service
    pub timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> StoreOptions {
        StoreOptions {
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    transaction: Transaction,
    state: SyncState,
}

#[derive(Default)]
struct Ledger {
    entries: Vec<Entry>,
    pending: Vec<(u64, NewTransaction)>,
    next_ticket: u64,
    budget: Option<Amount>,
}

impl Ledger {
    fn entry(&self, id: TransactionId) -> Option<&Entry> {
        self.entries.iter().find(|e| e.transaction.id == id)
    }
    fn entry_mut(&mut self, id: TransactionId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| e.transaction.id == id)
    }
    fn remove(&mut self, id: TransactionId) {
        self.entries.retain(|e| e.transaction.id != id);
    }
    fn settle_create(&mut self, ticket: u64) {
        self.pending.retain(|(t, _)| *t != ticket);
    }
}

/// The session's view of its transactions, kept in step with the service.
///
/// Operations on the same transaction id are serialized; operations on
/// different ids may be awaited concurrently.
pub struct TransactionStore<'a> {
    service: &'a dyn TransactionService,
    storage: &'a dyn LocalStorage,
    session: Session,
    options: StoreOptions,
    ledger: Mutex<Ledger>,
    locks: Mutex<HashMap<TransactionId, Arc<AsyncMutex<()>>>>,
}

impl<'a> TransactionStore<'a> {
    /// new starts with an empty collection and the budget stored for the session user
    pub fn new(
        service: &'a dyn TransactionService,
        storage: &'a dyn LocalStorage,
        session: Session,
        options: StoreOptions,
    ) -> Result<TransactionStore<'a>, StoreError> {
        let budget = storage.budget(session.user())?;
        Ok(TransactionStore {
            service,
            storage,
            session,
            options,
            ledger: Mutex::new(Ledger {
                budget,
                ..Ledger::default()
            }),
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn session(&self) -> Session {
        self.session
    }

    pub fn transactions(&self) -> Vec<Transaction> {
        self.ledger()
            .entries
            .iter()
            .map(|e| e.transaction.clone())
            .collect()
    }

    pub fn get(&self, id: TransactionId) -> Option<Transaction> {
        self.ledger().entry(id).map(|e| e.transaction.clone())
    }

    pub fn state(&self, id: TransactionId) -> SyncState {
        self.ledger()
            .entry(id)
            .map_or(SyncState::Absent, |e| e.state)
    }

    /// pending_creates lists submissions the service has not confirmed yet
    pub fn pending_creates(&self) -> Vec<NewTransaction> {
        self.ledger()
            .pending
            .iter()
            .map(|(_, new)| new.clone())
            .collect()
    }

    /// has_pending reports whether any request is still waiting on the service
    pub fn has_pending(&self) -> bool {
        let ledger = self.ledger();
        !ledger.pending.is_empty() || ledger.entries.iter().any(|e| e.state.is_pending())
    }

    pub fn budget(&self) -> Option<Amount> {
        self.ledger().budget
    }

    pub fn snapshot(&self) -> Snapshot {
        let ledger = self.ledger();
        Snapshot {
            transactions: ledger.entries.iter().map(|e| e.transaction.clone()).collect(),
            budget: ledger.budget.map(|b| b.value()),
        }
    }

    /// load replaces the collection with what the service currently lists
    pub async fn load(&self) -> Result<(), StoreError> {
        let user = self.session.user();
        let fetched = self.call(self.service.list(user)).await.map_err(|err| {
            warn!(user = user.0, error = err.to_string(), "Unable to load transactions");
            StoreError::Fetch(err)
        })?;
        let count = fetched.len();
        self.ledger().entries = fetched
            .into_iter()
            .map(|transaction| Entry {
                transaction,
                state: SyncState::Present,
            })
            .collect();
        debug!(user = user.0, count, "Loaded transactions");
        Ok(())
    }

    /// add submits a new transaction and refreshes the collection to pick up its id
    pub async fn add(&self, draft: TransactionDraft) -> Result<TransactionId, StoreError> {
        let new = NewTransaction::try_from(draft)?;
        let mut state = SyncState::Absent.apply(SyncEvent::Submit)?;
        let ticket = {
            let mut ledger = self.ledger();
            ledger.next_ticket += 1;
            let ticket = ledger.next_ticket;
            ledger.pending.push((ticket, new.clone()));
            ticket
        };

        let user = self.session.user();
        let id = match self.call(self.service.create(user, &new)).await {
            Ok(id) => id,
            Err(err) => {
                self.ledger().settle_create(ticket);
                state = state.apply(SyncEvent::Rollback)?;
                warn!(
                    error = err.to_string(),
                    description = new.description.as_str(),
                    ?state,
                    "Service rejected transaction"
                );
                return Err(StoreError::Remote(err));
            }
        };

        let loaded = self.load().await;
        self.ledger().settle_create(ticket);
        if let Err(err) = loaded {
            warn!(id = id.0, "Transaction created but the refresh failed");
            return Err(err);
        }
        state = state.apply(SyncEvent::Confirm)?;
        debug!(id = id.0, ?state, "Added transaction");
        Ok(id)
    }

    /// update edits the label and amount; the kind never changes
    pub async fn update(
        &self,
        id: TransactionId,
        description: &str,
        amount: &str,
    ) -> Result<(), StoreError> {
        let _guard = self.lock(id).await;
        if self.ledger().entry(id).is_none() {
            return Err(StoreError::NotFound(id));
        }
        let category = validate_description(description)?;
        let amount = Amount::parse(amount)?;

        let previous = {
            let mut ledger = self.ledger();
            let entry = ledger.entry_mut(id).ok_or(StoreError::NotFound(id))?;
            let state = entry.state.apply(SyncEvent::Edit)?;
            let previous = entry.transaction.clone();
            entry.transaction = previous.edited(&category, amount);
            entry.state = state;
            previous
        };

        if let Err(err) = self.call(self.service.update(id, &category, amount)).await {
            warn!(id = id.0, error = err.to_string(), "Update rejected, rolling back");
            self.rollback_update(previous);
            return Err(StoreError::remote(err));
        }

        let user = self.session.user();
        match self.call(self.service.list(user)).await {
            Ok(fetched) => {
                self.confirm_update(id, fetched.into_iter().find(|t| t.id == id));
                debug!(id = id.0, "Updated transaction");
                Ok(())
            }
            Err(err) => {
                warn!(id = id.0, error = err.to_string(), "Unable to confirm update, rolling back");
                self.rollback_update(previous);
                Err(StoreError::Fetch(err))
            }
        }
    }

    /// remove deletes remotely first; the entry only leaves the collection once the service agrees
    pub async fn remove(&self, id: TransactionId) -> Result<(), StoreError> {
        let guard = self.lock(id).await;
        {
            let mut ledger = self.ledger();
            let entry = ledger.entry_mut(id).ok_or(StoreError::NotFound(id))?;
            entry.state = entry.state.apply(SyncEvent::Delete)?;
        }

        match self.call(self.service.delete(id)).await {
            Ok(()) => {
                {
                    let mut ledger = self.ledger();
                    if let Some(entry) = ledger.entry(id) {
                        let state = entry.state.apply(SyncEvent::Confirm).unwrap_or(SyncState::Absent);
                        debug!(id = id.0, ?state, "Removed transaction");
                    }
                    ledger.remove(id);
                }
                drop(guard);
                self.forget_lock(id);
                Ok(())
            }
            Err(err) => {
                warn!(id = id.0, error = err.to_string(), "Delete failed, restoring entry");
                if let Some(entry) = self.ledger().entry_mut(id) {
                    if entry.state == SyncState::PendingDelete {
                        entry.state = entry.state.apply(SyncEvent::Rollback)?;
                    }
                }
                Err(StoreError::remote(err))
            }
        }
    }

    /// set_budget validates and persists the monthly budget; no request is made
    pub fn set_budget(&self, value: &str) -> Result<Amount, StoreError> {
        let budget = Amount::parse(value)?;
        self.storage.set_budget(self.session.user(), budget)?;
        self.ledger().budget = Some(budget);
        debug!(budget = budget.to_string(), "Saved budget");
        Ok(budget)
    }

    fn rollback_update(&self, previous: Transaction) {
        let mut ledger = self.ledger();
        // a load in between already put the authoritative value in place
        if let Some(entry) = ledger.entry_mut(previous.id) {
            if entry.state == SyncState::PendingUpdate {
                entry.state = SyncState::Present;
                entry.transaction = previous;
            }
        }
    }

    fn confirm_update(&self, id: TransactionId, fetched: Option<Transaction>) {
        let mut ledger = self.ledger();
        match fetched {
            Some(transaction) => {
                if let Some(entry) = ledger.entry_mut(id) {
                    if entry.transaction != transaction {
                        debug!(id = id.0, "Service value differs from the edit, keeping the service's");
                    }
                    entry.transaction = transaction;
                    entry.state = SyncState::Present;
                }
            }
            None => {
                warn!(id = id.0, "Service no longer lists the transaction");
                ledger.remove(id);
            }
        }
    }

    async fn call<T>(
        &self,
        request: impl Future<Output = Result<T, ServiceError>>,
    ) -> Result<T, ServiceError> {
        match tokio::time::timeout(self.options.timeout, request).await {
            Ok(result) => result,
            Err(_) => Err(ServiceError::Timeout(self.options.timeout)),
        }
    }

    async fn lock(&self, id: TransactionId) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id)
            .or_default()
            .clone();
        lock.lock_owned().await
    }

    /// forget_lock drops the id's lock unless another operation still holds or awaits it
    fn forget_lock(&self, id: TransactionId) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if locks.get(&id).map_or(false, |lock| Arc::strong_count(lock) == 1) {
            locks.remove(&id);
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
