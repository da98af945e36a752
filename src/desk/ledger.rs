use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::Utc;

use crate::desk::error::{LedgerError, ValidationError};
use crate::desk::settings::Settings;
use crate::desk::transaction::{NewTransaction, Transaction, TransactionId, TransactionStatus, TransactionUpdate};
use crate::desk::user::{User, UserId};

/// Storage interface for users, settings and transactions.
///
/// Every method is atomic per record. `compare_and_swap` is the only way a
/// transaction changes after it is created.
pub trait Ledger: Send + Sync {
    fn user(&self, id: UserId) -> Result<Option<User>, LedgerError>;

    /// Insert a new user. Fails if the identity is already taken.
    fn insert_user(&self, user: User) -> Result<Result<(), ValidationError>, LedgerError>;

    /// Read-modify-write one user under the lock.
    fn update_user(
        &self,
        id: UserId,
        change: &mut dyn FnMut(&mut User) -> Result<(), ValidationError>,
    ) -> Result<Result<User, ValidationError>, LedgerError>;

    /// Current settings, created with defaults on first read.
    fn settings(&self) -> Result<Settings, LedgerError>;

    fn update_settings(&self, change: &mut dyn FnMut(&mut Settings)) -> Result<Settings, LedgerError>;

    fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, LedgerError>;

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError>;

    /// Write `update` only if the stored status is still `expected` and any
    /// proof slot being filled is still empty.
    fn compare_and_swap(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        update: TransactionUpdate,
    ) -> Result<Transaction, LedgerError>;

    /// Status-only conditional update
    fn update_transaction_status(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        status: TransactionStatus,
    ) -> Result<Transaction, LedgerError> {
        self.compare_and_swap(id, expected, TransactionUpdate::status(status))
    }

    /// A user's transactions, most recent first.
    fn transactions_for_user(&self, id: UserId) -> Result<Vec<Transaction>, LedgerError>;

    /// Every transaction, most recent first.
    fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerError>;
}

#[derive(Debug, Default)]
struct Tables {
    users: HashMap<UserId, User>,
    settings: Option<Settings>,
    transactions: HashMap<TransactionId, Transaction>,
    next_id: TransactionId,
}

/// Ledger kept in process memory behind a single mutex.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    tables: Mutex<Tables>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        log::trace!("InMemoryLedger initialized");
        Self::default()
    }

    /// The guard is dropped at the end of each caller's scope, error paths included.
    fn lock(&self) -> Result<MutexGuard<'_, Tables>, LedgerError> {
        self.tables.lock().map_err(|_| LedgerError::Poisoned)
    }
}

fn most_recent_first(mut txs: Vec<Transaction>) -> Vec<Transaction> {
    txs.sort_by(|a, b| {
        b.created_at()
            .cmp(&a.created_at())
            .then_with(|| b.id().cmp(&a.id()))
    });
    txs
}

impl Ledger for InMemoryLedger {
    fn user(&self, id: UserId) -> Result<Option<User>, LedgerError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn insert_user(&self, user: User) -> Result<Result<(), ValidationError>, LedgerError> {
        let mut tables = self.lock()?;
        if tables.users.contains_key(&user.id()) {
            return Ok(Err(ValidationError::DuplicateUser { user: user.id() }));
        }
        log::debug!("[ledger] inserted user {}", user.id());
        tables.users.insert(user.id(), user);
        Ok(Ok(()))
    }

    fn update_user(
        &self,
        id: UserId,
        change: &mut dyn FnMut(&mut User) -> Result<(), ValidationError>,
    ) -> Result<Result<User, ValidationError>, LedgerError> {
        let mut tables = self.lock()?;
        let stored = tables
            .users
            .get_mut(&id)
            .ok_or(LedgerError::MissingUser { user: id })?;

        // work on a copy so a failed change leaves the record untouched
        let mut user = stored.clone();
        if let Err(e) = change(&mut user) {
            return Ok(Err(e));
        }
        *stored = user.clone();
        Ok(Ok(user))
    }

    fn settings(&self) -> Result<Settings, LedgerError> {
        let mut tables = self.lock()?;
        let settings = tables.settings.get_or_insert_with(|| {
            log::debug!("[ledger] created default settings");
            Settings::default()
        });
        Ok(settings.clone())
    }

    fn update_settings(&self, change: &mut dyn FnMut(&mut Settings)) -> Result<Settings, LedgerError> {
        let mut tables = self.lock()?;
        let settings = tables.settings.get_or_insert_with(Settings::default);
        change(settings);
        Ok(settings.clone())
    }

    fn create_transaction(&self, new: NewTransaction) -> Result<Transaction, LedgerError> {
        let mut tables = self.lock()?;
        tables.next_id += 1;
        let id = tables.next_id;
        let tx = Transaction::open(id, new, Utc::now());
        tables.transactions.insert(id, tx.clone());
        log::debug!("[ledger] created {tx}");
        Ok(tx)
    }

    fn transaction(&self, id: TransactionId) -> Result<Option<Transaction>, LedgerError> {
        Ok(self.lock()?.transactions.get(&id).cloned())
    }

    fn compare_and_swap(
        &self,
        id: TransactionId,
        expected: TransactionStatus,
        update: TransactionUpdate,
    ) -> Result<Transaction, LedgerError> {
        let mut tables = self.lock()?;
        let tx = tables
            .transactions
            .get_mut(&id)
            .ok_or(LedgerError::MissingTransaction { id })?;

        if tx.status() != expected {
            return Err(LedgerError::StatusMismatch {
                id,
                expected,
                actual: tx.status(),
            });
        }
        if update.user_proof.is_some() && tx.user_proof().is_some() {
            return Err(LedgerError::ProofSlotOccupied { id, slot: "user" });
        }
        if update.admin_proof.is_some() && tx.admin_proof().is_some() {
            return Err(LedgerError::ProofSlotOccupied { id, slot: "admin" });
        }

        let to = update.status;
        tx.apply(update);
        log::debug!("[ledger] tx={id} {expected} -> {to}");
        Ok(tx.clone())
    }

    fn transactions_for_user(&self, id: UserId) -> Result<Vec<Transaction>, LedgerError> {
        let tables = self.lock()?;
        let txs = tables
            .transactions
            .values()
            .filter(|tx| tx.user_id() == id)
            .cloned()
            .collect();
        Ok(most_recent_first(txs))
    }

    fn all_transactions(&self) -> Result<Vec<Transaction>, LedgerError> {
        let tables = self.lock()?;
        Ok(most_recent_first(tables.transactions.values().cloned().collect()))
    }
}
