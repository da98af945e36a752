//! Exchange desk module.
//!
//! This module contains the transaction lifecycle core including:
//! - `ExchangeDesk` - The facade the request-handling layer calls
//! - `Ledger` - Storage for users, settings and transactions
//! - `rate` - Quoting against the current buy and sell rates
//! - `state_machine` - Transition rules and their guards
//! - `AdminGate` - The privileged identity set
//! - `Dispatcher` - Best-effort notification fan-out

mod auth;
mod config;
mod error;
mod event;
mod exchange_desk;
mod ledger;
mod notify;
mod rate;
mod settings;
mod state_machine;
mod transaction;
mod user;

pub(crate) use rust_decimal::Decimal;

pub use auth::AdminGate;
pub use config::{AmountBand, DeskConfig, DEFAULT_MAX_PROOF_BYTES};
pub use error::{DeliveryError, DeskError, Error, EventError, LedgerError, ValidationError};
pub use event::{ActionType, Command, EventRecord};
pub use exchange_desk::ExchangeDesk;
pub use ledger::{InMemoryLedger, Ledger};
pub use notify::{Dispatcher, LogSink, Notification, NotificationKind, NotificationSink, Recipient, Subject};
pub use rate::{quote, round_money, Quote, Unit};
pub use settings::Settings;
pub use state_machine::{Actor, AdminAction};
pub use transaction::{
    Artifact, Direction, MediaKind, NewTransaction, Transaction, TransactionId, TransactionStatus,
    TransactionUpdate,
};
pub use user::{Country, Registration, User, UserId};
