use crate::desk::event::EventRecord;
use crate::desk::transaction::{Direction, TransactionId, TransactionStatus};
use crate::desk::user::UserId;
use crate::desk::Decimal;

/// Top-level error type for the batch surface (event replay and export).
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("Event error: {0}")]
    Event(#[from] EventError),
    #[error("Desk error: {0}")]
    Desk(#[from] DeskError),
}

/// Errors during `EventRecord` -> `Command` conversion (hard errors).
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("Invalid event: {0}")]
    InvalidEvent(EventRecord),
}

/// Tagged result of every desk operation.
///
/// Nothing here is retried automatically. `InvalidStateTransition` means the
/// caller must re-fetch the transaction before trying again.
#[derive(Debug, thiserror::Error)]
pub enum DeskError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Identity {actor} is not an administrator")]
    Unauthorized { actor: UserId },

    #[error("Transaction {id} cannot {event} while {from}")]
    InvalidStateTransition {
        id: TransactionId,
        from: TransactionStatus,
        event: &'static str,
    },

    #[error("{direction} is currently disabled")]
    DirectionDisabled { direction: Direction },

    #[error("Storage error: {0}")]
    Storage(#[from] LedgerError),

    #[error("Transaction {id} not found")]
    TransactionNotFound { id: TransactionId },

    #[error("User {user} not found")]
    UserNotFound { user: UserId },

    #[error("User {user} is not verified")]
    UserNotVerified { user: UserId },

    #[error("Transaction {id} belongs to user {owner}, not {actor}")]
    NotOwner {
        id: TransactionId,
        owner: UserId,
        actor: UserId,
    },
}

/// Bad input. Recoverable: the caller may retry with corrected values.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Amount must be positive, got {amount}")]
    NonPositiveAmount { amount: Decimal },

    #[error("Amount {amount} is outside the allowed range [{min}, {max}]")]
    AmountOutOfRange {
        amount: Decimal,
        min: Decimal,
        max: Decimal,
    },

    #[error("No {direction} rate has been set")]
    RateUnavailable { direction: Direction },

    #[error("Pricing {amount} at {direction} rate {rate} exceeds the representable range")]
    QuoteOverflow {
        direction: Direction,
        amount: Decimal,
        rate: Decimal,
    },

    #[error("Proof {reference} is not an image")]
    ProofNotImage { reference: String },

    #[error("Proof {reference} is {size} bytes, the limit is {limit}")]
    ProofTooLarge {
        reference: String,
        size: u64,
        limit: u64,
    },

    #[error("Transaction {id} has no settlement proof from the administrator")]
    SettlementProofMissing { id: TransactionId },

    #[error("User {user} is already registered")]
    DuplicateUser { user: UserId },

    #[error("User {user} has been removed")]
    UserRemoved { user: UserId },
}

/// Failures of the ledger store.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Ledger lock poisoned")]
    Poisoned,

    #[error("Transaction {id} is {actual}, expected {expected}")]
    StatusMismatch {
        id: TransactionId,
        expected: TransactionStatus,
        actual: TransactionStatus,
    },

    #[error("Transaction {id} already carries a {slot} proof")]
    ProofSlotOccupied {
        id: TransactionId,
        slot: &'static str,
    },

    #[error("Transaction {id} not found")]
    MissingTransaction { id: TransactionId },

    #[error("User {user} not found")]
    MissingUser { user: UserId },
}

/// Notification delivery failure. Logged by the dispatcher, never propagated.
#[derive(Debug, thiserror::Error)]
#[error("Delivery to {recipient} failed: {reason}")]
pub struct DeliveryError {
    pub recipient: UserId,
    pub reason: String,
}
