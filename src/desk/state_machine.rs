//! Transaction lifecycle rules.
//!
//! ```text
//! Created -> AwaitingUserPayment -> PaymentReceived -> Confirmed
//!    \               \                  |   \
//!     +---------------+-----------------+----+--> Canceled      (owner or admin)
//!                                       +-------> Rejected      (admin)
//! ```
//!
//! [`plan`] is pure: it checks a requested event against a transaction
//! snapshot and returns the write to perform plus the notification to emit.
//! The desk commits the write with a compare-and-swap on `expected`, so a
//! plan made from a stale snapshot can never be applied.

use crate::desk::error::{DeskError, ValidationError};
use crate::desk::notify::{Notification, NotificationKind, Recipient};
use crate::desk::transaction::{Artifact, Transaction, TransactionStatus, TransactionUpdate};
use crate::desk::user::UserId;

/// Who is asking. `Admin` is only constructed after the admin gate has passed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(UserId),
    Admin(UserId),
}

impl Actor {
    pub fn id(self) -> UserId {
        match self {
            Actor::User(id) | Actor::Admin(id) => id,
        }
    }
}

/// Actions reserved for administrators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    InstructPayment,
    Approve,
    Reject,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    InstructPayment { destination: String },
    SubmitUserProof(Artifact),
    SubmitAdminProof(Artifact),
    Approve,
    Reject,
    Cancel,
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::InstructPayment { .. } => "instruct payment",
            Event::SubmitUserProof(_) => "submit user proof",
            Event::SubmitAdminProof(_) => "submit admin proof",
            Event::Approve => "approve",
            Event::Reject => "reject",
            Event::Cancel => "cancel",
        }
    }
}

/// Limits that come from configuration rather than the transaction itself.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    pub max_proof_bytes: u64,
    pub require_settlement_proof: bool,
}

/// A checked transition, ready to be committed.
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub expected: TransactionStatus,
    pub update: TransactionUpdate,
    pub notification: Notification,
}

pub fn plan(tx: &Transaction, actor: Actor, event: Event, policy: &Policy) -> Result<Transition, DeskError> {
    let owner = Recipient::User(tx.user_id());
    let name = event.name();

    let (update, recipient, kind) = match event {
        Event::InstructPayment { destination } => {
            require_admin(actor)?;
            require_status(tx, TransactionStatus::Created, name)?;
            (
                TransactionUpdate::status(TransactionStatus::AwaitingUserPayment),
                owner,
                NotificationKind::PaymentInstructions { destination },
            )
        }
        Event::SubmitUserProof(proof) => {
            require_owner(tx, actor)?;
            require_status(tx, TransactionStatus::AwaitingUserPayment, name)?;
            check_proof(&proof, policy)?;
            (
                TransactionUpdate {
                    status: TransactionStatus::PaymentReceived,
                    user_proof: Some(proof),
                    admin_proof: None,
                },
                Recipient::Admins,
                NotificationKind::UserProofSubmitted,
            )
        }
        Event::SubmitAdminProof(proof) => {
            require_admin(actor)?;
            require_status(tx, TransactionStatus::PaymentReceived, name)?;
            if tx.admin_proof().is_some() {
                return Err(invalid(tx, name));
            }
            check_proof(&proof, policy)?;
            (
                TransactionUpdate {
                    status: TransactionStatus::PaymentReceived,
                    user_proof: None,
                    admin_proof: Some(proof),
                },
                owner,
                NotificationKind::AdminProofSubmitted,
            )
        }
        Event::Approve => {
            require_admin(actor)?;
            require_status(tx, TransactionStatus::PaymentReceived, name)?;
            debug_assert!(tx.user_proof().is_some(), "payment received without user proof");
            if policy.require_settlement_proof && tx.admin_proof().is_none() {
                return Err(ValidationError::SettlementProofMissing { id: tx.id() }.into());
            }
            (
                TransactionUpdate::status(TransactionStatus::Confirmed),
                owner,
                NotificationKind::PaymentConfirmed,
            )
        }
        Event::Reject => {
            require_admin(actor)?;
            require_status(tx, TransactionStatus::PaymentReceived, name)?;
            (
                TransactionUpdate::status(TransactionStatus::Rejected),
                owner,
                NotificationKind::PaymentRejected,
            )
        }
        Event::Cancel => {
            let recipient = match actor {
                Actor::Admin(_) => owner,
                Actor::User(_) => {
                    require_owner(tx, actor)?;
                    Recipient::Admins
                }
            };
            if tx.status().is_terminal() {
                return Err(invalid(tx, name));
            }
            (
                TransactionUpdate::status(TransactionStatus::Canceled),
                recipient,
                NotificationKind::TransactionCanceled,
            )
        }
    };

    let mut snapshot = tx.clone();
    snapshot.apply(update.clone());

    Ok(Transition {
        expected: tx.status(),
        update,
        notification: Notification::about_transaction(recipient, kind, snapshot),
    })
}

fn require_admin(actor: Actor) -> Result<(), DeskError> {
    match actor {
        Actor::Admin(_) => Ok(()),
        Actor::User(id) => Err(DeskError::Unauthorized { actor: id }),
    }
}

fn require_owner(tx: &Transaction, actor: Actor) -> Result<(), DeskError> {
    if actor.id() == tx.user_id() {
        Ok(())
    } else {
        Err(DeskError::NotOwner {
            id: tx.id(),
            owner: tx.user_id(),
            actor: actor.id(),
        })
    }
}

fn require_status(tx: &Transaction, expected: TransactionStatus, event: &'static str) -> Result<(), DeskError> {
    if tx.status() == expected {
        Ok(())
    } else {
        Err(invalid(tx, event))
    }
}

fn check_proof(proof: &Artifact, policy: &Policy) -> Result<(), ValidationError> {
    if !proof.is_image() {
        return Err(ValidationError::ProofNotImage {
            reference: proof.reference().to_owned(),
        });
    }
    if proof.size() > policy.max_proof_bytes {
        return Err(ValidationError::ProofTooLarge {
            reference: proof.reference().to_owned(),
            size: proof.size(),
            limit: policy.max_proof_bytes,
        });
    }
    Ok(())
}

fn invalid(tx: &Transaction, event: &'static str) -> DeskError {
    DeskError::InvalidStateTransition {
        id: tx.id(),
        from: tx.status(),
        event,
    }
}
