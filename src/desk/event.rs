use serde::Deserialize;

use crate::desk::error::EventError;
use crate::desk::rate::Unit;
use crate::desk::state_machine::AdminAction;
use crate::desk::transaction::{Artifact, Direction, MediaKind, TransactionId};
use crate::desk::user::{Country, UserId};
use crate::desk::Decimal;

/// Raw event as parsed from a replay script.
/// This is the unvalidated form that needs conversion to a `Command`.
#[derive(Debug, Deserialize, Clone)]
pub struct EventRecord {
    pub actor: UserId,
    pub action: ActionType,
    /// Transaction id, or user id for user administration actions
    pub subject: Option<i64>,
    pub direction: Option<Direction>,
    /// Requested quantity, or the new rate for `set_rate`
    pub amount: Option<Decimal>,
    pub unit: Option<Unit>,
    /// Artifact reference, or the bank destination for `set_bank`
    pub reference: Option<String>,
    pub media: Option<MediaKind>,
    pub size: Option<u64>,
    pub country: Option<Country>,
}

impl std::fmt::Display for EventRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (actor: {}", self.action, self.actor)?;
        if let Some(subject) = self.subject {
            write!(f, ", subject: {subject}")?;
        }
        if let Some(direction) = self.direction {
            write!(f, ", direction: {direction}")?;
        }
        if let Some(amount) = self.amount {
            write!(f, ", amount: {amount}")?;
        }
        if let Some(reference) = &self.reference {
            write!(f, ", reference: {reference}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    Request,
    Instruct,
    UserProof,
    AdminProof,
    Approve,
    Reject,
    Cancel,
    VerifyUser,
    RemoveUser,
    SetRate,
    Toggle,
    SetBank,
}

impl std::fmt::Display for ActionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ActionType::Request => "request",
            ActionType::Instruct => "instruct",
            ActionType::UserProof => "user_proof",
            ActionType::AdminProof => "admin_proof",
            ActionType::Approve => "approve",
            ActionType::Reject => "reject",
            ActionType::Cancel => "cancel",
            ActionType::VerifyUser => "verify_user",
            ActionType::RemoveUser => "remove_user",
            ActionType::SetRate => "set_rate",
            ActionType::Toggle => "toggle",
            ActionType::SetBank => "set_bank",
        };
        write!(f, "{name}")
    }
}

/// A validated event ready to run against the desk.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Request {
        user: UserId,
        direction: Direction,
        amount: Decimal,
        unit: Unit,
    },
    Advance {
        admin: UserId,
        tx: TransactionId,
        action: AdminAction,
    },
    UserProof {
        user: UserId,
        tx: TransactionId,
        proof: Artifact,
    },
    AdminProof {
        admin: UserId,
        tx: TransactionId,
        proof: Artifact,
    },
    Cancel {
        actor: UserId,
        tx: TransactionId,
    },
    VerifyUser {
        admin: UserId,
        user: UserId,
    },
    RemoveUser {
        admin: UserId,
        user: UserId,
    },
    SetRate {
        admin: UserId,
        direction: Direction,
        rate: Decimal,
    },
    Toggle {
        admin: UserId,
        direction: Direction,
    },
    SetBank {
        admin: UserId,
        country: Country,
        destination: String,
    },
}

impl TryFrom<EventRecord> for Command {
    type Error = EventError;

    fn try_from(record: EventRecord) -> Result<Self, Self::Error> {
        let actor = record.actor;
        let tx = record.subject.and_then(|s| TransactionId::try_from(s).ok());
        let proof = match (&record.reference, record.size) {
            (Some(reference), Some(size)) => Some(Artifact::new(
                reference.clone(),
                record.media.unwrap_or(MediaKind::Image),
                size,
            )),
            _ => None,
        };

        let command = match record.action {
            ActionType::Request => match (record.direction, record.amount) {
                (Some(direction), Some(amount)) => Some(Command::Request {
                    user: actor,
                    direction,
                    amount,
                    unit: record.unit.unwrap_or_default(),
                }),
                _ => None,
            },
            ActionType::Instruct => tx.map(|tx| Command::Advance {
                admin: actor,
                tx,
                action: AdminAction::InstructPayment,
            }),
            ActionType::Approve => tx.map(|tx| Command::Advance {
                admin: actor,
                tx,
                action: AdminAction::Approve,
            }),
            ActionType::Reject => tx.map(|tx| Command::Advance {
                admin: actor,
                tx,
                action: AdminAction::Reject,
            }),
            ActionType::UserProof => tx
                .zip(proof)
                .map(|(tx, proof)| Command::UserProof { user: actor, tx, proof }),
            ActionType::AdminProof => tx
                .zip(proof)
                .map(|(tx, proof)| Command::AdminProof { admin: actor, tx, proof }),
            ActionType::Cancel => tx.map(|tx| Command::Cancel { actor, tx }),
            ActionType::VerifyUser => record
                .subject
                .map(|user| Command::VerifyUser { admin: actor, user }),
            ActionType::RemoveUser => record
                .subject
                .map(|user| Command::RemoveUser { admin: actor, user }),
            ActionType::SetRate => record
                .direction
                .zip(record.amount)
                .map(|(direction, rate)| Command::SetRate {
                    admin: actor,
                    direction,
                    rate,
                }),
            ActionType::Toggle => record
                .direction
                .map(|direction| Command::Toggle { admin: actor, direction }),
            ActionType::SetBank => record
                .country
                .zip(record.reference.clone())
                .map(|(country, destination)| Command::SetBank {
                    admin: actor,
                    country,
                    destination,
                }),
        };

        command.ok_or(EventError::InvalidEvent(record))
    }
}
