mod artifact;

pub use artifact::{Artifact, MediaKind};

use super::Decimal;
use crate::desk::user::UserId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};

pub type TransactionId = u64;

/// Serialize Decimal with exactly 2 decimal places
fn serialize_decimal_2dp<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format!("{value:.2}"))
}

/// Whether the user buys or sells the foreign currency.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Buy => write!(f, "buy"),
            Direction::Sell => write!(f, "sell"),
        }
    }
}

/// Lifecycle state of a transaction.
///
/// `Confirmed`, `Canceled` and `Rejected` are terminal.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Created,
    AwaitingUserPayment,
    PaymentReceived,
    Confirmed,
    Canceled,
    Rejected,
}

impl TransactionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            TransactionStatus::Confirmed | TransactionStatus::Canceled | TransactionStatus::Rejected
        )
    }
}

impl std::fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransactionStatus::Created => write!(f, "created"),
            TransactionStatus::AwaitingUserPayment => write!(f, "awaiting_user_payment"),
            TransactionStatus::PaymentReceived => write!(f, "payment_received"),
            TransactionStatus::Confirmed => write!(f, "confirmed"),
            TransactionStatus::Canceled => write!(f, "canceled"),
            TransactionStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A priced exchange request as stored in the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    id: TransactionId,
    user_id: UserId,
    direction: Direction,
    amount: Decimal,
    total_price: Decimal,
    rate: Decimal,
    status: TransactionStatus,
    user_proof: Option<Artifact>,
    admin_proof: Option<Artifact>,
    created_at: DateTime<Utc>,
}

impl Transaction {
    pub fn open(id: TransactionId, new: NewTransaction, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            direction: new.direction,
            amount: new.amount,
            total_price: new.total_price,
            rate: new.rate,
            status: TransactionStatus::Created,
            user_proof: None,
            admin_proof: None,
            created_at,
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the owning user
    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Foreign currency quantity, full precision
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    /// Local currency total, fixed at creation
    pub fn total_price(&self) -> Decimal {
        self.total_price
    }

    /// The rate the transaction was priced at
    pub fn rate(&self) -> Decimal {
        self.rate
    }

    pub fn status(&self) -> TransactionStatus {
        self.status
    }

    pub fn user_proof(&self) -> Option<&Artifact> {
        self.user_proof.as_ref()
    }

    pub fn admin_proof(&self) -> Option<&Artifact> {
        self.admin_proof.as_ref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Apply an update unconditionally. Ledgers call this only after their
    /// compare-and-swap guard has passed.
    pub fn apply(&mut self, update: TransactionUpdate) {
        self.status = update.status;
        if let Some(proof) = update.user_proof {
            self.user_proof = Some(proof);
        }
        if let Some(proof) = update.admin_proof {
            self.admin_proof = Some(proof);
        }
    }
}

impl std::fmt::Display for Transaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}] tx={} user={} amount={:.2} total={:.2} status={}",
            self.direction, self.id, self.user_id, self.amount, self.total_price, self.status
        )
    }
}

/// Everything needed to open a transaction; the id and timestamp come from the ledger.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub user_id: UserId,
    pub direction: Direction,
    pub amount: Decimal,
    pub total_price: Decimal,
    pub rate: Decimal,
}

/// The write half of a transition: the new status plus any proof being attached.
#[derive(Debug, Clone, PartialEq)]
pub struct TransactionUpdate {
    pub status: TransactionStatus,
    pub user_proof: Option<Artifact>,
    pub admin_proof: Option<Artifact>,
}

impl TransactionUpdate {
    pub fn status(status: TransactionStatus) -> Self {
        Self {
            status,
            user_proof: None,
            admin_proof: None,
        }
    }
}

/// Flat row used to export the ledger as CSV.
#[derive(Debug, Serialize)]
pub struct TransactionRow {
    id: TransactionId,
    user: UserId,
    direction: Direction,
    #[serde(serialize_with = "serialize_decimal_2dp")]
    amount: Decimal,
    #[serde(serialize_with = "serialize_decimal_2dp")]
    total_price: Decimal,
    rate: Decimal,
    status: TransactionStatus,
    user_proof: Option<String>,
    admin_proof: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<&Transaction> for TransactionRow {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            user: tx.user_id,
            direction: tx.direction,
            amount: tx.amount,
            total_price: tx.total_price,
            rate: tx.rate,
            status: tx.status,
            user_proof: tx.user_proof.as_ref().map(|p| p.reference().to_owned()),
            admin_proof: tx.admin_proof.as_ref().map(|p| p.reference().to_owned()),
            created_at: tx.created_at,
        }
    }
}
