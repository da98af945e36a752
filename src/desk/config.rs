use crate::desk::auth::AdminGate;
use crate::desk::error::ValidationError;
use crate::desk::Decimal;

/// 5 MiB, the largest receipt photo the transport accepts.
pub const DEFAULT_MAX_PROOF_BYTES: u64 = 5 * 1024 * 1024;

/// Inclusive bounds on the raw quantity a user may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmountBand {
    min: Decimal,
    max: Decimal,
}

impl AmountBand {
    /// # Panics
    /// Panics if `min > max`.
    pub fn new(min: Decimal, max: Decimal) -> Self {
        assert!(min <= max, "amount band min ({min}) exceeds max ({max})");
        Self { min, max }
    }

    pub fn min(&self) -> Decimal {
        self.min
    }

    pub fn max(&self) -> Decimal {
        self.max
    }

    pub fn check(&self, amount: Decimal) -> Result<(), ValidationError> {
        if amount < self.min || amount > self.max {
            return Err(ValidationError::AmountOutOfRange {
                amount,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

impl Default for AmountBand {
    fn default() -> Self {
        Self {
            min: Decimal::TEN,
            max: Decimal::from(100_000),
        }
    }
}

/// Immutable desk configuration, built once at startup.
#[derive(Debug, Clone)]
pub struct DeskConfig {
    pub admins: AdminGate,
    pub amount_band: AmountBand,
    pub max_proof_bytes: u64,
    /// Whether approval needs the administrator's own settlement proof first
    pub require_settlement_proof: bool,
}

impl DeskConfig {
    pub fn new(admins: AdminGate) -> Self {
        Self {
            admins,
            amount_band: AmountBand::default(),
            max_proof_bytes: DEFAULT_MAX_PROOF_BYTES,
            require_settlement_proof: false,
        }
    }

    pub fn with_amount_band(mut self, band: AmountBand) -> Self {
        self.amount_band = band;
        self
    }

    pub fn with_max_proof_bytes(mut self, limit: u64) -> Self {
        self.max_proof_bytes = limit;
        self
    }

    pub fn with_settlement_proof_required(mut self, required: bool) -> Self {
        self.require_settlement_proof = required;
        self
    }
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self::new(AdminGate::default())
    }
}
