use crate::desk::transaction::Direction;
use crate::desk::user::Country;
use crate::desk::Decimal;

/// Process-wide exchange settings, owned by the ledger.
///
/// Read as one cloned snapshot so rate fields are never torn.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    buy_rate: Decimal,
    sell_rate: Decimal,
    buy_enabled: bool,
    sell_enabled: bool,
    iran_destination: String,
    turkey_destination: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            buy_rate: Decimal::ZERO,
            sell_rate: Decimal::ZERO,
            buy_enabled: true,
            sell_enabled: true,
            iran_destination: String::new(),
            turkey_destination: String::new(),
        }
    }
}

impl Settings {
    /// Local currency per unit of foreign currency for the direction
    pub fn rate(&self, direction: Direction) -> Decimal {
        match direction {
            Direction::Buy => self.buy_rate,
            Direction::Sell => self.sell_rate,
        }
    }

    pub fn is_enabled(&self, direction: Direction) -> bool {
        match direction {
            Direction::Buy => self.buy_enabled,
            Direction::Sell => self.sell_enabled,
        }
    }

    pub fn bank_destination(&self, country: Country) -> &str {
        match country {
            Country::Iran => &self.iran_destination,
            Country::Turkey => &self.turkey_destination,
        }
    }

    /// Where the user sends money for a transaction in this direction.
    /// A buy is paid in local currency, a sell in foreign currency.
    ///
    /// The bot's earlier flow sent buyers to the Turkey account and sellers to
    /// the Iran account. That pairing is reversed on purpose so each direction
    /// lands in the account for the currency actually paid.
    pub fn payment_destination(&self, direction: Direction) -> &str {
        match direction {
            Direction::Buy => self.bank_destination(Country::Iran),
            Direction::Sell => self.bank_destination(Country::Turkey),
        }
    }

    pub(crate) fn set_rate(&mut self, direction: Direction, rate: Decimal) {
        match direction {
            Direction::Buy => self.buy_rate = rate,
            Direction::Sell => self.sell_rate = rate,
        }
    }

    /// Flip the enable flag, returning the new value
    pub(crate) fn toggle(&mut self, direction: Direction) -> bool {
        let flag = match direction {
            Direction::Buy => &mut self.buy_enabled,
            Direction::Sell => &mut self.sell_enabled,
        };
        *flag = !*flag;
        *flag
    }

    pub(crate) fn set_bank_destination(&mut self, country: Country, destination: String) {
        match country {
            Country::Iran => self.iran_destination = destination,
            Country::Turkey => self.turkey_destination = destination,
        }
    }
}
