use rust_decimal::RoundingStrategy;
use serde::Deserialize;

use crate::desk::config::AmountBand;
use crate::desk::error::{DeskError, ValidationError};
use crate::desk::settings::Settings;
use crate::desk::transaction::Direction;
use crate::desk::Decimal;

/// Which currency the raw quantity is expressed in.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Unit {
    /// Foreign currency units (lira)
    #[default]
    Foreign,
    /// Local currency units (toman)
    Local,
}

/// A priced request: how much foreign currency, for how much local currency, at what rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub amount: Decimal,
    pub total_price: Decimal,
    pub rate: Decimal,
}

impl std::fmt::Display for Quote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:.2} @ {} = {:.2}",
            self.amount, self.rate, self.total_price
        )
    }
}

/// Round a monetary total to 2 decimal places, half-up.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Price a request against one settings snapshot.
///
/// Checks run in order: positive amount, band, direction enabled, rate set.
/// Products or quotients that do not fit a `Decimal` are rejected, not wrapped.
pub fn quote(
    settings: &Settings,
    direction: Direction,
    raw_amount: Decimal,
    unit: Unit,
    band: &AmountBand,
) -> Result<Quote, DeskError> {
    if raw_amount <= Decimal::ZERO {
        return Err(ValidationError::NonPositiveAmount { amount: raw_amount }.into());
    }
    band.check(raw_amount)?;

    if !settings.is_enabled(direction) {
        return Err(DeskError::DirectionDisabled { direction });
    }

    let rate = settings.rate(direction);
    if rate <= Decimal::ZERO {
        return Err(ValidationError::RateUnavailable { direction }.into());
    }

    let overflow = || ValidationError::QuoteOverflow {
        direction,
        amount: raw_amount,
        rate,
    };
    let quote = match unit {
        Unit::Foreign => Quote {
            amount: raw_amount,
            total_price: round_money(raw_amount.checked_mul(rate).ok_or_else(overflow)?),
            rate,
        },
        Unit::Local => Quote {
            amount: raw_amount.checked_div(rate).ok_or_else(overflow)?,
            total_price: round_money(raw_amount),
            rate,
        },
    };

    log::trace!("[quote] {direction} {raw_amount} {unit:?} -> {quote}");
    Ok(quote)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn make_settings(buy: Decimal, sell: Decimal) -> Settings {
        let mut settings = Settings::default();
        settings.set_rate(Direction::Buy, buy);
        settings.set_rate(Direction::Sell, sell);
        settings
    }

    #[test]
    fn test_foreign_quantity_is_multiplied_by_rate() {
        let settings = make_settings(dec!(30), dec!(29));
        let q = quote(&settings, Direction::Buy, dec!(100), Unit::Foreign, &AmountBand::default()).unwrap();

        assert_eq!(q.amount, dec!(100));
        assert_eq!(q.total_price, dec!(3000.00));
        assert_eq!(q.rate, dec!(30));
    }

    #[test]
    fn test_sell_uses_sell_rate() {
        let settings = make_settings(dec!(30), dec!(29));
        let q = quote(&settings, Direction::Sell, dec!(100), Unit::Foreign, &AmountBand::default()).unwrap();
        assert_eq!(q.total_price, dec!(2900));
    }

    #[test]
    fn test_local_quantity_is_divided_by_rate() {
        let settings = make_settings(dec!(30), dec!(29));
        let q = quote(&settings, Direction::Buy, dec!(1000), Unit::Local, &AmountBand::default()).unwrap();

        assert_eq!(q.total_price, dec!(1000));
        // full precision internally
        assert_eq!(round_money(q.amount), dec!(33.33));
        assert!(q.amount > dec!(33.333));
    }

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_money(dec!(1.005)), dec!(1.01));
        assert_eq!(round_money(dec!(1.004)), dec!(1.00));
        assert_eq!(round_money(dec!(2.675)), dec!(2.68));
    }

    #[test]
    fn test_total_is_rounded_to_two_places() {
        let settings = make_settings(dec!(30.333), dec!(29));
        let q = quote(&settings, Direction::Buy, dec!(10.5), Unit::Foreign, &AmountBand::default()).unwrap();
        // 10.5 * 30.333 = 318.4965
        assert_eq!(q.total_price, dec!(318.50));
    }

    #[test]
    fn test_rejects_non_positive_amount() {
        let settings = make_settings(dec!(30), dec!(29));
        for amount in [dec!(0), dec!(-5)] {
            let err = quote(&settings, Direction::Buy, amount, Unit::Foreign, &AmountBand::default()).unwrap_err();
            assert!(matches!(
                err,
                DeskError::Validation(ValidationError::NonPositiveAmount { .. })
            ));
        }
    }

    #[test]
    fn test_band_boundaries() {
        let settings = make_settings(dec!(30), dec!(29));
        let band = AmountBand::new(dec!(10), dec!(1000));

        assert!(quote(&settings, Direction::Buy, dec!(10), Unit::Foreign, &band).is_ok());
        assert!(quote(&settings, Direction::Buy, dec!(1000), Unit::Foreign, &band).is_ok());

        let err = quote(&settings, Direction::Buy, dec!(9), Unit::Foreign, &band).unwrap_err();
        assert!(matches!(
            err,
            DeskError::Validation(ValidationError::AmountOutOfRange { .. })
        ));
        let err = quote(&settings, Direction::Buy, dec!(1001), Unit::Foreign, &band).unwrap_err();
        assert!(matches!(
            err,
            DeskError::Validation(ValidationError::AmountOutOfRange { .. })
        ));
    }

    #[test]
    fn test_disabled_direction() {
        let mut settings = make_settings(dec!(30), dec!(29));
        settings.toggle(Direction::Sell);

        let err = quote(&settings, Direction::Sell, dec!(100), Unit::Foreign, &AmountBand::default()).unwrap_err();
        assert!(matches!(
            err,
            DeskError::DirectionDisabled {
                direction: Direction::Sell
            }
        ));
        assert!(quote(&settings, Direction::Buy, dec!(100), Unit::Foreign, &AmountBand::default()).is_ok());
    }

    #[test]
    fn test_foreign_quote_overflow_is_rejected() {
        let settings = make_settings(Decimal::MAX, dec!(29));
        let err = quote(&settings, Direction::Buy, dec!(100), Unit::Foreign, &AmountBand::default()).unwrap_err();
        assert!(matches!(
            err,
            DeskError::Validation(ValidationError::QuoteOverflow {
                direction: Direction::Buy,
                ..
            })
        ));
    }

    #[test]
    fn test_local_quote_overflow_is_rejected() {
        let settings = make_settings(dec!(30), dec!(0.0000000000000000000000000001));
        let err = quote(&settings, Direction::Sell, dec!(100000), Unit::Local, &AmountBand::default()).unwrap_err();
        assert!(matches!(
            err,
            DeskError::Validation(ValidationError::QuoteOverflow {
                direction: Direction::Sell,
                ..
            })
        ));
    }

    #[test]
    fn test_unset_rate_is_rejected() {
        let settings = Settings::default();
        let err = quote(&settings, Direction::Buy, dec!(100), Unit::Local, &AmountBand::default()).unwrap_err();
        assert!(matches!(
            err,
            DeskError::Validation(ValidationError::RateUnavailable {
                direction: Direction::Buy
            })
        ));
    }
}
