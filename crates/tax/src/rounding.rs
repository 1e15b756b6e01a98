use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Round an exact minor-unit amount to a whole minor unit, half away from zero.
///
/// Amounts outside the `i64` range saturate.
pub fn round_to_minor(exact: Decimal) -> i64 {
    let rounded = exact.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    rounded.to_i64().unwrap_or(if rounded.is_sign_negative() { i64::MIN } else { i64::MAX })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounds_half_away_from_zero() {
        assert_eq!(round_to_minor(Decimal::new(25, 1)), 3);
        assert_eq!(round_to_minor(Decimal::new(-25, 1)), -3);
        assert_eq!(round_to_minor(Decimal::new(24999, 4)), 2);
        assert_eq!(round_to_minor(Decimal::new(824175, 4)), 82);
    }

    #[test]
    fn saturates_outside_i64() {
        assert_eq!(round_to_minor(Decimal::MAX), i64::MAX);
        assert_eq!(round_to_minor(Decimal::MIN), i64::MIN);
    }
}
