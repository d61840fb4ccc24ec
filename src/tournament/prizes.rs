//! Prize payout calculation.

use super::models::Prize;
use rust_decimal::Decimal;

/// Payout owed for a prize given the tournament's total entry income.
///
/// A positive fixed amount takes precedence; otherwise the payout is the
/// prize's percentage of total income, computed in exact decimal arithmetic
/// so currency never drifts through floating point.
pub fn payout(prize: &Prize, total_income: Decimal) -> Decimal {
    if prize.amount > Decimal::ZERO {
        prize.amount
    } else {
        total_income * (prize.percentage / Decimal::ONE_HUNDRED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_fixed_amount_returned_unchanged() {
        let prize = Prize::fixed(1, "Champion", dec!(150.00));
        assert_eq!(payout(&prize, dec!(1000)), dec!(150.00));
    }

    #[test]
    fn test_percentage_of_income_is_exact() {
        let prize = Prize::percentage_of_income(1, "Champion", dec!(50));
        assert_eq!(payout(&prize, dec!(200)), dec!(100));
    }

    #[test]
    fn test_fractional_percentage_has_no_rounding_drift() {
        let prize = Prize::percentage_of_income(2, "Runner-up", dec!(12.5));
        assert_eq!(payout(&prize, dec!(333.36)), dec!(41.67));
    }

    #[test]
    fn test_amount_takes_precedence_over_percentage() {
        // Ill-formed prize carrying both values: the fixed amount wins.
        let mut prize = Prize::fixed(1, "Champion", dec!(75));
        prize.percentage = dec!(90);
        assert_eq!(payout(&prize, dec!(1000)), dec!(75));
    }

    #[test]
    fn test_zero_prize_pays_nothing() {
        let prize = Prize::fixed(3, "Third", dec!(0));
        assert_eq!(payout(&prize, dec!(500)), dec!(0));
    }

    #[test]
    fn test_percentage_of_zero_income() {
        let prize = Prize::percentage_of_income(1, "Champion", dec!(50));
        assert_eq!(payout(&prize, dec!(0)), dec!(0));
    }
}
