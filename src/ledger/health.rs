//! Burn rate and runway

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::types::Transaction;

/// Months of expenses averaged into the burn rate
pub const BURN_WINDOW_MONTHS: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinancialHealth {
    /// Mean monthly expense over the recent window, in cents
    pub monthly_burn_rate: i64,
    /// All income minus all expenses, in cents
    pub current_balance: i64,
    /// Months the balance lasts at the current burn, one decimal.
    /// `None` when nothing is being spent.
    pub runway_months: Option<f64>,
}

impl FinancialHealth {
    pub fn compute(transactions: &[Transaction], today: NaiveDate) -> Self {
        let window_start = today
            .checked_sub_months(Months::new(BURN_WINDOW_MONTHS))
            .unwrap_or(NaiveDate::MIN);

        let recent_expense: i64 = transactions
            .iter()
            .filter(|t| t.is_expense() && t.date >= window_start)
            .fold(0i64, |total, t| total.saturating_add(t.amount));
        let current_balance = transactions
            .iter()
            .fold(0i64, |total, t| total.saturating_add(t.signed_amount()));

        let burn = recent_expense as f64 / f64::from(BURN_WINDOW_MONTHS);
        let runway_months =
            (burn > 0.0).then(|| (current_balance as f64 / burn * 10.0).round() / 10.0);

        Self {
            monthly_burn_rate: burn.round() as i64,
            current_balance,
            runway_months,
        }
    }

    /// Two months of runway or less
    pub fn is_critical(&self) -> bool {
        self.runway_months.is_some_and(|months| months <= 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn txn(amount: i64, direction: Direction, date: NaiveDate) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            organization_id: Uuid::nil(),
            amount,
            direction,
            description: "test".to_string(),
            date,
            category_id: None,
            classification_method: ClassificationMethod::Manual,
            classification_status: ClassificationStatus::Pending,
            receipt: None,
            created_by: Uuid::nil(),
            created_at: Utc::now().naive_utc(),
        }
    }

    fn day(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    #[test]
    fn test_burn_and_runway() {
        let today = day(6, 15);
        let transactions = vec![
            txn(100_000, Direction::Income, day(1, 10)),
            // Before the window: counts toward balance, not burn
            txn(10_000, Direction::Expense, day(3, 14)),
            txn(10_000, Direction::Expense, day(3, 15)),
            txn(20_000, Direction::Expense, day(5, 2)),
        ];

        let health = FinancialHealth::compute(&transactions, today);
        assert_eq!(health.monthly_burn_rate, 10_000);
        assert_eq!(health.current_balance, 60_000);
        assert_eq!(health.runway_months, Some(6.0));
        assert!(!health.is_critical());
    }

    #[test]
    fn test_runway_rounds_to_one_decimal() {
        let today = day(6, 15);
        let transactions = vec![
            txn(10_000, Direction::Income, day(6, 1)),
            txn(700, Direction::Expense, day(6, 2)),
        ];
        let health = FinancialHealth::compute(&transactions, today);
        assert_eq!(health.monthly_burn_rate, 233);
        // 9300 / (700 / 3) = 39.857...
        assert_eq!(health.runway_months, Some(39.9));
    }

    #[test]
    fn test_extreme_amounts_saturate() {
        let transactions = vec![
            txn(i64::MAX, Direction::Income, day(6, 1)),
            txn(i64::MAX, Direction::Income, day(6, 2)),
            txn(i64::MAX, Direction::Expense, day(6, 3)),
            txn(i64::MAX, Direction::Expense, day(6, 4)),
        ];
        let health = FinancialHealth::compute(&transactions, day(6, 15));
        // Income saturates at the top, then both expenses pull it down
        assert_eq!(health.current_balance, -i64::MAX);
        assert_eq!(health.runway_months, Some(-3.0));
    }

    #[test]
    fn test_no_spending_has_no_runway() {
        let income = [txn(500, Direction::Income, day(6, 1))];
        let health = FinancialHealth::compute(&income, day(6, 15));
        assert_eq!(health.monthly_burn_rate, 0);
        assert_eq!(health.runway_months, None);
        assert!(!health.is_critical());
    }
}
