//! Conversions between euro amounts entered at the boundary and the integer
//! cents used everywhere else

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode, ToPrimitive};

use crate::types::{LedgerError, LedgerResult};

/// Largest magnitude accepted for any amount or balance, in cents
/// (ten trillion euros). Keeps every ledger sum well inside `i64`.
pub const MAX_ABS_CENTS: i64 = 1_000_000_000_000_000;

/// Convert a euro amount to cents, rounding half-up (ties away from zero)
///
/// ```rust
/// use asso_treasury::money::{euros_to_cents, parse_euros};
///
/// let euros = parse_euros("10.505").unwrap();
/// assert_eq!(euros_to_cents(&euros).unwrap(), 1051);
/// ```
pub fn euros_to_cents(euros: &BigDecimal) -> LedgerResult<i64> {
    bounded_cents(euros, "amount")
}

/// Same as [`euros_to_cents`] for a bank balance; errors name `bank_balance`
pub fn balance_to_cents(euros: &BigDecimal) -> LedgerResult<i64> {
    bounded_cents(euros, "bank_balance")
}

fn bounded_cents(euros: &BigDecimal, field: &'static str) -> LedgerResult<i64> {
    let cents = euros.with_scale_round(2, RoundingMode::HalfUp) * BigDecimal::from(100);
    cents
        .to_i64()
        .filter(|c| (-MAX_ABS_CENTS..=MAX_ABS_CENTS).contains(c))
        .ok_or_else(|| LedgerError::validation(field, "amount is out of range"))
}

/// Parse a decimal euro amount exactly. Accepts `,` as decimal separator.
pub fn parse_euros(input: &str) -> LedgerResult<BigDecimal> {
    let normalized = input.trim().replace(',', ".");
    if normalized.is_empty() {
        return Err(LedgerError::validation("amount", "amount is required"));
    }
    BigDecimal::from_str(&normalized)
        .map_err(|_| LedgerError::validation("amount", format!("'{input}' is not a number")))
}

/// Render cents as a plain decimal euro string, e.g. `-12.34`
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    format!("{sign}{}.{:02}", abs / 100, abs % 100)
}
