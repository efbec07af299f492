//! Validation utilities

use crate::ledger::TransactionDraft;
use crate::money::MAX_ABS_CENTS;
use crate::traits::*;
use crate::types::*;

/// Longest accepted closure note
pub const MAX_NOTES_LEN: usize = 500;

/// Validate that an amount in cents is positive and within
/// [`MAX_ABS_CENTS`]
pub fn validate_amount_cents(amount: i64) -> LedgerResult<()> {
    if amount <= 0 {
        Err(LedgerError::validation("amount", "amount must be positive"))
    } else if amount > MAX_ABS_CENTS {
        Err(LedgerError::validation("amount", "amount is out of range"))
    } else {
        Ok(())
    }
}

/// Validate that a transaction description is valid
pub fn validate_description(description: &str) -> LedgerResult<()> {
    let length = description.trim().chars().count();
    if length < 2 {
        return Err(LedgerError::validation(
            "description",
            "description must be at least 2 characters",
        ));
    }

    if length > 500 {
        return Err(LedgerError::validation(
            "description",
            "description cannot exceed 500 characters",
        ));
    }

    Ok(())
}

/// Trim notes, drop them when blank, and enforce `max_len`
pub fn normalize_notes(notes: Option<&str>, max_len: usize) -> LedgerResult<Option<String>> {
    let Some(trimmed) = notes.map(str::trim).filter(|n| !n.is_empty()) else {
        return Ok(None);
    };
    if trimmed.chars().count() > max_len {
        return Err(LedgerError::validation(
            "notes",
            format!("notes cannot exceed {max_len} characters"),
        ));
    }
    Ok(Some(trimmed.to_string()))
}

/// Validate and trim a category name
pub fn validate_category_name(name: &str) -> LedgerResult<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(
            "name",
            "category name cannot be empty",
        ));
    }

    if trimmed.chars().count() > 100 {
        return Err(LedgerError::validation(
            "name",
            "category name cannot exceed 100 characters",
        ));
    }

    Ok(trimmed.to_string())
}

/// Validate a `#rrggbb` color
pub fn validate_color(color: &str) -> LedgerResult<()> {
    let valid = color.len() == 7
        && color.starts_with('#')
        && color.chars().skip(1).all(|c| c.is_ascii_hexdigit());
    if valid {
        Ok(())
    } else {
        Err(LedgerError::validation(
            "color",
            format!("'{color}' is not a #rrggbb color"),
        ))
    }
}

/// Validate and trim a rule pattern
pub fn validate_rule_pattern(pattern: &str) -> LedgerResult<String> {
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::validation(
            "pattern",
            "rule pattern cannot be empty",
        ));
    }

    if trimmed.chars().count() > 100 {
        return Err(LedgerError::validation(
            "pattern",
            "rule pattern cannot exceed 100 characters",
        ));
    }

    Ok(trimmed.to_string())
}

/// Enhanced transaction validator with detailed checks
pub struct EnhancedTransactionValidator;

impl TransactionValidator for EnhancedTransactionValidator {
    fn validate_draft(&self, draft: &TransactionDraft) -> LedgerResult<()> {
        // Basic validation
        DefaultTransactionValidator.validate_draft(draft)?;

        if draft.description.chars().any(char::is_control) {
            return Err(LedgerError::validation(
                "description",
                "description cannot contain control characters",
            ));
        }

        if let Some(receipt) = &draft.receipt {
            if receipt.trim().is_empty() {
                return Err(LedgerError::validation(
                    "receipt",
                    "receipt reference cannot be blank",
                ));
            }
        }

        Ok(())
    }
}
