//! Core types and data structures for the treasury system

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::Role;
use crate::month::Month;

/// Direction of a money movement. Amounts are stored unsigned; the direction
/// carries the sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Money coming into the association's account
    Income,
    /// Money leaving the association's account
    Expense,
}

impl Direction {
    /// Apply this direction's sign to an unsigned amount
    pub fn signed(self, amount: i64) -> i64 {
        match self {
            Direction::Income => amount,
            Direction::Expense => -amount,
        }
    }
}

/// How a transaction's category was first decided
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMethod {
    /// Picked by the submitter, or left unresolved
    Manual,
    /// Deterministic substring rule
    HardRule,
    /// Suggested by the language-model oracle
    AiLlm,
    /// Reserved for an embedding-similarity oracle. The classifier never
    /// produces it; it exists so stored rows carrying it still load.
    AiVector,
}

impl ClassificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationMethod::Manual => "manual",
            ClassificationMethod::HardRule => "hard_rule",
            ClassificationMethod::AiLlm => "ai_llm",
            ClassificationMethod::AiVector => "ai_vector",
        }
    }
}

/// Whether a transaction's category has been confirmed by a human
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationStatus {
    /// No category could be decided
    Pending,
    /// A probabilistic tier proposed a category awaiting confirmation
    AiSuggested,
    /// Category is authoritative
    Validated,
}

impl ClassificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassificationStatus::Pending => "pending",
            ClassificationStatus::AiSuggested => "ai_suggested",
            ClassificationStatus::Validated => "validated",
        }
    }
}

/// A financial movement of one organization
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique identifier for the transaction
    pub id: Uuid,
    /// Owning organization
    pub organization_id: Uuid,
    /// Amount in cents, always positive
    pub amount: i64,
    /// Income or expense
    pub direction: Direction,
    /// Free-text bank label or description
    pub description: String,
    /// Date the movement occurred
    pub date: NaiveDate,
    /// Budget category, if one was decided
    pub category_id: Option<Uuid>,
    /// How the category was first decided
    pub classification_method: ClassificationMethod,
    /// Whether a human confirmed the category
    pub classification_status: ClassificationStatus,
    /// Opaque reference to a stored receipt
    pub receipt: Option<String>,
    /// Member who entered the transaction
    pub created_by: Uuid,
    /// When the transaction was recorded
    pub created_at: NaiveDateTime,
}

impl Transaction {
    /// Amount with the direction's sign applied
    pub fn signed_amount(&self) -> i64 {
        self.direction.signed(self.amount)
    }

    pub fn is_income(&self) -> bool {
        self.direction == Direction::Income
    }

    pub fn is_expense(&self) -> bool {
        self.direction == Direction::Expense
    }
}

/// Node of an organization's hierarchical chart of budget categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Display name, unique per organization ignoring case
    pub name: String,
    /// Display color, e.g. `#22c55e`
    pub color: String,
    /// Parent category, `None` for a root
    pub parent_id: Option<Uuid>,
    /// Ordering among siblings
    pub rank: i32,
    pub created_at: NaiveDateTime,
}

impl Category {
    /// Key used for case-insensitive name comparison and uniqueness
    pub fn name_key(&self) -> String {
        normalize_name(&self.name)
    }

    /// Whether `candidate` names this category, ignoring case and padding
    pub fn matches_name(&self, candidate: &str) -> bool {
        self.name_key() == normalize_name(candidate)
    }
}

/// Normalize a category name for comparison
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Deterministic substring rule mapping descriptions to a category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationRule {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Substring searched for in descriptions, ignoring case. Never empty.
    pub pattern: String,
    /// Category assigned when the pattern matches
    pub category_id: Uuid,
    /// Higher priorities are evaluated first
    pub priority: i32,
    pub created_at: NaiveDateTime,
}

impl ClassificationRule {
    /// Whether the rule's pattern occurs in `description`, ignoring case
    pub fn matches(&self, description: &str) -> bool {
        let pattern = self.pattern.trim().to_lowercase();
        !pattern.is_empty() && description.to_lowercase().contains(&pattern)
    }
}

/// Immutable monthly checkpoint of the reconciliation chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyClosure {
    pub id: Uuid,
    pub organization_id: Uuid,
    /// Month being closed
    pub month: Month,
    /// Balance reported by the bank, in cents
    pub bank_balance: i64,
    /// Balance derived from the chain and the month's transactions, in cents
    pub computed_balance: i64,
    /// `bank_balance - computed_balance`; zero means reconciled
    pub delta: i64,
    /// Whether this closure seeds the chain
    pub is_initial: bool,
    pub notes: Option<String>,
    /// Member who recorded the closure
    pub closed_by: Uuid,
    pub created_at: NaiveDateTime,
}

impl MonthlyClosure {
    pub fn is_reconciled(&self) -> bool {
        self.delta == 0
    }
}

/// Append-only record of a classification state change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub transaction_id: Uuid,
    /// Member who caused the change
    pub actor_id: Uuid,
    /// Status the transaction moved to
    pub new_status: ClassificationStatus,
    pub note: String,
    pub created_at: NaiveDateTime,
}

impl AuditLogEntry {
    pub fn new(
        organization_id: Uuid,
        transaction_id: Uuid,
        actor_id: Uuid,
        new_status: ClassificationStatus,
        note: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            organization_id,
            transaction_id,
            actor_id,
            new_status,
            note: note.into(),
            created_at: chrono::Utc::now().naive_utc(),
        }
    }
}

/// Coarse class of a [`LedgerError`], used by callers to pick the guidance
/// they render
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Forbidden,
    Internal,
}

/// Errors that can occur in the treasury system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },
    #[error("Month {0} is already closed")]
    MonthAlreadyClosed(Month),
    #[error("An initial balance is already declared for this organization")]
    InitialBalanceAlreadyDeclared,
    #[error("Transaction {0} is not awaiting validation")]
    NotAwaitingValidation(Uuid),
    #[error("A category named '{0}' already exists")]
    DuplicateCategory(String),
    #[error("No closure found for the month before {0}; declare the initial balance first")]
    NoStartingPoint(Month),
    #[error("Transaction not found: {0}")]
    TransactionNotFound(Uuid),
    #[error("Category not found: {0}")]
    CategoryNotFound(Uuid),
    #[error("Role '{actual}' is below the required role '{required}'")]
    Forbidden { required: Role, actual: Role },
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LedgerError {
    /// Shorthand for a validation failure on `field`
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        LedgerError::Validation {
            field,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LedgerError::Validation { .. } => ErrorKind::Validation,
            LedgerError::MonthAlreadyClosed(_)
            | LedgerError::InitialBalanceAlreadyDeclared
            | LedgerError::NotAwaitingValidation(_)
            | LedgerError::DuplicateCategory(_) => ErrorKind::Conflict,
            LedgerError::NoStartingPoint(_)
            | LedgerError::TransactionNotFound(_)
            | LedgerError::CategoryNotFound(_) => ErrorKind::NotFound,
            LedgerError::Forbidden { .. } => ErrorKind::Forbidden,
            LedgerError::Storage(_) | LedgerError::Configuration(_) => ErrorKind::Internal,
        }
    }

    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Message safe to show to an end user. Internal failures are not
    /// detailed.
    pub fn user_message(&self) -> String {
        match self.kind() {
            ErrorKind::Internal => {
                "A technical error occurred, please try again later".to_string()
            }
            _ => self.to_string(),
        }
    }
}

/// Result type for treasury operations
pub type LedgerResult<T> = Result<T, LedgerError>;
