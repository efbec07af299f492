//! Traits for storage abstraction and extensibility

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::ledger::TransactionDraft;
use crate::month::Month;
use crate::types::*;
use crate::utils::validation::{validate_amount_cents, validate_description};

/// Storage abstraction for the treasury system
///
/// Implementations back onto a relational store (or memory, see
/// [`crate::utils::MemoryStorage`]). Every read is scoped to one organization:
/// a row belonging to another organization is reported as absent. To-one
/// lookups return a single `Option`, never a list.
///
/// Implementations must enforce:
/// - one closure per `(organization_id, month)` and at most one initial
///   closure per organization, failing with
///   [`LedgerError::MonthAlreadyClosed`] /
///   [`LedgerError::InitialBalanceAlreadyDeclared`];
/// - one category per `(organization_id, lower(trim(name)))`, failing with
///   [`LedgerError::DuplicateCategory`];
/// - atomicity of [`TreasuryStorage::insert_transaction`] and
///   [`TreasuryStorage::mark_validated`] with their audit entries.
#[async_trait]
pub trait TreasuryStorage: Send + Sync {
    /// All categories of an organization, in no particular order
    async fn list_categories(&self, organization_id: Uuid) -> LedgerResult<Vec<Category>>;

    async fn get_category(
        &self,
        organization_id: Uuid,
        category_id: Uuid,
    ) -> LedgerResult<Option<Category>>;

    async fn insert_category(&self, category: &Category) -> LedgerResult<()>;

    /// Move a category under a new parent (or to the root)
    async fn update_category_parent(
        &self,
        organization_id: Uuid,
        category_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> LedgerResult<()>;

    /// All classification rules of an organization, in no particular order
    async fn list_rules(&self, organization_id: Uuid) -> LedgerResult<Vec<ClassificationRule>>;

    async fn insert_rule(&self, rule: &ClassificationRule) -> LedgerResult<()>;

    /// Persist a new transaction together with its creation audit entry
    async fn insert_transaction(
        &self,
        transaction: &Transaction,
        audit: &AuditLogEntry,
    ) -> LedgerResult<()>;

    async fn get_transaction(
        &self,
        organization_id: Uuid,
        transaction_id: Uuid,
    ) -> LedgerResult<Option<Transaction>>;

    /// Transactions dated in `[start, end)`; an absent bound is open
    async fn list_transactions(
        &self,
        organization_id: Uuid,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>>;

    /// Conditionally mark transactions as validated.
    ///
    /// Only rows of `organization_id` whose status is `ai_suggested` at write
    /// time are updated. For each updated row one audit entry is appended in
    /// the same atomic unit. Returns the appended entries, i.e. exactly the
    /// rows that changed.
    async fn mark_validated(
        &self,
        organization_id: Uuid,
        transaction_ids: &[Uuid],
        corrected_category: Option<Uuid>,
        actor_id: Uuid,
        note: &str,
    ) -> LedgerResult<Vec<AuditLogEntry>>;

    async fn find_closure(
        &self,
        organization_id: Uuid,
        month: Month,
    ) -> LedgerResult<Option<MonthlyClosure>>;

    async fn find_initial_closure(
        &self,
        organization_id: Uuid,
    ) -> LedgerResult<Option<MonthlyClosure>>;

    async fn insert_closure(&self, closure: &MonthlyClosure) -> LedgerResult<()>;

    /// All closures of an organization, oldest month first
    async fn list_closures(&self, organization_id: Uuid) -> LedgerResult<Vec<MonthlyClosure>>;

    /// Audit entries of an organization, optionally for one transaction,
    /// oldest first
    async fn list_audit_entries(
        &self,
        organization_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> LedgerResult<Vec<AuditLogEntry>>;
}

/// Failure of a categorization oracle call. Never surfaced past the
/// classifier.
#[derive(Debug, thiserror::Error)]
pub enum OracleError {
    #[error("oracle request failed: {0}")]
    Transport(String),
    #[error("oracle did not answer within {0:?}")]
    Timeout(Duration),
    #[error("oracle returned HTTP {status}: {message}")]
    Status { status: u16, message: String },
    #[error("malformed oracle response: {0}")]
    MalformedResponse(String),
}

/// External probabilistic text classifier
#[async_trait]
pub trait CategorizationOracle: Send + Sync {
    /// Pick one of `candidates` for a transaction, or `None`
    async fn suggest(
        &self,
        description: &str,
        amount: i64,
        candidates: &[String],
    ) -> Result<Option<String>, OracleError>;
}

#[async_trait]
impl<T: CategorizationOracle + ?Sized> CategorizationOracle for Arc<T> {
    async fn suggest(
        &self,
        description: &str,
        amount: i64,
        candidates: &[String],
    ) -> Result<Option<String>, OracleError> {
        (**self).suggest(description, amount, candidates).await
    }
}

/// Oracle for organizations without inference: never suggests anything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOracle;

#[async_trait]
impl CategorizationOracle for NoOracle {
    async fn suggest(
        &self,
        _description: &str,
        _amount: i64,
        _candidates: &[String],
    ) -> Result<Option<String>, OracleError> {
        Ok(None)
    }
}

/// Trait for implementing custom transaction validation rules
pub trait TransactionValidator: Send + Sync {
    /// Validate a draft before anything touches the store
    fn validate_draft(&self, draft: &TransactionDraft) -> LedgerResult<()>;
}

/// Default transaction validator: non-trivial description, positive amount
pub struct DefaultTransactionValidator;

impl TransactionValidator for DefaultTransactionValidator {
    fn validate_draft(&self, draft: &TransactionDraft) -> LedgerResult<()> {
        validate_description(&draft.description)?;
        validate_amount_cents(draft.amount)
    }
}
