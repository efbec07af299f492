//! Transaction recording and lookup

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use uuid::Uuid;

use crate::access::{Actor, Role};
use crate::classification::{ClassificationInput, Classifier};
use crate::money::euros_to_cents;
use crate::traits::*;
use crate::types::*;

/// A transaction as entered, before classification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDraft {
    pub description: String,
    /// Strictly positive, in cents
    pub amount: i64,
    pub direction: Direction,
    pub date: NaiveDate,
    /// Category name typed by the user, if any
    pub category_hint: Option<String>,
    pub receipt: Option<String>,
}

impl TransactionDraft {
    pub fn builder(description: impl Into<String>, date: NaiveDate) -> TransactionDraftBuilder {
        TransactionDraftBuilder {
            description: description.into(),
            date,
            amount: None,
            direction: Direction::Expense,
            category_hint: None,
            receipt: None,
        }
    }
}

#[derive(Debug, Clone)]
enum AmountInput {
    Cents(i64),
    Euros(BigDecimal),
}

/// Builder for [`TransactionDraft`]. Direction defaults to expense.
#[derive(Debug, Clone)]
pub struct TransactionDraftBuilder {
    description: String,
    date: NaiveDate,
    amount: Option<AmountInput>,
    direction: Direction,
    category_hint: Option<String>,
    receipt: Option<String>,
}

impl TransactionDraftBuilder {
    pub fn cents(mut self, amount: i64) -> Self {
        self.amount = Some(AmountInput::Cents(amount));
        self
    }

    /// Amount in euros, rounded half-up to the cent on build
    pub fn euros(mut self, amount: BigDecimal) -> Self {
        self.amount = Some(AmountInput::Euros(amount));
        self
    }

    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    pub fn income(self) -> Self {
        self.direction(Direction::Income)
    }

    pub fn expense(self) -> Self {
        self.direction(Direction::Expense)
    }

    pub fn category_hint(mut self, name: impl Into<String>) -> Self {
        self.category_hint = Some(name.into());
        self
    }

    pub fn receipt(mut self, reference: impl Into<String>) -> Self {
        self.receipt = Some(reference.into());
        self
    }

    pub fn build(self) -> LedgerResult<TransactionDraft> {
        let amount = match self.amount {
            Some(AmountInput::Cents(cents)) => cents,
            Some(AmountInput::Euros(euros)) => euros_to_cents(&euros)?,
            None => return Err(LedgerError::validation("amount", "amount is required")),
        };

        Ok(TransactionDraft {
            description: self.description,
            amount,
            direction: self.direction,
            date: self.date,
            category_hint: self.category_hint,
            receipt: self.receipt,
        })
    }
}

/// Records transactions: validate, classify, persist with the creation
/// audit entry
pub struct TransactionManager<S: TreasuryStorage, O: CategorizationOracle> {
    storage: S,
    classifier: Classifier<O>,
    validator: Arc<dyn TransactionValidator>,
}

impl<S: TreasuryStorage, O: CategorizationOracle> TransactionManager<S, O> {
    pub fn new(storage: S, classifier: Classifier<O>) -> Self {
        Self::with_validator(storage, classifier, Arc::new(DefaultTransactionValidator))
    }

    /// Create a transaction manager with a custom validator
    pub fn with_validator(
        storage: S,
        classifier: Classifier<O>,
        validator: Arc<dyn TransactionValidator>,
    ) -> Self {
        Self {
            storage,
            classifier,
            validator,
        }
    }

    /// Validate, classify and persist a new transaction.
    ///
    /// Validation happens before any store access. A store failure while
    /// loading categories or rules aborts the call.
    #[tracing::instrument(skip_all, fields(org = %actor.organization_id, date = %draft.date))]
    pub async fn record_transaction(
        &self,
        actor: &Actor,
        draft: TransactionDraft,
    ) -> LedgerResult<Transaction> {
        actor.require(Role::Member)?;
        self.validator.validate_draft(&draft)?;

        let org = actor.organization_id;
        let categories = self.storage.list_categories(org).await?;
        let rules = self.storage.list_rules(org).await?;

        let description = draft.description.trim().to_string();
        let input = ClassificationInput {
            description: &description,
            amount: draft.amount,
            category_hint: draft.category_hint.as_deref(),
        };
        let classification = self.classifier.classify(&input, &categories, &rules).await;

        let transaction = Transaction {
            id: Uuid::new_v4(),
            organization_id: org,
            amount: draft.amount,
            direction: draft.direction,
            description,
            date: draft.date,
            category_id: classification.category_id,
            classification_method: classification.method,
            classification_status: classification.status,
            receipt: draft
                .receipt
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            created_by: actor.user_id,
            created_at: Utc::now().naive_utc(),
        };

        let audit = AuditLogEntry::new(
            org,
            transaction.id,
            actor.user_id,
            transaction.classification_status,
            format!("Created ({})", transaction.classification_method.as_str()),
        );
        self.storage.insert_transaction(&transaction, &audit).await?;

        tracing::info!(
            transaction_id = %transaction.id,
            method = transaction.classification_method.as_str(),
            status = transaction.classification_status.as_str(),
            "transaction recorded"
        );
        Ok(transaction)
    }

    /// Get a transaction of the actor's organization
    pub async fn get_transaction(
        &self,
        actor: &Actor,
        transaction_id: Uuid,
    ) -> LedgerResult<Transaction> {
        actor.require(Role::Member)?;
        self.storage
            .get_transaction(actor.organization_id, transaction_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))
    }

    /// Transactions dated in `[start, end)`, oldest first
    pub async fn list_transactions(
        &self,
        actor: &Actor,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        actor.require(Role::Member)?;
        self.storage
            .list_transactions(actor.organization_id, start, end)
            .await
    }

    /// Status history of one transaction, oldest first
    pub async fn audit_trail(
        &self,
        actor: &Actor,
        transaction_id: Uuid,
    ) -> LedgerResult<Vec<AuditLogEntry>> {
        self.get_transaction(actor, transaction_id).await?;
        self.storage
            .list_audit_entries(actor.organization_id, Some(transaction_id))
            .await
    }
}
