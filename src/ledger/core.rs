//! Main treasury orchestrator that coordinates classification, validation,
//! categories and the reconciliation ledger

use std::sync::Arc;

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use uuid::Uuid;

use crate::access::{Actor, Role};
use crate::classification::{Classifier, ValidationService};
use crate::ledger::{
    CategoryManager, CategoryTree, FinancialHealth, NewCategory, NewRule, TransactionDraft,
    TransactionManager,
};
use crate::month::Month;
use crate::reconciliation::{
    BalancePreview, ClosureOutcome, ExpectedBalance, LedgerSummary, ReconciliationLedger,
};
use crate::settings::Settings;
use crate::traits::*;
use crate::types::*;

struct Inner<S: TreasuryStorage, O: CategorizationOracle> {
    storage: S,
    categories: CategoryManager<S>,
    transactions: TransactionManager<S, O>,
    validation: ValidationService<S>,
    reconciliation: ReconciliationLedger<S>,
}

/// Treasury of one deployment, serving every organization in its store.
///
/// Cheap to clone; clones share the same managers.
pub struct Treasury<S: TreasuryStorage, O: CategorizationOracle> {
    inner: Arc<Inner<S, O>>,
}

impl<S: TreasuryStorage, O: CategorizationOracle> Clone for Treasury<S, O> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: TreasuryStorage + Clone, O: CategorizationOracle> Treasury<S, O> {
    /// Create a treasury with default settings
    pub fn new(storage: S, oracle: O) -> Self {
        Self::with_settings(storage, oracle, &Settings::default())
    }

    pub fn with_settings(storage: S, oracle: O, settings: &Settings) -> Self {
        Self::with_validator(
            storage,
            oracle,
            settings,
            Arc::new(DefaultTransactionValidator),
        )
    }

    /// Create a treasury with a custom transaction validator
    pub fn with_validator(
        storage: S,
        oracle: O,
        settings: &Settings,
        validator: Arc<dyn TransactionValidator>,
    ) -> Self {
        let classifier = Classifier::new(oracle).with_timeout(settings.oracle_timeout());
        let inner = Inner {
            categories: CategoryManager::new(storage.clone()),
            transactions: TransactionManager::with_validator(
                storage.clone(),
                classifier,
                validator,
            ),
            validation: ValidationService::new(storage.clone()),
            reconciliation: ReconciliationLedger::new(storage.clone())
                .with_max_notes_len(settings.ledger.max_notes_len),
            storage,
        };
        Self {
            inner: Arc::new(inner),
        }
    }
}

#[cfg(feature = "http-oracle")]
impl<S: TreasuryStorage + Clone> Treasury<S, Arc<dyn CategorizationOracle>> {
    /// Build with the chat-completions oracle when an API key is configured,
    /// and without inference otherwise
    pub fn from_settings(storage: S, settings: &Settings) -> LedgerResult<Self> {
        let oracle: Arc<dyn CategorizationOracle> =
            match crate::classification::ChatCompletionOracle::from_settings(&settings.oracle)? {
                Some(oracle) => Arc::new(oracle),
                None => {
                    tracing::info!("no oracle API key configured; inference disabled");
                    Arc::new(NoOracle)
                }
            };
        Ok(Self::with_settings(storage, oracle, settings))
    }
}

impl<S: TreasuryStorage, O: CategorizationOracle> Treasury<S, O> {
    pub fn storage(&self) -> &S {
        &self.inner.storage
    }

    // Transaction operations
    pub async fn record_transaction(
        &self,
        actor: &Actor,
        draft: TransactionDraft,
    ) -> LedgerResult<Transaction> {
        self.inner.transactions.record_transaction(actor, draft).await
    }

    pub async fn get_transaction(
        &self,
        actor: &Actor,
        transaction_id: Uuid,
    ) -> LedgerResult<Transaction> {
        self.inner
            .transactions
            .get_transaction(actor, transaction_id)
            .await
    }

    /// Transactions dated in `[start, end)`
    pub async fn list_transactions(
        &self,
        actor: &Actor,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        self.inner
            .transactions
            .list_transactions(actor, start, end)
            .await
    }

    pub async fn audit_trail(
        &self,
        actor: &Actor,
        transaction_id: Uuid,
    ) -> LedgerResult<Vec<AuditLogEntry>> {
        self.inner
            .transactions
            .audit_trail(actor, transaction_id)
            .await
    }

    // Validation operations
    pub async fn validate(
        &self,
        actor: &Actor,
        transaction_id: Uuid,
        corrected_category: Option<Uuid>,
    ) -> LedgerResult<AuditLogEntry> {
        self.inner
            .validation
            .validate(actor, transaction_id, corrected_category)
            .await
    }

    pub async fn validate_batch(
        &self,
        actor: &Actor,
        transaction_ids: &[Uuid],
    ) -> LedgerResult<usize> {
        self.inner
            .validation
            .validate_batch(actor, transaction_ids)
            .await
    }

    // Category operations
    pub async fn create_category(
        &self,
        actor: &Actor,
        input: NewCategory,
    ) -> LedgerResult<Category> {
        self.inner.categories.create_category(actor, input).await
    }

    pub async fn reparent_category(
        &self,
        actor: &Actor,
        category_id: Uuid,
        new_parent: Option<Uuid>,
    ) -> LedgerResult<Category> {
        self.inner
            .categories
            .reparent_category(actor, category_id, new_parent)
            .await
    }

    pub async fn list_categories(&self, actor: &Actor) -> LedgerResult<Vec<Category>> {
        self.inner.categories.list_categories(actor).await
    }

    pub async fn create_rule(
        &self,
        actor: &Actor,
        input: NewRule,
    ) -> LedgerResult<ClassificationRule> {
        self.inner.categories.create_rule(actor, input).await
    }

    pub async fn list_rules(&self, actor: &Actor) -> LedgerResult<Vec<ClassificationRule>> {
        self.inner.categories.list_rules(actor).await
    }

    // Reconciliation operations
    pub async fn compute_expected_balance(
        &self,
        actor: &Actor,
        month: Month,
    ) -> LedgerResult<ExpectedBalance> {
        actor.require(Role::Treasurer)?;
        self.inner
            .reconciliation
            .compute_expected_balance(actor.organization_id, month)
            .await
    }

    pub async fn preview(&self, actor: &Actor, month: Month) -> LedgerResult<BalancePreview> {
        self.inner.reconciliation.preview(actor, month).await
    }

    pub async fn create_initial_closure(
        &self,
        actor: &Actor,
        month: Month,
        bank_balance: &BigDecimal,
        notes: Option<&str>,
    ) -> LedgerResult<MonthlyClosure> {
        self.inner
            .reconciliation
            .create_initial_closure(actor, month, bank_balance, notes)
            .await
    }

    pub async fn create_closure(
        &self,
        actor: &Actor,
        month: Month,
        bank_balance: &BigDecimal,
        notes: Option<&str>,
    ) -> LedgerResult<ClosureOutcome> {
        self.inner
            .reconciliation
            .create_closure(actor, month, bank_balance, notes)
            .await
    }

    pub async fn list_closures(&self, actor: &Actor) -> LedgerResult<Vec<MonthlyClosure>> {
        self.inner.reconciliation.list_closures(actor).await
    }

    pub async fn ledger_summary(&self, actor: &Actor) -> LedgerResult<LedgerSummary> {
        self.inner.reconciliation.summary(actor).await
    }

    // Reporting operations
    /// Category hierarchy with expense totals for transactions dated in
    /// `[start, end)`
    #[tracing::instrument(skip_all, fields(org = %actor.organization_id))]
    pub async fn budget_tree(
        &self,
        actor: &Actor,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> LedgerResult<CategoryTree> {
        actor.require(Role::Member)?;
        let org = actor.organization_id;
        let categories = self.inner.storage.list_categories(org).await?;
        let transactions = self.inner.storage.list_transactions(org, start, end).await?;
        Ok(CategoryTree::build(categories).with_totals(&transactions))
    }

    /// Burn rate, balance and runway as of `today`
    pub async fn financial_health(
        &self,
        actor: &Actor,
        today: NaiveDate,
    ) -> LedgerResult<FinancialHealth> {
        actor.require(Role::Member)?;
        let transactions = self
            .inner
            .storage
            .list_transactions(actor.organization_id, None, None)
            .await?;
        Ok(FinancialHealth::compute(&transactions, today))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::memory_storage::MemoryStorage;

    #[tokio::test]
    async fn test_treasury_basic_operations() {
        let treasury = Treasury::new(MemoryStorage::new(), NoOracle);
        let org = Uuid::new_v4();
        let treasurer = Actor::new(Uuid::new_v4(), org, Role::Treasurer);
        let member = Actor::new(Uuid::new_v4(), org, Role::Member);

        let food = treasury
            .create_category(&treasurer, NewCategory::named("Alimentation"))
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 4, 2).unwrap();
        let draft = TransactionDraft::builder("Courses Carrefour", date)
            .cents(4550)
            .category_hint("alimentation")
            .build()
            .unwrap();
        let txn = treasury.record_transaction(&member, draft).await.unwrap();
        assert_eq!(txn.category_id, Some(food.id));
        assert_eq!(txn.classification_method, ClassificationMethod::Manual);
        assert_eq!(txn.classification_status, ClassificationStatus::Validated);

        let tree = treasury.budget_tree(&member, None, None).await.unwrap();
        assert_eq!(tree.get(food.id).unwrap().direct_total, 4550);

        let health = treasury
            .financial_health(&member, NaiveDate::from_ymd_opt(2024, 5, 1).unwrap())
            .await
            .unwrap();
        assert_eq!(health.current_balance, -4550);
        assert_eq!(health.monthly_burn_rate, 1517);
    }

    #[tokio::test]
    async fn test_clones_share_state() {
        let treasury = Treasury::new(MemoryStorage::new(), NoOracle);
        let actor = Actor::new(Uuid::new_v4(), Uuid::new_v4(), Role::Treasurer);

        let handle = tokio::spawn({
            let treasury = treasury.clone();
            async move {
                treasury
                    .create_category(&actor, NewCategory::named("Communication"))
                    .await
            }
        });
        handle.await.unwrap().unwrap();

        assert_eq!(treasury.list_categories(&actor).await.unwrap().len(), 1);
    }

    #[cfg(feature = "http-oracle")]
    #[tokio::test]
    async fn test_from_settings_without_key_disables_inference() {
        let treasury = Treasury::from_settings(MemoryStorage::new(), &Settings::default()).unwrap();
        let org = Uuid::new_v4();
        let treasurer = Actor::new(Uuid::new_v4(), org, Role::Treasurer);
        treasury
            .create_category(&treasurer, NewCategory::named("Divers"))
            .await
            .unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let draft = TransactionDraft::builder("Virement inconnu", date)
            .cents(1000)
            .build()
            .unwrap();
        let txn = treasury.record_transaction(&treasurer, draft).await.unwrap();
        assert_eq!(txn.classification_status, ClassificationStatus::Pending);
    }
}
