//! In-memory storage implementation for testing

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::month::Month;
use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct Tables {
    categories: HashMap<Uuid, Category>,
    rules: HashMap<Uuid, ClassificationRule>,
    transactions: HashMap<Uuid, Transaction>,
    closures: BTreeMap<(Uuid, Month), MonthlyClosure>,
    audit_log: Vec<AuditLogEntry>,
}

/// In-memory storage implementation for testing and development
///
/// All tables live behind one lock, so every trait call is atomic and the
/// uniqueness guards behave like database constraints under concurrency.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    tables: Arc<RwLock<Tables>>,
    unavailable: Arc<AtomicBool>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all data (useful for testing)
    pub fn clear(&self) -> LedgerResult<()> {
        *self.write()? = Tables::default();
        Ok(())
    }

    /// Make every subsequent call fail as if the database were unreachable
    /// (useful for testing)
    pub fn simulate_outage(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> LedgerResult<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            Err(LedgerError::Storage("database unreachable".to_string()))
        } else {
            Ok(())
        }
    }

    fn read(&self) -> LedgerResult<RwLockReadGuard<'_, Tables>> {
        self.check_available()?;
        self.tables
            .read()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }

    fn write(&self) -> LedgerResult<RwLockWriteGuard<'_, Tables>> {
        self.check_available()?;
        self.tables
            .write()
            .map_err(|_| LedgerError::Storage("memory storage lock poisoned".to_string()))
    }
}

fn in_range(date: NaiveDate, start: Option<NaiveDate>, end: Option<NaiveDate>) -> bool {
    start.is_none_or(|s| date >= s) && end.is_none_or(|e| date < e)
}

#[async_trait]
impl TreasuryStorage for MemoryStorage {
    async fn list_categories(&self, organization_id: Uuid) -> LedgerResult<Vec<Category>> {
        Ok(self
            .read()?
            .categories
            .values()
            .filter(|c| c.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn get_category(
        &self,
        organization_id: Uuid,
        category_id: Uuid,
    ) -> LedgerResult<Option<Category>> {
        Ok(self
            .read()?
            .categories
            .get(&category_id)
            .filter(|c| c.organization_id == organization_id)
            .cloned())
    }

    async fn insert_category(&self, category: &Category) -> LedgerResult<()> {
        let mut tables = self.write()?;
        let key = category.name_key();
        let duplicate = tables
            .categories
            .values()
            .any(|c| c.organization_id == category.organization_id && c.name_key() == key);
        if duplicate {
            return Err(LedgerError::DuplicateCategory(category.name.clone()));
        }
        tables.categories.insert(category.id, category.clone());
        Ok(())
    }

    async fn update_category_parent(
        &self,
        organization_id: Uuid,
        category_id: Uuid,
        parent_id: Option<Uuid>,
    ) -> LedgerResult<()> {
        let mut tables = self.write()?;
        match tables
            .categories
            .get_mut(&category_id)
            .filter(|c| c.organization_id == organization_id)
        {
            Some(category) => {
                category.parent_id = parent_id;
                Ok(())
            }
            None => Err(LedgerError::CategoryNotFound(category_id)),
        }
    }

    async fn list_rules(&self, organization_id: Uuid) -> LedgerResult<Vec<ClassificationRule>> {
        Ok(self
            .read()?
            .rules
            .values()
            .filter(|r| r.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn insert_rule(&self, rule: &ClassificationRule) -> LedgerResult<()> {
        self.write()?.rules.insert(rule.id, rule.clone());
        Ok(())
    }

    async fn insert_transaction(
        &self,
        transaction: &Transaction,
        audit: &AuditLogEntry,
    ) -> LedgerResult<()> {
        let mut tables = self.write()?;
        if tables.transactions.contains_key(&transaction.id) {
            return Err(LedgerError::Storage(format!(
                "duplicate transaction id {}",
                transaction.id
            )));
        }
        tables
            .transactions
            .insert(transaction.id, transaction.clone());
        tables.audit_log.push(audit.clone());
        Ok(())
    }

    async fn get_transaction(
        &self,
        organization_id: Uuid,
        transaction_id: Uuid,
    ) -> LedgerResult<Option<Transaction>> {
        Ok(self
            .read()?
            .transactions
            .get(&transaction_id)
            .filter(|t| t.organization_id == organization_id)
            .cloned())
    }

    async fn list_transactions(
        &self,
        organization_id: Uuid,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> LedgerResult<Vec<Transaction>> {
        let tables = self.read()?;
        let mut filtered: Vec<Transaction> = tables
            .transactions
            .values()
            .filter(|t| t.organization_id == organization_id && in_range(t.date, start, end))
            .cloned()
            .collect();
        filtered.sort_by(|a, b| a.date.cmp(&b.date).then(a.created_at.cmp(&b.created_at)));
        Ok(filtered)
    }

    async fn mark_validated(
        &self,
        organization_id: Uuid,
        transaction_ids: &[Uuid],
        corrected_category: Option<Uuid>,
        actor_id: Uuid,
        note: &str,
    ) -> LedgerResult<Vec<AuditLogEntry>> {
        let mut tables = self.write()?;
        let mut appended = Vec::new();

        for id in transaction_ids {
            let Some(transaction) = tables.transactions.get_mut(id) else {
                continue;
            };
            if transaction.organization_id != organization_id
                || transaction.classification_status != ClassificationStatus::AiSuggested
            {
                continue;
            }
            transaction.classification_status = ClassificationStatus::Validated;
            if let Some(category_id) = corrected_category {
                transaction.category_id = Some(category_id);
            }
            appended.push(AuditLogEntry::new(
                organization_id,
                *id,
                actor_id,
                ClassificationStatus::Validated,
                note,
            ));
        }

        tables.audit_log.extend(appended.iter().cloned());
        Ok(appended)
    }

    async fn find_closure(
        &self,
        organization_id: Uuid,
        month: Month,
    ) -> LedgerResult<Option<MonthlyClosure>> {
        Ok(self
            .read()?
            .closures
            .get(&(organization_id, month))
            .cloned())
    }

    async fn find_initial_closure(
        &self,
        organization_id: Uuid,
    ) -> LedgerResult<Option<MonthlyClosure>> {
        Ok(self
            .read()?
            .closures
            .values()
            .find(|c| c.organization_id == organization_id && c.is_initial)
            .cloned())
    }

    async fn insert_closure(&self, closure: &MonthlyClosure) -> LedgerResult<()> {
        let mut tables = self.write()?;
        let key = (closure.organization_id, closure.month);
        if tables.closures.contains_key(&key) {
            return Err(LedgerError::MonthAlreadyClosed(closure.month));
        }
        if closure.is_initial
            && tables
                .closures
                .values()
                .any(|c| c.organization_id == closure.organization_id && c.is_initial)
        {
            return Err(LedgerError::InitialBalanceAlreadyDeclared);
        }
        tables.closures.insert(key, closure.clone());
        Ok(())
    }

    async fn list_closures(&self, organization_id: Uuid) -> LedgerResult<Vec<MonthlyClosure>> {
        // BTreeMap keys order by (organization, month)
        Ok(self
            .read()?
            .closures
            .values()
            .filter(|c| c.organization_id == organization_id)
            .cloned()
            .collect())
    }

    async fn list_audit_entries(
        &self,
        organization_id: Uuid,
        transaction_id: Option<Uuid>,
    ) -> LedgerResult<Vec<AuditLogEntry>> {
        Ok(self
            .read()?
            .audit_log
            .iter()
            .filter(|e| {
                e.organization_id == organization_id
                    && transaction_id.is_none_or(|id| e.transaction_id == id)
            })
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn category(org: Uuid, name: &str) -> Category {
        Category {
            id: Uuid::new_v4(),
            organization_id: org,
            name: name.to_string(),
            color: "#94a3b8".to_string(),
            parent_id: None,
            rank: 0,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn closure(org: Uuid, month: Month, is_initial: bool) -> MonthlyClosure {
        MonthlyClosure {
            id: Uuid::new_v4(),
            organization_id: org,
            month,
            bank_balance: 10000,
            computed_balance: 10000,
            delta: 0,
            is_initial,
            notes: None,
            closed_by: Uuid::new_v4(),
            created_at: Utc::now().naive_utc(),
        }
    }

    fn suggested(org: Uuid) -> Transaction {
        Transaction {
            id: Uuid::new_v4(),
            organization_id: org,
            amount: 1200,
            direction: Direction::Expense,
            description: "Boulangerie".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            category_id: None,
            classification_method: ClassificationMethod::AiLlm,
            classification_status: ClassificationStatus::AiSuggested,
            receipt: None,
            created_by: Uuid::new_v4(),
            created_at: Utc::now().naive_utc(),
        }
    }

    #[tokio::test]
    async fn test_category_names_unique_ignoring_case() {
        let storage = MemoryStorage::new();
        let org = Uuid::new_v4();

        storage.insert_category(&category(org, "Transport")).await.unwrap();
        let err = storage
            .insert_category(&category(org, " transport "))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateCategory(_)));

        // Other organizations are unaffected
        storage
            .insert_category(&category(Uuid::new_v4(), "Transport"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_closure_uniqueness_guards() {
        let storage = MemoryStorage::new();
        let org = Uuid::new_v4();
        let march = Month::from_ymd(2024, 3).unwrap();

        storage.insert_closure(&closure(org, march, true)).await.unwrap();

        let err = storage
            .insert_closure(&closure(org, march, false))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::MonthAlreadyClosed(m) if m == march));

        let err = storage
            .insert_closure(&closure(org, march.next().unwrap(), true))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::InitialBalanceAlreadyDeclared));
    }

    #[tokio::test]
    async fn test_mark_validated_is_conditional() {
        let storage = MemoryStorage::new();
        let org = Uuid::new_v4();
        let txn = suggested(org);
        let audit = AuditLogEntry::new(
            org,
            txn.id,
            txn.created_by,
            ClassificationStatus::AiSuggested,
            "created",
        );
        storage.insert_transaction(&txn, &audit).await.unwrap();

        let first = storage
            .mark_validated(org, &[txn.id], None, Uuid::new_v4(), "ok")
            .await
            .unwrap();
        assert_eq!(first.len(), 1);

        let second = storage
            .mark_validated(org, &[txn.id], None, Uuid::new_v4(), "ok")
            .await
            .unwrap();
        assert!(second.is_empty());

        let entries = storage.list_audit_entries(org, Some(txn.id)).await.unwrap();
        assert_eq!(entries.len(), 2);
    }

    #[tokio::test]
    async fn test_reads_are_scoped_to_organization() {
        let storage = MemoryStorage::new();
        let org = Uuid::new_v4();
        let txn = suggested(org);
        let audit = AuditLogEntry::new(org, txn.id, txn.created_by, txn.classification_status, "");
        storage.insert_transaction(&txn, &audit).await.unwrap();

        assert!(storage.get_transaction(org, txn.id).await.unwrap().is_some());
        assert!(storage
            .get_transaction(Uuid::new_v4(), txn.id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_transaction_range_is_half_open() {
        let storage = MemoryStorage::new();
        let org = Uuid::new_v4();
        for day in [(2, 29), (3, 1), (3, 31), (4, 1)] {
            let mut txn = suggested(org);
            txn.date = NaiveDate::from_ymd_opt(2024, day.0, day.1).unwrap();
            let audit =
                AuditLogEntry::new(org, txn.id, txn.created_by, txn.classification_status, "");
            storage.insert_transaction(&txn, &audit).await.unwrap();
        }

        let march = storage
            .list_transactions(
                org,
                NaiveDate::from_ymd_opt(2024, 3, 1),
                NaiveDate::from_ymd_opt(2024, 4, 1),
            )
            .await
            .unwrap();
        assert_eq!(march.len(), 2);
    }

    #[tokio::test]
    async fn test_outage_fails_every_call() {
        let storage = MemoryStorage::new();
        storage.simulate_outage(true);
        let err = storage.list_categories(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, LedgerError::Storage(_)));

        storage.simulate_outage(false);
        assert!(storage.list_categories(Uuid::new_v4()).await.is_ok());
    }
}
