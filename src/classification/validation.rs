//! Human confirmation of oracle suggestions

use std::collections::HashSet;

use uuid::Uuid;

use crate::access::{Actor, Role};
use crate::traits::*;
use crate::types::*;

/// Confirms `ai_suggested` classifications and writes the audit trail
pub struct ValidationService<S: TreasuryStorage> {
    storage: S,
}

impl<S: TreasuryStorage> ValidationService<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Confirm one suggested classification, optionally correcting its
    /// category. Returns the audit entry that was appended.
    #[tracing::instrument(skip_all, fields(transaction_id = %transaction_id))]
    pub async fn validate(
        &self,
        actor: &Actor,
        transaction_id: Uuid,
        corrected_category: Option<Uuid>,
    ) -> LedgerResult<AuditLogEntry> {
        actor.require(Role::Treasurer)?;
        let org = actor.organization_id;

        let transaction = self
            .storage
            .get_transaction(org, transaction_id)
            .await?
            .ok_or(LedgerError::TransactionNotFound(transaction_id))?;

        if transaction.classification_status != ClassificationStatus::AiSuggested {
            return Err(LedgerError::NotAwaitingValidation(transaction_id));
        }

        if let Some(category_id) = corrected_category {
            if self.storage.get_category(org, category_id).await?.is_none() {
                return Err(LedgerError::CategoryNotFound(category_id));
            }
        }

        let note = match corrected_category {
            Some(_) => "Category corrected and validated",
            None => "Suggested category validated",
        };

        // Someone else may have validated it since the read above
        let mut appended = self
            .storage
            .mark_validated(org, &[transaction_id], corrected_category, actor.user_id, note)
            .await?;

        match appended.pop() {
            Some(entry) => {
                tracing::info!("classification validated");
                Ok(entry)
            }
            None => Err(LedgerError::NotAwaitingValidation(transaction_id)),
        }
    }

    /// Confirm every listed transaction that belongs to the actor's
    /// organization and is still `ai_suggested`; others are skipped.
    /// Returns how many were validated.
    #[tracing::instrument(skip_all, fields(requested = transaction_ids.len()))]
    pub async fn validate_batch(
        &self,
        actor: &Actor,
        transaction_ids: &[Uuid],
    ) -> LedgerResult<usize> {
        actor.require(Role::Treasurer)?;

        let mut seen = HashSet::new();
        let unique: Vec<Uuid> = transaction_ids
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if unique.is_empty() {
            return Ok(0);
        }

        let appended = self
            .storage
            .mark_validated(
                actor.organization_id,
                &unique,
                None,
                actor.user_id,
                "Validated in batch",
            )
            .await?;

        tracing::info!(validated = appended.len(), "batch validation done");
        Ok(appended.len())
    }
}
