//! Month-by-month closure chain and balance computation

use bigdecimal::{BigDecimal, Zero};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{Actor, Role};
use crate::money::balance_to_cents;
use crate::month::Month;
use crate::traits::TreasuryStorage;
use crate::types::*;
use crate::utils::validation::{normalize_notes, MAX_NOTES_LEN};

/// Expected end-of-month balance derived from the closure chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedBalance {
    /// Previous bank balance plus this month's signed transactions, in cents
    pub computed: i64,
    pub previous_closure: MonthlyClosure,
    /// Net of the month's transactions (`+income -expense`)
    pub month_delta: i64,
}

/// Read-only projection shown before a month is closed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalancePreview {
    pub computed_balance: i64,
    pub previous_bank_balance: i64,
    pub month_transactions_delta: i64,
}

impl From<&ExpectedBalance> for BalancePreview {
    fn from(expected: &ExpectedBalance) -> Self {
        Self {
            computed_balance: expected.computed,
            previous_bank_balance: expected.previous_closure.bank_balance,
            month_transactions_delta: expected.month_delta,
        }
    }
}

/// Result of closing a month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureOutcome {
    pub closure: MonthlyClosure,
    /// `bank - computed`; non-zero means a discrepancy to investigate
    pub delta: i64,
    pub computed: i64,
}

/// Aggregate view over all closures of an organization
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerSummary {
    /// Bank balance declared by the initial closure
    pub opening_balance: Option<i64>,
    /// Bank balance of the most recent closure
    pub closing_balance: Option<i64>,
    pub first_month: Option<Month>,
    pub last_month: Option<Month>,
    pub closure_count: usize,
    pub reconciled_months: usize,
    pub discrepant_months: usize,
    /// Sum of all deltas
    pub net_discrepancy: i64,
}

/// Append-only monthly reconciliation ledger
pub struct ReconciliationLedger<S: TreasuryStorage> {
    storage: S,
    max_notes_len: usize,
}

impl<S: TreasuryStorage> ReconciliationLedger<S> {
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            max_notes_len: MAX_NOTES_LEN,
        }
    }

    /// Override the accepted note length
    pub fn with_max_notes_len(mut self, max_notes_len: usize) -> Self {
        self.max_notes_len = max_notes_len;
        self
    }

    /// Expected balance at the end of `month`, chained from the previous
    /// month's closure.
    ///
    /// Fails with [`LedgerError::NoStartingPoint`] when the previous month is
    /// not closed.
    pub async fn compute_expected_balance(
        &self,
        organization_id: Uuid,
        month: Month,
    ) -> LedgerResult<ExpectedBalance> {
        let previous_month = month.previous()?;
        let previous_closure = self
            .storage
            .find_closure(organization_id, previous_month)
            .await?
            .ok_or(LedgerError::NoStartingPoint(month))?;

        let end = month.next()?;
        let month_delta = self
            .storage
            .list_transactions(organization_id, Some(month.first_day()), Some(end.first_day()))
            .await?
            .iter()
            .try_fold(0i64, |total, t| total.checked_add(t.signed_amount()))
            .ok_or_else(out_of_range)?;

        // The chain carries the bank figure, not the previous computed one
        let computed = previous_closure
            .bank_balance
            .checked_add(month_delta)
            .ok_or_else(out_of_range)?;

        Ok(ExpectedBalance {
            computed,
            previous_closure,
            month_delta,
        })
    }

    #[tracing::instrument(skip_all, fields(month = %month))]
    pub async fn preview(&self, actor: &Actor, month: Month) -> LedgerResult<BalancePreview> {
        actor.require(Role::Treasurer)?;
        let expected = self
            .compute_expected_balance(actor.organization_id, month)
            .await?;
        Ok(BalancePreview::from(&expected))
    }

    /// Declare the organization's starting bank balance. Only one initial
    /// closure can ever exist.
    #[tracing::instrument(skip_all, fields(month = %month))]
    pub async fn create_initial_closure(
        &self,
        actor: &Actor,
        month: Month,
        bank_balance: &BigDecimal,
        notes: Option<&str>,
    ) -> LedgerResult<MonthlyClosure> {
        actor.require(Role::Treasurer)?;
        if *bank_balance < BigDecimal::zero() {
            return Err(LedgerError::validation(
                "bank_balance",
                "initial balance cannot be negative",
            ));
        }
        let notes = normalize_notes(notes, self.max_notes_len)?;
        let cents = balance_to_cents(bank_balance)?;
        let org = actor.organization_id;

        if self.storage.find_initial_closure(org).await?.is_some() {
            return Err(LedgerError::InitialBalanceAlreadyDeclared);
        }
        if self.storage.find_closure(org, month).await?.is_some() {
            return Err(LedgerError::MonthAlreadyClosed(month));
        }

        let closure = MonthlyClosure {
            id: Uuid::new_v4(),
            organization_id: org,
            month,
            bank_balance: cents,
            computed_balance: cents,
            delta: 0,
            is_initial: true,
            notes,
            closed_by: actor.user_id,
            created_at: Utc::now().naive_utc(),
        };
        self.storage.insert_closure(&closure).await?;

        tracing::info!(bank_balance = cents, "initial balance declared");
        Ok(closure)
    }

    /// Close `month` against the statement's bank balance
    #[tracing::instrument(skip_all, fields(month = %month))]
    pub async fn create_closure(
        &self,
        actor: &Actor,
        month: Month,
        bank_balance: &BigDecimal,
        notes: Option<&str>,
    ) -> LedgerResult<ClosureOutcome> {
        actor.require(Role::Treasurer)?;
        let notes = normalize_notes(notes, self.max_notes_len)?;
        let bank = balance_to_cents(bank_balance)?;
        let org = actor.organization_id;

        if self.storage.find_closure(org, month).await?.is_some() {
            return Err(LedgerError::MonthAlreadyClosed(month));
        }

        let expected = self.compute_expected_balance(org, month).await?;
        let delta = bank.checked_sub(expected.computed).ok_or_else(out_of_range)?;

        let closure = MonthlyClosure {
            id: Uuid::new_v4(),
            organization_id: org,
            month,
            bank_balance: bank,
            computed_balance: expected.computed,
            delta,
            is_initial: false,
            notes,
            closed_by: actor.user_id,
            created_at: Utc::now().naive_utc(),
        };
        // A concurrent closer that got past the check above loses here
        self.storage.insert_closure(&closure).await?;

        if delta != 0 {
            tracing::warn!(
                bank,
                computed = expected.computed,
                delta,
                "month closed with a discrepancy"
            );
        } else {
            tracing::info!(bank, "month closed and reconciled");
        }

        Ok(ClosureOutcome {
            computed: expected.computed,
            delta,
            closure,
        })
    }

    /// All closures, most recent month first
    pub async fn list_closures(&self, actor: &Actor) -> LedgerResult<Vec<MonthlyClosure>> {
        actor.require(Role::Member)?;
        let mut closures = self.storage.list_closures(actor.organization_id).await?;
        closures.sort_by(|a, b| b.month.cmp(&a.month));
        Ok(closures)
    }

    pub async fn summary(&self, actor: &Actor) -> LedgerResult<LedgerSummary> {
        actor.require(Role::Member)?;
        let mut closures = self.storage.list_closures(actor.organization_id).await?;
        closures.sort_by_key(|c| c.month);
        Ok(summarize(&closures))
    }
}

fn out_of_range() -> LedgerError {
    LedgerError::validation("bank_balance", "balance is out of range")
}

/// Fold closures (oldest first) into a [`LedgerSummary`]
fn summarize(closures: &[MonthlyClosure]) -> LedgerSummary {
    let reconciled_months = closures.iter().filter(|c| c.is_reconciled()).count();

    LedgerSummary {
        opening_balance: closures
            .iter()
            .find(|c| c.is_initial)
            .map(|c| c.bank_balance),
        closing_balance: closures.last().map(|c| c.bank_balance),
        first_month: closures.first().map(|c| c.month),
        last_month: closures.last().map(|c| c.month),
        closure_count: closures.len(),
        reconciled_months,
        discrepant_months: closures.len() - reconciled_months,
        net_discrepancy: closures
            .iter()
            .fold(0i64, |total, c| total.saturating_add(c.delta)),
    }
}
