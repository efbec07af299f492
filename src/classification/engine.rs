//! Tiered category decision: exact name, hard rule, oracle, unresolved

use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::traits::CategorizationOracle;
use crate::types::*;

/// Oracle calls are abandoned after this long unless configured otherwise
pub const DEFAULT_ORACLE_TIMEOUT: Duration = Duration::from_secs(5);

/// What the classifier knows about an incoming transaction
#[derive(Debug, Clone, Copy)]
pub struct ClassificationInput<'a> {
    pub description: &'a str,
    /// Amount in cents
    pub amount: i64,
    /// Category name typed by the submitter, if any
    pub category_hint: Option<&'a str>,
}

/// Outcome of a classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    pub category_id: Option<Uuid>,
    pub method: ClassificationMethod,
    pub status: ClassificationStatus,
}

impl Classification {
    /// Category named explicitly by the submitter
    pub fn exact(category_id: Uuid) -> Self {
        Self {
            category_id: Some(category_id),
            method: ClassificationMethod::Manual,
            status: ClassificationStatus::Validated,
        }
    }

    /// Category assigned by a deterministic rule
    pub fn rule(category_id: Uuid) -> Self {
        Self {
            category_id: Some(category_id),
            method: ClassificationMethod::HardRule,
            status: ClassificationStatus::Validated,
        }
    }

    /// Category proposed by the oracle, awaiting human confirmation
    pub fn suggested(category_id: Uuid) -> Self {
        Self {
            category_id: Some(category_id),
            method: ClassificationMethod::AiLlm,
            status: ClassificationStatus::AiSuggested,
        }
    }

    pub fn unresolved() -> Self {
        Self {
            category_id: None,
            method: ClassificationMethod::Manual,
            status: ClassificationStatus::Pending,
        }
    }
}

/// Sort rules into evaluation order: highest priority first, then oldest,
/// then by id so the order never depends on how the store returned them
pub fn sort_rules(rules: &mut [&ClassificationRule]) {
    rules.sort_by(|a, b| {
        b.priority
            .cmp(&a.priority)
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });
}

/// Category names in display order, as offered to the oracle
pub fn candidate_names(categories: &[Category]) -> Vec<String> {
    let mut ordered: Vec<&Category> = categories.iter().collect();
    ordered.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
    ordered.into_iter().map(|c| c.name.clone()).collect()
}

fn find_by_name<'a>(categories: &'a [Category], name: &str) -> Option<&'a Category> {
    categories.iter().find(|c| c.matches_name(name))
}

/// First rule, in evaluation order, whose pattern occurs in `description`
/// and whose target category still exists
pub fn first_matching_rule<'a>(
    description: &str,
    rules: &'a [ClassificationRule],
    categories: &[Category],
) -> Option<&'a ClassificationRule> {
    let mut ordered: Vec<&ClassificationRule> = rules.iter().collect();
    sort_rules(&mut ordered);
    ordered.into_iter().find(|rule| {
        rule.matches(description) && categories.iter().any(|c| c.id == rule.category_id)
    })
}

/// Hybrid classifier over an oracle
pub struct Classifier<O: CategorizationOracle> {
    oracle: O,
    timeout: Duration,
}

impl<O: CategorizationOracle> Classifier<O> {
    pub fn new(oracle: O) -> Self {
        Self {
            oracle,
            timeout: DEFAULT_ORACLE_TIMEOUT,
        }
    }

    /// Bound every oracle call by `timeout`
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Decide a category for one transaction.
    ///
    /// Tiers run in order and the first success wins; the oracle is only
    /// consulted when neither the hint nor any rule resolved a category.
    /// Oracle failures of any kind end in [`Classification::unresolved`].
    #[tracing::instrument(skip_all, fields(amount = input.amount))]
    pub async fn classify(
        &self,
        input: &ClassificationInput<'_>,
        categories: &[Category],
        rules: &[ClassificationRule],
    ) -> Classification {
        if let Some(category) = input
            .category_hint
            .filter(|hint| !hint.trim().is_empty())
            .and_then(|hint| find_by_name(categories, hint))
        {
            tracing::debug!(category = %category.name, "exact category match");
            return Classification::exact(category.id);
        }

        if let Some(rule) = first_matching_rule(input.description, rules, categories) {
            tracing::debug!(rule_id = %rule.id, pattern = %rule.pattern, "hard rule matched");
            return Classification::rule(rule.category_id);
        }

        if categories.is_empty() {
            tracing::debug!("no categories to choose from");
            return Classification::unresolved();
        }

        match self.ask_oracle(input, categories).await {
            Some(category_id) => Classification::suggested(category_id),
            None => Classification::unresolved(),
        }
    }

    async fn ask_oracle(
        &self,
        input: &ClassificationInput<'_>,
        categories: &[Category],
    ) -> Option<Uuid> {
        let candidates = candidate_names(categories);
        let call = self
            .oracle
            .suggest(input.description, input.amount, &candidates);

        let label = match tokio::time::timeout(self.timeout, call).await {
            Err(_) => {
                tracing::warn!(timeout_ms = self.timeout.as_millis() as u64, "oracle timed out");
                return None;
            }
            Ok(Err(err)) => {
                tracing::warn!(error = %err, "oracle call failed");
                return None;
            }
            Ok(Ok(None)) => {
                tracing::debug!("oracle had no suggestion");
                return None;
            }
            Ok(Ok(Some(label))) => label,
        };

        match find_by_name(categories, &label) {
            Some(category) => {
                tracing::debug!(category = %category.name, "oracle suggestion accepted");
                Some(category.id)
            }
            None => {
                tracing::debug!(label = %label, "oracle label matches no category");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{NoOracle, OracleError};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Oracle returning a fixed answer and counting its calls
    struct SpyOracle {
        answer: Option<String>,
        calls: AtomicUsize,
    }

    impl SpyOracle {
        fn answering(answer: Option<&str>) -> Arc<Self> {
            Arc::new(Self {
                answer: answer.map(str::to_string),
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CategorizationOracle for SpyOracle {
        async fn suggest(
            &self,
            _description: &str,
            _amount: i64,
            _candidates: &[String],
        ) -> Result<Option<String>, OracleError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl CategorizationOracle for FailingOracle {
        async fn suggest(
            &self,
            _description: &str,
            _amount: i64,
            _candidates: &[String],
        ) -> Result<Option<String>, OracleError> {
            Err(OracleError::Transport("connection reset".to_string()))
        }
    }

    struct SlowOracle;

    #[async_trait]
    impl CategorizationOracle for SlowOracle {
        async fn suggest(
            &self,
            _description: &str,
            _amount: i64,
            candidates: &[String],
        ) -> Result<Option<String>, OracleError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(candidates.first().cloned())
        }
    }

    fn category(org: Uuid, name: &str, rank: i32) -> Category {
        Category {
            id: Uuid::new_v4(),
            organization_id: org,
            name: name.to_string(),
            color: "#94a3b8".to_string(),
            parent_id: None,
            rank,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn rule(target: &Category, pattern: &str, priority: i32) -> ClassificationRule {
        ClassificationRule {
            id: Uuid::new_v4(),
            organization_id: target.organization_id,
            pattern: pattern.to_string(),
            category_id: target.id,
            priority,
            created_at: Utc::now().naive_utc(),
        }
    }

    fn input<'a>(description: &'a str, hint: Option<&'a str>) -> ClassificationInput<'a> {
        ClassificationInput {
            description,
            amount: 1850,
            category_hint: hint,
        }
    }

    #[tokio::test]
    async fn test_exact_match_beats_rule_and_oracle() {
        let org = Uuid::new_v4();
        let transport = category(org, "Transport", 0);
        let food = category(org, "Alimentation", 1);
        let rules = vec![rule(&transport, "uber", 0)];
        let categories = vec![transport.clone(), food.clone()];
        let oracle = SpyOracle::answering(Some("Transport"));
        let classifier = Classifier::new(oracle.clone());

        let result = classifier
            .classify(&input("UBER EATS", Some("  alimentation ")), &categories, &rules)
            .await;

        assert_eq!(result, Classification::exact(food.id));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_rule_short_circuits_oracle() {
        let org = Uuid::new_v4();
        let transport = category(org, "Transport", 0);
        let categories = vec![transport.clone()];
        let rules = vec![rule(&transport, "Uber", 0)];
        let oracle = SpyOracle::answering(Some("Transport"));
        let classifier = Classifier::new(oracle.clone());

        let result = classifier
            .classify(&input("uber *trip paris", Some("Unknown")), &categories, &rules)
            .await;

        assert_eq!(result.method, ClassificationMethod::HardRule);
        assert_eq!(result.status, ClassificationStatus::Validated);
        assert_eq!(result.category_id, Some(transport.id));
        assert_eq!(oracle.calls(), 0);
    }

    #[tokio::test]
    async fn test_rule_order_is_priority_then_age() {
        let org = Uuid::new_v4();
        let fees = category(org, "Frais Bancaires", 0);
        let income = category(org, "Cotisations", 1);
        let categories = vec![fees.clone(), income.clone()];

        let mut older = rule(&fees, "payment", 5);
        older.created_at -= ChronoDuration::days(1);
        let newer = rule(&income, "payment", 5);
        let boosted = rule(&income, "received", 10);

        let classifier = Classifier::new(NoOracle);

        let result = classifier
            .classify(&input("PAYMENT", None), &categories, &[newer.clone(), older.clone()])
            .await;
        assert_eq!(result.category_id, Some(fees.id));

        let result = classifier
            .classify(
                &input("PAYMENT RECEIVED", None),
                &categories,
                &[older, newer, boosted],
            )
            .await;
        assert_eq!(result.category_id, Some(income.id));
    }

    #[tokio::test]
    async fn test_rule_with_missing_category_is_skipped() {
        let org = Uuid::new_v4();
        let transport = category(org, "Transport", 0);
        let gone = category(org, "Archived", 1);
        let categories = vec![transport.clone()];
        let rules = vec![rule(&gone, "sncf", 10), rule(&transport, "sncf", 0)];

        let result = Classifier::new(NoOracle)
            .classify(&input("SNCF Paris-Lyon", None), &categories, &rules)
            .await;
        assert_eq!(result, Classification::rule(transport.id));
    }

    #[tokio::test]
    async fn test_oracle_suggestion_needs_confirmation() {
        let org = Uuid::new_v4();
        let events = category(org, "Événementiel", 0);
        let categories = vec![category(org, "Transport", 1), events.clone()];
        let oracle = SpyOracle::answering(Some(" événementiel\n"));
        let classifier = Classifier::new(oracle.clone());

        let result = classifier
            .classify(&input("Location salle gala", None), &categories, &[])
            .await;

        assert_eq!(result, Classification::suggested(events.id));
        assert_eq!(oracle.calls(), 1);
    }

    #[tokio::test]
    async fn test_unrecognized_label_falls_through() {
        let org = Uuid::new_v4();
        let categories = vec![category(org, "Transport", 0)];
        let oracle = SpyOracle::answering(Some("Voyages"));

        let result = Classifier::new(oracle)
            .classify(&input("Agence de voyage", None), &categories, &[])
            .await;
        assert_eq!(result, Classification::unresolved());
    }

    #[tokio::test]
    async fn test_oracle_failure_falls_through() {
        let org = Uuid::new_v4();
        let categories = vec![category(org, "Transport", 0)];

        let result = Classifier::new(FailingOracle)
            .classify(&input("Essence", None), &categories, &[])
            .await;
        assert_eq!(result, Classification::unresolved());
    }

    #[tokio::test]
    async fn test_oracle_timeout_falls_through() {
        let org = Uuid::new_v4();
        let categories = vec![category(org, "Transport", 0)];
        let classifier = Classifier::new(SlowOracle).with_timeout(Duration::from_millis(20));

        let result = classifier
            .classify(&input("Péage A6", None), &categories, &[])
            .await;
        assert_eq!(result, Classification::unresolved());
    }

    #[tokio::test]
    async fn test_no_categories_skips_oracle() {
        let oracle = SpyOracle::answering(Some("Transport"));
        let result = Classifier::new(oracle.clone())
            .classify(&input("Uber", Some("Transport")), &[], &[])
            .await;

        assert_eq!(result, Classification::unresolved());
        assert_eq!(oracle.calls(), 0);
    }

    #[test]
    fn test_candidate_names_follow_rank() {
        let org = Uuid::new_v4();
        let categories = vec![
            category(org, "Zeta", 2),
            category(org, "Beta", 0),
            category(org, "Alpha", 2),
        ];
        assert_eq!(candidate_names(&categories), vec!["Beta", "Alpha", "Zeta"]);
    }
}
