//! Category and classification rule management

use std::collections::HashSet;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::access::{Actor, Role};
use crate::classification::sort_rules;
use crate::traits::*;
use crate::types::*;
use crate::utils::validation::{validate_category_name, validate_color, validate_rule_pattern};

/// Color given to categories created without one
pub const DEFAULT_CATEGORY_COLOR: &str = "#94a3b8";

/// Input for [`CategoryManager::create_category`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub color: Option<String>,
    pub parent_id: Option<Uuid>,
    /// Position among siblings; appended after the last sibling when absent
    pub rank: Option<i32>,
}

impl NewCategory {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn under(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}

/// Input for [`CategoryManager::create_rule`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewRule {
    pub pattern: String,
    pub category_id: Uuid,
    /// Higher runs first
    pub priority: i32,
}

/// Manages the category hierarchy and the keyword rules pointing into it
pub struct CategoryManager<S: TreasuryStorage> {
    storage: S,
}

impl<S: TreasuryStorage> CategoryManager<S> {
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    #[tracing::instrument(skip_all, fields(name = %input.name))]
    pub async fn create_category(
        &self,
        actor: &Actor,
        input: NewCategory,
    ) -> LedgerResult<Category> {
        actor.require(Role::Treasurer)?;
        let name = validate_category_name(&input.name)?;
        let color = match input.color {
            Some(color) => {
                validate_color(&color)?;
                color
            }
            None => DEFAULT_CATEGORY_COLOR.to_string(),
        };

        let org = actor.organization_id;
        if let Some(parent_id) = input.parent_id {
            if self.storage.get_category(org, parent_id).await?.is_none() {
                return Err(LedgerError::CategoryNotFound(parent_id));
            }
        }

        let rank = match input.rank {
            Some(rank) => rank,
            None => self
                .storage
                .list_categories(org)
                .await?
                .iter()
                .filter(|c| c.parent_id == input.parent_id)
                .map(|c| c.rank)
                .max()
                .map_or(0, |last| last + 1),
        };

        let category = Category {
            id: Uuid::new_v4(),
            organization_id: org,
            name,
            color,
            parent_id: input.parent_id,
            rank,
            created_at: Utc::now().naive_utc(),
        };
        // Case-insensitive name uniqueness is the store's guard
        self.storage.insert_category(&category).await?;

        tracing::info!(category_id = %category.id, rank, "category created");
        Ok(category)
    }

    /// Move a category under `new_parent`, or to the root with `None`.
    /// A parent inside the category's own subtree is rejected.
    #[tracing::instrument(skip_all, fields(category_id = %category_id))]
    pub async fn reparent_category(
        &self,
        actor: &Actor,
        category_id: Uuid,
        new_parent: Option<Uuid>,
    ) -> LedgerResult<Category> {
        actor.require(Role::Treasurer)?;
        let org = actor.organization_id;
        let categories = self.storage.list_categories(org).await?;

        let mut category = categories
            .iter()
            .find(|c| c.id == category_id)
            .cloned()
            .ok_or(LedgerError::CategoryNotFound(category_id))?;

        if let Some(parent_id) = new_parent {
            if !categories.iter().any(|c| c.id == parent_id) {
                return Err(LedgerError::CategoryNotFound(parent_id));
            }
            if would_create_cycle(&categories, category_id, parent_id) {
                return Err(LedgerError::validation(
                    "parent_id",
                    "a category cannot be placed under itself or one of its descendants",
                ));
            }
        }

        self.storage
            .update_category_parent(org, category_id, new_parent)
            .await?;
        category.parent_id = new_parent;
        Ok(category)
    }

    /// Categories ordered by rank then name
    pub async fn list_categories(&self, actor: &Actor) -> LedgerResult<Vec<Category>> {
        actor.require(Role::Member)?;
        let mut categories = self.storage.list_categories(actor.organization_id).await?;
        categories.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name)));
        Ok(categories)
    }

    #[tracing::instrument(skip_all, fields(category_id = %input.category_id))]
    pub async fn create_rule(
        &self,
        actor: &Actor,
        input: NewRule,
    ) -> LedgerResult<ClassificationRule> {
        actor.require(Role::Treasurer)?;
        let pattern = validate_rule_pattern(&input.pattern)?;
        let org = actor.organization_id;

        if self.storage.get_category(org, input.category_id).await?.is_none() {
            return Err(LedgerError::CategoryNotFound(input.category_id));
        }

        let rule = ClassificationRule {
            id: Uuid::new_v4(),
            organization_id: org,
            pattern,
            category_id: input.category_id,
            priority: input.priority,
            created_at: Utc::now().naive_utc(),
        };
        self.storage.insert_rule(&rule).await?;

        tracing::info!(rule_id = %rule.id, pattern = %rule.pattern, "rule created");
        Ok(rule)
    }

    /// Rules in evaluation order
    pub async fn list_rules(&self, actor: &Actor) -> LedgerResult<Vec<ClassificationRule>> {
        actor.require(Role::Member)?;
        let rules = self.storage.list_rules(actor.organization_id).await?;
        let mut ordered: Vec<&ClassificationRule> = rules.iter().collect();
        sort_rules(&mut ordered);
        Ok(ordered.into_iter().cloned().collect())
    }
}

/// True when `candidate_parent` is `category_id` or one of its descendants
fn would_create_cycle(categories: &[Category], category_id: Uuid, candidate_parent: Uuid) -> bool {
    let mut seen = HashSet::new();
    let mut cursor = Some(candidate_parent);

    while let Some(id) = cursor {
        if id == category_id {
            return true;
        }
        // Stored data may already loop; stop walking instead of spinning
        if !seen.insert(id) {
            return false;
        }
        cursor = categories
            .iter()
            .find(|c| c.id == id)
            .and_then(|c| c.parent_id);
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::MemoryStorage;

    fn treasurer() -> Actor {
        Actor::new(Uuid::new_v4(), Uuid::new_v4(), Role::Treasurer)
    }

    #[tokio::test]
    async fn test_create_category_defaults() {
        let manager = CategoryManager::new(MemoryStorage::new());
        let actor = treasurer();

        let events = manager
            .create_category(&actor, NewCategory::named("  Événements "))
            .await
            .unwrap();
        assert_eq!(events.name, "Événements");
        assert_eq!(events.color, DEFAULT_CATEGORY_COLOR);
        assert_eq!(events.rank, 0);

        let gala = manager
            .create_category(&actor, NewCategory::named("Gala").under(events.id))
            .await
            .unwrap();
        let wei = manager
            .create_category(&actor, NewCategory::named("WEI").under(events.id))
            .await
            .unwrap();
        assert_eq!(gala.rank, 0);
        assert_eq!(wei.rank, 1);

        let root = manager
            .create_category(&actor, NewCategory::named("Cotisations"))
            .await
            .unwrap();
        assert_eq!(root.rank, 1);
    }

    #[tokio::test]
    async fn test_category_validation() {
        let manager = CategoryManager::new(MemoryStorage::new());
        let actor = treasurer();

        let err = manager
            .create_category(&actor, NewCategory::named("   "))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { field: "name", .. }));

        let err = manager
            .create_category(&actor, NewCategory::named("Orphan").under(Uuid::new_v4()))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CategoryNotFound(_)));

        manager
            .create_category(&actor, NewCategory::named("Transport"))
            .await
            .unwrap();
        let err = manager
            .create_category(&actor, NewCategory::named("TRANSPORT "))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::DuplicateCategory(_)));

        let member = Actor::new(Uuid::new_v4(), actor.organization_id, Role::Member);
        let err = manager
            .create_category(&member, NewCategory::named("Bureau"))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Forbidden { .. }));
    }

    #[tokio::test]
    async fn test_reparent_rejects_cycles() {
        let manager = CategoryManager::new(MemoryStorage::new());
        let actor = treasurer();
        let a = manager.create_category(&actor, NewCategory::named("A")).await.unwrap();
        let b = manager
            .create_category(&actor, NewCategory::named("B").under(a.id))
            .await
            .unwrap();
        let c = manager
            .create_category(&actor, NewCategory::named("C").under(b.id))
            .await
            .unwrap();

        for parent in [a.id, c.id] {
            let err = manager
                .reparent_category(&actor, a.id, Some(parent))
                .await
                .unwrap_err();
            assert!(matches!(err, LedgerError::Validation { field: "parent_id", .. }));
        }

        let moved = manager.reparent_category(&actor, c.id, Some(a.id)).await.unwrap();
        assert_eq!(moved.parent_id, Some(a.id));
        let moved = manager.reparent_category(&actor, b.id, None).await.unwrap();
        assert_eq!(moved.parent_id, None);
    }

    #[tokio::test]
    async fn test_rules_listed_in_evaluation_order() {
        let manager = CategoryManager::new(MemoryStorage::new());
        let actor = treasurer();
        let transport = manager
            .create_category(&actor, NewCategory::named("Transport"))
            .await
            .unwrap();

        let err = manager
            .create_rule(
                &actor,
                NewRule {
                    pattern: "  ".to_string(),
                    category_id: transport.id,
                    priority: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Validation { field: "pattern", .. }));

        let err = manager
            .create_rule(
                &actor,
                NewRule {
                    pattern: "sncf".to_string(),
                    category_id: Uuid::new_v4(),
                    priority: 0,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::CategoryNotFound(_)));

        for (pattern, priority) in [("uber", 1), ("sncf", 10)] {
            manager
                .create_rule(
                    &actor,
                    NewRule {
                        pattern: pattern.to_string(),
                        category_id: transport.id,
                        priority,
                    },
                )
                .await
                .unwrap();
        }

        let patterns: Vec<String> = manager
            .list_rules(&actor)
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.pattern)
            .collect();
        assert_eq!(patterns, vec!["sncf", "uber"]);
    }

    #[test]
    fn test_cycle_walk_stops_on_corrupt_data() {
        let org = Uuid::new_v4();
        let make = |id: Uuid, parent: Option<Uuid>| Category {
            id,
            organization_id: org,
            name: id.to_string(),
            color: DEFAULT_CATEGORY_COLOR.to_string(),
            parent_id: parent,
            rank: 0,
            created_at: Utc::now().naive_utc(),
        };
        let (x, y, z) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let categories = vec![make(x, Some(y)), make(y, Some(x)), make(z, None)];
        assert!(!would_create_cycle(&categories, z, x));
        assert!(would_create_cycle(&categories, x, y));
    }
}
