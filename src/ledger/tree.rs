//! Category hierarchy built from the flat category table, with optional
//! expense totals for budget analytics

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use uuid::Uuid;

use crate::types::{Category, Transaction};

/// One category in a [`CategoryTree`]
#[derive(Debug, Clone, Serialize)]
pub struct CategoryNode {
    pub category: Category,
    /// 0 for roots
    pub depth: usize,
    /// Expenses filed directly under this category, in cents
    pub direct_total: i64,
    /// `direct_total` plus every descendant's
    pub recursive_total: i64,
    children: Vec<usize>,
}

impl CategoryNode {
    pub fn id(&self) -> Uuid {
        self.category.id
    }
}

/// Arena-backed category tree
#[derive(Debug, Clone, Default, Serialize)]
pub struct CategoryTree {
    nodes: Vec<CategoryNode>,
    #[serde(skip)]
    index: HashMap<Uuid, usize>,
    roots: Vec<usize>,
}

impl CategoryTree {
    /// Build the tree in two passes: map every category into the arena, then
    /// link each one to its parent.
    ///
    /// A category whose parent is unknown, or whose ancestry loops back to
    /// itself, is placed at the root.
    pub fn build(categories: Vec<Category>) -> Self {
        let mut tree = CategoryTree::default();

        for category in categories {
            if tree.index.contains_key(&category.id) {
                continue;
            }
            tree.index.insert(category.id, tree.nodes.len());
            tree.nodes.push(CategoryNode {
                category,
                depth: 0,
                direct_total: 0,
                recursive_total: 0,
                children: Vec::new(),
            });
        }

        for slot in 0..tree.nodes.len() {
            match tree.effective_parent(slot) {
                Some(parent) => tree.nodes[parent].children.push(slot),
                None => tree.roots.push(slot),
            }
        }

        let mut roots = std::mem::take(&mut tree.roots);
        tree.sort_siblings(&mut roots);
        tree.roots = roots;
        for slot in 0..tree.nodes.len() {
            let mut children = std::mem::take(&mut tree.nodes[slot].children);
            tree.sort_siblings(&mut children);
            tree.nodes[slot].children = children;
        }

        for slot in tree.preorder() {
            let depth = tree.nodes[slot].depth;
            for child in tree.nodes[slot].children.clone() {
                tree.nodes[child].depth = depth + 1;
            }
        }

        tree
    }

    fn effective_parent(&self, slot: usize) -> Option<usize> {
        let parent = self
            .nodes[slot]
            .category
            .parent_id
            .and_then(|id| self.index.get(&id).copied())?;

        let mut seen = HashSet::new();
        let mut cursor = Some(parent);
        while let Some(current) = cursor {
            if current == slot {
                return None;
            }
            if !seen.insert(current) {
                break;
            }
            cursor = self.nodes[current]
                .category
                .parent_id
                .and_then(|id| self.index.get(&id).copied());
        }
        Some(parent)
    }

    fn sort_siblings(&self, slots: &mut [usize]) {
        slots.sort_by(|&a, &b| {
            let (a, b) = (&self.nodes[a].category, &self.nodes[b].category);
            a.rank.cmp(&b.rank).then_with(|| a.name.cmp(&b.name))
        });
    }

    /// Slots in depth-first order, siblings in rank order
    fn preorder(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack: Vec<usize> = self.roots.iter().rev().copied().collect();
        while let Some(slot) = stack.pop() {
            order.push(slot);
            stack.extend(self.nodes[slot].children.iter().rev().copied());
        }
        order
    }

    /// Fill in direct and recursive expense totals. Income and
    /// uncategorized transactions are ignored.
    pub fn with_totals(mut self, transactions: &[Transaction]) -> Self {
        for node in &mut self.nodes {
            node.direct_total = 0;
            node.recursive_total = 0;
        }

        for transaction in transactions.iter().filter(|t| t.is_expense()) {
            if let Some(&slot) = transaction
                .category_id
                .as_ref()
                .and_then(|id| self.index.get(id))
            {
                let node = &mut self.nodes[slot];
                node.direct_total = node.direct_total.saturating_add(transaction.amount);
            }
        }

        // Children come after their parent in preorder, so walking it
        // backwards finishes every subtree before its root
        for slot in self.preorder().into_iter().rev() {
            let children_total: i64 = self.nodes[slot]
                .children
                .iter()
                .fold(0i64, |total, &child| {
                    total.saturating_add(self.nodes[child].recursive_total)
                });
            self.nodes[slot].recursive_total =
                self.nodes[slot].direct_total.saturating_add(children_total);
        }

        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&CategoryNode> {
        self.index.get(&id).map(|&slot| &self.nodes[slot])
    }

    pub fn roots(&self) -> impl Iterator<Item = &CategoryNode> {
        self.roots.iter().map(|&slot| &self.nodes[slot])
    }

    pub fn children(&self, id: Uuid) -> impl Iterator<Item = &CategoryNode> {
        let children = self
            .index
            .get(&id)
            .map(|&slot| self.nodes[slot].children.as_slice())
            .unwrap_or_default();
        children.iter().map(|&slot| &self.nodes[slot])
    }

    /// Every node, depth first
    pub fn iter(&self) -> impl Iterator<Item = &CategoryNode> {
        self.preorder().into_iter().map(|slot| &self.nodes[slot])
    }
}
