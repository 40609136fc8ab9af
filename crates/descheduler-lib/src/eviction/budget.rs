//! Eviction budgets shared across concurrent submissions

use crate::config::EvictionLimits;
use dashmap::DashMap;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Which limit refused a reservation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BudgetScope {
    Global,
    Node,
}

/// Result of asking the budget for one submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Granted,
    Exhausted(BudgetScope),
}

/// Global and per-node submission counters
///
/// Counters only move through compare-and-swap, so the limits hold even when
/// reservations race from several tasks.
#[derive(Debug)]
pub struct EvictionBudget {
    total_limit: Option<u64>,
    per_node_limit: Option<u64>,
    total_used: AtomicU64,
    per_node_used: DashMap<String, AtomicU64>,
}

impl EvictionBudget {
    pub fn new(limits: EvictionLimits) -> Self {
        Self {
            total_limit: limits.total,
            per_node_limit: limits.per_node,
            total_used: AtomicU64::new(0),
            per_node_used: DashMap::new(),
        }
    }

    /// Budget with no limits
    pub fn unlimited() -> Self {
        Self::new(EvictionLimits::unlimited())
    }

    /// Reserve one submission against the global and the node's budget
    pub fn try_reserve(&self, node: &str) -> Reservation {
        if !Self::increment_within(&self.total_used, self.total_limit) {
            return Reservation::Exhausted(BudgetScope::Global);
        }

        let node_ok = {
            let counter = self
                .per_node_used
                .entry(node.to_string())
                .or_insert_with(|| AtomicU64::new(0));
            Self::increment_within(&counter, self.per_node_limit)
        };

        if !node_ok {
            self.total_used.fetch_sub(1, Ordering::SeqCst);
            return Reservation::Exhausted(BudgetScope::Node);
        }

        Reservation::Granted
    }

    fn increment_within(counter: &AtomicU64, limit: Option<u64>) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |used| match limit {
                Some(max) if used >= max => None,
                _ => Some(used + 1),
            })
            .is_ok()
    }

    /// Submissions reserved so far
    pub fn total_used(&self) -> u64 {
        self.total_used.load(Ordering::SeqCst)
    }

    /// Submissions reserved so far on one node
    pub fn node_used(&self, node: &str) -> u64 {
        self.per_node_used
            .get(node)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Whether the global budget has no room left
    pub fn is_exhausted(&self) -> bool {
        self.total_limit
            .map(|max| self.total_used() >= max)
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn limits(total: Option<u64>, per_node: Option<u64>) -> EvictionLimits {
        EvictionLimits {
            total,
            per_node,
            concurrency: 1,
        }
    }

    #[test]
    fn test_global_limit() {
        let budget = EvictionBudget::new(limits(Some(2), None));

        assert_eq!(budget.try_reserve("a"), Reservation::Granted);
        assert_eq!(budget.try_reserve("b"), Reservation::Granted);
        assert_eq!(
            budget.try_reserve("c"),
            Reservation::Exhausted(BudgetScope::Global)
        );
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_node_limit_does_not_consume_global() {
        let budget = EvictionBudget::new(limits(Some(3), Some(1)));

        assert_eq!(budget.try_reserve("a"), Reservation::Granted);
        assert_eq!(
            budget.try_reserve("a"),
            Reservation::Exhausted(BudgetScope::Node)
        );
        assert_eq!(budget.total_used(), 1);
        assert_eq!(budget.try_reserve("b"), Reservation::Granted);
        assert_eq!(budget.node_used("a"), 1);
        assert_eq!(budget.node_used("b"), 1);
    }

    #[test]
    fn test_zero_budget_refuses_everything() {
        let budget = EvictionBudget::new(limits(Some(0), None));
        assert_eq!(
            budget.try_reserve("a"),
            Reservation::Exhausted(BudgetScope::Global)
        );
        assert_eq!(budget.total_used(), 0);
    }

    #[test]
    fn test_unlimited() {
        let budget = EvictionBudget::unlimited();
        for _ in 0..100 {
            assert_eq!(budget.try_reserve("a"), Reservation::Granted);
        }
        assert!(!budget.is_exhausted());
    }

    #[test]
    fn test_limits_hold_under_contention() {
        let budget = Arc::new(EvictionBudget::new(limits(Some(10), Some(3))));
        let nodes = ["a", "b", "c", "d", "e"];

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let budget = Arc::clone(&budget);
                std::thread::spawn(move || {
                    let mut granted: u64 = 0;
                    for i in 0..50 {
                        let node = nodes[(t + i) % nodes.len()];
                        if budget.try_reserve(node) == Reservation::Granted {
                            granted += 1;
                        }
                    }
                    granted
                })
            })
            .collect();

        let granted: u64 = handles.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(granted, 10);
        assert_eq!(budget.total_used(), 10);
        for node in nodes {
            assert!(budget.node_used(node) <= 3);
        }
    }
}
