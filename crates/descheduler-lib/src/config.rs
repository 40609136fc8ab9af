//! Strategy configuration for duplicate rebalancing

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Default number of concurrent eviction submissions
const DEFAULT_DISPATCH_CONCURRENCY: usize = 4;

/// Configuration for the remove-duplicates strategy
///
/// Budgets are signed so that a negative value coming from environment or
/// file configuration can be rejected by [`StrategyConfig::validate`] instead
/// of wrapping silently. `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    /// Maximum evictions submitted in one pass
    pub max_evictions_total: Option<i64>,
    /// Maximum evictions submitted per node in one pass
    pub max_evictions_per_node: Option<i64>,
    /// Whether replicas without a controller are indexed at all
    pub include_ownerless: bool,
    /// Allow evicting replicas that use local storage
    pub evict_local_storage_pods: bool,
    /// Allow evicting system-critical replicas
    pub evict_system_critical_pods: bool,
    /// Replicas at or above this priority are protected
    pub priority_threshold: Option<i32>,
    /// Replicas in these namespaces are protected
    pub excluded_namespaces: Vec<String>,
    /// Concurrent eviction submissions
    pub dispatch_concurrency: usize,
    /// Compute the plan and record it without evicting
    pub dry_run: bool,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            max_evictions_total: None,
            max_evictions_per_node: None,
            include_ownerless: false,
            evict_local_storage_pods: false,
            evict_system_critical_pods: false,
            priority_threshold: None,
            excluded_namespaces: Vec::new(),
            dispatch_concurrency: DEFAULT_DISPATCH_CONCURRENCY,
            dry_run: false,
        }
    }
}

/// Validated eviction limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionLimits {
    pub total: Option<u64>,
    pub per_node: Option<u64>,
    pub concurrency: usize,
}

impl EvictionLimits {
    pub fn unlimited() -> Self {
        Self {
            total: None,
            per_node: None,
            concurrency: DEFAULT_DISPATCH_CONCURRENCY,
        }
    }
}

impl StrategyConfig {
    /// Check budgets and concurrency, failing fast on invalid values
    pub fn validate(&self) -> Result<EvictionLimits, ConfigError> {
        let total = non_negative("max_evictions_total", self.max_evictions_total)?;
        let per_node = non_negative("max_evictions_per_node", self.max_evictions_per_node)?;

        if self.dispatch_concurrency == 0 {
            return Err(ConfigError::ZeroConcurrency);
        }

        Ok(EvictionLimits {
            total,
            per_node,
            concurrency: self.dispatch_concurrency,
        })
    }
}

fn non_negative(field: &'static str, value: Option<i64>) -> Result<Option<u64>, ConfigError> {
    match value {
        Some(v) if v < 0 => Err(ConfigError::NegativeBudget { field, value: v }),
        Some(v) => Ok(Some(v as u64)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_unlimited() {
        let limits = StrategyConfig::default().validate().unwrap();
        assert_eq!(limits, EvictionLimits::unlimited());
    }

    #[test]
    fn test_negative_total_budget_rejected() {
        let config = StrategyConfig {
            max_evictions_total: Some(-1),
            ..Default::default()
        };

        assert_eq!(
            config.validate(),
            Err(ConfigError::NegativeBudget {
                field: "max_evictions_total",
                value: -1
            })
        );
    }

    #[test]
    fn test_negative_node_budget_rejected() {
        let config = StrategyConfig {
            max_evictions_per_node: Some(-3),
            ..Default::default()
        };

        let err = config.validate().unwrap_err();
        assert_eq!(err.to_string(), "max_evictions_per_node must be >= 0, got -3");
    }

    #[test]
    fn test_zero_budget_is_valid() {
        let config = StrategyConfig {
            max_evictions_total: Some(0),
            max_evictions_per_node: Some(2),
            ..Default::default()
        };

        let limits = config.validate().unwrap();
        assert_eq!(limits.total, Some(0));
        assert_eq!(limits.per_node, Some(2));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let config = StrategyConfig {
            dispatch_concurrency: 0,
            ..Default::default()
        };
        assert_eq!(config.validate(), Err(ConfigError::ZeroConcurrency));
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: StrategyConfig =
            serde_json::from_str(r#"{"max_evictions_per_node": 1}"#).unwrap();
        assert_eq!(config.max_evictions_per_node, Some(1));
        assert!(!config.include_ownerless);
        assert_eq!(config.dispatch_concurrency, 4);
    }
}
