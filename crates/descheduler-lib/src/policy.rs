//! Eviction eligibility policy
//!
//! Protection rules are plain predicates over a [`Replica`]. They compose by
//! logical AND through [`EligibilityPolicy`], so new rules are added without
//! touching candidate selection.

use crate::config::StrategyConfig;
use crate::models::Replica;
use dashmap::DashMap;
use std::collections::BTreeSet;

/// Priority at and above which the cluster treats a pod as system-critical
pub const SYSTEM_CRITICAL_PRIORITY: i32 = 2_000_000_000;

/// Decides whether a replica may be evicted
pub trait EligibilityPredicate: Send + Sync {
    fn eligible(&self, replica: &Replica) -> bool;
}

impl<F> EligibilityPredicate for F
where
    F: Fn(&Replica) -> bool + Send + Sync,
{
    fn eligible(&self, replica: &Replica) -> bool {
        self(replica)
    }
}

/// Logical AND of independent predicates; empty means everything is eligible
#[derive(Default)]
pub struct EligibilityPolicy {
    checks: Vec<Box<dyn EligibilityPredicate>>,
}

impl EligibilityPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add another check
    pub fn and(mut self, check: impl EligibilityPredicate + 'static) -> Self {
        self.checks.push(Box::new(check));
        self
    }

    /// Build the standard protections enabled by a strategy configuration
    ///
    /// Mirror, DaemonSet-managed and terminating replicas are always
    /// protected. Critical and local-storage replicas are protected unless
    /// the configuration allows them.
    pub fn from_config(config: &StrategyConfig) -> Self {
        let mut policy = Self::new()
            .and(not_mirror)
            .and(not_daemon_managed)
            .and(not_terminating);

        if !config.evict_system_critical_pods {
            policy = policy.and(not_critical);
        }
        if !config.evict_local_storage_pods {
            policy = policy.and(no_local_storage);
        }
        if let Some(threshold) = config.priority_threshold {
            policy = policy.and(PriorityBelow(threshold));
        }
        if !config.excluded_namespaces.is_empty() {
            policy = policy.and(NamespaceExclusion::new(
                config.excluded_namespaces.iter().cloned(),
            ));
        }

        policy
    }

    pub fn len(&self) -> usize {
        self.checks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl EligibilityPredicate for EligibilityPolicy {
    fn eligible(&self, replica: &Replica) -> bool {
        self.checks.iter().all(|check| check.eligible(replica))
    }
}

pub fn not_mirror(replica: &Replica) -> bool {
    !replica.protection.mirror
}

pub fn not_daemon_managed(replica: &Replica) -> bool {
    !replica.protection.daemon_managed
        && replica
            .controller()
            .map(|owner| owner.kind != "DaemonSet")
            .unwrap_or(true)
}

pub fn not_terminating(replica: &Replica) -> bool {
    !replica.protection.terminating
}

pub fn not_critical(replica: &Replica) -> bool {
    !replica.protection.critical
        && replica
            .priority
            .map(|p| p < SYSTEM_CRITICAL_PRIORITY)
            .unwrap_or(true)
}

pub fn no_local_storage(replica: &Replica) -> bool {
    !replica.protection.local_storage
}

/// Protects replicas whose priority is at or above the threshold
#[derive(Debug, Clone, Copy)]
pub struct PriorityBelow(pub i32);

impl EligibilityPredicate for PriorityBelow {
    fn eligible(&self, replica: &Replica) -> bool {
        replica.priority.map(|p| p < self.0).unwrap_or(true)
    }
}

/// Protects every replica in the listed namespaces
#[derive(Debug, Clone)]
pub struct NamespaceExclusion {
    namespaces: BTreeSet<String>,
}

impl NamespaceExclusion {
    pub fn new(namespaces: impl IntoIterator<Item = String>) -> Self {
        Self {
            namespaces: namespaces.into_iter().collect(),
        }
    }
}

impl EligibilityPredicate for NamespaceExclusion {
    fn eligible(&self, replica: &Replica) -> bool {
        !self.namespaces.contains(replica.namespace())
    }
}

/// Minimum-available guard per controller
///
/// Each registered controller may lose at most the configured number of
/// replicas in one pass. Every positive answer consumes one unit, so a fresh
/// allowance must be built for each pass. Controllers that were never
/// registered are unrestricted.
#[derive(Debug, Default)]
pub struct DisruptionAllowance {
    remaining: DashMap<(String, String, String), u32>,
}

impl DisruptionAllowance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow `disruptions` evictions for the controller `namespace/kind/name`
    pub fn allow(
        self,
        namespace: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        disruptions: u32,
    ) -> Self {
        self.remaining
            .insert((namespace.into(), kind.into(), name.into()), disruptions);
        self
    }

    /// Remaining allowance for a controller, if registered
    pub fn remaining(&self, namespace: &str, kind: &str, name: &str) -> Option<u32> {
        self.remaining
            .get(&(namespace.to_string(), kind.to_string(), name.to_string()))
            .map(|r| *r)
    }
}

impl EligibilityPredicate for DisruptionAllowance {
    fn eligible(&self, replica: &Replica) -> bool {
        let Some(owner) = replica.controller() else {
            return true;
        };
        let key = (
            replica.namespace().to_string(),
            owner.kind.clone(),
            owner.name.clone(),
        );

        match self.remaining.get_mut(&key) {
            Some(mut left) if *left > 0 => {
                *left -= 1;
                true
            }
            Some(_) => false,
            None => true,
        }
    }
}
