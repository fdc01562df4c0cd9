//! # Cost Model
//!
//! The cost model is an external collaborator behind the [`CostModel`] trait.
//! The engine only ever *compares* costs -- a plan's cost has no unit and no
//! meaning beyond "lower wins among alternatives in the same group".
//!
//! The [`DefaultCostModel`] collapses CPU, memory, and network into one weighted
//! total. Network carries the heaviest default weight: in a distributed engine
//! the exchanges dominate, and the broadcast-vs-shuffle decision is exactly a
//! comparison of network volumes (broadcast ships one side `backend_count`
//! times; shuffle ships each side once).

use crate::distribution::DistributionSpec;
use crate::operator::PhysicalOperator;
use serde::{Deserialize, Serialize};

/// A single comparable cost value. `f64::MAX` stands for "infeasible".
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Cost {
    pub total: f64,
}

impl Cost {
    pub fn zero() -> Self {
        Self { total: 0.0 }
    }

    pub fn new(total: f64) -> Self {
        Self { total }
    }

    pub fn infinite() -> Self {
        Self { total: f64::MAX }
    }

    pub fn is_infinite(&self) -> bool {
        self.total == f64::MAX
    }
}

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        (self.total - other.total).abs() < f64::EPSILON
    }
}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        self.total.partial_cmp(&other.total)
    }
}

/// Pluggable cost model.
pub trait CostModel: Send + Sync {
    /// Cost of `op` given its inputs' estimated row counts and already-costed
    /// children, on a cluster of `backend_count` nodes. Includes the
    /// children's accumulated costs.
    fn compute_cost(
        &self,
        op: &PhysicalOperator,
        input_rows: &[f64],
        children_costs: &[Cost],
        backend_count: usize,
    ) -> Cost;
}

/// Default weighted cost model.
pub struct DefaultCostModel {
    pub cpu_weight: f64,
    pub memory_weight: f64,
    pub network_weight: f64,
}

impl Default for DefaultCostModel {
    fn default() -> Self {
        Self {
            cpu_weight: 1.0,
            memory_weight: 1.0,
            network_weight: 10.0,
        }
    }
}

impl CostModel for DefaultCostModel {
    fn compute_cost(
        &self,
        op: &PhysicalOperator,
        input_rows: &[f64],
        children_costs: &[Cost],
        backend_count: usize,
    ) -> Cost {
        let children_total: f64 = children_costs.iter().map(|c| c.total).sum();
        let first = input_rows.first().copied().unwrap_or(1.0);

        let local = match op {
            PhysicalOperator::Scan(_) => self.cpu_weight * first,
            PhysicalOperator::Project(_) => self.cpu_weight * first,
            // Build a hash table on the right input, probe with the left.
            PhysicalOperator::HashJoin(_) => {
                let probe = input_rows.first().copied().unwrap_or(1.0);
                let build = input_rows.get(1).copied().unwrap_or(1.0);
                self.cpu_weight * (probe + build) + self.memory_weight * build
            }
            PhysicalOperator::HashAggregate(_) => {
                self.cpu_weight * first + self.memory_weight * first
            }
            PhysicalOperator::Distribution(dist) => {
                let copies = match &dist.spec {
                    DistributionSpec::Broadcast => backend_count.max(1) as f64,
                    _ => 1.0,
                };
                self.network_weight * first * copies
            }
            PhysicalOperator::CteProduce(_) => self.memory_weight * first,
            PhysicalOperator::CteConsume(_) => self.cpu_weight * first,
        };

        Cost::new(children_total + local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{OperatorBase, PhysicalDistribution};

    #[test]
    fn broadcast_exchange_scales_with_cluster_size() {
        let model = DefaultCostModel::default();
        let broadcast = PhysicalOperator::Distribution(PhysicalDistribution {
            base: OperatorBase::default(),
            spec: DistributionSpec::Broadcast,
        });
        let shuffle = PhysicalOperator::Distribution(PhysicalDistribution {
            base: OperatorBase::default(),
            spec: DistributionSpec::Shuffle(vec![]),
        });

        let b = model.compute_cost(&broadcast, &[1000.0], &[Cost::zero()], 8);
        let s = model.compute_cost(&shuffle, &[1000.0], &[Cost::zero()], 8);
        assert!(b.total > s.total);
        assert_eq!(b.total, 8.0 * s.total);
    }

    #[test]
    fn infeasible_plans_never_win() {
        assert!(Cost::new(1e18) < Cost::infinite());
        assert!(Cost::infinite().is_infinite());
    }
}
