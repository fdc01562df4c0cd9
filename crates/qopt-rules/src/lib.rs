//! # Built-in Optimization Rules
//!
//! The default rule set for the search engine, in two categories:
//!
//! ## Transformation Rules (logical -> logical)
//!
//! - **`MergeProjectWithChildRule`**: folds a standalone Project into its child
//!   as an attached projection, or elides it entirely when it is a no-op.
//! - **`PushPredicateToScanRule`**: merges a Filter's conjuncts into its Scan
//!   child's predicate so data is reduced at the source.
//!
//! ## Implementation Rules (logical -> physical)
//!
//! - **`ImplScanRule`**, **`ImplProjectRule`**, **`ImplHashAggregateRule`**:
//!   direct field-for-field mappings to the physical operators.
//! - **`ImplHashJoinRule`**: produces the distribution alternatives for a join
//!   (broadcast, shuffle, replicated), injecting the exchange enforcers itself.
//! - **`ImplCteProduceRule`** / **`ImplCteConsumeRule`**: physical CTE
//!   materialization points and reference sites, linked by CTE id.

pub mod impl_agg;
pub mod impl_cte;
pub mod impl_join;
pub mod impl_project;
pub mod impl_scan;
pub mod merge_project;
pub mod push_predicate;

use qopt_core::rule::RuleRegistry;

/// The standard rule configuration for the optimizer.
pub fn default_rule_registry() -> RuleRegistry {
    let mut registry = RuleRegistry::new();

    // Transformation rules: expand the logical search space.
    registry.add_rule(Box::new(merge_project::MergeProjectWithChildRule));
    registry.add_rule(Box::new(push_predicate::PushPredicateToScanRule));

    // Implementation rules: map logical operators to physical alternatives.
    registry.add_rule(Box::new(impl_scan::ImplScanRule));
    registry.add_rule(Box::new(impl_project::ImplProjectRule));
    registry.add_rule(Box::new(impl_join::ImplHashJoinRule));
    registry.add_rule(Box::new(impl_agg::ImplHashAggregateRule));
    registry.add_rule(Box::new(impl_cte::ImplCteProduceRule));
    registry.add_rule(Box::new(impl_cte::ImplCteConsumeRule));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_registry_has_both_rule_kinds() {
        let registry = default_rule_registry();
        assert_eq!(registry.transformation_rules().len(), 2);
        assert_eq!(registry.implementation_rules().len(), 6);
    }
}
