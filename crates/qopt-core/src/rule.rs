//! # Rule System
//!
//! Rules drive the search. Two kinds exist:
//!
//! - **Transformation rules** (`Tf*`) rewrite a logical expression into
//!   equivalent logical alternatives, expanding the search space.
//! - **Implementation rules** (`Imp*`) map a logical expression to one or more
//!   physical alternatives for the cost model to score.
//!
//! Each rule is identified by its [`RuleType`] tag. The tag doubles as a bit
//! position in the per-expression applied-rule mask, which guarantees a rule
//! fires at most once per expression -- the termination argument for the
//! exploration loop.
//!
//! A rule's `transform` must be total and side-effect-free over its input. A
//! returned error is search-fatal: the engine aborts the optimization request
//! rather than continuing with a partially-rewritten search space.

use crate::context::OptimizerContext;
use crate::error::OptError;
use crate::memo::Memo;
use crate::operator::OptExpression;
use crate::pattern::Pattern;

/// Identity tag of a rule. The discriminant is the rule's bit position in the
/// applied-rule mask, so the set of rules is bounded by the mask width (64).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum RuleType {
    // Transformation rules.
    TfMergeProjectWithChild,
    TfPushPredicateToScan,
    // Implementation rules.
    ImpScan,
    ImpProject,
    ImpHashJoin,
    ImpHashAggregate,
    ImpCteProduce,
    ImpCteConsume,
}

impl RuleType {
    pub fn bit(&self) -> u64 {
        1u64 << (*self as u8)
    }

    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            RuleType::TfMergeProjectWithChild | RuleType::TfPushPredicateToScan
        )
    }

    pub fn is_implementation(&self) -> bool {
        !self.is_transformation()
    }
}

/// A transformation or implementation rule.
pub trait Rule: Send + Sync {
    fn name(&self) -> &'static str;

    fn rule_type(&self) -> RuleType;

    /// Structural precondition checked before `transform` is invoked.
    fn pattern(&self) -> Pattern;

    /// Rewrite a bound expression into zero or more replacements. Children of
    /// the returned trees may be [`OptExpression::Group`] references to reuse
    /// existing groups. Errors abort the optimization request.
    fn transform(
        &self,
        input: &OptExpression,
        memo: &Memo,
        ctx: &OptimizerContext,
    ) -> Result<Vec<OptExpression>, OptError>;
}

/// A named collection of rules.
pub struct RuleSet {
    pub name: String,
    pub rules: Vec<Box<dyn Rule>>,
}

/// Registry of all rules active for an optimization request.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    pub fn add_rule_set(&mut self, rule_set: RuleSet) {
        self.rules.extend(rule_set.rules);
    }

    pub fn transformation_rules(&self) -> Vec<&dyn Rule> {
        self.rules
            .iter()
            .map(|r| r.as_ref())
            .filter(|r| r.rule_type().is_transformation())
            .collect()
    }

    pub fn implementation_rules(&self) -> Vec<&dyn Rule> {
        self.rules
            .iter()
            .map(|r| r.as_ref())
            .filter(|r| r.rule_type().is_implementation())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_bits_are_distinct() {
        let all = [
            RuleType::TfMergeProjectWithChild,
            RuleType::TfPushPredicateToScan,
            RuleType::ImpScan,
            RuleType::ImpProject,
            RuleType::ImpHashJoin,
            RuleType::ImpHashAggregate,
            RuleType::ImpCteProduce,
            RuleType::ImpCteConsume,
        ];
        let mut mask = 0u64;
        for t in all {
            assert_eq!(mask & t.bit(), 0);
            mask |= t.bit();
        }
    }

    #[test]
    fn transformation_and_implementation_partition() {
        assert!(RuleType::TfMergeProjectWithChild.is_transformation());
        assert!(!RuleType::TfMergeProjectWithChild.is_implementation());
        assert!(RuleType::ImpHashJoin.is_implementation());
    }
}
