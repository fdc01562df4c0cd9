//! # Predicate-to-Scan Pushdown
//!
//! A Filter directly over a Scan is folded away: the filter's conjuncts join
//! the scan's existing predicate (if any) and the combined predicate is
//! rebuilt as one balanced conjunction on the scan. Reducing rows at the scan
//! is the single most effective rewrite in the catalog -- every operator above
//! sees less data.
//!
//! The memo keeps the original Filter-over-Scan expression as an alternative;
//! implementation only picks the folded form up because the Filter operator
//! itself has no physical counterpart.

use qopt_core::context::OptimizerContext;
use qopt_core::error::OptError;
use qopt_core::memo::Memo;
use qopt_core::operator::{LogicalOperator, Operator, OperatorKind, OptExpression};
use qopt_core::pattern::Pattern;
use qopt_core::rule::{Rule, RuleType};
use qopt_core::utils::{compound_and, extract_conjuncts};

pub struct PushPredicateToScanRule;

impl Rule for PushPredicateToScanRule {
    fn name(&self) -> &'static str {
        "PushPredicateToScan"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::TfPushPredicateToScan
    }

    fn pattern(&self) -> Pattern {
        Pattern::new(OperatorKind::LogicalFilter)
            .with_children(vec![Pattern::new(OperatorKind::LogicalScan)])
    }

    fn transform(
        &self,
        input: &OptExpression,
        _memo: &Memo,
        _ctx: &OptimizerContext,
    ) -> Result<Vec<OptExpression>, OptError> {
        let Operator::Logical(LogicalOperator::Filter(filter)) = input.op() else {
            return Ok(vec![]);
        };
        let Operator::Logical(scan_op @ LogicalOperator::Scan(scan)) = input.input_at(0).op()
        else {
            return Ok(vec![]);
        };

        // Decompose both predicates into conjuncts and rebuild one balanced
        // conjunction over all of them.
        let mut conjuncts = extract_conjuncts(filter.base.predicate.as_ref());
        conjuncts.extend(extract_conjuncts(scan.base.predicate.as_ref()));
        let merged = compound_and(conjuncts);

        let pushed = scan_op.with_predicate(merged);
        Ok(vec![OptExpression::logical(
            pushed,
            input.input_at(0).inputs().to_vec(),
        )])
    }
}
