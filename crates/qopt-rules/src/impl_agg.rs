//! # Aggregate Implementation Rule
//!
//! Maps a logical Aggregate to a one-phase hash aggregate. The two-phase
//! (local/global) split belongs to the wider rule catalog together with the
//! aggregate's distribution requirement; a single-phase hash aggregate is the
//! universally-applicable baseline the cost model can always fall back to.

use qopt_core::context::OptimizerContext;
use qopt_core::error::OptError;
use qopt_core::memo::Memo;
use qopt_core::operator::{
    LogicalOperator, Operator, OperatorKind, OptExpression, PhysicalHashAggregate,
    PhysicalOperator,
};
use qopt_core::pattern::Pattern;
use qopt_core::rule::{Rule, RuleType};

pub struct ImplHashAggregateRule;

impl Rule for ImplHashAggregateRule {
    fn name(&self) -> &'static str {
        "ImplHashAggregate"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::ImpHashAggregate
    }

    fn pattern(&self) -> Pattern {
        Pattern::new(OperatorKind::LogicalAggregate).with_children(vec![Pattern::leaf()])
    }

    fn transform(
        &self,
        input: &OptExpression,
        _memo: &Memo,
        _ctx: &OptimizerContext,
    ) -> Result<Vec<OptExpression>, OptError> {
        let Operator::Logical(LogicalOperator::Aggregate(agg)) = input.op() else {
            return Ok(vec![]);
        };

        Ok(vec![OptExpression::physical(
            PhysicalOperator::HashAggregate(PhysicalHashAggregate {
                base: agg.base.clone(),
                group_by: agg.group_by.clone(),
                aggregations: agg.aggregations.clone(),
            }),
            vec![input.input_at(0).clone()],
        )])
    }
}
