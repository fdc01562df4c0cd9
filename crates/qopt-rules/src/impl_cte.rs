//! # CTE Implementation Rules
//!
//! A CTE producer materializes a shared subplan once; each consumer reads it
//! through the shared `CteId`. The link is the id alone -- consumers never
//! hold a reference to the producer's plan, which is what lets any number of
//! consumers share one producer group in the memo.
//!
//! A consumer whose producer was never registered is a malformed input: the
//! analyzer guarantees producers accompany their consumers, so the rule aborts
//! the request rather than planning a read of nothing.

use qopt_core::context::OptimizerContext;
use qopt_core::error::OptError;
use qopt_core::memo::Memo;
use qopt_core::operator::{
    LogicalOperator, Operator, OperatorKind, OptExpression, PhysicalCteConsume,
    PhysicalCteProduce, PhysicalOperator,
};
use qopt_core::pattern::Pattern;
use qopt_core::rule::{Rule, RuleType};

pub struct ImplCteProduceRule;

impl Rule for ImplCteProduceRule {
    fn name(&self) -> &'static str {
        "ImplCteProduce"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::ImpCteProduce
    }

    fn pattern(&self) -> Pattern {
        Pattern::new(OperatorKind::LogicalCteProduce).with_children(vec![Pattern::leaf()])
    }

    fn transform(
        &self,
        input: &OptExpression,
        _memo: &Memo,
        _ctx: &OptimizerContext,
    ) -> Result<Vec<OptExpression>, OptError> {
        let Operator::Logical(LogicalOperator::CteProduce(produce)) = input.op() else {
            return Ok(vec![]);
        };

        Ok(vec![OptExpression::physical(
            PhysicalOperator::CteProduce(PhysicalCteProduce {
                base: produce.base.clone(),
                cte_id: produce.cte_id,
            }),
            vec![input.input_at(0).clone()],
        )])
    }
}

pub struct ImplCteConsumeRule;

impl Rule for ImplCteConsumeRule {
    fn name(&self) -> &'static str {
        "ImplCteConsume"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::ImpCteConsume
    }

    fn pattern(&self) -> Pattern {
        Pattern::new(OperatorKind::LogicalCteConsume).with_children(vec![Pattern::multi_leaf()])
    }

    fn transform(
        &self,
        input: &OptExpression,
        _memo: &Memo,
        ctx: &OptimizerContext,
    ) -> Result<Vec<OptExpression>, OptError> {
        let Operator::Logical(LogicalOperator::CteConsume(consume)) = input.op() else {
            return Ok(vec![]);
        };

        if !ctx.cte.has_producer(consume.cte_id) {
            return Err(OptError::InvalidPlan(format!(
                "CTE consumer references unknown producer {}",
                consume.cte_id
            )));
        }

        Ok(vec![OptExpression::physical(
            PhysicalOperator::CteConsume(PhysicalCteConsume {
                base: consume.base.clone(),
                cte_id: consume.cte_id,
                cte_output_column_ref_map: consume.cte_output_column_ref_map.clone(),
            }),
            input.inputs().to_vec(),
        )])
    }
}
