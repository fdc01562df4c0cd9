//! # Project Implementation Rule
//!
//! Maps a logical Project to its physical counterpart. Most Projects are folded
//! into their children by the merge rule before this fires; the physical
//! operator exists for the residue (e.g. expressions over a join's output that
//! no child can absorb).

use qopt_core::context::OptimizerContext;
use qopt_core::error::OptError;
use qopt_core::memo::Memo;
use qopt_core::operator::{
    LogicalOperator, Operator, OperatorKind, OptExpression, PhysicalOperator, PhysicalProject,
};
use qopt_core::pattern::Pattern;
use qopt_core::rule::{Rule, RuleType};

pub struct ImplProjectRule;

impl Rule for ImplProjectRule {
    fn name(&self) -> &'static str {
        "ImplProject"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::ImpProject
    }

    fn pattern(&self) -> Pattern {
        Pattern::new(OperatorKind::LogicalProject).with_children(vec![Pattern::leaf()])
    }

    fn transform(
        &self,
        input: &OptExpression,
        _memo: &Memo,
        _ctx: &OptimizerContext,
    ) -> Result<Vec<OptExpression>, OptError> {
        let Operator::Logical(LogicalOperator::Project(project)) = input.op() else {
            return Ok(vec![]);
        };

        Ok(vec![OptExpression::physical(
            PhysicalOperator::Project(PhysicalProject {
                base: project.base.clone(),
                column_refs: project.column_refs.clone(),
            }),
            vec![input.input_at(0).clone()],
        )])
    }
}
