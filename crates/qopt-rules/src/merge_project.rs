//! # Project-Merge Rule
//!
//! A standalone Project over any child is either redundant or foldable:
//!
//! - An **empty column map** is pure passthrough; the Project is replaced by
//!   its child outright.
//! - A map whose **output column set equals the child's** computes nothing new;
//!   the Project is elided and the child stands in for it.
//! - Otherwise the projection is **fused into the child** as its attached
//!   projection, so the child produces the projected columns directly and the
//!   separate operator disappears.
//!
//! The fused child keeps its own limit unless the eliminated Project carried
//! one -- a limit on the Project is at least as tight as whatever the child
//! would produce.
//!
//! This is the canonical transformation-rule shape: a structural precondition
//! (the pattern), a semantic precondition (the column-set comparison), and an
//! immutable rewrite through a structural update.

use qopt_core::context::OptimizerContext;
use qopt_core::error::OptError;
use qopt_core::memo::Memo;
use qopt_core::operator::{
    LogicalOperator, Operator, OperatorKind, OptExpression, Projection,
};
use qopt_core::pattern::Pattern;
use qopt_core::rule::{Rule, RuleType};
use qopt_core::scalar::ColumnRefSet;

pub struct MergeProjectWithChildRule;

impl Rule for MergeProjectWithChildRule {
    fn name(&self) -> &'static str {
        "MergeProjectWithChild"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::TfMergeProjectWithChild
    }

    fn pattern(&self) -> Pattern {
        Pattern::new(OperatorKind::LogicalProject)
            .with_children(vec![Pattern::leaf_with_inputs()])
    }

    fn transform(
        &self,
        input: &OptExpression,
        memo: &Memo,
        _ctx: &OptimizerContext,
    ) -> Result<Vec<OptExpression>, OptError> {
        let Operator::Logical(LogicalOperator::Project(project)) = input.op() else {
            return Ok(vec![]);
        };

        // Pure passthrough: nothing is projected, the child replaces the node.
        if project.column_refs.is_empty() {
            return Ok(vec![input.input_at(0).clone()]);
        }

        let child_expr = input.input_at(0);
        let Operator::Logical(child) = child_expr.op() else {
            return Ok(vec![]);
        };

        let project_columns: ColumnRefSet = project.column_refs.keys().collect();
        let child_columns = child_expr.derive_output_columns(memo);
        // No-op projection: identical output column set, elide the Project.
        if project_columns == child_columns {
            return Ok(vec![child_expr.clone()]);
        }

        // Fuse the projection into the child; the Project's limit wins when set.
        let mut merged =
            child.with_projection(Some(Projection::new(project.column_refs.clone())));
        if project.base.limit.is_some() {
            merged = merged.with_limit(project.base.limit);
        }

        Ok(vec![OptExpression::logical(
            merged,
            child_expr.inputs().to_vec(),
        )])
    }
}
