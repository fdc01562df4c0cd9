//! # Scan Implementation Rule
//!
//! Maps a logical Scan to the physical scan operator. The analyzer's pruning
//! results (index/partition/tablet selections) have served their purpose by
//! implementation time -- the distribution decision consumed them -- so the
//! physical operator carries only what execution needs: the table, the output
//! columns, and the common fields (pushed-down predicate, projection, limit).

use qopt_core::context::OptimizerContext;
use qopt_core::error::OptError;
use qopt_core::memo::Memo;
use qopt_core::operator::{
    LogicalOperator, Operator, OperatorKind, OptExpression, PhysicalOperator, PhysicalScan,
};
use qopt_core::pattern::Pattern;
use qopt_core::rule::{Rule, RuleType};

pub struct ImplScanRule;

impl Rule for ImplScanRule {
    fn name(&self) -> &'static str {
        "ImplScan"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::ImpScan
    }

    fn pattern(&self) -> Pattern {
        Pattern::new(OperatorKind::LogicalScan)
    }

    fn transform(
        &self,
        input: &OptExpression,
        _memo: &Memo,
        _ctx: &OptimizerContext,
    ) -> Result<Vec<OptExpression>, OptError> {
        let Operator::Logical(LogicalOperator::Scan(scan)) = input.op() else {
            return Ok(vec![]);
        };

        Ok(vec![OptExpression::physical(
            PhysicalOperator::Scan(PhysicalScan {
                base: scan.base.clone(),
                table: scan.table.clone(),
                columns: scan.columns.clone(),
            }),
            vec![],
        )])
    }
}
