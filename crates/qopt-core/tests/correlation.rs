//! Correlated-subquery detection over memo-resident plans.
//!
//! An Apply operator marks a subquery application: the first input is the
//! outer query, the second is the subquery. Detection must fire only when the
//! correlation columns are actually referenced inside the subquery side --
//! references in the outer input are ordinary column uses.

use qopt_core::memo::Memo;
use qopt_core::operator::{
    LogicalApply, LogicalOperator, LogicalScan, OperatorBase, OptExpression,
};
use qopt_core::scalar::{BinaryKind, ColumnRef, Datum, ScalarOperator};
use qopt_core::types::ScalarType;
use qopt_core::utils::contains_correlation_subquery;

fn col(id: u32, name: &str) -> ColumnRef {
    ColumnRef::new(id, name, ScalarType::Int)
}

fn scan(table: &str, column: ColumnRef, predicate: Option<ScalarOperator>) -> OptExpression {
    OptExpression::logical(
        LogicalOperator::Scan(LogicalScan {
            base: OperatorBase {
                predicate,
                ..OperatorBase::default()
            },
            table: table.into(),
            columns: vec![column],
            selected_index_id: 0,
            selected_partition_ids: vec![],
            selected_tablet_ids: vec![],
        }),
        vec![],
    )
}

fn apply(correlation: Vec<ColumnRef>, left: OptExpression, right: OptExpression) -> OptExpression {
    OptExpression::logical(
        LogicalOperator::Apply(LogicalApply {
            base: OperatorBase::default(),
            output: col(99, "apply_out"),
            correlation_column_refs: correlation,
        }),
        vec![left, right],
    )
}

fn references(column: &ColumnRef) -> ScalarOperator {
    ScalarOperator::binary(
        BinaryKind::Eq,
        ScalarOperator::column(column.clone()),
        ScalarOperator::constant(Datum::Int(1), ScalarType::Int),
    )
}

#[test]
fn correlation_in_the_subquery_input_is_detected() {
    let outer_col = col(1, "outer_key");
    let tree = apply(
        vec![outer_col.clone()],
        scan("outer_table", col(1, "outer_key"), None),
        scan("inner_table", col(2, "inner_key"), Some(references(&outer_col))),
    );

    let mut memo = Memo::new();
    let group = memo.insert(&tree);
    let apply_expr = memo.group(group).first_logical_expression().unwrap();
    assert!(contains_correlation_subquery(&memo, apply_expr));
}

#[test]
fn correlation_only_in_the_outer_input_is_not_detected() {
    let outer_col = col(1, "outer_key");
    let tree = apply(
        vec![outer_col.clone()],
        scan("outer_table", col(1, "outer_key"), Some(references(&outer_col))),
        scan("inner_table", col(2, "inner_key"), None),
    );

    let mut memo = Memo::new();
    let group = memo.insert(&tree);
    let apply_expr = memo.group(group).first_logical_expression().unwrap();
    assert!(!contains_correlation_subquery(&memo, apply_expr));
}

#[test]
fn empty_correlation_set_never_matches() {
    let outer_col = col(1, "outer_key");
    let tree = apply(
        vec![],
        scan("outer_table", col(1, "outer_key"), None),
        scan("inner_table", col(2, "inner_key"), Some(references(&outer_col))),
    );

    let mut memo = Memo::new();
    let group = memo.insert(&tree);
    let apply_expr = memo.group(group).first_logical_expression().unwrap();
    assert!(!contains_correlation_subquery(&memo, apply_expr));
}

#[test]
fn non_apply_operators_never_match() {
    let mut memo = Memo::new();
    let group = memo.insert(&scan("t", col(1, "a"), None));
    let expr = memo.group(group).first_logical_expression().unwrap();
    assert!(!contains_correlation_subquery(&memo, expr));
}

#[test]
fn correlation_is_found_through_nested_subquery_operators() {
    // The reference sits below a join inside the subquery input.
    use qopt_core::operator::{JoinType, LogicalJoin};
    let outer_col = col(1, "outer_key");
    let inner_join = OptExpression::logical(
        LogicalOperator::Join(LogicalJoin {
            base: OperatorBase::default(),
            join_type: JoinType::Inner,
            on_predicate: None,
        }),
        vec![
            scan("inner_a", col(2, "x"), None),
            scan("inner_b", col(3, "y"), Some(references(&outer_col))),
        ],
    );
    let tree = apply(
        vec![outer_col],
        scan("outer_table", col(1, "outer_key"), None),
        inner_join,
    );

    let mut memo = Memo::new();
    let group = memo.insert(&tree);
    let apply_expr = memo.group(group).first_logical_expression().unwrap();
    assert!(contains_correlation_subquery(&memo, apply_expr));
}
