//! # Scalar Expression Utilities
//!
//! Free functions over scalar operator trees and plan trees that rules and
//! heuristics share: predicate decomposition and recomposition, column
//! reference walks, safe constant casting, correlation detection, and the
//! helpers that size join-reordering work.
//!
//! All of these are pure: they allocate their results and never touch shared
//! state, so a rule can call them any number of times with the same inputs.

use crate::context::OptimizerContext;
use crate::memo::{ExprId, GroupId, Memo};
use crate::operator::{LogicalOperator, LogicalScan, Operator, OptExpression};
use crate::scalar::{ColumnRef, CompoundKind, Datum, ScalarOperator};
use crate::types::ScalarType;
use chrono::{NaiveDate, NaiveDateTime};
use std::collections::VecDeque;

/// Flatten a predicate along AND boundaries into its conjuncts.
///
/// A non-compound root, or a compound using a different connective (OR, NOT),
/// is a single conjunct and comes back unchanged. `None` yields an empty list.
pub fn extract_conjuncts(root: Option<&ScalarOperator>) -> Vec<ScalarOperator> {
    extract_compound(root, CompoundKind::And)
}

/// Flatten a predicate along OR boundaries into its disjuncts.
pub fn extract_disjuncts(root: Option<&ScalarOperator>) -> Vec<ScalarOperator> {
    extract_compound(root, CompoundKind::Or)
}

fn extract_compound(root: Option<&ScalarOperator>, wanted: CompoundKind) -> Vec<ScalarOperator> {
    let Some(root) = root else {
        return Vec::new();
    };
    match root {
        ScalarOperator::CompoundPredicate { kind, children } if *kind == wanted => {
            let mut list = extract_compound(Some(&children[0]), wanted);
            list.extend(extract_compound(Some(&children[1]), wanted));
            list
        }
        other => vec![other.clone()],
    }
}

/// Combine predicates with AND. See [`compound_or`] for the tree shape.
pub fn compound_and<I, T>(nodes: I) -> Option<ScalarOperator>
where
    I: IntoIterator<Item = T>,
    T: Into<Option<ScalarOperator>>,
{
    create_compound(CompoundKind::And, nodes)
}

/// Combine predicates with OR.
pub fn compound_or<I, T>(nodes: I) -> Option<ScalarOperator>
where
    I: IntoIterator<Item = T>,
    T: Into<Option<ScalarOperator>>,
{
    create_compound(CompoundKind::Or, nodes)
}

// Build the compound tree bottom-up, combining pairs per level so the result
// is balanced (depth O(log n)) instead of a leaning chain:
//
//   a b c d e
//    ->  (a b) (c d) e
//    ->  ((a b) (c d)) e
//    ->  (((a b) (c d)) e)
//
// An odd leftover element is carried to the next level unmodified. Absent
// predicates are filtered out; no surviving element yields no predicate, a
// single survivor is returned without a wrapping node.
fn create_compound<I, T>(kind: CompoundKind, nodes: I) -> Option<ScalarOperator>
where
    I: IntoIterator<Item = T>,
    T: Into<Option<ScalarOperator>>,
{
    let mut level: VecDeque<ScalarOperator> =
        nodes.into_iter().filter_map(Into::into).collect();

    while level.len() > 1 {
        let mut next = VecDeque::with_capacity(level.len() / 2 + 1);
        while level.len() >= 2 {
            let left = level.pop_front().unwrap();
            let right = level.pop_front().unwrap();
            next.push_back(ScalarOperator::CompoundPredicate {
                kind,
                children: vec![left, right],
            });
        }
        if let Some(last) = level.pop_front() {
            next.push_back(last);
        }
        level = next;
    }
    level.pop_front()
}

/// All column references under `root` in encounter order, duplicates included.
/// Empty when `root` is absent or contains no variables.
pub fn extract_column_refs(root: Option<&ScalarOperator>) -> Vec<ColumnRef> {
    let mut out = Vec::new();
    collect_column_refs(root, &mut out);
    out
}

fn collect_column_refs(root: Option<&ScalarOperator>, out: &mut Vec<ColumnRef>) {
    let Some(root) = root else {
        return;
    };
    if !root.is_variable() {
        return;
    }
    if let ScalarOperator::ColumnRef(c) = root {
        out.push(c.clone());
        return;
    }
    root.for_each_child(|child| collect_column_refs(Some(child), out));
}

/// Number of column-reference leaves under `root`.
pub fn count_column_refs(root: Option<&ScalarOperator>) -> usize {
    let Some(root) = root else {
        return 0;
    };
    if !root.is_variable() {
        return 0;
    }
    if root.is_column_ref() {
        return 1;
    }
    let mut count = 0;
    root.for_each_child(|child| count += count_column_refs(Some(child)));
    count
}

/// Short-circuiting search: does `operator` reference any of `refs`?
pub fn contain_any_column_refs(refs: &[ColumnRef], operator: Option<&ScalarOperator>) -> bool {
    let Some(operator) = operator else {
        return false;
    };
    if refs.is_empty() {
        return false;
    }
    if let Some(c) = operator.as_column_ref() {
        return refs.contains(c);
    }
    let mut found = false;
    operator.for_each_child(|child| {
        found = found || contain_any_column_refs(refs, Some(child));
    });
    found
}

/// Short-circuiting search by column name, case-insensitively.
pub fn contain_column_ref(operator: Option<&ScalarOperator>, column: &str) -> bool {
    let Some(operator) = operator else {
        return false;
    };
    if let Some(c) = operator.as_column_ref() {
        return c.name.eq_ignore_ascii_case(column);
    }
    let mut found = false;
    operator.for_each_child(|child| {
        found = found || contain_column_ref(Some(child), column);
    });
    found
}

pub fn is_inner_or_cross_join(operator: &Operator) -> bool {
    matches!(
        operator,
        Operator::Logical(LogicalOperator::Join(join)) if join.join_type.is_inner_or_cross()
    )
}

/// Size of the largest contiguous run of inner/cross joins reachable from
/// `root` while only crossing further inner/cross joins. Non-join nodes cut
/// the run; below them the result is the maximum over the subtrees. Used to
/// bound join-reordering search effort before committing to it.
pub fn count_inner_join_node_size(root: &OptExpression) -> usize {
    let OptExpression::Operator { op, inputs } = root else {
        return 0;
    };
    let inner = is_inner_or_cross_join(op);
    let mut count = 0;
    for child in inputs {
        if inner {
            count += count_inner_join_node_size(child);
        } else {
            count = count.max(count_inner_join_node_size(child));
        }
    }
    if inner {
        count += 1;
    }
    count
}

/// The column with the smallest storage slot among `columns`.
///
/// # Panics
/// Panics on an empty slice -- callers are expected to have at least one
/// candidate column, and silently inventing one would hide the caller's bug.
pub fn find_smallest_column_ref(columns: &[ColumnRef]) -> &ColumnRef {
    assert!(
        !columns.is_empty(),
        "find_smallest_column_ref requires at least one column"
    );
    let mut smallest = &columns[0];
    let mut smallest_size = usize::MAX;
    for column in columns {
        if column.ty.is_scalar() {
            let size = column.ty.slot_size();
            if size < smallest_size {
                smallest = column;
                smallest_size = size;
            }
        }
    }
    smallest
}

/// Try to cast a constant to `target`, verifying the cast is lossless.
///
/// Returns `None` -- never an error -- when `op` is not a constant, the types
/// already match, either side is a floating type (comparisons after a float
/// cast are unreliable), or the cast fails or loses information. Losslessness
/// is checked by rendering both sides as literal text; date targets also accept
/// a match against the date's separator-stripped rendering, so the integer
/// literal `20230101` casts to `2023-01-01` while `5` does not.
pub fn try_cast_constant(op: &ScalarOperator, target: ScalarType) -> Option<ScalarOperator> {
    let (value, source_ty) = op.as_constant()?;
    if source_ty.matches(target) || source_ty.is_floating() || target.is_floating() {
        return None;
    }

    if value.is_null() {
        return Some(ScalarOperator::constant(Datum::Null, target));
    }

    let result = cast_datum(value, target)?;
    let original = value.to_string();
    let casted = result.to_string();
    if casted.eq_ignore_ascii_case(&original) {
        return Some(ScalarOperator::constant(result, target));
    }
    if target.is_date() && (source_ty.is_integer() || source_ty.is_string()) {
        // Date rendering uses `-` separators only; stripping them recovers the
        // digit-string form an integer or compact string literal would have.
        if original.eq_ignore_ascii_case(&casted.replace('-', "")) {
            return Some(ScalarOperator::constant(result, target));
        }
    }
    None
}

fn datum_as_i64(value: &Datum) -> Option<i64> {
    match value {
        Datum::TinyInt(v) => Some(*v as i64),
        Datum::Int(v) => Some(*v as i64),
        Datum::BigInt(v) => Some(*v),
        Datum::Boolean(v) => Some(*v as i64),
        _ => None,
    }
}

/// Best-effort conversion of a non-null datum to `target`. Any failure is
/// `None`; this never panics.
fn cast_datum(value: &Datum, target: ScalarType) -> Option<Datum> {
    match target {
        ScalarType::Boolean => match value {
            Datum::Varchar(s) if s.eq_ignore_ascii_case("true") => Some(Datum::Boolean(true)),
            Datum::Varchar(s) if s.eq_ignore_ascii_case("false") => Some(Datum::Boolean(false)),
            _ => match datum_as_i64(value)? {
                0 => Some(Datum::Boolean(false)),
                1 => Some(Datum::Boolean(true)),
                _ => None,
            },
        },
        ScalarType::TinyInt => match value {
            Datum::Varchar(s) => s.trim().parse::<i8>().ok().map(Datum::TinyInt),
            _ => i8::try_from(datum_as_i64(value)?).ok().map(Datum::TinyInt),
        },
        ScalarType::Int => match value {
            Datum::Varchar(s) => s.trim().parse::<i32>().ok().map(Datum::Int),
            _ => i32::try_from(datum_as_i64(value)?).ok().map(Datum::Int),
        },
        ScalarType::BigInt => match value {
            Datum::Varchar(s) => s.trim().parse::<i64>().ok().map(Datum::BigInt),
            _ => datum_as_i64(value).map(Datum::BigInt),
        },
        ScalarType::Varchar => Some(Datum::Varchar(value.to_string())),
        ScalarType::Date => {
            let text = value.to_string();
            NaiveDate::parse_from_str(&text, "%Y-%m-%d")
                .or_else(|_| NaiveDate::parse_from_str(&text, "%Y%m%d"))
                .ok()
                .map(Datum::Date)
        }
        ScalarType::Datetime => match value {
            Datum::Date(d) => d.and_hms_opt(0, 0, 0).map(Datum::Datetime),
            Datum::Varchar(s) => NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                .ok()
                .map(Datum::Datetime),
            _ => None,
        },
        // Floating targets are rejected before we get here.
        ScalarType::Float | ScalarType::Double => None,
    }
}

/// Collect every scan operator reachable from `group` through each group's
/// first logical expression.
pub fn extract_scan_operators(memo: &Memo, group: GroupId, out: &mut Vec<LogicalScan>) {
    let Some(expr_id) = memo.group(group).first_logical_expression() else {
        return;
    };
    if let Operator::Logical(LogicalOperator::Scan(scan)) = &memo.expr(expr_id).op {
        out.push(scan.clone());
        return;
    }
    for child in memo.inputs_of(expr_id) {
        extract_scan_operators(memo, child, out);
    }
}

/// Whether any scan below `group` reads a column the statistics collaborator
/// has no estimate for. When this is true, cost-based decisions over this
/// subtree cannot be trusted and heuristics fall back to conservative choices.
pub fn has_unknown_column_stats(memo: &Memo, group: GroupId, ctx: &OptimizerContext) -> bool {
    let Some(expr_id) = memo.group(group).first_logical_expression() else {
        return true;
    };
    let expr = memo.expr(expr_id);
    if let Operator::Logical(LogicalOperator::Scan(scan)) = &expr.op {
        let names: Vec<String> = scan.columns.iter().map(|c| c.name.clone()).collect();
        return ctx
            .statistics()
            .get_column_statistics(&scan.table, &names)
            .iter()
            .any(|s| s.is_unknown());
    }
    memo.inputs_of(expr_id)
        .into_iter()
        .any(|g| has_unknown_column_stats(memo, g, ctx))
}

/// True iff `expr_id` is a subquery application whose correlation columns are
/// referenced inside the subquery (second) input. The outer (first) input is
/// deliberately not inspected: correlation flows from the outer query into the
/// subquery, so references on the left are ordinary column uses.
pub fn contains_correlation_subquery(memo: &Memo, expr_id: ExprId) -> bool {
    let expr = memo.expr(expr_id);
    let Operator::Logical(LogicalOperator::Apply(apply)) = &expr.op else {
        return false;
    };
    if apply.correlation_column_refs.is_empty() {
        return false;
    }
    let inputs = memo.inputs_of(expr_id);
    let Some(right) = inputs.get(1) else {
        return false;
    };
    let Some(right_expr) = memo.group(*right).first_logical_expression() else {
        return false;
    };
    subtree_predicates_contain(memo, &apply.correlation_column_refs, right_expr)
}

fn subtree_predicates_contain(memo: &Memo, refs: &[ColumnRef], expr_id: ExprId) -> bool {
    let expr = memo.expr(expr_id);
    if contain_any_column_refs(refs, expr.op.predicate()) {
        return true;
    }
    memo.inputs_of(expr_id).into_iter().any(|g| {
        memo.group(g)
            .first_logical_expression()
            .is_some_and(|e| subtree_predicates_contain(memo, refs, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::BinaryKind;

    fn col(id: u32, name: &str) -> ColumnRef {
        ColumnRef::new(id, name, ScalarType::Int)
    }

    fn pred(id: u32) -> ScalarOperator {
        ScalarOperator::binary(
            BinaryKind::Eq,
            ScalarOperator::column(col(id, &format!("c{}", id))),
            ScalarOperator::constant(Datum::Int(id as i32), ScalarType::Int),
        )
    }

    #[test]
    fn extract_conjuncts_of_none_is_empty() {
        assert!(extract_conjuncts(None).is_empty());
        assert!(extract_disjuncts(None).is_empty());
    }

    #[test]
    fn non_and_roots_are_single_conjuncts() {
        let p = pred(1);
        assert_eq!(extract_conjuncts(Some(&p)), vec![p.clone()]);

        let or = ScalarOperator::or(pred(1), pred(2));
        assert_eq!(extract_conjuncts(Some(&or)), vec![or.clone()]);
        assert_eq!(extract_disjuncts(Some(&or)).len(), 2);

        let not = ScalarOperator::not(pred(1));
        assert_eq!(extract_conjuncts(Some(&not)), vec![not]);
    }

    #[test]
    fn compound_of_empty_and_singleton() {
        assert_eq!(compound_and(Vec::<ScalarOperator>::new()), None);
        assert_eq!(compound_or(Vec::<ScalarOperator>::new()), None);

        let p = pred(1);
        // A single predicate comes back without a wrapping node.
        assert_eq!(compound_and(vec![p.clone()]), Some(p.clone()));

        // Absent predicates are filtered before combining.
        assert_eq!(compound_and(vec![None, Some(p.clone()), None]), Some(p));
    }

    #[test]
    fn compound_and_round_trips_in_order() {
        for n in [1usize, 2, 3, 5, 7, 8] {
            let preds: Vec<ScalarOperator> = (0..n as u32).map(pred).collect();
            let combined = compound_and(preds.clone()).unwrap();
            assert_eq!(extract_conjuncts(Some(&combined)), preds, "n = {}", n);
        }
    }

    #[test]
    fn compound_tree_is_balanced() {
        // Depth of a balanced tree over n leaves is ceil(log2 n); a leaning
        // chain would be n - 1.
        fn depth(op: &ScalarOperator) -> usize {
            let mut max_child = 0;
            op.for_each_child(|c| max_child = max_child.max(depth(c)));
            max_child + 1
        }
        let preds: Vec<ScalarOperator> = (0..8u32).map(pred).collect();
        let combined = compound_and(preds).unwrap();
        // Each `pred` leaf itself has depth 2 (binary over column/constant).
        assert_eq!(depth(&combined), 3 + 2);
    }

    #[test]
    fn conjuncts_then_compound_is_semantically_stable() {
        // Re-extracting after recombination yields the same conjunct list,
        // whatever shape the original tree had.
        let leaning = ScalarOperator::and(
            pred(1),
            ScalarOperator::and(pred(2), ScalarOperator::and(pred(3), pred(4))),
        );
        let conjuncts = extract_conjuncts(Some(&leaning));
        let rebuilt = compound_and(conjuncts.clone()).unwrap();
        assert_eq!(extract_conjuncts(Some(&rebuilt)), conjuncts);
    }

    #[test]
    fn column_refs_in_encounter_order_with_duplicates() {
        let a = col(1, "a");
        let b = col(2, "b");
        let tree = ScalarOperator::and(
            ScalarOperator::binary(
                BinaryKind::Eq,
                ScalarOperator::column(a.clone()),
                ScalarOperator::column(b.clone()),
            ),
            ScalarOperator::binary(
                BinaryKind::Gt,
                ScalarOperator::column(a.clone()),
                ScalarOperator::constant(Datum::Int(0), ScalarType::Int),
            ),
        );
        assert_eq!(extract_column_refs(Some(&tree)), vec![a.clone(), b, a]);
        assert_eq!(count_column_refs(Some(&tree)), 3);

        let constant = ScalarOperator::constant(Datum::Int(1), ScalarType::Int);
        assert!(extract_column_refs(Some(&constant)).is_empty());
        assert!(extract_column_refs(None).is_empty());
    }

    #[test]
    fn containment_checks() {
        let a = col(1, "UserId");
        let p = ScalarOperator::binary(
            BinaryKind::Eq,
            ScalarOperator::column(a.clone()),
            ScalarOperator::constant(Datum::Int(1), ScalarType::Int),
        );
        assert!(contain_any_column_refs(&[a.clone()], Some(&p)));
        assert!(!contain_any_column_refs(&[col(9, "other")], Some(&p)));
        assert!(!contain_any_column_refs(&[], Some(&p)));
        assert!(!contain_any_column_refs(&[a], None));

        assert!(contain_column_ref(Some(&p), "userid"));
        assert!(contain_column_ref(Some(&p), "USERID"));
        assert!(!contain_column_ref(Some(&p), "orderid"));
        assert!(!contain_column_ref(None, "userid"));
    }

    #[test]
    #[should_panic(expected = "at least one column")]
    fn smallest_column_ref_rejects_empty_input() {
        find_smallest_column_ref(&[]);
    }

    #[test]
    fn smallest_column_ref_picks_narrowest_slot() {
        let wide = ColumnRef::new(1, "s", ScalarType::Varchar);
        let narrow = ColumnRef::new(2, "flag", ScalarType::Boolean);
        let mid = ColumnRef::new(3, "n", ScalarType::BigInt);
        let candidates = [wide, narrow.clone(), mid];
        let picked = find_smallest_column_ref(&candidates);
        assert_eq!(*picked, narrow);
    }

    fn int_const(v: i32) -> ScalarOperator {
        ScalarOperator::constant(Datum::Int(v), ScalarType::Int)
    }

    #[test]
    fn cast_refuses_floats_on_either_side() {
        let f = ScalarOperator::constant(Datum::Float(1.0f32.into()), ScalarType::Float);
        assert_eq!(try_cast_constant(&f, ScalarType::BigInt), None);
        assert_eq!(try_cast_constant(&int_const(1), ScalarType::Float), None);
        assert_eq!(try_cast_constant(&int_const(1), ScalarType::Double), None);
        let d = ScalarOperator::constant(Datum::Double(2.5f64.into()), ScalarType::Double);
        assert_eq!(try_cast_constant(&d, ScalarType::Varchar), None);
    }

    #[test]
    fn cast_refuses_non_constants_and_matching_types() {
        let c = ScalarOperator::column(col(1, "a"));
        assert_eq!(try_cast_constant(&c, ScalarType::BigInt), None);
        assert_eq!(try_cast_constant(&int_const(1), ScalarType::Int), None);
    }

    #[test]
    fn lossless_integer_casts_are_accepted() {
        let widened = try_cast_constant(&int_const(5), ScalarType::BigInt).unwrap();
        assert_eq!(
            widened.as_constant(),
            Some((&Datum::BigInt(5), ScalarType::BigInt))
        );

        let big = ScalarOperator::constant(Datum::BigInt(300), ScalarType::BigInt);
        assert_eq!(try_cast_constant(&big, ScalarType::TinyInt), None);
        assert!(try_cast_constant(&big, ScalarType::Int).is_some());
    }

    #[test]
    fn null_casts_to_target_type_directly() {
        let null = ScalarOperator::constant(Datum::Null, ScalarType::Int);
        let casted = try_cast_constant(&null, ScalarType::Date).unwrap();
        assert_eq!(casted.as_constant(), Some((&Datum::Null, ScalarType::Date)));
    }

    #[test]
    fn date_cast_accepts_separator_stripped_digit_strings_only() {
        let accepted = try_cast_constant(&int_const(20230101), ScalarType::Date).unwrap();
        assert_eq!(
            accepted.as_constant().unwrap().0,
            &Datum::Date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap())
        );

        assert_eq!(try_cast_constant(&int_const(5), ScalarType::Date), None);

        let s = ScalarOperator::constant(Datum::Varchar("2023-01-01".into()), ScalarType::Varchar);
        assert!(try_cast_constant(&s, ScalarType::Date).is_some());
    }

    #[test]
    fn inner_join_chain_counting() {
        use crate::operator::{
            JoinType, LogicalJoin, LogicalOperator, LogicalValues, OperatorBase,
        };

        fn values() -> OptExpression {
            OptExpression::logical(
                LogicalOperator::Values(LogicalValues {
                    base: OperatorBase::default(),
                    columns: vec![],
                    rows: vec![],
                }),
                vec![],
            )
        }
        fn join(jt: JoinType, l: OptExpression, r: OptExpression) -> OptExpression {
            OptExpression::logical(
                LogicalOperator::Join(LogicalJoin {
                    base: OperatorBase::default(),
                    join_type: jt,
                    on_predicate: None,
                }),
                vec![l, r],
            )
        }

        // (v ⋈ v) ⋈ v: one contiguous inner chain of 2 joins.
        let chain = join(
            JoinType::Inner,
            join(JoinType::Inner, values(), values()),
            values(),
        );
        assert_eq!(count_inner_join_node_size(&chain), 2);

        // A left join cuts the chain: the inner join below it still counts,
        // but the root does not extend it.
        let cut = join(
            JoinType::LeftOuter,
            join(JoinType::Inner, values(), values()),
            join(JoinType::Inner, join(JoinType::Inner, values(), values()), values()),
        );
        assert_eq!(count_inner_join_node_size(&cut), 2);

        assert_eq!(count_inner_join_node_size(&values()), 0);
    }
}
