//! # Pattern Matching and Binding
//!
//! Every rule declares a [`Pattern`]: a small tree over operator kinds that an
//! expression must match before the rule's transform is invoked. Patterns keep
//! `transform` implementations free of defensive shape checks.
//!
//! ## Pattern vocabulary
//!
//! - An operator-kind node matches an expression of exactly that kind, then
//!   matches its child patterns against the child groups.
//! - [`Pattern::leaf`] matches any single operator.
//! - [`Pattern::multi_leaf`] is a variable-arity placeholder: it absorbs all
//!   remaining children (possibly none).
//!
//! A child pattern is matched against the child group's *first logical
//! expression* -- the group's stable representative -- so matching never has to
//! enumerate every member of an equivalence class.
//!
//! ## Binding
//!
//! Once a pattern matches, [`bind`] materializes the rule input: operator nodes
//! are cloned where the pattern describes them, and children the pattern does
//! not look into become [`OptExpression::Group`] references. A leaf pattern
//! that declares multi-leaf children binds one operator level (the common
//! "project over anything" shape needs the child's operator and its input
//! groups, but nothing deeper).

use crate::memo::{ExprId, Memo};
use crate::operator::{OperatorKind, OptExpression};

#[derive(Debug, Clone, PartialEq, Eq)]
enum PatternKind {
    Op(OperatorKind),
    Leaf,
    MultiLeaf,
}

/// Declarative operator-shape matcher.
#[derive(Debug, Clone)]
pub struct Pattern {
    kind: PatternKind,
    children: Vec<Pattern>,
}

impl Pattern {
    pub fn new(kind: OperatorKind) -> Self {
        Self {
            kind: PatternKind::Op(kind),
            children: Vec::new(),
        }
    }

    /// Wildcard: matches any single operator.
    pub fn leaf() -> Self {
        Self {
            kind: PatternKind::Leaf,
            children: Vec::new(),
        }
    }

    /// Variable-arity wildcard: absorbs any remaining children.
    pub fn multi_leaf() -> Self {
        Self {
            kind: PatternKind::MultiLeaf,
            children: Vec::new(),
        }
    }

    /// Wildcard that binds one operator level: matches any operator and exposes
    /// its input groups to the rule.
    pub fn leaf_with_inputs() -> Self {
        Pattern::leaf().with_children(vec![Pattern::multi_leaf()])
    }

    pub fn with_children(mut self, children: Vec<Pattern>) -> Self {
        self.children = children;
        self
    }

    fn is_multi_leaf(&self) -> bool {
        self.kind == PatternKind::MultiLeaf
    }

    fn has_multi_leaf_child(&self) -> bool {
        self.children.iter().any(|c| c.is_multi_leaf())
    }

    /// Whether the declared child patterns can cover `actual` children.
    fn arity_matches(&self, actual: usize) -> bool {
        if self.has_multi_leaf_child() {
            actual >= self.children.len() - 1
        } else {
            actual == self.children.len()
        }
    }
}

/// Check whether a memo expression matches a pattern.
pub fn matches(memo: &Memo, expr_id: ExprId, pattern: &Pattern) -> bool {
    match &pattern.kind {
        // Wildcards match any operator; their children (if any) are themselves
        // wildcards and need no inspection.
        PatternKind::Leaf | PatternKind::MultiLeaf => true,
        PatternKind::Op(kind) => {
            let expr = memo.expr(expr_id);
            if expr.op.kind() != *kind {
                return false;
            }
            let inputs = memo.inputs_of(expr_id);
            if !pattern.arity_matches(inputs.len()) {
                return false;
            }
            for (child_pattern, child_group) in pattern.children.iter().zip(inputs.iter()) {
                if child_pattern.is_multi_leaf() {
                    break;
                }
                let Some(child_expr) = memo.group(*child_group).first_logical_expression() else {
                    // A group with no logical member (e.g. enforcer-only) can
                    // only satisfy a wildcard.
                    if matches!(child_pattern.kind, PatternKind::Op(_)) {
                        return false;
                    }
                    continue;
                };
                if !matches(memo, child_expr, child_pattern) {
                    return false;
                }
            }
            true
        }
    }
}

/// Materialize the rule input for a matched expression.
///
/// The caller must have checked [`matches`] first; binding assumes the shape
/// lines up.
pub fn bind(memo: &Memo, expr_id: ExprId, pattern: &Pattern) -> OptExpression {
    let expr = memo.expr(expr_id);
    let inputs = memo.inputs_of(expr_id);

    // A bare wildcard stops materialization: the rule sees the group.
    if pattern.children.is_empty() && !matches!(pattern.kind, PatternKind::Op(_)) {
        return OptExpression::group(memo.group_of(expr_id));
    }

    let mut bound_inputs = Vec::with_capacity(inputs.len());
    let mut patterns = pattern.children.iter();
    let mut current = patterns.next();
    for child_group in inputs {
        let child_pattern = match current {
            Some(p) if p.is_multi_leaf() => p,
            Some(p) => {
                current = patterns.next();
                p
            }
            None => {
                bound_inputs.push(OptExpression::group(child_group));
                continue;
            }
        };
        if child_pattern.is_multi_leaf() {
            bound_inputs.push(OptExpression::group(child_group));
            continue;
        }
        match memo.group(child_group).first_logical_expression() {
            Some(child_expr) => bound_inputs.push(bind(memo, child_expr, child_pattern)),
            None => bound_inputs.push(OptExpression::group(child_group)),
        }
    }

    OptExpression::new(expr.op.clone(), bound_inputs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{
        LogicalOperator, LogicalProject, LogicalScan, OperatorBase, OperatorKind,
    };
    use crate::scalar::{ColumnRef, ScalarOperator};
    use crate::types::ScalarType;
    use std::collections::BTreeMap;

    fn scan_expr() -> OptExpression {
        OptExpression::logical(
            LogicalOperator::Scan(LogicalScan {
                base: OperatorBase::default(),
                table: "t".into(),
                columns: vec![ColumnRef::new(1, "a", ScalarType::Int)],
                selected_index_id: 0,
                selected_partition_ids: vec![],
                selected_tablet_ids: vec![],
            }),
            vec![],
        )
    }

    fn project_over_scan() -> OptExpression {
        let a = ColumnRef::new(1, "a", ScalarType::Int);
        let mut map = BTreeMap::new();
        map.insert(a.clone(), ScalarOperator::column(a));
        OptExpression::logical(
            LogicalOperator::Project(LogicalProject {
                base: OperatorBase::default(),
                column_refs: map,
            }),
            vec![scan_expr()],
        )
    }

    #[test]
    fn kind_and_arity_must_line_up() {
        let mut memo = Memo::new();
        let g = memo.insert(&project_over_scan());
        let project = memo.group(g).first_logical_expression().unwrap();

        let matching = Pattern::new(OperatorKind::LogicalProject)
            .with_children(vec![Pattern::leaf_with_inputs()]);
        assert!(matches(&memo, project, &matching));

        let wrong_kind = Pattern::new(OperatorKind::LogicalJoin);
        assert!(!matches(&memo, project, &wrong_kind));

        let wrong_arity = Pattern::new(OperatorKind::LogicalProject)
            .with_children(vec![Pattern::leaf(), Pattern::leaf()]);
        assert!(!matches(&memo, project, &wrong_arity));
    }

    #[test]
    fn nested_operator_patterns_match_through_child_groups() {
        let mut memo = Memo::new();
        let g = memo.insert(&project_over_scan());
        let project = memo.group(g).first_logical_expression().unwrap();

        let project_over_scan_pattern = Pattern::new(OperatorKind::LogicalProject)
            .with_children(vec![Pattern::new(OperatorKind::LogicalScan)]);
        assert!(matches(&memo, project, &project_over_scan_pattern));

        let project_over_join = Pattern::new(OperatorKind::LogicalProject)
            .with_children(vec![Pattern::new(OperatorKind::LogicalJoin)
                .with_children(vec![Pattern::leaf(), Pattern::leaf()])]);
        assert!(!matches(&memo, project, &project_over_join));
    }

    #[test]
    fn binding_materializes_one_level_under_a_leaf_with_inputs() {
        let mut memo = Memo::new();
        let g = memo.insert(&project_over_scan());
        let project = memo.group(g).first_logical_expression().unwrap();

        let pattern = Pattern::new(OperatorKind::LogicalProject)
            .with_children(vec![Pattern::leaf_with_inputs()]);
        let bound = bind(&memo, project, &pattern);

        assert_eq!(bound.op().kind(), OperatorKind::LogicalProject);
        let child = bound.input_at(0);
        // The child operator is materialized...
        assert_eq!(child.op().kind(), OperatorKind::LogicalScan);
        // ...and its own inputs (none, for a scan) stay at the group frontier.
        assert!(child.inputs().is_empty());
    }

    #[test]
    fn binding_stops_at_plain_leaves() {
        let mut memo = Memo::new();
        let g = memo.insert(&project_over_scan());
        let project = memo.group(g).first_logical_expression().unwrap();

        let pattern =
            Pattern::new(OperatorKind::LogicalProject).with_children(vec![Pattern::leaf()]);
        let bound = bind(&memo, project, &pattern);
        assert!(bound.input_at(0).as_group().is_some());
    }
}
