//! # The Memo
//!
//! The memo is the deduplicated representation of the whole search space:
//!
//! - A [`Group`] is an equivalence class of logically-identical expressions.
//!   All members produce the same output column set; the class keeps a stable
//!   "first logical expression" as the representative used by top-down pattern
//!   matching.
//! - A [`GroupExpression`] is one concrete operator whose inputs are **group
//!   ids**, not child expressions. This indirection is what lets one subplan be
//!   shared by every alternative that uses it, bounding the search space against
//!   the exponential blow-up that repeated subexpressions (correlated
//!   subqueries, multiply-referenced CTEs) would otherwise cause.
//! - The [`Memo`] owns all groups and deduplicates on a structural fingerprint:
//!   the operator plus its ordered input group ids. Inserting an expression that
//!   already exists returns the existing group unchanged.
//!
//! Two expressions land in the same group iff their fingerprints collide, which
//! is a *sound but not complete* equivalence: structurally different but
//! semantically equal plans stay in separate groups. When a rule output proves
//! two groups equal (it produces, inside group A, an expression that already
//! lives in group B), the two classes are unioned; group ids are resolved
//! through a union-find, so stale ids held by parent expressions keep working.
//!
//! Ownership is strictly arena-based: groups and expressions live in vectors
//! owned by the memo and reference each other by id only, so the logical
//! reference graph may revisit a group many times (CTE consumers) while the
//! ownership graph stays acyclic.

use crate::error::OptError;
use crate::operator::{OptExpression, Operator};
use crate::properties::PhysicalPropertySet;
use crate::rule::RuleType;
use crate::scalar::ColumnRefSet;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

/// Identifier of a group (an equivalence class) in the memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(pub usize);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g{}", self.0)
    }
}

/// Identifier of a group expression in the memo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExprId(pub usize);

impl fmt::Display for ExprId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}", self.0)
    }
}

/// One concrete operator applied to input groups.
#[derive(Debug, Clone)]
pub struct GroupExpression {
    pub op: Operator,
    /// Ordered input group ids. May hold pre-merge ids; resolve through
    /// [`Memo::resolve`] before use.
    pub inputs: Vec<GroupId>,
    /// Back-reference to the owning group (pre-merge id).
    pub group: GroupId,
    /// Bitmask of rules already applied to this expression. Guarantees each
    /// rule fires at most once per expression, which is what makes the
    /// exploration loop terminate.
    applied_rules: u64,
    /// Cost assigned during costing; physical expressions only. Used purely
    /// for comparison between alternatives.
    pub cost: Option<f64>,
}

/// Structural fingerprint: the operator identity plus its ordered (resolved)
/// input group ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Fingerprint {
    op: Operator,
    inputs: Vec<GroupId>,
}

/// The cheapest known physical expression for one required property set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Winner {
    pub expr: ExprId,
    pub cost: f64,
}

/// An equivalence class of logically-identical expressions.
#[derive(Debug, Clone, Default)]
pub struct Group {
    pub logical_exprs: Vec<ExprId>,
    pub physical_exprs: Vec<ExprId>,
    /// Shared by every member of the class.
    pub output_columns: ColumnRefSet,
    /// Estimated output row count, derived lazily before costing.
    pub row_count: Option<f64>,
    pub explored: bool,
    /// Cheapest physical expression per required property set.
    pub best_plan: HashMap<PhysicalPropertySet, Winner>,
}

impl Group {
    /// The stable representative used for repeated top-down matching. All
    /// members are logically equivalent, so any one suffices; the first is
    /// stable across rule applications because expressions are only appended.
    pub fn first_logical_expression(&self) -> Option<ExprId> {
        self.logical_exprs.first().copied()
    }
}

/// The memo: arena of groups and expressions with structural deduplication.
#[derive(Debug, Default)]
pub struct Memo {
    groups: Vec<Group>,
    exprs: Vec<GroupExpression>,
    dedup: HashMap<Fingerprint, ExprId>,
    /// Union-find parent per group index; merged groups resolve to their
    /// representative.
    parent: Vec<usize>,
}

impl Memo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve a possibly-merged group id to its current representative.
    pub fn resolve(&self, group: GroupId) -> GroupId {
        let mut i = group.0;
        while self.parent[i] != i {
            i = self.parent[i];
        }
        GroupId(i)
    }

    pub fn group(&self, group: GroupId) -> &Group {
        &self.groups[self.resolve(group).0]
    }

    pub fn group_mut(&mut self, group: GroupId) -> &mut Group {
        let id = self.resolve(group);
        &mut self.groups[id.0]
    }

    pub fn expr(&self, expr: ExprId) -> &GroupExpression {
        &self.exprs[expr.0]
    }

    /// Owning group of an expression, resolved.
    pub fn group_of(&self, expr: ExprId) -> GroupId {
        self.resolve(self.exprs[expr.0].group)
    }

    /// Resolved input groups of an expression.
    pub fn inputs_of(&self, expr: ExprId) -> Vec<GroupId> {
        self.exprs[expr.0]
            .inputs
            .iter()
            .map(|g| self.resolve(*g))
            .collect()
    }

    pub fn num_groups(&self) -> usize {
        self.parent.iter().enumerate().filter(|(i, p)| *i == **p).count()
    }

    pub fn num_exprs(&self) -> usize {
        self.exprs.len()
    }

    /// Current representative group ids.
    pub fn group_ids(&self) -> Vec<GroupId> {
        self.parent
            .iter()
            .enumerate()
            .filter(|(i, p)| *i == **p)
            .map(|(i, _)| GroupId(i))
            .collect()
    }

    /// Insert an expression tree, deduplicating bottom-up. Returns the group
    /// the root belongs to. Inserting the same tree twice returns the same
    /// group and adds nothing.
    pub fn insert(&mut self, expr: &OptExpression) -> GroupId {
        self.insert_impl(expr, None)
    }

    /// Insert a rule output into an existing group. If the root expression
    /// already lives in a different group, the two groups are merged (the rule
    /// has proven them logically equivalent). Returns the resulting group.
    pub fn insert_into_group(&mut self, expr: &OptExpression, target: GroupId) -> GroupId {
        self.insert_impl(expr, Some(target))
    }

    fn insert_impl(&mut self, expr: &OptExpression, target: Option<GroupId>) -> GroupId {
        match expr {
            OptExpression::Group(g) => {
                let found = self.resolve(*g);
                if let Some(t) = target {
                    // A rule returned a bare group reference: the target group
                    // is equivalent to it.
                    return self.merge_groups(t, found);
                }
                found
            }
            OptExpression::Operator { op, inputs } => {
                let child_groups: Vec<GroupId> = inputs
                    .iter()
                    .map(|child| self.insert_impl(child, None))
                    .collect();
                self.insert_expr(op.clone(), child_groups, target)
            }
        }
    }

    fn insert_expr(
        &mut self,
        op: Operator,
        inputs: Vec<GroupId>,
        target: Option<GroupId>,
    ) -> GroupId {
        let inputs: Vec<GroupId> = inputs.iter().map(|g| self.resolve(*g)).collect();
        let fingerprint = Fingerprint {
            op: op.clone(),
            inputs: inputs.clone(),
        };

        if let Some(&existing) = self.dedup.get(&fingerprint) {
            let existing_group = self.group_of(existing);
            if let Some(t) = target {
                return self.merge_groups(t, existing_group);
            }
            return existing_group;
        }

        let group_id = match target {
            Some(t) => self.resolve(t),
            None => {
                let child_outputs: Vec<ColumnRefSet> = inputs
                    .iter()
                    .map(|g| self.group(*g).output_columns.clone())
                    .collect();
                self.new_group(op.output_columns(&child_outputs))
            }
        };

        let expr_id = ExprId(self.exprs.len());
        let is_logical = op.is_logical();
        self.exprs.push(GroupExpression {
            op,
            inputs,
            group: group_id,
            applied_rules: 0,
            cost: None,
        });
        self.dedup.insert(fingerprint, expr_id);

        let group = &mut self.groups[group_id.0];
        if is_logical {
            group.logical_exprs.push(expr_id);
        } else {
            group.physical_exprs.push(expr_id);
        }
        trace!("inserted {} into {}", expr_id, group_id);
        group_id
    }

    fn new_group(&mut self, output_columns: ColumnRefSet) -> GroupId {
        let id = GroupId(self.groups.len());
        self.groups.push(Group {
            output_columns,
            ..Group::default()
        });
        self.parent.push(id.0);
        id
    }

    /// Union two equivalence classes. The smaller group id survives as the
    /// representative; the loser's expressions move over. Winners are cleared
    /// on both sides -- they are recomputed after exploration anyway.
    fn merge_groups(&mut self, a: GroupId, b: GroupId) -> GroupId {
        let a = self.resolve(a);
        let b = self.resolve(b);
        if a == b {
            return a;
        }
        let (winner, loser) = if a.0 < b.0 { (a, b) } else { (b, a) };
        trace!("merging {} into {}", loser, winner);
        self.parent[loser.0] = winner.0;

        let moved = std::mem::take(&mut self.groups[loser.0]);
        let keep = &mut self.groups[winner.0];
        keep.logical_exprs.extend(moved.logical_exprs);
        keep.physical_exprs.extend(moved.physical_exprs);
        keep.best_plan.clear();
        keep.explored &= moved.explored;
        winner
    }

    pub fn rule_applied(&self, expr: ExprId, rule: RuleType) -> bool {
        self.exprs[expr.0].applied_rules & rule.bit() != 0
    }

    pub fn mark_rule_applied(&mut self, expr: ExprId, rule: RuleType) {
        self.exprs[expr.0].applied_rules |= rule.bit();
    }

    pub fn set_expr_cost(&mut self, expr: ExprId, cost: f64) {
        self.exprs[expr.0].cost = Some(cost);
    }

    pub fn winner(&self, group: GroupId, props: &PhysicalPropertySet) -> Option<Winner> {
        self.group(group).best_plan.get(props).copied()
    }

    pub fn set_winner(&mut self, group: GroupId, props: PhysicalPropertySet, winner: Winner) {
        self.group_mut(group).best_plan.insert(props, winner);
    }

    /// The lowest-cost physical expression of a group satisfying the required
    /// properties, if costing has produced one.
    pub fn get_best_expression(
        &self,
        group: GroupId,
        required: &PhysicalPropertySet,
    ) -> Option<ExprId> {
        self.winner(group, required).map(|w| w.expr)
    }

    /// Materialize the winning physical plan of a group as an operator tree.
    pub fn extract_best_plan(
        &self,
        group: GroupId,
        required: &PhysicalPropertySet,
    ) -> Result<OptExpression, OptError> {
        let group = self.resolve(group);
        let winner = self
            .winner(group, required)
            .ok_or(OptError::NoPlanFound(group))?;
        let expr = self.expr(winner.expr);
        let inputs = self
            .inputs_of(winner.expr)
            .into_iter()
            .map(|child| self.extract_best_plan(child, &PhysicalPropertySet::any()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(OptExpression::new(expr.op.clone(), inputs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operator::{LogicalJoin, LogicalOperator, LogicalScan, OperatorBase, JoinType};
    use crate::scalar::ColumnRef;
    use crate::types::ScalarType;

    fn scan(table: &str, first_col_id: u32) -> OptExpression {
        OptExpression::logical(
            LogicalOperator::Scan(LogicalScan {
                base: OperatorBase::default(),
                table: table.into(),
                columns: vec![ColumnRef::new(first_col_id, "c", ScalarType::Int)],
                selected_index_id: 0,
                selected_partition_ids: vec![],
                selected_tablet_ids: vec![],
            }),
            vec![],
        )
    }

    fn join(left: OptExpression, right: OptExpression) -> OptExpression {
        OptExpression::logical(
            LogicalOperator::Join(LogicalJoin {
                base: OperatorBase::default(),
                join_type: JoinType::Inner,
                on_predicate: None,
            }),
            vec![left, right],
        )
    }

    #[test]
    fn insert_is_idempotent() {
        let mut memo = Memo::new();
        let tree = join(scan("a", 1), scan("b", 2));

        let g1 = memo.insert(&tree);
        let groups = memo.num_groups();
        let exprs = memo.num_exprs();

        let g2 = memo.insert(&tree);
        assert_eq!(g1, g2);
        assert_eq!(memo.num_groups(), groups);
        assert_eq!(memo.num_exprs(), exprs);
        assert_eq!(memo.group(g1).logical_exprs.len(), 1);
    }

    #[test]
    fn shared_subtrees_share_groups() {
        let mut memo = Memo::new();
        // Both joins reference the same scan of "a"; the memo must represent
        // that scan as a single group.
        let g1 = memo.insert(&join(scan("a", 1), scan("b", 2)));
        let g2 = memo.insert(&join(scan("a", 1), scan("c", 3)));
        assert_ne!(g1, g2);

        let j1 = memo.group(g1).first_logical_expression().unwrap();
        let j2 = memo.group(g2).first_logical_expression().unwrap();
        assert_eq!(memo.inputs_of(j1)[0], memo.inputs_of(j2)[0]);
    }

    #[test]
    fn rule_output_merges_equivalent_groups() {
        let mut memo = Memo::new();
        let join_group = memo.insert(&join(scan("a", 1), scan("b", 2)));
        let scan_group = memo.insert(&scan("a", 1));

        // A rule claims the join group is equivalent to the scan group (as a
        // project-elision rule does when it returns its child unchanged).
        let merged = memo.insert_into_group(&OptExpression::group(scan_group), join_group);
        assert_eq!(memo.resolve(join_group), memo.resolve(scan_group));
        assert_eq!(memo.resolve(join_group), merged);

        // The merged class holds both expressions.
        assert_eq!(memo.group(join_group).logical_exprs.len(), 2);
    }

    #[test]
    fn rule_mask_tracks_applications() {
        let mut memo = Memo::new();
        let g = memo.insert(&scan("a", 1));
        let e = memo.group(g).first_logical_expression().unwrap();
        assert!(!memo.rule_applied(e, RuleType::TfMergeProjectWithChild));
        memo.mark_rule_applied(e, RuleType::TfMergeProjectWithChild);
        assert!(memo.rule_applied(e, RuleType::TfMergeProjectWithChild));
        assert!(!memo.rule_applied(e, RuleType::ImpScan));
    }
}
