//! # Relational Operators
//!
//! This module defines the relational operator algebra in two families:
//!
//! ## Logical Operators (`LogicalOperator`)
//! Logical operators describe *what* to compute. Every logical operator carries
//! three common fields in its [`OperatorBase`]: an optional row limit, an optional
//! filter predicate, and an optional attached projection. Transformation rules
//! lean on these heavily -- e.g. project-merge folds a standalone Project into its
//! child's attached projection.
//!
//! ## Physical Operators (`PhysicalOperator`)
//! Physical operators describe *how* to execute, and additionally carry the chosen
//! distribution: a hash join records its [`JoinDistributionMode`], and an explicit
//! `Distribution` (exchange) operator carries the [`DistributionSpec`] it enforces.
//! Costs are not stored here -- they live on the owning memo expression.
//!
//! ## Immutability and the copy-then-override builder
//! Operators are immutable values. Rewrites clone an existing operator and
//! override selected fields through the `with_limit` / `with_predicate` /
//! `with_projection` structural updates, which is how rules share untouched
//! fields with the original node without aliasing it.
//!
//! ## `OptExpression`
//! An [`OptExpression`] pairs an operator with child expressions. It is the
//! currency outside the memo: the analyzer hands the optimizer a logical
//! `OptExpression` tree, rules receive bound `OptExpression`s whose frontier
//! children reference memo groups, and the final physical plan is extracted back
//! into an `OptExpression` tree.

use crate::distribution::{DistributionSpec, JoinDistributionMode};
use crate::memo::{GroupId, Memo};
use crate::scalar::{ColumnRef, ColumnRefSet, Datum, ScalarOperator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Stable identity shared by a CTE producer and all of its consumers.
///
/// This is a logical back-reference, never an ownership edge: any number of
/// consumers may carry the same id without aliasing the producer's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CteId(pub u32);

impl fmt::Display for CteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cte_{}", self.0)
    }
}

/// SQL join types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinType {
    Inner,
    Cross,
    LeftOuter,
    RightOuter,
    FullOuter,
    LeftSemi,
    LeftAnti,
    /// Anti join with NULL-aware semantics (`NOT IN` with nullable keys).
    /// Only a broadcast strategy is legal for this join type.
    NullAwareLeftAnti,
}

impl JoinType {
    pub fn is_inner(&self) -> bool {
        matches!(self, JoinType::Inner)
    }

    pub fn is_cross(&self) -> bool {
        matches!(self, JoinType::Cross)
    }

    pub fn is_inner_or_cross(&self) -> bool {
        matches!(self, JoinType::Inner | JoinType::Cross)
    }

    /// Join types whose output columns come from the left input only.
    pub fn is_left_only(&self) -> bool {
        matches!(
            self,
            JoinType::LeftSemi | JoinType::LeftAnti | JoinType::NullAwareLeftAnti
        )
    }
}

/// An attached projection: a map from output column to defining expression.
///
/// Keyed by `ColumnRef` ordering (column id) so that iteration order -- and
/// therefore memo fingerprints -- are deterministic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Projection {
    pub column_refs: BTreeMap<ColumnRef, ScalarOperator>,
}

impl Projection {
    pub fn new(column_refs: BTreeMap<ColumnRef, ScalarOperator>) -> Self {
        Self { column_refs }
    }

    pub fn output_columns(&self) -> ColumnRefSet {
        self.column_refs.keys().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.column_refs.is_empty()
    }
}

/// Fields common to every operator: an optional row limit, an optional filter
/// predicate, and an optional attached projection. "No limit" is `None`; there
/// is no sentinel value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct OperatorBase {
    pub limit: Option<u64>,
    pub predicate: Option<ScalarOperator>,
    pub projection: Option<Projection>,
}

/// Table scan over an OLAP table. Carries the analyzer's pruning results
/// (selected index/partitions/tablets) so distributed-join feasibility checks
/// can consult replica placement for exactly the data this query touches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalScan {
    pub base: OperatorBase,
    pub table: String,
    pub columns: Vec<ColumnRef>,
    pub selected_index_id: u64,
    pub selected_partition_ids: Vec<u64>,
    pub selected_tablet_ids: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalProject {
    pub base: OperatorBase,
    pub column_refs: BTreeMap<ColumnRef, ScalarOperator>,
}

/// Standalone filter produced by the analyzer. The predicate lives in `base`;
/// pushdown rules fold it into the child and the node disappears before
/// implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalFilter {
    pub base: OperatorBase,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalJoin {
    pub base: OperatorBase,
    pub join_type: JoinType,
    pub on_predicate: Option<ScalarOperator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalAggregate {
    pub base: OperatorBase,
    pub group_by: Vec<ColumnRef>,
    /// Output aggregate column -> aggregate call expression.
    pub aggregations: BTreeMap<ColumnRef, ScalarOperator>,
}

/// Subquery application. The left input is the outer query, the right input is
/// the subquery; correlation columns flow from left into right.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalApply {
    pub base: OperatorBase,
    pub output: ColumnRef,
    pub correlation_column_refs: Vec<ColumnRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalCteProduce {
    pub base: OperatorBase,
    pub cte_id: CteId,
}

/// A reference site of a shared CTE. `cte_output_column_ref_map` maps this
/// consumer's local output columns to the producer-side columns they mirror.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalCteConsume {
    pub base: OperatorBase,
    pub cte_id: CteId,
    pub cte_output_column_ref_map: BTreeMap<ColumnRef, ColumnRef>,
}

/// Constant relation; leaf node used for VALUES clauses and in tests.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LogicalValues {
    pub base: OperatorBase,
    pub columns: Vec<ColumnRef>,
    pub rows: Vec<Vec<Datum>>,
}

/// Logical operator family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LogicalOperator {
    Scan(LogicalScan),
    Project(LogicalProject),
    Filter(LogicalFilter),
    Join(LogicalJoin),
    Aggregate(LogicalAggregate),
    Apply(LogicalApply),
    CteProduce(LogicalCteProduce),
    CteConsume(LogicalCteConsume),
    Values(LogicalValues),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalScan {
    pub base: OperatorBase,
    pub table: String,
    pub columns: Vec<ColumnRef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalProject {
    pub base: OperatorBase,
    pub column_refs: BTreeMap<ColumnRef, ScalarOperator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalHashJoin {
    pub base: OperatorBase,
    pub join_type: JoinType,
    pub on_predicate: Option<ScalarOperator>,
    pub mode: JoinDistributionMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalHashAggregate {
    pub base: OperatorBase,
    pub group_by: Vec<ColumnRef>,
    pub aggregations: BTreeMap<ColumnRef, ScalarOperator>,
}

/// Exchange: enforces a data distribution on its single child. Implementation
/// rules inject these; the memo never invents one on its own.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalDistribution {
    pub base: OperatorBase,
    pub spec: DistributionSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalCteProduce {
    pub base: OperatorBase,
    pub cte_id: CteId,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalCteConsume {
    pub base: OperatorBase,
    pub cte_id: CteId,
    pub cte_output_column_ref_map: BTreeMap<ColumnRef, ColumnRef>,
}

/// Physical operator family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PhysicalOperator {
    Scan(PhysicalScan),
    Project(PhysicalProject),
    HashJoin(PhysicalHashJoin),
    HashAggregate(PhysicalHashAggregate),
    Distribution(PhysicalDistribution),
    CteProduce(PhysicalCteProduce),
    CteConsume(PhysicalCteConsume),
}

/// Kind discriminant used for pattern matching without inspecting fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperatorKind {
    LogicalScan,
    LogicalProject,
    LogicalFilter,
    LogicalJoin,
    LogicalAggregate,
    LogicalApply,
    LogicalCteProduce,
    LogicalCteConsume,
    LogicalValues,
    PhysicalScan,
    PhysicalProject,
    PhysicalHashJoin,
    PhysicalHashAggregate,
    PhysicalDistribution,
    PhysicalCteProduce,
    PhysicalCteConsume,
}

impl LogicalOperator {
    pub fn kind(&self) -> OperatorKind {
        match self {
            LogicalOperator::Scan(_) => OperatorKind::LogicalScan,
            LogicalOperator::Project(_) => OperatorKind::LogicalProject,
            LogicalOperator::Filter(_) => OperatorKind::LogicalFilter,
            LogicalOperator::Join(_) => OperatorKind::LogicalJoin,
            LogicalOperator::Aggregate(_) => OperatorKind::LogicalAggregate,
            LogicalOperator::Apply(_) => OperatorKind::LogicalApply,
            LogicalOperator::CteProduce(_) => OperatorKind::LogicalCteProduce,
            LogicalOperator::CteConsume(_) => OperatorKind::LogicalCteConsume,
            LogicalOperator::Values(_) => OperatorKind::LogicalValues,
        }
    }

    pub fn base(&self) -> &OperatorBase {
        match self {
            LogicalOperator::Scan(op) => &op.base,
            LogicalOperator::Project(op) => &op.base,
            LogicalOperator::Filter(op) => &op.base,
            LogicalOperator::Join(op) => &op.base,
            LogicalOperator::Aggregate(op) => &op.base,
            LogicalOperator::Apply(op) => &op.base,
            LogicalOperator::CteProduce(op) => &op.base,
            LogicalOperator::CteConsume(op) => &op.base,
            LogicalOperator::Values(op) => &op.base,
        }
    }

    fn base_mut(&mut self) -> &mut OperatorBase {
        match self {
            LogicalOperator::Scan(op) => &mut op.base,
            LogicalOperator::Project(op) => &mut op.base,
            LogicalOperator::Filter(op) => &mut op.base,
            LogicalOperator::Join(op) => &mut op.base,
            LogicalOperator::Aggregate(op) => &mut op.base,
            LogicalOperator::Apply(op) => &mut op.base,
            LogicalOperator::CteProduce(op) => &mut op.base,
            LogicalOperator::CteConsume(op) => &mut op.base,
            LogicalOperator::Values(op) => &mut op.base,
        }
    }

    /// Structural update: copy of this operator with the limit replaced.
    pub fn with_limit(&self, limit: Option<u64>) -> LogicalOperator {
        let mut op = self.clone();
        op.base_mut().limit = limit;
        op
    }

    /// Structural update: copy of this operator with the predicate replaced.
    pub fn with_predicate(&self, predicate: Option<ScalarOperator>) -> LogicalOperator {
        let mut op = self.clone();
        op.base_mut().predicate = predicate;
        op
    }

    /// Structural update: copy of this operator with the attached projection
    /// replaced.
    pub fn with_projection(&self, projection: Option<Projection>) -> LogicalOperator {
        let mut op = self.clone();
        op.base_mut().projection = projection;
        op
    }

    /// Output column set, derived from the operator and its children's outputs.
    /// An attached projection always wins: once a projection is fused onto a
    /// node, the node produces exactly the projection's columns.
    pub fn output_columns(&self, child_outputs: &[ColumnRefSet]) -> ColumnRefSet {
        if let Some(projection) = &self.base().projection {
            return projection.output_columns();
        }
        match self {
            LogicalOperator::Scan(op) => op.columns.iter().collect(),
            LogicalOperator::Project(op) => op.column_refs.keys().collect(),
            LogicalOperator::Filter(_) => child_outputs.first().cloned().unwrap_or_default(),
            LogicalOperator::Join(op) => {
                if op.join_type.is_left_only() {
                    child_outputs.first().cloned().unwrap_or_default()
                } else {
                    let mut out = ColumnRefSet::new();
                    for c in child_outputs {
                        out.union_with(c);
                    }
                    out
                }
            }
            LogicalOperator::Aggregate(op) => {
                let mut out: ColumnRefSet = op.group_by.iter().collect();
                for c in op.aggregations.keys() {
                    out.insert(c);
                }
                out
            }
            LogicalOperator::Apply(op) => {
                let mut out = child_outputs.first().cloned().unwrap_or_default();
                out.insert(&op.output);
                out
            }
            LogicalOperator::CteProduce(_) => child_outputs.first().cloned().unwrap_or_default(),
            LogicalOperator::CteConsume(op) => op.cte_output_column_ref_map.keys().collect(),
            LogicalOperator::Values(op) => op.columns.iter().collect(),
        }
    }
}

impl PhysicalOperator {
    pub fn kind(&self) -> OperatorKind {
        match self {
            PhysicalOperator::Scan(_) => OperatorKind::PhysicalScan,
            PhysicalOperator::Project(_) => OperatorKind::PhysicalProject,
            PhysicalOperator::HashJoin(_) => OperatorKind::PhysicalHashJoin,
            PhysicalOperator::HashAggregate(_) => OperatorKind::PhysicalHashAggregate,
            PhysicalOperator::Distribution(_) => OperatorKind::PhysicalDistribution,
            PhysicalOperator::CteProduce(_) => OperatorKind::PhysicalCteProduce,
            PhysicalOperator::CteConsume(_) => OperatorKind::PhysicalCteConsume,
        }
    }

    pub fn base(&self) -> &OperatorBase {
        match self {
            PhysicalOperator::Scan(op) => &op.base,
            PhysicalOperator::Project(op) => &op.base,
            PhysicalOperator::HashJoin(op) => &op.base,
            PhysicalOperator::HashAggregate(op) => &op.base,
            PhysicalOperator::Distribution(op) => &op.base,
            PhysicalOperator::CteProduce(op) => &op.base,
            PhysicalOperator::CteConsume(op) => &op.base,
        }
    }

    pub fn output_columns(&self, child_outputs: &[ColumnRefSet]) -> ColumnRefSet {
        if let Some(projection) = &self.base().projection {
            return projection.output_columns();
        }
        match self {
            PhysicalOperator::Scan(op) => op.columns.iter().collect(),
            PhysicalOperator::Project(op) => op.column_refs.keys().collect(),
            PhysicalOperator::HashJoin(op) => {
                if op.join_type.is_left_only() {
                    child_outputs.first().cloned().unwrap_or_default()
                } else {
                    let mut out = ColumnRefSet::new();
                    for c in child_outputs {
                        out.union_with(c);
                    }
                    out
                }
            }
            PhysicalOperator::HashAggregate(op) => {
                let mut out: ColumnRefSet = op.group_by.iter().collect();
                for c in op.aggregations.keys() {
                    out.insert(c);
                }
                out
            }
            PhysicalOperator::Distribution(_) | PhysicalOperator::CteProduce(_) => {
                child_outputs.first().cloned().unwrap_or_default()
            }
            PhysicalOperator::CteConsume(op) => op.cte_output_column_ref_map.keys().collect(),
        }
    }
}

/// Unified operator enum stored in memo expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Logical(LogicalOperator),
    Physical(PhysicalOperator),
}

impl Operator {
    pub fn kind(&self) -> OperatorKind {
        match self {
            Operator::Logical(op) => op.kind(),
            Operator::Physical(op) => op.kind(),
        }
    }

    pub fn is_logical(&self) -> bool {
        matches!(self, Operator::Logical(_))
    }

    pub fn is_physical(&self) -> bool {
        matches!(self, Operator::Physical(_))
    }

    pub fn base(&self) -> &OperatorBase {
        match self {
            Operator::Logical(op) => op.base(),
            Operator::Physical(op) => op.base(),
        }
    }

    pub fn limit(&self) -> Option<u64> {
        self.base().limit
    }

    pub fn predicate(&self) -> Option<&ScalarOperator> {
        self.base().predicate.as_ref()
    }

    pub fn projection(&self) -> Option<&Projection> {
        self.base().projection.as_ref()
    }

    pub fn output_columns(&self, child_outputs: &[ColumnRefSet]) -> ColumnRefSet {
        match self {
            Operator::Logical(op) => op.output_columns(child_outputs),
            Operator::Physical(op) => op.output_columns(child_outputs),
        }
    }
}

/// An operator tree node, or a reference to an existing memo group.
///
/// Group references appear at the frontier of rule inputs (the binder stops
/// materializing operators where the pattern stops describing them) and in rule
/// outputs, where they tell the memo "reuse this group as the child".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptExpression {
    Operator {
        op: Operator,
        inputs: Vec<OptExpression>,
    },
    Group(GroupId),
}

impl OptExpression {
    pub fn new(op: Operator, inputs: Vec<OptExpression>) -> Self {
        OptExpression::Operator { op, inputs }
    }

    pub fn logical(op: LogicalOperator, inputs: Vec<OptExpression>) -> Self {
        Self::new(Operator::Logical(op), inputs)
    }

    pub fn physical(op: PhysicalOperator, inputs: Vec<OptExpression>) -> Self {
        Self::new(Operator::Physical(op), inputs)
    }

    pub fn group(group: GroupId) -> Self {
        OptExpression::Group(group)
    }

    /// The operator at this node. Calling this on a group reference is a
    /// programming error in the calling rule.
    pub fn op(&self) -> &Operator {
        match self {
            OptExpression::Operator { op, .. } => op,
            OptExpression::Group(g) => {
                panic!("op() called on a group reference ({})", g)
            }
        }
    }

    pub fn as_group(&self) -> Option<GroupId> {
        match self {
            OptExpression::Group(g) => Some(*g),
            OptExpression::Operator { .. } => None,
        }
    }

    pub fn inputs(&self) -> &[OptExpression] {
        match self {
            OptExpression::Operator { inputs, .. } => inputs,
            OptExpression::Group(_) => &[],
        }
    }

    pub fn input_at(&self, i: usize) -> &OptExpression {
        &self.inputs()[i]
    }

    /// Output column set of this tree. Group references resolve through the
    /// memo's cached per-group logical properties.
    pub fn derive_output_columns(&self, memo: &Memo) -> ColumnRefSet {
        match self {
            OptExpression::Group(g) => memo.group(*g).output_columns.clone(),
            OptExpression::Operator { op, inputs } => {
                let child_outputs: Vec<ColumnRefSet> = inputs
                    .iter()
                    .map(|c| c.derive_output_columns(memo))
                    .collect();
                op.output_columns(&child_outputs)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScalarType;

    fn col(id: u32, name: &str) -> ColumnRef {
        ColumnRef::new(id, name, ScalarType::Int)
    }

    fn scan(table: &str, columns: Vec<ColumnRef>) -> LogicalOperator {
        LogicalOperator::Scan(LogicalScan {
            base: OperatorBase::default(),
            table: table.into(),
            columns,
            selected_index_id: 0,
            selected_partition_ids: vec![],
            selected_tablet_ids: vec![],
        })
    }

    #[test]
    fn with_limit_does_not_touch_the_original() {
        let original = scan("t", vec![col(1, "a")]);
        let limited = original.with_limit(Some(10));
        assert_eq!(original.base().limit, None);
        assert_eq!(limited.base().limit, Some(10));
        // Everything else is shared structurally.
        assert_eq!(original.with_limit(Some(10)), limited);
    }

    #[test]
    fn attached_projection_overrides_output_columns() {
        let a = col(1, "a");
        let b = col(2, "b");
        let op = scan("t", vec![a.clone(), b.clone()]);
        assert_eq!(op.output_columns(&[]).len(), 2);

        let mut map = BTreeMap::new();
        map.insert(a.clone(), ScalarOperator::column(a));
        let projected = op.with_projection(Some(Projection::new(map)));
        let out = projected.output_columns(&[]);
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn semi_join_outputs_left_columns_only() {
        let join = LogicalOperator::Join(LogicalJoin {
            base: OperatorBase::default(),
            join_type: JoinType::LeftSemi,
            on_predicate: None,
        });
        let left: ColumnRefSet = [col(1, "a")].iter().collect();
        let right: ColumnRefSet = [col(2, "b")].iter().collect();
        let out = join.output_columns(&[left.clone(), right]);
        assert_eq!(out, left);
    }
}
