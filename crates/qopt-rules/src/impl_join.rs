//! # Join Implementation Rule
//!
//! Maps a logical join to hash-join alternatives, deciding the distribution
//! strategy as it goes. The exchange enforcers are injected here -- wrapped
//! around the child groups in the rule output -- never invented by the memo.
//!
//! ## Strategy selection
//!
//! 1. **Broadcast-only cases** (cross join, NULL-aware left anti join, inner
//!    join without equality predicates, or an explicit `BROADCAST` hint):
//!    a shuffle would change semantics or has no key to hash on, so the only
//!    alternative produced broadcasts the right side.
//! 2. **Replicated** (when the session enables it): if the right side is a
//!    single scan whose table is fully replicated across every backend at the
//!    visible data version, the join can run with no data movement at all.
//!    Emitted alongside the network-moving alternatives; it wins on cost.
//! 3. **Shuffle**: both sides hash-partitioned on their join keys. Requires at
//!    least one column-to-column equality predicate.
//! 4. **Broadcast**: the right side shipped to every backend. Skipped when the
//!    statistics collaborator has no estimates for one of the sides -- without
//!    trustworthy row counts the cost comparison against shuffle is noise, and
//!    shuffle is the conservative choice at scale.
//!
//! A `SHUFFLE` hint suppresses the broadcast alternative when a shuffle is
//! legal at all.

use qopt_core::context::OptimizerContext;
use qopt_core::distribution::{
    can_do_replicated_join, can_only_do_broadcast, DistributionSpec, JoinDistributionMode,
};
use qopt_core::error::OptError;
use qopt_core::memo::Memo;
use qopt_core::operator::{
    JoinType, LogicalJoin, LogicalOperator, Operator, OperatorBase, OperatorKind, OptExpression,
    PhysicalDistribution, PhysicalHashJoin, PhysicalOperator,
};
use qopt_core::pattern::Pattern;
use qopt_core::rule::{Rule, RuleType};
use qopt_core::scalar::{BinaryKind, ColumnRef, ColumnRefSet, ScalarOperator};
use qopt_core::utils::{extract_conjuncts, extract_scan_operators, has_unknown_column_stats};
use tracing::trace;

pub struct ImplHashJoinRule;

impl Rule for ImplHashJoinRule {
    fn name(&self) -> &'static str {
        "ImplHashJoin"
    }

    fn rule_type(&self) -> RuleType {
        RuleType::ImpHashJoin
    }

    fn pattern(&self) -> Pattern {
        Pattern::new(OperatorKind::LogicalJoin)
            .with_children(vec![Pattern::leaf(), Pattern::leaf()])
    }

    fn transform(
        &self,
        input: &OptExpression,
        memo: &Memo,
        ctx: &OptimizerContext,
    ) -> Result<Vec<OptExpression>, OptError> {
        let Operator::Logical(LogicalOperator::Join(join)) = input.op() else {
            return Ok(vec![]);
        };
        let left = input.input_at(0);
        let right = input.input_at(1);
        let (Some(left_group), Some(right_group)) = (left.as_group(), right.as_group()) else {
            return Ok(vec![]);
        };

        let equal_on = equal_on_predicates(
            join,
            &memo.group(left_group).output_columns,
            &memo.group(right_group).output_columns,
        );
        let hint = ctx.session.join_implementation_hint.as_deref();

        if can_only_do_broadcast(join.join_type, &equal_on_scalars(&equal_on), hint) {
            trace!("join is broadcast-only");
            return Ok(vec![broadcast_join(join, left, right)]);
        }

        let mut results = Vec::new();

        if ctx.session.enable_replicated_join {
            if let Some(replicated) = try_replicated_join(join, left, right, right_group, memo, ctx)
            {
                results.push(replicated);
            }
        }

        let shuffle_legal = !equal_on.is_empty();
        if shuffle_legal {
            results.push(shuffle_join(join, left, right, &equal_on));
        }

        let forced_shuffle = hint.is_some_and(|h| h.eq_ignore_ascii_case("SHUFFLE"));
        let stats_trusted = !has_unknown_column_stats(memo, left_group, ctx)
            && !has_unknown_column_stats(memo, right_group, ctx);
        let broadcast_legal = !matches!(
            join.join_type,
            JoinType::RightOuter | JoinType::FullOuter
        );
        if broadcast_legal && !(shuffle_legal && forced_shuffle) && (stats_trusted || !shuffle_legal)
        {
            results.push(broadcast_join(join, left, right));
        }

        Ok(results)
    }
}

/// Column-to-column equality conjuncts of the join's on-predicate, resolved to
/// (left side column, right side column) by each child's output column set.
fn equal_on_predicates(
    join: &LogicalJoin,
    left_columns: &ColumnRefSet,
    right_columns: &ColumnRefSet,
) -> Vec<(ColumnRef, ColumnRef)> {
    let mut pairs = Vec::new();
    for conjunct in extract_conjuncts(join.on_predicate.as_ref()) {
        let ScalarOperator::BinaryPredicate {
            kind: BinaryKind::Eq,
            left,
            right,
        } = &conjunct
        else {
            continue;
        };
        let (Some(a), Some(b)) = (left.as_column_ref(), right.as_column_ref()) else {
            continue;
        };
        if left_columns.contains(a) && right_columns.contains(b) {
            pairs.push((a.clone(), b.clone()));
        } else if left_columns.contains(b) && right_columns.contains(a) {
            pairs.push((b.clone(), a.clone()));
        }
    }
    pairs
}

fn equal_on_scalars(pairs: &[(ColumnRef, ColumnRef)]) -> Vec<ScalarOperator> {
    pairs
        .iter()
        .map(|(l, r)| {
            ScalarOperator::binary(
                BinaryKind::Eq,
                ScalarOperator::column(l.clone()),
                ScalarOperator::column(r.clone()),
            )
        })
        .collect()
}

fn exchange(spec: DistributionSpec, child: OptExpression) -> OptExpression {
    OptExpression::physical(
        PhysicalOperator::Distribution(PhysicalDistribution {
            base: OperatorBase::default(),
            spec,
        }),
        vec![child],
    )
}

fn hash_join(
    join: &LogicalJoin,
    mode: JoinDistributionMode,
    inputs: Vec<OptExpression>,
) -> OptExpression {
    OptExpression::physical(
        PhysicalOperator::HashJoin(PhysicalHashJoin {
            base: join.base.clone(),
            join_type: join.join_type,
            on_predicate: join.on_predicate.clone(),
            mode,
        }),
        inputs,
    )
}

fn broadcast_join(
    join: &LogicalJoin,
    left: &OptExpression,
    right: &OptExpression,
) -> OptExpression {
    hash_join(
        join,
        JoinDistributionMode::Broadcast,
        vec![
            left.clone(),
            exchange(DistributionSpec::Broadcast, right.clone()),
        ],
    )
}

fn shuffle_join(
    join: &LogicalJoin,
    left: &OptExpression,
    right: &OptExpression,
    equal_on: &[(ColumnRef, ColumnRef)],
) -> OptExpression {
    let left_keys: Vec<ColumnRef> = equal_on.iter().map(|(l, _)| l.clone()).collect();
    let right_keys: Vec<ColumnRef> = equal_on.iter().map(|(_, r)| r.clone()).collect();
    hash_join(
        join,
        JoinDistributionMode::Shuffle,
        vec![
            exchange(DistributionSpec::Shuffle(left_keys), left.clone()),
            exchange(DistributionSpec::Shuffle(right_keys), right.clone()),
        ],
    )
}

/// A replicated join is possible only when the right side is a single scan of
/// a table whose selected partitions and tablets are fully replicated on every
/// backend. Any missing metadata disqualifies it.
fn try_replicated_join(
    join: &LogicalJoin,
    left: &OptExpression,
    right: &OptExpression,
    right_group: qopt_core::memo::GroupId,
    memo: &Memo,
    ctx: &OptimizerContext,
) -> Option<OptExpression> {
    let mut scans = Vec::new();
    extract_scan_operators(memo, right_group, &mut scans);
    let [scan] = scans.as_slice() else {
        return None;
    };
    let table = ctx.cluster().table(&scan.table)?;
    if !can_do_replicated_join(
        &table,
        scan.selected_index_id,
        &scan.selected_partition_ids,
        &scan.selected_tablet_ids,
        ctx.cluster(),
    ) {
        return None;
    }
    trace!("replicated join eligible on {}", scan.table);
    Some(hash_join(
        join,
        JoinDistributionMode::Replicated,
        vec![left.clone(), right.clone()],
    ))
}
