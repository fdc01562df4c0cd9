//! # The Search Engine
//!
//! One optimization request is one single-threaded, synchronous search over one
//! memo. The phases are:
//!
//! 1. **Insert**: the analyzer's logical tree goes into the memo; CTE producers
//!    and consumers found on the way are registered in the context.
//! 2. **Explore**: transformation rules run over every logical expression of
//!    every group until a fixed point -- no rule produced anything new -- or the
//!    iteration budget runs out (which stops exploration but is not an error).
//!    Each rule fires at most once per expression, tracked by the memo's
//!    applied-rule masks, which is what guarantees termination.
//! 3. **Implement**: implementation rules add physical alternatives to each
//!    group. Distribution enforcers (exchanges) are injected by the rules
//!    themselves; the engine never fabricates one.
//! 4. **Cost**: a bottom-up pass assigns each physical expression a cost via
//!    the pluggable [`CostModel`] and records the cheapest member per group per
//!    required property set.
//! 5. **Extract**: the winning physical tree is materialized.
//!
//! Cancellation is cooperative: the flag in the [`OptimizerContext`] is checked
//! between rule applications, and a cancelled request simply abandons its memo.
//! A rule returning an error aborts the request -- no partial plan is returned.

use crate::context::OptimizerContext;
use crate::cost::{Cost, CostModel};
use crate::error::OptError;
use crate::memo::{ExprId, GroupId, Memo, Winner};
use crate::operator::{LogicalOperator, Operator, OptExpression, PhysicalOperator};
use crate::pattern;
use crate::properties::PhysicalPropertySet;
use crate::rule::RuleRegistry;
use std::sync::Arc;
use tracing::{debug, trace};

/// Row estimate used when the statistics collaborator has nothing better.
const DEFAULT_ROW_COUNT: f64 = 1000.0;
/// Placeholder selectivity applied to filtering operators when deriving row
/// estimates for cost comparison.
const DEFAULT_FILTER_SELECTIVITY: f64 = 0.1;

/// The Cascades-style optimizer driver.
pub struct Optimizer {
    pub memo: Memo,
    rules: Arc<RuleRegistry>,
    cost_model: Arc<dyn CostModel>,
    iterations: usize,
    /// Groups currently being costed, for cycle detection. Group merges can
    /// leave an expression inside its own (former) child group -- e.g. an
    /// elided projection -- and such self-referential alternatives are
    /// infeasible, not infinite recursions.
    costing: std::collections::HashSet<GroupId>,
}

impl Optimizer {
    pub fn new(rules: Arc<RuleRegistry>, cost_model: Arc<dyn CostModel>) -> Self {
        Self {
            memo: Memo::new(),
            rules,
            cost_model,
            iterations: 0,
            costing: std::collections::HashSet::new(),
        }
    }

    /// Optimize a logical expression tree into the cheapest physical tree
    /// satisfying `required`.
    pub fn optimize(
        &mut self,
        root: &OptExpression,
        required: &PhysicalPropertySet,
        ctx: &mut OptimizerContext,
    ) -> Result<OptExpression, OptError> {
        register_ctes(root, ctx)?;

        let root_group = self.memo.insert(root);
        debug!(
            "optimizing: root={}, groups={}, exprs={}",
            root_group,
            self.memo.num_groups(),
            self.memo.num_exprs()
        );

        self.explore(ctx)?;
        self.implement(ctx)?;
        self.cost_group(root_group, required, ctx)?;

        let plan = self.memo.extract_best_plan(root_group, required)?;
        debug!(
            "optimization complete: groups={}, exprs={}, iterations={}",
            self.memo.num_groups(),
            self.memo.num_exprs(),
            self.iterations
        );
        Ok(plan)
    }

    /// Total rule applications so far (exploration and implementation).
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    /// Apply transformation rules to a fixed point.
    fn explore(&mut self, ctx: &OptimizerContext) -> Result<(), OptError> {
        loop {
            let mut changed = false;
            for group in self.memo.group_ids() {
                // Snapshot: rule application appends to this list.
                let exprs = self.memo.group(group).logical_exprs.clone();
                for expr in exprs {
                    changed |= self.apply_rules(expr, true, ctx)?;
                }
            }
            if !changed {
                return Ok(());
            }
            if self.iterations >= ctx.session.max_exploration_iterations {
                debug!("exploration budget exhausted after {} iterations", self.iterations);
                return Ok(());
            }
        }
    }

    /// Apply implementation rules once over every logical expression.
    fn implement(&mut self, ctx: &OptimizerContext) -> Result<(), OptError> {
        for group in self.memo.group_ids() {
            let exprs = self.memo.group(group).logical_exprs.clone();
            for expr in exprs {
                self.apply_rules(expr, false, ctx)?;
            }
        }
        Ok(())
    }

    /// Run all transformation (or implementation) rules against one expression.
    /// Returns whether anything new entered the memo.
    fn apply_rules(
        &mut self,
        expr: ExprId,
        transformation: bool,
        ctx: &OptimizerContext,
    ) -> Result<bool, OptError> {
        let mut changed = false;
        // Collect owned metadata up front so the loop below can borrow the
        // memo mutably while re-locating each rule through the shared Arc.
        let rules: Vec<_> = if transformation {
            self.rules.transformation_rules()
        } else {
            self.rules.implementation_rules()
        }
        .into_iter()
        .map(|r| (r.name(), r.rule_type(), r.pattern()))
        .collect();
        let registry = Arc::clone(&self.rules);

        for (name, rule_type, rule_pattern) in rules {
            if self.memo.rule_applied(expr, rule_type) {
                continue;
            }
            if !pattern::matches(&self.memo, expr, &rule_pattern) {
                continue;
            }
            ctx.check_cancelled()?;
            self.iterations += 1;

            trace!("applying rule {} to {}", name, expr);
            let bound = pattern::bind(&self.memo, expr, &rule_pattern);
            let rule = registry
                .transformation_rules()
                .into_iter()
                .chain(registry.implementation_rules())
                .find(|r| r.rule_type() == rule_type)
                .expect("rule disappeared from registry");
            let results = rule.transform(&bound, &self.memo, ctx)?;

            // Mark before inserting: a rule may return an expression equal to
            // its input, and it must not fire on it again.
            self.memo.mark_rule_applied(expr, rule_type);

            let target = self.memo.group_of(expr);
            let exprs_before = self.memo.num_exprs();
            let groups_before = self.memo.num_groups();
            for result in &results {
                self.memo.insert_into_group(result, target);
            }
            if self.memo.num_exprs() != exprs_before || self.memo.num_groups() != groups_before {
                changed = true;
            }
        }
        Ok(changed)
    }

    /// Bottom-up costing: find the cheapest physical expression of `group`
    /// satisfying `required`, recording winners for reuse.
    fn cost_group(
        &mut self,
        group: GroupId,
        required: &PhysicalPropertySet,
        ctx: &OptimizerContext,
    ) -> Result<Option<Winner>, OptError> {
        let group = self.memo.resolve(group);
        if let Some(winner) = self.memo.winner(group, required) {
            return Ok(Some(winner));
        }
        if !self.costing.insert(group) {
            // Re-entered through a self-referential alternative.
            return Ok(None);
        }

        self.derive_row_count(group, ctx);

        let any = PhysicalPropertySet::any();
        let mut best: Option<Winner> = None;
        let physical_exprs = self.memo.group(group).physical_exprs.clone();
        for expr in physical_exprs {
            let provided = provided_property(&self.memo.expr(expr).op);
            if !required.satisfied_by(&provided) {
                continue;
            }

            let inputs = self.memo.inputs_of(expr);
            let mut children_costs = Vec::with_capacity(inputs.len());
            let mut input_rows = Vec::with_capacity(inputs.len());
            let mut feasible = true;
            for child in inputs {
                match self.cost_group(child, &any, ctx)? {
                    Some(winner) => {
                        children_costs.push(Cost::new(winner.cost));
                        input_rows.push(
                            self.memo.group(child).row_count.unwrap_or(DEFAULT_ROW_COUNT),
                        );
                    }
                    None => {
                        feasible = false;
                        break;
                    }
                }
            }
            if !feasible {
                continue;
            }

            let Operator::Physical(op) = &self.memo.expr(expr).op else {
                continue;
            };
            let cost = self.cost_model.compute_cost(
                op,
                &input_rows,
                &children_costs,
                ctx.cluster().backend_size(),
            );
            self.memo.set_expr_cost(expr, cost.total);
            trace!("costed {} in {}: {:.1}", expr, group, cost.total);

            if best.map_or(true, |b| cost.total < b.cost) {
                best = Some(Winner {
                    expr,
                    cost: cost.total,
                });
            }
        }

        self.costing.remove(&group);
        if let Some(winner) = best {
            self.memo.set_winner(group, required.clone(), winner);
        }
        Ok(best)
    }

    /// Derive and cache a row estimate for a group. Deliberately crude: the
    /// real estimation formulas live in the statistics collaborator, and the
    /// engine only needs numbers good enough to rank alternatives.
    fn derive_row_count(&mut self, group: GroupId, ctx: &OptimizerContext) -> f64 {
        let group = self.memo.resolve(group);
        if let Some(rows) = self.memo.group(group).row_count {
            return rows;
        }
        let rows = match self.memo.group(group).first_logical_expression() {
            // Enforcer-only groups (an exchange injected by a rule) have no
            // logical member; their output rows are their child's.
            None => match self.memo.group(group).physical_exprs.first().copied() {
                Some(expr) => {
                    let inputs = self.memo.inputs_of(expr);
                    self.child_rows(&inputs, 0, ctx)
                }
                None => DEFAULT_ROW_COUNT,
            },
            Some(expr) => {
                let op = self.memo.expr(expr).op.clone();
                let inputs = self.memo.inputs_of(expr);
                match &op {
                    Operator::Logical(LogicalOperator::Scan(scan)) => ctx
                        .statistics()
                        .get_table_statistics(&scan.table)
                        .map(|s| s.row_count)
                        .unwrap_or(DEFAULT_ROW_COUNT),
                    Operator::Logical(LogicalOperator::Values(values)) => {
                        values.rows.len() as f64
                    }
                    Operator::Logical(LogicalOperator::Filter(_)) => {
                        let child = self.child_rows(&inputs, 0, ctx);
                        (child * DEFAULT_FILTER_SELECTIVITY).max(1.0)
                    }
                    Operator::Logical(LogicalOperator::Join(_)) => {
                        let left = self.child_rows(&inputs, 0, ctx);
                        let right = self.child_rows(&inputs, 1, ctx);
                        left.max(right)
                    }
                    Operator::Logical(LogicalOperator::Aggregate(agg)) => {
                        let child = self.child_rows(&inputs, 0, ctx);
                        if agg.group_by.is_empty() {
                            1.0
                        } else {
                            (child * DEFAULT_FILTER_SELECTIVITY).max(1.0)
                        }
                    }
                    _ => self.child_rows(&inputs, 0, ctx),
                }
            }
        };
        self.memo.group_mut(group).row_count = Some(rows);
        rows
    }

    fn child_rows(&mut self, inputs: &[GroupId], i: usize, ctx: &OptimizerContext) -> f64 {
        inputs
            .get(i)
            .copied()
            .map(|g| self.derive_row_count(g, ctx))
            .unwrap_or(DEFAULT_ROW_COUNT)
    }
}

/// The distribution a physical operator provides to its parent. Only explicit
/// exchanges provide a concrete distribution; everything else provides none
/// and therefore satisfies only unconstrained requirements.
fn provided_property(op: &Operator) -> PhysicalPropertySet {
    match op {
        Operator::Physical(PhysicalOperator::Distribution(dist)) => {
            PhysicalPropertySet::with_distribution(dist.spec.clone())
        }
        _ => PhysicalPropertySet::any(),
    }
}

/// Walk the input tree registering CTE producers and consumers. A consumer
/// whose producer never appears is detected later by the consumer's
/// implementation rule.
fn register_ctes(root: &OptExpression, ctx: &mut OptimizerContext) -> Result<(), OptError> {
    let OptExpression::Operator { op, inputs } = root else {
        return Ok(());
    };
    match op {
        Operator::Logical(LogicalOperator::CteProduce(produce)) => {
            ctx.cte.register_producer(produce.cte_id);
        }
        Operator::Logical(LogicalOperator::CteConsume(consume)) => {
            ctx.cte.register_consumer(consume.cte_id);
        }
        _ => {}
    }
    for child in inputs {
        register_ctes(child, ctx)?;
    }
    Ok(())
}
