//! # Fragment Compilation and Explain
//!
//! The winning physical tree is cut into fragments at exchange boundaries:
//! each [`PhysicalDistribution`] node becomes an exchange node in the parent
//! fragment, and the subtree beneath it becomes a child fragment whose stream
//! sink references the exchange's plan node id. The root fragment ends in a
//! result sink.
//!
//! Plan node ids are assigned in pre-order during the walk, so the explain
//! rendering and the sink descriptors agree on ids.

use crate::sink::{
    DataPartition, DataSink, DataStreamSink, ExplainLevel, PlanNodeId, ResultSink,
};
use qopt_core::distribution::DistributionSpec;
use qopt_core::error::OptError;
use qopt_core::operator::{Operator, OptExpression, PhysicalOperator};
use qopt_core::scalar::ScalarOperator;

/// One execution fragment: the id of its root plan node and its sink.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanFragment {
    pub root_node_id: PlanNodeId,
    pub sink: DataSink,
}

/// The compiled plan: fragments in execution order, root fragment first.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledPlan {
    pub fragments: Vec<PlanFragment>,
}

/// Split a physical plan into fragments with sink descriptors.
pub fn compile(plan: &OptExpression) -> Result<CompiledPlan, OptError> {
    let mut builder = FragmentBuilder::default();
    let root_id = builder.walk(plan)?;
    let mut fragments = vec![PlanFragment {
        root_node_id: root_id,
        sink: DataSink::Result(ResultSink {
            ref_node_id: root_id,
        }),
    }];
    fragments.extend(builder.fragments);
    Ok(CompiledPlan { fragments })
}

#[derive(Default)]
struct FragmentBuilder {
    next_id: i32,
    fragments: Vec<PlanFragment>,
}

impl FragmentBuilder {
    fn alloc(&mut self) -> PlanNodeId {
        let id = PlanNodeId::new(self.next_id);
        self.next_id += 1;
        id
    }

    fn walk(&mut self, expr: &OptExpression) -> Result<PlanNodeId, OptError> {
        let OptExpression::Operator { op, inputs } = expr else {
            return Err(OptError::InvalidPlan(
                "unresolved group reference in physical plan".into(),
            ));
        };
        let Operator::Physical(physical) = op else {
            return Err(OptError::InvalidPlan(format!(
                "logical operator {:?} in physical plan",
                op.kind()
            )));
        };

        let id = self.alloc();
        if let PhysicalOperator::Distribution(dist) = physical {
            // Exchange boundary: the subtree becomes its own fragment whose
            // stream sink references this exchange node.
            let child_root = self.walk(&inputs[0])?;
            let mut sink = DataStreamSink::new(id);
            if let Some(partition) = partition_for(&dist.spec) {
                sink.set_partition(partition);
            }
            self.fragments.push(PlanFragment {
                root_node_id: child_root,
                sink: DataSink::Stream(sink),
            });
        } else {
            for child in inputs {
                self.walk(child)?;
            }
        }
        Ok(id)
    }
}

/// Output partitioning of the stream sink feeding an exchange.
fn partition_for(spec: &DistributionSpec) -> Option<DataPartition> {
    match spec {
        DistributionSpec::Any => None,
        DistributionSpec::Broadcast | DistributionSpec::Gather => {
            Some(DataPartition::Unpartitioned)
        }
        DistributionSpec::Shuffle(columns) => Some(DataPartition::HashPartitioned {
            exprs: columns
                .iter()
                .map(|c| ScalarOperator::column(c.clone()))
                .collect(),
        }),
    }
}

/// Plain-text rendering of a physical plan.
pub fn explain(plan: &OptExpression, level: ExplainLevel) -> String {
    let mut out = String::new();
    let mut next_id = 0;
    render(plan, level, 0, &mut next_id, &mut out);
    out
}

fn render(
    expr: &OptExpression,
    level: ExplainLevel,
    depth: usize,
    next_id: &mut i32,
    out: &mut String,
) {
    let indent = "  ".repeat(depth);
    let OptExpression::Operator { op, inputs } = expr else {
        out.push_str(&format!("{}?:UNRESOLVED GROUP\n", indent));
        return;
    };
    let id = *next_id;
    *next_id += 1;

    let title = match op {
        Operator::Physical(p) => physical_title(p),
        Operator::Logical(_) => format!("{:?}", op.kind()),
    };
    out.push_str(&format!("{}{}:{}\n", indent, id, title));

    if level == ExplainLevel::Verbose {
        let detail_indent = format!("{}   ", indent);
        if let Some(predicate) = op.predicate() {
            out.push_str(&format!("{}predicate: {}\n", detail_indent, predicate));
        }
        if let Some(projection) = op.projection() {
            let cols: Vec<String> = projection
                .column_refs
                .keys()
                .map(|c| c.to_string())
                .collect();
            out.push_str(&format!("{}projection: {}\n", detail_indent, cols.join(", ")));
        }
        if let Some(limit) = op.limit() {
            out.push_str(&format!("{}limit: {}\n", detail_indent, limit));
        }
    }

    for child in inputs {
        render(child, level, depth + 1, next_id, out);
    }
}

fn physical_title(op: &PhysicalOperator) -> String {
    match op {
        PhysicalOperator::Scan(scan) => format!("SCAN {}", scan.table),
        PhysicalOperator::Project(_) => "PROJECT".to_string(),
        PhysicalOperator::HashJoin(join) => {
            format!("HASH JOIN ({:?}, {})", join.join_type, join.mode)
        }
        PhysicalOperator::HashAggregate(_) => "AGGREGATE".to_string(),
        PhysicalOperator::Distribution(dist) => format!("EXCHANGE ({})", dist.spec),
        PhysicalOperator::CteProduce(produce) => format!("CTE PRODUCE {}", produce.cte_id),
        PhysicalOperator::CteConsume(consume) => format!("CTE CONSUME {}", consume.cte_id),
    }
}
