//! Full pipeline: logical tree -> optimizer -> fragments + explain.

use qopt_core::context::OptimizerContext;
use qopt_core::cost::DefaultCostModel;
use qopt_core::operator::{
    JoinType, LogicalJoin, LogicalOperator, LogicalScan, OperatorBase, OptExpression,
};
use qopt_core::properties::PhysicalPropertySet;
use qopt_core::scalar::{BinaryKind, ColumnRef, ScalarOperator};
use qopt_core::search::Optimizer;
use qopt_core::statistics::{ColumnStatistic, InMemoryStatisticStorage, TableStatistics};
use qopt_core::topology::InMemoryClusterInfo;
use qopt_core::types::ScalarType;
use qopt_plan::fragment::{compile, explain};
use qopt_plan::sink::{DataSink, ExplainLevel, SinkKind};
use std::sync::Arc;

fn scan(table: &str, column: ColumnRef) -> OptExpression {
    OptExpression::logical(
        LogicalOperator::Scan(LogicalScan {
            base: OperatorBase::default(),
            table: table.into(),
            columns: vec![column],
            selected_index_id: 1,
            selected_partition_ids: vec![10],
            selected_tablet_ids: vec![100],
        }),
        vec![],
    )
}

fn optimized_join_plan() -> OptExpression {
    let a = ColumnRef::new(1, "a", ScalarType::Int);
    let b = ColumnRef::new(2, "b", ScalarType::Int);
    let tree = OptExpression::logical(
        LogicalOperator::Join(LogicalJoin {
            base: OperatorBase::default(),
            join_type: JoinType::Inner,
            on_predicate: Some(ScalarOperator::binary(
                BinaryKind::Eq,
                ScalarOperator::column(a.clone()),
                ScalarOperator::column(b.clone()),
            )),
        }),
        vec![scan("t1", a), scan("t2", b)],
    );

    let mut stats = InMemoryStatisticStorage::new();
    stats.add_table(
        "t1",
        TableStatistics::new(1_000_000.0).with_column("a", ColumnStatistic::new(100_000.0, 0.0)),
    );
    stats.add_table(
        "t2",
        TableStatistics::new(100.0).with_column("b", ColumnStatistic::new(100.0, 0.0)),
    );
    let mut cluster = InMemoryClusterInfo::new();
    for id in 0..3 {
        cluster.add_backend(id, true);
    }

    let mut optimizer = Optimizer::new(
        Arc::new(qopt_rules::default_rule_registry()),
        Arc::new(DefaultCostModel::default()),
    );
    let mut ctx = OptimizerContext::new(Arc::new(stats), Arc::new(cluster));
    optimizer
        .optimize(&tree, &PhysicalPropertySet::any(), &mut ctx)
        .unwrap()
}

#[test]
fn optimized_plan_compiles_into_fragments() {
    let plan = optimized_join_plan();
    let compiled = compile(&plan).unwrap();

    // One fragment per exchange boundary plus the root fragment.
    assert!(compiled.fragments.len() >= 2);
    assert_eq!(compiled.fragments[0].sink.kind(), SinkKind::ResultSink);

    for fragment in &compiled.fragments[1..] {
        let DataSink::Stream(stream) = &fragment.sink else {
            panic!("child fragments must end in stream sinks");
        };
        assert!(stream.exch_node_id.as_i32() >= 0);
    }
}

#[test]
fn explain_renders_the_chosen_distribution() {
    let plan = optimized_join_plan();

    let brief = explain(&plan, ExplainLevel::Brief);
    assert!(brief.contains("HASH JOIN"));
    assert!(brief.contains("SCAN t1"));
    assert!(brief.contains("SCAN t2"));
    assert!(brief.contains("EXCHANGE"));

    let verbose = explain(&plan, ExplainLevel::Verbose);
    // Verbose output is a superset of brief structure.
    assert!(verbose.lines().count() >= brief.lines().count());
}
