//! # Distribution Specs and Distributed-Join Feasibility
//!
//! In a distributed engine, join inputs must be physically arranged so that
//! matching rows meet on the same backend. The optimizer chooses between:
//!
//! - **Broadcast**: ship one side in full to every backend running the other.
//!   Always legal; cost grows with cluster size.
//! - **Shuffle**: hash-partition both sides on the join keys. Requires at least
//!   one equality predicate and is the default for large-large joins.
//! - **Replicated**: no data movement at all -- legal only when the smaller
//!   side's table is already fully replicated on every backend, so each backend
//!   can read its copy locally.
//!
//! The feasibility checks in this module are deliberately fail-safe: any missing
//! metadata, partial replica coverage, or version mismatch disqualifies the
//! cheaper strategy and the planner falls back to a network-moving one.

use crate::operator::JoinType;
use crate::scalar::{ColumnRef, ScalarOperator};
use crate::topology::{ClusterInfo, TableMeta};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How data is distributed across backends at an exchange boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DistributionSpec {
    /// No constraint.
    Any,
    /// Every row on every backend.
    Broadcast,
    /// Hash-partitioned on the given columns.
    Shuffle(Vec<ColumnRef>),
    /// All rows gathered to a single backend (final result assembly).
    Gather,
}

impl fmt::Display for DistributionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DistributionSpec::Any => write!(f, "ANY"),
            DistributionSpec::Broadcast => write!(f, "BROADCAST"),
            DistributionSpec::Shuffle(cols) => {
                write!(f, "SHUFFLE(")?;
                for (i, c) in cols.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", c)?;
                }
                write!(f, ")")
            }
            DistributionSpec::Gather => write!(f, "GATHER"),
        }
    }
}

/// The distribution strategy chosen for a hash join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinDistributionMode {
    Broadcast,
    Shuffle,
    Replicated,
}

impl fmt::Display for JoinDistributionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JoinDistributionMode::Broadcast => "BROADCAST",
            JoinDistributionMode::Shuffle => "SHUFFLE",
            JoinDistributionMode::Replicated => "REPLICATED",
        };
        write!(f, "{}", s)
    }
}

/// True when broadcast is the only legal distribution for this join.
///
/// Cross joins and NULL-aware left anti joins have no partitioning key a
/// shuffle could use without changing semantics; an inner join with no equality
/// predicate is in the same position. A `BROADCAST` hint forces the strategy
/// regardless of predicates.
pub fn can_only_do_broadcast(
    join_type: JoinType,
    equal_on_predicates: &[ScalarOperator],
    hint: Option<&str>,
) -> bool {
    join_type.is_cross()
        || join_type == JoinType::NullAwareLeftAnti
        || (join_type.is_inner() && equal_on_predicates.is_empty())
        || hint.is_some_and(|h| h.eq_ignore_ascii_case("BROADCAST"))
}

/// True when a replicated (no data movement) join is safe for the given scan.
///
/// Requires, for every selected partition: the partition's replication factor
/// covers every backend in the cluster, and every selected tablet has a
/// queryable replica on every *alive* backend at the partition's currently
/// visible data version. Any gap means some backend could not serve some tablet
/// locally, so the whole join is disqualified.
pub fn can_do_replicated_join(
    table: &TableMeta,
    selected_index_id: u64,
    selected_partition_ids: &[u64],
    selected_tablet_ids: &[u64],
    cluster: &dyn ClusterInfo,
) -> bool {
    let backend_size = cluster.backend_size();
    let alive_backend_size = cluster.backend_ids(true).len();
    let Some(schema_hash) = table.schema_hash_by_index(selected_index_id) else {
        return false;
    };

    for partition_id in selected_partition_ids {
        let Some(partition) = table.partition(*partition_id) else {
            return false;
        };
        if partition.replication_num < backend_size {
            return false;
        }
        let visible_version = partition.visible_version;
        let Some(index) = partition.index(selected_index_id) else {
            return false;
        };
        for tablet_id in selected_tablet_ids {
            if let Some(tablet) = index.tablet(*tablet_id) {
                if tablet.queryable_replica_count(visible_version, schema_hash)
                    != alive_backend_size
                {
                    return false;
                }
            }
        }
    }
    true
}
