//! # Cluster Topology Interface
//!
//! The optimizer treats the cluster topology service as an external collaborator:
//! it asks how many backends exist, which ones are alive, and where table
//! replicas live, and it never caches or retries those answers itself. The
//! [`ClusterInfo`] trait is the seam; [`InMemoryClusterInfo`] backs tests and
//! development.
//!
//! Replica placement is modeled down to the level the replicated-join check
//! needs: a table has partitions, each partition has a visible data version and
//! a replication factor, each materialized index has a schema hash and tablets,
//! and each tablet has replicas pinned to backends at some (version, schema
//! hash).

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Backend (compute node) identifier.
pub type BackendId = u64;

/// Topology collaborator: backend liveness and replica placement.
pub trait ClusterInfo: Send + Sync {
    /// Total number of backends registered in the cluster, dead or alive.
    fn backend_size(&self) -> usize;

    /// Ids of registered backends; restricted to live ones when `alive_only`.
    fn backend_ids(&self, alive_only: bool) -> BTreeSet<BackendId>;

    /// Replica metadata for a table, if the table is known to the catalog.
    fn table(&self, name: &str) -> Option<TableMeta>;
}

/// One replica of a tablet on one backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplicaMeta {
    pub backend_id: BackendId,
    /// Highest data version this replica has applied.
    pub version: u64,
    pub schema_hash: u32,
    /// Marked bad by the storage layer; never queryable.
    pub bad: bool,
}

/// The smallest unit of data placement.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TabletMeta {
    pub replicas: Vec<ReplicaMeta>,
}

impl TabletMeta {
    /// Number of replicas that can serve a query at the given data version and
    /// schema hash. A replica qualifies when it is not bad, has caught up to
    /// the version, and matches the schema.
    pub fn queryable_replica_count(&self, version: u64, schema_hash: u32) -> usize {
        self.replicas
            .iter()
            .filter(|r| !r.bad && r.version >= version && r.schema_hash == schema_hash)
            .count()
    }
}

/// A materialized index within a partition.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexMeta {
    pub tablets: BTreeMap<u64, TabletMeta>,
}

impl IndexMeta {
    pub fn tablet(&self, id: u64) -> Option<&TabletMeta> {
        self.tablets.get(&id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionMeta {
    /// The data version visible to queries right now.
    pub visible_version: u64,
    /// Number of replicas each tablet of this partition is supposed to have.
    pub replication_num: usize,
    pub indexes: BTreeMap<u64, IndexMeta>,
}

impl PartitionMeta {
    pub fn index(&self, id: u64) -> Option<&IndexMeta> {
        self.indexes.get(&id)
    }
}

/// Replica-placement view of one OLAP table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableMeta {
    pub name: String,
    pub partitions: BTreeMap<u64, PartitionMeta>,
    /// Schema hash per materialized index id, table-wide.
    pub index_schema_hash: BTreeMap<u64, u32>,
}

impl TableMeta {
    pub fn partition(&self, id: u64) -> Option<&PartitionMeta> {
        self.partitions.get(&id)
    }

    pub fn schema_hash_by_index(&self, index_id: u64) -> Option<u32> {
        self.index_schema_hash.get(&index_id).copied()
    }
}

/// In-memory topology for tests and development.
#[derive(Debug, Clone, Default)]
pub struct InMemoryClusterInfo {
    backends: BTreeMap<BackendId, bool>,
    tables: BTreeMap<String, TableMeta>,
}

impl InMemoryClusterInfo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_backend(&mut self, id: BackendId, alive: bool) {
        self.backends.insert(id, alive);
    }

    pub fn add_table(&mut self, table: TableMeta) {
        self.tables.insert(table.name.clone(), table);
    }
}

impl ClusterInfo for InMemoryClusterInfo {
    fn backend_size(&self) -> usize {
        self.backends.len()
    }

    fn backend_ids(&self, alive_only: bool) -> BTreeSet<BackendId> {
        self.backends
            .iter()
            .filter(|(_, alive)| !alive_only || **alive)
            .map(|(id, _)| *id)
            .collect()
    }

    fn table(&self, name: &str) -> Option<TableMeta> {
        self.tables.get(name).cloned()
    }
}
