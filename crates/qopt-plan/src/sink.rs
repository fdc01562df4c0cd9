//! # Data Sink Descriptors
//!
//! A plan fragment ends in a data sink: either a stream sink forwarding rows to
//! an exchange node in the parent fragment, or a result sink returning rows to
//! the client. The descriptors here carry exactly what the execution layer
//! needs to wire fragments together -- the referenced exchange node id, the
//! output partitioning (absent means a single unpartitioned stream), and
//! whether the consumer merge-sorts its input streams.

use qopt_core::scalar::ScalarOperator;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a plan node inside the compiled plan. Always non-negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanNodeId(i32);

impl PlanNodeId {
    /// # Panics
    /// Panics on a negative id; ids are assigned by the fragment builder and a
    /// negative one is a builder bug.
    pub fn new(id: i32) -> Self {
        assert!(id >= 0, "plan node id must be non-negative, got {}", id);
        Self(id)
    }

    pub fn as_i32(&self) -> i32 {
        self.0
    }
}

impl fmt::Display for PlanNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}", self.0)
    }
}

/// Explain verbosity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplainLevel {
    Brief,
    Verbose,
}

/// How a sink partitions its output rows across consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataPartition {
    /// A single stream; no partitioning.
    Unpartitioned,
    /// Rows spread round-robin for load balancing.
    Random,
    /// Hash-partitioned on the given expressions.
    HashPartitioned { exprs: Vec<ScalarOperator> },
}

impl DataPartition {
    pub fn explain_string(&self, level: ExplainLevel) -> String {
        match self {
            DataPartition::Unpartitioned => "UNPARTITIONED".to_string(),
            DataPartition::Random => "RANDOM".to_string(),
            DataPartition::HashPartitioned { exprs } => {
                let rendered: Vec<String> = exprs.iter().map(|e| e.to_string()).collect();
                match level {
                    ExplainLevel::Brief => format!("HASH_PARTITIONED: {}", rendered.join(", ")),
                    ExplainLevel::Verbose => format!(
                        "HASH_PARTITIONED: [{}]",
                        rendered.join(", ")
                    ),
                }
            }
        }
    }
}

/// Discriminant of a sink descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SinkKind {
    DataStreamSink,
    ResultSink,
}

/// Sink forwarding a fragment's rows to an exchange node in its parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataStreamSink {
    pub exch_node_id: PlanNodeId,
    /// Absent means an unpartitioned single stream.
    pub output_partition: Option<DataPartition>,
    /// Whether the receiving exchange merge-sorts its input streams.
    pub is_merge: bool,
}

impl DataStreamSink {
    pub fn new(exch_node_id: PlanNodeId) -> Self {
        Self {
            exch_node_id,
            output_partition: None,
            is_merge: false,
        }
    }

    pub fn set_partition(&mut self, partition: DataPartition) {
        self.output_partition = Some(partition);
    }

    pub fn set_merge(&mut self, is_merge: bool) {
        self.is_merge = is_merge;
    }

    pub fn explain_string(&self, prefix: &str, level: ExplainLevel) -> String {
        match level {
            ExplainLevel::Brief => {
                let mut s = String::new();
                s.push_str(&format!("{}STREAM DATA SINK\n", prefix));
                s.push_str(&format!("{}  EXCHANGE ID: {}\n", prefix, self.exch_node_id));
                if let Some(partition) = &self.output_partition {
                    s.push_str(&format!(
                        "{}  {}\n",
                        prefix,
                        partition.explain_string(level)
                    ));
                }
                s
            }
            ExplainLevel::Verbose => {
                let mut s = String::new();
                if let Some(partition) = &self.output_partition {
                    s.push_str(&format!(
                        "{}OutPut Partition: {}\n",
                        prefix,
                        partition.explain_string(level)
                    ));
                }
                s.push_str(&format!(
                    "{}OutPut Exchange Id: {}\n",
                    prefix, self.exch_node_id
                ));
                s
            }
        }
    }
}

/// Sink returning the root fragment's rows to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSink {
    pub ref_node_id: PlanNodeId,
}

impl ResultSink {
    pub fn explain_string(&self, prefix: &str, _level: ExplainLevel) -> String {
        format!("{}RESULT SINK\n", prefix)
    }
}

/// A fragment's sink descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataSink {
    Stream(DataStreamSink),
    Result(ResultSink),
}

impl DataSink {
    pub fn kind(&self) -> SinkKind {
        match self {
            DataSink::Stream(_) => SinkKind::DataStreamSink,
            DataSink::Result(_) => SinkKind::ResultSink,
        }
    }

    pub fn explain_string(&self, prefix: &str, level: ExplainLevel) -> String {
        match self {
            DataSink::Stream(s) => s.explain_string(prefix, level),
            DataSink::Result(s) => s.explain_string(prefix, level),
        }
    }
}
