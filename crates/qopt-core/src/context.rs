//! # Optimizer Context
//!
//! One [`OptimizerContext`] is created per optimization request and discarded
//! with it. It threads every external collaborator explicitly -- statistics,
//! cluster topology, session variables, the CTE registry, and the cancellation
//! flag -- so that no component ever reaches for process-wide state.
//!
//! The context is read-only during rule application; the CTE registry is
//! populated by the engine from the input tree before the search starts.

use crate::operator::CteId;
use crate::statistics::StatisticStorage;
use crate::topology::ClusterInfo;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::OptError;

/// Session-scoped knobs consulted during planning.
#[derive(Debug, Clone)]
pub struct SessionVariables {
    /// Join strategy hint from the query text (`BROADCAST` / `SHUFFLE`).
    pub join_implementation_hint: Option<String>,
    /// Whether replicated joins may be considered at all.
    pub enable_replicated_join: bool,
    /// Budget on rule applications for one request. Exhausting it stops
    /// exploration and proceeds to costing; it is not an error.
    pub max_exploration_iterations: usize,
}

impl Default for SessionVariables {
    fn default() -> Self {
        Self {
            join_implementation_hint: None,
            enable_replicated_join: false,
            max_exploration_iterations: 10_000,
        }
    }
}

/// Registry of CTE producers and their reference counts for one request.
///
/// Producers and consumers are linked by [`CteId`], never by pointer; the
/// registry only records which ids exist and how often they are consumed, so
/// rules can refuse to implement a consumer whose producer is absent.
#[derive(Debug, Clone, Default)]
pub struct CteContext {
    producers: HashMap<CteId, ()>,
    consumer_counts: HashMap<CteId, usize>,
}

impl CteContext {
    pub fn register_producer(&mut self, id: CteId) {
        self.producers.insert(id, ());
    }

    pub fn register_consumer(&mut self, id: CteId) {
        *self.consumer_counts.entry(id).or_insert(0) += 1;
    }

    pub fn has_producer(&self, id: CteId) -> bool {
        self.producers.contains_key(&id)
    }

    pub fn consumer_count(&self, id: CteId) -> usize {
        self.consumer_counts.get(&id).copied().unwrap_or(0)
    }
}

/// Per-request optimizer state.
pub struct OptimizerContext {
    statistics: Arc<dyn StatisticStorage>,
    cluster: Arc<dyn ClusterInfo>,
    pub session: SessionVariables,
    pub cte: CteContext,
    cancelled: Arc<AtomicBool>,
}

impl OptimizerContext {
    pub fn new(statistics: Arc<dyn StatisticStorage>, cluster: Arc<dyn ClusterInfo>) -> Self {
        Self {
            statistics,
            cluster,
            session: SessionVariables::default(),
            cte: CteContext::default(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_session(mut self, session: SessionVariables) -> Self {
        self.session = session;
        self
    }

    pub fn statistics(&self) -> &dyn StatisticStorage {
        self.statistics.as_ref()
    }

    pub fn cluster(&self) -> &dyn ClusterInfo {
        self.cluster.as_ref()
    }

    /// Handle for an external party (e.g. a session kill) to request
    /// cancellation. The engine observes it between rule applications.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn check_cancelled(&self) -> Result<(), OptError> {
        if self.cancelled.load(Ordering::Relaxed) {
            Err(OptError::Cancelled)
        } else {
            Ok(())
        }
    }
}
