//! Optimizer error taxonomy.
//!
//! Only search-fatal conditions surface here: a rule failing mid-transform,
//! cancellation, or a request the memo cannot produce a plan for. Best-effort
//! degradations (unknown statistics, refused constant casts) are `Option`s at
//! their call sites and never become errors; contract violations (e.g. an empty
//! column list where one element is required) panic at the precondition.

use crate::memo::GroupId;

#[derive(Debug, thiserror::Error)]
pub enum OptError {
    /// A rule's transform failed. Rules must be total over their inputs, so
    /// this aborts the whole optimization request.
    #[error("rule {rule} failed: {message}")]
    RuleFailed {
        rule: &'static str,
        message: String,
    },

    /// The request was cancelled cooperatively between rule applications.
    #[error("optimization cancelled")]
    Cancelled,

    /// No physical expression satisfied the required properties for a group.
    #[error("no physical plan found for group {0}")]
    NoPlanFound(GroupId),

    /// The input tree or a rule output violated a structural invariant.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}
