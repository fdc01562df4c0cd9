//! # qopt-plan: Plan Output Adapter
//!
//! The serialization boundary between the optimizer and the distributed
//! execution layer. Given the winning physical plan, this crate:
//!
//! - splits it into fragments at exchange boundaries and emits one data-sink
//!   descriptor per fragment ([`fragment`]);
//! - renders a plain-text explain tree at brief and verbose levels.
//!
//! There is no decision logic here: every choice (distribution, merge
//! behavior, operator order) was made during the search, and this crate only
//! writes it down in the form the execution layer consumes.

pub mod fragment;
pub mod sink;
