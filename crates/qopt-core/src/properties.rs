//! # Physical Properties
//!
//! A required physical property set describes what a parent demands from a
//! child plan -- here, the data distribution. Groups record one winner per
//! required property set, so the same group can simultaneously have a cheapest
//! broadcast plan and a cheapest unconstrained plan.
//!
//! Distribution requirements that no existing expression satisfies are met by
//! exchange operators injected by implementation rules; the memo itself never
//! fabricates an enforcer.

use crate::distribution::DistributionSpec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PhysicalPropertySet {
    /// Required distribution; `None` means any distribution is acceptable.
    pub distribution: Option<DistributionSpec>,
}

impl PhysicalPropertySet {
    /// No requirements.
    pub fn any() -> Self {
        Self { distribution: None }
    }

    pub fn with_distribution(spec: DistributionSpec) -> Self {
        Self {
            distribution: Some(spec),
        }
    }

    /// Whether properties `provided` meet this requirement. No requirement is
    /// always satisfied; a distribution requirement needs an exact match.
    pub fn satisfied_by(&self, provided: &PhysicalPropertySet) -> bool {
        match (&self.distribution, &provided.distribution) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(required), Some(provided)) => required == provided,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_is_satisfied_by_everything() {
        let any = PhysicalPropertySet::any();
        assert!(any.satisfied_by(&PhysicalPropertySet::any()));
        assert!(any.satisfied_by(&PhysicalPropertySet::with_distribution(
            DistributionSpec::Broadcast
        )));
    }

    #[test]
    fn distribution_requires_exact_match() {
        let broadcast = PhysicalPropertySet::with_distribution(DistributionSpec::Broadcast);
        assert!(broadcast.satisfied_by(&broadcast));
        assert!(!broadcast.satisfied_by(&PhysicalPropertySet::any()));
        assert!(!broadcast.satisfied_by(&PhysicalPropertySet::with_distribution(
            DistributionSpec::Gather
        )));
    }
}
