//! Observability (spec. "Observability" line): a name-keyed tree of
//! per-processor counters, aggregated by [`crate::simulation::Processor::stats`]
//! and exposed as a whole via `RootCoordinator::stats`. The kernel never
//! ships these anywhere itself — no metrics exporter, no wire format —
//! it only counts and hands the tree to whichever embedder asked for it.

use std::collections::HashMap;

/// Per-processor invocation counters. Atomic processors populate every
/// field except `select_calls`; coordinators populate `select_calls` and
/// leave the transition-function fields at zero (a coordinator itself
/// has no δ/λ/ta of its own).
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ModelStats {
    pub ta_calls: u64,
    pub lambda_calls: u64,
    pub delta_int_calls: u64,
    pub delta_ext_calls: u64,
    pub delta_conf_calls: u64,
    pub select_calls: u64,
    pub messages_in: u64,
    pub messages_out: u64,
}

/// A recursive, name-keyed snapshot of the processor tree's statistics at
/// the moment [`crate::simulation::RootCoordinator::stats`] was called.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct StatsTree {
    pub name: String,
    pub own: ModelStats,
    pub children: HashMap<String, StatsTree>,
}

impl StatsTree {
    pub fn leaf(name: &str, own: ModelStats) -> Self {
        Self {
            name: name.to_string(),
            own,
            children: HashMap::new(),
        }
    }

    pub fn coupled(name: &str, own: ModelStats, children: Vec<StatsTree>) -> Self {
        Self {
            name: name.to_string(),
            own,
            children: children.into_iter().map(|c| (c.name.clone(), c)).collect(),
        }
    }

    /// Sums a single counter across this node and every descendant.
    pub fn total_select_calls(&self) -> u64 {
        self.own.select_calls
            + self
                .children
                .values()
                .map(StatsTree::total_select_calls)
                .sum::<u64>()
    }

    pub fn total_lambda_calls(&self) -> u64 {
        self.own.lambda_calls
            + self
                .children
                .values()
                .map(StatsTree::total_lambda_calls)
                .sum::<u64>()
    }
}
