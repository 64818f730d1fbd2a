use serde::{Deserialize, Serialize};

use crate::status::Status;

/// Per-edge transform from a child's status to the edge's contribution.
/// Pure, pluggable strategies; `map` returning `None` means the edge
/// contributes the process default severity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MapFunction {
    /// Pass the child's status through unchanged.
    Identity,
    /// Contribute nothing, whatever the child's status.
    Ignore,
    /// One severity step above the child's status.
    Increase,
    /// One severity step below the child's status.
    Decrease,
    /// A fixed severity, regardless of the child's status.
    SetTo(Status),
}

impl MapFunction {
    pub fn map(&self, status: Status) -> Option<Status> {
        match self {
            MapFunction::Identity => Some(status),
            MapFunction::Ignore => None,
            MapFunction::Increase => Some(status.increased()),
            MapFunction::Decrease => Some(status.decreased()),
            MapFunction::SetTo(fixed) => Some(*fixed),
        }
    }
}

impl Default for MapFunction {
    fn default() -> Self {
        MapFunction::Identity
    }
}

/// Per-vertex aggregation over the weighted multiset of child edge
/// statuses. Every variant is order-insensitive, so the weight expansion
/// may emit statuses in any order.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ReduceFunction {
    /// Worst case: the maximum of the inputs.
    HighestSeverity,
    /// The maximum of the inputs strictly above the given threshold;
    /// nothing when no input exceeds it.
    HighestSeverityAbove(Status),
    /// The highest severity reached or exceeded by at least the given
    /// fraction of the inputs (0 < ratio <= 1).
    Threshold(f64),
    /// Logarithmic accumulation: each input above normal contributes
    /// `base^(severity - warning)`, and the result is `warning +
    /// floor(log_base(sum))`, capped at critical.
    ExponentialPropagation(f64),
}

impl ReduceFunction {
    pub fn reduce(&self, statuses: &[Status]) -> Option<Status> {
        match self {
            ReduceFunction::HighestSeverity => statuses.iter().max().copied(),
            ReduceFunction::HighestSeverityAbove(threshold) => statuses
                .iter()
                .filter(|s| *s > threshold)
                .max()
                .copied(),
            ReduceFunction::Threshold(ratio) => {
                if statuses.is_empty() {
                    return None;
                }
                let mut sorted = statuses.to_vec();
                sorted.sort_unstable_by(|a, b| b.cmp(a));
                let total = sorted.len() as f64;
                // Walking in descending order, (i + 1) / total is the
                // fraction of inputs at or above sorted[i].
                sorted
                    .iter()
                    .enumerate()
                    .find(|(i, _)| (*i as f64 + 1.0) / total >= *ratio)
                    .map(|(_, s)| *s)
            }
            ReduceFunction::ExponentialPropagation(base) => {
                let sum: f64 = statuses
                    .iter()
                    .filter(|s| **s > Status::Normal)
                    .map(|s| base.powi(*s as i32 - Status::Warning as i32))
                    .sum();
                if sum == 0.0 {
                    return None;
                }
                let above = (sum.ln() / base.ln()).floor() as i32;
                let i = (Status::Warning as i32 + above).min(Status::Critical as i32);
                Some(match i {
                    2 => Status::Warning,
                    3 => Status::Minor,
                    4 => Status::Major,
                    _ => Status::Critical,
                })
            }
        }
    }
}

impl Default for ReduceFunction {
    fn default() -> Self {
        ReduceFunction::HighestSeverity
    }
}
