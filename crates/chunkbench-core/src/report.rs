use serde::Serialize;

use crate::aggregate::{ResultRecord, SweepSummary};
use chunkbench_common::ChunkRange;

/// Everything one benchmark run produced, in collector order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Report {
    pub records: Vec<ResultRecord>,
}

impl Report {
    pub fn summaries(&self) -> impl Iterator<Item = &SweepSummary> {
        self.records.iter().filter_map(|r| match r {
            ResultRecord::Summary(s) => Some(s),
            ResultRecord::Failure { .. } => None,
        })
    }

    pub fn failures(&self) -> impl Iterator<Item = (ChunkRange, &str)> {
        self.records.iter().filter_map(|r| match r {
            ResultRecord::Failure { range, error } => Some((*range, error.as_str())),
            ResultRecord::Summary(_) => None,
        })
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
