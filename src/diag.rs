//! Processing diagnostics
//!
//! ## Table of Contents
//! - **SourceInfo**: Per-source filter/weight/split timing record
//! - **DataTransfer**: Forward-payload summary over dispatched blocks
//!
//! Everything here is for performance triage only and is never read back
//! into the calculation.

use crate::partition::WeightedBlock;
use crate::types::GroupId;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One record per processed source, produced by the filter/splitter pass
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceInfo {
    /// Owning region-type group
    pub group_id: GroupId,
    /// Source identifier
    pub source_id: String,
    /// Source class name
    pub source_class: String,
    /// Weight after processing
    pub weight: f64,
    /// Number of fragments the source was split into
    pub split_num: usize,
    /// Time spent in distance filtering
    pub filter_time: Duration,
    /// Time spent computing the weight
    pub weight_time: Duration,
    /// Time spent splitting
    pub split_time: Duration,
}

impl SourceInfo {
    /// Total processing time for this source
    pub fn total_time(&self) -> Duration {
        self.filter_time + self.weight_time + self.split_time
    }
}

/// Sort records descending by total processing time (slowest first)
pub fn sort_by_total_time(infos: &mut [SourceInfo]) {
    infos.sort_by(|a, b| b.total_time().cmp(&a.total_time()));
}

/// Summary of the payload handed to the worker pool
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DataTransfer {
    /// Number of blocks dispatched
    pub blocks: usize,
    /// Total number of items across blocks
    pub items: usize,
    /// Total weight across blocks
    pub total_weight: f64,
}

impl DataTransfer {
    /// Summarize the blocks generated by the partitioner
    pub fn from_blocks<T>(blocks: &[WeightedBlock<T>]) -> Self {
        Self {
            blocks: blocks.len(),
            items: blocks.iter().map(|b| b.len()).sum(),
            total_weight: blocks.iter().map(|b| b.weight).sum(),
        }
    }
}
