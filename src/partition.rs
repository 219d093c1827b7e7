//! Weighted task partitioner
//!
//! ## Table of Contents
//! - **WeightedBlock**: A weight-bounded group of items dispatched as one unit
//! - **split_in_blocks**: First-fit weight-bounded chunking
//! - **split_in_blocks_by_key**: Stratified variant, one key per block
//!
//! The partitioner is O(n) and deterministic given a fixed input order; it is
//! not a bin-packing optimum. The per-block budget is
//! `ceil(total_weight / hint)`, rounded up so the block count stays within
//! the hint; every block satisfies
//! `block.weight <= max(heaviest_item, ceil(total_weight / hint))` and the
//! blocks partition the input exactly (no loss, no duplication).

use crate::types::GroupId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A weight-bounded group of items handed to one parallel worker
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightedBlock<T> {
    /// The items in input order
    pub items: Vec<T>,
    /// Sum of the item weights
    pub weight: f64,
    /// Grouping key, set by the stratified splitter
    pub key: Option<GroupId>,
}

impl<T> WeightedBlock<T> {
    fn new(key: Option<GroupId>) -> Self {
        Self {
            items: Vec::new(),
            weight: 0.0,
            key,
        }
    }

    /// Number of items in the block
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the block is empty
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Split weighted items into at most `hint` balanced blocks
///
/// Items are accumulated greedily into the current block until adding the
/// next item would exceed the `ceil(total_weight / hint)` budget, at which
/// point a new block is opened. A `hint` of 0 or an all-zero-weight input
/// degrades to a single block containing everything; an empty input yields
/// no blocks.
pub fn split_in_blocks<T>(
    items: Vec<T>,
    hint: usize,
    weight: impl Fn(&T) -> f64,
) -> Vec<WeightedBlock<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let total: f64 = items.iter().map(&weight).sum();
    if hint == 0 || total <= 0.0 {
        let mut block = WeightedBlock::new(None);
        block.weight = total;
        block.items = items;
        return vec![block];
    }
    let max_weight = (total / hint as f64).ceil();
    chunk(items, max_weight, None, weight)
}

/// Split weighted items into balanced blocks, stratified by grouping key
///
/// All items sharing a key land in blocks tagged with that key; blocks never
/// mix keys. The weight threshold is computed over the whole input, so keys
/// with little weight produce a single small block while heavy keys are
/// spread over several.
pub fn split_in_blocks_by_key<T>(
    items: Vec<T>,
    hint: usize,
    weight: impl Fn(&T) -> f64,
    key: impl Fn(&T) -> GroupId,
) -> Vec<WeightedBlock<T>> {
    if items.is_empty() {
        return Vec::new();
    }
    let total: f64 = items.iter().map(&weight).sum();
    let max_weight = if hint == 0 || total <= 0.0 {
        f64::INFINITY
    } else {
        (total / hint as f64).ceil()
    };

    let mut by_key: BTreeMap<GroupId, Vec<T>> = BTreeMap::new();
    for item in items {
        by_key.entry(key(&item)).or_default().push(item);
    }

    let mut blocks = Vec::new();
    for (k, group) in by_key {
        blocks.extend(chunk(group, max_weight, Some(k), &weight));
    }
    blocks
}

fn chunk<T>(
    items: Vec<T>,
    max_weight: f64,
    key: Option<GroupId>,
    weight: impl Fn(&T) -> f64,
) -> Vec<WeightedBlock<T>> {
    let mut blocks = Vec::new();
    let mut current = WeightedBlock::new(key);
    for item in items {
        let w = weight(&item);
        if !current.is_empty() && current.weight + w > max_weight {
            blocks.push(std::mem::replace(&mut current, WeightedBlock::new(key)));
        }
        current.weight += w;
        current.items.push(item);
    }
    if !current.is_empty() {
        blocks.push(current);
    }
    blocks
}
