//! Ground-motion-model logic tree
//!
//! ## Table of Contents
//! - **GsimBranch**: One weighted ground-motion-model choice for a region type
//! - **GsimLogicTree**: Per-region-type branch sets with enumerate/reduce/sample
//! - **GsimRealization**: One full path through the tree
//!
//! Region types are kept in sorted order so that enumeration and path ids are
//! deterministic regardless of construction order. Sampling is a pure
//! function of an explicit seed; no shared random state is mutated.

use crate::error::{HazardError, Result};
use crate::types::{BranchPath, Gsim};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One weighted ground-motion-model branch for a single region type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsimBranch {
    /// Tectonic region type the branch applies to
    pub trt: String,
    /// Branch label, unique within its region type
    pub id: String,
    /// The ground-motion model
    pub gsim: Gsim,
    /// Prior weight of the branch
    pub weight: f64,
}

impl GsimBranch {
    /// Create a new branch
    pub fn new(
        trt: impl Into<String>,
        id: impl Into<String>,
        gsim: impl Into<Gsim>,
        weight: f64,
    ) -> Self {
        Self {
            trt: trt.into(),
            id: id.into(),
            gsim: gsim.into(),
            weight,
        }
    }
}

/// One fully-resolved path through the ground-motion logic tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsimRealization {
    /// Position in enumeration or sampling order
    pub ordinal: usize,
    /// Branch labels along the path, in region-type order
    pub lt_path: BranchPath,
    /// Product of the branch weights along the path
    pub weight: f64,
    /// Chosen ground-motion model per region type
    pub gsim_by_trt: BTreeMap<String, Gsim>,
}

impl GsimRealization {
    /// Unique identifier of the path
    pub fn uid(&self) -> String {
        self.lt_path.uid()
    }

    /// The ground-motion model chosen for a region type, if any
    pub fn gsim(&self, trt: &str) -> Option<&Gsim> {
        self.gsim_by_trt.get(trt)
    }
}

/// The ground-motion logic tree of one source-model branch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GsimLogicTree {
    branches_by_trt: BTreeMap<String, Vec<GsimBranch>>,
}

impl GsimLogicTree {
    /// Build a tree from branches, grouping them by region type
    ///
    /// The branch weights of each region type must sum to 1 within 1e-6.
    pub fn new(branches: Vec<GsimBranch>) -> Result<Self> {
        let mut branches_by_trt: BTreeMap<String, Vec<GsimBranch>> = BTreeMap::new();
        for branch in branches {
            branches_by_trt.entry(branch.trt.clone()).or_default().push(branch);
        }
        for (trt, branches) in &branches_by_trt {
            let total: f64 = branches.iter().map(|b| b.weight).sum();
            if (total - 1.0).abs() > 1e-6 {
                return Err(HazardError::logic_tree(format!(
                    "branch weights for {trt} sum to {total}, expected 1"
                )));
            }
        }
        Ok(Self { branches_by_trt })
    }

    /// The region types covered by the tree, in sorted order
    pub fn trts(&self) -> impl Iterator<Item = &str> {
        self.branches_by_trt.keys().map(String::as_str)
    }

    /// The branches declared for a region type
    pub fn branches(&self, trt: &str) -> &[GsimBranch] {
        self.branches_by_trt.get(trt).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of full paths through the tree
    pub fn num_paths(&self) -> u64 {
        if self.branches_by_trt.is_empty() {
            return 0;
        }
        self.branches_by_trt
            .values()
            .map(|branches| branches.len() as u64)
            .product()
    }

    /// Drop every region type not in the effective set (one-time pass)
    pub fn reduce(&mut self, effective_trts: &BTreeSet<String>) {
        self.branches_by_trt.retain(|trt, _| effective_trts.contains(trt));
    }

    /// Enumerate every full path exhaustively, in deterministic order
    ///
    /// Returns an empty list for an empty tree: a branch whose tree reduced
    /// to nothing contributes no realizations.
    pub fn enumerate(&self) -> Vec<GsimRealization> {
        if self.branches_by_trt.is_empty() {
            return Vec::new();
        }
        let mut paths: Vec<(Vec<String>, f64, BTreeMap<String, Gsim>)> =
            vec![(Vec::new(), 1.0, BTreeMap::new())];
        for (trt, branches) in &self.branches_by_trt {
            let mut next = Vec::with_capacity(paths.len() * branches.len());
            for (labels, weight, gsims) in &paths {
                for branch in branches {
                    let mut labels = labels.clone();
                    labels.push(branch.id.clone());
                    let mut gsims = gsims.clone();
                    gsims.insert(trt.clone(), branch.gsim.clone());
                    next.push((labels, weight * branch.weight, gsims));
                }
            }
            paths = next;
        }
        paths
            .into_iter()
            .enumerate()
            .map(|(ordinal, (labels, weight, gsim_by_trt))| GsimRealization {
                ordinal,
                lt_path: BranchPath::new(labels),
                weight,
                gsim_by_trt,
            })
            .collect()
    }

    /// Draw `n` full paths with weight-proportional branch choices
    ///
    /// The draws come from a single `StdRng` seeded with `seed`, so the
    /// result is a pure function of `(self, n, seed)` and parallel-safe.
    pub fn sample(&self, n: usize, seed: u64) -> Vec<GsimRealization> {
        if self.branches_by_trt.is_empty() {
            return Vec::new();
        }
        let mut rng = StdRng::seed_from_u64(seed);
        (0..n)
            .map(|ordinal| {
                let mut labels = Vec::with_capacity(self.branches_by_trt.len());
                let mut weight = 1.0;
                let mut gsim_by_trt = BTreeMap::new();
                for (trt, branches) in &self.branches_by_trt {
                    let branch = pick(branches, rng.gen::<f64>());
                    labels.push(branch.id.clone());
                    weight *= branch.weight;
                    gsim_by_trt.insert(trt.clone(), branch.gsim.clone());
                }
                GsimRealization {
                    ordinal,
                    lt_path: BranchPath::new(labels),
                    weight,
                    gsim_by_trt,
                }
            })
            .collect()
    }
}

/// Pick a branch by cumulative weight; `x` is uniform in [0, 1)
fn pick(branches: &[GsimBranch], x: f64) -> &GsimBranch {
    let mut acc = 0.0;
    for branch in branches {
        acc += branch.weight;
        if x < acc {
            return branch;
        }
    }
    // x landed beyond the accumulated weights through rounding
    &branches[branches.len() - 1]
}
