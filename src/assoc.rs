//! Realizations and the realization-association index
//!
//! ## Table of Contents
//! - **LtRealization**: One point in the full composite logic tree
//! - **agg_prob**: Probability-union aggregation function
//! - **RlzsAssoc**: (group, gsim) -> realizations index with the combine primitives
//! - **CompositeSourceModel::rlzs_assoc**: The realization builder
//!
//! `RlzsAssoc` is built once per calculation and is immutable afterwards, so
//! the aggregation index needs no locking: only the (thread-confined) reduce
//! accumulators mutate during a parallel run.

use crate::composite::{CompositeSourceModel, CompositionInfo, TrtModel};
use crate::error::{HazardError, Result};
use crate::logictree::GsimRealization;
use crate::types::{BranchPath, ColId, GroupId, Gsim};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use tracing::{info, warn};

/// Aggregation function for probabilities of independent events
///
/// Commutative, associative, and `agg_prob(0, x) == x`.
pub fn agg_prob(acc: f64, prob: f64) -> f64 {
    1.0 - (1.0 - acc) * (1.0 - prob)
}

/// One realization of the composite logic tree: a source-model branch paired
/// with one ground-motion-model realization
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LtRealization {
    /// Flat ordinal across all branches
    pub ordinal: usize,
    /// Path of the owning source-model branch
    pub sm_path: BranchPath,
    /// The chosen ground-motion realization
    pub gsim_rlz: GsimRealization,
    /// Derived weight; overwritten only by the documented renormalization pass
    pub weight: f64,
}

impl LtRealization {
    /// Unique identifier: source-model path plus ground-motion path
    pub fn uid(&self) -> String {
        format!("{},{}", self.sm_path.uid(), self.gsim_rlz.uid())
    }
}

// identity is derived from the two paths, never from the ordinal
impl PartialEq for LtRealization {
    fn eq(&self, other: &Self) -> bool {
        self.sm_path == other.sm_path && self.gsim_rlz.lt_path == other.gsim_rlz.lt_path
    }
}

impl Eq for LtRealization {}

impl Hash for LtRealization {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.sm_path.hash(state);
        self.gsim_rlz.lt_path.hash(state);
    }
}

impl fmt::Display for LtRealization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{},{},w={}>", self.ordinal, self.uid(), self.weight)
    }
}

/// The realization-association index
///
/// Maps every (region-type-group id, ground-motion model) pair to the
/// realizations that combination feeds into, and offers the aggregation
/// primitives consumers use to assemble per-realization results. Built only
/// by [`CompositeSourceModel::rlzs_assoc`].
#[derive(Debug, Clone)]
pub struct RlzsAssoc {
    realizations: Vec<LtRealization>,
    assoc: HashMap<(GroupId, Gsim), Vec<usize>>,
    rlzs_by_smodel: Vec<Vec<usize>>,
    col_ids_by_rlz: HashMap<usize, BTreeSet<ColId>>,
    gsims_by_group: BTreeMap<GroupId, Vec<Gsim>>,
    info: CompositionInfo,
}

impl RlzsAssoc {
    /// The flat ordered list of all realizations across branches
    pub fn realizations(&self) -> &[LtRealization] {
        &self.realizations
    }

    /// The composition bookkeeping the index was built over
    pub fn info(&self) -> &CompositionInfo {
        &self.info
    }

    /// The realizations fed by one (group, gsim) combination
    ///
    /// A combination with no mapped realizations is valid and yields an
    /// empty list, never an error.
    pub fn rlzs_for(&self, group: GroupId, gsim: &Gsim) -> Vec<&LtRealization> {
        self.indices(&(group, gsim.clone()))
            .iter()
            .map(|&i| &self.realizations[i])
            .collect()
    }

    /// The ground-motion models contributing to a group, sorted
    pub fn gsims_for_group(&self, group: GroupId) -> &[Gsim] {
        self.gsims_by_group.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The realizations belonging to one source-model branch
    pub fn rlzs_for_smodel(&self, ordinal: usize) -> Vec<&LtRealization> {
        self.rlzs_by_smodel
            .get(ordinal)
            .map(|indices| indices.iter().map(|&i| &self.realizations[i]).collect())
            .unwrap_or_default()
    }

    /// The stochastic-event-set collections relevant to a realization
    ///
    /// Under oversampling the ids recorded at build time are returned;
    /// otherwise they are derived structurally from the groups of the owning
    /// branch.
    pub fn col_ids(&self, rlz: &LtRealization) -> BTreeSet<ColId> {
        if let Some(ids) = self.col_ids_by_rlz.get(&rlz.ordinal) {
            if !ids.is_empty() {
                return ids.clone();
            }
        }
        self.info
            .source_models()
            .iter()
            .filter(|sm| sm.path == rlz.sm_path)
            .flat_map(|sm| sm.trt_models.iter())
            .flat_map(|tm| self.info.col_ids(tm.id).iter().copied())
            .collect()
    }

    /// Aggregate per-key partial values into per-realization accumulators
    ///
    /// For each `(group, gsim)` key, every realization the key maps to gets
    /// `acc = agg(acc_so_far_or_identity, value)`. The result covers only the
    /// realizations actually touched and is invariant under any key
    /// iteration order, provided `agg` is associative and commutative.
    pub fn combine<V: Clone>(
        &self,
        results: &HashMap<(GroupId, Gsim), V>,
        agg: impl Fn(V, V) -> V,
        identity: V,
    ) -> BTreeMap<usize, V> {
        let mut acc: BTreeMap<usize, V> = BTreeMap::new();
        for (key, value) in results {
            for &i in self.indices(key) {
                let current = acc.remove(&i).unwrap_or_else(|| identity.clone());
                acc.insert(i, agg(current, value.clone()));
            }
        }
        acc
    }

    /// Like [`combine`](Self::combine), specialized for fixed-shape curves
    ///
    /// Every realization starts at the `zero` baseline, so keys entirely
    /// absent from `results` (skipped groups) leave their realizations at
    /// zero rather than failing.
    pub fn combine_curves<V: Clone>(
        &self,
        results: &HashMap<(GroupId, Gsim), V>,
        agg: impl Fn(V, V) -> V,
        zero: &V,
    ) -> BTreeMap<usize, V> {
        let mut acc: BTreeMap<usize, V> = self
            .realizations
            .iter()
            .map(|rlz| (rlz.ordinal, zero.clone()))
            .collect();
        for (key, value) in results {
            for &i in self.indices(key) {
                if let Some(current) = acc.remove(&i) {
                    acc.insert(i, agg(current, value.clone()));
                }
            }
        }
        acc
    }

    fn indices(&self, key: &(GroupId, Gsim)) -> &[usize] {
        self.assoc.get(key).map(Vec::as_slice).unwrap_or(&[])
    }
}

impl fmt::Display for RlzsAssoc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&(GroupId, Gsim)> = self.assoc.keys().collect();
        keys.sort();
        writeln!(f, "<RlzsAssoc({})", self.assoc.len())?;
        for key in keys {
            let rlzs = &self.assoc[key];
            writeln!(f, "{},{}: {} realization(s)", key.0, key.1, rlzs.len())?;
        }
        write!(f, ">")
    }
}

impl CompositeSourceModel {
    /// Build the realization-association index
    ///
    /// For each branch, the set of region types with nonzero effective
    /// weight is computed via `effective_weight`; the ground-motion tree is
    /// reduced to that set (a zero-weight region type never generates
    /// realizations), then sampled or enumerated. The one mutation this pass
    /// performs on the model is the tree reduction and the per-group gsim
    /// list refresh.
    pub fn rlzs_assoc(
        &mut self,
        effective_weight: impl Fn(&TrtModel) -> f64,
    ) -> Result<RlzsAssoc> {
        let info = self.info();
        let num_samples = self.num_samples;
        let seed = self.seed;
        let num_smodels = self.len();

        let mut realizations: Vec<LtRealization> = Vec::new();
        let mut assoc: HashMap<(GroupId, Gsim), Vec<usize>> = HashMap::new();
        let mut rlzs_by_smodel: Vec<Vec<usize>> = vec![Vec::new(); num_smodels];
        let mut col_ids_by_rlz: HashMap<usize, BTreeSet<ColId>> = HashMap::new();

        for smodel in self.source_models_mut() {
            // collect the effective tectonic region types
            let trts: BTreeSet<String> = smodel
                .trt_models
                .iter()
                .filter(|tm| effective_weight(tm) > 0.0)
                .map(|tm| tm.trt().to_string())
                .collect();
            let declared: BTreeSet<String> =
                smodel.gsim_lt.trts().map(str::to_string).collect();
            if trts != declared {
                let before = smodel.gsim_lt.num_paths();
                smodel.gsim_lt.reduce(&trts);
                let after = smodel.gsim_lt.num_paths();
                warn!(
                    model = %smodel.name,
                    before,
                    after,
                    "reducing the ground-motion logic tree"
                );
            }

            let gsim_rlzs = if num_samples > 0 {
                let branch_seed = seed + realizations.len() as u64;
                smodel.gsim_lt.sample(smodel.samples, branch_seed)
            } else {
                smodel.gsim_lt.enumerate()
            };
            if gsim_rlzs.is_empty() {
                warn!(model = %smodel.name, path = %smodel.path, "no realizations");
                continue;
            }

            for (i, gsim_rlz) in gsim_rlzs.into_iter().enumerate() {
                let ordinal = realizations.len();
                let weight = smodel.weight * gsim_rlz.weight;
                for tm in &smodel.trt_models {
                    if trts.contains(tm.trt()) {
                        if let Some(gsim) = gsim_rlz.gsim(tm.trt()) {
                            assoc.entry((tm.id, gsim.clone())).or_default().push(ordinal);
                        }
                    }
                    if smodel.samples > 1 {
                        // oversampling: tag the draw with its collection
                        let col = info.col_ids(tm.id)[i];
                        col_ids_by_rlz.entry(ordinal).or_default().insert(col);
                    }
                }
                rlzs_by_smodel[smodel.ordinal].push(ordinal);
                realizations.push(LtRealization {
                    ordinal,
                    sm_path: smodel.path.clone(),
                    gsim_rlz,
                    weight,
                });
            }

            // refresh the per-group gsim lists from the (possibly reduced) tree
            for tm in &mut smodel.trt_models {
                tm.gsims = smodel
                    .gsim_lt
                    .branches(tm.trt())
                    .iter()
                    .map(|b| b.gsim.clone())
                    .collect();
            }
        }

        if realizations.is_empty() {
            return Err(HazardError::config(
                "no realizations were generated: nothing to compute",
            ));
        }

        if num_samples > 0 {
            if realizations.len() != num_samples {
                return Err(HazardError::config(format!(
                    "expected {} sampled realizations, got {}",
                    num_samples,
                    realizations.len()
                )));
            }
            let w = 1.0 / num_samples as f64;
            for rlz in &mut realizations {
                rlz.weight = w;
            }
        } else {
            let total: f64 = realizations.iter().map(|r| r.weight).sum();
            if total == 0.0 {
                return Err(HazardError::config(
                    "all realizations have zero weight",
                ));
            }
            if (total - 1.0).abs() > 1e-12 {
                warn!(total, "some branches are not contributing, rescaling weights");
            }
            for rlz in &mut realizations {
                rlz.weight /= total;
            }
        }

        let mut gsims_by_group: BTreeMap<GroupId, Vec<Gsim>> = BTreeMap::new();
        for (group, gsim) in assoc.keys() {
            gsims_by_group.entry(*group).or_default().push(gsim.clone());
        }
        for gsims in gsims_by_group.values_mut() {
            gsims.sort();
        }

        info!(
            realizations = realizations.len(),
            keys = assoc.len(),
            "realization association built"
        );
        Ok(RlzsAssoc {
            realizations,
            assoc,
            rlzs_by_smodel,
            col_ids_by_rlz,
            gsims_by_group,
            info,
        })
    }
}
