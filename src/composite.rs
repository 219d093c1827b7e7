//! Source collection and composite model containers
//!
//! ## Table of Contents
//! - **TrtModel**: Ordered sources sharing one tectonic region type
//! - **scheduling_order**: Deterministic total order over region-type groups
//! - **SourceModel**: One branch of the source-model logic tree
//! - **CompositeSourceModel**: The ordered branches plus tree-level parameters
//! - **CompositionInfo**: Collection-id bookkeeping over model skeletons

use crate::diag::SourceInfo;
use crate::error::{HazardError, Result};
use crate::logictree::GsimLogicTree;
use crate::source::Source;
use crate::types::{BranchPath, ColId, GroupId, Gsim, MagRange};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use tracing::debug;

/// An ordered collection of sources sharing one tectonic region type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrtModel {
    /// Numeric group id, assigned by the composite model
    pub id: GroupId,
    trt: String,
    sources: Vec<Source>,
    /// Total number of ruptures generated by the sources
    pub num_ruptures: u64,
    /// Magnitude range over the sources, `None` while the group is empty
    pub mag_range: Option<MagRange>,
    /// Ground-motion models associated to the region type
    pub gsims: Vec<Gsim>,
}

impl TrtModel {
    /// Create an empty group for a region type
    pub fn new(trt: impl Into<String>) -> Self {
        Self {
            id: GroupId::new(0),
            trt: trt.into(),
            sources: Vec::new(),
            num_ruptures: 0,
            mag_range: None,
            gsims: Vec::new(),
        }
    }

    /// Group sources by region type
    ///
    /// Returns the groups sorted by [`scheduling_order`]. Grouping by the trt
    /// string guarantees no two returned groups compare equal.
    pub fn collect(sources: impl IntoIterator<Item = Source>) -> Result<Vec<TrtModel>> {
        let mut by_trt: BTreeMap<String, TrtModel> = BTreeMap::new();
        for src in sources {
            by_trt
                .entry(src.trt.clone())
                .or_insert_with(|| TrtModel::new(src.trt.clone()))
                .update(src)?;
        }
        let mut groups: Vec<TrtModel> = by_trt.into_values().collect();
        groups.sort_by(scheduling_order);
        Ok(groups)
    }

    /// The tectonic region type
    pub fn trt(&self) -> &str {
        &self.trt
    }

    /// The sources in order
    pub fn sources(&self) -> &[Source] {
        &self.sources
    }

    /// Number of sources
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    /// Whether the group has no sources
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Iterate over the sources
    pub fn iter(&self) -> impl Iterator<Item = &Source> {
        self.sources.iter()
    }

    /// Append a source, widening the magnitude range
    ///
    /// Fails if the source belongs to a different region type.
    pub fn update(&mut self, src: Source) -> Result<()> {
        if src.trt != self.trt {
            return Err(HazardError::source(format!(
                "source {} has region type {:?}, group expects {:?}",
                src.id, src.trt, self.trt
            )));
        }
        self.mag_range = Some(match self.mag_range {
            Some(range) => range.union(&src.mag_range),
            None => src.mag_range,
        });
        self.sources.push(src);
        Ok(())
    }

    /// Replace the sources wholesale (filter pass), re-sorted by source id
    pub fn set_sources(&mut self, mut sources: Vec<Source>) {
        sources.sort_by(|a, b| a.id.cmp(&b.id));
        for src in &mut sources {
            src.group_id = Some(self.id);
        }
        self.sources = sources;
    }

    /// Copy of this group emptied of sources (for [`CompositionInfo`])
    pub fn skeleton(&self) -> TrtModel {
        TrtModel {
            id: self.id,
            trt: self.trt.clone(),
            sources: Vec::new(),
            num_ruptures: self.num_ruptures,
            mag_range: self.mag_range,
            gsims: self.gsims.clone(),
        }
    }
}

impl fmt::Display for TrtModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<TrtModel #{} {}, {} source(s), {} rupture(s)>",
            self.id.as_u32(),
            self.trt,
            self.sources.len(),
            self.num_ruptures
        )
    }
}

/// Deterministic total order over distinct region-type groups
///
/// Groups with fewer sources sort first; ties break lexicographically on the
/// region-type string. This is load-balancing policy, not semantics. Two
/// groups with equal source count and equal region type would be duplicates;
/// [`TrtModel::collect`] cannot produce them.
pub fn scheduling_order(a: &TrtModel, b: &TrtModel) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.trt().cmp(b.trt()))
}

/// One branch of the source-model logic tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceModel {
    /// Model name
    pub name: String,
    /// Path through the source-model logic tree
    pub path: BranchPath,
    /// Prior weight of the branch
    pub weight: f64,
    /// Position among the branches, assigned by the composite model
    pub ordinal: usize,
    /// Number of Monte-Carlo samples drawn for this branch (>1 = oversampling)
    pub samples: usize,
    /// The region-type groups owned by this branch
    pub trt_models: Vec<TrtModel>,
    /// The ground-motion logic tree of the branch
    pub gsim_lt: GsimLogicTree,
}

impl SourceModel {
    /// Create a branch with a single sample
    pub fn new(
        name: impl Into<String>,
        path: BranchPath,
        weight: f64,
        trt_models: Vec<TrtModel>,
        gsim_lt: GsimLogicTree,
    ) -> Self {
        Self {
            name: name.into(),
            path,
            weight,
            ordinal: 0,
            samples: 1,
            trt_models,
            gsim_lt,
        }
    }

    /// Set the oversampling count
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Total number of sources across the branch's groups
    pub fn num_sources(&self) -> usize {
        self.trt_models.iter().map(TrtModel::len).sum()
    }

    /// Copy of this branch with its groups emptied of sources
    pub fn skeleton(&self) -> SourceModel {
        SourceModel {
            name: self.name.clone(),
            path: self.path.clone(),
            weight: self.weight,
            ordinal: self.ordinal,
            samples: self.samples,
            trt_models: self.trt_models.iter().map(TrtModel::skeleton).collect(),
            gsim_lt: self.gsim_lt.clone(),
        }
    }
}

/// The full ordered list of source-model branches
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeSourceModel {
    /// Base seed for logic-tree sampling
    pub seed: u64,
    /// Total number of Monte-Carlo samples; 0 means full enumeration
    pub num_samples: usize,
    source_models: Vec<SourceModel>,
    /// Diagnostics records, set by the filter/splitter pass
    pub source_info: Vec<SourceInfo>,
}

impl CompositeSourceModel {
    /// Assemble a composite model, assigning branch ordinals and group ids
    ///
    /// Group ids are assigned in a single left-to-right pass over
    /// (branch, group) and stamped onto every source. A duplicated source id
    /// within one branch, or a branch declaring oversampling while the model
    /// enumerates exhaustively, is a fatal configuration error.
    pub fn new(seed: u64, num_samples: usize, mut source_models: Vec<SourceModel>) -> Result<Self> {
        let mut next_group = 0u32;
        for (ordinal, sm) in source_models.iter_mut().enumerate() {
            sm.ordinal = ordinal;
            if num_samples == 0 && sm.samples > 1 {
                return Err(HazardError::config(format!(
                    "model {:?} declares {} samples but sampling is disabled",
                    sm.name, sm.samples
                )));
            }
            let mut seen: HashSet<&str> = HashSet::new();
            for tm in &mut sm.trt_models {
                tm.id = GroupId::new(next_group);
                next_group += 1;
                for src in &mut tm.sources {
                    src.group_id = Some(tm.id);
                }
            }
            for src in sm.trt_models.iter().flat_map(TrtModel::iter) {
                if !seen.insert(&src.id) {
                    return Err(HazardError::config(format!(
                        "the source id {:?} is duplicated in model {:?}",
                        src.id, sm.name
                    )));
                }
            }
        }
        Ok(Self {
            seed,
            num_samples,
            source_models,
            source_info: Vec::new(),
        })
    }

    /// The branches in order
    pub fn source_models(&self) -> &[SourceModel] {
        &self.source_models
    }

    /// Mutable access for the one-time builder passes
    pub(crate) fn source_models_mut(&mut self) -> &mut [SourceModel] {
        &mut self.source_models
    }

    /// Number of branches
    pub fn len(&self) -> usize {
        self.source_models.len()
    }

    /// Whether there are no branches
    pub fn is_empty(&self) -> bool {
        self.source_models.is_empty()
    }

    /// Iterate over every region-type group of every branch
    pub fn trt_models(&self) -> impl Iterator<Item = &TrtModel> {
        self.source_models.iter().flat_map(|sm| sm.trt_models.iter())
    }

    /// Clone out every source, in group order
    pub fn get_sources(&self) -> Vec<Source> {
        self.trt_models().flat_map(TrtModel::iter).cloned().collect()
    }

    /// Total number of sources
    pub fn num_sources(&self) -> usize {
        self.trt_models().map(TrtModel::len).sum()
    }

    /// Recount ruptures per group from the sources
    ///
    /// Lazy: a group with a nonzero count is left alone unless `really`.
    pub fn count_ruptures(&mut self, really: bool) {
        for sm in &mut self.source_models {
            for tm in &mut sm.trt_models {
                if tm.num_ruptures == 0 || really {
                    tm.num_ruptures = tm.iter().map(Source::count_ruptures).sum();
                }
            }
        }
    }

    /// Derive the collection-id bookkeeping for this model
    pub fn info(&self) -> CompositionInfo {
        CompositionInfo::new(
            self.num_samples,
            self.source_models.iter().map(SourceModel::skeleton).collect(),
        )
    }
}

impl fmt::Display for CompositeSourceModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "<CompositeSourceModel")?;
        for sm in &self.source_models {
            writeln!(
                f,
                "{}-{}-{},w={} [{} trt_model(s)]",
                sm.ordinal,
                sm.name,
                sm.path.uid(),
                sm.weight,
                sm.trt_models.len()
            )?;
        }
        write!(f, ">")
    }
}

/// Read-only bookkeeping over a composite-model skeleton
///
/// Assigns a collection id to every (group, sample-index) pair in a single
/// deterministic left-to-right pass; ids are never reused. Under
/// oversampling one group spawns `samples` independent stochastic-event-set
/// collections.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositionInfo {
    /// Total number of Monte-Carlo samples; 0 means full enumeration
    pub num_samples: usize,
    source_models: Vec<SourceModel>,
    cols: Vec<(GroupId, u32)>,
    col_ids_by_group: BTreeMap<GroupId, Vec<ColId>>,
}

impl CompositionInfo {
    fn new(num_samples: usize, source_models: Vec<SourceModel>) -> Self {
        let mut cols = Vec::new();
        let mut col_ids_by_group: BTreeMap<GroupId, Vec<ColId>> = BTreeMap::new();
        let mut next = 0u32;
        for sm in &source_models {
            for tm in &sm.trt_models {
                for sample in 0..sm.samples as u32 {
                    cols.push((tm.id, sample));
                    col_ids_by_group.entry(tm.id).or_default().push(ColId::new(next));
                    next += 1;
                }
            }
        }
        debug!(collections = cols.len(), "composition info built");
        Self {
            num_samples,
            source_models,
            cols,
            col_ids_by_group,
        }
    }

    /// The branch skeletons
    pub fn source_models(&self) -> &[SourceModel] {
        &self.source_models
    }

    /// Number of underlying collections
    pub fn num_collections(&self) -> usize {
        self.cols.len()
    }

    /// How many times the sources of a group are sampled
    pub fn num_samples_of(&self, group: GroupId) -> usize {
        self.col_ids_by_group.get(&group).map(Vec::len).unwrap_or(0)
    }

    /// The collection ids assigned to a group, in sample order
    pub fn col_ids(&self, group: GroupId) -> &[ColId] {
        self.col_ids_by_group.get(&group).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The group that spawned a collection
    pub fn group_of(&self, col: ColId) -> Result<GroupId> {
        self.cols
            .get(col.as_u32() as usize)
            .map(|(group, _)| *group)
            .ok_or_else(|| {
                HazardError::internal(format!("no region-type group associated to {col}"))
            })
    }

    /// Yield (group, sample-index, collection id) triples in assignment order
    pub fn triples(&self) -> impl Iterator<Item = (GroupId, u32, ColId)> + '_ {
        self.cols
            .iter()
            .enumerate()
            .map(|(i, (group, sample))| (*group, *sample, ColId::new(i as u32)))
    }

    /// Number of realizations one branch contributes
    ///
    /// Under global sampling this is the branch's sample count, otherwise
    /// the number of paths through its ground-motion tree.
    pub fn num_rlzs(&self, sm: &SourceModel) -> u64 {
        if self.num_samples > 0 {
            sm.samples as u64
        } else {
            sm.gsim_lt.num_paths()
        }
    }
}
