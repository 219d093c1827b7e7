//! Source filtering, splitting, and weighting
//!
//! ## Table of Contents
//! - **SourceProcessor**: Configurable filter/split/weight pass
//! - **ProcessingTimes**: Wall time spent on cheap vs expensive sources
//!
//! The pass rewrites the sources of a composite model in place: sources
//! farther than the integration distance from every site are dropped, the
//! survivors are split into smaller sources, and each fragment gets its
//! computational weight. Cheap sources are handled on the calling thread;
//! expensive ones go through the worker pool. The outcome is identical under
//! either execution strategy.

use crate::composite::CompositeSourceModel;
use crate::diag::{sort_by_total_time, SourceInfo};
use crate::error::{HazardError, Result};
use crate::executor::{self, ExecutionStrategy};
use crate::geo::SiteCollection;
use crate::partition::split_in_blocks;
use crate::source::Source;
use crate::types::GroupId;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// Wall time spent processing cheap (inline) and expensive (pooled) sources
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessingTimes {
    /// Time spent on point-like sources, on the calling thread
    pub fast: Duration,
    /// Time spent dispatching fault-like sources to the pool
    pub slow: Duration,
}

impl fmt::Display for ProcessingTimes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fast {:?}, slow {:?}", self.fast, self.slow)
    }
}

/// The filter/split/weight pass over a composite model
///
/// Built with defaults that do nothing (no site filter, no splitting,
/// weighting on) and configured with the `with_*` methods.
#[derive(Debug, Clone)]
pub struct SourceProcessor {
    sites: Option<SiteCollection>,
    max_distance: f64,
    discretization: Option<f64>,
    weight: bool,
    strategy: ExecutionStrategy,
    concurrent_tasks: usize,
}

impl Default for SourceProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceProcessor {
    /// A pass that keeps every source unsplit, computing only the weights
    pub fn new() -> Self {
        Self {
            sites: None,
            max_distance: f64::INFINITY,
            discretization: None,
            weight: true,
            strategy: ExecutionStrategy::default(),
            concurrent_tasks: 0,
        }
    }

    /// Drop sources farther than `max_distance` km from every site
    pub fn with_site_filter(mut self, sites: SiteCollection, max_distance: f64) -> Self {
        self.sites = Some(sites);
        self.max_distance = max_distance;
        self
    }

    /// Split surviving sources with the given discretization parameter
    pub fn with_splitting(mut self, discretization: f64) -> Self {
        self.discretization = Some(discretization);
        self
    }

    /// Enable or disable weight computation
    pub fn with_weighting(mut self, weight: bool) -> Self {
        self.weight = weight;
        self
    }

    /// Choose the execution strategy for the expensive sources
    pub fn with_strategy(mut self, strategy: ExecutionStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Override the block-count hint for the expensive-source dispatch
    pub fn with_concurrent_tasks(mut self, concurrent_tasks: usize) -> Self {
        self.concurrent_tasks = concurrent_tasks;
        self
    }

    /// Run the pass, rewriting the model's sources and diagnostics in place
    ///
    /// A region-type group whose sources are all filtered away is left empty
    /// with a warning; it will simply contribute no realizations later.
    pub fn process(&self, csm: &mut CompositeSourceModel) -> Result<ProcessingTimes> {
        let (fast, slow): (Vec<Source>, Vec<Source>) = csm
            .get_sources()
            .into_iter()
            .partition(|src| src.kind.is_cheap());
        info!(fast = fast.len(), slow = slow.len(), "processing sources");

        let infos = Mutex::new(Vec::new());
        let mut times = ProcessingTimes::default();

        let t0 = Instant::now();
        let mut kept: Vec<Source> = Vec::new();
        for src in &fast {
            if let Some(fragments) = self.handle(src, &infos)? {
                kept.extend(fragments);
            }
        }
        times.fast = t0.elapsed();

        let t0 = Instant::now();
        let hint = if self.concurrent_tasks > 0 {
            self.concurrent_tasks
        } else {
            rayon::current_num_threads() * 2
        };
        let blocks = split_in_blocks(slow, hint, Source::compute_weight);
        let (kept, _) = executor::map_reduce(
            self.strategy,
            blocks,
            |block| {
                let mut out = Vec::new();
                for src in &block.items {
                    if let Some(fragments) = self.handle(src, &infos)? {
                        out.extend(fragments);
                    }
                }
                Ok(out)
            },
            |mut acc: Vec<Source>, partial| {
                acc.extend(partial);
                acc
            },
            kept,
        )?;
        times.slow = t0.elapsed();

        let mut by_group: BTreeMap<GroupId, Vec<Source>> = BTreeMap::new();
        for src in kept {
            let group = src.group_id.ok_or_else(|| {
                HazardError::internal(format!("source {} is not attached to a group", src.id))
            })?;
            by_group.entry(group).or_default().push(src);
        }
        for sm in csm.source_models_mut() {
            for tm in &mut sm.trt_models {
                let sources = by_group.remove(&tm.id).unwrap_or_default();
                if sources.is_empty() {
                    warn!(group = %tm.id, trt = tm.trt(), "all sources were filtered away");
                }
                tm.set_sources(sources);
            }
        }
        csm.count_ruptures(true);

        let mut infos = infos.into_inner();
        sort_by_total_time(&mut infos);
        csm.source_info = infos;
        info!(times = %times, kept = csm.num_sources(), "source processing complete");
        Ok(times)
    }

    /// Filter, split, and weight one source
    ///
    /// Returns `None` when the source is beyond the integration distance.
    fn handle(
        &self,
        src: &Source,
        infos: &Mutex<Vec<SourceInfo>>,
    ) -> Result<Option<Vec<Source>>> {
        let t0 = Instant::now();
        if let Some(sites) = &self.sites {
            if !src.is_within(sites, self.max_distance) {
                return Ok(None);
            }
        }
        let filter_time = t0.elapsed();

        let t0 = Instant::now();
        let mut fragments = match self.discretization {
            Some(discretization) => src.split(discretization),
            None => vec![src.clone()],
        };
        let split_time = t0.elapsed();

        let t0 = Instant::now();
        if self.weight {
            for fragment in &mut fragments {
                fragment.weight = fragment.compute_weight();
            }
        }
        let weight_time = t0.elapsed();

        let group_id = src.group_id.ok_or_else(|| {
            HazardError::internal(format!("source {} is not attached to a group", src.id))
        })?;
        infos.lock().push(SourceInfo {
            group_id,
            source_id: src.id.clone(),
            source_class: src.kind.class_name().to_string(),
            weight: fragments.iter().map(|f| f.weight).sum(),
            split_num: fragments.len(),
            filter_time,
            weight_time,
            split_time,
        });
        Ok(Some(fragments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composite::{SourceModel, TrtModel};
    use crate::geo::Site;
    use crate::logictree::{GsimBranch, GsimLogicTree};
    use crate::source::SourceKind;
    use crate::types::{BranchPath, MagRange};

    fn source(id: &str, kind: SourceKind, sites: &[(f64, f64)], ruptures: u64) -> Source {
        let geometry = sites.iter().map(|&(lon, lat)| Site::new(lon, lat)).collect();
        Source::new(id, "Active Shallow Crust", kind, MagRange::new(5.0, 7.0), ruptures)
            .with_geometry(geometry)
    }

    fn model(sources: Vec<Source>) -> CompositeSourceModel {
        let tree = GsimLogicTree::new(vec![GsimBranch::new(
            "Active Shallow Crust",
            "g",
            "Gsim",
            1.0,
        )])
        .unwrap();
        let groups = TrtModel::collect(sources).unwrap();
        let sm = SourceModel::new("sm", BranchPath::new(["b"]), 1.0, groups, tree);
        CompositeSourceModel::new(0, 0, vec![sm]).unwrap()
    }

    fn ids(csm: &CompositeSourceModel) -> Vec<String> {
        csm.get_sources().into_iter().map(|s| s.id).collect()
    }

    #[test]
    fn test_distance_filter_drops_far_sources() {
        let mut csm = model(vec![
            source("near", SourceKind::Point, &[(0.1, 0.1)], 10),
            source("far", SourceKind::SimpleFault, &[(50.0, 50.0)], 10),
        ]);
        let sites = SiteCollection::new(vec![Site::new(0.0, 0.0)]);
        let processor = SourceProcessor::new().with_site_filter(sites, 200.0);
        processor.process(&mut csm).expect("pass succeeds");
        assert_eq!(ids(&csm), vec!["near"]);
        assert_eq!(csm.source_info.len(), 1);
    }

    #[test]
    fn test_splitting_conserves_ruptures() {
        let cells: Vec<(f64, f64)> = (0..5).map(|i| (i as f64 * 0.1, 0.0)).collect();
        let mut csm = model(vec![source("area", SourceKind::Area, &cells, 100)]);
        let processor = SourceProcessor::new().with_splitting(10.0);
        processor.process(&mut csm).expect("pass succeeds");
        assert_eq!(csm.num_sources(), 5);
        let total: u64 = csm.get_sources().iter().map(|s| s.num_ruptures).sum();
        assert_eq!(total, 100);
        // the recount sees the fragments
        assert_eq!(csm.trt_models().next().unwrap().num_ruptures, 100);
        assert_eq!(csm.source_info[0].split_num, 5);
    }

    #[test]
    fn test_weights_are_computed() {
        let mut csm = model(vec![
            source("p", SourceKind::Point, &[(0.0, 0.0)], 400),
            source("f", SourceKind::SimpleFault, &[(0.0, 0.0)], 400),
        ]);
        SourceProcessor::new().process(&mut csm).expect("pass succeeds");
        let by_id: BTreeMap<String, f64> = csm
            .get_sources()
            .into_iter()
            .map(|s| (s.id, s.weight))
            .collect();
        assert_eq!(by_id["p"], 10.0); // 400 / 40
        assert_eq!(by_id["f"], 400.0);
    }

    #[test]
    fn test_sequential_matches_parallel() {
        let build = |strategy| {
            let sources: Vec<Source> = (0..20)
                .map(|i| {
                    let kind = if i % 2 == 0 {
                        SourceKind::Point
                    } else {
                        SourceKind::ComplexFault
                    };
                    source(&format!("s{i}"), kind, &[(i as f64 * 0.05, 0.0)], 10 + i)
                })
                .collect();
            let mut csm = model(sources);
            SourceProcessor::new()
                .with_strategy(strategy)
                .process(&mut csm)
                .expect("pass succeeds");
            (ids(&csm), csm.source_info.len())
        };
        let (seq_ids, seq_infos) = build(ExecutionStrategy::Sequential);
        let (par_ids, par_infos) = build(ExecutionStrategy::Parallel);
        assert_eq!(seq_ids, par_ids);
        assert_eq!(seq_infos, par_infos);
    }

    #[test]
    fn test_empty_group_survives_with_warning() {
        let mut csm = model(vec![source("far", SourceKind::Point, &[(50.0, 50.0)], 10)]);
        let sites = SiteCollection::new(vec![Site::new(0.0, 0.0)]);
        let processor = SourceProcessor::new().with_site_filter(sites, 10.0);
        processor.process(&mut csm).expect("an emptied group is not an error");
        assert_eq!(csm.num_sources(), 0);
        assert!(csm.source_info.is_empty());
    }

    #[test]
    fn test_diagnostics_sorted_slowest_first() {
        let cells: Vec<(f64, f64)> = (0..50).map(|i| (i as f64 * 0.01, 0.0)).collect();
        let mut csm = model(vec![
            source("big", SourceKind::Area, &cells, 1000),
            source("small", SourceKind::Point, &[(0.0, 0.0)], 1),
        ]);
        SourceProcessor::new()
            .with_splitting(10.0)
            .process(&mut csm)
            .expect("pass succeeds");
        assert_eq!(csm.source_info.len(), 2);
        let times: Vec<Duration> = csm.source_info.iter().map(|i| i.total_time()).collect();
        assert!(times[0] >= times[1]);
    }
}
