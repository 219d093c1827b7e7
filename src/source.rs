//! Seismic sources
//!
//! ## Table of Contents
//! - **SourceKind**: Source class, driving cost heuristics and splitting
//! - **Source**: One computational unit owned by a region-type group
//!
//! A source is opaque to the aggregation machinery: all it must provide is a
//! region type, a unique id, a weight proxy, a magnitude range, and the
//! ability to be spatially filtered and split into smaller sources.

use crate::geo::{Site, SiteCollection};
use crate::types::{GroupId, MagRange};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Weight discount for point-like sources, reflecting their cheaper
/// per-rupture cost (default 1/40)
pub const POINT_SOURCE_WEIGHT: f64 = 1.0 / 40.0;

/// Source class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    /// A single point source
    Point,
    /// An areal source, discretized into a grid of points
    Area,
    /// A simple fault surface
    SimpleFault,
    /// A complex fault surface
    ComplexFault,
    /// A characteristic fault source
    Characteristic,
}

impl SourceKind {
    /// Class name used in diagnostics records
    pub fn class_name(&self) -> &'static str {
        match self {
            SourceKind::Point => "PointSource",
            SourceKind::Area => "AreaSource",
            SourceKind::SimpleFault => "SimpleFaultSource",
            SourceKind::ComplexFault => "ComplexFaultSource",
            SourceKind::Characteristic => "CharacteristicSource",
        }
    }

    /// Whether sources of this class are cheap to process
    ///
    /// Shape-based sources (point, area) are cheap; fault sources are
    /// expensive and worth dispatching to the worker pool. This is a
    /// scheduling heuristic only, never a correctness concern.
    pub fn is_cheap(&self) -> bool {
        matches!(self, SourceKind::Point | SourceKind::Area)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.class_name())
    }
}

/// One seismic source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    /// Source identifier, unique within a composite model
    pub id: String,
    /// Tectonic region type
    pub trt: String,
    /// Owning region-type group, set when the composite model is assembled
    pub group_id: Option<GroupId>,
    /// Source class
    pub kind: SourceKind,
    /// Point geometry: grid cells for areas, surface trace for faults
    pub geometry: Vec<Site>,
    /// Magnitude range of the ruptures this source generates
    pub mag_range: MagRange,
    /// Total number of ruptures
    pub num_ruptures: u64,
    /// Computational weight (cost proxy), updated by the filter pass
    pub weight: f64,
}

impl Source {
    /// Create a new source with no geometry
    pub fn new(
        id: impl Into<String>,
        trt: impl Into<String>,
        kind: SourceKind,
        mag_range: MagRange,
        num_ruptures: u64,
    ) -> Self {
        Self {
            id: id.into(),
            trt: trt.into(),
            group_id: None,
            kind,
            geometry: Vec::new(),
            mag_range,
            num_ruptures,
            weight: 0.0,
        }
    }

    /// Set the geometry
    pub fn with_geometry(mut self, geometry: Vec<Site>) -> Self {
        self.geometry = geometry;
        self
    }

    /// Number of ruptures this source generates
    pub fn count_ruptures(&self) -> u64 {
        self.num_ruptures
    }

    /// Computational weight from the rupture-count cost model
    pub fn compute_weight(&self) -> f64 {
        let n = self.count_ruptures() as f64;
        match self.kind {
            SourceKind::Point => n * POINT_SOURCE_WEIGHT,
            _ => n,
        }
    }

    /// Minimum distance from the source geometry to the site collection, km
    ///
    /// A source without geometry cannot be proven distant and reports 0.0,
    /// so it is always kept.
    pub fn min_distance(&self, sites: &SiteCollection) -> f64 {
        if self.geometry.is_empty() {
            return 0.0;
        }
        self.geometry
            .iter()
            .map(|p| sites.min_distance_to(p))
            .fold(f64::INFINITY, f64::min)
    }

    /// Whether any part of the source lies within `max_distance` km of the sites
    pub fn is_within(&self, sites: &SiteCollection, max_distance: f64) -> bool {
        self.min_distance(sites) <= max_distance
    }

    /// Split into smaller sub-sources
    ///
    /// Area sources become one point source per geometry cell; fault sources
    /// are fragmented into geometry segments of at most `discretization`
    /// points. Fragment ids are derived from the parent id (`"<id>:<n>"`)
    /// and rupture counts are preserved exactly across fragments.
    pub fn split(&self, discretization: f64) -> Vec<Source> {
        match self.kind {
            SourceKind::Point => vec![self.clone()],
            SourceKind::Area => self.split_area(),
            _ => self.split_fault(discretization),
        }
    }

    fn split_area(&self) -> Vec<Source> {
        if self.geometry.len() <= 1 {
            return vec![self.clone()];
        }
        let n = self.geometry.len() as u64;
        let per_cell = self.num_ruptures / n;
        let remainder = self.num_ruptures % n;
        self.geometry
            .iter()
            .enumerate()
            .map(|(i, cell)| {
                // spread the remainder over the first cells
                let extra = if (i as u64) < remainder { 1 } else { 0 };
                Source {
                    id: format!("{}:{}", self.id, i),
                    trt: self.trt.clone(),
                    group_id: self.group_id,
                    kind: SourceKind::Point,
                    geometry: vec![*cell],
                    mag_range: self.mag_range,
                    num_ruptures: per_cell + extra,
                    weight: 0.0,
                }
            })
            .collect()
    }

    fn split_fault(&self, discretization: f64) -> Vec<Source> {
        let chunk = discretization.max(1.0) as usize;
        if self.geometry.len() <= chunk {
            return vec![self.clone()];
        }
        let chunks: Vec<&[Site]> = self.geometry.chunks(chunk).collect();
        let n = chunks.len() as u64;
        let per_chunk = self.num_ruptures / n;
        let remainder = self.num_ruptures % n;
        chunks
            .into_iter()
            .enumerate()
            .map(|(i, segment)| {
                let extra = if (i as u64) < remainder { 1 } else { 0 };
                Source {
                    id: format!("{}:{}", self.id, i),
                    trt: self.trt.clone(),
                    group_id: self.group_id,
                    kind: self.kind,
                    geometry: segment.to_vec(),
                    mag_range: self.mag_range,
                    num_ruptures: per_chunk + extra,
                    weight: 0.0,
                }
            })
            .collect()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} {} {}, {} rupture(s)>",
            self.kind.class_name(),
            self.id,
            self.trt,
            self.num_ruptures
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn area_source(cells: usize, ruptures: u64) -> Source {
        let geometry = (0..cells).map(|i| Site::new(i as f64 * 0.1, 0.0)).collect();
        Source::new(
            "a1",
            "Active Shallow Crust",
            SourceKind::Area,
            MagRange::new(5.0, 7.0),
            ruptures,
        )
        .with_geometry(geometry)
    }

    #[test]
    fn test_point_source_discount() {
        let mut src = area_source(1, 400);
        src.kind = SourceKind::Point;
        assert_eq!(src.compute_weight(), 400.0 * POINT_SOURCE_WEIGHT);
        src.kind = SourceKind::SimpleFault;
        assert_eq!(src.compute_weight(), 400.0);
    }

    #[test]
    fn test_split_area_conserves_ruptures() {
        let src = area_source(7, 100);
        let parts = src.split(10.0);
        assert_eq!(parts.len(), 7);
        assert_eq!(parts.iter().map(|s| s.num_ruptures).sum::<u64>(), 100);
        assert!(parts.iter().all(|s| s.kind == SourceKind::Point));
        assert_eq!(parts[0].id, "a1:0");
    }

    #[test]
    fn test_split_fault_segments() {
        let mut src = area_source(10, 33);
        src.kind = SourceKind::SimpleFault;
        let parts = src.split(4.0);
        assert_eq!(parts.len(), 3);
        assert_eq!(parts.iter().map(|s| s.num_ruptures).sum::<u64>(), 33);
        assert!(parts.iter().all(|s| s.kind == SourceKind::SimpleFault));
    }

    #[test]
    fn test_split_point_is_noop() {
        let mut src = area_source(1, 10);
        src.kind = SourceKind::Point;
        let parts = src.split(1.0);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].id, "a1");
    }

    #[test]
    fn test_distance_filtering() {
        let src = area_source(3, 10);
        let near = SiteCollection::new(vec![Site::new(0.1, 0.1)]);
        let far = SiteCollection::new(vec![Site::new(50.0, 50.0)]);
        assert!(src.is_within(&near, 100.0));
        assert!(!src.is_within(&far, 100.0));
    }

    #[test]
    fn test_no_geometry_always_kept() {
        let src = Source::new(
            "s1",
            "Stable Continental",
            SourceKind::Point,
            MagRange::new(4.0, 6.0),
            10,
        );
        let far = SiteCollection::new(vec![Site::new(50.0, 50.0)]);
        assert!(src.is_within(&far, 1.0));
    }
}
