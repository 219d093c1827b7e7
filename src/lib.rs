//! # Hazard Engine
//!
//! A Rust-native engine for probabilistic seismic-hazard calculations:
//! logic-tree realization management, source filtering and splitting, and
//! weighted parallel aggregation of per-group results.
//!
//! ## Features
//!
//! - **Composite Models**: Source-model branches grouped by tectonic region type
//! - **Logic Trees**: Ground-motion trees with enumeration, reduction, and seeded sampling
//! - **Realization Association**: (group, gsim) -> realizations index with combine primitives
//! - **Source Processing**: Distance filtering, splitting, and weighting, in parallel
//! - **Weighted Partitioning**: First-fit balanced blocks, optionally stratified by group
//! - **Map-Reduce Executor**: Rayon-backed dispatch with fold-on-arrival reduction
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hazard_engine::prelude::*;
//! use hazard_engine::logictree::{GsimBranch, GsimLogicTree};
//! use hazard_engine::types::{BranchPath, MagRange};
//!
//! fn main() -> hazard_engine::Result<()> {
//!     let src = Source::new(
//!         "src-1",
//!         "Active Shallow Crust",
//!         SourceKind::Point,
//!         MagRange::new(5.0, 7.5),
//!         400,
//!     );
//!     let gsim_lt = GsimLogicTree::new(vec![GsimBranch::new(
//!         "Active Shallow Crust",
//!         "g1",
//!         "BooreAtkinson2008",
//!         1.0,
//!     )])?;
//!     let groups = TrtModel::collect([src])?;
//!     let sm = SourceModel::new("model", BranchPath::new(["b1"]), 1.0, groups, gsim_lt);
//!     let mut csm = CompositeSourceModel::new(42, 0, vec![sm])?;
//!
//!     SourceProcessor::new().process(&mut csm)?;
//!     let assoc = csm.rlzs_assoc(|tm| tm.num_ruptures as f64)?;
//!     for rlz in assoc.realizations() {
//!         println!("{rlz}");
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod assoc;
pub mod composite;
pub mod curves;
pub mod diag;
pub mod error;
pub mod executor;
pub mod filter;
pub mod geo;
pub mod logictree;
pub mod partition;
pub mod source;
pub mod types;

// Re-exports for ergonomic API
pub use assoc::{agg_prob, LtRealization, RlzsAssoc};
pub use composite::{CompositeSourceModel, CompositionInfo, SourceModel, TrtModel};
pub use curves::{agg_curves, mean_curves, zero_curves};
pub use error::{HazardError, Result};
pub use executor::{apply_reduce, apply_reduce_by_key, map_reduce, ExecutionStrategy};
pub use filter::SourceProcessor;
pub use geo::{Site, SiteCollection};
pub use logictree::{GsimLogicTree, GsimRealization};
pub use partition::{split_in_blocks, split_in_blocks_by_key, WeightedBlock};
pub use source::{Source, SourceKind};
pub use types::{BranchPath, ColId, GroupId, Gsim};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::assoc::{agg_prob, LtRealization, RlzsAssoc};
    pub use crate::composite::{CompositeSourceModel, SourceModel, TrtModel};
    pub use crate::error::Result;
    pub use crate::executor::ExecutionStrategy;
    pub use crate::filter::SourceProcessor;
    pub use crate::geo::{Site, SiteCollection};
    pub use crate::source::{Source, SourceKind};
    pub use crate::types::{GroupId, Gsim};
}
