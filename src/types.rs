//! Core identifier and value types
//!
//! ## Table of Contents
//! - **GroupId**: Numeric id of a tectonic-region-type group
//! - **ColId**: Id of one stochastic-event-set collection (oversampling)
//! - **Gsim**: Ground-motion model identifier
//! - **BranchPath**: Ordered sequence of logic-tree branch labels
//! - **MagRange**: Min/max magnitude interval

use serde::{Deserialize, Serialize};
use std::fmt;

/// Numeric identifier of a tectonic-region-type group
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GroupId(u32);

impl GroupId {
    /// Create a new GroupId from a u32
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grp-{}", self.0)
    }
}

impl From<u32> for GroupId {
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

/// Identifier of one stochastic-event-set collection
///
/// Under Monte-Carlo oversampling one region-type group spawns `samples`
/// independent collections, each with its own id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ColId(u32);

impl ColId {
    /// Create a new ColId from a u32
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ColId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "col-{:02}", self.0)
    }
}

impl From<u32> for ColId {
    fn from(id: u32) -> Self {
        Self::new(id)
    }
}

/// Ground-motion model identifier (the model name)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Gsim(String);

impl Gsim {
    /// Create a new Gsim
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Get the model name
    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Gsim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Gsim {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Gsim {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Ordered sequence of logic-tree branch labels
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default)]
pub struct BranchPath(Vec<String>);

impl BranchPath {
    /// Create a path from branch labels
    pub fn new(labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self(labels.into_iter().map(Into::into).collect())
    }

    /// The branch labels in order
    pub fn labels(&self) -> &[String] {
        &self.0
    }

    /// Joined rendering used in realization uids, e.g. `"b1_b2"`
    pub fn uid(&self) -> String {
        self.0.join("_")
    }
}

impl fmt::Display for BranchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uid())
    }
}

impl From<&[&str]> for BranchPath {
    fn from(labels: &[&str]) -> Self {
        Self::new(labels.iter().copied())
    }
}

/// Min/max magnitude interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MagRange {
    /// Minimum magnitude
    pub min: f64,
    /// Maximum magnitude
    pub max: f64,
}

impl MagRange {
    /// Create a new magnitude range
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Widen this range to include another
    pub fn union(&self, other: &MagRange) -> MagRange {
        MagRange {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl fmt::Display for MagRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:.1}, {:.1}]", self.min, self.max)
    }
}
