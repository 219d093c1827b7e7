//! Minimal site geometry for distance-based source filtering
//!
//! The full site-collection machinery lives outside this crate; the filter
//! pass only needs point locations and a great-circle distance.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in km
const EARTH_RADIUS_KM: f64 = 6371.0;

/// A single site of interest
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Site {
    /// Longitude in degrees
    pub lon: f64,
    /// Latitude in degrees
    pub lat: f64,
}

impl Site {
    /// Create a new site
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Great-circle (haversine) distance to another site, in km
    pub fn distance_km(&self, other: &Site) -> f64 {
        let (lat1, lon1) = (self.lat.to_radians(), self.lon.to_radians());
        let (lat2, lon2) = (other.lat.to_radians(), other.lon.to_radians());
        let dlat = lat2 - lat1;
        let dlon = lon2 - lon1;
        let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
        2.0 * EARTH_RADIUS_KM * a.sqrt().asin()
    }
}

/// An ordered collection of sites defining the area of interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SiteCollection {
    sites: Vec<Site>,
}

impl SiteCollection {
    /// Create a collection from sites
    pub fn new(sites: Vec<Site>) -> Self {
        Self { sites }
    }

    /// The sites in order
    pub fn sites(&self) -> &[Site] {
        &self.sites
    }

    /// Number of sites
    pub fn len(&self) -> usize {
        self.sites.len()
    }

    /// Whether the collection is empty
    pub fn is_empty(&self) -> bool {
        self.sites.is_empty()
    }

    /// Minimum distance from any site to the given point, in km
    ///
    /// Returns `f64::INFINITY` for an empty collection, so that every source
    /// is filtered away rather than spuriously kept.
    pub fn min_distance_to(&self, point: &Site) -> f64 {
        self.sites
            .iter()
            .map(|s| s.distance_km(point))
            .fold(f64::INFINITY, f64::min)
    }
}

impl FromIterator<Site> for SiteCollection {
    fn from_iter<I: IntoIterator<Item = Site>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_zero() {
        let s = Site::new(10.0, 45.0);
        assert!(s.distance_km(&s) < 1e-9);
    }

    #[test]
    fn test_distance_one_degree_lat() {
        // one degree of latitude is ~111 km everywhere
        let a = Site::new(0.0, 0.0);
        let b = Site::new(0.0, 1.0);
        let d = a.distance_km(&b);
        assert!((d - 111.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn test_min_distance_empty() {
        let sc = SiteCollection::default();
        assert!(sc.min_distance_to(&Site::new(0.0, 0.0)).is_infinite());
    }

    #[test]
    fn test_min_distance_picks_closest() {
        let sc = SiteCollection::new(vec![Site::new(0.0, 0.0), Site::new(0.0, 2.0)]);
        let d = sc.min_distance_to(&Site::new(0.0, 1.9));
        assert!(d < 15.0, "got {d}");
    }
}
