//! Compiled path-to-zone routing.

use super::{AdmissionError, ZoneConfig, ZoneRoute};

/// An ordered list of path matchers, most specific first.
///
/// Compiled once at startup from the route configuration; lookup walks the
/// list and returns the first (longest) matching prefix's zone index. Paths
/// that match no route are not rate limited.
#[derive(Debug)]
pub struct RouteTable {
    /// (path prefix, zone index), sorted by prefix length descending.
    routes: Vec<(String, usize)>,
}

impl RouteTable {
    pub fn build(routes: &[ZoneRoute], zones: &[ZoneConfig]) -> Result<Self, AdmissionError> {
        let mut compiled = Vec::with_capacity(routes.len());
        for route in routes {
            let zone_idx = zones
                .iter()
                .position(|z| z.name == route.zone)
                .ok_or_else(|| AdmissionError::UnknownZone(route.zone.clone()))?;
            compiled.push((route.path.clone(), zone_idx));
        }
        compiled.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        Ok(Self { routes: compiled })
    }

    /// Resolve a request path to the governing zone, if any.
    pub fn resolve(&self, path: &str) -> Option<usize> {
        self.routes
            .iter()
            .find(|(prefix, _)| prefix_matches(prefix, path))
            .map(|(_, idx)| *idx)
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

/// Prefix match on path segment boundaries: `/api/creations` matches
/// `/api/creations` and `/api/creations/123` but not `/api/creationsx`.
fn prefix_matches(prefix: &str, path: &str) -> bool {
    if !path.starts_with(prefix) {
        return false;
    }
    path.len() == prefix.len()
        || prefix.ends_with('/')
        || path.as_bytes()[prefix.len()] == b'/'
        || path.as_bytes()[prefix.len()] == b'?'
}
