use std::collections::{HashMap, HashSet};

use parking_lot::RwLock;

use crate::fingerprint::Fingerprint;

/// Fingerprints observed on reference streams, partitioned by route.
///
/// The same fingerprint under two routes is tracked independently. Sets only
/// grow: there is no removal, capacity bound or expiry, and everything is
/// dropped with the process.
#[derive(Default)]
pub struct MatchStore {
    routes: RwLock<HashMap<String, HashSet<Fingerprint>>>,
}

impl MatchStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts the fingerprint for the route, returns false if it was already present.
    pub fn add(&self, route: &str, fingerprint: Fingerprint) -> bool {
        let mut routes = self.routes.write();
        match routes.get_mut(route) {
            Some(fingerprints) => fingerprints.insert(fingerprint),
            None => {
                routes.insert(route.to_string(), HashSet::from([fingerprint]));
                true
            }
        }
    }

    pub fn contains(&self, route: &str, fingerprint: &Fingerprint) -> bool {
        self.routes
            .read()
            .get(route)
            .map(|fingerprints| fingerprints.contains(fingerprint))
            .unwrap_or(false)
    }

    pub fn size(&self, route: &str) -> usize {
        self.routes
            .read()
            .get(route)
            .map(|fingerprints| fingerprints.len())
            .unwrap_or(0)
    }
}
