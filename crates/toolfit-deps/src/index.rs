//! Package index lookups

use std::collections::BTreeMap;

use crate::requirement::normalize_name;

/// Source of the latest published version of a package.
///
/// Network-backed implementations live with the caller; the engine only
/// asks for a version string.
pub trait PackageIndex {
    fn latest_version(&self, package: &str) -> Option<String>;
}

/// A fixed package → version map, for offline use and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticIndex {
    versions: BTreeMap<String, String>,
}

impl StaticIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, package: &str, version: impl Into<String>) -> Self {
        self.versions.insert(normalize_name(package), version.into());
        self
    }
}

impl PackageIndex for StaticIndex {
    fn latest_version(&self, package: &str) -> Option<String> {
        self.versions.get(&normalize_name(package)).cloned()
    }
}
