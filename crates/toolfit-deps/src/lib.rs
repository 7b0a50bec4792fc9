//! Dependency-group reconciliation for toolfit
//!
//! Tools declare the packages they need per PEP 735 dependency group.
//! [`DependencySync`] folds those declarations into a
//! [`DependencyManifest`], intersecting version ranges with whatever the
//! project already pins and remembering which tool asked for what, so that
//! removing a tool only removes what it owns.

pub mod error;
pub mod index;
pub mod manifest;
pub mod requirement;
pub mod sync;
pub mod version;

pub use error::{Error, Result};
pub use index::{PackageIndex, StaticIndex};
pub use manifest::{Attribution, Attributions, DEPENDENCY_GROUPS, DependencyManifest};
pub use requirement::{Requirement, normalize_name};
pub use sync::{DependencySync, RetainReason, SyncAction, SyncEvent, SyncOutcome};
pub use version::VersionConstraint;
