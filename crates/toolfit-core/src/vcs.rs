//! Read-only version control queries

use std::path::Path;

/// What the engine may ask of the project's version control.
///
/// Answers only feed notices in the report; they never change what is
/// written.
pub trait VcsStatus {
    fn is_tracked(&self, path: &Path) -> bool;

    /// True when the working copy differs from the last commit.
    fn is_modified(&self, path: &Path) -> bool;
}

/// No version control: nothing is tracked, nothing is modified.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoVcs;

impl VcsStatus for NoVcs {
    fn is_tracked(&self, _path: &Path) -> bool {
        false
    }

    fn is_modified(&self, _path: &Path) -> bool {
        false
    }
}
