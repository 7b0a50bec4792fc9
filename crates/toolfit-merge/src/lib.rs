//! Deep merging of configuration fragments into structured documents
//!
//! [`FragmentMerger::apply`] merges a [`Fragment`] at a path and returns an
//! [`AppliedDiff`] recording exactly what it added or replaced.
//! [`FragmentMerger::retract`] replays that diff backwards, removing only
//! what the fragment contributed.

pub mod diff;
pub mod error;
pub mod merger;
pub mod rules;

pub use diff::{AppliedDiff, Change, RetractOutcome, RetractWarning};
pub use error::{Error, Result};
pub use merger::{Fragment, FragmentMerger};
pub use rules::{MergeRules, SequenceMode};
