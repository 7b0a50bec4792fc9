//! PEP 440 version constraints reduced to semver ranges.
//!
//! Release versions are mapped onto semver by treating them as
//! `major.minor.patch` (missing components default to 0). A constraint is a
//! comma-separated conjunction of specifiers; every specifier narrows one
//! interval, so two constraints can be intersected and compared.
//!
//! Supported operators: `>=`, `>`, `<=`, `<`, `==`, `===`, `!=`, `~=`, and
//! the `==X.Y.*` prefix match. Pre-release and local versions are not.
//!
//! ```
//! use toolfit_deps::version::VersionConstraint;
//!
//! let project = VersionConstraint::parse(">=0.5,<1").unwrap();
//! let tool = VersionConstraint::parse(">=0.7").unwrap();
//! let both = project.intersect(&tool).unwrap();
//! assert_eq!(both.as_str(), ">=0.7,<1");
//! assert!(both.satisfies("0.9.2"));
//! ```

use std::cmp::Ordering;
use std::fmt;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    Arbitrary,
    Compatible,
    Eq,
    Ne,
    Gte,
    Lte,
    Gt,
    Lt,
}

/// Longest operators first so that `>=` is not read as `>`.
const OPERATORS: &[(&str, CompareOp)] = &[
    ("===", CompareOp::Arbitrary),
    ("~=", CompareOp::Compatible),
    ("==", CompareOp::Eq),
    ("!=", CompareOp::Ne),
    (">=", CompareOp::Gte),
    ("<=", CompareOp::Lte),
    (">", CompareOp::Gt),
    ("<", CompareOp::Lt),
];

/// One end of an interval, with the text it was written as.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Bound {
    version: semver::Version,
    text: String,
    inclusive: bool,
}

impl Bound {
    fn new(parts: &[u64], inclusive: bool) -> Self {
        Self {
            version: to_semver(parts),
            text: render_parts(parts),
            inclusive,
        }
    }
}

/// A version interval minus a set of excluded points.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Range {
    lower: Option<Bound>,
    upper: Option<Bound>,
    excluded: Vec<Bound>,
}

impl Range {
    fn between(lower: Bound, upper: Bound) -> Self {
        Self {
            lower: Some(lower),
            upper: Some(upper),
            excluded: Vec::new(),
        }
    }

    fn intersect(&self, other: &Range) -> Range {
        let mut excluded = self.excluded.clone();
        for bound in &other.excluded {
            if !excluded.iter().any(|e| e.version == bound.version) {
                excluded.push(bound.clone());
            }
        }
        Range {
            lower: tighter(self.lower.as_ref(), other.lower.as_ref(), Ordering::Greater),
            upper: tighter(self.upper.as_ref(), other.upper.as_ref(), Ordering::Less),
            excluded,
        }
    }

    fn within(&self, version: &semver::Version) -> bool {
        let above = self.lower.as_ref().is_none_or(|lo| {
            version > &lo.version || (version == &lo.version && lo.inclusive)
        });
        let below = self.upper.as_ref().is_none_or(|up| {
            version < &up.version || (version == &up.version && up.inclusive)
        });
        above && below
    }

    fn contains(&self, version: &semver::Version) -> bool {
        self.within(version) && !self.excluded.iter().any(|e| &e.version == version)
    }

    fn is_empty(&self) -> bool {
        let (Some(lo), Some(up)) = (&self.lower, &self.upper) else {
            return false;
        };
        match lo.version.cmp(&up.version) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => {
                !(lo.inclusive && up.inclusive)
                    || self.excluded.iter().any(|e| e.version == lo.version)
            }
        }
    }

    fn is_subset_of(&self, other: &Range) -> bool {
        let lower_ok = match (&self.lower, &other.lower) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => {
                a.version > b.version || (a.version == b.version && (b.inclusive || !a.inclusive))
            }
        };
        let upper_ok = match (&self.upper, &other.upper) {
            (_, None) => true,
            (None, Some(_)) => false,
            (Some(a), Some(b)) => {
                a.version < b.version || (a.version == b.version && (b.inclusive || !a.inclusive))
            }
        };
        lower_ok && upper_ok && other.excluded.iter().all(|e| !self.contains(&e.version))
    }

    fn render(&self) -> String {
        let mut parts = Vec::new();
        match (&self.lower, &self.upper) {
            (Some(lo), Some(up)) if lo.version == up.version && lo.inclusive && up.inclusive => {
                parts.push(format!("=={}", lo.text));
            }
            (lower, upper) => {
                if let Some(lo) = lower {
                    parts.push(format!("{}{}", if lo.inclusive { ">=" } else { ">" }, lo.text));
                }
                if let Some(up) = upper {
                    parts.push(format!("{}{}", if up.inclusive { "<=" } else { "<" }, up.text));
                }
            }
        }
        for bound in &self.excluded {
            if self.within(&bound.version) {
                parts.push(format!("!={}", bound.text));
            }
        }
        parts.join(",")
    }
}

/// Pick the narrower of two bounds; `prefer` is the ordering that wins.
fn tighter(a: Option<&Bound>, b: Option<&Bound>, prefer: Ordering) -> Option<Bound> {
    match (a, b) {
        (None, x) | (x, None) => x.cloned(),
        (Some(a), Some(b)) => {
            let winner = match a.version.cmp(&b.version) {
                Ordering::Equal if a.inclusive => b,
                Ordering::Equal => a,
                ord if ord == prefer => a,
                _ => b,
            };
            Some(winner.clone())
        }
    }
}

/// A parsed version constraint that can be checked, intersected and compared.
#[derive(Debug, Clone)]
pub struct VersionConstraint {
    range: Range,
    /// The constraint text for display.
    raw: String,
}

impl VersionConstraint {
    /// Parse a constraint such as `>=0.7`, `~=7.2` or `>=3.10,<3.13`.
    ///
    /// A bare version implies `==`.
    pub fn parse(constraint: &str) -> Result<Self> {
        let raw = constraint.trim().to_string();
        let mut range: Option<Range> = None;

        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let spec = parse_specifier(part)?;
            range = Some(match range {
                Some(r) => r.intersect(&spec),
                None => spec,
            });
        }

        let range = range.ok_or_else(|| Error::InvalidConstraint {
            constraint: raw.clone(),
            reason: "empty constraint".to_string(),
        })?;
        Ok(Self { range, raw })
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Returns `false` if the version string cannot be parsed.
    pub fn satisfies(&self, version: &str) -> bool {
        match release_parts(version) {
            Ok(parts) => self.satisfies_version(&to_semver(&parts)),
            Err(_) => false,
        }
    }

    pub fn satisfies_version(&self, version: &semver::Version) -> bool {
        self.range.contains(version)
    }

    /// The versions allowed by both constraints, or `None` when there are
    /// none.
    pub fn intersect(&self, other: &VersionConstraint) -> Option<VersionConstraint> {
        let range = self.range.intersect(&other.range);
        if range.is_empty() {
            return None;
        }
        let raw = range.render();
        Some(Self { range, raw })
    }

    /// True when every version allowed here is also allowed by `other`.
    pub fn is_subset_of(&self, other: &VersionConstraint) -> bool {
        self.range.is_empty() || self.range.is_subset_of(&other.range)
    }

    /// True when both constraints allow exactly the same versions.
    pub fn is_equivalent(&self, other: &VersionConstraint) -> bool {
        self.is_subset_of(other) && other.is_subset_of(self)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// Parse a single specifier like `>=3.12` or `==1.4.*`.
fn parse_specifier(s: &str) -> Result<Range> {
    let invalid = |reason: String| Error::InvalidConstraint {
        constraint: s.to_string(),
        reason,
    };

    let (op, rest) = OPERATORS
        .iter()
        .find_map(|(text, op)| s.strip_prefix(text).map(|rest| (*op, rest)))
        .unwrap_or((CompareOp::Eq, s));
    let rest = rest.trim();

    if let Some(prefix) = rest.strip_suffix(".*") {
        if op != CompareOp::Eq {
            return Err(invalid("wildcards are only supported with '=='".to_string()));
        }
        let parts = release_parts(prefix).map_err(invalid)?;
        let upper = bump(&parts, parts.len() - 1);
        return Ok(Range::between(Bound::new(&parts, true), Bound::new(&upper, false)));
    }

    let parts = release_parts(rest).map_err(invalid)?;
    let range = match op {
        CompareOp::Gte => Range {
            lower: Some(Bound::new(&parts, true)),
            ..Range::default()
        },
        CompareOp::Gt => Range {
            lower: Some(Bound::new(&parts, false)),
            ..Range::default()
        },
        CompareOp::Lte => Range {
            upper: Some(Bound::new(&parts, true)),
            ..Range::default()
        },
        CompareOp::Lt => Range {
            upper: Some(Bound::new(&parts, false)),
            ..Range::default()
        },
        CompareOp::Eq | CompareOp::Arbitrary => {
            Range::between(Bound::new(&parts, true), Bound::new(&parts, true))
        }
        CompareOp::Ne => Range {
            excluded: vec![Bound::new(&parts, true)],
            ..Range::default()
        },
        CompareOp::Compatible => {
            if parts.len() < 2 {
                return Err(invalid("'~=' needs at least two release components".to_string()));
            }
            let upper = bump(&parts, parts.len() - 2);
            Range::between(Bound::new(&parts, true), Bound::new(&upper, false))
        }
    };
    Ok(range)
}

/// Split a release version into at most three numeric components.
///
/// - `"3.12"` -> `[3, 12]`
/// - `"v1.2.3"` -> `[1, 2, 3]`
/// - `"1.0rc1"` -> error
fn release_parts(s: &str) -> std::result::Result<Vec<u64>, String> {
    let s = s.trim();
    let s = s.strip_prefix('v').unwrap_or(s);
    let parts = s
        .split('.')
        .map(|p| p.parse::<u64>())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| format!("invalid version: {s}"))?;
    if parts.len() > 3 {
        return Err(format!("too many release components: {s}"));
    }
    Ok(parts)
}

fn to_semver(parts: &[u64]) -> semver::Version {
    let at = |i: usize| parts.get(i).copied().unwrap_or(0);
    semver::Version::new(at(0), at(1), at(2))
}

fn render_parts(parts: &[u64]) -> String {
    parts
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join(".")
}

/// Keep components up to `index` and increment the last one kept.
fn bump(parts: &[u64], index: usize) -> Vec<u64> {
    let mut out = parts[..=index].to_vec();
    out[index] += 1;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn c(s: &str) -> VersionConstraint {
        VersionConstraint::parse(s).unwrap()
    }

    // --- parse ---

    #[test]
    fn test_parse_empty_rejected() {
        assert!(VersionConstraint::parse("").is_err());
        assert!(VersionConstraint::parse(" , ").is_err());
    }

    #[rstest]
    #[case(">=abc")]
    #[case(">=1.0rc1")]
    #[case("~=1")]
    #[case("!=1.*")]
    #[case(">=1.2.3.4")]
    fn test_parse_rejected(#[case] input: &str) {
        assert!(VersionConstraint::parse(input).is_err());
    }

    #[test]
    fn test_display_keeps_text() {
        assert_eq!(format!("{}", c(">=3.10, <3.13")), ">=3.10, <3.13");
    }

    // --- satisfies ---

    #[test]
    fn test_satisfies_gte() {
        let c = c(">=3.12");
        assert!(c.satisfies("3.12.0"));
        assert!(c.satisfies("4.0"));
        assert!(!c.satisfies("3.11.9"));
    }

    #[test]
    fn test_satisfies_compound() {
        let c = c(">=3.10,<3.13");
        assert!(c.satisfies("3.10.0"));
        assert!(c.satisfies("3.12.5"));
        assert!(!c.satisfies("3.9.0"));
        assert!(!c.satisfies("3.13.0"));
    }

    #[test]
    fn test_satisfies_ne() {
        let c = c("!=3.11.0");
        assert!(c.satisfies("3.12.0"));
        assert!(!c.satisfies("3.11"));
    }

    #[test]
    fn test_compatible_release() {
        let two = c("~=7.2");
        assert!(two.satisfies("7.9"));
        assert!(!two.satisfies("8.0"));
        let three = c("~=1.4.5");
        assert!(three.satisfies("1.4.9"));
        assert!(!three.satisfies("1.5.0"));
    }

    #[test]
    fn test_prefix_match() {
        let c = c("==1.4.*");
        assert!(c.satisfies("1.4.0"));
        assert!(c.satisfies("1.4.12"));
        assert!(!c.satisfies("1.5"));
    }

    #[test]
    fn test_satisfies_invalid_version_returns_false() {
        assert!(!c(">=3.12").satisfies("not-a-version"));
    }

    // --- intersection ---

    #[rstest]
    #[case(">=0.5", ">=0.7", ">=0.7")]
    #[case(">=0.5,<1", ">=0.7", ">=0.7,<1")]
    #[case(">0.7", ">=0.7", ">0.7")]
    #[case(">=1,<=2", ">=2", "==2")]
    #[case("~=7.2", ">=7.5", ">=7.5,<8")]
    #[case(">=1,!=1.5", "<2", ">=1,<2,!=1.5")]
    #[case(">=1,!=3", "<2", ">=1,<2")]
    fn test_intersect(#[case] a: &str, #[case] b: &str, #[case] expected: &str) {
        assert_eq!(c(a).intersect(&c(b)).unwrap().as_str(), expected);
    }

    #[rstest]
    #[case(">=1", "<1")]
    #[case(">1", "<=1")]
    #[case("==1.5", "!=1.5")]
    #[case("~=1.2", ">=2")]
    fn test_intersect_disjoint(#[case] a: &str, #[case] b: &str) {
        assert!(c(a).intersect(&c(b)).is_none());
    }

    // --- subset ---

    #[test]
    fn test_subset() {
        assert!(c(">=0.7").is_subset_of(&c(">=0.5")));
        assert!(!c(">=0.5").is_subset_of(&c(">=0.7")));
        assert!(c("==1.2.3").is_subset_of(&c("~=1.2")));
        assert!(!c(">=1").is_subset_of(&c(">=1,!=1.5")));
        assert!(c(">=2").is_subset_of(&c(">=1,!=1.5")));
    }

    #[test]
    fn test_equivalent_spellings() {
        assert!(c(">=0.7").is_equivalent(&c(">=0.7.0")));
        assert!(c("~=7.2").is_equivalent(&c(">=7.2,<8")));
        assert!(!c(">=0.7").is_equivalent(&c(">0.7")));
    }
}
