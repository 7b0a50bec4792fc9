//! PEP 508 requirement strings

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::version::VersionConstraint;

static REQUIREMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<name>[A-Za-z0-9](?:[A-Za-z0-9._-]*[A-Za-z0-9])?)\s*(?:\[(?P<extras>[^\]]*)\])?\s*(?P<spec>[^;]*?)\s*(?:;\s*(?P<marker>.*?))?\s*$",
    )
    .expect("valid regex")
});

static SEPARATORS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-_.]+").expect("valid regex"));

/// PEP 503 normalized project name: lowercase, separator runs become `-`.
pub fn normalize_name(name: &str) -> String {
    SEPARATORS.replace_all(&name.to_lowercase(), "-").into_owned()
}

/// A dependency specification such as `coverage[toml]>=7; python_version>'3.8'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Requirement {
    /// Name as written
    pub name: String,
    pub extras: Vec<String>,
    /// Version specifier text, without surrounding parentheses
    pub constraint: Option<String>,
    /// Direct reference after `@`
    pub url: Option<String>,
    pub marker: Option<String>,
}

impl Requirement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            extras: Vec::new(),
            constraint: None,
            url: None,
            marker: None,
        }
    }

    pub fn parse(text: &str) -> Result<Self> {
        let invalid = |reason: &str| Error::InvalidRequirement {
            requirement: text.to_string(),
            reason: reason.to_string(),
        };
        let caps = REQUIREMENT
            .captures(text)
            .ok_or_else(|| invalid("not a PEP 508 requirement"))?;

        let name = caps.name("name").map_or("", |m| m.as_str()).to_string();
        let extras = caps
            .name("extras")
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|e| !e.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        let marker = caps
            .name("marker")
            .map(|m| m.as_str().to_string())
            .filter(|m| !m.is_empty());

        let spec = caps.name("spec").map_or("", |m| m.as_str()).trim();
        let (constraint, url) = if let Some(url) = spec.strip_prefix('@') {
            let url = url.trim();
            if url.is_empty() {
                return Err(invalid("empty direct reference"));
            }
            (None, Some(url.to_string()))
        } else {
            let spec = spec
                .strip_prefix('(')
                .and_then(|s| s.strip_suffix(')'))
                .unwrap_or(spec)
                .trim();
            ((!spec.is_empty()).then(|| spec.to_string()), None)
        };

        Ok(Self {
            name,
            extras,
            constraint,
            url,
            marker,
        })
    }

    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// The parsed version constraint, if the requirement has one.
    pub fn version_constraint(&self) -> Option<Result<VersionConstraint>> {
        self.constraint.as_deref().map(VersionConstraint::parse)
    }

    /// Add extras not already present; returns true if any were added.
    pub fn merge_extras(&mut self, extras: &[String]) -> bool {
        let mut changed = false;
        for extra in extras {
            let known = self
                .extras
                .iter()
                .any(|e| normalize_name(e) == normalize_name(extra));
            if !known {
                self.extras.push(extra.clone());
                changed = true;
            }
        }
        changed
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if !self.extras.is_empty() {
            write!(f, "[{}]", self.extras.join(","))?;
        }
        if let Some(url) = &self.url {
            write!(f, " @ {url}")?;
        } else if let Some(constraint) = &self.constraint {
            f.write_str(constraint)?;
        }
        if let Some(marker) = &self.marker {
            write!(f, "; {marker}")?;
        }
        Ok(())
    }
}
