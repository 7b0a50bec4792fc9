//! Engine configuration from `toolfit.toml`
//!
//! The file is optional; every key has a default.
//!
//! ```toml
//! state-file = ".toolfit/state.json"
//! dependency-manifest = "pyproject.toml"
//! default-group = "dev"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use toolfit_fs::ProjectPath;

use crate::{Error, Result};

/// Name of the optional configuration file at the project root.
pub const CONFIG_FILE: &str = "toolfit.toml";

fn default_state_file() -> String {
    ".toolfit/state.json".to_string()
}

fn default_dependency_manifest() -> String {
    "pyproject.toml".to_string()
}

fn default_group() -> String {
    "dev".to_string()
}

/// Settings that shape one engine run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct EngineConfig {
    /// Where the apply state is persisted, relative to the project root
    #[serde(default = "default_state_file")]
    pub state_file: String,

    /// File holding the PEP 735 dependency groups
    #[serde(default = "default_dependency_manifest")]
    pub dependency_manifest: String,

    /// Group for dependency declarations that do not name one
    #[serde(default = "default_group")]
    pub default_group: String,

    /// Compute everything but write nothing
    #[serde(skip)]
    pub dry_run: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            dependency_manifest: default_dependency_manifest(),
            default_group: default_group(),
            dry_run: false,
        }
    }
}

impl EngineConfig {
    /// Parse configuration from TOML content.
    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Load `toolfit.toml` from the project root, or the defaults when the
    /// file does not exist.
    pub fn load(root: &Path) -> Result<Self> {
        let path = root.join(CONFIG_FILE);
        let Some(content) = toolfit_fs::io::read_optional(&path)? else {
            tracing::debug!("No {CONFIG_FILE}, using defaults");
            return Ok(Self::default());
        };

        let config = Self::parse(&content).map_err(|e| Error::InvalidConfig {
            path: path.clone(),
            message: e.to_string(),
        })?;
        config.state_path()?;
        config.manifest_path()?;
        Ok(config)
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn state_path(&self) -> Result<ProjectPath> {
        Ok(ProjectPath::new(&self.state_file)?)
    }

    pub fn manifest_path(&self) -> Result<ProjectPath> {
        Ok(ProjectPath::new(&self.dependency_manifest)?)
    }
}
