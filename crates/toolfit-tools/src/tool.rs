//! Core types for tool definitions

use toolfit_content::{KeyPath, Value};
use toolfit_fs::ProjectPath;
use toolfit_merge::{Fragment, MergeRules};

/// When a fragment takes part in a plan.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Condition {
    #[default]
    Always,
    /// Only when the target file exists or another fragment in the same
    /// plan creates it.
    FileExists,
}

/// A fragment aimed at one path of one project file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileFragment {
    pub file: ProjectPath,
    pub path: KeyPath,
    pub fragment: Fragment,
    pub when: Condition,
}

impl FileFragment {
    pub fn new(file: ProjectPath, path: KeyPath, value: impl Into<Value>) -> Self {
        Self {
            file,
            path,
            fragment: Fragment::new(value),
            when: Condition::Always,
        }
    }

    pub fn with_rules(mut self, rules: MergeRules) -> Self {
        self.fragment.rules = rules;
        self
    }

    pub fn when(mut self, condition: Condition) -> Self {
        self.when = condition;
        self
    }
}

/// A package a tool needs in a dependency group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyDecl {
    pub package: String,
    pub extras: Vec<String>,
    /// Version specifier such as `>=0.7`; `None` lets the engine choose.
    pub constraint: Option<String>,
    pub group: String,
}

impl DependencyDecl {
    pub fn new(package: impl Into<String>, group: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            extras: Vec::new(),
            constraint: None,
            group: group.into(),
        }
    }

    pub fn with_extra(mut self, extra: impl Into<String>) -> Self {
        self.extras.push(extra.into());
        self
    }

    pub fn with_constraint(mut self, constraint: impl Into<String>) -> Self {
        self.constraint = Some(constraint.into());
        self
    }

    /// The declaration as a requirement string, e.g. `coverage[toml]>=7`.
    pub fn requirement(&self) -> String {
        let mut out = self.package.clone();
        if !self.extras.is_empty() {
            out.push('[');
            out.push_str(&self.extras.join(","));
            out.push(']');
        }
        if let Some(constraint) = &self.constraint {
            out.push_str(constraint);
        }
        out
    }
}

/// A tool definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    /// Machine identifier (e.g., "ruff", "pre-commit")
    pub name: String,
    /// Display name (e.g., "Ruff")
    pub display: String,
    pub prerequisites: Vec<String>,
    pub fragments: Vec<FileFragment>,
    pub dependencies: Vec<DependencyDecl>,
}

impl Tool {
    pub fn new(name: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            display: display.into(),
            prerequisites: Vec::new(),
            fragments: Vec::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn requires(mut self, tool: impl Into<String>) -> Self {
        self.prerequisites.push(tool.into());
        self
    }

    pub fn fragment(mut self, fragment: FileFragment) -> Self {
        self.fragments.push(fragment);
        self
    }

    pub fn dependency(mut self, dependency: DependencyDecl) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// Distinct files this tool writes to, in declaration order.
    pub fn files(&self) -> Vec<&ProjectPath> {
        let mut files: Vec<&ProjectPath> = Vec::new();
        for fragment in &self.fragments {
            if !files.contains(&&fragment.file) {
                files.push(&fragment.file);
            }
        }
        files
    }
}
