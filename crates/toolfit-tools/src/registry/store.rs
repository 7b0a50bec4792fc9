//! Tool registry storage and prerequisite ordering

use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::tool::Tool;

/// Central catalog of tool definitions.
///
/// Built once at start-up and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Tool>,
}

impl ToolRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry pre-populated with all built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for tool in super::builtins::builtin_tools() {
            registry.register(tool);
        }
        registry
    }

    /// Register a tool, replacing any tool of the same name.
    pub fn register(&mut self, tool: Tool) {
        self.tools.insert(tool.name.clone(), tool);
    }

    pub fn get(&self, name: &str) -> Option<&Tool> {
        self.tools.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// List all registered tool names (sorted).
    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    /// Resolve tools with their prerequisites, prerequisites first.
    pub fn resolve(&self, names: &[&str]) -> Result<Vec<&Tool>> {
        let mut closure = BTreeSet::new();
        let mut pending: Vec<&str> = names.to_vec();
        while let Some(name) = pending.pop() {
            let tool = self.lookup(name)?;
            if closure.insert(tool.name.as_str()) {
                pending.extend(tool.prerequisites.iter().map(String::as_str));
            }
        }
        self.topological(&closure)
    }

    /// Order exactly the named tools by their prerequisites, without adding
    /// any. A prerequisite relation through an unnamed tool still counts.
    pub fn resolve_exact(&self, names: &[&str]) -> Result<Vec<&Tool>> {
        let requested: BTreeSet<&str> = names
            .iter()
            .map(|n| self.lookup(n).map(|t| t.name.as_str()))
            .collect::<Result<_>>()?;
        Ok(self
            .resolve(names)?
            .into_iter()
            .filter(|t| requested.contains(t.name.as_str()))
            .collect())
    }

    fn lookup(&self, name: &str) -> Result<&Tool> {
        self.tools.get(name).ok_or_else(|| Error::UnknownTool {
            name: name.to_string(),
        })
    }

    /// Kahn's algorithm over `set`; ties are broken by name.
    fn topological(&self, set: &BTreeSet<&str>) -> Result<Vec<&Tool>> {
        let mut waiting: BTreeMap<&str, usize> = BTreeMap::new();
        let mut dependents: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
        for &name in set {
            let tool = self.lookup(name)?;
            let prereqs: BTreeSet<&str> = tool
                .prerequisites
                .iter()
                .map(String::as_str)
                .filter(|p| set.contains(p))
                .collect();
            waiting.insert(name, prereqs.len());
            for prereq in prereqs {
                dependents.entry(prereq).or_default().push(name);
            }
        }

        let mut ready: BTreeSet<&str> = waiting
            .iter()
            .filter(|(_, count)| **count == 0)
            .map(|(name, _)| *name)
            .collect();
        let mut order = Vec::with_capacity(set.len());

        while let Some(name) = ready.pop_first() {
            order.push(self.lookup(name)?);
            for dependent in dependents.get(name).into_iter().flatten() {
                if let Some(count) = waiting.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        ready.insert(dependent);
                    }
                }
            }
        }

        if order.len() < set.len() {
            let placed: BTreeSet<&str> = order.iter().map(|t| t.name.as_str()).collect();
            let tools = set
                .iter()
                .filter(|n| !placed.contains(*n))
                .map(|n| n.to_string())
                .collect();
            return Err(Error::DependencyCycle { tools });
        }

        tracing::debug!(
            order = ?order.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(),
            "Resolved tool order"
        );
        Ok(order)
    }
}
