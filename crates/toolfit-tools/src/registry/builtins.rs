//! Built-in tool catalog

use serde_json::json;
use toolfit_content::{KeyPath, PathSegment, Value};
use toolfit_fs::ProjectPath;
use toolfit_merge::MergeRules;

use crate::tool::{Condition, DependencyDecl, FileFragment, Tool};

/// Number of built-in tools.
pub const BUILTIN_COUNT: usize = 7;

pub const PYPROJECT: &str = "pyproject.toml";
pub const PRE_COMMIT_CONFIG: &str = ".pre-commit-config.yaml";

const DEV: &str = "dev";
const TEST: &str = "test";

/// Hook commands run through uv so they use the locked environment.
const UV_RUN: &str = "uv run --frozen --offline";

fn keys(path: &[&str]) -> KeyPath {
    KeyPath::from_segments(path.iter().map(|k| PathSegment::Key(k.to_string())).collect())
}

fn pyproject(path: &[&str], value: serde_json::Value) -> FileFragment {
    FileFragment::new(ProjectPath::from_static(PYPROJECT), keys(path), Value::from(value))
}

/// Pre-commit repos, added only to projects that use pre-commit.
fn hook_repos(repos: serde_json::Value) -> FileFragment {
    FileFragment::new(
        ProjectPath::from_static(PRE_COMMIT_CONFIG),
        KeyPath::root(),
        Value::from(json!({ "repos": repos })),
    )
    .with_rules(MergeRules::new().ordered(keys(&["repos"])))
    .when(Condition::FileExists)
}

fn local_hook(hook: serde_json::Value) -> serde_json::Value {
    json!({ "repo": "local", "hooks": [hook] })
}

/// Returns all built-in tools.
pub fn builtin_tools() -> Vec<Tool> {
    vec![codespell(), coverage(), deptry(), pre_commit(), pyproject_fmt(), pytest(), ruff()]
}

fn codespell() -> Tool {
    Tool::new("codespell", "Codespell")
        .fragment(
            pyproject(
                &["tool", "codespell"],
                // Long base64 strings are never words.
                json!({ "ignore-regex": ["[A-Za-z0-9+/]{100,}"] }),
            )
            .with_rules(MergeRules::new().set(keys(&["tool", "codespell", "ignore-regex"]))),
        )
        .fragment(hook_repos(json!([{
            "repo": "https://github.com/codespell-project/codespell",
            "rev": "v2.4.1",
            "hooks": [{ "id": "codespell", "additional_dependencies": ["tomli"] }],
        }])))
        .dependency(DependencyDecl::new("codespell", DEV))
}

fn coverage() -> Tool {
    Tool::new("coverage", "Coverage.py")
        .requires("pytest")
        .fragment(
            pyproject(
                &["tool", "coverage"],
                json!({
                    "run": {
                        "source": ["src"],
                        "omit": ["*/pytest-of-*/*"],
                    },
                    "report": {
                        "exclude_also": [
                            "if TYPE_CHECKING:",
                            "raise AssertionError",
                            "raise NotImplementedError",
                            "assert_never(.*)",
                            "class .*\\bProtocol\\):",
                            "@(abc\\.)?abstractmethod",
                        ],
                    },
                }),
            )
            .with_rules(
                MergeRules::new()
                    .set(keys(&["tool", "coverage", "run", "source"]))
                    .set(keys(&["tool", "coverage", "run", "omit"]))
                    .set(keys(&["tool", "coverage", "report", "exclude_also"])),
            ),
        )
        .dependency(DependencyDecl::new("coverage", TEST).with_extra("toml"))
        .dependency(DependencyDecl::new("pytest-cov", TEST))
}

fn deptry() -> Tool {
    Tool::new("deptry", "deptry")
        .fragment(pyproject(&["tool", "deptry"], json!({})))
        .fragment(hook_repos(json!([local_hook(json!({
            "id": "deptry",
            "name": "deptry",
            "entry": format!("{UV_RUN} deptry src"),
            "language": "system",
            "always_run": true,
            "pass_filenames": false,
        }))])))
        .dependency(DependencyDecl::new("deptry", DEV))
}

fn pre_commit() -> Tool {
    Tool::new("pre-commit", "pre-commit")
        .fragment(
            FileFragment::new(
                ProjectPath::from_static(PRE_COMMIT_CONFIG),
                KeyPath::root(),
                Value::from(json!({ "repos": [] })),
            )
            .with_rules(MergeRules::new().ordered(keys(&["repos"]))),
        )
        .dependency(DependencyDecl::new("pre-commit", DEV))
}

fn pyproject_fmt() -> Tool {
    Tool::new("pyproject-fmt", "pyproject-fmt")
        .fragment(pyproject(
            &["tool", "pyproject-fmt"],
            json!({ "keep_full_version": true }),
        ))
        .fragment(hook_repos(json!([{
            "repo": "https://github.com/tox-dev/pyproject-fmt",
            "rev": "v2.5.0",
            "hooks": [{ "id": "pyproject-fmt" }],
        }])))
        .dependency(DependencyDecl::new("pyproject-fmt", DEV))
}

fn pytest() -> Tool {
    let ini = ["tool", "pytest", "ini_options"];
    let at = |key: &str| keys(&ini).child(key);
    Tool::new("pytest", "pytest")
        .fragment(
            pyproject(
                &ini,
                json!({
                    "testpaths": ["tests"],
                    "addopts": [
                        "--import-mode=importlib",
                        "-ra",
                        "--showlocals",
                        "--strict-markers",
                        "--strict-config",
                    ],
                    "filterwarnings": ["error"],
                    "xfail_strict": true,
                    "log_cli_level": "INFO",
                    "minversion": "7",
                }),
            )
            .with_rules(
                MergeRules::new()
                    .set(at("testpaths"))
                    .set(at("addopts"))
                    .set(at("filterwarnings")),
            ),
        )
        .dependency(DependencyDecl::new("pytest", TEST))
}

fn ruff() -> Tool {
    let hook = |id: &str, command: &str| {
        local_hook(json!({
            "id": id,
            "name": id,
            "entry": format!("{UV_RUN} ruff {command} --force-exclude"),
            "language": "system",
            "types_or": ["python", "pyi", "jupyter"],
            "always_run": true,
            "require_serial": true,
        }))
    };
    Tool::new("ruff", "Ruff")
        .fragment(
            pyproject(
                &["tool", "ruff"],
                json!({
                    "line-length": 88,
                    "lint": { "select": ["E4", "E7", "E9", "F"] },
                }),
            )
            .with_rules(MergeRules::new().set(keys(&["tool", "ruff", "lint", "select"]))),
        )
        .fragment(hook_repos(json!([
            hook("ruff-format", "format"),
            hook("ruff", "check --fix"),
        ])))
        .dependency(DependencyDecl::new("ruff", DEV))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_count_matches() {
        assert_eq!(builtin_tools().len(), BUILTIN_COUNT);
    }

    #[test]
    fn hooks_are_conditional() {
        for tool in builtin_tools() {
            for fragment in &tool.fragments {
                if fragment.file.as_str() == PRE_COMMIT_CONFIG && tool.name != "pre-commit" {
                    assert_eq!(fragment.when, Condition::FileExists, "{}", tool.name);
                }
            }
        }
    }

    #[test]
    fn ruff_hooks_run_through_uv() {
        let ruff = ruff();
        let hooks = ruff.fragments[1].fragment.value.to_json();
        assert_eq!(
            hooks["repos"][1]["hooks"][0]["entry"],
            "uv run --frozen --offline ruff check --fix --force-exclude"
        );
    }
}
