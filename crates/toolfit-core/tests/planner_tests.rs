//! End-to-end runs of the planner against a temporary project

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use toolfit_content::{KeyPath, Value};
use toolfit_core::{
    ApplyPlanner, ApplyState, EngineConfig, Error, Outcome, Request, VcsStatus, WriteStatus,
};
use toolfit_deps::{RetainReason, StaticIndex, SyncEvent};
use toolfit_fs::ProjectPath;
use toolfit_merge::MergeRules;
use toolfit_tools::{DependencyDecl, FileFragment, Tool, ToolRegistry};

const PYPROJECT: &str = "[project]\nname = \"demo\"\n";

fn fragment(file: &str, path: &str, value: serde_json::Value) -> FileFragment {
    FileFragment::new(
        ProjectPath::new(file).unwrap(),
        KeyPath::parse(path).unwrap(),
        Value::from(value),
    )
}

fn tool(name: &str, fragments: Vec<FileFragment>) -> Tool {
    fragments
        .into_iter()
        .fold(Tool::new(name, name), |t, f| t.fragment(f))
}

fn registry(tools: Vec<Tool>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for tool in tools {
        registry.register(tool);
    }
    registry
}

fn project(pyproject: &str) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("pyproject.toml"), pyproject).unwrap();
    dir
}

fn read(dir: &Path, file: &str) -> String {
    fs::read_to_string(dir.join(file)).unwrap()
}

fn state(dir: &Path) -> ApplyState {
    ApplyState::load(&dir.join(".toolfit/state.json")).unwrap()
}

fn outcome<'a>(report: &'a toolfit_core::ExecutionReport, tool: &'a str) -> &'a Outcome {
    &report.outcomes_for(tool).next().unwrap().outcome
}

#[test]
fn test_two_tools_one_file_single_write() {
    let dir = project(PYPROJECT);
    let registry = registry(vec![
        tool("a", vec![fragment("pyproject.toml", "tool.a", json!({"x": 1}))]),
        tool("b", vec![fragment("pyproject.toml", "tool.b", json!({"y": 2}))]),
    ]);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    let plan = planner
        .plan(&[Request::add("a"), Request::add("b")], &ApplyState::new())
        .unwrap();
    assert_eq!(plan.files.len(), 1);
    assert_eq!(plan.files[0].entries.len(), 2);

    let report = planner.run(&[Request::add("a"), Request::add("b")]).unwrap();
    assert!(report.is_success());
    assert_eq!(report.files.len(), 1);
    assert_eq!(report.files[0].status, WriteStatus::Written);
    assert!(matches!(outcome(&report, "a"), Outcome::Applied { .. }));
    assert!(matches!(outcome(&report, "b"), Outcome::Applied { .. }));

    let text = read(dir.path(), "pyproject.toml");
    assert!(text.starts_with(PYPROJECT));
    assert!(text.contains("x = 1"));
    assert!(text.contains("y = 2"));
    assert_eq!(state(dir.path()).records().len(), 2);
}

#[test]
fn test_reapply_is_already_applied() {
    let dir = project(PYPROJECT);
    let registry = registry(vec![tool(
        "a",
        vec![fragment("pyproject.toml", "tool.a", json!({"x": 1}))],
    )]);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    planner.run(&[Request::add("a")]).unwrap();
    let written = read(dir.path(), "pyproject.toml");

    let report = planner.run(&[Request::add("a")]).unwrap();
    assert_eq!(outcome(&report, "a"), &Outcome::AlreadyApplied);
    assert_eq!(report.files[0].status, WriteStatus::Unchanged);
    assert_eq!(read(dir.path(), "pyproject.toml"), written);
}

#[test]
fn test_user_constraint_narrowed_then_retained() {
    let source = "[project]\nname = \"demo\"\n\n[dependency-groups]\ndev = [\n    \"ruff>=0.5\",\n]\n";
    let dir = project(source);
    let ruff = tool(
        "ruff",
        vec![fragment("pyproject.toml", "tool.ruff", json!({"line-length": 88}))],
    )
    .dependency(DependencyDecl::new("ruff", "dev").with_constraint(">=0.7"));
    let registry = registry(vec![ruff]);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    let report = planner.run(&[Request::add("ruff")]).unwrap();
    assert!(report.is_success());
    assert_eq!(report.files.len(), 1);
    assert!(matches!(
        &report.dependencies[0].event,
        SyncEvent::Narrowed { to, .. } if to == "ruff>=0.7"
    ));
    let text = read(dir.path(), "pyproject.toml");
    assert!(text.contains("\"ruff>=0.7\","));
    assert!(text.contains("line-length = 88"));

    let report = planner.run(&[Request::remove("ruff")]).unwrap();
    assert!(matches!(outcome(&report, "ruff"), Outcome::Removed { .. }));
    assert!(matches!(
        &report.dependencies[0].event,
        SyncEvent::Retained { reason: RetainReason::UserOwned, .. }
    ));
    assert_eq!(
        read(dir.path(), "pyproject.toml"),
        source.replace("ruff>=0.5", "ruff>=0.7")
    );
    let state = state(dir.path());
    assert!(state.records().is_empty());
    assert!(state.dependencies().is_empty());
}

#[test]
fn test_conflict_blocks_only_its_file() {
    let source = "[project]\nname = \"demo\"\n\n[tool.ruff]\ntarget-version = \"py310\"\n";
    let dir = project(source);
    let registry = registry(vec![
        tool(
            "ruff",
            vec![fragment("pyproject.toml", "tool.ruff", json!({"target-version": "py312"}))],
        ),
        tool("other", vec![fragment("pyproject.toml", "tool.other", json!({"x": 1}))]),
        tool("hooks", vec![fragment(".pre-commit-config.yaml", "", json!({"repos": []}))]),
    ]);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    let report = planner
        .run(&[Request::add("ruff"), Request::add("other"), Request::add("hooks")])
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.exit_code(), 1);
    assert!(matches!(
        outcome(&report, "ruff"),
        Outcome::Conflict { path, .. } if path.ends_with("target-version")
    ));
    assert_eq!(
        outcome(&report, "other"),
        &Outcome::Blocked { by: "ruff".into() }
    );
    assert_eq!(report.file("pyproject.toml").unwrap().status, WriteStatus::Blocked);
    assert_eq!(read(dir.path(), "pyproject.toml"), source);

    assert_eq!(
        report.file(".pre-commit-config.yaml").unwrap().status,
        WriteStatus::Created
    );
    assert_eq!(read(dir.path(), ".pre-commit-config.yaml"), "repos: []\n");

    let state = state(dir.path());
    assert_eq!(state.tools(), vec!["hooks"]);
}

#[test]
fn test_remove_without_record_is_not_found() {
    let dir = project(PYPROJECT);
    let registry = registry(vec![tool(
        "a",
        vec![fragment("pyproject.toml", "tool.a", json!({"x": 1}))],
    )]);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    let report = planner.run(&[Request::remove("a")]).unwrap();
    assert!(report.is_success());
    assert_eq!(outcome(&report, "a"), &Outcome::NotFound);
    assert!(report.files.is_empty());
    assert_eq!(read(dir.path(), "pyproject.toml"), PYPROJECT);
}

#[test]
fn test_conflicting_requests_rejected() {
    let dir = project(PYPROJECT);
    let registry = ToolRegistry::with_builtins();
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    let err = planner
        .run(&[Request::add("coverage"), Request::remove("pytest")])
        .unwrap_err();
    assert!(matches!(err, Error::ConflictingRequests { tool } if tool == "pytest"));
}

#[test]
fn test_unknown_tool_rejected() {
    let dir = project(PYPROJECT);
    let registry = ToolRegistry::with_builtins();
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);
    assert!(matches!(
        planner.run(&[Request::add("black")]),
        Err(Error::Tools(_))
    ));
}

#[test]
fn test_parse_error_aborts_before_writes() {
    let dir = project("[project\nname = \"demo\"\n");
    let registry = registry(vec![
        tool("a", vec![fragment("pyproject.toml", "tool.a", json!({"x": 1}))]),
        tool("hooks", vec![fragment(".pre-commit-config.yaml", "", json!({"repos": []}))]),
    ]);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    let err = planner
        .run(&[Request::add("hooks"), Request::add("a")])
        .unwrap_err();
    assert!(matches!(err, Error::Content(_)));
    assert!(!dir.path().join(".pre-commit-config.yaml").exists());
    assert!(!dir.path().join(".toolfit").exists());
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = project(PYPROJECT);
    let registry = registry(vec![tool(
        "a",
        vec![fragment("pyproject.toml", "tool.a", json!({"x": 1}))],
    )]);
    let config = EngineConfig::default().dry_run(true);
    let planner = ApplyPlanner::new(dir.path(), config, &registry);

    let report = planner.run(&[Request::add("a")]).unwrap();
    assert!(report.dry_run);
    let file = report.file("pyproject.toml").unwrap();
    assert_eq!(file.status, WriteStatus::Pending);
    let diff = file.diff.as_deref().unwrap();
    assert!(diff.contains("--- a/pyproject.toml"));
    assert!(diff.contains("+x = 1"));

    assert_eq!(read(dir.path(), "pyproject.toml"), PYPROJECT);
    assert!(!dir.path().join(".toolfit").exists());
}

#[test]
fn test_created_file_deleted_when_emptied() {
    let dir = project(PYPROJECT);
    let registry = registry(vec![tool(
        "hooks",
        vec![fragment(".pre-commit-config.yaml", "", json!({"repos": []}))],
    )]);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);
    let hooks = dir.path().join(".pre-commit-config.yaml");

    planner.run(&[Request::add("hooks")]).unwrap();
    assert!(hooks.exists());
    let config = ProjectPath::new(".pre-commit-config.yaml").unwrap();
    assert!(state(dir.path()).file(&config).unwrap().created);

    let report = planner.run(&[Request::remove("hooks")]).unwrap();
    assert_eq!(report.files[0].status, WriteStatus::Deleted);
    assert!(!hooks.exists());
    assert!(state(dir.path()).file(&config).is_none());
}

#[test]
fn test_user_file_kept_when_emptied() {
    let dir = project(PYPROJECT);
    fs::write(dir.path().join(".pre-commit-config.yaml"), "").unwrap();
    let registry = registry(vec![tool(
        "hooks",
        vec![fragment(".pre-commit-config.yaml", "", json!({"repos": []}))],
    )]);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    planner.run(&[Request::add("hooks")]).unwrap();
    let report = planner.run(&[Request::remove("hooks")]).unwrap();
    assert_eq!(report.files[0].status, WriteStatus::Written);
    assert_eq!(read(dir.path(), ".pre-commit-config.yaml"), "");
}

#[test]
fn test_hooks_need_pre_commit() {
    let dir = project(PYPROJECT);
    let registry = ToolRegistry::with_builtins();
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    let report = planner.run(&[Request::add("ruff")]).unwrap();
    assert!(report.outcomes.iter().any(|o| {
        o.tool == "ruff"
            && o.file.as_deref() == Some(".pre-commit-config.yaml")
            && matches!(o.outcome, Outcome::Skipped { .. })
    }));
    assert!(!dir.path().join(".pre-commit-config.yaml").exists());

    let dir = project(PYPROJECT);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);
    let report = planner
        .run(&[Request::add("ruff"), Request::add("pre-commit")])
        .unwrap();
    assert!(report.is_success());
    let hooks = read(dir.path(), ".pre-commit-config.yaml");
    assert!(hooks.contains("id: ruff-format"));
    assert!(hooks.contains("repo: local"));
    let pyproject = read(dir.path(), "pyproject.toml");
    assert!(pyproject.contains("dev = [\"pre-commit\", \"ruff\"]"));
}

#[test]
fn test_pre_commit_added_later_backfills_hooks() {
    let dir = project(PYPROJECT);
    let registry = ToolRegistry::with_builtins();
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);
    let config = ProjectPath::new(".pre-commit-config.yaml").unwrap();

    planner.run(&[Request::add("ruff")]).unwrap();
    assert!(!dir.path().join(".pre-commit-config.yaml").exists());

    let report = planner.run(&[Request::add("pre-commit")]).unwrap();
    assert!(report.is_success());
    assert!(report.outcomes.iter().any(|o| {
        o.tool == "ruff"
            && o.file.as_deref() == Some(".pre-commit-config.yaml")
            && matches!(o.outcome, Outcome::Applied { .. })
    }));
    let hooks = read(dir.path(), ".pre-commit-config.yaml");
    assert!(hooks.contains("id: ruff-format"));
    assert!(state(dir.path()).record("ruff", &config).is_some());

    let report = planner.run(&[Request::remove("pre-commit")]).unwrap();
    assert!(report.is_success());
    assert!(!dir.path().join(".pre-commit-config.yaml").exists());
    let state = state(dir.path());
    assert!(state.record("ruff", &config).is_none());
    assert!(state.file(&config).is_none());
    assert!(state.is_applied("ruff"));
}

#[test]
fn test_kept_container_goes_with_last_owner() {
    let dir = project(PYPROJECT);
    let ordered = || MergeRules::new().ordered(KeyPath::parse("repos").unwrap());
    let registry = registry(vec![
        tool(
            "base",
            vec![fragment(".pre-commit-config.yaml", "", json!({"repos": []})).with_rules(ordered())],
        ),
        tool(
            "local",
            vec![
                fragment(".pre-commit-config.yaml", "", json!({"repos": [{"repo": "local"}]}))
                    .with_rules(ordered()),
            ],
        ),
    ]);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);
    let hooks = dir.path().join(".pre-commit-config.yaml");

    planner.run(&[Request::add("base"), Request::add("local")]).unwrap();
    planner.run(&[Request::remove("base")]).unwrap();
    assert!(read(dir.path(), ".pre-commit-config.yaml").contains("repo: local"));

    let report = planner.run(&[Request::remove("local")]).unwrap();
    assert_eq!(report.files[0].status, WriteStatus::Deleted);
    assert!(!hooks.exists());
    assert!(state(dir.path()).records().is_empty());
}

#[test]
fn test_noop_run_leaves_state_file_untouched() {
    let dir = project(PYPROJECT);
    let registry = ToolRegistry::with_builtins();
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);
    let state_file = dir.path().join(".toolfit/state.json");

    planner
        .run(&[Request::add("pre-commit"), Request::add("ruff")])
        .unwrap();
    let saved = fs::read(&state_file).unwrap();

    let report = planner.run(&[Request::add("ruff")]).unwrap();
    assert!(report.is_success());
    assert!(report
        .outcomes_for("ruff")
        .all(|o| o.outcome == Outcome::AlreadyApplied));
    assert_eq!(fs::read(&state_file).unwrap(), saved);
}

#[test]
fn test_builtin_add_then_remove_restores_project() {
    let dir = project(PYPROJECT);
    let registry = ToolRegistry::with_builtins();
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    planner.run(&[Request::add("coverage")]).unwrap();
    let text = read(dir.path(), "pyproject.toml");
    assert!(text.contains("[tool.coverage.run]"));
    assert!(text.contains("[tool.pytest.ini_options]"));
    assert!(text.contains("\"pytest-cov\""));

    let report = planner
        .run(&[Request::remove("coverage"), Request::remove("pytest")])
        .unwrap();
    assert!(report.is_success());
    assert_eq!(read(dir.path(), "pyproject.toml"), PYPROJECT);

    let state = state(dir.path());
    assert!(state.records().is_empty());
    assert!(state.dependencies().is_empty());
}

#[test]
fn test_drift_notice() {
    let dir = project(PYPROJECT);
    let registry = registry(vec![
        tool("a", vec![fragment("pyproject.toml", "tool.a", json!({"x": 1}))]),
        tool("b", vec![fragment("pyproject.toml", "tool.b", json!({"y": 2}))]),
    ]);
    let planner = ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry);

    planner.run(&[Request::add("a")]).unwrap();
    let edited = format!("{}# hand edit\n", read(dir.path(), "pyproject.toml"));
    fs::write(dir.path().join("pyproject.toml"), &edited).unwrap();

    let report = planner.run(&[Request::add("b")]).unwrap();
    assert_eq!(
        report.notices,
        vec!["pyproject.toml was edited since toolfit last wrote it"]
    );
    assert!(read(dir.path(), "pyproject.toml").contains("# hand edit"));
}

struct Dirty(PathBuf);

impl VcsStatus for Dirty {
    fn is_tracked(&self, _path: &Path) -> bool {
        true
    }

    fn is_modified(&self, path: &Path) -> bool {
        path == self.0
    }
}

#[test]
fn test_vcs_notice() {
    let dir = project(PYPROJECT);
    let registry = registry(vec![tool(
        "a",
        vec![fragment("pyproject.toml", "tool.a", json!({"x": 1}))],
    )]);
    let vcs = Dirty(dir.path().join("pyproject.toml"));
    let planner =
        ApplyPlanner::new(dir.path(), EngineConfig::default(), &registry).with_vcs(&vcs);

    let report = planner.run(&[Request::add("a")]).unwrap();
    assert_eq!(report.notices, vec!["pyproject.toml has uncommitted changes"]);
}

#[test]
fn test_index_and_default_group() {
    let dir = project(PYPROJECT);
    let registry = registry(vec![
        Tool::new("lint", "Lint").dependency(DependencyDecl::new("deptry", "")),
    ]);
    let index = StaticIndex::new().with("deptry", "0.23.0");
    let config = EngineConfig {
        default_group: "lint".into(),
        ..EngineConfig::default()
    };
    let planner = ApplyPlanner::new(dir.path(), config, &registry).with_index(&index);

    let report = planner.run(&[Request::add("lint")]).unwrap();
    assert!(report.is_success());
    assert!(read(dir.path(), "pyproject.toml").contains("lint = [\"deptry>=0.23.0\"]"));
}
