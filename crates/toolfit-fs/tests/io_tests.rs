use std::fs;

use pretty_assertions::assert_eq;
use tempfile::TempDir;
use toolfit_fs::io;

#[test]
fn test_write_atomic_creates_file_and_parents() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("dir").join("pyproject.toml");

    io::write_atomic(&path, b"[tool.ruff]\n").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "[tool.ruff]\n");
}

#[test]
fn test_write_atomic_overwrites_existing() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.yaml");
    fs::write(&path, "original").unwrap();

    io::write_atomic(&path, b"updated").unwrap();

    assert_eq!(fs::read_to_string(&path).unwrap(), "updated");
}

#[test]
fn test_write_atomic_leaves_no_temp_files() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("state.json");

    io::write_atomic(&path, b"{}").unwrap();
    io::write_atomic(&path, b"{\"a\": 1}").unwrap();

    let names: Vec<String> = fs::read_dir(temp.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["state.json".to_string()]);
}

#[test]
fn test_read_optional_missing_file() {
    let temp = TempDir::new().unwrap();
    let result = io::read_optional(&temp.path().join("missing.toml")).unwrap();
    assert!(result.is_none());
}

#[test]
fn test_read_optional_existing_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("a.toml");
    fs::write(&path, "a = 1\n").unwrap();

    assert_eq!(io::read_optional(&path).unwrap().as_deref(), Some("a = 1\n"));
}

#[test]
fn test_read_text_nonexistent_file_errors() {
    let temp = TempDir::new().unwrap();
    let result = io::read_text(&temp.path().join("nope.txt"));
    assert!(matches!(result, Err(toolfit_fs::Error::Io { .. })));
}

#[test]
fn test_remove_file_is_idempotent() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("gone.yaml");
    fs::write(&path, "x: 1\n").unwrap();

    io::remove_file(&path).unwrap();
    io::remove_file(&path).unwrap();

    assert!(!path.exists());
}
