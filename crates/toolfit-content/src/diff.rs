//! Unified diffs for dry runs

use similar::TextDiff;

/// Line-based unified diff of two renderings of the same file.
///
/// Returns an empty string when the texts are identical.
pub fn unified_diff(old: &str, new: &str, label: &str) -> String {
    if old == new {
        return String::new();
    }
    TextDiff::from_lines(old, new)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{label}"), &format!("b/{label}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unified_diff_has_headers() {
        let diff = unified_diff("a = 1\n", "a = 1\nb = 2\n", "pyproject.toml");
        assert!(diff.starts_with("--- a/pyproject.toml\n+++ b/pyproject.toml\n"));
        assert!(diff.contains("+b = 2\n"));
        assert_eq!(unified_diff("same\n", "same\n", "x"), "");
    }

    #[test]
    fn unified_diff_keeps_context_short() {
        let old: String = (0..20).map(|i| format!("line {i}\n")).collect();
        let new = old.replace("line 10\n", "line ten\n");
        let diff = unified_diff(&old, &new, "hooks.yaml");
        assert!(diff.contains("-line 10\n+line ten\n"));
        assert!(diff.contains(" line 7\n"));
        assert!(!diff.contains(" line 6\n"));
    }
}
