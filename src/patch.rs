//! Applying model-produced diffs with `git apply`.
//!
//! The diff is always piped through `git apply --check -` before the real
//! apply, so a patch that does not fit the working tree never lands
//! half-way.

use anyhow::{bail, Context, Result};
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Strip one wrapping markdown code fence; models often wrap diffs in one
/// despite being told not to. Text without a closing fence is returned
/// as-is and left for `git apply --check` to reject.
pub fn strip_code_fence(reply: &str) -> &str {
    let trimmed = reply.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string ("diff", "patch", ...) on the opening fence.
    let body = match rest.find('\n') {
        Some(pos) => &rest[pos + 1..],
        None => return trimmed,
    };
    match body.strip_suffix("```") {
        Some(inner) => inner.trim_end(),
        None => trimmed,
    }
}

/// Cheap sniff for unified-diff shape before handing text to git.
pub fn looks_like_diff(text: &str) -> bool {
    let mut has_old = false;
    let mut has_new = false;
    for line in text.lines() {
        if line.starts_with("--- ") {
            has_old = true;
        } else if line.starts_with("+++ ") {
            has_new = true;
        }
        if has_old && has_new {
            return true;
        }
    }
    false
}

/// `git diff` headers carry `a/`/`b/` prefixes and want the default `-p1`
/// strip; bare paths (what a model told to use the file path verbatim
/// tends to emit) need `-p0`.
fn headers_have_git_prefix(diff: &str) -> bool {
    diff.lines()
        .any(|l| l.starts_with("--- a/") || l.starts_with("+++ b/"))
}

fn run_git_apply(diff: &str, dir: &Path, check_only: bool) -> Result<()> {
    let mut args = vec!["apply"];
    if check_only {
        args.push("--check");
    }
    if !headers_have_git_prefix(diff) {
        args.push("-p0");
    }
    args.push("-");

    let mut child = Command::new("git")
        .args(&args)
        .current_dir(dir)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .context("Failed to run git apply; is git on PATH?")?;

    let stdin = child
        .stdin
        .as_mut()
        .context("Failed to open git apply stdin")?;
    stdin
        .write_all(diff.as_bytes())
        .context("Failed to pipe diff to git apply")?;
    // git rejects a patch whose final line is unterminated, and trimming
    // the model reply strips exactly that newline.
    if !diff.ends_with('\n') {
        stdin
            .write_all(b"\n")
            .context("Failed to pipe diff to git apply")?;
    }

    let output = child
        .wait_with_output()
        .context("Failed to wait for git apply")?;
    if !output.status.success() {
        bail!(
            "git apply{} failed with {}:\nstdout:\n{}\nstderr:\n{}",
            if check_only { " --check" } else { "" },
            output.status,
            String::from_utf8_lossy(&output.stdout).trim(),
            String::from_utf8_lossy(&output.stderr).trim(),
        );
    }
    Ok(())
}

/// Check the diff applies cleanly in `dir`, then apply it. The working
/// tree is untouched when the check fails.
pub fn apply_patch(diff: &str, dir: &Path) -> Result<()> {
    run_git_apply(diff, dir, true).context("Patch does not apply cleanly")?;
    run_git_apply(diff, dir, false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn git_available() -> bool {
        Command::new("git")
            .arg("--version")
            .output()
            .is_ok_and(|o| o.status.success())
    }

    fn git_init(dir: &Path) {
        let status = Command::new("git")
            .args(["init", "-q"])
            .current_dir(dir)
            .status()
            .unwrap();
        assert!(status.success());
    }

    #[test]
    fn strips_fence_with_info_string() {
        let reply = "```diff\n--- x.txt\n+++ x.txt\n@@ -1 +1 @@\n-a\n+b\n```";
        assert_eq!(
            strip_code_fence(reply),
            "--- x.txt\n+++ x.txt\n@@ -1 +1 @@\n-a\n+b"
        );
    }

    #[test]
    fn unfenced_text_passes_through_trimmed() {
        assert_eq!(strip_code_fence("  --- x\n+++ y\n  "), "--- x\n+++ y");
    }

    #[test]
    fn unterminated_fence_is_left_alone() {
        let reply = "```diff\n--- x.txt";
        assert_eq!(strip_code_fence(reply), reply);
    }

    #[test]
    fn diff_sniff_needs_both_headers() {
        assert!(looks_like_diff("--- a/x\n+++ b/x\n@@"));
        assert!(!looks_like_diff("--- a/x\nonly old"));
        assert!(!looks_like_diff("Here is what I would change: nothing"));
    }

    #[test]
    fn bare_headers_select_p0() {
        assert!(!headers_have_git_prefix("--- src/x.rs\n+++ src/x.rs"));
        assert!(headers_have_git_prefix("--- a/src/x.rs\n+++ b/src/x.rs"));
    }

    #[test]
    fn apply_patch_rewrites_the_file() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        std::fs::write(dir.path().join("hello.txt"), "alpha\n").unwrap();

        let diff = "--- hello.txt\n+++ hello.txt\n@@ -1 +1 @@\n-alpha\n+beta\n";
        apply_patch(diff, dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("hello.txt")).unwrap();
        assert_eq!(content, "beta\n");
    }

    #[test]
    fn apply_patch_handles_git_style_prefixes() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        std::fs::write(dir.path().join("hello.txt"), "alpha\n").unwrap();

        let diff = "--- a/hello.txt\n+++ b/hello.txt\n@@ -1 +1 @@\n-alpha\n+beta\n";
        apply_patch(diff, dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("hello.txt")).unwrap();
        assert_eq!(content, "beta\n");
    }

    #[test]
    fn apply_patch_handles_a_diff_without_trailing_newline() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        std::fs::write(dir.path().join("hello.txt"), "alpha\n").unwrap();

        // What a model reply looks like after trimming and fence stripping.
        let diff = "--- hello.txt\n+++ hello.txt\n@@ -1 +1 @@\n-alpha\n+beta";
        apply_patch(diff, dir.path()).unwrap();

        let content = std::fs::read_to_string(dir.path().join("hello.txt")).unwrap();
        assert_eq!(content, "beta\n");
    }

    #[test]
    fn failed_check_leaves_the_file_untouched() {
        if !git_available() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        git_init(dir.path());
        std::fs::write(dir.path().join("hello.txt"), "alpha\n").unwrap();

        let diff = "--- hello.txt\n+++ hello.txt\n@@ -1 +1 @@\n-does-not-match\n+beta\n";
        let err = apply_patch(diff, dir.path()).unwrap_err();
        assert!(err.to_string().contains("Patch does not apply cleanly"));

        let content = std::fs::read_to_string(dir.path().join("hello.txt")).unwrap();
        assert_eq!(content, "alpha\n");
    }
}
