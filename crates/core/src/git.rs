//! Change frequency from git history.
//!
//! Uses the git CLI directly (no libgit2). One `git log` pass collects the
//! number of commits touching every path within the window.

use std::collections::HashMap;
use std::path::Path;
use std::process::Command;

use crate::{Error, Result};

/// Execute a git command in `repo` and return its stdout.
fn git_at(repo: &Path, args: &[&str]) -> Result<String> {
    let output = Command::new("git")
        .current_dir(repo)
        .args(args)
        .output()
        .map_err(|e| Error::Git(format!("failed to invoke git: {e}")))?;

    if !output.status.success() {
        return Err(Error::Git(format!(
            "git {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

pub fn is_repository(path: &Path) -> bool {
    git_at(path, &["rev-parse", "--git-dir"]).is_ok()
}

/// Web URL of the `origin` remote, when it points at a hosted repository.
pub fn origin_url(repo: &Path) -> Option<String> {
    let url = git_at(repo, &["config", "--get", "remote.origin.url"]).ok()?;
    web_url(url.trim())
}

fn web_url(remote: &str) -> Option<String> {
    let url = if let Some(rest) = remote.strip_prefix("git@") {
        let (host, path) = rest.split_once(':')?;
        format!("https://{host}/{path}")
    } else if remote.starts_with("https://") || remote.starts_with("http://") {
        remote.to_string()
    } else {
        return None;
    };
    Some(url.trim_end_matches(".git").to_string())
}

/// Commits per path over the last `days` days. Paths are relative to `dir`,
/// which may be any directory inside a checkout; history outside it is skipped.
pub fn change_counts(dir: &Path, days: u32) -> Result<HashMap<String, u64>> {
    let since = format!("--since={days}.days");
    let output = git_at(dir, &["log", &since, "--relative", "--name-only", "--format="])?;
    Ok(count_paths(&output))
}

fn count_paths(output: &str) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        *counts.entry(line.to_string()).or_insert(0) += 1;
    }
    counts
}

/// Throwaway repositories for tests that need real history.
#[cfg(test)]
pub(crate) mod fixture {
    use std::path::Path;
    use std::process::Command;

    pub fn git_available() -> bool {
        Command::new("git").arg("--version").output().is_ok()
    }

    pub fn git(dir: &Path, args: &[&str]) {
        let status = Command::new("git")
            .current_dir(dir)
            .args(["-c", "user.name=Test", "-c", "user.email=test@example.com", "-c", "commit.gpgsign=false"])
            .args(args)
            .status()
            .unwrap();
        assert!(status.success(), "git {args:?}");
    }

    /// `pkg/a.py` committed twice, `top.py` once.
    pub fn nested_repo() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("pkg")).unwrap();
        std::fs::write(root.join("pkg/a.py"), "def f():\n    return 1\n").unwrap();
        std::fs::write(root.join("top.py"), "x = 1\n").unwrap();
        git(root, &["init", "-q"]);
        git(root, &["add", "."]);
        git(root, &["commit", "-q", "-m", "init"]);
        std::fs::write(root.join("pkg/a.py"), "def f():\n    return 2\n").unwrap();
        git(root, &["commit", "-q", "-am", "tweak"]);
        dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_relative_to_the_scanned_directory() {
        if !fixture::git_available() {
            return;
        }
        let repo = fixture::nested_repo();

        let top = change_counts(repo.path(), 30).unwrap();
        assert_eq!(top.get("pkg/a.py"), Some(&2));
        assert_eq!(top.get("top.py"), Some(&1));

        let sub = change_counts(&repo.path().join("pkg"), 30).unwrap();
        assert_eq!(sub.get("a.py"), Some(&2));
        assert_eq!(sub.len(), 1);
    }

    #[test]
    fn counts_name_only_log() {
        let log = "src/a.rs\nsrc/b.rs\n\nsrc/a.rs\n\nREADME.md\n";
        let counts = count_paths(log);
        assert_eq!(counts["src/a.rs"], 2);
        assert_eq!(counts["src/b.rs"], 1);
        assert_eq!(counts["README.md"], 1);
        assert_eq!(counts.len(), 3);
    }

    #[test]
    fn remote_urls_become_web_urls() {
        assert_eq!(
            web_url("git@github.com:acme/app.git").as_deref(),
            Some("https://github.com/acme/app")
        );
        assert_eq!(
            web_url("https://github.com/acme/app.git").as_deref(),
            Some("https://github.com/acme/app")
        );
        assert_eq!(web_url("/srv/git/app.git"), None);
    }
}
