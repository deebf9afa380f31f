//! Source resolution: local directories and git remotes.
//!
//! A source that names an existing directory is used in place. Anything
//! that looks like a git remote (`https://`, `ssh://`, `git@host:`, or a
//! `.git` suffix) is cloned into `ingest.cache_dir/<sha256(url)[..12]>`
//! on first use and fetched + hard-reset to `origin/<branch>` afterwards.
//!
//! Requires the `git` binary on `PATH` for remote sources. Values that
//! start with `-` are refused, the branch must pass
//! `git check-ref-format --branch`, and positional arguments follow `--`.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{bail, Context, Result};
use sha2::{Digest, Sha256};

use crate::config::IngestConfig;

/// Whether `source` should be treated as a git remote.
pub fn is_git_remote(source: &str) -> bool {
    source.starts_with("https://")
        || source.starts_with("http://")
        || source.starts_with("ssh://")
        || source.starts_with("git://")
        || source.starts_with("git@")
        || source.ends_with(".git")
}

/// Resolve `source` to a local directory ready to walk.
///
/// Git operations run on the blocking pool.
pub async fn resolve_source(source: &str, branch: &str, config: &IngestConfig) -> Result<PathBuf> {
    let local = Path::new(source);
    if local.is_dir() {
        return Ok(local.to_path_buf());
    }
    if !is_git_remote(source) {
        bail!("Source is neither a directory nor a git remote: {}", source);
    }

    if source.starts_with('-') {
        bail!("Refusing git source that looks like an option: {}", source);
    }
    if branch.starts_with('-') {
        bail!("Refusing branch that looks like an option: {}", branch);
    }

    let dest = config.cache_dir.join(short_hash(source));
    let url = source.to_string();
    let branch = branch.to_string();
    let shallow = config.shallow;

    tokio::task::spawn_blocking(move || -> Result<PathBuf> {
        check_branch_name(&branch)?;
        if dest.join(".git").exists() {
            tracing::debug!(url = %url, dest = %dest.display(), "fetching cached clone");
            git_fetch_reset(&dest, &branch)?;
        } else {
            tracing::debug!(url = %url, dest = %dest.display(), "cloning");
            git_clone(&url, &branch, shallow, &dest)?;
        }
        Ok(dest)
    })
    .await?
}

fn run_git(cmd: &mut Command, what: &str) -> Result<()> {
    let output = cmd
        .output()
        .with_context(|| format!("Failed to execute 'git {what}'. Is git installed?"))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git {} failed: {}", what, stderr.trim());
    }
    Ok(())
}

fn check_branch_name(branch: &str) -> Result<()> {
    run_git(
        Command::new("git").args(["check-ref-format", "--branch", branch]),
        "check-ref-format",
    )
    .with_context(|| format!("invalid branch name: {branch}"))
}

fn git_clone(url: &str, branch: &str, shallow: bool, dest: &Path) -> Result<()> {
    std::fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create cache directory: {}", dest.display()))?;

    let mut cmd = Command::new("git");
    cmd.args(["clone", "--branch", branch, "--single-branch"]);
    if shallow {
        cmd.args(["--depth", "1"]);
    }
    cmd.arg("--").arg(url).arg(dest);
    run_git(&mut cmd, "clone")
}

fn git_fetch_reset(repo_dir: &Path, branch: &str) -> Result<()> {
    run_git(
        Command::new("git")
            .args(["fetch", "origin", "--", branch])
            .current_dir(repo_dir),
        "fetch",
    )?;
    let remote_ref = format!("origin/{branch}");
    run_git(
        Command::new("git")
            .args(["reset", "--hard", &remote_ref, "--"])
            .current_dir(repo_dir),
        "reset",
    )
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}
