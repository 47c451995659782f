//! Staged diff acquisition and committing through the `git` command line.

use crate::error::ApiError;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tracing::debug;

/// Generated files that only add noise to a summary.
pub const DEFAULT_EXCLUDES: &[&str] = &[
    "package-lock.json",
    "pnpm-lock.yaml",
    "yarn.lock",
    "Cargo.lock",
    "*.lock",
];

/// Staged change set handed to a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedDiff {
    pub files: Vec<String>,
    pub diff: String,
}

pub trait DiffSource {
    /// The staged diff, or `None` when nothing (outside the excludes) is staged.
    fn staged_diff(&self, excludes: &[String]) -> Result<Option<StagedDiff>, ApiError>;
}

/// `git diff --cached` in one repository.
#[derive(Debug, Clone)]
pub struct GitDiffSource {
    repo_root: PathBuf,
}

impl GitDiffSource {
    pub fn new(repo_root: impl Into<PathBuf>) -> Self {
        Self {
            repo_root: repo_root.into(),
        }
    }

    /// Resolve the repository containing `start`.
    pub fn discover(start: &Path) -> Result<Self, ApiError> {
        let output = run_git(start, &["rev-parse", "--show-toplevel"])?;
        let root = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if root.is_empty() {
            return Err(ApiError::Diff(format!(
                "{} is not inside a git repository",
                start.display()
            )));
        }
        Ok(Self::new(root))
    }

    pub fn repo_root(&self) -> &Path {
        &self.repo_root
    }

    /// Commit the staged changes with `message`.
    pub fn commit(&self, message: &str) -> Result<(), ApiError> {
        if message.trim().is_empty() {
            return Err(ApiError::InvalidRequest("commit message is empty".to_string()));
        }
        run_git(&self.repo_root, &["commit", "-m", message])?;
        debug!(repo = %self.repo_root.display(), "Committed staged changes");
        Ok(())
    }
}

impl DiffSource for GitDiffSource {
    fn staged_diff(&self, excludes: &[String]) -> Result<Option<StagedDiff>, ApiError> {
        let specs = exclude_pathspecs(excludes);

        let mut names = vec!["diff", "--cached", "--diff-algorithm=minimal", "--name-only", "--"];
        names.extend(specs.iter().map(String::as_str));
        let output = run_git(&self.repo_root, &names)?;
        let files = parse_name_list(&String::from_utf8_lossy(&output.stdout));
        if files.is_empty() {
            return Ok(None);
        }

        let mut args = vec!["diff", "--cached", "--diff-algorithm=minimal", "--"];
        args.extend(specs.iter().map(String::as_str));
        let output = run_git(&self.repo_root, &args)?;
        let diff = String::from_utf8_lossy(&output.stdout).into_owned();

        debug!(files = files.len(), bytes = diff.len(), "Read staged diff");
        Ok(Some(StagedDiff { files, diff }))
    }
}

/// Pathspecs for everything after `--`: the whole tree minus the excluded patterns.
pub fn exclude_pathspecs(extra: &[String]) -> Vec<String> {
    let mut specs = vec![".".to_string()];
    specs.extend(
        DEFAULT_EXCLUDES
            .iter()
            .map(|pattern| pattern.to_string())
            .chain(extra.iter().filter(|p| !p.trim().is_empty()).cloned())
            .map(|pattern| format!(":(exclude){}", pattern)),
    );
    specs
}

fn parse_name_list(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn run_git(dir: &Path, args: &[&str]) -> Result<Output, ApiError> {
    let output = Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .map_err(|e| ApiError::Diff(format!("Failed to run git: {}", e)))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ApiError::Diff(format!(
            "git {} failed: {}",
            args.first().copied().unwrap_or_default(),
            stderr.trim()
        )));
    }
    Ok(output)
}
