//! GitHub repository ingestion
//!
//! Recognizes and parses repository URLs (https, tree/blob deep links, ssh),
//! clones the requested branch into a scratch directory, and collects the
//! files eligible for ingestion. A URL on a different host fails with a
//! distinct error from a malformed URL on github.com.

use crate::error::GitHubError;
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tempfile::TempDir;

/// Directories never ingested from a checkout, regardless of extension
const IGNORE_PATTERNS: &[&str] = &[
    "**/.git/**",
    "**/node_modules/**",
    "**/target/**",
    "**/dist/**",
    "**/build/**",
    "**/__pycache__/**",
    "**/.venv/**",
];

/// Parsed form of a GitHub repository URL
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedGitHubUrl {
    /// Canonical https clone URL without the .git suffix
    pub repo_url: String,
    pub branch: Option<String>,
    pub subpath: Option<String>,
}

/// A cloned working tree with the files selected for ingestion
pub struct RepositoryCheckout {
    /// Keeps the scratch clone alive until ingestion completes
    _temp: TempDir,
    pub repo_url: String,
    pub files: Vec<PathBuf>,
}

fn https_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^https?://github\.com(/.*)?$").expect("valid regex"))
}

fn ssh_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^git@github\.com:([^/]+)/(.+?)(\.git)?$").expect("valid regex")
    })
}

/// Whether the string points at github.com in any supported form
pub fn is_github_url(url: &str) -> bool {
    https_pattern().is_match(url) || ssh_pattern().is_match(url)
}

/// Parse a GitHub URL into repository, branch, and subpath.
///
/// Accepted forms:
/// - `https://github.com/owner/repo[.git]`
/// - `https://github.com/owner/repo/tree/<branch>[/<subpath>]`
/// - `https://github.com/owner/repo/blob/<branch>/<path>`
/// - `git@github.com:owner/repo[.git]`
pub fn parse_github_url(url: &str) -> Result<ParsedGitHubUrl, GitHubError> {
    if !is_github_url(url) {
        return Err(GitHubError::NotGitHubUrl(url.to_string()));
    }

    if let Some(caps) = ssh_pattern().captures(url) {
        let owner = &caps[1];
        let repo = &caps[2];
        return Ok(ParsedGitHubUrl {
            repo_url: format!("https://github.com/{}/{}", owner, repo),
            branch: None,
            subpath: None,
        });
    }

    let rest = url
        .splitn(4, '/')
        .nth(3)
        .unwrap_or("")
        .trim_end_matches('/');

    let mut segments = rest.split('/').filter(|s| !s.is_empty());
    let owner = segments
        .next()
        .ok_or_else(|| GitHubError::MalformedUrl(url.to_string()))?;
    let repo = segments
        .next()
        .ok_or_else(|| GitHubError::MalformedUrl(url.to_string()))?
        .trim_end_matches(".git");

    if owner.is_empty() || repo.is_empty() {
        return Err(GitHubError::MalformedUrl(url.to_string()));
    }

    let repo_url = format!("https://github.com/{}/{}", owner, repo);
    let tail: Vec<&str> = segments.collect();

    match tail.as_slice() {
        [] => Ok(ParsedGitHubUrl {
            repo_url,
            branch: None,
            subpath: None,
        }),
        ["tree" | "blob", branch, path @ ..] => {
            let subpath = if path.is_empty() {
                None
            } else {
                Some(path.join("/"))
            };
            Ok(ParsedGitHubUrl {
                repo_url,
                branch: Some((*branch).to_string()),
                subpath,
            })
        }
        ["tree" | "blob"] => Err(GitHubError::MalformedUrl(url.to_string())),
        _ => Err(GitHubError::MalformedUrl(url.to_string())),
    }
}

/// Clone the repository and collect the ingestible files under its subpath
pub fn fetch_repository(
    parsed: &ParsedGitHubUrl,
    branch: Option<&str>,
    supported_extensions: &[String],
) -> Result<RepositoryCheckout, GitHubError> {
    let temp = TempDir::new().map_err(|e| GitHubError::CloneFailed {
        url: parsed.repo_url.clone(),
        reason: format!("failed to create scratch directory: {}", e),
    })?;

    clone_repository(&parsed.repo_url, branch, temp.path())?;

    let files = collect_files(
        temp.path(),
        parsed.subpath.as_deref(),
        supported_extensions,
    )
    .map_err(|e| match e {
        CollectError::SubpathMissing(subpath) => GitHubError::SubpathNotFound {
            url: parsed.repo_url.clone(),
            subpath,
        },
    })?;

    if files.is_empty() {
        return Err(GitHubError::NoFilesFound(parsed.repo_url.clone()));
    }

    tracing::info!(
        "Cloned {} with {} ingestible files",
        parsed.repo_url,
        files.len()
    );

    Ok(RepositoryCheckout {
        _temp: temp,
        repo_url: parsed.repo_url.clone(),
        files,
    })
}

fn clone_repository(url: &str, branch: Option<&str>, target: &Path) -> Result<(), GitHubError> {
    let mut builder = git2::build::RepoBuilder::new();
    if let Some(branch_name) = branch {
        builder.branch(branch_name);
    }

    builder.clone(url, target).map_err(|e| {
        if branch.is_some() && e.class() == git2::ErrorClass::Reference {
            GitHubError::BranchNotFound(branch.unwrap_or_default().to_string())
        } else {
            GitHubError::CloneFailed {
                url: url.to_string(),
                reason: e.message().to_string(),
            }
        }
    })?;

    Ok(())
}

enum CollectError {
    SubpathMissing(String),
}

fn ignore_set() -> &'static GlobSet {
    static SET: OnceLock<GlobSet> = OnceLock::new();
    SET.get_or_init(|| {
        let mut builder = GlobSetBuilder::new();
        for pattern in IGNORE_PATTERNS {
            if let Ok(glob) = Glob::new(pattern) {
                builder.add(glob);
            }
        }
        builder.build().unwrap_or_else(|_| GlobSet::empty())
    })
}

/// Walk the checkout and keep files with supported extensions, skipping
/// ignored directories and anything matched by the checkout's gitignore
fn collect_files(
    root: &Path,
    subpath: Option<&str>,
    supported_extensions: &[String],
) -> Result<Vec<PathBuf>, CollectError> {
    let start = match subpath {
        Some(sub) => {
            let joined = root.join(sub);
            if !joined.exists() {
                return Err(CollectError::SubpathMissing(sub.to_string()));
            }
            joined
        }
        None => root.to_path_buf(),
    };

    // A blob URL points at a single file
    if start.is_file() {
        return Ok(if has_supported_extension(&start, supported_extensions) {
            vec![start]
        } else {
            Vec::new()
        });
    }

    let mut files = Vec::new();
    for entry in ignore::WalkBuilder::new(&start)
        .hidden(true)
        .git_ignore(true)
        .build()
        .flatten()
    {
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        if ignore_set().is_match(relative) {
            continue;
        }
        if has_supported_extension(path, supported_extensions) {
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

fn has_supported_extension(path: &Path, supported_extensions: &[String]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .is_some_and(|e| supported_extensions.iter().any(|s| s.eq_ignore_ascii_case(&e)))
}
