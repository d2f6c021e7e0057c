//! Output directory lifecycle: ensure, clear, and production-folder selection.

use crate::error::BuildError;
use crate::models::ProductionMode;
use anyhow::{Context, Result};
use camino::{Utf8Component, Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Local};
use std::fs;

/// Minimum number of resolved path segments a directory needs before
/// [`clear_dir`] will touch it. `/a/b` and `C:\a\b` both count as three.
pub const MIN_CLEAR_DEPTH: usize = 3;

/// Timestamp prefix of production folders, minute granularity
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M";

/// Create `dir` and any missing ancestors. Succeeds if it already exists.
pub fn ensure_dir(dir: &Utf8Path) -> Result<&Utf8Path> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create directory: {}", dir))?;
    Ok(dir)
}

/// Outcome of removing one direct child during a clear
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemovalOutcome {
    pub path: Utf8PathBuf,
    pub result: Result<(), String>,
}

/// Per-entry record of a best-effort clear
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClearReport {
    pub entries: Vec<RemovalOutcome>,
}

impl ClearReport {
    pub fn removed(&self) -> impl Iterator<Item = &Utf8Path> {
        self.entries
            .iter()
            .filter(|e| e.result.is_ok())
            .map(|e| e.path.as_path())
    }

    pub fn failures(&self) -> impl Iterator<Item = &RemovalOutcome> {
        self.entries.iter().filter(|e| e.result.is_err())
    }

    pub fn is_clean(&self) -> bool {
        self.failures().next().is_none()
    }
}

/// Empty `dir` but keep the directory, refusing shallow paths.
///
/// The depth check runs before anything is created or deleted.
pub fn clear_dir(dir: &Utf8Path) -> Result<ClearReport> {
    let resolved = resolve(dir)?;
    if path_depth(&resolved) < MIN_CLEAR_DEPTH {
        return Err(BuildError::ShallowPath { path: resolved }.into());
    }
    clear_contents(&resolved)
}

/// Ensure `dir` exists and remove every direct child, continuing past failures.
///
/// Symlinks are unlinked, never followed.
pub fn clear_contents(dir: &Utf8Path) -> Result<ClearReport> {
    ensure_dir(dir)?;

    let mut report = ClearReport::default();
    let entries = dir
        .read_dir_utf8()
        .with_context(|| format!("Failed to list directory: {}", dir))?;

    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("Warning: couldn't read an entry of {}: {}", dir, e);
                report.entries.push(RemovalOutcome {
                    path: dir.to_path_buf(),
                    result: Err(e.to_string()),
                });
                continue;
            }
        };

        let path = entry.path().to_path_buf();
        let result = match entry.file_type() {
            Ok(ft) if ft.is_dir() => fs::remove_dir_all(&path),
            Ok(_) => fs::remove_file(&path),
            Err(e) => Err(e),
        }
        .map_err(|e| e.to_string());

        if let Err(reason) = &result {
            tracing::warn!("Warning: couldn't remove {}: {}", path, reason);
        }
        report.entries.push(RemovalOutcome { path, result });
    }

    tracing::debug!(
        "Cleared {}: {} removed, {} failed",
        dir,
        report.removed().count(),
        report.failures().count()
    );

    Ok(report)
}

/// Production folder for this run.
///
/// Fixed mode returns `<prod_root>/<project>` after clearing it. Timestamped
/// mode returns `<prod_root>/<timestamp>_<project>`, created but never cleared.
pub fn production_dir(
    prod_root: &Utf8Path,
    project: &str,
    mode: ProductionMode,
    now: DateTime<Local>,
) -> Result<(Utf8PathBuf, Option<ClearReport>)> {
    match mode {
        ProductionMode::Fixed => {
            let dir = prod_root.join(project);
            let report = clear_dir(&dir)?;
            Ok((dir, Some(report)))
        }
        ProductionMode::Timestamped => {
            let dir = prod_root.join(format!("{}_{}", timestamp_tag(now), project));
            ensure_dir(&dir)?;
            Ok((dir, None))
        }
    }
}

pub fn timestamp_tag(now: DateTime<Local>) -> String {
    now.format(TIMESTAMP_FORMAT).to_string()
}

/// Number of path segments, counting the root once and ignoring a Windows prefix
pub fn path_depth(path: &Utf8Path) -> usize {
    path.components()
        .filter(|c| !matches!(c, Utf8Component::Prefix(_)))
        .count()
}

/// Absolute, symlink-free form of `path`, which need not exist yet.
///
/// The deepest existing ancestor is canonicalized and the rest is appended
/// with `.` and `..` folded lexically.
pub fn resolve(path: &Utf8Path) -> Result<Utf8PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        let cwd = std::env::current_dir().context("Failed to read current directory")?;
        Utf8PathBuf::try_from(cwd)
            .context("Current directory is not valid UTF-8")?
            .join(path)
    };
    let absolute = normalize(&absolute);

    let mut existing = absolute.as_path();
    let mut rest = Vec::new();
    loop {
        if let Ok(canonical) = existing.canonicalize_utf8() {
            let mut resolved = strip_verbatim(canonical);
            for segment in rest.iter().rev() {
                resolved.push(segment);
            }
            return Ok(resolved);
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                rest.push(name.to_string());
                existing = parent;
            }
            _ => return Ok(absolute),
        }
    }
}

fn normalize(path: &Utf8Path) -> Utf8PathBuf {
    let mut out = Utf8PathBuf::new();
    for component in path.components() {
        match component {
            Utf8Component::CurDir => {}
            Utf8Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_str()),
        }
    }
    out
}

// canonicalize on Windows yields `\\?\C:\...`; keep the familiar drive form.
fn strip_verbatim(path: Utf8PathBuf) -> Utf8PathBuf {
    match path.as_str().strip_prefix(r"\\?\") {
        Some(rest) if !rest.starts_with("UNC") => Utf8PathBuf::from(rest),
        _ => path,
    }
}
