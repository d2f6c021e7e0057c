//! Discovery of the kicad-cli executable and the Python that ships beside it.
//!
//! Lookups are pure filesystem checks and are repeated on every run. The
//! search path and fallback location are fields rather than globals so tests
//! can point the locator at a scratch directory.

use crate::error::BuildError;
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use std::ffi::OsString;

pub const KICAD_CLI: &str = "kicad-cli";

/// Default install location tried when kicad-cli is not on PATH
#[cfg(windows)]
pub const FALLBACK_KICAD_CLI: &str = r"C:\Program Files\KiCad\9.0\bin\kicad-cli.exe";
#[cfg(target_os = "macos")]
pub const FALLBACK_KICAD_CLI: &str = "/Applications/KiCad/KiCad.app/Contents/MacOS/kicad-cli";
#[cfg(not(any(windows, target_os = "macos")))]
pub const FALLBACK_KICAD_CLI: &str = "/usr/bin/kicad-cli";

/// Finds external executables on a search path
#[derive(Debug, Clone)]
pub struct ToolLocator {
    search_path: Vec<Utf8PathBuf>,
    fallback: Utf8PathBuf,
    explicit: Option<Utf8PathBuf>,
}

impl ToolLocator {
    /// Locator over the process `PATH` with the platform fallback
    pub fn from_env() -> Self {
        Self::new(std::env::var_os("PATH"), Utf8PathBuf::from(FALLBACK_KICAD_CLI))
    }

    /// Locator over an explicit `PATH`-style value. Non-UTF-8 entries are skipped.
    pub fn new(path_var: Option<OsString>, fallback: Utf8PathBuf) -> Self {
        let search_path = path_var
            .map(|value| {
                std::env::split_paths(&value)
                    .filter_map(|p| Utf8PathBuf::try_from(p).ok())
                    .filter(|p| !p.as_str().is_empty())
                    .collect()
            })
            .unwrap_or_default();

        Self {
            search_path,
            fallback,
            explicit: None,
        }
    }

    /// Prefer this kicad-cli path over any lookup
    pub fn with_explicit(mut self, explicit: Option<Utf8PathBuf>) -> Self {
        self.explicit = explicit;
        self
    }

    /// Find kicad-cli: explicit override, then the search path, then the fallback.
    pub fn kicad_cli(&self) -> Result<Utf8PathBuf> {
        let mut tried = Vec::new();

        if let Some(explicit) = &self.explicit {
            if is_executable(explicit) {
                tracing::debug!("Using configured kicad-cli: {}", explicit);
                return Ok(explicit.clone());
            }
            // A configured path that does not exist is a mistake, not a hint.
            return Err(BuildError::ToolNotFound {
                tried: explicit.to_string(),
            }
            .into());
        }

        if let Some(found) = self.which(KICAD_CLI) {
            tracing::debug!("Found kicad-cli on PATH: {}", found);
            return Ok(found);
        }
        tried.push("PATH".to_string());

        if is_executable(&self.fallback) {
            tracing::debug!("Using default kicad-cli location: {}", self.fallback);
            return Ok(self.fallback.clone());
        }
        tried.push(self.fallback.to_string());

        Err(BuildError::ToolNotFound {
            tried: tried.join(", "),
        }
        .into())
    }

    /// Find the Python interpreter bundled next to kicad-cli, falling back to
    /// `python` or `python3` on the search path.
    pub fn companion_python(&self, kicad_cli: &Utf8Path) -> Result<Utf8PathBuf> {
        let mut tried = Vec::new();

        if let Some(dir) = kicad_cli.parent() {
            for name in ["python.exe", "python"] {
                let candidate = dir.join(name);
                if is_executable(&candidate) {
                    tracing::debug!("Using KiCad's bundled Python: {}", candidate);
                    return Ok(candidate);
                }
                tried.push(candidate.to_string());
            }
        }

        for name in ["python", "python3"] {
            if let Some(found) = self.which(name) {
                tracing::debug!("Using Python from PATH: {}", found);
                return Ok(found);
            }
            tried.push(format!("{} on PATH", name));
        }

        Err(BuildError::InterpreterNotFound {
            tried: tried.join(", "),
        }
        .into())
    }

    /// First executable named `name` (plus the platform suffix) on the search path
    pub fn which(&self, name: &str) -> Option<Utf8PathBuf> {
        let file_name = executable_name(name);
        self.search_path
            .iter()
            .map(|dir| dir.join(&file_name))
            .find(|candidate| is_executable(candidate))
    }
}

/// `name` with the platform executable suffix (`.exe` on Windows)
pub fn executable_name(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

#[cfg(unix)]
fn is_executable(path: &Utf8Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Utf8Path) -> bool {
    path.is_file()
}
