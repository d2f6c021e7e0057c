use crate::error::{BuildError, DocumentKind};
use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};

/// Extension of the KiCad project descriptor
pub const PROJECT_EXTENSION: &str = "kicad_pro";
pub const SCHEMATIC_EXTENSION: &str = "kicad_sch";
pub const BOARD_EXTENSION: &str = "kicad_pcb";

/// The shared base name of a schematic and a board belonging to one design.
///
/// Derived once from the user-supplied project path and immutable afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectIdentity {
    pub name: String,
    pub schematic: Utf8PathBuf,
    pub board: Utf8PathBuf,
}

impl ProjectIdentity {
    /// Resolve a `.kicad_pro` path or a bare stem into its companion documents.
    ///
    /// Only the descriptor extension is stripped, so dotted stems such as
    /// `board.v2` survive intact. Fails naming the first missing document.
    pub fn resolve(project: &Utf8Path) -> Result<Self> {
        let stem = match project.extension() {
            Some(ext) if ext.eq_ignore_ascii_case(PROJECT_EXTENSION) => project.with_extension(""),
            _ => project.to_path_buf(),
        };

        let name = stem
            .file_name()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("Project path has no file name: {}", project))?;

        let schematic = companion(&stem, SCHEMATIC_EXTENSION);
        let board = companion(&stem, BOARD_EXTENSION);

        if !schematic.is_file() {
            return Err(BuildError::DocumentNotFound {
                kind: DocumentKind::Schematic,
                path: schematic,
            }
            .into());
        }
        if !board.is_file() {
            return Err(BuildError::DocumentNotFound {
                kind: DocumentKind::Board,
                path: board,
            }
            .into());
        }

        tracing::debug!("Resolved project {} -> {}, {}", name, schematic, board);

        Ok(Self {
            name,
            schematic,
            board,
        })
    }
}

// Appends rather than replaces the extension so `demo.v2` keeps its `.v2`.
fn companion(stem: &Utf8Path, extension: &str) -> Utf8PathBuf {
    let mut path = stem.as_str().to_string();
    path.push('.');
    path.push_str(extension);
    Utf8PathBuf::from(path)
}
