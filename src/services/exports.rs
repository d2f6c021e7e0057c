//! kicad-cli export steps: 3D models, renders, documentation and fabrication data.
//!
//! Each step is a fixed sequence of [`run_checked`] calls. The first failing
//! call aborts the step and, through `?`, the whole run.

use crate::error::BuildError;
use crate::metrics::RunMetrics;
use crate::models::{OutputSettings, ProjectIdentity};
use crate::services::process::{CommandOutput, CommandRunner, ToolCommand, run_checked};
use crate::services::staging::ensure_dir;
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs::{self, File};
use std::io;
use zip::write::SimpleFileOptions;

/// kicad-cli exit code for "exported, but some 3D models could not be found"
pub const EXIT_MISSING_MODELS: i32 = 2;

/// Rendered views of the board
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Top,
    Bottom,
    Side,
    Iso,
}

impl View {
    pub fn suffix(self) -> &'static str {
        match self {
            View::Top => "top",
            View::Bottom => "bottom",
            View::Side => "side",
            View::Iso => "iso",
        }
    }
}

/// `<project>_<view>.png`
pub fn picture_name(project: &str, view: View) -> String {
    format!("{}_{}.png", project, view.suffix())
}

pub fn schematic_pdf_name(project: &str) -> String {
    format!("{}_schematic.pdf", project)
}

pub fn board_prints_name(project: &str) -> String {
    format!("{}_board_prints.pdf", project)
}

pub fn gerber_archive_name(project: &str) -> String {
    format!("{}_gerbers.zip", project)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelArtifacts {
    pub step: Utf8PathBuf,
    pub glb: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PictureArtifacts {
    pub top: Utf8PathBuf,
    pub bottom: Utf8PathBuf,
    pub side: Utf8PathBuf,
    pub iso: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocArtifacts {
    pub schematic_pdf: Utf8PathBuf,
    pub erc_report: Utf8PathBuf,
    pub board_pdf: Utf8PathBuf,
    pub drc_report: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FabArtifacts {
    pub gerbers_dir: Utf8PathBuf,
    pub drill_dir: Utf8PathBuf,
    pub pos_csv: Utf8PathBuf,
    pub bom_csv: Utf8PathBuf,
    pub archive: Option<Utf8PathBuf>,
}

/// Issues kicad-cli exports for one project
pub struct Exporter<'a, R: CommandRunner> {
    runner: &'a R,
    kicad: &'a Utf8Path,
    project: &'a ProjectIdentity,
    settings: &'a OutputSettings,
    metrics: &'a RunMetrics,
}

impl<'a, R: CommandRunner> Exporter<'a, R> {
    pub fn new(
        runner: &'a R,
        kicad: &'a Utf8Path,
        project: &'a ProjectIdentity,
        settings: &'a OutputSettings,
        metrics: &'a RunMetrics,
    ) -> Self {
        Self {
            runner,
            kicad,
            project,
            settings,
            metrics,
        }
    }

    fn kicad(&self) -> ToolCommand {
        ToolCommand::new(self.kicad)
    }

    async fn run(&self, command: ToolCommand) -> Result<CommandOutput> {
        let output = run_checked(self.runner, &command).await?;
        self.metrics.record_command(output.exit_code != 0);
        Ok(output)
    }

    /// STEP model, plus GLB when asked.
    ///
    /// Exit code 2 (missing sub-models, substituted via `--subst-models`) is
    /// tolerated, but only if the model file actually exists afterwards.
    pub async fn export_3d(&self, out_dir: &Utf8Path, glb: bool) -> Result<ModelArtifacts> {
        ensure_dir(out_dir)?;

        let step = self.export_model("step", out_dir).await?;
        let glb = if glb {
            Some(self.export_model("glb", out_dir).await?)
        } else {
            None
        };

        Ok(ModelArtifacts { step, glb })
    }

    async fn export_model(&self, format: &'static str, out_dir: &Utf8Path) -> Result<Utf8PathBuf> {
        let out = out_dir.join(format!("{}.{}", self.project.name, format));

        self.run(
            self.kicad()
                .args(["pcb", "export", format, "--subst-models", "-o"])
                .arg(out.as_str())
                .arg(self.project.board.as_str())
                .ok_codes(&[0, EXIT_MISSING_MODELS]),
        )
        .await?;

        if !out.is_file() {
            return Err(BuildError::MissingOutput {
                step: if format == "step" { "STEP" } else { "GLB" },
                path: out,
            }
            .into());
        }
        Ok(out)
    }

    /// Top, bottom and side renders with transparent backgrounds, plus an
    /// optional perspective view.
    pub async fn export_pictures(&self, out_dir: &Utf8Path, iso: bool) -> Result<PictureArtifacts> {
        ensure_dir(out_dir)?;
        let name = &self.project.name;

        let top = out_dir.join(picture_name(name, View::Top));
        let bottom = out_dir.join(picture_name(name, View::Bottom));
        let side = out_dir.join(picture_name(name, View::Side));

        for (path, side_arg) in [
            (&top, "top"),
            (&bottom, "bottom"),
            (&side, self.settings.side_view.as_str()),
        ] {
            self.run(
                self.kicad()
                    .args(["pcb", "render", "-o", path.as_str()])
                    .args(["--side", side_arg, "--background", "transparent"])
                    .arg(self.project.board.as_str()),
            )
            .await?;
        }

        let iso = if iso {
            let out = out_dir.join(picture_name(name, View::Iso));
            let camera = &self.settings.iso_camera;
            self.run(
                self.kicad()
                    .args(["pcb", "render", "-o", out.as_str()])
                    .args(["--background", "transparent", "--perspective"])
                    // Quoted so the leading '-' is not parsed as an option.
                    .args(["--rotate".to_string(), format!("'{}'", camera.rotate)])
                    .args(["--zoom", camera.zoom.as_str()])
                    .arg(self.project.board.as_str()),
            )
            .await?;
            Some(out)
        } else {
            None
        };

        Ok(PictureArtifacts {
            top,
            bottom,
            side,
            iso,
        })
    }

    /// Schematic PDF, ERC report, multi-page board prints and optional DRC report
    pub async fn export_docs(&self, out_dir: &Utf8Path, include_drc: bool) -> Result<DocArtifacts> {
        ensure_dir(out_dir)?;
        let name = &self.project.name;
        let schematic = self.project.schematic.as_str();
        let board = self.project.board.as_str();

        let schematic_pdf = out_dir.join(schematic_pdf_name(name));
        self.run(
            self.kicad()
                .args(["sch", "export", "pdf", "-o", schematic_pdf.as_str(), schematic]),
        )
        .await?;

        let erc_report = out_dir.join(format!("{}_erc.rpt", name));
        self.run(self.kicad().args(["sch", "erc", "-o", erc_report.as_str(), schematic]))
            .await?;

        let board_pdf = out_dir.join(board_prints_name(name));
        self.run(
            self.kicad()
                .args(["pcb", "export", "pdf", "-o", board_pdf.as_str()])
                .args(["--layers".to_string(), self.settings.layers_arg()])
                .args(["--mode-multipage", board]),
        )
        .await?;

        let drc_report = if include_drc {
            let out = out_dir.join(format!("{}_drc.rpt", name));
            self.run(
                self.kicad()
                    .args(["pcb", "drc", "-o", out.as_str(), "--format", "report", board]),
            )
            .await?;
            Some(out)
        } else {
            None
        };

        Ok(DocArtifacts {
            schematic_pdf,
            erc_report,
            board_pdf,
            drc_report,
        })
    }

    /// Gerbers, drill files, placement and grouped BOM into `out_dir`, plus an
    /// optional stable-named archive of the gerbers.
    pub async fn export_fab(&self, out_dir: &Utf8Path, zip_outputs: bool) -> Result<FabArtifacts> {
        ensure_dir(out_dir)?;
        let name = &self.project.name;
        let board = self.project.board.as_str();

        let gerbers_dir = out_dir.join("gerbers");
        let drill_dir = out_dir.join("drill");
        ensure_dir(&gerbers_dir)?;
        ensure_dir(&drill_dir)?;

        self.run(
            self.kicad()
                .args(["pcb", "export", "gerbers", "-o", gerbers_dir.as_str()])
                .args(["--board-plot-params", board]),
        )
        .await?;

        self.run(
            self.kicad()
                .args(["pcb", "export", "drill", "-o", drill_dir.as_str()])
                .args(["--format", "excellon", "--generate-map", board]),
        )
        .await?;

        let pos_csv = out_dir.join(format!("{}_pos.csv", name));
        self.run(
            self.kicad()
                .args(["pcb", "export", "pos", "-o", pos_csv.as_str()])
                .args(["--format", "csv", "--units", "mm", "--side", "both", board]),
        )
        .await?;

        let bom = &self.settings.bom;
        let bom_csv = out_dir.join(format!("{}_bom.csv", name));
        self.run(
            self.kicad()
                .args(["sch", "export", "bom", "-o", bom_csv.as_str()])
                .args(["--fields", bom.fields.as_str()])
                .args(["--labels", bom.labels.as_str()])
                .args(["--group-by", bom.group_by.as_str()])
                .arg(self.project.schematic.as_str()),
        )
        .await?;

        let archive = if zip_outputs {
            let zip_path = out_dir.join(gerber_archive_name(name));
            if zip_path.exists() {
                if let Err(e) = fs::remove_file(&zip_path) {
                    tracing::warn!("Warning: couldn't remove stale archive {}: {}", zip_path, e);
                }
            }
            let count = zip_dir(&gerbers_dir, &zip_path)?;
            tracing::info!("Archived {} gerber files into {}", count, zip_path);
            Some(zip_path)
        } else {
            None
        };

        Ok(FabArtifacts {
            gerbers_dir,
            drill_dir,
            pos_csv,
            bom_csv,
            archive,
        })
    }
}

/// Deflate every file under `src_dir` into `zip_path`, named relative to
/// `src_dir` with `/` separators. Returns the number of files written.
pub fn zip_dir(src_dir: &Utf8Path, zip_path: &Utf8Path) -> Result<usize> {
    let file = File::create(zip_path)
        .with_context(|| format!("Failed to create archive: {}", zip_path))?;
    let mut zip = zip::ZipWriter::new(file);
    let options =
        SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    let mut entries = Vec::new();
    collect_entries(src_dir, src_dir, &mut entries)?;

    let mut files = 0;
    for (path, name, is_dir) in entries {
        if is_dir {
            zip.add_directory(name, options)
                .with_context(|| format!("Failed to add {} to archive", path))?;
            continue;
        }
        zip.start_file(name, options)
            .with_context(|| format!("Failed to add {} to archive", path))?;
        let mut source =
            File::open(&path).with_context(|| format!("Failed to read {}", path))?;
        io::copy(&mut source, &mut zip)
            .with_context(|| format!("Failed to compress {}", path))?;
        files += 1;
    }

    zip.finish()
        .with_context(|| format!("Failed to finish archive: {}", zip_path))?;
    Ok(files)
}

// Depth-first, sorted so archives are reproducible.
fn collect_entries(
    base: &Utf8Path,
    dir: &Utf8Path,
    out: &mut Vec<(Utf8PathBuf, String, bool)>,
) -> Result<()> {
    let mut children = dir
        .read_dir_utf8()
        .with_context(|| format!("Failed to list directory: {}", dir))?
        .map(|entry| entry.map(|e| e.into_path()))
        .collect::<io::Result<Vec<_>>>()
        .with_context(|| format!("Failed to list directory: {}", dir))?;
    children.sort();

    for path in children {
        let relative = path
            .strip_prefix(base)
            .map(|rel| rel.components().map(|c| c.as_str()).collect::<Vec<_>>().join("/"))
            .unwrap_or_else(|_| path.to_string());

        if path.is_dir() {
            out.push((path.clone(), format!("{}/", relative), true));
            collect_entries(base, &path, out)?;
        } else {
            out.push((path, relative, false));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::process::testing::RecordingRunner;
    use std::io::Read;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        root: Utf8PathBuf,
        project: ProjectIdentity,
        settings: OutputSettings,
        metrics: RunMetrics,
    }

    fn fixture() -> Fixture {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let cad = root.join("CAD");
        fs::create_dir_all(&cad).unwrap();
        fs::write(cad.join("demo.kicad_sch"), "").unwrap();
        fs::write(cad.join("demo.kicad_pcb"), "").unwrap();
        let project = ProjectIdentity::resolve(&cad.join("demo.kicad_pro")).unwrap();

        Fixture {
            _temp: temp,
            root,
            project,
            settings: OutputSettings::default(),
            metrics: RunMetrics::new(),
        }
    }

    #[tokio::test]
    async fn test_export_3d_tolerates_missing_models() {
        let f = fixture();
        let runner = RecordingRunner::new().exit_code("export step", EXIT_MISSING_MODELS);
        let exporter = Exporter::new(
            &runner,
            Utf8Path::new("kicad-cli"),
            &f.project,
            &f.settings,
            &f.metrics,
        );

        let models = exporter.export_3d(&f.root.join("3D_MODEL"), false).await.unwrap();

        assert_eq!(models.step, f.root.join("3D_MODEL").join("demo.step"));
        assert!(models.glb.is_none());
        assert_eq!(f.metrics.tolerated_exits(), 1);
    }

    #[tokio::test]
    async fn test_export_3d_tolerated_code_without_file_is_fatal() {
        let f = fixture();
        let runner = RecordingRunner::new()
            .exit_code("export step", EXIT_MISSING_MODELS)
            .without_output("export step");
        let exporter = Exporter::new(
            &runner,
            Utf8Path::new("kicad-cli"),
            &f.project,
            &f.settings,
            &f.metrics,
        );

        let err = exporter.export_3d(&f.root.join("3D_MODEL"), true).await.unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::MissingOutput { step: "STEP", .. })
        ));
        // GLB never attempted
        assert_eq!(runner.commands().len(), 1);
    }

    #[tokio::test]
    async fn test_iso_render_uses_camera_settings() {
        let f = fixture();
        let runner = RecordingRunner::new();
        let exporter = Exporter::new(
            &runner,
            Utf8Path::new("kicad-cli"),
            &f.project,
            &f.settings,
            &f.metrics,
        );

        let pictures = exporter
            .export_pictures(&f.root.join("PICTURES"), true)
            .await
            .unwrap();

        let commands = runner.commands();
        assert_eq!(commands.len(), 4);
        assert_eq!(commands[2].flag_value("--side"), Some("left"));
        let iso = &commands[3];
        assert!(iso.args.contains(&"--perspective".to_string()));
        assert_eq!(iso.flag_value("--rotate"), Some("'-45,0,45'"));
        assert_eq!(iso.flag_value("--zoom"), Some("1"));
        assert_eq!(pictures.iso.unwrap().file_name(), Some("demo_iso.png"));
    }

    #[tokio::test]
    async fn test_docs_skip_drc() {
        let f = fixture();
        let runner = RecordingRunner::new();
        let exporter = Exporter::new(
            &runner,
            Utf8Path::new("kicad-cli"),
            &f.project,
            &f.settings,
            &f.metrics,
        );

        let docs = exporter
            .export_docs(&f.root.join("DOCUMENTATION"), false)
            .await
            .unwrap();

        assert!(docs.drc_report.is_none());
        let commands = runner.commands();
        assert_eq!(commands.len(), 3);
        assert!(commands.iter().all(|c| !c.args.contains(&"drc".to_string())));
        assert_eq!(
            commands[2].flag_value("--layers"),
            Some(f.settings.layers_arg().as_str())
        );
    }

    #[tokio::test]
    async fn test_failure_stops_remaining_calls() {
        let f = fixture();
        let runner = RecordingRunner::new().exit_code("sch erc", 1);
        let exporter = Exporter::new(
            &runner,
            Utf8Path::new("kicad-cli"),
            &f.project,
            &f.settings,
            &f.metrics,
        );

        let err = exporter
            .export_docs(&f.root.join("DOCUMENTATION"), true)
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::CommandFailed { code: 1, .. })
        ));
        assert_eq!(runner.commands().len(), 2);
    }

    #[tokio::test]
    async fn test_fab_archive_has_no_stale_entries() {
        let f = fixture();
        let runner = RecordingRunner::new();
        let exporter = Exporter::new(
            &runner,
            Utf8Path::new("kicad-cli"),
            &f.project,
            &f.settings,
            &f.metrics,
        );
        let prod = f.root.join("PRODUCTION").join("demo");

        // A previous archive with an entry the new run won't produce
        fs::create_dir_all(&prod).unwrap();
        let stale = prod.join("stale");
        fs::create_dir_all(&stale).unwrap();
        fs::write(stale.join("old.gbr"), "old").unwrap();
        zip_dir(&stale, &prod.join("demo_gerbers.zip")).unwrap();

        let fab = exporter.export_fab(&prod, true).await.unwrap();

        let archive = fab.archive.unwrap();
        assert_eq!(archive, prod.join("demo_gerbers.zip"));
        let mut zip = zip::ZipArchive::new(File::open(&archive).unwrap()).unwrap();
        let names: Vec<String> = zip.file_names().map(str::to_string).collect();
        assert_eq!(names, vec!["layer.gbr".to_string()]);

        let mut contents = String::new();
        zip.by_name("layer.gbr")
            .unwrap()
            .read_to_string(&mut contents)
            .unwrap();
        assert_eq!(contents, "G04*");
    }

    #[tokio::test]
    async fn test_bom_grouping_arguments() {
        let f = fixture();
        let runner = RecordingRunner::new();
        let exporter = Exporter::new(
            &runner,
            Utf8Path::new("kicad-cli"),
            &f.project,
            &f.settings,
            &f.metrics,
        );

        exporter
            .export_fab(&f.root.join("PRODUCTION").join("x"), false)
            .await
            .unwrap();

        let bom = runner
            .commands()
            .into_iter()
            .find(|c| c.args.contains(&"bom".to_string()))
            .unwrap();
        assert_eq!(bom.flag_value("--group-by"), Some("Value,Footprint,MPN"));
        assert_eq!(bom.args.last().map(String::as_str), Some(f.project.schematic.as_str()));
    }

    #[test]
    fn test_zip_dir_nested_names() {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let src = dir.join("gerbers");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("a.gbr"), "a").unwrap();
        fs::write(src.join("sub").join("b.gbr"), "b").unwrap();

        let count = zip_dir(&src, &dir.join("out.zip")).unwrap();
        assert_eq!(count, 2);

        let zip = zip::ZipArchive::new(File::open(dir.join("out.zip")).unwrap()).unwrap();
        let mut names: Vec<&str> = zip.file_names().collect();
        names.sort();
        assert_eq!(names, vec!["a.gbr", "sub/", "sub/b.gbr"]);
    }
}
