//! The end-to-end export run.
//!
//! Steps run strictly in order: 3D, pictures, docs, fabrication, optional
//! KiKit package, README. The first error stops the run.

use crate::metrics::RunMetrics;
use crate::models::run_config::{DOCUMENTATION_DIR, PICTURES_DIR, THREE_D_DIR};
use crate::models::{OutputSettings, ProjectIdentity, RunConfig};
use crate::services::exports::{
    DocArtifacts, Exporter, FabArtifacts, ModelArtifacts, PictureArtifacts,
};
use crate::services::locator::ToolLocator;
use crate::services::process::CommandRunner;
use crate::services::staging::{ensure_dir, production_dir, resolve};
use crate::services::summary::{ReadmeOutcome, render_readme_if_missing};
use crate::services::vendor::run_vendor_fab;
use anyhow::Result;
use camino::Utf8PathBuf;
use chrono::{DateTime, Local};
use std::future::Future;
use std::time::Instant;

/// Where everything ended up
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub project: ProjectIdentity,
    pub root: Utf8PathBuf,
    pub three_d_dir: Utf8PathBuf,
    pub pictures_dir: Utf8PathBuf,
    pub docs_dir: Utf8PathBuf,
    pub production_dir: Utf8PathBuf,
    pub models: ModelArtifacts,
    pub pictures: PictureArtifacts,
    pub docs: DocArtifacts,
    pub fab: FabArtifacts,
    pub vendor_archive: Option<Utf8PathBuf>,
    pub readme: ReadmeOutcome,
}

impl RunSummary {
    /// Human-readable closing report
    pub fn report(&self) -> String {
        let mut lines = vec![
            "All done.".to_string(),
            format!("  3D:         {}", self.three_d_dir),
            format!("  Pictures:   {}", self.pictures_dir),
            format!("  Docs:       {}", self.docs_dir),
            format!("  Production: {}", self.production_dir),
        ];
        if let Some(archive) = &self.fab.archive {
            lines.push(format!("  Gerber ZIP: {}", archive));
        }
        if let Some(archive) = &self.vendor_archive {
            lines.push(format!("  Vendor ZIP: {}", archive));
        }
        lines.push(match &self.readme {
            ReadmeOutcome::Kept(path) => format!("  README:     {} (kept)", path),
            ReadmeOutcome::Generated { path, .. } => format!("  README:     {} (generated)", path),
        });
        lines.join("\n")
    }
}

/// Runs the export steps against an injected command runner and locator
pub struct Pipeline<'a, R: CommandRunner> {
    runner: &'a R,
    locator: &'a ToolLocator,
    settings: &'a OutputSettings,
    metrics: RunMetrics,
}

impl<'a, R: CommandRunner> Pipeline<'a, R> {
    pub fn new(runner: &'a R, locator: &'a ToolLocator, settings: &'a OutputSettings) -> Self {
        Self {
            runner,
            locator,
            settings,
            metrics: RunMetrics::new(),
        }
    }

    pub fn metrics(&self) -> &RunMetrics {
        &self.metrics
    }

    pub async fn run(&self, config: &RunConfig) -> Result<RunSummary> {
        self.run_at(config, Local::now()).await
    }

    /// Run with an explicit clock reading for the production-folder timestamp
    pub async fn run_at(&self, config: &RunConfig, now: DateTime<Local>) -> Result<RunSummary> {
        let kicad = self.locator.kicad_cli()?;
        let project = ProjectIdentity::resolve(&config.project)?;

        ensure_dir(&config.root)?;
        let root = resolve(&config.root)?;
        let three_d_dir = root.join(THREE_D_DIR);
        let pictures_dir = root.join(PICTURES_DIR);
        let docs_dir = root.join(DOCUMENTATION_DIR);
        for dir in [&three_d_dir, &pictures_dir, &docs_dir] {
            ensure_dir(dir)?;
        }

        let (production_dir, clear_report) = production_dir(
            &root.join(&config.prod_dir),
            &project.name,
            config.production_mode,
            now,
        )?;
        if let Some(report) = &clear_report {
            self.metrics
                .record_clear_failures(report.failures().count());
        }

        tracing::info!("Project: {}", project.name);
        tracing::info!("SCH:     {}", project.schematic);
        tracing::info!("PCB:     {}", project.board);
        tracing::info!("Root:    {}", root);
        tracing::info!("kicad:   {}", kicad);

        let exporter = Exporter::new(self.runner, &kicad, &project, self.settings, &self.metrics);

        let models = self
            .timed("3D models", exporter.export_3d(&three_d_dir, config.glb))
            .await?;
        let pictures = self
            .timed("Renders", exporter.export_pictures(&pictures_dir, config.iso))
            .await?;
        let docs = self
            .timed("Documentation", exporter.export_docs(&docs_dir, config.include_drc))
            .await?;
        let fab = self
            .timed("Fabrication", exporter.export_fab(&production_dir, config.zip))
            .await?;

        let vendor_archive = match &config.vendor {
            Some(request) => {
                tracing::info!("Running KiKit fab for vendor: {}", request.vendor);
                let python = self.locator.companion_python(&kicad)?;
                let archive = self
                    .timed(
                        "KiKit",
                        run_vendor_fab(
                            self.runner,
                            &python,
                            &project,
                            request,
                            &production_dir,
                            self.settings.vendor_clean,
                            &self.metrics,
                        ),
                    )
                    .await?;
                tracing::info!("KiKit vendor ZIP: {}", archive);
                Some(archive)
            }
            None => None,
        };

        let readme = render_readme_if_missing(
            &root.join(&self.settings.readme_file),
            &root.join(&self.settings.readme_template),
            &pictures_dir,
            &project.name,
        )?;

        self.metrics.log_summary();

        Ok(RunSummary {
            project,
            root,
            three_d_dir,
            pictures_dir,
            docs_dir,
            production_dir,
            models,
            pictures,
            docs,
            fab,
            vendor_archive,
            readme,
        })
    }

    async fn timed<T>(&self, step: &str, work: impl Future<Output = Result<T>>) -> Result<T> {
        let start = Instant::now();
        let result = work.await;
        let elapsed = start.elapsed();
        self.metrics.record_step_time(elapsed);
        match &result {
            Ok(_) => tracing::debug!("{} finished in {:.2}s", step, elapsed.as_secs_f32()),
            Err(e) => tracing::error!("{} failed after {:.2}s: {}", step, elapsed.as_secs_f32(), e),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BuildError;
    use crate::services::process::testing::RecordingRunner;
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_tool_lookup_happens_before_anything_is_written() {
        let temp = TempDir::new().unwrap();
        let root = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        fs::write(root.join("demo.kicad_sch"), "").unwrap();
        fs::write(root.join("demo.kicad_pcb"), "").unwrap();

        let runner = RecordingRunner::new();
        let locator = ToolLocator::new(None, root.join("no-kicad-cli"));
        let settings = OutputSettings::default();
        let pipeline = Pipeline::new(&runner, &locator, &settings);

        let err = pipeline
            .run(&RunConfig::new(root.join("demo"), root.join("out")))
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<BuildError>(),
            Some(BuildError::ToolNotFound { .. })
        ));
        assert!(!root.join("out").exists());
        assert!(runner.commands().is_empty());
    }
}
