//! Shared helpers for the integration tests.
//!
//! No real kicad-cli or KiKit is ever launched: [`FakeRunner`] stands in for
//! both and writes a placeholder wherever a command was told to write.

#![allow(dead_code)]

use anyhow::Result;
use camino::{Utf8Path, Utf8PathBuf};
use kicad_outputs::services::{CommandOutput, CommandRunner, ToolCommand};
use kicad_outputs::ToolLocator;
use std::fs;
use std::sync::Mutex;
use tempfile::TempDir;

/// Records commands and fakes their outputs.
#[derive(Default)]
pub struct FakeRunner {
    calls: Mutex<Vec<ToolCommand>>,
    exit_codes: Vec<(String, i32)>,
    no_output: Vec<String>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Commands whose rendered line contains `pattern` exit with `code`
    pub fn exit_code(mut self, pattern: &str, code: i32) -> Self {
        self.exit_codes.push((pattern.to_string(), code));
        self
    }

    /// Commands whose rendered line contains `pattern` write nothing
    pub fn without_output(mut self, pattern: &str) -> Self {
        self.no_output.push(pattern.to_string());
        self
    }

    pub fn commands(&self) -> Vec<ToolCommand> {
        self.calls.lock().unwrap().clone()
    }

    /// Rendered command lines, in call order
    pub fn lines(&self) -> Vec<String> {
        self.commands().iter().map(ToString::to_string).collect()
    }

    pub fn count_containing(&self, pattern: &str) -> usize {
        self.lines().iter().filter(|l| l.contains(pattern)).count()
    }
}

impl CommandRunner for FakeRunner {
    async fn execute(&self, command: &ToolCommand) -> Result<CommandOutput> {
        self.calls.lock().unwrap().push(command.clone());
        let line = command.to_string();

        if !self.no_output.iter().any(|p| line.contains(p.as_str())) {
            if let Some(target) = command.flag_value("-o") {
                let target = Utf8Path::new(target);
                if target.is_dir() {
                    fs::write(target.join("board-F_Cu.gbr"), "G04 fake*")?;
                } else {
                    fs::write(target, "fake output")?;
                }
            }
        }

        let exit_code = self
            .exit_codes
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map(|(_, code)| *code)
            .unwrap_or(0);

        Ok(CommandOutput {
            exit_code,
            stdout: format!("ran {}", line),
            stderr: String::new(),
        })
    }
}

/// Scratch workspace holding a `demo` design and a fake kicad-cli install
pub struct Workspace {
    _temp: TempDir,
    pub dir: Utf8PathBuf,
    pub design_dir: Utf8PathBuf,
    pub out_root: Utf8PathBuf,
    pub kicad_bin: Utf8PathBuf,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let dir = Utf8PathBuf::try_from(temp.path().to_path_buf()).unwrap();
        let design_dir = dir.join("design");
        let kicad_bin = dir.join("kicad").join("bin");
        fs::create_dir_all(&design_dir).unwrap();
        fs::create_dir_all(&kicad_bin).unwrap();

        fs::write(design_dir.join("demo.kicad_pro"), "{}").unwrap();
        fs::write(design_dir.join("demo.kicad_sch"), "(kicad_sch)").unwrap();
        fs::write(design_dir.join("demo.kicad_pcb"), "(kicad_pcb)").unwrap();
        make_executable(&kicad_bin.join(exe("kicad-cli")));

        Self {
            out_root: dir.join("out"),
            _temp: temp,
            dir,
            design_dir,
            kicad_bin,
        }
    }

    pub fn project(&self) -> Utf8PathBuf {
        self.design_dir.join("demo.kicad_pro")
    }

    /// Locator that only sees the fake install
    pub fn locator(&self) -> ToolLocator {
        ToolLocator::new(
            Some(self.kicad_bin.as_os_str().to_owned()),
            self.dir.join("no-fallback"),
        )
    }

    pub fn add_bundled_python(&self) -> Utf8PathBuf {
        let python = self.kicad_bin.join(exe("python"));
        make_executable(&python);
        python
    }
}

pub fn exe(name: &str) -> String {
    format!("{}{}", name, std::env::consts::EXE_SUFFIX)
}

pub fn make_executable(path: &Utf8Path) {
    fs::write(path, "#!/bin/sh\nexit 0\n").unwrap();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o755)).unwrap();
    }
}

/// File names directly inside `dir`, sorted
pub fn file_names(dir: &Utf8Path) -> Vec<String> {
    let mut names: Vec<String> = dir
        .read_dir_utf8()
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string())
        .collect();
    names.sort();
    names
}
