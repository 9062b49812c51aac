use anyhow::{Context, Result, anyhow};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::tempdir;
use tracing::debug;

/// Thin wrapper over the MuPDF command line tool used for text extraction.
#[derive(Debug, Clone)]
pub struct Mutool {
    program: PathBuf,
}

impl Mutool {
    pub fn locate() -> Result<Self> {
        Self::with_program("mutool")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Result<Self> {
        let program = program.into();
        if !command_exists(&program) {
            return Err(anyhow!(
                "text extraction requires mutool (install mupdf): {} not found",
                program.display()
            ));
        }
        Ok(Self { program })
    }

    /// Structured text (`stext`) XML for one zero-based page.
    pub fn stext(&self, pdf: &Path, page: usize) -> Result<String> {
        self.draw(pdf, page, "stext")
    }

    fn draw(&self, pdf: &Path, page: usize, format: &str) -> Result<String> {
        let dir = tempdir().with_context(|| "failed to create temp dir for mutool")?;
        let output_path = dir.path().join(format!("page.{format}.xml"));
        debug!("mutool draw -F {} page {}", format, page + 1);
        let output = Command::new(&self.program)
            .arg("draw")
            .arg("-q")
            .arg("-F")
            .arg(format)
            .arg("-o")
            .arg(&output_path)
            .arg(pdf)
            .arg((page + 1).to_string())
            .output()
            .with_context(|| "failed to run mutool draw")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("mutool draw failed: {}", stderr.trim()));
        }
        let bytes = fs::read(&output_path)
            .with_context(|| format!("failed to read mutool output: {}", output_path.display()))?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

pub(crate) fn command_exists(cmd: &Path) -> bool {
    if cmd.components().count() > 1 {
        return is_executable(cmd);
    }
    let path_var = match env::var_os("PATH") {
        Some(value) => value,
        None => return false,
    };

    #[cfg(windows)]
    let candidates = windows_command_candidates(cmd);
    #[cfg(not(windows))]
    let candidates = vec![cmd.to_path_buf()];

    env::split_paths(&path_var).any(|dir| {
        candidates
            .iter()
            .any(|candidate| is_executable(&dir.join(candidate)))
    })
}

fn is_executable(path: &Path) -> bool {
    let metadata = match fs::metadata(path) {
        Ok(value) => value,
        Err(_) => return false,
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}

#[cfg(windows)]
fn windows_command_candidates(cmd: &Path) -> Vec<PathBuf> {
    if cmd.extension().is_some() {
        return vec![cmd.to_path_buf()];
    }
    let pathext = env::var_os("PATHEXT").unwrap_or_else(|| ".EXE;.CMD;.BAT;.COM".into());
    pathext
        .to_string_lossy()
        .split(';')
        .filter(|ext| !ext.is_empty())
        .map(|ext| PathBuf::from(format!("{}{}", cmd.display(), ext.to_lowercase())))
        .collect()
}
