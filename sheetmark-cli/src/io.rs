//! File I/O for native CLI

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use sheetmark_core::{AnnotatorConfig, ExportPayload};

/// A file read from disk, ready to hand to the session
pub struct LoadedFile {
    pub filename: String,
    pub bytes: Vec<u8>,
}

/// Read a table file from disk
pub fn load_file(path: &str) -> Result<LoadedFile> {
    let path = Path::new(path);
    let canonical = path
        .canonicalize()
        .with_context(|| format!("Failed to resolve path: {}", path.display()))?;

    let bytes = fs::read(&canonical)
        .with_context(|| format!("Failed to read file: {}", canonical.display()))?;

    let filename = canonical
        .file_name()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();

    Ok(LoadedFile { filename, bytes })
}

/// Get the ~/.sheetmark directory path, creating it if needed
pub fn sheetmark_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not find home directory")?;
    let dir = home.join(".sheetmark");

    if !dir.exists() {
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create {}", dir.display()))?;
    }

    Ok(dir)
}

/// Load settings from an explicit path, or ~/.sheetmark/config.json when present
pub fn load_config(path: Option<&Path>) -> Result<AnnotatorConfig> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let default = sheetmark_dir()?.join("config.json");
            if !default.exists() {
                return Ok(AnnotatorConfig::default());
            }
            default
        }
    };

    let json = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    AnnotatorConfig::from_json(&json)
        .with_context(|| format!("Invalid config file {}", path.display()))
}

/// Write an export into `out_dir` (default ~/.sheetmark/exports)
pub fn write_export(payload: &ExportPayload, out_dir: Option<&Path>) -> Result<PathBuf> {
    let dir = match out_dir {
        Some(d) => d.to_path_buf(),
        None => sheetmark_dir()?.join("exports"),
    };
    fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;

    let export_path = dir.join(&payload.filename);
    fs::write(&export_path, &payload.bytes)
        .with_context(|| format!("Failed to write {}", export_path.display()))?;

    Ok(export_path)
}
