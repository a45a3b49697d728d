use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;

use sugartrack_core::backup::{ImportError, backup_file_name};
use sugartrack_core::service::SugarService;

use super::helpers::json_error;

/// Write the full collection as a JSON backup. With no path, writes
/// `sugartrack_backup_<date>.json` into the current directory.
pub(crate) fn cmd_export(svc: &SugarService, output: Option<&Path>, stdout: bool) -> Result<()> {
    let json = svc.export_json()?;

    if stdout {
        println!("{json}");
        return Ok(());
    }

    let path = output.map_or_else(
        || PathBuf::from(backup_file_name(Local::now().date_naive())),
        Path::to_path_buf,
    );
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write backup: {}", path.display()))?;

    let count = svc.records().len();
    println!("Exported {count} readings to {}", path.display());
    Ok(())
}

/// Replace the whole collection with the contents of a backup file.
/// A rejected file leaves the existing readings untouched.
pub(crate) fn cmd_import(svc: &mut SugarService, path: &Path, json: bool) -> Result<()> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;

    match svc.import_json(&text) {
        Ok(count) => {
            if json {
                println!("{}", serde_json::json!({ "imported": count }));
            } else {
                println!("Data restored successfully: {count} readings");
            }
            Ok(())
        }
        Err(ImportError::Storage(e)) => Err(e),
        Err(e) if json => {
            println!("{}", json_error(&format!("Invalid file format: {e}")));
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e)
            .context("Invalid file format; existing readings were left unchanged")),
    }
}
