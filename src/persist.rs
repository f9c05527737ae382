//! Atomic JSON file writes shared by the state store, output writer and history

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// Render a value as 2-space indented JSON with a trailing newline
pub fn to_pretty_json<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    let mut json = serde_json::to_string_pretty(value)?;
    json.push('\n');
    Ok(json)
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
///
/// Parent directories are created as needed. Readers never observe a
/// partially written file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> io::Result<()> {
    let tmp = tmp_path(path);

    if let Some(parent) = tmp.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    fs::write(&tmp, bytes)?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e);
    }
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut p = path.to_path_buf();
    let file_name = match path.file_name().and_then(|s| s.to_str()) {
        Some(n) => n.to_string(),
        None => "llm-i18n".to_string(),
    };
    p.set_file_name(format!("{file_name}.tmp"));
    p
}
