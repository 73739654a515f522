//! Report sink: create the parent directory if absent, then write the
//! whole file.

use std::fs;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

pub fn write_text_report(path: &Path, text: &str) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, text)?;
    Ok(())
}

/// Pretty-printed JSON of any serialisable report.
pub fn write_json_report<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    ensure_parent(path)?;
    fs::write(path, serde_json::to_string_pretty(value)?)?;
    Ok(())
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/report.txt");
        write_text_report(&path, "hello").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "hello");

        write_text_report(&path, "again").unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "again");
    }

    #[test]
    fn writes_pretty_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/report.json");
        write_json_report(&path, &serde_json::json!({"rows": 3})).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("\"rows\": 3"));
    }
}
