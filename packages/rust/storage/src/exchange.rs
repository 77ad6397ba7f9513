//! JSON Lines import/export for moving rows in and out of the tables.

use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use seoenrich_shared::{Result, SeoEnrichError};

/// Read one record per non-blank line.
pub fn read_jsonl<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = std::fs::File::open(path).map_err(|e| SeoEnrichError::io(path, e))?;
    let reader = BufReader::new(file);

    let mut records = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| SeoEnrichError::io(path, e))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = serde_json::from_str(&line).map_err(|e| {
            SeoEnrichError::validation(format!("{}:{}: {e}", path.display(), index + 1))
        })?;
        records.push(record);
    }
    Ok(records)
}

/// Write records as JSON Lines, replacing `path` atomically (temp file, then rename).
pub fn write_jsonl<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| SeoEnrichError::io(parent, e))?;
        }
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "export.jsonl".into());
    let temp = path.with_file_name(format!(".{file_name}.tmp"));

    {
        let file = std::fs::File::create(&temp).map_err(|e| SeoEnrichError::io(&temp, e))?;
        let mut writer = std::io::BufWriter::new(file);
        for record in records {
            let line = serde_json::to_string(record)
                .map_err(|e| SeoEnrichError::validation(format!("serialize failed: {e}")))?;
            writeln!(writer, "{line}").map_err(|e| SeoEnrichError::io(&temp, e))?;
        }
        writer.flush().map_err(|e| SeoEnrichError::io(&temp, e))?;
    }

    std::fs::rename(&temp, path).map_err(|e| SeoEnrichError::io(path, e))?;
    tracing::debug!(path = %path.display(), records = records.len(), "wrote jsonl");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use seoenrich_shared::Row;
    use uuid::Uuid;

    #[test]
    fn write_then_read() {
        let path = std::env::temp_dir().join(format!("seoenrich_{}.jsonl", Uuid::now_v7()));
        let rows = vec![Row::new("https://example.com/a"), Row::new("https://example.com/b")];
        write_jsonl(&path, &rows).unwrap();

        let back: Vec<Row> = read_jsonl(&path).unwrap();
        assert_eq!(back, rows);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn blank_lines_skipped_and_defaults_applied() {
        let path = std::env::temp_dir().join(format!("seoenrich_{}.jsonl", Uuid::now_v7()));
        std::fs::write(
            &path,
            "{\"url\":\"https://example.com/a\"}\n\n\
             {\"url\":\"https://example.com/b\",\"processed\":true}\n",
        )
        .unwrap();

        let rows: Vec<Row> = read_jsonl(&path).unwrap();
        assert_eq!(rows.len(), 2);
        assert!(!rows[0].processed);
        assert!(rows[1].processed);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn malformed_line_reports_position() {
        let path = std::env::temp_dir().join(format!("seoenrich_{}.jsonl", Uuid::now_v7()));
        std::fs::write(&path, "{\"url\":\"https://example.com/a\"}\nnot json\n").unwrap();

        let err = read_jsonl::<Row>(&path).unwrap_err();
        assert!(err.to_string().contains(":2:"));
        let _ = std::fs::remove_file(&path);
    }
}
