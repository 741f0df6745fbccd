//! JSONL storage: one line per record.
//!
//! The portable snapshot format shared by every store in this crate. Reads
//! tolerate blank lines and `#` comments; writes replace the file atomically
//! via a temp file and rename.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Errors from JSONL operations.
#[derive(Debug, thiserror::Error)]
pub enum JsonlError {
    #[error("line {0}: I/O error: {1}")]
    Io(usize, String),

    #[error("line {0}: parse error: {1}")]
    Parse(usize, String),

    #[error("serialization error: {0}")]
    Serialize(String),

    #[error("corrupted snapshot: {0}")]
    Corrupt(String),
}

/// Read records from a JSONL reader.
pub fn read_records<T: DeserializeOwned>(reader: impl BufRead) -> Result<Vec<T>, JsonlError> {
    let mut records = Vec::new();
    for (line_no, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| JsonlError::Io(line_no + 1, e.to_string()))?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let record: T = serde_json::from_str(trimmed)
            .map_err(|e| JsonlError::Parse(line_no + 1, e.to_string()))?;
        records.push(record);
    }
    Ok(records)
}

/// Write records to a JSONL writer.
pub fn write_records<T: Serialize>(
    writer: &mut impl Write,
    records: &[T],
) -> Result<(), JsonlError> {
    for record in records {
        let line =
            serde_json::to_string(record).map_err(|e| JsonlError::Serialize(e.to_string()))?;
        writeln!(writer, "{line}").map_err(|e| JsonlError::Io(0, e.to_string()))?;
    }
    Ok(())
}

/// Read records from a JSONL file path. A missing file reads as empty.
pub fn read_records_from_path<T: DeserializeOwned>(
    path: impl AsRef<Path>,
) -> Result<Vec<T>, JsonlError> {
    let path = path.as_ref();
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes =
        fs::read(path).map_err(|e| JsonlError::Io(0, format!("{}: {e}", path.display())))?;
    validate_snapshot_bytes(path, &bytes)?;
    let reader = BufReader::new(bytes.as_slice());
    read_records(reader)
}

/// Write records to a JSONL file path, replacing it atomically.
pub fn write_records_to_path<T: Serialize>(
    path: impl AsRef<Path>,
    records: &[T],
) -> Result<(), JsonlError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| JsonlError::Io(0, format!("{parent:?}: {e}")))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), JsonlError> {
        let file = File::create(&tmp_path)
            .map_err(|e| JsonlError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        let mut writer = BufWriter::new(file);
        write_records(&mut writer, records)?;
        writer
            .flush()
            .map_err(|e| JsonlError::Io(0, format!("{}: {e}", tmp_path.display())))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        JsonlError::Io(
            0,
            format!("{} -> {}: {e}", tmp_path.display(), path.display()),
        )
    })
}

/// Append one record as a single line, creating the file if needed.
pub fn append_record_to_path<T: Serialize>(
    path: impl AsRef<Path>,
    record: &T,
) -> Result<(), JsonlError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| JsonlError::Io(0, format!("{parent:?}: {e}")))?;
    }
    let line = serde_json::to_string(record).map_err(|e| JsonlError::Serialize(e.to_string()))?;
    let mut file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| JsonlError::Io(0, format!("{}: {e}", path.display())))?;
    writeln!(file, "{line}").map_err(|e| JsonlError::Io(0, format!("{}: {e}", path.display())))
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

fn validate_snapshot_bytes(path: &Path, bytes: &[u8]) -> Result<(), JsonlError> {
    if bytes.contains(&0) {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains NUL byte(s)",
            path.display()
        )));
    }
    if std::str::from_utf8(bytes).is_err() {
        return Err(JsonlError::Corrupt(format!(
            "{}: contains non-UTF-8 byte sequence(s)",
            path.display()
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use thela_core::FoodItem;

    fn temp_path(prefix: &str) -> PathBuf {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        std::env::temp_dir().join(format!(
            "thela-jsonl-{prefix}-{}-{unique}.jsonl",
            std::process::id()
        ))
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let path = temp_path("missing");
        let records: Vec<FoodItem> =
            read_records_from_path(&path).expect("missing path should read empty");
        assert!(records.is_empty());
    }

    #[test]
    fn comments_and_blank_lines_are_skipped() {
        let text = "# seeded fixture\n\n{\"id\":\"chai\",\"name\":\"Chai\",\"stock\":10}\n";
        let records: Vec<FoodItem> =
            read_records(BufReader::new(text.as_bytes())).expect("fixture should parse");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "chai");
        assert_eq!(records[0].stock, 10);
    }

    #[test]
    fn write_replaces_file_atomically() {
        let path = temp_path("atomic-write");
        write_records_to_path(&path, &[FoodItem::new("chai", "Chai", "cups")])
            .expect("first write should succeed");
        write_records_to_path(&path, &[FoodItem::new("samosa", "Samosa", "pieces")])
            .expect("second write should succeed");

        let text = fs::read_to_string(&path).expect("jsonl should exist");
        assert!(!text.contains("chai"));
        assert!(text.contains("samosa"));

        let _ = fs::remove_file(path);
    }

    #[test]
    fn rejects_nul_payload() {
        let path = temp_path("nul");
        fs::write(&path, b"{\"id\":\"chai\",\"name\":\"Chai\"}\n\0garbage")
            .expect("fixture should write");

        let result: Result<Vec<FoodItem>, _> = read_records_from_path(&path);
        match result {
            Err(JsonlError::Corrupt(message)) => assert!(message.contains("contains NUL")),
            other => panic!("expected corrupt snapshot error, got {other:?}"),
        }

        let _ = fs::remove_file(path);
    }
}
