//! Local record of published chat logs.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use time::OffsetDateTime;

/// A published chat log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportRecord {
    pub object_key: String,
    pub public_url: String,
    pub email: String,
    pub rows: usize,
    #[serde(with = "time::serde::rfc3339")]
    pub exported_at: OffsetDateTime,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct LedgerFile {
    exports: Vec<ExportRecord>,
}

/// Load all records, or none if the ledger doesn't exist yet
pub fn load_records(path: &Path) -> Result<Vec<ExportRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path).context("Failed to read export ledger")?;
    let file: LedgerFile =
        serde_json::from_str(&content).context("Failed to parse export ledger")?;
    Ok(file.exports)
}

/// Insert a record, replacing an earlier one for the same object.
/// An unreadable ledger is left as it is.
pub fn save_record(path: &Path, record: &ExportRecord) -> Result<()> {
    let mut records = load_records(path)?;

    // Same-minute exports overwrite the same object in the bucket
    let existing = records
        .iter()
        .position(|r| r.object_key == record.object_key);

    if let Some(idx) = existing {
        records[idx] = record.clone();
    } else {
        records.push(record.clone());
    }

    write_records(path, &records)
}

fn write_records(path: &Path, records: &[ExportRecord]) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = LedgerFile {
        exports: records.to_vec(),
    };
    let content = serde_json::to_string_pretty(&file)?;
    fs::write(path, format!("{content}\n")).context("Failed to write export ledger")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn make_record(key: &str, rows: usize) -> ExportRecord {
        ExportRecord {
            object_key: key.to_string(),
            public_url: format!("https://storage.googleapis.com/bucket/{key}"),
            email: "ada@uni.ac.uk".to_string(),
            rows,
            exported_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn missing_ledger_is_empty() {
        let tmp = TempDir::new().unwrap();
        let records = load_records(&tmp.path().join("exports.json")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn save_appends_distinct_objects() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("exports.json");
        save_record(&path, &make_record("chat_logs/a_0900_chat_log.csv", 1)).unwrap();
        save_record(&path, &make_record("chat_logs/a_0901_chat_log.csv", 3)).unwrap();
        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].rows, 3);
    }

    #[test]
    fn save_replaces_same_object() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("exports.json");
        save_record(&path, &make_record("chat_logs/a_0900_chat_log.csv", 1)).unwrap();
        save_record(&path, &make_record("chat_logs/a_0900_chat_log.csv", 3)).unwrap();
        let records = load_records(&path).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].rows, 3);
    }

    #[test]
    fn corrupt_ledger_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("exports.json");
        fs::write(&path, "not json").unwrap();
        assert!(load_records(&path).is_err());
    }

    #[test]
    fn save_keeps_corrupt_ledger_intact() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("exports.json");
        fs::write(&path, r#"{"exports": ["#).unwrap();

        let err = save_record(&path, &make_record("chat_logs/a_0900_chat_log.csv", 1)).unwrap_err();
        assert!(format!("{err:#}").contains("Failed to parse export ledger"));
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"exports": ["#);
    }
}
