//! CSV encoding for exported chat logs.
//!
//! Records end in CRLF; fields are quoted only when they contain a comma,
//! a double quote, or a line break, with embedded quotes doubled.

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::Path;

use super::ExportRow;

pub const HEADER: [&str; 6] = ["date", "time", "role", "content", "length", "response_time"];

const LINE_END: &str = "\r\n";

fn needs_quotes(field: &str) -> bool {
    field.contains([',', '"', '\n', '\r'])
}

fn push_field(out: &mut String, field: &str) {
    if needs_quotes(field) {
        out.push('"');
        out.push_str(&field.replace('"', "\"\""));
        out.push('"');
    } else {
        out.push_str(field);
    }
}

fn push_record<S: AsRef<str>>(out: &mut String, fields: &[S]) {
    for (i, field) in fields.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_field(out, field.as_ref());
    }
    out.push_str(LINE_END);
}

/// Header plus one record per row
pub fn to_csv_string(rows: &[ExportRow]) -> String {
    let mut out = String::new();
    push_record(&mut out, &HEADER);
    for row in rows {
        push_record(&mut out, &row.to_record());
    }
    out
}

/// Write rows to `path`, replacing any previous file in one rename
pub fn write_csv(rows: &[ExportRow], path: &Path) -> Result<()> {
    let filename = path
        .file_name()
        .and_then(|s| s.to_str())
        .context("export path has no file name")?;
    let tmp = path.with_file_name(format!(".{filename}.tmp"));
    fs::write(&tmp, to_csv_string(rows))
        .with_context(|| format!("failed to write {}", tmp.display()))?;
    fs::rename(&tmp, path).with_context(|| format!("failed to move {} into place", path.display()))?;
    Ok(())
}

/// Split CSV text into raw records
pub fn parse_records(text: &str) -> Result<Vec<Vec<String>>> {
    let mut records = Vec::new();
    let mut record = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut was_quoted = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        if in_quotes {
            match c {
                '"' if chars.peek() == Some(&'"') => {
                    chars.next();
                    field.push('"');
                }
                '"' => in_quotes = false,
                _ => field.push(c),
            }
            continue;
        }
        match c {
            '"' if field.is_empty() && !was_quoted => {
                in_quotes = true;
                was_quoted = true;
            }
            '"' => bail!("stray quote in unquoted field (record {})", records.len() + 1),
            ',' => {
                record.push(std::mem::take(&mut field));
                was_quoted = false;
            }
            '\r' if chars.peek() == Some(&'\n') => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                records.push(std::mem::take(&mut record));
                was_quoted = false;
            }
            c if was_quoted => bail!(
                "unexpected {c:?} after closing quote (record {})",
                records.len() + 1
            ),
            _ => field.push(c),
        }
    }

    if in_quotes {
        bail!("unterminated quoted field");
    }
    if !field.is_empty() || !record.is_empty() || was_quoted {
        record.push(field);
        records.push(record);
    }
    Ok(records)
}

/// Parse an exported log back into rows, checking the header
pub fn parse_csv(text: &str) -> Result<Vec<ExportRow>> {
    let mut records = parse_records(text)?.into_iter();
    let header = records.next().context("empty chat log")?;
    if header != HEADER {
        bail!("unexpected header: {}", header.join(","));
    }
    records
        .enumerate()
        .map(|(i, record)| {
            ExportRow::from_record(&record).with_context(|| format!("bad record {}", i + 1))
        })
        .collect()
}

pub fn read_csv(path: &Path) -> Result<Vec<ExportRow>> {
    let text =
        fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    parse_csv(&text).with_context(|| format!("failed to parse {}", path.display()))
}
