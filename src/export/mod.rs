//! Export pipeline: transcript to rows, rows to CSV, CSV to the object store.

mod csv;
pub mod ledger;

use anyhow::{Context, Result, bail};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use time::OffsetDateTime;

use crate::identity::User;
use crate::transcript::{Clock, Role, Transcript, TranscriptError, recompute_response_times};
use crate::upload::ObjectStore;

pub use csv::{HEADER, parse_csv, read_csv, to_csv_string, write_csv};

/// Folder every chat log is stored under in the bucket
pub const OBJECT_PREFIX: &str = "chat_logs";

/// One line of an exported chat log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRow {
    pub date: String,
    pub time: String,
    pub role: Role,
    pub content: String,
    pub length: usize,
    pub response_time: Option<u64>,
}

impl ExportRow {
    /// Fields in [`HEADER`] order. A missing response time is an empty field.
    pub fn to_record(&self) -> [String; 6] {
        [
            self.date.clone(),
            self.time.clone(),
            self.role.as_str().to_string(),
            self.content.clone(),
            self.length.to_string(),
            self.response_time.map(|t| t.to_string()).unwrap_or_default(),
        ]
    }

    pub fn from_record(fields: &[String]) -> Result<Self> {
        let [date, time, role, content, length, response_time] = fields else {
            bail!("expected {} fields, found {}", HEADER.len(), fields.len());
        };
        let response_time = if response_time.is_empty() {
            None
        } else {
            Some(
                response_time
                    .parse()
                    .with_context(|| format!("invalid response_time {response_time:?}"))?,
            )
        };
        Ok(Self {
            date: date.clone(),
            time: time.clone(),
            role: Role::parse(role)?,
            content: content.clone(),
            length: length
                .parse()
                .with_context(|| format!("invalid length {length:?}"))?,
            response_time,
        })
    }
}

/// Rows for every non-system turn, in transcript order.
///
/// Turns still missing a timestamp are stamped in the transcript itself, so
/// a later export sees the same stamp. Response times are recomputed across
/// the exported sequence.
pub fn render_rows(
    transcript: &mut Transcript,
    clock: &dyn Clock,
) -> Result<Vec<ExportRow>, TranscriptError> {
    transcript.annotate_pending(clock)?;
    let mut turns: Vec<_> = transcript.visible().cloned().collect();
    recompute_response_times(&mut turns)?;

    turns
        .into_iter()
        .map(|turn| -> Result<ExportRow, TranscriptError> {
            let stamp = turn.timestamp.unwrap_or_default();
            let (date, time) = stamp
                .split_once(' ')
                .ok_or_else(|| TranscriptError::BadTimestamp {
                    value: stamp.clone(),
                })?;
            Ok(ExportRow {
                date: date.to_string(),
                time: time.to_string(),
                role: turn.role,
                content: turn.content,
                length: turn.length,
                response_time: turn.response_time,
            })
        })
        .collect()
}

/// `alice@uni.ac.uk` -> `alice_uni_ac_uk`
pub fn sanitize_identifier(email: &str) -> String {
    email.replace(['@', '.'], "_")
}

/// `{identifier}_{HHMM}_chat_log.csv`, stamped with the local time of day
pub fn export_filename(email: &str, at: OffsetDateTime) -> String {
    format!(
        "{}_{:02}{:02}_chat_log.csv",
        sanitize_identifier(email),
        at.hour(),
        at.minute()
    )
}

pub fn object_key(uid: &str, filename: &str) -> String {
    format!("{OBJECT_PREFIX}/{uid}_{filename}")
}

/// Result of a successful export
#[derive(Debug, Clone)]
pub struct ExportReceipt {
    pub local_path: PathBuf,
    pub object_key: String,
    pub public_url: String,
    pub rows: usize,
}

/// Serializes the full transcript and hands it to the object store
pub struct Exporter {
    store: Box<dyn ObjectStore>,
    out_dir: PathBuf,
    clock: Arc<dyn Clock>,
    ledger: Option<PathBuf>,
}

impl Exporter {
    pub fn new(store: Box<dyn ObjectStore>, out_dir: PathBuf, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            out_dir,
            clock,
            ledger: None,
        }
    }

    /// Record every published export in a local ledger file
    pub fn with_ledger(mut self, path: PathBuf) -> Self {
        self.ledger = Some(path);
        self
    }

    pub fn export(&self, transcript: &mut Transcript, user: &User) -> Result<ExportReceipt> {
        let rows = render_rows(transcript, self.clock.as_ref())?;
        let exported_at = self.clock.now();
        let filename = export_filename(&user.email, exported_at);

        fs::create_dir_all(&self.out_dir)
            .with_context(|| format!("failed to create {}", self.out_dir.display()))?;
        let local_path = self.out_dir.join(&filename);
        write_csv(&rows, &local_path)?;

        let key = object_key(&user.uid, &filename);
        let public_url = self
            .store
            .publish(&local_path, &key)
            .with_context(|| format!("failed to publish {key}"))?;
        tracing::info!(key = %key, rows = rows.len(), url = %public_url, "chat log exported");

        if let Some(ledger_path) = &self.ledger {
            let record = ledger::ExportRecord {
                object_key: key.clone(),
                public_url: public_url.clone(),
                email: user.email.clone(),
                rows: rows.len(),
                exported_at,
            };
            if let Err(err) = ledger::save_record(ledger_path, &record) {
                tracing::warn!(error = %err, "failed to update export ledger");
            }
        }

        Ok(ExportReceipt {
            local_path,
            object_key: key,
            public_url,
            rows: rows.len(),
        })
    }
}
