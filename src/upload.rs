//! Object storage for exported chat logs.

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Stores a local file under `key`, makes it publicly readable, and returns
/// its public URL
pub trait ObjectStore: Send + Sync {
    fn publish(&self, path: &Path, key: &str) -> Result<String>;
}

/// Percent-encode an object name for use in a URL path, keeping `/`
pub fn encode_object_path(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    for byte in key.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' | b'/' => {
                out.push(byte as char)
            }
            _ => out.push_str(&format!("%{byte:02X}")),
        }
    }
    out
}

#[derive(Deserialize)]
struct UploadResponse {
    name: String,
}

/// Google Cloud Storage bucket (the bucket behind Firebase Storage)
pub struct GcsStore {
    agent: ureq::Agent,
    api_url: String,
    public_url: String,
    bucket: String,
    token: String,
}

impl GcsStore {
    pub fn new(
        api_url: &str,
        public_url: &str,
        bucket: &str,
        token: String,
        timeout: Option<Duration>,
    ) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            api_url: api_url.trim_end_matches('/').to_string(),
            public_url: public_url.trim_end_matches('/').to_string(),
            bucket: bucket.to_string(),
            token,
        }
    }

    pub fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_url, self.bucket, encode_object_path(key))
    }
}

impl ObjectStore for GcsStore {
    fn publish(&self, path: &Path, key: &str) -> Result<String> {
        let body =
            fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
        let endpoint = format!("{}/upload/storage/v1/b/{}/o", self.api_url, self.bucket);
        tracing::debug!(endpoint = %endpoint, key, bytes = body.len(), "uploading chat log");

        let response = match self
            .agent
            .post(&endpoint)
            .query("uploadType", "media")
            .query("name", key)
            .query("predefinedAcl", "publicRead")
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Content-Type", "text/csv")
            .send_bytes(&body)
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                bail!("Upload failed: {} - {}", status, body);
            }
            Err(err) => return Err(err).context("Failed to upload chat log"),
        };

        let uploaded: UploadResponse = response
            .into_json()
            .context("Failed to parse upload response")?;
        Ok(self.object_url(&uploaded.name))
    }
}

/// Directory-backed store for running without cloud credentials
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }
}

impl ObjectStore for LocalStore {
    fn publish(&self, path: &Path, key: &str) -> Result<String> {
        let target = self.root.join(key);
        if let Some(dir) = target.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
        }
        fs::copy(path, &target)
            .with_context(|| format!("failed to copy to {}", target.display()))?;
        let absolute = fs::canonicalize(&target).unwrap_or(target);
        Ok(format!("file://{}", absolute.display()))
    }
}
