//! Account lookup by email.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// A logged-in account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub uid: String,
    pub email: String,
}

/// Resolves an email to an existing account. No password check.
pub trait IdentityProvider: Send + Sync {
    fn lookup(&self, email: &str) -> Result<User>;
}

#[derive(Deserialize)]
struct LookupResponse {
    #[serde(default)]
    users: Vec<AccountInfo>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
}

fn user_from_lookup(response: LookupResponse, email: &str) -> Result<User> {
    let Some(account) = response.users.into_iter().next() else {
        bail!("no user record found for email {email}");
    };
    Ok(User {
        uid: account.local_id,
        email: account.email.unwrap_or_else(|| email.to_string()),
    })
}

/// Firebase Auth accounts via the Identity Toolkit admin API
pub struct IdentityToolkit {
    agent: ureq::Agent,
    base_url: String,
    project_id: String,
    token: String,
}

impl IdentityToolkit {
    pub fn new(base_url: &str, project_id: &str, token: String, timeout: Option<Duration>) -> Self {
        let mut builder = ureq::AgentBuilder::new();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            base_url: base_url.trim_end_matches('/').to_string(),
            project_id: project_id.to_string(),
            token,
        }
    }
}

impl IdentityProvider for IdentityToolkit {
    fn lookup(&self, email: &str) -> Result<User> {
        let endpoint = format!(
            "{}/v1/projects/{}/accounts:lookup",
            self.base_url, self.project_id
        );
        tracing::debug!(endpoint = %endpoint, "looking up account");

        let response = match self
            .agent
            .post(&endpoint)
            .set("Authorization", &format!("Bearer {}", self.token))
            .send_json(serde_json::json!({ "email": [email] }))
        {
            Ok(response) => response,
            Err(ureq::Error::Status(status, response)) => {
                let body = response.into_string().unwrap_or_default();
                bail!("Account lookup failed: {} - {}", status, body);
            }
            Err(err) => return Err(err).context("Failed to reach identity service"),
        };

        let parsed: LookupResponse = response
            .into_json()
            .context("Failed to parse account lookup response")?;
        user_from_lookup(parsed, email)
    }
}

/// Offline accounts: every email maps to a stable uid derived from its hash
pub struct LocalDirectory;

pub fn local_uid(email: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(email.trim().to_lowercase().as_bytes());
    let mut uid = hex::encode(hasher.finalize());
    uid.truncate(28);
    uid
}

impl IdentityProvider for LocalDirectory {
    fn lookup(&self, email: &str) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || !email.contains('@') {
            bail!("no user record found for email {email:?}");
        }
        Ok(User {
            uid: local_uid(email),
            email: email.to_string(),
        })
    }
}
