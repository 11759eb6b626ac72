//! Errors that stop a login or a chat turn.

use crate::transcript::TranscriptError;

/// Where a session step failed. The transcript is never rolled back, so
/// callers only need this to decide what to tell the user.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    #[error("login failed: {0}")]
    Login(String),
    #[error("completion failed: {0}")]
    Completion(String),
    #[error("export failed: {0}")]
    Export(String),
    #[error(transparent)]
    Transcript(#[from] TranscriptError),
}

impl ChatError {
    pub(crate) fn login(err: anyhow::Error) -> Self {
        ChatError::Login(format!("{err:#}"))
    }

    pub(crate) fn completion(err: anyhow::Error) -> Self {
        ChatError::Completion(format!("{err:#}"))
    }

    pub(crate) fn export(err: anyhow::Error) -> Self {
        ChatError::Export(format!("{err:#}"))
    }
}
