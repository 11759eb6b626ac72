//! Shared test utilities.
//!
//! All tests that manipulate environment variables must use the shared
//! `env_lock()` to prevent race conditions.

use anyhow::{Result, anyhow};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use time::OffsetDateTime;

use crate::completion::CompletionClient;
use crate::terminal::{Surface, format_turn};
use crate::transcript::{ChatMessage, Clock, Turn};
use crate::upload::ObjectStore;

/// Global lock for tests that modify environment variables.
/// All such tests MUST hold this lock to prevent race conditions.
pub fn env_lock() -> std::sync::MutexGuard<'static, ()> {
    static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    LOCK.get_or_init(|| Mutex::new(()))
        .lock()
        .unwrap_or_else(|e| e.into_inner())
}

/// RAII guard for temporarily setting an environment variable.
pub struct EnvGuard {
    key: String,
    old: Option<String>,
}

impl EnvGuard {
    pub fn set(key: &str, value: &str) -> Self {
        let old = std::env::var(key).ok();
        unsafe {
            std::env::set_var(key, value);
        }
        Self {
            key: key.to_string(),
            old,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        if let Some(val) = &self.old {
            unsafe {
                std::env::set_var(&self.key, val);
            }
        } else {
            unsafe {
                std::env::remove_var(&self.key);
            }
        }
    }
}

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<OffsetDateTime>,
}

impl ManualClock {
    pub fn new(start: OffsetDateTime) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    pub fn advance(&self, seconds: i64) {
        let mut now = self.now.lock().unwrap();
        *now += time::Duration::seconds(seconds);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.lock().unwrap()
    }
}

/// Replays canned replies, advancing a clock to simulate model latency
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<Result<String>>>,
    clock: Arc<ManualClock>,
    delay: i64,
    seen: Arc<Mutex<Vec<Vec<ChatMessage>>>>,
}

impl ScriptedCompletion {
    pub fn new(replies: Vec<Result<String>>, clock: Arc<ManualClock>, delay: i64) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            clock,
            delay,
            seen: Arc::default(),
        }
    }

    /// Message histories received, one entry per call
    pub fn seen(&self) -> Arc<Mutex<Vec<Vec<ChatMessage>>>> {
        self.seen.clone()
    }
}

impl CompletionClient for ScriptedCompletion {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.seen.lock().unwrap().push(messages.to_vec());
        self.clock.advance(self.delay);
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(anyhow!("no scripted reply left")))
    }
}

/// Accepts every upload and remembers the keys
#[derive(Clone, Default)]
pub struct RecordingStore {
    keys: Arc<Mutex<Vec<String>>>,
}

impl RecordingStore {
    pub fn published(&self) -> Vec<String> {
        self.keys.lock().unwrap().clone()
    }
}

impl ObjectStore for RecordingStore {
    fn publish(&self, path: &Path, key: &str) -> Result<String> {
        assert!(path.exists(), "published file must exist");
        self.keys.lock().unwrap().push(key.to_string());
        Ok(format!("https://storage.test/bucket/{key}"))
    }
}

pub struct FailingStore;

impl ObjectStore for FailingStore {
    fn publish(&self, _path: &Path, _key: &str) -> Result<String> {
        Err(anyhow!("Upload failed: 403 - permission denied"))
    }
}

/// Captures everything shown and feeds queued input lines
#[derive(Default)]
pub struct RecordingSurface {
    pub turns: Vec<String>,
    pub notices: Vec<String>,
    pub errors: Vec<String>,
    inputs: VecDeque<String>,
}

impl RecordingSurface {
    pub fn with_inputs<const N: usize>(inputs: [&str; N]) -> Self {
        Self {
            inputs: inputs.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }
}

impl Surface for RecordingSurface {
    fn show_turn(&mut self, turn: &Turn) {
        self.turns.push(format!("{} {}", turn.role, format_turn(turn)));
    }

    fn show_notice(&mut self, message: &str) {
        self.notices.push(message.to_string());
    }

    fn show_error(&mut self, message: &str) {
        self.errors.push(message.to_string());
    }

    fn read_input(&mut self) -> Result<Option<String>> {
        Ok(self.inputs.pop_front())
    }
}
