//! Essay-writing chat assistant with per-turn CSV chat log export.

pub mod completion;
pub mod config;
mod error;
pub mod export;
pub mod heartbeat;
pub mod identity;
pub mod session;
pub mod terminal;
pub mod transcript;
pub mod upload;

#[cfg(test)]
mod test_utils;

pub use config::{Backend, Config};
pub use error::ChatError;
pub use export::{ExportReceipt, ExportRow, Exporter, render_rows};
pub use identity::User;
pub use session::{GREETING, Services, SessionContext};
pub use transcript::{Role, Transcript, Turn};
