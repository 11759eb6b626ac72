//! Transcript handling: turns, annotation, and civil time.

mod annotate;
mod clock;
mod types;

pub use annotate::{annotate, parse_timestamp, recompute_response_times, word_count};
pub use clock::{Clock, SystemClock, Zone};
pub use types::{ChatMessage, Role, TIMESTAMP_FORMAT, Transcript, TranscriptError, Turn};
