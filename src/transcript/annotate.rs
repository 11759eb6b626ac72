//! Derived fields on turns: timestamp, word count, response time.

use time::PrimitiveDateTime;

use super::clock::Clock;
use super::types::{TIMESTAMP_FORMAT, TranscriptError, Turn};

/// Number of whitespace-delimited tokens
pub fn word_count(content: &str) -> usize {
    content.split_whitespace().count()
}

/// Stamp the current time and recompute the word count.
///
/// Overwrites any existing timestamp, so callers check
/// [`Turn::is_annotated`] first.
pub fn annotate(mut turn: Turn, clock: &dyn Clock) -> Result<Turn, TranscriptError> {
    let now = clock.now();
    let stamp = PrimitiveDateTime::new(now.date(), now.time())
        .format(TIMESTAMP_FORMAT)
        .map_err(|err| TranscriptError::Format(err.to_string()))?;
    turn.timestamp = Some(stamp);
    turn.length = word_count(&turn.content);
    Ok(turn)
}

pub fn parse_timestamp(value: &str) -> Result<PrimitiveDateTime, TranscriptError> {
    PrimitiveDateTime::parse(value, TIMESTAMP_FORMAT).map_err(|_| TranscriptError::BadTimestamp {
        value: value.to_string(),
    })
}

/// Set `response_time` on every turn after the first from the gap to its
/// predecessor, in whole seconds of the formatted timestamps.
pub fn recompute_response_times(turns: &mut [Turn]) -> Result<(), TranscriptError> {
    let mut parsed = Vec::with_capacity(turns.len());
    for (index, turn) in turns.iter().enumerate() {
        let stamp = turn
            .timestamp
            .as_deref()
            .ok_or(TranscriptError::MissingTimestamp { index })?;
        parsed.push(parse_timestamp(stamp)?);
    }

    if let Some(first) = turns.first_mut() {
        first.response_time = None;
    }
    for i in 1..turns.len() {
        let gap = (parsed[i] - parsed[i - 1]).whole_seconds();
        if gap < 0 {
            tracing::warn!(
                index = i,
                previous = %parsed[i - 1],
                current = %parsed[i],
                "timestamps went backwards; clamping response time to 0"
            );
        }
        turns[i].response_time = Some(gap.max(0) as u64);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ManualClock;
    use crate::transcript::Role;
    use time::macros::datetime;

    fn stamped(role: Role, content: &str, timestamp: &str) -> Turn {
        let mut turn = Turn::new(role, content);
        turn.timestamp = Some(timestamp.to_string());
        turn
    }

    #[test]
    fn word_count_handles_edges() {
        assert_eq!(word_count(""), 0);
        assert_eq!(word_count("   \n\t "), 0);
        assert_eq!(word_count("one"), 1);
        assert_eq!(word_count("Write about climate change"), 4);
        assert_eq!(word_count("1. **Topic Selection**\n2. **Outlining**"), 5);
    }

    #[test]
    fn annotate_stamps_second_precision() {
        let clock = ManualClock::new(datetime!(2024-11-05 10:00:07.987 UTC));
        let turn = annotate(Turn::new(Role::User, "hello there"), &clock).unwrap();
        assert_eq!(turn.timestamp.as_deref(), Some("2024-11-05 10:00:07"));
        assert_eq!(turn.length, 2);
    }

    #[test]
    fn annotate_uses_clock_offset() {
        let clock = ManualClock::new(datetime!(2024-07-01 23:30:00 +01:00));
        let turn = annotate(Turn::new(Role::Assistant, ""), &clock).unwrap();
        assert_eq!(turn.timestamp.as_deref(), Some("2024-07-01 23:30:00"));
        assert_eq!(turn.length, 0);
    }

    #[test]
    fn response_times_follow_consecutive_gaps() {
        let mut turns = vec![
            stamped(Role::Assistant, "hi", "2024-11-05 10:00:00"),
            stamped(Role::User, "Write about climate change", "2024-11-05 10:00:05"),
            stamped(Role::Assistant, "Sure", "2024-11-05 10:00:40"),
        ];
        recompute_response_times(&mut turns).unwrap();
        let times: Vec<_> = turns.iter().map(|t| t.response_time).collect();
        assert_eq!(times, [None, Some(5), Some(35)]);
    }

    #[test]
    fn response_times_cross_midnight() {
        let mut turns = vec![
            stamped(Role::User, "a", "2024-12-31 23:59:50"),
            stamped(Role::Assistant, "b", "2025-01-01 00:00:20"),
        ];
        recompute_response_times(&mut turns).unwrap();
        assert_eq!(turns[1].response_time, Some(30));
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut turns = vec![
            stamped(Role::Assistant, "a", "2024-11-05 10:00:00"),
            stamped(Role::User, "b", "2024-11-05 10:01:00"),
        ];
        recompute_response_times(&mut turns).unwrap();
        let once = turns.clone();
        recompute_response_times(&mut turns).unwrap();
        assert_eq!(turns, once);
    }

    #[test]
    fn recompute_clears_stale_first_value() {
        let mut turns = vec![stamped(Role::Assistant, "a", "2024-11-05 10:00:00")];
        turns[0].response_time = Some(12);
        recompute_response_times(&mut turns).unwrap();
        assert_eq!(turns[0].response_time, None);
    }

    #[test]
    fn backwards_clock_clamps_to_zero() {
        let mut turns = vec![
            stamped(Role::User, "a", "2024-10-27 01:59:59"),
            stamped(Role::Assistant, "b", "2024-10-27 01:00:10"),
        ];
        recompute_response_times(&mut turns).unwrap();
        assert_eq!(turns[1].response_time, Some(0));
    }

    #[test]
    fn recompute_rejects_missing_or_bad_timestamps() {
        let mut turns = vec![
            stamped(Role::User, "a", "2024-11-05 10:00:00"),
            Turn::new(Role::Assistant, "b"),
        ];
        assert_eq!(
            recompute_response_times(&mut turns),
            Err(TranscriptError::MissingTimestamp { index: 1 })
        );

        let mut turns = vec![stamped(Role::User, "a", "05/11/2024 10:00")];
        assert!(matches!(
            recompute_response_times(&mut turns),
            Err(TranscriptError::BadTimestamp { .. })
        ));
    }

    #[test]
    fn empty_sequence_is_fine() {
        let mut turns: Vec<Turn> = Vec::new();
        recompute_response_times(&mut turns).unwrap();
    }
}
