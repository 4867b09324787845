//! Test assertions for records, error logs and events.

use crate::core::{ContentItem, ContentState, ErrorLogEntry, Platform, Severity};
use crate::events::CollectingEventSink;

/// Asserts that the record is in the expected state.
pub fn assert_state(item: &ContentItem, expected: ContentState) {
    assert_eq!(
        item.state, expected,
        "Expected record {} in state {}, got {}",
        item.id, expected, item.state
    );
}

/// Asserts the posted flag for one platform.
pub fn assert_posted(item: &ContentItem, platform: Platform, expected: bool) {
    assert_eq!(
        item.posted.get(platform),
        expected,
        "Expected posted {platform} = {expected} on record {}, flags: {:?}",
        item.id,
        item.posted
    );
}

/// Asserts that a log entry is the unclassified fallback: high severity, no cause, no recommendation.
pub fn assert_fallback_log(entry: &ErrorLogEntry) {
    assert_eq!(entry.severity, Severity::High, "Expected high severity: {entry:?}");
    assert!(entry.cause.is_none(), "Expected no cause: {entry:?}");
    assert!(
        entry.recommendation.is_none(),
        "Expected no recommendation: {entry:?}"
    );
}

/// Asserts that the named events appear in this relative order.
///
/// Other events may be interleaved.
pub fn assert_events_in_order(sink: &CollectingEventSink, expected: &[&str]) {
    let names = sink.names();
    let mut position = 0;
    for wanted in expected {
        match names[position..].iter().position(|n| n.as_str() == *wanted) {
            Some(offset) => position += offset + 1,
            None => panic!("Event '{wanted}' missing or out of order in {names:?}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::NewErrorLog;
    use crate::events::EventSink;
    use crate::testing::draft_item;
    use chrono::Utc;

    #[test]
    fn test_assert_state_and_posted() {
        let item = draft_item(1, "T");
        assert_state(&item, ContentState::Draft);
        assert_posted(&item, Platform::Vk, false);
    }

    #[test]
    #[should_panic(expected = "Expected record 1 in state published")]
    fn test_assert_state_failure_message() {
        assert_state(&draft_item(1, "T"), ContentState::Published);
    }

    #[test]
    fn test_assert_fallback_log() {
        let entry = NewErrorLog::new("generate_article", "boom").into_entry(1, Utc::now());
        assert_fallback_log(&entry);
    }

    #[test]
    fn test_events_in_order_allows_gaps() {
        let sink = CollectingEventSink::new();
        for name in ["stage.started", "stage.completed", "stage.started", "stage.failed"] {
            sink.try_emit(name, None);
        }
        assert_events_in_order(&sink, &["stage.started", "stage.failed"]);
    }

    #[test]
    #[should_panic(expected = "missing or out of order")]
    fn test_events_out_of_order_panics() {
        let sink = CollectingEventSink::new();
        sink.try_emit("b", None);
        sink.try_emit("a", None);
        assert_events_in_order(&sink, &["a", "b"]);
    }
}
