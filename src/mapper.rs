// Record -> view model mapping. Missing optional fields fall back to fixed
// defaults; mapping never fails.

use crate::backend::{fields, Record, Snapshot};
use crate::models::{Message, ANONYMOUS_NAME, PLACEHOLDER_AVATAR};

pub fn map_record(record: &Record) -> Message {
    Message {
        id: record.id.clone(),
        text: record.get_str(fields::TEXT).unwrap_or_default().to_string(),
        sender: record.get_str(fields::SENDER).unwrap_or_default().to_string(),
        display_name: non_empty(record.get_str(fields::DISPLAY_NAME))
            .unwrap_or(ANONYMOUS_NAME)
            .to_string(),
        sender_profile_img: non_empty(record.get_str(fields::SENDER_PROFILE_IMG))
            .unwrap_or(PLACEHOLDER_AVATAR)
            .to_string(),
        timestamp: record.get(fields::TIMESTAMP).and_then(|v| v.as_timestamp()),
    }
}

/// Maps every record, keeping the snapshot's order
pub fn map_snapshot(snapshot: &Snapshot) -> Vec<Message> {
    snapshot.records.iter().map(map_record).collect()
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
