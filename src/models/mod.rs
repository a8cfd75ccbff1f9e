//! Data models for giftbox.
//!
//! Domain enums and the response shapes shared by the API and the
//! unlock flow. Database rows live next to their queries in `db`.

mod gift;
mod note;

pub use gift::*;
pub use note::*;

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Lowercase alphanumeric alphabet for short random identifiers.
pub const SHORT_ID_ALPHABET: [char; 36] = [
    'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r',
    's', 't', 'u', 'v', 'w', 'x', 'y', 'z', '0', '1', '2', '3', '4', '5', '6', '7', '8', '9',
];

/// Generate a new UUID
pub fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Decode a JSON string array column, tolerating legacy or empty values.
pub fn decode_string_list(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

/// Encode a string list for a JSON array column.
pub fn encode_string_list(values: &[String]) -> String {
    serde_json::to_string(values).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_list_round_trip_and_garbage() {
        let tags = vec!["family".to_string(), "birthday".to_string()];
        assert_eq!(decode_string_list(&encode_string_list(&tags)), tags);
        assert!(decode_string_list("not json").is_empty());
        assert!(decode_string_list("").is_empty());
    }
}
