//! Small shared types and id/timestamp helpers

use chrono::{DateTime, Utc};

/// Generate a short, prefixed record id (e.g. `dream-9f3a2c1b`)
pub fn short_id(prefix: &str) -> String {
    let raw = uuid::Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, &raw[..8])
}

/// Current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an RFC3339 timestamp, falling back to "now" on malformed input
pub fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_id_prefix_and_length() {
        let id = short_id("dream");
        assert!(id.starts_with("dream-"));
        assert_eq!(id.len(), "dream-".len() + 8);
    }

    #[test]
    fn test_parse_timestamp_roundtrip() {
        let ts = now();
        let parsed = parse_timestamp(&ts.to_rfc3339());
        assert_eq!(parsed.timestamp_millis(), ts.timestamp_millis());
    }

    #[test]
    fn test_parse_timestamp_malformed_falls_back() {
        let parsed = parse_timestamp("not-a-date");
        assert!(parsed <= Utc::now());
    }
}
