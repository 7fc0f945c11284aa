//! Read model for persisted match rows.

use chrono::{DateTime, NaiveDateTime, Utc};

use certwatch_types::Priority;

/// One stored row: a single `(cert_id, keyword)` observation.
///
/// A [`Match`](certwatch_types::Match) fans out to one row per matched
/// positive keyword on insert; queries group rows back by `cert_id`.
#[derive(Debug, Clone)]
pub struct MatchRow {
    pub cert_id: String,
    pub keyword: String,
    pub rule_name: String,
    pub priority: Priority,
    pub domains: Vec<String>,
    pub tbs_sha256: String,
    pub cert_sha256: String,
    pub timestamp: DateTime<Utc>,
}

/// Parse a stored timestamp, accepting the formats that have historically
/// appeared in the table: `YYYY-MM-DD HH:MM:SS`, RFC 3339, and
/// `YYYY-MM-DDTHH:MM:SSZ`. Unparseable values fall back to the current
/// time rather than discarding the row.
pub(crate) fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return dt.and_utc();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%SZ") {
        return dt.and_utc();
    }
    Utc::now()
}

/// Decode the JSON-encoded domains column; a corrupt value decodes to empty.
pub(crate) fn parse_domains(raw: &str) -> Vec<String> {
    serde_json::from_str(raw).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn accepts_all_three_formats() {
        let want = Utc.with_ymd_and_hms(2026, 8, 2, 12, 30, 0).unwrap();
        assert_eq!(parse_timestamp("2026-08-02 12:30:00"), want);
        assert_eq!(parse_timestamp("2026-08-02T12:30:00+00:00"), want);
        assert_eq!(parse_timestamp("2026-08-02T12:30:00Z"), want);
    }

    #[test]
    fn garbage_falls_back_to_now() {
        let before = Utc::now();
        let parsed = parse_timestamp("not a timestamp");
        assert!(parsed >= before);
    }

    #[test]
    fn corrupt_domains_decode_to_empty() {
        assert_eq!(parse_domains("[\"a.example\"]"), vec!["a.example"]);
        assert!(parse_domains("{broken").is_empty());
    }
}
