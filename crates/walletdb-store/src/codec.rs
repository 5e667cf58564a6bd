//! Record encoding
//!
//! Two formats live side by side in every store:
//!
//! - **Versioned**: a JSON object `{"value": "...", "timestamp": "<secs>"}`.
//!   This is the only format ever written.
//! - **Legacy**: the raw payload bytes, written by releases that predate the
//!   versioned record. Read-only.
//!
//! The first byte decides: `{` means versioned, anything else is legacy.
//! A value that opens with `{` but does not parse is corrupt; it is never
//! reinterpreted as legacy.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use walletdb_common::{Error, Result};

/// First byte of every versioned record
pub const VERSIONED_MARKER: u8 = b'{';

/// On-disk format of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// Raw payload, no timestamp
    Legacy,
    /// Payload wrapped with its creation timestamp
    Versioned,
}

/// A decoded record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub payload: Vec<u8>,
    /// Seconds since the epoch; only versioned records carry one
    pub created_at: Option<u64>,
}

impl Record {
    pub fn format(&self) -> RecordFormat {
        if self.created_at.is_some() {
            RecordFormat::Versioned
        } else {
            RecordFormat::Legacy
        }
    }

    /// Payload as text. Versioned payloads are always UTF-8; a legacy payload
    /// that is not is reported as corrupt.
    pub fn payload_str(&self, key: &str) -> Result<&str> {
        std::str::from_utf8(&self.payload)
            .map_err(|e| Error::corrupt(key, format!("payload is not UTF-8: {e}")))
    }

    pub fn into_payload_string(self, key: &str) -> Result<String> {
        String::from_utf8(self.payload)
            .map_err(|e| Error::corrupt(key, format!("payload is not UTF-8: {e}")))
    }
}

#[derive(Serialize, Deserialize)]
struct VersionedRecord {
    value: String,
    timestamp: String,
}

/// Encode a payload in the versioned format.
pub fn encode(payload: &str, created_at: u64) -> Vec<u8> {
    let record = VersionedRecord {
        value: payload.to_string(),
        timestamp: created_at.to_string(),
    };
    // Serializing two string fields cannot fail.
    serde_json::to_vec(&record).unwrap_or_default()
}

/// Decode stored bytes. `key` is only used for error context.
pub fn decode(key: &str, bytes: &[u8]) -> Result<Record> {
    if bytes.first() != Some(&VERSIONED_MARKER) {
        return Ok(Record {
            payload: bytes.to_vec(),
            created_at: None,
        });
    }

    let record: VersionedRecord = serde_json::from_slice(bytes)
        .map_err(|e| Error::corrupt(key, format!("malformed versioned record: {e}")))?;
    let created_at = record
        .timestamp
        .trim()
        .parse::<u64>()
        .map_err(|e| Error::corrupt(key, format!("bad timestamp '{}': {e}", record.timestamp)))?;

    Ok(Record {
        payload: record.value.into_bytes(),
        created_at: Some(created_at),
    })
}

/// Render a timestamp the way `date(1)` prints it, e.g.
/// `Mon Oct 19 12:00:00 UTC 2026`.
pub fn render_timestamp(secs: u64) -> String {
    match i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
    {
        Some(dt) => dt.format("%a %b %e %H:%M:%S UTC %Y").to_string(),
        None => format!("@{secs}"),
    }
}

/// Current time in whole seconds since the epoch
pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip() {
        for payload in ["", "secret", "{looks like json}", "ключ", "a\"b\\c\n"] {
            let bytes = encode(payload, 1_571_000_000);
            let record = decode("k", &bytes).unwrap();
            assert_eq!(record.payload, payload.as_bytes());
            assert_eq!(record.created_at, Some(1_571_000_000));
            assert_eq!(record.format(), RecordFormat::Versioned);
        }
    }

    #[test]
    fn test_wire_format() {
        let bytes = encode("abc", 42);
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["value"], "abc");
        assert_eq!(json["timestamp"], "42");
        assert_eq!(json.as_object().unwrap().len(), 2);
        assert_eq!(bytes[0], VERSIONED_MARKER);
    }

    #[test]
    fn test_legacy_passthrough() {
        let raw: &[u8] = &[0xde, 0xad, 0xbe, 0xef, b'{'];
        let record = decode("k", raw).unwrap();
        assert_eq!(record.payload, raw);
        assert_eq!(record.format(), RecordFormat::Legacy);
        assert!(record.payload_str("k").is_err());

        let record = decode("k", b"0x1234abcd").unwrap();
        assert_eq!(record.payload_str("k").unwrap(), "0x1234abcd");
        assert_eq!(record.created_at, None);
    }

    #[test]
    fn test_empty_value_is_legacy() {
        let record = decode("k", b"").unwrap();
        assert!(record.payload.is_empty());
        assert_eq!(record.format(), RecordFormat::Legacy);
    }

    #[test]
    fn test_reads_values_written_by_older_json_writer() {
        // Older writers emitted a trailing newline and field order varied.
        let bytes = b"{\"timestamp\":\"1600000000\",\"value\":\"share\"}\n";
        let record = decode("k", bytes).unwrap();
        assert_eq!(record.payload, b"share");
        assert_eq!(record.created_at, Some(1_600_000_000));
    }

    #[test]
    fn test_corrupt_versioned() {
        for bytes in [
            &b"{not json"[..],
            &b"{\"value\":\"x\"}"[..],
            &b"{\"value\":\"x\",\"timestamp\":\"soon\"}"[..],
            &b"{\"value\":1,\"timestamp\":\"1\"}"[..],
        ] {
            let err = decode("bad", bytes).unwrap_err();
            assert!(matches!(err, Error::CorruptRecord { ref key, .. } if key == "bad"));
        }
    }

    #[test]
    fn test_render_timestamp() {
        assert_eq!(render_timestamp(0), "Thu Jan  1 00:00:00 UTC 1970");
        assert_eq!(render_timestamp(1_571_000_000), "Sun Oct 13 20:53:20 UTC 2019");
        assert_eq!(render_timestamp(u64::MAX), format!("@{}", u64::MAX));
    }
}
