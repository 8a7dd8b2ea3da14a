//! Credential records and their on-disk line encoding
//!
//! A `CredentialRecord` is identified by its ip: an ip appears in at most one
//! of the two sets at any time. `AvailableEntry` and `LeaseEntry` wrap the
//! record with the timestamps that drive FIFO ordering and lease expiry.
//!
//! Entries persist as single delimited lines (`field | field | ...`). Field
//! validation rejects the delimiter and line breaks so every stored record
//! round-trips.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use crate::error::{Error, Result};

/// Field separator in the persisted line format.
pub const LINE_DELIMITER: &str = " | ";

/// Current time as unix milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// One remote-desktop credential set. The ip is the identity key.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRecord {
    pub ip: String,
    pub username: String,
    pub password: String,
}

impl CredentialRecord {
    /// Build a record from raw caller input.
    ///
    /// Trims whitespace from every field. All three fields must be non-empty
    /// after trimming and must not contain `|` or line breaks (they could not
    /// round-trip through the line store otherwise).
    pub fn validated(ip: &str, username: &str, password: &str) -> Result<Self> {
        Ok(Self {
            ip: clean_field("ip", ip)?,
            username: clean_field("username", username)?,
            password: clean_field("password", password)?,
        })
    }
}

// Passwords must never reach logs through Debug formatting.
impl fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("ip", &self.ip)
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

fn clean_field(name: &'static str, value: &str) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::Validation(format!("missing {name}")));
    }
    if value.contains('|') || value.contains('\n') || value.contains('\r') {
        return Err(Error::Validation(format!(
            "{name} must not contain '|' or line breaks"
        )));
    }
    Ok(value.to_string())
}

/// An unclaimed record waiting in the pool.
///
/// `added_at` (unix millis) orders the available set: claims always take the
/// oldest entry first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableEntry {
    #[serde(flatten)]
    pub record: CredentialRecord,
    pub added_at: u64,
}

/// A record currently on lease.
///
/// `lease_id` is opaque and never reused; `claimed_at` (unix millis) drives
/// the expiry sweep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaseEntry {
    #[serde(flatten)]
    pub record: CredentialRecord,
    pub lease_id: String,
    pub claimed_at: u64,
}

/// Round-trip contract between an entry and one line of the persisted file.
pub trait LineRecord: Sized {
    fn to_line(&self) -> String;

    /// Parse one line. Returns `None` for malformed lines; the store skips
    /// them with a warning instead of failing the whole read.
    fn parse_line(line: &str) -> Option<Self>;
}

impl LineRecord for AvailableEntry {
    fn to_line(&self) -> String {
        [
            self.record.ip.as_str(),
            self.record.username.as_str(),
            self.record.password.as_str(),
            &self.added_at.to_string(),
        ]
        .join(LINE_DELIMITER)
    }

    fn parse_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(LINE_DELIMITER).collect();
        let [ip, username, password, added_at] = parts.as_slice() else {
            return None;
        };
        Some(Self {
            record: CredentialRecord {
                ip: ip.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            },
            added_at: added_at.parse().ok()?,
        })
    }
}

impl LineRecord for LeaseEntry {
    fn to_line(&self) -> String {
        [
            self.record.ip.as_str(),
            self.record.username.as_str(),
            self.record.password.as_str(),
            self.lease_id.as_str(),
            &self.claimed_at.to_string(),
        ]
        .join(LINE_DELIMITER)
    }

    fn parse_line(line: &str) -> Option<Self> {
        let parts: Vec<&str> = line.split(LINE_DELIMITER).collect();
        let [ip, username, password, lease_id, claimed_at] = parts.as_slice() else {
            return None;
        };
        Some(Self {
            record: CredentialRecord {
                ip: ip.to_string(),
                username: username.to_string(),
                password: password.to_string(),
            },
            lease_id: lease_id.to_string(),
            claimed_at: claimed_at.parse().ok()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_record() -> CredentialRecord {
        CredentialRecord {
            ip: "10.0.0.1".into(),
            username: "admin".into(),
            password: "hunter2".into(),
        }
    }

    #[test]
    fn validated_trims_whitespace() {
        let record = CredentialRecord::validated("  10.0.0.1 ", " admin", "hunter2\t").unwrap();
        assert_eq!(record.ip, "10.0.0.1");
        assert_eq!(record.username, "admin");
        assert_eq!(record.password, "hunter2");
    }

    #[test]
    fn validated_rejects_empty_fields() {
        assert!(matches!(
            CredentialRecord::validated("", "admin", "p"),
            Err(Error::Validation(msg)) if msg.contains("ip")
        ));
        assert!(matches!(
            CredentialRecord::validated("10.0.0.1", "   ", "p"),
            Err(Error::Validation(msg)) if msg.contains("username")
        ));
        assert!(matches!(
            CredentialRecord::validated("10.0.0.1", "admin", ""),
            Err(Error::Validation(msg)) if msg.contains("password")
        ));
    }

    #[test]
    fn validated_rejects_delimiter_and_line_breaks() {
        assert!(CredentialRecord::validated("10.0.0.1", "ad|min", "p").is_err());
        assert!(CredentialRecord::validated("10.0.0.1", "admin", "pass\nword").is_err());
        assert!(CredentialRecord::validated("10.0.0.1\r", "admin", "p").is_ok(), "trailing \\r is trimmed");
        assert!(CredentialRecord::validated("10.0.\r0.1", "admin", "p").is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let debug = format!("{:?}", test_record());
        assert!(!debug.contains("hunter2"), "got: {debug}");
        assert!(debug.contains("[REDACTED]"));
        assert!(debug.contains("10.0.0.1"));
    }

    #[test]
    fn available_entry_line_roundtrip() {
        let entry = AvailableEntry {
            record: test_record(),
            added_at: 1755950400123,
        };
        let line = entry.to_line();
        assert_eq!(line, "10.0.0.1 | admin | hunter2 | 1755950400123");
        assert_eq!(AvailableEntry::parse_line(&line).unwrap(), entry);
    }

    #[test]
    fn lease_entry_line_roundtrip() {
        let entry = LeaseEntry {
            record: test_record(),
            lease_id: "lease_abc123".into(),
            claimed_at: 1755950400123,
        };
        let line = entry.to_line();
        assert_eq!(
            line,
            "10.0.0.1 | admin | hunter2 | lease_abc123 | 1755950400123"
        );
        assert_eq!(LeaseEntry::parse_line(&line).unwrap(), entry);
    }

    #[test]
    fn parse_rejects_wrong_field_count() {
        assert!(AvailableEntry::parse_line("10.0.0.1 | admin | hunter2").is_none());
        assert!(
            AvailableEntry::parse_line("10.0.0.1 | admin | hunter2 | 123 | extra").is_none()
        );
        assert!(LeaseEntry::parse_line("10.0.0.1 | admin | hunter2 | 123").is_none());
    }

    #[test]
    fn parse_rejects_non_numeric_timestamp() {
        assert!(AvailableEntry::parse_line("10.0.0.1 | admin | hunter2 | yesterday").is_none());
    }

    #[test]
    fn serialize_flattens_record_fields() {
        let entry = AvailableEntry {
            record: test_record(),
            added_at: 42,
        };
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["ip"], "10.0.0.1");
        assert_eq!(json["username"], "admin");
        assert_eq!(json["password"], "hunter2");
        assert_eq!(json["added_at"], 42);
    }
}
