//! Correlation and operation identifiers.
//!
//! A [`CorrelationId`] links a change record to the documents it touched: the
//! same value is written into the store-bound update payload (`__changeId`)
//! and into the record's `id`. It uses the 12-byte object-id layout so stores
//! that sort by id also sort by creation second:
//!
//! ```text
//! | 4 bytes unix seconds (BE) | 5 bytes process-unique | 3 bytes counter (BE) |
//! ```
//!
//! An [`OperationId`] is a process-local key for the attribution side-channel.

use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;

/// Hidden field name carrying the correlation id on stored documents.
pub const CHANGE_ID_FIELD: &str = "__changeId";

/// Hidden field name carrying the actor on stored documents.
pub const ACTOR_FIELD: &str = "__actor";

static PROCESS_UNIQUE: OnceLock<[u8; 5]> = OnceLock::new();
static COUNTER: AtomicU32 = AtomicU32::new(0);
static NEXT_OPERATION: AtomicU64 = AtomicU64::new(1);

/// A 12-byte correlation id rendered as 24 lowercase hex characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CorrelationId([u8; 12]);

impl CorrelationId {
    /// Generate a fresh id from the current time.
    #[must_use]
    pub fn generate() -> Self {
        #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
        let secs = chrono::Utc::now().timestamp() as u32;
        let count = COUNTER.fetch_add(1, Ordering::Relaxed) & 0x00FF_FFFF;

        let mut bytes = [0u8; 12];
        bytes[..4].copy_from_slice(&secs.to_be_bytes());
        bytes[4..9].copy_from_slice(process_unique());
        bytes[9..].copy_from_slice(&count.to_be_bytes()[1..]);
        Self(bytes)
    }

    #[must_use]
    pub const fn from_bytes(bytes: [u8; 12]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    /// Creation second embedded in the id.
    #[must_use]
    pub const fn timestamp_secs(&self) -> u32 {
        u32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        self.to_string()
    }
}

/// Five random bytes shared by every id this process generates.
///
/// Falls back to pid and clock bits when the OS RNG is unavailable.
fn process_unique() -> &'static [u8; 5] {
    PROCESS_UNIQUE.get_or_init(|| {
        let mut bytes = [0u8; 5];
        if getrandom::fill(&mut bytes).is_err() {
            let pid = std::process::id().to_be_bytes();
            let nanos = chrono::Utc::now()
                .timestamp_subsec_nanos()
                .to_be_bytes();
            bytes = [pid[2], pid[3], nanos[1], nanos[2], nanos[3]];
        }
        bytes
    })
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl FromStr for CorrelationId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 24 || !s.is_ascii() {
            return Err(CoreError::InvalidCorrelationId(s.to_string()));
        }
        let mut bytes = [0u8; 12];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&s[i * 2..i * 2 + 2], 16)
                .map_err(|_| CoreError::InvalidCorrelationId(s.to_string()))?;
        }
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for CorrelationId {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CorrelationId> for String {
    fn from(id: CorrelationId) -> Self {
        id.to_string()
    }
}

/// Process-unique key identifying one in-flight operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(u64);

impl OperationId {
    /// Allocate the next operation id.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_OPERATION.fetch_add(1, Ordering::Relaxed))
    }

    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn generated_id_is_24_hex() {
        let id = CorrelationId::generate().to_hex();
        assert_eq!(id.len(), 24, "id should be 24 hex chars: {id}");
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(id, id.to_lowercase());
    }

    #[test]
    fn generated_ids_are_unique() {
        let mut ids = HashSet::new();
        for _ in 0..1000 {
            let id = CorrelationId::generate();
            assert!(ids.insert(id), "duplicate correlation id: {id}");
        }
    }

    #[test]
    fn embeds_creation_second() {
        let before = chrono::Utc::now().timestamp();
        let id = CorrelationId::generate();
        let after = chrono::Utc::now().timestamp();
        let secs = i64::from(id.timestamp_secs());
        assert!(secs >= before && secs <= after);
    }

    #[test]
    fn parses_own_hex() {
        let id = CorrelationId::generate();
        let parsed: CorrelationId = id.to_hex().parse().unwrap();
        assert_eq!(parsed, id);
    }

    #[test]
    fn rejects_bad_hex() {
        assert!("xyz".parse::<CorrelationId>().is_err());
        assert!("zz0000000000000000000000".parse::<CorrelationId>().is_err());
        assert!("0000000000000000000000000".parse::<CorrelationId>().is_err());
    }

    #[test]
    fn serializes_as_hex_string() {
        let id = CorrelationId::from_bytes([0xab; 12]);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"abababababababababababab\"");
    }

    #[test]
    fn operation_ids_increase() {
        let a = OperationId::next();
        let b = OperationId::next();
        assert!(b > a);
        assert_eq!(a.to_string(), format!("op-{}", a.get()));
    }
}
