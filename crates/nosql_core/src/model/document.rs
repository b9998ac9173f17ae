//! Document contract for records stored through `RecordStore`.
//!
//! # Responsibility
//! - Expose the identity pair `(id, partition_key)` of a record.
//! - Validate identity before any write reaches the service.
//!
//! # Invariants
//! - `id` and partition key are non-empty.
//! - `id` never contains characters the document service reserves for
//!   resource paths.
//! - A record type is stored only in containers partitioned by its own
//!   `partition_key_path()`.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Characters rejected inside a document `id`.
pub const RESERVED_ID_CHARS: [char; 4] = ['/', '\\', '?', '#'];

/// Identity validation error for records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    EmptyId,
    EmptyPartitionKey,
    ReservedIdChar { id: String, ch: char },
    PartitionKeyPathMismatch {
        expected: &'static str,
        actual: String,
    },
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "record id cannot be empty"),
            Self::EmptyPartitionKey => write!(f, "record partition key cannot be empty"),
            Self::ReservedIdChar { id, ch } => {
                write!(f, "record id `{id}` contains reserved character `{ch}`")
            }
            Self::PartitionKeyPathMismatch { expected, actual } => write!(
                f,
                "records are partitioned by `{expected}`; container path `{actual}` cannot hold them"
            ),
        }
    }
}

impl Error for RecordValidationError {}

/// A JSON document addressable by id and partition key.
///
/// Implementors serialize to the exact document shape stored in the
/// container; the partition key value must also be present in that shape at
/// the container's partition key path.
pub trait Document: Serialize + DeserializeOwned {
    /// Unique id within the partition.
    fn id(&self) -> &str;

    /// Partition key value used to route the record.
    fn partition_key(&self) -> &str;

    /// Container partition key path that yields `partition_key()` when
    /// applied to the serialized document.
    fn partition_key_path() -> &'static str;

    /// Checks identity fields before persistence.
    fn validate(&self) -> Result<(), RecordValidationError> {
        validate_identity(self.id(), self.partition_key())
    }
}

/// Validates an `(id, partition_key)` pair.
///
/// Used by write paths and by key-only operations such as delete.
pub fn validate_identity(id: &str, partition_key: &str) -> Result<(), RecordValidationError> {
    if id.trim().is_empty() {
        return Err(RecordValidationError::EmptyId);
    }
    if let Some(ch) = id.chars().find(|ch| RESERVED_ID_CHARS.contains(ch)) {
        return Err(RecordValidationError::ReservedIdChar {
            id: id.to_string(),
            ch,
        });
    }
    if partition_key.trim().is_empty() {
        return Err(RecordValidationError::EmptyPartitionKey);
    }
    Ok(())
}

/// Checks that a container path matches the record type's partition key path.
pub fn check_partition_key_path<R: Document>(path: &str) -> Result<(), RecordValidationError> {
    let expected = R::partition_key_path();
    if path.trim() != expected {
        return Err(RecordValidationError::PartitionKeyPathMismatch {
            expected,
            actual: path.to_string(),
        });
    }
    Ok(())
}
