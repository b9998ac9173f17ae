//! Partitioned document store for family records.
//!
//! `RecordStore` drives a `DocumentClient`; `SqliteDocumentClient` is the
//! local service implementation.

pub mod client;
pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod store;

pub use client::{
    ClientError, ClientResult, ContainerRef, DocumentClient, FeedOptions, FeedPage, QuerySpec,
    ResourceKind, ResourceStatus, SqliteDocumentClient,
};
pub use config::{ClientConfig, ConfigError, Endpoint, StoreConfig};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::document::{check_partition_key_path, Document, RecordValidationError};
pub use model::family::{
    Address, Child, Family, Parent, Pet, FAMILY_PARTITION_FIELD, FAMILY_PARTITION_KEY_PATH,
};
pub use store::record_store::{
    CreateOutcome, Lookup, QueryIter, RecordStore, StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
