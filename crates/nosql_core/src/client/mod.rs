//! Document service boundary.
//!
//! # Responsibility
//! - Define the request/response contract of the partitioned document
//!   service (`DocumentClient`).
//! - Define the service error taxonomy with HTTP-like status codes.
//! - Provide the SQLite-backed local service implementation.
//!
//! # Invariants
//! - Every operation is a single blocking request/response exchange.
//! - "Not found" is reported as `ClientError::NotFound`, never as an empty
//!   success.
//! - Implementations are safe to share across threads.

use crate::db::DbError;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod query;
pub mod sqlite;

pub use query::{FeedOptions, FeedPage, QuerySpec};
pub use sqlite::SqliteDocumentClient;

pub type ClientResult<T> = Result<T, ClientError>;

/// Resource addressed by a failed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Database,
    Container,
    Item,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Database => "database",
            Self::Container => "container",
            Self::Item => "item",
        };
        f.write_str(name)
    }
}

/// Service-reported failure.
#[derive(Debug)]
pub enum ClientError {
    NotFound { resource: ResourceKind, id: String },
    Conflict { resource: ResourceKind, id: String },
    Unauthorized,
    BadRequest(String),
    Unavailable(String),
    Db(DbError),
    InvalidData(String),
}

impl ClientError {
    /// HTTP-like status code of this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::Conflict { .. } => 409,
            Self::Unauthorized => 401,
            Self::BadRequest(_) => 400,
            Self::Unavailable(_) => 503,
            Self::Db(_) | Self::InvalidData(_) => 500,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Display for ClientError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { resource, id } => write!(f, "{resource} not found: {id}"),
            Self::Conflict { resource, id } => write!(f, "{resource} already exists: {id}"),
            Self::Unauthorized => write!(f, "access key rejected by document service"),
            Self::BadRequest(message) => write!(f, "bad request: {message}"),
            Self::Unavailable(message) => write!(f, "document service unavailable: {message}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData(message) => write!(f, "invalid stored document: {message}"),
        }
    }
}

impl Error for ClientError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for ClientError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for ClientError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Outcome of a create-if-absent request for a database or container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceStatus {
    Created,
    AlreadyExists,
}

/// Address of one container.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ContainerRef {
    pub database_id: String,
    pub container_id: String,
}

impl ContainerRef {
    pub fn new(database_id: impl Into<String>, container_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            container_id: container_id.into(),
        }
    }
}

impl Display for ContainerRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.database_id, self.container_id)
    }
}

/// Request/response contract of the partitioned document service.
///
/// Documents cross the boundary as JSON values; typing is the caller's job.
pub trait DocumentClient: Send + Sync {
    fn create_database_if_not_exists(&self, database_id: &str) -> ClientResult<ResourceStatus>;

    /// Re-declaring an existing container with another path is a
    /// `BadRequest`.
    fn create_container_if_not_exists(
        &self,
        container: &ContainerRef,
        partition_key_path: &str,
    ) -> ClientResult<ResourceStatus>;

    fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> ClientResult<Value>;

    /// Fails with `Conflict` when `(id, partition_key)` already exists.
    fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        document: &Value,
    ) -> ClientResult<Value>;

    fn upsert_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        document: &Value,
    ) -> ClientResult<Value>;

    /// Returns one page; pass the previous page's continuation to resume.
    fn query_items(
        &self,
        container: &ContainerRef,
        query: &QuerySpec,
        options: &FeedOptions,
        continuation: Option<&str>,
    ) -> ClientResult<FeedPage>;

    fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> ClientResult<()>;

    /// Deletes the database with all of its containers and items.
    fn delete_database(&self, database_id: &str) -> ClientResult<()>;
}
