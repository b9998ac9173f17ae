//! Typed facade over one partitioned container.
//!
//! # Responsibility
//! - Provision the database and container the records live in.
//! - Provide idempotent create-if-absent and upsert for `Document` records.
//! - Stream equality-query results lazily, one service page at a time.
//!
//! # Invariants
//! - Every write validates record identity before reaching the service.
//! - Containers are only provisioned with the record type's partition key
//!   path.
//! - `create_if_absent` issues at most one write.
//! - Only item-level not-found is interpreted; every other service error is
//!   returned unchanged inside `StoreError::Service`.
//! - No retries.

use crate::client::{
    ClientError, ContainerRef, DocumentClient, FeedOptions, QuerySpec, ResourceKind,
    ResourceStatus,
};
use crate::model::document::{
    check_partition_key_path, validate_identity, Document, RecordValidationError,
};
use log::info;
use serde_json::Value;
use std::collections::VecDeque;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::marker::PhantomData;

pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by `RecordStore` operations.
#[derive(Debug)]
pub enum StoreError {
    /// Delete target is absent.
    NotFound { id: String, partition_key: String },
    Validation(RecordValidationError),
    /// Any service failure, passed through unmodified.
    Service(ClientError),
    /// Record could not be converted to or from its JSON document.
    Serialization(serde_json::Error),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound { id, partition_key } => {
                write!(f, "record not found: [{partition_key},{id}]")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Service(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "record serialization failed: {err}"),
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotFound { .. } => None,
            Self::Validation(err) => Some(err),
            Self::Service(err) => Some(err),
            Self::Serialization(err) => Some(err),
        }
    }
}

impl From<ClientError> for StoreError {
    fn from(value: ClientError) -> Self {
        Self::Service(value)
    }
}

impl From<RecordValidationError> for StoreError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Result of a point lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<R> {
    Found(R),
    Absent,
}

impl<R> Lookup<R> {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    pub fn into_option(self) -> Option<R> {
        match self {
            Self::Found(record) => Some(record),
            Self::Absent => None,
        }
    }
}

/// Result of `create_if_absent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CreateOutcome<R> {
    /// The record was inserted; holds the stored document.
    Created(R),
    /// A record with the same key was already stored; nothing was written.
    Existing(R),
}

impl<R> CreateOutcome<R> {
    pub fn was_created(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    pub fn record(&self) -> &R {
        match self {
            Self::Created(record) | Self::Existing(record) => record,
        }
    }

    pub fn into_record(self) -> R {
        match self {
            Self::Created(record) | Self::Existing(record) => record,
        }
    }
}

/// Facade over one container holding records of type `R`.
///
/// Borrows an explicitly constructed client; the client's lifetime is owned
/// by the caller.
pub struct RecordStore<'client, C: DocumentClient, R: Document> {
    client: &'client C,
    container: ContainerRef,
    feed_options: FeedOptions,
    _record: PhantomData<fn() -> R>,
}

impl<'client, C: DocumentClient, R: Document> RecordStore<'client, C, R> {
    pub fn new(client: &'client C, container: ContainerRef) -> Self {
        Self {
            client,
            container,
            feed_options: FeedOptions::default(),
            _record: PhantomData,
        }
    }

    /// Overrides the page size used by query iterators.
    pub fn with_feed_options(mut self, feed_options: FeedOptions) -> Self {
        self.feed_options = feed_options;
        self
    }

    pub fn container(&self) -> &ContainerRef {
        &self.container
    }

    /// Creates the database if it does not exist.
    pub fn ensure_database_exists(&self) -> StoreResult<ResourceStatus> {
        let status = self
            .client
            .create_database_if_not_exists(&self.container.database_id)?;
        info!(
            "event=database_ensure module=store status=ok database={} outcome={:?}",
            self.container.database_id, status
        );
        Ok(status)
    }

    /// Creates the container if it does not exist, partitioned by
    /// `partition_key_path` (for example `/LastName`).
    ///
    /// # Errors
    /// - `Validation(PartitionKeyPathMismatch)` when `partition_key_path` is
    ///   not `R::partition_key_path()`; nothing is sent to the service.
    /// - `Service(BadRequest)` when the container already exists with a
    ///   different partition key path.
    /// - `Service(NotFound)` when the database does not exist.
    pub fn ensure_container_exists(&self, partition_key_path: &str) -> StoreResult<ResourceStatus> {
        check_partition_key_path::<R>(partition_key_path)?;
        let status = self
            .client
            .create_container_if_not_exists(&self.container, partition_key_path)?;
        info!(
            "event=container_ensure module=store status=ok container={} partition_key_path={} outcome={:?}",
            self.container, partition_key_path, status
        );
        Ok(status)
    }

    /// Point lookup by `(id, partition_key)`.
    ///
    /// A missing item yields `Lookup::Absent`; a missing database or
    /// container is still an error.
    pub fn read(&self, id: &str, partition_key: &str) -> StoreResult<Lookup<R>> {
        match self.client.read_item(&self.container, id, partition_key) {
            Ok(document) => Ok(Lookup::Found(decode(document)?)),
            Err(ClientError::NotFound {
                resource: ResourceKind::Item,
                ..
            }) => Ok(Lookup::Absent),
            Err(err) => Err(err.into()),
        }
    }

    /// Inserts `record` unless a record with the same key is already stored.
    ///
    /// The lookup and the insert are separate requests. A concurrent writer
    /// inserting the same key in between surfaces as `Service(Conflict)`.
    pub fn create_if_absent(&self, record: &R) -> StoreResult<CreateOutcome<R>> {
        record.validate()?;

        if let Lookup::Found(existing) = self.read(record.id(), record.partition_key())? {
            info!(
                "event=record_create module=store status=ok outcome=existing id={} partition_key={}",
                record.id(),
                record.partition_key()
            );
            return Ok(CreateOutcome::Existing(existing));
        }

        let document = serde_json::to_value(record)?;
        let stored = self
            .client
            .create_item(&self.container, record.partition_key(), &document)?;
        info!(
            "event=record_create module=store status=ok outcome=created id={} partition_key={}",
            record.id(),
            record.partition_key()
        );
        Ok(CreateOutcome::Created(decode(stored)?))
    }

    /// Replaces the whole record at its key, inserting it when absent.
    pub fn upsert(&self, record: &R) -> StoreResult<R> {
        record.validate()?;

        let document = serde_json::to_value(record)?;
        let stored = self
            .client
            .upsert_item(&self.container, record.partition_key(), &document)?;
        info!(
            "event=record_upsert module=store status=ok id={} partition_key={}",
            record.id(),
            record.partition_key()
        );
        decode(stored)
    }

    /// Returns a lazy iterator over records whose `field` equals `value`.
    ///
    /// No request is made until the iterator is first advanced. Ordering is
    /// unspecified.
    pub fn query_by_partition_field(
        &self,
        field: &str,
        value: impl Into<Value>,
    ) -> StoreResult<QueryIter<'client, C, R>> {
        let query = QuerySpec::field_equals(field, value)?;
        Ok(QueryIter::new(
            self.client,
            self.container.clone(),
            query,
            self.feed_options,
        ))
    }

    /// Deletes the record at `(id, partition_key)`.
    ///
    /// # Errors
    /// - `NotFound` when no such record is stored; callers may treat it as
    ///   success.
    pub fn delete_by_key(&self, id: &str, partition_key: &str) -> StoreResult<()> {
        validate_identity(id, partition_key)?;

        match self.client.delete_item(&self.container, id, partition_key) {
            Ok(()) => {
                info!(
                    "event=record_delete module=store status=ok id={} partition_key={}",
                    id, partition_key
                );
                Ok(())
            }
            Err(ClientError::NotFound {
                resource: ResourceKind::Item,
                ..
            }) => Err(StoreError::NotFound {
                id: id.to_string(),
                partition_key: partition_key.to_string(),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Deletes the whole database, including every container and record.
    ///
    /// Irreversible.
    pub fn teardown(&self) -> StoreResult<()> {
        self.client.delete_database(&self.container.database_id)?;
        info!(
            "event=database_teardown module=store status=ok database={}",
            self.container.database_id
        );
        Ok(())
    }
}

/// Lazy, finite sequence of query results.
///
/// Pages are requested from the service on demand. After an error is
/// yielded the iterator is exhausted, whether the page request failed or a
/// returned document did not decode as `R`.
pub struct QueryIter<'client, C: DocumentClient, R: Document> {
    client: &'client C,
    container: ContainerRef,
    query: QuerySpec,
    options: FeedOptions,
    buffered: VecDeque<Value>,
    continuation: Option<String>,
    finished: bool,
    pages_fetched: usize,
    _record: PhantomData<fn() -> R>,
}

impl<'client, C: DocumentClient, R: Document> QueryIter<'client, C, R> {
    fn new(
        client: &'client C,
        container: ContainerRef,
        query: QuerySpec,
        options: FeedOptions,
    ) -> Self {
        Self {
            client,
            container,
            query,
            options,
            buffered: VecDeque::new(),
            continuation: None,
            finished: false,
            pages_fetched: 0,
            _record: PhantomData,
        }
    }

    pub fn query(&self) -> &QuerySpec {
        &self.query
    }

    /// Number of service pages requested so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }
}

impl<C: DocumentClient, R: Document> Iterator for QueryIter<'_, C, R> {
    type Item = StoreResult<R>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(document) = self.buffered.pop_front() {
                let record = decode(document);
                if record.is_err() {
                    self.finished = true;
                    self.buffered.clear();
                }
                return Some(record);
            }
            if self.finished {
                return None;
            }

            let page = self.client.query_items(
                &self.container,
                &self.query,
                &self.options,
                self.continuation.as_deref(),
            );
            self.pages_fetched += 1;
            match page {
                Ok(page) => {
                    self.finished = page.continuation.is_none();
                    self.continuation = page.continuation;
                    self.buffered.extend(page.items);
                }
                Err(err) => {
                    self.finished = true;
                    return Some(Err(err.into()));
                }
            }
        }
    }
}

fn decode<R: Document>(document: Value) -> StoreResult<R> {
    Ok(serde_json::from_value(document)?)
}
