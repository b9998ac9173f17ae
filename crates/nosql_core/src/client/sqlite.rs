//! SQLite-backed local document service.
//!
//! # Responsibility
//! - Implement `DocumentClient` over the `databases`/`containers`/`items`
//!   tables.
//! - Enforce the service contract: resource existence, partition key
//!   agreement, create-conflict and not-found semantics.
//! - Emit one `service_request` log event per request with an activity id.
//!
//! # Invariants
//! - A document is stored whole; upsert replaces the entire body.
//! - The partition key extracted from a document at the container path must
//!   equal the partition key sent with the request.
//! - Query pages are ordered by `(partition_key, id)` and resume strictly
//!   after the continuation position.

use crate::client::query::{
    extract_at_path, validate_partition_key_path, ContinuationToken, FeedOptions, FeedPage,
    QuerySpec,
};
use crate::client::{
    ClientError, ClientResult, ContainerRef, DocumentClient, ResourceKind, ResourceStatus,
};
use crate::config::{ClientConfig, Endpoint};
use crate::db::{open_db, open_db_in_memory};
use crate::model::document::validate_identity;
use log::{error, info};
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::fmt::Display;
use std::sync::Mutex;
use std::time::Instant;
use uuid::Uuid;

/// Document client talking to a local SQLite database.
///
/// The connection is guarded by a mutex so one client can be shared across
/// threads; requests are serialized.
pub struct SqliteDocumentClient {
    conn: Mutex<Connection>,
    endpoint: Endpoint,
}

impl SqliteDocumentClient {
    /// Opens the configured endpoint and authenticates with the access key.
    ///
    /// # Errors
    /// - `Db` when the database cannot be opened or migrated.
    /// - `Unauthorized` when the key is empty or differs from the key the
    ///   database was first opened with.
    pub fn connect(config: &ClientConfig) -> ClientResult<Self> {
        let conn = match &config.endpoint {
            Endpoint::Memory => open_db_in_memory()?,
            Endpoint::File(path) => open_db(path)?,
        };
        authorize(&conn, &config.master_key)?;
        info!(
            "event=client_connect module=client status=ok endpoint={}",
            config.endpoint
        );

        Ok(Self {
            conn: Mutex::new(conn),
            endpoint: config.endpoint.clone(),
        })
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    fn request<T>(
        &self,
        operation: &'static str,
        target: &dyn Display,
        run: impl FnOnce(&Connection) -> ClientResult<T>,
    ) -> ClientResult<T> {
        let activity_id = Uuid::new_v4();
        let started_at = Instant::now();
        let result = match self.conn.lock() {
            Ok(conn) => run(&*conn),
            Err(_) => Err(ClientError::Unavailable(
                "connection lock poisoned".to_string(),
            )),
        };

        let duration_ms = started_at.elapsed().as_millis();
        match &result {
            Ok(_) => info!(
                "event=service_request module=client status=ok op={} target={} activity_id={} duration_ms={}",
                operation, target, activity_id, duration_ms
            ),
            Err(err) if err.is_not_found() => info!(
                "event=service_request module=client status=not_found op={} target={} activity_id={} duration_ms={} status_code=404",
                operation, target, activity_id, duration_ms
            ),
            Err(err) => error!(
                "event=service_request module=client status=error op={} target={} activity_id={} duration_ms={} status_code={} error={}",
                operation,
                target,
                activity_id,
                duration_ms,
                err.status_code(),
                err
            ),
        }
        result
    }
}

impl DocumentClient for SqliteDocumentClient {
    fn create_database_if_not_exists(&self, database_id: &str) -> ClientResult<ResourceStatus> {
        self.request("create_database", &database_id, |conn| {
            validate_resource_id(database_id)?;
            let changed = conn.execute(
                "INSERT INTO databases (id) VALUES (?1) ON CONFLICT (id) DO NOTHING;",
                [database_id],
            )?;
            Ok(resource_status(changed))
        })
    }

    fn create_container_if_not_exists(
        &self,
        container: &ContainerRef,
        partition_key_path: &str,
    ) -> ClientResult<ResourceStatus> {
        self.request("create_container", container, |conn| {
            validate_resource_id(&container.container_id)?;
            validate_partition_key_path(partition_key_path)?;
            ensure_database(conn, &container.database_id)?;

            let changed = conn.execute(
                "INSERT INTO containers (database_id, id, partition_key_path)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (database_id, id) DO NOTHING;",
                params![
                    container.database_id,
                    container.container_id,
                    partition_key_path
                ],
            )?;
            if changed == 1 {
                return Ok(ResourceStatus::Created);
            }

            let existing = container_partition_key_path(conn, container)?;
            if existing != partition_key_path {
                return Err(ClientError::BadRequest(format!(
                    "container `{container}` is partitioned by `{existing}`, not `{partition_key_path}`"
                )));
            }
            Ok(ResourceStatus::AlreadyExists)
        })
    }

    fn read_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> ClientResult<Value> {
        self.request("read_item", container, |conn| {
            container_partition_key_path(conn, container)?;
            let body: Option<String> = conn
                .query_row(
                    "SELECT body
                     FROM items
                     WHERE database_id = ?1
                       AND container_id = ?2
                       AND partition_key = ?3
                       AND id = ?4;",
                    params![
                        container.database_id,
                        container.container_id,
                        partition_key,
                        id
                    ],
                    |row| row.get(0),
                )
                .optional()?;

            match body {
                Some(body) => parse_body(&body),
                None => Err(item_not_found(id)),
            }
        })
    }

    fn create_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        document: &Value,
    ) -> ClientResult<Value> {
        self.request("create_item", container, |conn| {
            let path = container_partition_key_path(conn, container)?;
            let (id, body) = prepare_document(document, &path, partition_key)?;

            let changed = conn.execute(
                "INSERT INTO items (database_id, container_id, partition_key, id, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (database_id, container_id, partition_key, id) DO NOTHING;",
                params![
                    container.database_id,
                    container.container_id,
                    partition_key,
                    id,
                    body
                ],
            )?;
            if changed == 0 {
                return Err(ClientError::Conflict {
                    resource: ResourceKind::Item,
                    id,
                });
            }
            Ok(document.clone())
        })
    }

    fn upsert_item(
        &self,
        container: &ContainerRef,
        partition_key: &str,
        document: &Value,
    ) -> ClientResult<Value> {
        self.request("upsert_item", container, |conn| {
            let path = container_partition_key_path(conn, container)?;
            let (id, body) = prepare_document(document, &path, partition_key)?;

            conn.execute(
                "INSERT INTO items (database_id, container_id, partition_key, id, body)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (database_id, container_id, partition_key, id) DO UPDATE
                 SET
                    body = excluded.body,
                    updated_at = (strftime('%s', 'now') * 1000);",
                params![
                    container.database_id,
                    container.container_id,
                    partition_key,
                    id,
                    body
                ],
            )?;
            Ok(document.clone())
        })
    }

    fn query_items(
        &self,
        container: &ContainerRef,
        query: &QuerySpec,
        options: &FeedOptions,
        continuation: Option<&str>,
    ) -> ClientResult<FeedPage> {
        self.request("query_items", container, |conn| {
            container_partition_key_path(conn, container)?;
            let after = continuation.map(ContinuationToken::decode).transpose()?;
            let page_size = options.effective_max_item_count() as usize;

            let mut stmt = conn.prepare(
                "SELECT partition_key, id, body
                 FROM items
                 WHERE database_id = ?1
                   AND container_id = ?2
                   AND json_extract(body, ?3) IS ?4
                   AND (?5 IS NULL OR (partition_key, id) > (?5, ?6))
                 ORDER BY partition_key ASC, id ASC
                 LIMIT ?7;",
            )?;
            let mut rows = stmt.query(params![
                container.database_id,
                container.container_id,
                query.json_path(),
                filter_value(query.value()),
                after.as_ref().map(|token| token.partition_key.as_str()),
                after.as_ref().map(|token| token.id.as_str()),
                (page_size + 1) as i64,
            ])?;

            let mut entries = Vec::new();
            while let Some(row) = rows.next()? {
                let partition_key: String = row.get(0)?;
                let id: String = row.get(1)?;
                let body: String = row.get(2)?;
                entries.push((partition_key, id, body));
            }

            let has_more = entries.len() > page_size;
            entries.truncate(page_size);
            let continuation = match (has_more, entries.last()) {
                (true, Some((partition_key, id, _))) => Some(
                    ContinuationToken {
                        partition_key: partition_key.clone(),
                        id: id.clone(),
                    }
                    .encode()?,
                ),
                _ => None,
            };

            let items = entries
                .iter()
                .map(|(_, _, body)| parse_body(body))
                .collect::<ClientResult<Vec<_>>>()?;
            Ok(FeedPage {
                items,
                continuation,
            })
        })
    }

    fn delete_item(
        &self,
        container: &ContainerRef,
        id: &str,
        partition_key: &str,
    ) -> ClientResult<()> {
        self.request("delete_item", container, |conn| {
            container_partition_key_path(conn, container)?;
            let changed = conn.execute(
                "DELETE FROM items
                 WHERE database_id = ?1
                   AND container_id = ?2
                   AND partition_key = ?3
                   AND id = ?4;",
                params![
                    container.database_id,
                    container.container_id,
                    partition_key,
                    id
                ],
            )?;
            if changed == 0 {
                return Err(item_not_found(id));
            }
            Ok(())
        })
    }

    fn delete_database(&self, database_id: &str) -> ClientResult<()> {
        self.request("delete_database", &database_id, |conn| {
            let changed = conn.execute("DELETE FROM databases WHERE id = ?1;", [database_id])?;
            if changed == 0 {
                return Err(ClientError::NotFound {
                    resource: ResourceKind::Database,
                    id: database_id.to_string(),
                });
            }
            Ok(())
        })
    }
}

fn authorize(conn: &Connection, master_key: &str) -> ClientResult<()> {
    if master_key.trim().is_empty() {
        return Err(ClientError::Unauthorized);
    }

    let stored: Option<String> = conn
        .query_row("SELECT master_key FROM account WHERE id = 1;", [], |row| {
            row.get(0)
        })
        .optional()?;
    match stored {
        Some(key) if key == master_key => Ok(()),
        Some(_) => Err(ClientError::Unauthorized),
        None => {
            conn.execute(
                "INSERT INTO account (id, master_key) VALUES (1, ?1);",
                [master_key],
            )?;
            Ok(())
        }
    }
}

fn ensure_database(conn: &Connection, database_id: &str) -> ClientResult<()> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM databases WHERE id = ?1);",
        [database_id],
        |row| row.get(0),
    )?;
    if exists == 1 {
        Ok(())
    } else {
        Err(ClientError::NotFound {
            resource: ResourceKind::Database,
            id: database_id.to_string(),
        })
    }
}

/// Returns the container's partition key path, checking the database and
/// container exist on the way.
fn container_partition_key_path(conn: &Connection, container: &ContainerRef) -> ClientResult<String> {
    ensure_database(conn, &container.database_id)?;
    conn.query_row(
        "SELECT partition_key_path
         FROM containers
         WHERE database_id = ?1 AND id = ?2;",
        params![container.database_id, container.container_id],
        |row| row.get(0),
    )
    .optional()?
    .ok_or_else(|| ClientError::NotFound {
        resource: ResourceKind::Container,
        id: container.container_id.clone(),
    })
}

/// Validates a document against the container and returns `(id, body)`.
fn prepare_document(
    document: &Value,
    partition_key_path: &str,
    partition_key: &str,
) -> ClientResult<(String, String)> {
    if !document.is_object() {
        return Err(ClientError::BadRequest(
            "document must be a JSON object".to_string(),
        ));
    }

    let id = document
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::BadRequest("document is missing string `id`".to_string()))?;
    validate_identity(id, partition_key)
        .map_err(|err| ClientError::BadRequest(err.to_string()))?;

    match extract_at_path(document, partition_key_path) {
        Some(Value::String(value)) if value == partition_key => {}
        _ => {
            return Err(ClientError::BadRequest(format!(
                "partition key at `{partition_key_path}` does not match request partition key `{partition_key}`"
            )));
        }
    }

    let body = serde_json::to_string(document)
        .map_err(|err| ClientError::InvalidData(format!("document encode failed: {err}")))?;
    Ok((id.to_string(), body))
}

fn parse_body(body: &str) -> ClientResult<Value> {
    serde_json::from_str(body)
        .map_err(|err| ClientError::InvalidData(format!("stored body is not JSON: {err}")))
}

/// Maps a JSON scalar onto the SQL value `json_extract` yields for it.
fn filter_value(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(flag) => SqlValue::Integer(i64::from(*flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => SqlValue::Integer(integer),
            None => SqlValue::Real(number.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(text) => SqlValue::Text(text.clone()),
        // Rejected by `QuerySpec::field_equals`.
        Value::Array(_) | Value::Object(_) => SqlValue::Text(value.to_string()),
    }
}

fn validate_resource_id(id: &str) -> ClientResult<()> {
    // Same character rules as item ids.
    validate_identity(id, "-").map_err(|err| ClientError::BadRequest(err.to_string()))
}

fn resource_status(changed: usize) -> ResourceStatus {
    if changed == 1 {
        ResourceStatus::Created
    } else {
        ResourceStatus::AlreadyExists
    }
}

fn item_not_found(id: &str) -> ClientError {
    ClientError::NotFound {
        resource: ResourceKind::Item,
        id: id.to_string(),
    }
}
