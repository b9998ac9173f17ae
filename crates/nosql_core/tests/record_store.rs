use nosql_core::client::{ClientResult, FeedPage};
use nosql_core::{
    Address, Child, ClientConfig, ClientError, ContainerRef, CreateOutcome, DocumentClient,
    Endpoint, FeedOptions, Family, Lookup, Parent, Pet, QuerySpec, RecordStore,
    RecordValidationError, ResourceKind, ResourceStatus, SqliteDocumentClient, StoreError,
    FAMILY_PARTITION_FIELD, FAMILY_PARTITION_KEY_PATH,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn provisioning_is_idempotent() {
    let client = memory_client();
    let store = family_store(&client);

    assert_eq!(store.ensure_database_exists().unwrap(), ResourceStatus::Created);
    assert_eq!(
        store.ensure_database_exists().unwrap(),
        ResourceStatus::AlreadyExists
    );
    assert_eq!(
        store
            .ensure_container_exists(FAMILY_PARTITION_KEY_PATH)
            .unwrap(),
        ResourceStatus::Created
    );
    assert_eq!(
        store
            .ensure_container_exists(FAMILY_PARTITION_KEY_PATH)
            .unwrap(),
        ResourceStatus::AlreadyExists
    );
}

#[test]
fn ensure_container_rejects_a_path_the_record_type_does_not_use() {
    let client = memory_client();
    let store = family_store(&client);
    store.ensure_database_exists().unwrap();

    let err = store.ensure_container_exists("/address/state").unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(RecordValidationError::PartitionKeyPathMismatch {
            expected: "/LastName",
            ..
        })
    ));

    // Nothing was provisioned by the rejected call.
    assert_eq!(
        store
            .ensure_container_exists(FAMILY_PARTITION_KEY_PATH)
            .unwrap(),
        ResourceStatus::Created
    );
    store.upsert(&andersen()).unwrap();
}

#[test]
fn ensure_container_rejects_existing_container_with_another_path() {
    let client = memory_client();
    let store = family_store(&client);
    store.ensure_database_exists().unwrap();
    client
        .create_container_if_not_exists(store.container(), "/id")
        .unwrap();

    let err = store
        .ensure_container_exists(FAMILY_PARTITION_KEY_PATH)
        .unwrap_err();
    assert!(matches!(err, StoreError::Service(ClientError::BadRequest(_))));
}

#[test]
fn create_if_absent_inserts_once_and_returns_original_afterwards() {
    let client = memory_client();
    let store = provisioned_store(&client);
    let original = andersen();

    let first = store.create_if_absent(&original).unwrap();
    assert!(first.was_created());
    assert_eq!(first.record(), &original);

    let mut changed = original.clone();
    changed.is_registered = true;
    changed.children.clear();
    let second = store.create_if_absent(&changed).unwrap();
    assert_eq!(second, CreateOutcome::Existing(original.clone()));

    let stored = query_all(&store, "Andersen");
    assert_eq!(stored, vec![original]);
}

#[test]
fn upsert_creates_then_replaces_whole_record() {
    let client = memory_client();
    let store = provisioned_store(&client);

    let wakefield = wakefield();
    store.upsert(&wakefield).unwrap();
    let stored = store.read("Wakefield.7", "Wakefield").unwrap();
    assert!(stored.is_found());
    assert!(stored.into_option().unwrap().is_registered);

    let mut replacement = Family::new("Wakefield.7", "Wakefield");
    replacement.is_registered = false;
    store.upsert(&replacement).unwrap();
    store.upsert(&replacement).unwrap();

    let stored = store
        .read("Wakefield.7", "Wakefield")
        .unwrap()
        .into_option()
        .unwrap();
    assert_eq!(stored, replacement);
    assert!(stored.children.is_empty());
    assert_eq!(query_all(&store, "Wakefield").len(), 1);
}

#[test]
fn query_by_partition_field_returns_only_matching_records() {
    let client = memory_client();
    let store = provisioned_store(&client);

    store.create_if_absent(&andersen()).unwrap();
    store.upsert(&wakefield()).unwrap();

    let andersens = query_all(&store, "Andersen");
    assert_eq!(andersens.len(), 1);
    assert_eq!(andersens[0].id, "Andersen.1");

    assert!(query_all(&store, "Miller").is_empty());
}

#[test]
fn query_by_nested_field_and_boolean_values() {
    let client = memory_client();
    let store = provisioned_store(&client);
    store.create_if_absent(&andersen()).unwrap();
    store.upsert(&wakefield()).unwrap();

    let in_ny = store
        .query_by_partition_field("address.state", "NY")
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(in_ny.len(), 1);
    assert_eq!(in_ny[0].id, "Wakefield.7");

    let unregistered = store
        .query_by_partition_field("isRegistered", false)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap();
    assert_eq!(unregistered.len(), 1);
    assert_eq!(unregistered[0].id, "Andersen.1");
}

#[test]
fn query_is_lazy_and_pages_through_all_matches() {
    let client = memory_client();
    let store = provisioned_store(&client).with_feed_options(FeedOptions::with_max_item_count(2));

    for index in 0..5 {
        store
            .upsert(&Family::new(format!("Andersen.{index}"), "Andersen"))
            .unwrap();
    }

    let mut families = store
        .query_by_partition_field(FAMILY_PARTITION_FIELD, "Andersen")
        .unwrap();
    assert_eq!(families.pages_fetched(), 0);

    let mut ids = Vec::new();
    for family in families.by_ref() {
        ids.push(family.unwrap().id);
    }
    ids.sort();
    assert_eq!(
        ids,
        vec![
            "Andersen.0",
            "Andersen.1",
            "Andersen.2",
            "Andersen.3",
            "Andersen.4"
        ]
    );
    assert_eq!(families.pages_fetched(), 3);
}

#[test]
fn query_rejects_invalid_field_names_before_any_request() {
    let client = memory_client();
    let store = provisioned_store(&client);

    let err = store
        .query_by_partition_field("LastName = 'x' OR 1", "Andersen")
        .err()
        .unwrap();
    assert!(matches!(err, StoreError::Service(ClientError::BadRequest(_))));
}

#[test]
fn delete_then_lookup_reports_absent() {
    let client = memory_client();
    let store = provisioned_store(&client);
    store.create_if_absent(&andersen()).unwrap();

    store.delete_by_key("Andersen.1", "Andersen").unwrap();

    assert_eq!(
        store.read("Andersen.1", "Andersen").unwrap(),
        Lookup::Absent
    );
}

#[test]
fn delete_of_absent_record_signals_not_found() {
    let client = memory_client();
    let store = provisioned_store(&client);

    let err = store.delete_by_key("Andersen.1", "Andersen").unwrap_err();
    assert!(err.is_not_found());
    assert!(matches!(
        err,
        StoreError::NotFound { ref id, ref partition_key }
            if id == "Andersen.1" && partition_key == "Andersen"
    ));
}

#[test]
fn wakefield_scenario_upsert_flip_delete_query() {
    let client = memory_client();
    let store = provisioned_store(&client);

    let mut family = wakefield();
    store.upsert(&family).unwrap();
    family.is_registered = false;
    store.upsert(&family).unwrap();
    let stored = store
        .read("Wakefield.7", "Wakefield")
        .unwrap()
        .into_option()
        .unwrap();
    assert!(!stored.is_registered);

    store.delete_by_key("Wakefield.7", "Wakefield").unwrap();
    assert!(query_all(&store, "Wakefield").is_empty());
}

#[test]
fn writes_reject_invalid_identity() {
    let client = memory_client();
    let store = provisioned_store(&client);

    let err = store.upsert(&Family::new("", "Andersen")).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(RecordValidationError::EmptyId)
    ));

    let err = store
        .create_if_absent(&Family::new("Andersen/1", "Andersen"))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(RecordValidationError::ReservedIdChar { ch: '/', .. })
    ));
}

#[test]
fn lookup_in_missing_container_is_an_error_not_absent() {
    let client = memory_client();
    let store = family_store(&client);
    store.ensure_database_exists().unwrap();

    let err = store.read("Andersen.1", "Andersen").unwrap_err();
    assert!(matches!(
        err,
        StoreError::Service(ClientError::NotFound {
            resource: ResourceKind::Container,
            ..
        })
    ));
}

#[test]
fn teardown_removes_database_with_its_records() {
    let client = memory_client();
    let store = provisioned_store(&client);
    store.create_if_absent(&andersen()).unwrap();

    store.teardown().unwrap();

    let err = store.read("Andersen.1", "Andersen").unwrap_err();
    assert!(matches!(
        err,
        StoreError::Service(ClientError::NotFound {
            resource: ResourceKind::Database,
            ..
        })
    ));
    assert!(matches!(
        store.teardown().unwrap_err(),
        StoreError::Service(ClientError::NotFound { .. })
    ));
}

#[test]
fn create_if_absent_propagates_lookup_failures_without_writing() {
    let client = FailingReadClient::default();
    let store: RecordStore<'_, _, Family> =
        RecordStore::new(&client, ContainerRef::new("FamilyDatabase", "FamilyContainer"));

    let err = store.create_if_absent(&andersen()).unwrap_err();
    assert!(matches!(err, StoreError::Service(ClientError::Unauthorized)));
    assert_eq!(client.writes.load(Ordering::SeqCst), 0);
}

#[test]
fn create_if_absent_surfaces_racing_insert_as_conflict() {
    let client = RacingInsertClient;
    let store: RecordStore<'_, _, Family> =
        RecordStore::new(&client, ContainerRef::new("FamilyDatabase", "FamilyContainer"));

    let err = store.create_if_absent(&andersen()).unwrap_err();
    assert!(matches!(
        err,
        StoreError::Service(ClientError::Conflict {
            resource: ResourceKind::Item,
            ..
        })
    ));
}

#[test]
fn query_error_is_yielded_once_then_iteration_ends() {
    let client = FailingReadClient::default();
    let store: RecordStore<'_, _, Family> =
        RecordStore::new(&client, ContainerRef::new("FamilyDatabase", "FamilyContainer"));

    let mut families = store
        .query_by_partition_field(FAMILY_PARTITION_FIELD, "Andersen")
        .unwrap();
    assert!(matches!(
        families.next(),
        Some(Err(StoreError::Service(ClientError::Unauthorized)))
    ));
    assert!(families.next().is_none());
}

#[test]
fn undecodable_document_ends_iteration() {
    let client = memory_client();
    let store = provisioned_store(&client);
    store.upsert(&andersen()).unwrap();
    client
        .upsert_item(
            store.container(),
            "Andersen",
            &json!({"id": "Andersen.0", "LastName": "Andersen", "children": "none"}),
        )
        .unwrap();

    let mut families = store
        .query_by_partition_field(FAMILY_PARTITION_FIELD, "Andersen")
        .unwrap();
    assert!(matches!(
        families.next(),
        Some(Err(StoreError::Serialization(_)))
    ));
    assert!(families.next().is_none());
}

fn memory_client() -> SqliteDocumentClient {
    SqliteDocumentClient::connect(&ClientConfig::new(Endpoint::Memory, "test-key")).unwrap()
}

fn family_store(client: &SqliteDocumentClient) -> RecordStore<'_, SqliteDocumentClient, Family> {
    RecordStore::new(client, ContainerRef::new("FamilyDatabase", "FamilyContainer"))
}

fn provisioned_store(
    client: &SqliteDocumentClient,
) -> RecordStore<'_, SqliteDocumentClient, Family> {
    let store = family_store(client);
    store.ensure_database_exists().unwrap();
    store
        .ensure_container_exists(FAMILY_PARTITION_KEY_PATH)
        .unwrap();
    store
}

fn query_all(
    store: &RecordStore<'_, SqliteDocumentClient, Family>,
    last_name: &str,
) -> Vec<Family> {
    store
        .query_by_partition_field(FAMILY_PARTITION_FIELD, last_name)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

fn andersen() -> Family {
    Family {
        parents: vec![Parent::new("Thomas"), Parent::new("Mary Kay")],
        children: vec![Child {
            family_name: None,
            first_name: "Henriette Thaulow".to_string(),
            gender: "female".to_string(),
            grade: 5,
            pets: vec![Pet::new("Fluffy")],
        }],
        address: Address {
            state: "WA".to_string(),
            county: "King".to_string(),
            city: "Seattle".to_string(),
        },
        ..Family::new("Andersen.1", "Andersen")
    }
}

fn wakefield() -> Family {
    Family {
        parents: vec![
            Parent::with_family_name("Wakefield", "Robin"),
            Parent::with_family_name("Miller", "Ben"),
        ],
        children: vec![Child {
            family_name: Some("Merriam".to_string()),
            first_name: "Jesse".to_string(),
            gender: "female".to_string(),
            grade: 8,
            pets: vec![Pet::new("Goofy"), Pet::new("Shadow")],
        }],
        address: Address {
            state: "NY".to_string(),
            county: "Manhattan".to_string(),
            city: "NY".to_string(),
        },
        is_registered: true,
        ..Family::new("Wakefield.7", "Wakefield")
    }
}

/// Rejects every read and query; counts write attempts.
#[derive(Default)]
struct FailingReadClient {
    writes: AtomicUsize,
}

impl DocumentClient for FailingReadClient {
    fn create_database_if_not_exists(&self, _: &str) -> ClientResult<ResourceStatus> {
        Ok(ResourceStatus::AlreadyExists)
    }

    fn create_container_if_not_exists(
        &self,
        _: &ContainerRef,
        _: &str,
    ) -> ClientResult<ResourceStatus> {
        Ok(ResourceStatus::AlreadyExists)
    }

    fn read_item(&self, _: &ContainerRef, _: &str, _: &str) -> ClientResult<Value> {
        Err(ClientError::Unauthorized)
    }

    fn create_item(&self, _: &ContainerRef, _: &str, document: &Value) -> ClientResult<Value> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(document.clone())
    }

    fn upsert_item(&self, _: &ContainerRef, _: &str, document: &Value) -> ClientResult<Value> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(document.clone())
    }

    fn query_items(
        &self,
        _: &ContainerRef,
        _: &QuerySpec,
        _: &FeedOptions,
        _: Option<&str>,
    ) -> ClientResult<FeedPage> {
        Err(ClientError::Unauthorized)
    }

    fn delete_item(&self, _: &ContainerRef, _: &str, _: &str) -> ClientResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete_database(&self, _: &str) -> ClientResult<()> {
        Ok(())
    }
}

/// Reports every item as absent on read, then as already created on insert.
struct RacingInsertClient;

impl DocumentClient for RacingInsertClient {
    fn create_database_if_not_exists(&self, _: &str) -> ClientResult<ResourceStatus> {
        Ok(ResourceStatus::AlreadyExists)
    }

    fn create_container_if_not_exists(
        &self,
        _: &ContainerRef,
        _: &str,
    ) -> ClientResult<ResourceStatus> {
        Ok(ResourceStatus::AlreadyExists)
    }

    fn read_item(&self, _: &ContainerRef, id: &str, _: &str) -> ClientResult<Value> {
        Err(ClientError::NotFound {
            resource: ResourceKind::Item,
            id: id.to_string(),
        })
    }

    fn create_item(&self, _: &ContainerRef, _: &str, document: &Value) -> ClientResult<Value> {
        let id = document["id"].as_str().unwrap_or_default().to_string();
        Err(ClientError::Conflict {
            resource: ResourceKind::Item,
            id,
        })
    }

    fn upsert_item(&self, _: &ContainerRef, _: &str, document: &Value) -> ClientResult<Value> {
        Ok(document.clone())
    }

    fn query_items(
        &self,
        _: &ContainerRef,
        _: &QuerySpec,
        _: &FeedOptions,
        _: Option<&str>,
    ) -> ClientResult<FeedPage> {
        Ok(FeedPage {
            items: Vec::new(),
            continuation: None,
        })
    }

    fn delete_item(&self, _: &ContainerRef, _: &str, _: &str) -> ClientResult<()> {
        Ok(())
    }

    fn delete_database(&self, _: &str) -> ClientResult<()> {
        Ok(())
    }
}
