//! Sample script over the family record store.
//!
//! # Responsibility
//! - Load configuration, connect the document client and run the family
//!   walkthrough: provision, create-if-absent, upsert, query, delete,
//!   teardown.
//! - Print one human-readable status line per step.
//!
//! Usage: `nosql_cli [settings.json]`. The endpoint and access key come from
//! `CosmosEndpoint` and `CosmosMasterKey`.

use log::error;
use nosql_core::config::DEFAULT_SETTINGS_FILE;
use nosql_core::{
    default_log_level, init_logging, Address, Child, ContainerRef, CreateOutcome, DocumentClient,
    Family, Parent, Pet, RecordStore, ResourceStatus, SqliteDocumentClient, StoreConfig,
    FAMILY_PARTITION_FIELD, FAMILY_PARTITION_KEY_PATH,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

const LOG_DIR_ENV: &str = "NOSQL_LOG_DIR";

fn main() -> ExitCode {
    if let Err(err) = init_logging(default_log_level(), log_dir()) {
        eprintln!("warning: file logging disabled: {err}");
    }

    let settings_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SETTINGS_FILE.to_string());
    match run(&settings_path) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("event=cli_run module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(settings_path: &str) -> Result<(), Box<dyn Error>> {
    let config = StoreConfig::load(settings_path)?;
    println!(
        "nosql_cli version={} endpoint={}\n",
        nosql_core::core_version(),
        config.client.endpoint
    );

    let client = SqliteDocumentClient::connect(&config.client)?;
    let store: RecordStore<'_, _, Family> = RecordStore::new(
        &client,
        ContainerRef::new(&config.database_id, &config.container_id),
    );

    create_database(&store)?;
    create_container(&store)?;
    add_families(&store)?;
    query_families(&store, "Andersen")?;
    delete_family(&store, "Wakefield.7", "Wakefield")?;
    delete_database(&store)?;
    Ok(())
}

fn create_database<C: DocumentClient>(
    store: &RecordStore<'_, C, Family>,
) -> Result<(), Box<dyn Error>> {
    let status = store.ensure_database_exists()?;
    let verb = match status {
        ResourceStatus::Created => "Created",
        ResourceStatus::AlreadyExists => "Found existing",
    };
    println!("{verb} Database: {}\n", store.container().database_id);
    Ok(())
}

fn create_container<C: DocumentClient>(
    store: &RecordStore<'_, C, Family>,
) -> Result<(), Box<dyn Error>> {
    let status = store.ensure_container_exists(FAMILY_PARTITION_KEY_PATH)?;
    let verb = match status {
        ResourceStatus::Created => "Created",
        ResourceStatus::AlreadyExists => "Found existing",
    };
    println!("{verb} Container: {}\n", store.container().container_id);
    Ok(())
}

fn add_families<C: DocumentClient>(
    store: &RecordStore<'_, C, Family>,
) -> Result<(), Box<dyn Error>> {
    match store.create_if_absent(&andersen_family())? {
        CreateOutcome::Existing(existing) => {
            println!("Item in database with id: {} already exists\n", existing.id)
        }
        CreateOutcome::Created(created) => {
            println!("Created item in database with id: {}\n", created.id)
        }
    }

    let wakefield = store.upsert(&wakefield_family())?;
    println!("Upserted item in database with id: {}\n", wakefield.id);
    Ok(())
}

fn query_families<C: DocumentClient>(
    store: &RecordStore<'_, C, Family>,
    last_name: &str,
) -> Result<(), Box<dyn Error>> {
    let families = store.query_by_partition_field(FAMILY_PARTITION_FIELD, last_name)?;
    println!("Running query: {}\n", families.query().query_text());

    for family in families {
        let family = family?;
        println!("\tRead {}\n", to_json_line(&family)?);
    }
    Ok(())
}

fn delete_family<C: DocumentClient>(
    store: &RecordStore<'_, C, Family>,
    id: &str,
    partition_key: &str,
) -> Result<(), Box<dyn Error>> {
    store.delete_by_key(id, partition_key)?;
    println!("Deleted Family [{partition_key},{id}]\n");
    Ok(())
}

fn delete_database<C: DocumentClient>(
    store: &RecordStore<'_, C, Family>,
) -> Result<(), Box<dyn Error>> {
    store.teardown()?;
    println!("Deleted Database: {}\n", store.container().database_id);
    Ok(())
}

fn to_json_line(family: &Family) -> Result<String, Box<dyn Error>> {
    Ok(serde_json::to_string(family)?)
}

fn log_dir() -> PathBuf {
    match std::env::var_os(LOG_DIR_ENV) {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => std::env::temp_dir().join("nosql_cli").join("logs"),
    }
}

fn andersen_family() -> Family {
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
        is_registered: false,
        ..Family::new("Andersen.1", "Andersen")
    }
}

fn wakefield_family() -> Family {
    Family {
        parents: vec![
            Parent::with_family_name("Wakefield", "Robin"),
            Parent::with_family_name("Miller", "Ben"),
        ],
        children: vec![
            Child {
                family_name: Some("Merriam".to_string()),
                first_name: "Jesse".to_string(),
                gender: "female".to_string(),
                grade: 8,
                pets: vec![Pet::new("Goofy"), Pet::new("Shadow")],
            },
            Child {
                family_name: Some("Miller".to_string()),
                first_name: "Lisa".to_string(),
                gender: "female".to_string(),
                grade: 1,
                pets: Vec::new(),
            },
        ],
        address: Address {
            state: "NY".to_string(),
            county: "Manhattan".to_string(),
            city: "NY".to_string(),
        },
        is_registered: true,
        ..Family::new("Wakefield.7", "Wakefield")
    }
}
