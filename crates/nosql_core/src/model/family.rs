//! Family sample model.
//!
//! # Responsibility
//! - Define the family document and its nested parent/child/pet/address
//!   values.
//! - Map the document onto the `/LastName` partitioning scheme.
//!
//! # Invariants
//! - `last_name` is the partition key and is serialized as `LastName`.
//! - Nested sequences keep caller order.

use crate::model::document::Document;
use serde::{Deserialize, Serialize};

/// Partition key path used by family containers.
pub const FAMILY_PARTITION_KEY_PATH: &str = "/LastName";

/// Field name holding the family partition key.
pub const FAMILY_PARTITION_FIELD: &str = "LastName";

/// One household stored as a single document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Family {
    pub id: String,
    /// Surname; doubles as the partition key.
    #[serde(rename = "LastName")]
    pub last_name: String,
    #[serde(default)]
    pub parents: Vec<Parent>,
    #[serde(default)]
    pub children: Vec<Child>,
    #[serde(default)]
    pub address: Address,
    #[serde(rename = "isRegistered", default)]
    pub is_registered: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Parent {
    /// Absent when the parent shares the household surname.
    #[serde(
        rename = "familyName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub family_name: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Child {
    #[serde(
        rename = "familyName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub family_name: Option<String>,
    #[serde(rename = "firstName")]
    pub first_name: String,
    pub gender: String,
    pub grade: u32,
    #[serde(default)]
    pub pets: Vec<Pet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pet {
    #[serde(rename = "givenName")]
    pub given_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub state: String,
    pub county: String,
    pub city: String,
}

impl Family {
    /// Creates an unregistered family with no members and an empty address.
    pub fn new(id: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            last_name: last_name.into(),
            parents: Vec::new(),
            children: Vec::new(),
            address: Address::default(),
            is_registered: false,
        }
    }

    /// Number of pets across all children.
    pub fn pet_count(&self) -> usize {
        self.children.iter().map(|child| child.pets.len()).sum()
    }
}

impl Document for Family {
    fn id(&self) -> &str {
        &self.id
    }

    fn partition_key(&self) -> &str {
        &self.last_name
    }

    fn partition_key_path() -> &'static str {
        FAMILY_PARTITION_KEY_PATH
    }
}

impl Parent {
    pub fn new(first_name: impl Into<String>) -> Self {
        Self {
            family_name: None,
            first_name: first_name.into(),
        }
    }

    pub fn with_family_name(
        family_name: impl Into<String>,
        first_name: impl Into<String>,
    ) -> Self {
        Self {
            family_name: Some(family_name.into()),
            first_name: first_name.into(),
        }
    }
}

impl Pet {
    pub fn new(given_name: impl Into<String>) -> Self {
        Self {
            given_name: given_name.into(),
        }
    }
}
