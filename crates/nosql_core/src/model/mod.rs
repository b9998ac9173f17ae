//! Record model stored in partitioned containers.
//!
//! # Responsibility
//! - Define the `Document` contract every stored record satisfies.
//! - Define the family/parent/child/pet sample model.
//!
//! # Invariants
//! - Every record is identified by `(id, partition_key)`.
//! - Records are written as whole documents; there is no field-level patch.

pub mod document;
pub mod family;
