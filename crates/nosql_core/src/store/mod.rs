//! Record store facade.
//!
//! # Responsibility
//! - Offer typed create-if-absent/upsert/query/delete over one container.
//! - Translate item-level "not found" into explicit results.
//!
//! # See also
//! - `crate::client` for the service boundary this facade drives.

pub mod record_store;
