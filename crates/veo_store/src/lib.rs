//! # veo_store
//!
//! Item library for the migration engine.
//!
//! The library holds original items, their aliases and draft copies, the
//! trash, usage contexts and migration records. It implements
//! [`veo_core::ItemProvider`] and can be kept in memory or persisted to a
//! directory.

pub mod error;
pub mod library;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use library::Library;
pub use store::{LibraryStore, StoreOp};
