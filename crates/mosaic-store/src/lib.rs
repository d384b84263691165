//! SQLite persistence for pages and module instances.
//!
//! Instance rows carry their full configuration as an opaque JSON document;
//! nested children live inside that document, never as rows of their own.
//! The one operation with an explicit transactional boundary is sibling
//! reorder, which is all-or-nothing.

pub mod database;
pub mod error;
pub mod instances;
pub mod pages;
pub mod row;
pub mod schema;

pub use database::Database;
pub use error::StoreError;
pub use instances::InstanceRepo;
pub use pages::PageRepo;
