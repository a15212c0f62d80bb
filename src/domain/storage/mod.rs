//! Storage domain - Generic relational storage abstraction
//!
//! Models the managed backend as a document table supporting `insert` and a
//! filtered, ordered, limited `select`.

mod entity;
mod query;
mod repository;

pub use entity::{StorageEntity, StorageKey};
pub use query::{
    FilterCondition, FilterOperator, FilterValue, OrderBy, SortDirection, SortKind, StorageQuery,
};
pub use repository::Storage;

#[cfg(test)]
pub use repository::mock;
