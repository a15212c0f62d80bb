//! Exchange infrastructure

mod storage_repository;

pub use storage_repository::{StorageExchangeRepository, EXCHANGES_TABLE};
