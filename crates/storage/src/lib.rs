//! Storage layer for cellsnap
//!
//! This crate holds the collaborators the checkpoint layer depends on:
//! - CellStore: record-at-a-time access to the in-memory cell store
//! - MemoryCellStore: ordered RwLock-protected implementation
//! - PartitionMap: record id → owning partition
//! - ModuloPartitioner / StaticPartitionMap: ownership implementations
//! - records_owned_by: per-partition enumeration

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod partition;
pub mod store;

pub use memory::MemoryCellStore;
pub use partition::{records_owned_by, ModuloPartitioner, PartitionMap, StaticPartitionMap};
pub use store::{CellStore, StoreError, StoreResult};
