//! Sled 本地快照存储

pub mod snapshot_store;

pub use snapshot_store::{SledSnapshotConfig, SledSnapshotStore};
