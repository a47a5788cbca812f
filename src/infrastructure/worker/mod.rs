//! 后台 Worker

pub mod autosave_worker;

pub use autosave_worker::{AutosaveWorker, AutosaveWorkerConfig};
