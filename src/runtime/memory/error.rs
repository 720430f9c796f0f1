//! Recoverable errors for object lookups and configuration
//!
//! Collector contract violations (double root release, dangling edges,
//! counter overflow) are not represented here; they panic.

use thiserror::Error;

use crate::runtime::memory::handle::{ObjectId, ObjectKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeapError {
    #[error("object {id} has been reclaimed")]
    StaleHandle { id: ObjectId },
    #[error("object {id} is a {found}, expected a {expected}")]
    KindMismatch {
        id: ObjectId,
        expected: ObjectKind,
        found: ObjectKind,
    },
    #[error("table {id} has {len} elements, index {index} is out of bounds")]
    ElementOutOfBounds { id: ObjectId, index: usize, len: usize },
    #[error("table {id} cannot grow to {requested} elements, maximum is {max}")]
    TableGrowthExceeded {
        id: ObjectId,
        requested: usize,
        max: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid boolean `{value}` for {key}")]
    InvalidBool { key: &'static str, value: String },
    #[error("invalid count `{value}` for {key}")]
    InvalidCount { key: &'static str, value: String },
}
