//! Memory management for runtime objects
//!
//! Provides the object registry, root counting, and a stop-the-world
//! mark-and-sweep collector

pub mod config;
pub mod error;
pub mod gc;
pub mod handle;
pub mod object;
mod registry;
pub mod roots;
pub mod stats;
pub mod trace;

pub use config::GcConfig;
pub use error::{ConfigError, HeapError};
pub use gc::{ObjectHeap, get_heap};
pub use handle::{ObjectId, ObjectKind};
pub use object::{
    Compartment, ContextInstance, ExceptionType, FunctionInstance, GlobalInstance, HeapObject,
    MemoryInstance, ModuleInstance, NativeResource, PAGE_SIZE, RuntimeObject, TableInstance,
    ValueType,
};
pub use roots::GcRoot;
pub use stats::{GcStats, HeapMetrics, HeapMetricsSnapshot};
pub use trace::{References, Trace};
