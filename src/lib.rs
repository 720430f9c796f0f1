//! Memory-management core for a virtual-machine runtime.
//!
//! Every heap-allocated runtime object (functions, tables, memories, globals,
//! modules, execution contexts, compartments, exception types) is owned by an
//! [`ObjectHeap`]. Objects reference each other through generation-checked
//! [`ObjectId`]s. External owners keep objects alive with root counts, and an
//! explicit [`ObjectHeap::collect`] reclaims everything no longer reachable
//! from a root.
//!
//! ```
//! use rtgc::{Compartment, ModuleInstance, ObjectHeap};
//!
//! let heap = ObjectHeap::new();
//! let compartment = heap.register(Compartment::new());
//! let module = heap.register_rooted(ModuleInstance::new(compartment));
//! let orphan = heap.register(Compartment::new());
//!
//! let stats = heap.collect();
//! assert_eq!(stats.garbage, 1);
//! assert!(heap.contains(compartment));
//! assert!(!heap.contains(orphan));
//! drop(module);
//! ```

pub mod runtime;

pub use runtime::memory::{
    Compartment, ContextInstance, ExceptionType, FunctionInstance, GcConfig, GcRoot, GcStats,
    GlobalInstance, HeapError, HeapObject, MemoryInstance, ModuleInstance, NativeResource,
    ObjectHeap, ObjectId, ObjectKind, RuntimeObject, TableInstance, ValueType, get_heap,
};
