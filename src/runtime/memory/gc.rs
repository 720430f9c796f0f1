//! Mark-and-sweep garbage collector
//!
//! [`ObjectHeap`] bundles the object registry, the root table and the
//! collector behind one lock. Registration, root mutation, object access and
//! collection all take that lock, so a collection never overlaps any of them.
//!
//! Finalizers ([`NativeResource::release`] and the per-kind teardown) run
//! while the lock is held and must not call back into the heap. Reclaimed
//! objects are dropped only after the lock is released, so a resource that
//! owns a [`GcRoot`] may let it go from its `Drop`.

use std::fmt;
use std::time::Instant;

use once_cell::sync::Lazy;
use parking_lot::Mutex;
use tracing::{debug, info, trace};

use crate::runtime::memory::config::GcConfig;
use crate::runtime::memory::error::HeapError;
use crate::runtime::memory::handle::{ObjectId, ObjectKind};
use crate::runtime::memory::object::{HeapObject, NativeResource, RuntimeObject, TableInstance};
use crate::runtime::memory::registry::{Entry, Registry};
use crate::runtime::memory::roots::GcRoot;
use crate::runtime::memory::stats::{GcStats, HeapMetrics, HeapMetricsSnapshot};
use crate::runtime::memory::trace::{References, Trace};

/// Heap owning every runtime object, with a stop-the-world collector
pub struct ObjectHeap {
    registry: Mutex<Registry>,
    config: GcConfig,
    metrics: HeapMetrics,
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self::with_config(GcConfig::default())
    }

    pub fn with_config(config: GcConfig) -> Self {
        Self {
            registry: Mutex::new(Registry::with_capacity(config.initial_capacity)),
            config,
            metrics: HeapMetrics::new(),
        }
    }

    pub const fn config(&self) -> &GcConfig {
        &self.config
    }

    /// Register a newly constructed object.
    ///
    /// The returned identifier is unrooted: unless it is rooted or stored in a
    /// reachable object before the next collection, the object is reclaimed.
    pub fn register(&self, object: impl Into<RuntimeObject>) -> ObjectId {
        self.insert(object.into(), None, false)
    }

    /// Register an object that owns a resource outside the object graph.
    ///
    /// The resource is released when the object is reclaimed.
    pub fn register_with_resource<R>(&self, object: impl Into<RuntimeObject>, native: R) -> ObjectId
    where
        R: NativeResource + 'static,
    {
        self.insert(object.into(), Some(Box::new(native)), false)
    }

    /// Register an object and root it in one step, so no collection can
    /// run in between.
    pub fn register_rooted(&self, object: impl Into<RuntimeObject>) -> GcRoot<'_> {
        let id = self.insert(object.into(), None, true);
        GcRoot::adopt(self, id)
    }

    fn insert(
        &self,
        object: RuntimeObject,
        native: Option<Box<dyn NativeResource>>,
        rooted: bool,
    ) -> ObjectId {
        let kind = object.kind();
        let mut registry = self.registry.lock();
        let id = registry.register(object, native);
        if rooted {
            registry.add_root(id);
            self.metrics.record_root_added();
        }
        drop(registry);

        self.metrics.record_registration();
        trace!(object = %id, %kind, "registered");
        id
    }

    /// Increment the root counter of a live object
    pub fn add_root(&self, id: ObjectId) {
        self.registry.lock().add_root(id);
        self.metrics.record_root_added();
    }

    /// Decrement the root counter of a live object.
    ///
    /// # Panics
    ///
    /// Panics if the counter is already zero (a double release) or the
    /// object has been reclaimed.
    pub fn remove_root(&self, id: ObjectId) {
        self.registry.lock().remove_root(id);
        self.metrics.record_root_removed();
    }

    /// Root an object for as long as the returned handle lives
    pub fn root(&self, id: ObjectId) -> GcRoot<'_> {
        GcRoot::new(self, id)
    }

    /// Run a full stop-the-world collection
    pub fn collect(&self) -> GcStats {
        let mut registry = self.registry.lock();
        let timer = Instant::now();

        let objects = registry.snapshot();

        // Seed the reached set with every rooted object.
        let mut reached = vec![false; registry.slot_count()];
        let mut pending: Vec<ObjectId> = registry.roots().collect();
        for id in &pending {
            reached[id.slot()] = true;
        }
        let roots = pending.len();

        // Scan reached objects until no new children turn up.
        let mut refs = References::new();
        while let Some(id) = pending.pop() {
            let Some(entry) = registry.get(id) else {
                unreachable!("reached object {id} is not registered")
            };
            refs.clear();
            entry.object.declare_references(&mut refs);

            for child in refs.drain(..).flatten() {
                assert!(
                    registry.contains(child),
                    "object {id} references {child} which has been reclaimed"
                );
                let mark = &mut reached[child.slot()];
                if !*mark {
                    *mark = true;
                    pending.push(child);
                }
            }
        }

        // Unregister and finalize everything that was not reached.
        let mut finalized: Vec<Entry> = Vec::new();
        let mut bytes_freed = 0;
        for &id in objects.iter().filter(|id| !reached[id.slot()]) {
            let mut entry = registry.unregister(id);
            bytes_freed += entry.finalize();
            trace!(object = %id, kind = %entry.object.kind(), "finalized");
            finalized.push(entry);
        }

        let garbage = finalized.len();

        if self.config.verify_heap {
            verify_heap(&registry);
        }

        let stats = GcStats {
            sequence: self.metrics.next_sequence(),
            duration_ms: timer.elapsed().as_secs_f64() * 1000.0,
            roots,
            objects: objects.len(),
            garbage,
            survivors: registry.len(),
            bytes_freed,
        };
        self.metrics
            .record_collection(&stats, self.config.stats_history);
        drop(registry);

        // Destroy outside the lock: dropping a resource may release roots.
        drop(finalized);

        self.log_collection(&stats);
        stats
    }

    fn log_collection(&self, stats: &GcStats) {
        if self.config.log_collections {
            info!(
                target: "metrics",
                sequence = stats.sequence,
                roots = stats.roots,
                objects = stats.objects,
                garbage = stats.garbage,
                bytes_freed = stats.bytes_freed,
                "Collected garbage in {:.2}ms: {} roots, {} objects, {} garbage",
                stats.duration_ms,
                stats.roots,
                stats.objects,
                stats.garbage
            );
        } else {
            debug!(
                target: "metrics",
                sequence = stats.sequence,
                roots = stats.roots,
                objects = stats.objects,
                garbage = stats.garbage,
                bytes_freed = stats.bytes_freed,
                "Collected garbage in {:.2}ms: {} roots, {} objects, {} garbage",
                stats.duration_ms,
                stats.roots,
                stats.objects,
                stats.garbage
            );
        }
    }

    pub fn with_object<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&RuntimeObject) -> R,
    ) -> Result<R, HeapError> {
        let registry = self.registry.lock();
        let entry = registry.get(id).ok_or(HeapError::StaleHandle { id })?;
        Ok(f(&entry.object))
    }

    /// Mutate an object under the heap lock.
    ///
    /// Any identifier written into the object must be live, or the next
    /// collection aborts on the dangling edge.
    pub fn with_object_mut<R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&mut RuntimeObject) -> R,
    ) -> Result<R, HeapError> {
        let mut registry = self.registry.lock();
        let entry = registry.get_mut(id).ok_or(HeapError::StaleHandle { id })?;
        Ok(f(&mut entry.object))
    }

    pub fn with_kind<T: HeapObject, R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&T) -> R,
    ) -> Result<R, HeapError> {
        self.with_object(id, |object| {
            T::downcast(object)
                .map(f)
                .ok_or_else(|| kind_mismatch::<T>(id, object))
        })?
    }

    pub fn with_kind_mut<T: HeapObject, R>(
        &self,
        id: ObjectId,
        f: impl FnOnce(&mut T) -> R,
    ) -> Result<R, HeapError> {
        self.with_object_mut(id, |object| {
            let found = object.kind();
            T::downcast_mut(object).map(f).ok_or(HeapError::KindMismatch {
                id,
                expected: T::KIND,
                found,
            })
        })?
    }

    /// Store `value` in a table slot, returning the previous element
    pub fn set_table_element(
        &self,
        table: ObjectId,
        index: usize,
        value: Option<ObjectId>,
    ) -> Result<Option<ObjectId>, HeapError> {
        let mut registry = self.registry.lock();
        if let Some(element) = value
            && !registry.contains(element)
        {
            return Err(HeapError::StaleHandle { id: element });
        }
        let table_instance = table_mut(&mut registry, table)?;
        let len = table_instance.elements.len();
        let slot = table_instance
            .elements
            .get_mut(index)
            .ok_or(HeapError::ElementOutOfBounds {
                id: table,
                index,
                len,
            })?;
        Ok(std::mem::replace(slot, value))
    }

    /// Grow a table by `delta` elements set to `init`, returning the previous length
    pub fn grow_table(
        &self,
        table: ObjectId,
        delta: usize,
        init: Option<ObjectId>,
    ) -> Result<usize, HeapError> {
        let mut registry = self.registry.lock();
        if let Some(element) = init
            && !registry.contains(element)
        {
            return Err(HeapError::StaleHandle { id: element });
        }
        let table_instance = table_mut(&mut registry, table)?;
        let len = table_instance.elements.len();
        let requested = len.saturating_add(delta);
        if let Some(max) = table_instance.max_len
            && requested > max
        {
            return Err(HeapError::TableGrowthExceeded {
                id: table,
                requested,
                max,
            });
        }
        table_instance.elements.resize(requested, init);
        Ok(len)
    }

    pub fn kind_of(&self, id: ObjectId) -> Result<ObjectKind, HeapError> {
        self.with_object(id, RuntimeObject::kind)
    }

    pub fn contains(&self, id: ObjectId) -> bool {
        self.registry.lock().contains(id)
    }

    pub fn len(&self) -> usize {
        self.registry.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn root_count(&self, id: ObjectId) -> Result<u32, HeapError> {
        self.registry
            .lock()
            .root_count(id)
            .ok_or(HeapError::StaleHandle { id })
    }

    /// Identifiers of every live object
    pub fn snapshot(&self) -> Vec<ObjectId> {
        self.registry.lock().snapshot()
    }

    pub fn metrics(&self) -> HeapMetricsSnapshot {
        let live = self.len();
        self.metrics.snapshot(live)
    }

    /// Stats of the most recent collections, oldest first
    pub fn recent_stats(&self) -> Vec<GcStats> {
        self.metrics.history()
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("live_objects", &self.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn kind_mismatch<T: HeapObject>(id: ObjectId, object: &RuntimeObject) -> HeapError {
    HeapError::KindMismatch {
        id,
        expected: T::KIND,
        found: object.kind(),
    }
}

fn table_mut(registry: &mut Registry, id: ObjectId) -> Result<&mut TableInstance, HeapError> {
    let entry = registry.get_mut(id).ok_or(HeapError::StaleHandle { id })?;
    let found = entry.object.kind();
    TableInstance::downcast_mut(&mut entry.object).ok_or(HeapError::KindMismatch {
        id,
        expected: ObjectKind::Table,
        found,
    })
}

/// Abort if the registry's bookkeeping disagrees with its slots
fn verify_heap(registry: &Registry) {
    if let Err(problem) = registry.check_consistency() {
        panic!("heap verification failed: {problem}");
    }
}

/// Global heap
static GLOBAL_HEAP: Lazy<ObjectHeap> = Lazy::new(|| ObjectHeap::with_config(GcConfig::from_env()));

/// Get the global heap
pub fn get_heap() -> &'static ObjectHeap {
    &GLOBAL_HEAP
}
