//! Root table and RAII root handles
//!
//! Every registered object carries a root counter. An object whose counter is
//! positive when a collection starts is a root. Counters live in the registry
//! slots, so they share the registry's lock.

use std::fmt;

use crate::runtime::memory::gc::ObjectHeap;
use crate::runtime::memory::handle::ObjectId;
use crate::runtime::memory::registry::Registry;

impl Registry {
    /// Increment the root counter of `id`, returning the new count
    pub(crate) fn add_root(&mut self, id: ObjectId) -> u32 {
        let slot = self
            .slot_mut(id)
            .unwrap_or_else(|| panic!("adding a root to object {id} which has been reclaimed"));
        slot.root_count = slot
            .root_count
            .checked_add(1)
            .unwrap_or_else(|| panic!("too many roots for object {id}"));
        slot.root_count
    }

    /// Decrement the root counter of `id`, returning the new count.
    ///
    /// Releasing a root that was never added is a double release and aborts
    /// instead of clamping the counter.
    pub(crate) fn remove_root(&mut self, id: ObjectId) -> u32 {
        let slot = self
            .slot_mut(id)
            .unwrap_or_else(|| panic!("removing a root from object {id} which has been reclaimed"));
        slot.root_count = slot
            .root_count
            .checked_sub(1)
            .unwrap_or_else(|| panic!("root of object {id} released more times than it was added"));
        slot.root_count
    }

    pub(crate) fn root_count(&self, id: ObjectId) -> Option<u32> {
        self.slot(id).map(|slot| slot.root_count)
    }

    /// Live objects whose root counter is positive
    pub(crate) fn roots(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.live_ids()
            .filter(|&id| self.root_count(id).is_some_and(|count| count > 0))
    }
}

/// External owner of an object.
///
/// Holding a `GcRoot` keeps its object alive across collections. Cloning adds
/// another root; dropping removes one.
pub struct GcRoot<'h> {
    heap: &'h ObjectHeap,
    id: ObjectId,
}

impl<'h> GcRoot<'h> {
    pub(crate) fn new(heap: &'h ObjectHeap, id: ObjectId) -> Self {
        heap.add_root(id);
        Self { heap, id }
    }

    /// Wrap a root that has already been added
    pub(crate) const fn adopt(heap: &'h ObjectHeap, id: ObjectId) -> Self {
        Self { heap, id }
    }

    pub const fn id(&self) -> ObjectId {
        self.id
    }

    pub const fn heap(&self) -> &'h ObjectHeap {
        self.heap
    }

    /// Give up the handle without removing its root.
    ///
    /// The caller becomes responsible for a matching
    /// [`ObjectHeap::remove_root`].
    pub fn into_raw(self) -> ObjectId {
        let id = self.id;
        std::mem::forget(self);
        id
    }
}

impl Clone for GcRoot<'_> {
    fn clone(&self) -> Self {
        Self::new(self.heap, self.id)
    }
}

impl Drop for GcRoot<'_> {
    fn drop(&mut self) {
        self.heap.remove_root(self.id);
    }
}

impl fmt::Debug for GcRoot<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GcRoot").field(&self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::memory::object::Compartment;

    #[test]
    fn counters_start_at_zero_and_pair_up() {
        let mut registry = Registry::default();
        let id = registry.register(Compartment::new().into(), None);

        assert_eq!(registry.root_count(id), Some(0));
        assert_eq!(registry.add_root(id), 1);
        assert_eq!(registry.add_root(id), 2);
        assert_eq!(registry.roots().collect::<Vec<_>>(), vec![id]);
        assert_eq!(registry.remove_root(id), 1);
        assert_eq!(registry.remove_root(id), 0);
        assert_eq!(registry.roots().count(), 0);
    }

    #[test]
    #[should_panic(expected = "released more times than it was added")]
    fn double_release_is_fatal() {
        let mut registry = Registry::default();
        let id = registry.register(Compartment::new().into(), None);
        registry.add_root(id);
        registry.remove_root(id);
        registry.remove_root(id);
    }

    #[test]
    #[should_panic(expected = "too many roots")]
    fn counter_overflow_is_fatal() {
        let mut registry = Registry::default();
        let id = registry.register(Compartment::new().into(), None);
        registry.slots[id.slot()].root_count = u32::MAX;
        registry.add_root(id);
    }

    #[test]
    #[should_panic(expected = "has been reclaimed")]
    fn rooting_a_reclaimed_object_is_fatal() {
        let mut registry = Registry::default();
        let id = registry.register(Compartment::new().into(), None);
        registry.unregister(id);
        registry.add_root(id);
    }
}
