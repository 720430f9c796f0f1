//! Object registry: the arena that owns every live heap object
//!
//! Slots are reused through a free list. Each reuse bumps the slot's
//! generation, which invalidates every [`ObjectId`] handed out for the
//! previous occupant. The registry itself is not synchronized; the heap
//! keeps it behind its lock.

use crate::runtime::memory::handle::ObjectId;
use crate::runtime::memory::object::{NativeResource, RuntimeObject};

/// A registered object together with its out-of-graph resource
pub(crate) struct Entry {
    pub(crate) object: RuntimeObject,
    pub(crate) native: Option<Box<dyn NativeResource>>,
}

impl Entry {
    /// Run the kind finalizer and release the native resource.
    ///
    /// Returns the number of bytes the object held.
    pub(crate) fn finalize(&mut self) -> usize {
        let mut bytes = self.object.footprint();
        self.object.finalize();
        if let Some(native) = self.native.as_mut() {
            bytes += native.size();
            native.release();
        }
        bytes
    }
}

pub(super) struct Slot {
    pub(super) generation: u32,
    pub(super) root_count: u32,
    pub(super) entry: Option<Entry>,
}

impl Slot {
    const fn vacant() -> Self {
        Self {
            generation: 0,
            root_count: 0,
            entry: None,
        }
    }
}

#[derive(Default)]
pub(crate) struct Registry {
    pub(super) slots: Vec<Slot>,
    free_list: Vec<u32>,
    live: usize,
}

impl Registry {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            free_list: Vec::new(),
            live: 0,
        }
    }

    /// Add a newly constructed object and hand out its identifier
    pub(crate) fn register(
        &mut self,
        object: RuntimeObject,
        native: Option<Box<dyn NativeResource>>,
    ) -> ObjectId {
        let index = match self.free_list.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len())
                    .unwrap_or_else(|_| panic!("object registry exhausted its index space"));
                self.slots.push(Slot::vacant());
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        assert!(
            slot.entry.is_none() && slot.root_count == 0,
            "object slot {index} registered while still occupied"
        );
        slot.entry = Some(Entry { object, native });
        self.live += 1;

        ObjectId::from_parts(index, slot.generation)
    }

    /// Remove an object from the registry. Only the sweep phase calls this.
    pub(crate) fn unregister(&mut self, id: ObjectId) -> Entry {
        let slot = self
            .slot_mut(id)
            .unwrap_or_else(|| panic!("unregistering object {id} which is not registered"));
        assert_eq!(
            slot.root_count, 0,
            "unregistering object {id} while it is still rooted"
        );
        let Some(entry) = slot.entry.take() else {
            unreachable!("live slot without an entry")
        };
        slot.generation = slot.generation.wrapping_add(1);
        self.free_list.push(id.index());
        self.live -= 1;
        entry
    }

    /// Identifiers of every live object, in slot order
    pub(crate) fn snapshot(&self) -> Vec<ObjectId> {
        self.live_ids().collect()
    }

    pub(crate) fn live_ids(&self) -> impl Iterator<Item = ObjectId> + '_ {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.entry
                .as_ref()
                .map(|_| ObjectId::from_parts(index as u32, slot.generation))
        })
    }

    pub(crate) fn get(&self, id: ObjectId) -> Option<&Entry> {
        self.slot(id).and_then(|slot| slot.entry.as_ref())
    }

    pub(crate) fn get_mut(&mut self, id: ObjectId) -> Option<&mut Entry> {
        self.slot_mut(id).and_then(|slot| slot.entry.as_mut())
    }

    pub(crate) fn contains(&self, id: ObjectId) -> bool {
        self.get(id).is_some()
    }

    pub(crate) const fn len(&self) -> usize {
        self.live
    }

    /// Number of slots ever allocated, live or free
    pub(crate) fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Cross-check the live count, the free list and the vacant slots
    pub(crate) fn check_consistency(&self) -> Result<(), String> {
        let occupied = self.slots.iter().filter(|slot| slot.entry.is_some()).count();
        if occupied != self.live {
            return Err(format!("{occupied} occupied slots but {} live objects", self.live));
        }
        if occupied + self.free_list.len() != self.slots.len() {
            return Err(format!(
                "{occupied} occupied and {} free slots do not add up to {}",
                self.free_list.len(),
                self.slots.len()
            ));
        }

        let mut listed = vec![false; self.slots.len()];
        for &index in &self.free_list {
            let Some(slot) = self.slots.get(index as usize) else {
                return Err(format!("free list names slot {index} past the end"));
            };
            if slot.entry.is_some() {
                return Err(format!("free slot {index} is occupied"));
            }
            if std::mem::replace(&mut listed[index as usize], true) {
                return Err(format!("slot {index} is on the free list twice"));
            }
        }

        for (index, slot) in self.slots.iter().enumerate() {
            if slot.entry.is_none() && slot.root_count != 0 {
                return Err(format!(
                    "vacant slot {index} still has {} roots",
                    slot.root_count
                ));
            }
        }
        Ok(())
    }

    /// The slot for `id` if it is live and of the same generation
    pub(super) fn slot(&self, id: ObjectId) -> Option<&Slot> {
        self.slots
            .get(id.slot())
            .filter(|slot| slot.generation == id.generation() && slot.entry.is_some())
    }

    pub(super) fn slot_mut(&mut self, id: ObjectId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.slot())
            .filter(|slot| slot.generation == id.generation() && slot.entry.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::memory::object::{Compartment, ExceptionType};

    fn register_compartment(registry: &mut Registry) -> ObjectId {
        registry.register(Compartment::new().into(), None)
    }

    #[test]
    fn register_assigns_distinct_ids() {
        let mut registry = Registry::default();
        let a = register_compartment(&mut registry);
        let b = register_compartment(&mut registry);

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.snapshot(), vec![a, b]);
    }

    #[test]
    fn reused_slot_invalidates_old_id() {
        let mut registry = Registry::default();
        let old = register_compartment(&mut registry);
        registry.unregister(old);

        let new = registry.register(ExceptionType::new("e", Vec::new()).into(), None);

        assert_eq!(new.index(), old.index());
        assert_ne!(new.generation(), old.generation());
        assert!(!registry.contains(old));
        assert!(registry.contains(new));
        assert_eq!(registry.slot_count(), 1);
    }

    #[test]
    fn consistency_check_catches_stray_roots_and_counts() {
        let mut registry = Registry::default();
        let kept = register_compartment(&mut registry);
        let gone = register_compartment(&mut registry);
        registry.unregister(gone);
        assert_eq!(registry.check_consistency(), Ok(()));

        registry.slots[gone.slot()].root_count = 1;
        assert_eq!(
            registry.check_consistency(),
            Err(format!("vacant slot {} still has 1 roots", gone.slot()))
        );

        registry.slots[gone.slot()].root_count = 0;
        registry.live = 2;
        assert!(registry.check_consistency().is_err());

        registry.live = 1;
        registry.free_list.push(kept.index());
        assert!(registry.check_consistency().is_err());
    }

    #[test]
    #[should_panic(expected = "not registered")]
    fn unregister_twice_is_fatal() {
        let mut registry = Registry::default();
        let id = register_compartment(&mut registry);
        registry.unregister(id);
        registry.unregister(id);
    }
}
