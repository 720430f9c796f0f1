//! Object identifiers and kind tags

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, generation-checked identifier of a heap object.
///
/// `index` selects a registry slot and `generation` is bumped every time that
/// slot is reclaimed, so an identifier held past its object's collection never
/// aliases the object that later reuses the slot.
///
/// Identifiers carry no heap identity. An id is only meaningful to the
/// [`ObjectHeap`](crate::ObjectHeap) that issued it; storing it in an object
/// on another heap creates an edge to whatever occupies that slot there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId {
    index: u32,
    generation: u32,
}

impl ObjectId {
    pub(crate) const fn from_parts(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub const fn index(self) -> u32 {
        self.index
    }

    pub const fn generation(self) -> u32 {
        self.generation
    }

    pub(crate) const fn slot(self) -> usize {
        self.index as usize
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}v{}", self.index, self.generation)
    }
}

/// The closed set of object kinds owned by the heap
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Function,
    Table,
    Memory,
    Global,
    Module,
    Context,
    Compartment,
    ExceptionType,
}

impl ObjectKind {
    pub const ALL: [Self; 8] = [
        Self::Function,
        Self::Table,
        Self::Memory,
        Self::Global,
        Self::Module,
        Self::Context,
        Self::Compartment,
        Self::ExceptionType,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Table => "table",
            Self::Memory => "memory",
            Self::Global => "global",
            Self::Module => "module",
            Self::Context => "context",
            Self::Compartment => "compartment",
            Self::ExceptionType => "exception type",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_generation() {
        let id = ObjectId::from_parts(7, 3);
        assert_eq!(id.to_string(), "#7v3");
        assert_eq!(id.slot(), 7);
    }

    #[test]
    fn kind_names_are_distinct() {
        let mut names: Vec<_> = ObjectKind::ALL.iter().map(|kind| kind.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), ObjectKind::ALL.len());
    }
}
