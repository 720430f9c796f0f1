//! Reference enumeration
//!
//! This is the single place where the object model's topology is declared.
//! Each kind lists the objects it directly references; the collector
//! dispatches on [`RuntimeObject`] with an exhaustive match, so adding a kind
//! without declaring its edges does not compile.

use crate::runtime::memory::handle::ObjectId;
use crate::runtime::memory::object::{
    Compartment, ContextInstance, ExceptionType, FunctionInstance, GlobalInstance,
    MemoryInstance, ModuleInstance, RuntimeObject, TableInstance,
};

/// Edge list being gathered for one object. Nulls and duplicates are allowed.
pub type References = Vec<Option<ObjectId>>;

/// Declares the outgoing edges of an object
pub trait Trace {
    fn declare_references(&self, refs: &mut References);
}

impl Trace for FunctionInstance {
    fn declare_references(&self, refs: &mut References) {
        refs.push(self.module);
    }
}

impl Trace for TableInstance {
    fn declare_references(&self, refs: &mut References) {
        refs.push(Some(self.compartment));
        refs.extend_from_slice(&self.elements);
    }
}

impl Trace for MemoryInstance {
    fn declare_references(&self, refs: &mut References) {
        refs.push(Some(self.compartment));
    }
}

impl Trace for GlobalInstance {
    fn declare_references(&self, refs: &mut References) {
        refs.push(Some(self.compartment));
    }
}

impl Trace for ModuleInstance {
    fn declare_references(&self, refs: &mut References) {
        refs.push(Some(self.compartment));
        let instances = self
            .function_defs
            .iter()
            .chain(&self.functions)
            .chain(&self.tables)
            .chain(&self.memories)
            .chain(&self.globals);
        refs.extend(instances.copied().map(Some));
        refs.push(self.default_memory);
        refs.push(self.default_table);
    }
}

impl Trace for ContextInstance {
    fn declare_references(&self, refs: &mut References) {
        refs.push(Some(self.compartment));
    }
}

impl Trace for Compartment {
    fn declare_references(&self, refs: &mut References) {
        refs.push(self.intrinsics);
    }
}

impl Trace for ExceptionType {
    fn declare_references(&self, _refs: &mut References) {}
}

impl Trace for RuntimeObject {
    fn declare_references(&self, refs: &mut References) {
        match self {
            Self::Function(function) => function.declare_references(refs),
            Self::Table(table) => table.declare_references(refs),
            Self::Memory(memory) => memory.declare_references(refs),
            Self::Global(global) => global.declare_references(refs),
            Self::Module(module) => module.declare_references(refs),
            Self::Context(context) => context.declare_references(refs),
            Self::Compartment(compartment) => compartment.declare_references(refs),
            Self::ExceptionType(exception_type) => exception_type.declare_references(refs),
        }
    }
}

impl RuntimeObject {
    /// Collect the object's non-null child references
    pub fn child_references(&self) -> Vec<ObjectId> {
        let mut refs = References::new();
        self.declare_references(&mut refs);
        refs.into_iter().flatten().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::memory::object::ValueType;

    fn id(index: u32) -> ObjectId {
        ObjectId::from_parts(index, 0)
    }

    #[test]
    fn table_lists_compartment_and_non_null_elements() {
        let mut table = TableInstance::new(id(0), 3);
        table.elements[0] = Some(id(5));
        table.elements[2] = Some(id(5));

        let object = RuntimeObject::from(table);

        assert_eq!(object.child_references(), vec![id(0), id(5), id(5)]);
    }

    #[test]
    fn module_lists_every_instance_and_defaults() {
        let mut module = ModuleInstance::new(id(0));
        module.function_defs.push(id(1));
        module.functions.extend([id(9), id(1)]);
        module.tables.push(id(2));
        module.memories.push(id(3));
        module.globals.push(id(4));
        module.default_memory = Some(id(3));

        let refs = RuntimeObject::from(module).child_references();

        assert_eq!(refs.first(), Some(&id(0)));
        for expected in [1, 2, 3, 4, 9] {
            assert!(refs.contains(&id(expected)), "missing edge to {expected}");
        }
        // default_table is absent and must be skipped
        assert_eq!(refs.len(), 8);
    }

    #[test]
    fn leaves_and_optional_edges() {
        let exception = RuntimeObject::from(ExceptionType::new("trap", vec![ValueType::I32]));
        assert!(exception.child_references().is_empty());

        let host_function = RuntimeObject::from(FunctionInstance::new(None, "host"));
        assert!(host_function.child_references().is_empty());

        let compartment = RuntimeObject::from(Compartment {
            intrinsics: Some(id(7)),
        });
        assert_eq!(compartment.child_references(), vec![id(7)]);
    }

    #[test]
    fn owned_kinds_point_at_their_compartment() {
        let objects = [
            RuntimeObject::from(MemoryInstance::new(id(4), 0)),
            RuntimeObject::from(GlobalInstance::new(id(4), ValueType::F64, true)),
            RuntimeObject::from(ContextInstance::new(id(4))),
        ];
        for object in &objects {
            assert_eq!(object.child_references(), vec![id(4)], "{:?}", object.kind());
        }
    }
}
