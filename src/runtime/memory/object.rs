//! Runtime object kinds owned by the heap
//!
//! Every object the collector manages is one variant of [`RuntimeObject`].
//! Cross-object references are stored as [`ObjectId`]s; the heap is the only
//! owner of the objects themselves.

use std::mem;

use crate::runtime::memory::handle::{ObjectId, ObjectKind};
use crate::runtime::memory::trace::Trace;

/// Size in bytes of one linear memory page
pub const PAGE_SIZE: usize = 64 * 1024;

/// Resource held outside the object graph, released when its object is reclaimed
pub trait NativeResource: Send {
    /// Release the resource. Called exactly once, after the owning object has
    /// been unregistered and before it is dropped.
    fn release(&mut self);

    /// Get the type name of the resource for debugging
    fn type_name(&self) -> &'static str {
        "NativeResource"
    }

    /// Get the size of the resource in bytes
    fn size(&self) -> usize {
        0
    }
}

/// Contract every object kind implements to be managed by the heap.
///
/// Topology is declared through the [`Trace`] supertrait; `finalize` tears
/// down any state that is not a graph edge.
pub trait HeapObject: Trace + Into<RuntimeObject> {
    const KIND: ObjectKind;

    fn finalize(&mut self) {}

    fn downcast(object: &RuntimeObject) -> Option<&Self>;

    fn downcast_mut(object: &mut RuntimeObject) -> Option<&mut Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    I32,
    I64,
    F32,
    F64,
    FuncRef,
    ExternRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionInstance {
    pub module: Option<ObjectId>,
    pub name: String,
}

impl FunctionInstance {
    pub fn new(module: Option<ObjectId>, name: impl Into<String>) -> Self {
        Self {
            module,
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInstance {
    pub compartment: ObjectId,
    pub elements: Vec<Option<ObjectId>>,
    pub max_len: Option<usize>,
}

impl TableInstance {
    pub fn new(compartment: ObjectId, len: usize) -> Self {
        Self {
            compartment,
            elements: vec![None; len],
            max_len: None,
        }
    }

    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemoryInstance {
    pub compartment: ObjectId,
    pub data: Vec<u8>,
}

impl MemoryInstance {
    pub fn new(compartment: ObjectId, pages: usize) -> Self {
        Self {
            compartment,
            data: vec![0; pages * PAGE_SIZE],
        }
    }

    pub fn pages(&self) -> usize {
        self.data.len() / PAGE_SIZE
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalInstance {
    pub compartment: ObjectId,
    pub value_type: ValueType,
    pub mutable: bool,
    pub bits: u64,
}

impl GlobalInstance {
    pub const fn new(compartment: ObjectId, value_type: ValueType, mutable: bool) -> Self {
        Self {
            compartment,
            value_type,
            mutable,
            bits: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleInstance {
    pub compartment: ObjectId,
    /// Functions defined by this module
    pub function_defs: Vec<ObjectId>,
    /// Imported and defined functions, in index space order
    pub functions: Vec<ObjectId>,
    pub tables: Vec<ObjectId>,
    pub memories: Vec<ObjectId>,
    pub globals: Vec<ObjectId>,
    pub default_memory: Option<ObjectId>,
    pub default_table: Option<ObjectId>,
}

impl ModuleInstance {
    pub const fn new(compartment: ObjectId) -> Self {
        Self {
            compartment,
            function_defs: Vec::new(),
            functions: Vec::new(),
            tables: Vec::new(),
            memories: Vec::new(),
            globals: Vec::new(),
            default_memory: None,
            default_table: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextInstance {
    pub compartment: ObjectId,
}

impl ContextInstance {
    pub const fn new(compartment: ObjectId) -> Self {
        Self { compartment }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Compartment {
    /// Module instance that binds the runtime intrinsics for this compartment
    pub intrinsics: Option<ObjectId>,
}

impl Compartment {
    pub const fn new() -> Self {
        Self { intrinsics: None }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExceptionType {
    pub name: String,
    pub params: Vec<ValueType>,
}

impl ExceptionType {
    pub fn new(name: impl Into<String>, params: Vec<ValueType>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }
}

macro_rules! runtime_objects {
    ($($variant:ident($ty:ident)),* $(,)?) => {
        /// A heap-owned runtime object, tagged by kind
        #[derive(Debug, Clone, PartialEq, Eq)]
        pub enum RuntimeObject {
            $($variant($ty),)*
        }

        impl RuntimeObject {
            pub const fn kind(&self) -> ObjectKind {
                match self {
                    $(Self::$variant(_) => ObjectKind::$variant,)*
                }
            }
        }

        $(
            impl From<$ty> for RuntimeObject {
                fn from(object: $ty) -> Self {
                    Self::$variant(object)
                }
            }

            impl HeapObject for $ty {
                const KIND: ObjectKind = ObjectKind::$variant;

                fn finalize(&mut self) {
                    $ty::release_state(self);
                }

                fn downcast(object: &RuntimeObject) -> Option<&Self> {
                    match object {
                        RuntimeObject::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }

                fn downcast_mut(object: &mut RuntimeObject) -> Option<&mut Self> {
                    match object {
                        RuntimeObject::$variant(inner) => Some(inner),
                        _ => None,
                    }
                }
            }
        )*
    };
}

runtime_objects! {
    Function(FunctionInstance),
    Table(TableInstance),
    Memory(MemoryInstance),
    Global(GlobalInstance),
    Module(ModuleInstance),
    Context(ContextInstance),
    Compartment(Compartment),
    ExceptionType(ExceptionType),
}

// Per-kind teardown. Runs after the object is unregistered, so edge storage
// can be dropped along with everything else.

impl FunctionInstance {
    fn release_state(&mut self) {}
}

impl TableInstance {
    fn release_state(&mut self) {
        self.elements = Vec::new();
    }
}

impl MemoryInstance {
    fn release_state(&mut self) {
        self.data = Vec::new();
    }
}

impl GlobalInstance {
    fn release_state(&mut self) {}
}

impl ModuleInstance {
    fn release_state(&mut self) {
        self.function_defs = Vec::new();
        self.functions = Vec::new();
        self.tables = Vec::new();
        self.memories = Vec::new();
        self.globals = Vec::new();
    }
}

impl ContextInstance {
    fn release_state(&mut self) {}
}

impl Compartment {
    fn release_state(&mut self) {
        self.intrinsics = None;
    }
}

impl ExceptionType {
    fn release_state(&mut self) {}
}

impl RuntimeObject {
    /// Run the kind's finalizer
    pub(crate) fn finalize(&mut self) {
        match self {
            Self::Function(function) => function.finalize(),
            Self::Table(table) => table.finalize(),
            Self::Memory(memory) => memory.finalize(),
            Self::Global(global) => global.finalize(),
            Self::Module(module) => module.finalize(),
            Self::Context(context) => context.finalize(),
            Self::Compartment(compartment) => compartment.finalize(),
            Self::ExceptionType(exception_type) => exception_type.finalize(),
        }
    }

    /// Approximate number of bytes owned by the object outside its slot
    pub fn footprint(&self) -> usize {
        let id_size = mem::size_of::<ObjectId>();
        match self {
            Self::Function(function) => function.name.len(),
            Self::Table(table) => table.elements.len() * mem::size_of::<Option<ObjectId>>(),
            Self::Memory(memory) => memory.data.len(),
            Self::Global(_) | Self::Context(_) | Self::Compartment(_) => 0,
            Self::Module(module) => {
                (module.function_defs.len()
                    + module.functions.len()
                    + module.tables.len()
                    + module.memories.len()
                    + module.globals.len())
                    * id_size
            }
            Self::ExceptionType(exception_type) => {
                exception_type.name.len()
                    + exception_type.params.len() * mem::size_of::<ValueType>()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn compartment_id() -> ObjectId {
        ObjectId::from_parts(0, 0)
    }

    #[test]
    fn kind_follows_variant() {
        let object: RuntimeObject = MemoryInstance::new(compartment_id(), 0).into();
        assert_eq!(object.kind(), ObjectKind::Memory);
        assert!(MemoryInstance::downcast(&object).is_some());
        assert!(TableInstance::downcast(&object).is_none());
    }

    #[test]
    fn finalize_releases_memory_pages() {
        let mut object: RuntimeObject = MemoryInstance::new(compartment_id(), 1).into();
        assert_eq!(object.footprint(), PAGE_SIZE);

        object.finalize();

        let memory = MemoryInstance::downcast(&object).expect("memory");
        assert_eq!(memory.pages(), 0);
        assert_eq!(memory.compartment, compartment_id());
    }

    #[test]
    fn finalize_clears_table_elements() {
        let mut table = TableInstance::new(compartment_id(), 4);
        table.elements[1] = Some(ObjectId::from_parts(3, 0));
        let mut object = RuntimeObject::from(table);

        object.finalize();

        assert_eq!(object.footprint(), 0);
    }
}
