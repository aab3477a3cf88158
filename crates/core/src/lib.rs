//! Corvid Core: the value model, GC-managed heap, hash table and bytecode
//! chunk shared by the compiler and the virtual machine.
//!
//! Key design principles:
//! - `Value`: what the language talks about (nil, bool, number, object handle)
//! - `Heap`: owns every heap-allocated object in one arena and runs the
//!   mark-sweep collector over caller-supplied roots
//! - `Table`: the open-addressed hash table used for globals, methods,
//!   fields and (indirectly) string interning
//! - `Chunk`: a compiled function's bytecode, line table and constant pool
//!
//! # Modules
//!
//! - `value`: the `Value` tagged union and its equality/printing rules
//! - `object`: heap object variants (`LoxString`, `LoxFunction`, `Closure`, ...)
//! - `heap`: the arena allocator and the tri-color mark-sweep collector
//! - `table`: the open-addressing hash table
//! - `chunk`: bytecode container and opcode set

pub mod chunk;
pub mod heap;
pub mod object;
pub mod table;
pub mod value;

pub use chunk::{Chunk, OpCode};
pub use heap::{GcConfig, GcRoots, Heap, NoRoots};
pub use object::{
    BoundMethod, Class, Closure, Instance, LoxFunction, LoxString, NativeFn, NativeFunction, ObjRef,
    UpvalueObj, UpvalueState,
};
pub use table::Table;
pub use value::{Obj, Value, ValueKind};
