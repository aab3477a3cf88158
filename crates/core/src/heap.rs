//! The GC-managed heap: a single arena owning every heap object, plus the
//! tri-color mark-sweep collector described in spec.md §4.3.
//!
//! The heap does not know about the VM's stack/frames or the compiler's
//! in-flight function list -- whoever triggers a collection (the VM at
//! runtime, the compiler while folding constants) supplies its own roots
//! through the [`GcRoots`] trait. This keeps `corvid-core` from depending
//! on either `corvid-compiler` or `corvid-vm`.

use crate::chunk::Chunk;
use crate::object::{
    BoundMethod, Class, Closure, HeapObject, Instance, LoxFunction, LoxString, NativeFn, ObjRef,
    UpvalueObj, UpvalueState, fnv1a_hash,
};
use crate::table::Table;
use crate::value::{Obj, Value};
use std::collections::HashMap;

/// Tunables the spec leaves to the implementer (spec.md §4.3, §9).
#[derive(Debug, Clone, Copy)]
pub struct GcConfig {
    pub heap_grow_factor: usize,
    pub initial_next_gc: usize,
    /// Force a collection on every allocation. Used to exercise the
    /// "identical output under stress GC" property from spec.md §8.
    pub stress_gc: bool,
}

impl Default for GcConfig {
    fn default() -> Self {
        GcConfig {
            heap_grow_factor: 2,
            initial_next_gc: 1 << 20,
            stress_gc: false,
        }
    }
}

/// Anything that can hand the collector its roots: the VM's stack,
/// frames, open upvalues and globals at runtime, or the compiler's
/// in-flight function chain while it is still building constants.
pub trait GcRoots {
    fn mark_roots(&self, heap: &mut Heap);
}

/// An empty root set, useful for tests that exercise the heap in
/// isolation.
pub struct NoRoots;
impl GcRoots for NoRoots {
    fn mark_roots(&self, _heap: &mut Heap) {}
}

struct Slot {
    marked: bool,
    size: usize,
    object: HeapObject,
}

pub struct Heap {
    objects: Vec<Slot>,
    free_slots: Vec<u32>,
    strings: HashMap<Box<str>, ObjRef<LoxString>>,
    gray_stack: Vec<u32>,
    bytes_allocated: usize,
    next_gc: usize,
    config: GcConfig,
}

impl Heap {
    pub fn new(config: GcConfig) -> Self {
        Heap {
            objects: Vec::new(),
            free_slots: Vec::new(),
            strings: HashMap::new(),
            gray_stack: Vec::new(),
            bytes_allocated: 0,
            next_gc: config.initial_next_gc,
            config,
        }
    }

    pub fn bytes_allocated(&self) -> usize {
        self.bytes_allocated
    }

    pub fn object_count(&self) -> usize {
        self.objects.len() - self.free_slots.len()
    }

    fn push_object(&mut self, object: HeapObject, size: usize) -> u32 {
        self.bytes_allocated += size;
        match self.free_slots.pop() {
            Some(index) => {
                self.objects[index as usize] = Slot {
                    marked: false,
                    size,
                    object,
                };
                index
            }
            None => {
                self.objects.push(Slot {
                    marked: false,
                    size,
                    object,
                });
                (self.objects.len() - 1) as u32
            }
        }
    }

    pub fn maybe_collect(&mut self, roots: &dyn GcRoots) {
        if self.config.stress_gc || self.bytes_allocated > self.next_gc {
            self.collect(roots);
        }
    }

    /// Run one full mark-sweep cycle (spec.md §4.3's four steps, in order).
    pub fn collect(&mut self, roots: &dyn GcRoots) {
        let before = self.bytes_allocated;
        tracing::debug!(bytes_before = before, "gc: collection starting");

        roots.mark_roots(self);
        self.trace_references();
        self.weaken_intern_table();
        let freed = self.sweep();

        self.next_gc = (self.bytes_allocated * self.config.heap_grow_factor)
            .max(self.config.initial_next_gc);
        tracing::debug!(
            bytes_before = before,
            bytes_after = self.bytes_allocated,
            objects_freed = freed,
            next_gc = self.next_gc,
            "gc: collection finished"
        );
    }

    // -- marking -------------------------------------------------------

    pub fn mark_raw(&mut self, index: u32) {
        let slot = &mut self.objects[index as usize];
        if !slot.marked {
            slot.marked = true;
            self.gray_stack.push(index);
        }
    }

    pub fn mark_object_ref<T>(&mut self, r: ObjRef<T>) {
        self.mark_raw(r.index());
    }

    pub fn mark_value(&mut self, value: &Value) {
        if let Value::Obj(o) = value {
            let idx = match o {
                Obj::Str(r) => r.index(),
                Obj::Function(r) => r.index(),
                Obj::Native(r) => r.index(),
                Obj::Closure(r) => r.index(),
                Obj::Class(r) => r.index(),
                Obj::Instance(r) => r.index(),
                Obj::BoundMethod(r) => r.index(),
            };
            self.mark_raw(idx);
        }
    }

    pub fn mark_table(&mut self, table: &Table<Value>) {
        let entries: Vec<(u32, Value)> = table.iter().map(|(k, _, v)| (k.index(), *v)).collect();
        for (key_idx, value) in entries {
            self.mark_raw(key_idx);
            self.mark_value(&value);
        }
    }

    fn trace_references(&mut self) {
        while let Some(idx) = self.gray_stack.pop() {
            self.blacken(idx);
        }
    }

    /// Mark an object's children, per spec.md §4.3 step 2: Closure ->
    /// Function + upvalues; Class -> name + methods; Instance -> class +
    /// fields; BoundMethod -> receiver + method; Upvalue -> closed value
    /// (an open upvalue points into the stack, not into the heap, and is
    /// not followed here); Function -> name + constants.
    fn blacken(&mut self, idx: u32) {
        let mut values: Vec<Value> = Vec::new();
        let mut refs: Vec<u32> = Vec::new();

        match &self.objects[idx as usize].object {
            HeapObject::Str(_) | HeapObject::Free => {}
            HeapObject::Function(function) => {
                values.extend(function.chunk.constants.iter().copied());
                if let Some(name) = function.name {
                    refs.push(name.index());
                }
            }
            HeapObject::Native(native) => {
                refs.push(native.name.index());
            }
            HeapObject::Closure(closure) => {
                refs.push(closure.function.index());
                refs.extend(closure.upvalues.iter().map(|u| u.index()));
            }
            HeapObject::Upvalue(upvalue) => {
                if let UpvalueState::Closed(v) = &upvalue.state {
                    values.push(*v);
                }
            }
            HeapObject::Class(class) => {
                refs.push(class.name.index());
                refs.extend(class.methods.iter().map(|(k, _, _)| k.index()));
                values.extend(class.methods.values().copied());
            }
            HeapObject::Instance(instance) => {
                refs.push(instance.class.index());
                refs.extend(instance.fields.iter().map(|(k, _, _)| k.index()));
                values.extend(instance.fields.values().copied());
            }
            HeapObject::BoundMethod(bound) => {
                refs.push(bound.method.index());
                values.push(bound.receiver);
            }
        }

        for value in values {
            self.mark_value(&value);
        }
        for r in refs {
            self.mark_raw(r);
        }
    }

    /// Remove intern-table entries whose key was not marked. Must run
    /// after tracing and before sweep, so a string kept alive only by
    /// the intern table (nothing else references it) is correctly freed.
    fn weaken_intern_table(&mut self) {
        let objects = &self.objects;
        self.strings
            .retain(|_, r| objects[r.index() as usize].marked);
    }

    fn sweep(&mut self) -> usize {
        let mut freed = 0;
        for idx in 0..self.objects.len() {
            let slot = &mut self.objects[idx];
            if matches!(slot.object, HeapObject::Free) {
                continue;
            }
            if slot.marked {
                slot.marked = false;
            } else {
                self.bytes_allocated -= slot.size;
                slot.size = 0;
                slot.object = HeapObject::Free;
                self.free_slots.push(idx as u32);
                freed += 1;
            }
        }
        freed
    }

    // -- allocation ------------------------------------------------------

    /// Intern `s`, returning the existing handle if an equal string is
    /// already live, or allocating a new one otherwise (spec.md §4.2's
    /// `find-string`).
    pub fn intern(&mut self, s: &str, roots: &dyn GcRoots) -> ObjRef<LoxString> {
        if let Some(existing) = self.strings.get(s) {
            return *existing;
        }
        self.maybe_collect(roots);
        let hash = fnv1a_hash(s.as_bytes());
        let size = std::mem::size_of::<LoxString>() + s.len();
        let idx = self.push_object(
            HeapObject::Str(LoxString {
                bytes: s.into(),
                hash,
            }),
            size,
        );
        let r = ObjRef::new(idx);
        self.strings.insert(s.into(), r);
        r
    }

    pub fn alloc_function(&mut self, function: LoxFunction, roots: &dyn GcRoots) -> ObjRef<LoxFunction> {
        self.maybe_collect(roots);
        let size = std::mem::size_of::<LoxFunction>() + function.chunk.code.len();
        ObjRef::new(self.push_object(HeapObject::Function(function), size))
    }

    pub fn alloc_native(&mut self, native: NativeFn, roots: &dyn GcRoots) -> ObjRef<NativeFn> {
        self.maybe_collect(roots);
        let size = std::mem::size_of::<NativeFn>();
        ObjRef::new(self.push_object(HeapObject::Native(native), size))
    }

    pub fn alloc_closure(&mut self, closure: Closure, roots: &dyn GcRoots) -> ObjRef<Closure> {
        self.maybe_collect(roots);
        let size = std::mem::size_of::<Closure>() + closure.upvalues.len() * 4;
        ObjRef::new(self.push_object(HeapObject::Closure(closure), size))
    }

    pub fn alloc_upvalue(&mut self, slot: usize, roots: &dyn GcRoots) -> ObjRef<UpvalueObj> {
        self.maybe_collect(roots);
        let size = std::mem::size_of::<UpvalueObj>();
        ObjRef::new(self.push_object(
            HeapObject::Upvalue(UpvalueObj {
                state: UpvalueState::Open(slot),
            }),
            size,
        ))
    }

    pub fn alloc_class(&mut self, name: ObjRef<LoxString>, roots: &dyn GcRoots) -> ObjRef<Class> {
        self.maybe_collect(roots);
        let size = std::mem::size_of::<Class>();
        ObjRef::new(self.push_object(HeapObject::Class(Class::new(name)), size))
    }

    pub fn alloc_instance(&mut self, class: ObjRef<Class>, roots: &dyn GcRoots) -> ObjRef<Instance> {
        self.maybe_collect(roots);
        let size = std::mem::size_of::<Instance>();
        ObjRef::new(self.push_object(HeapObject::Instance(Instance::new(class)), size))
    }

    pub fn alloc_bound_method(
        &mut self,
        receiver: Value,
        method: ObjRef<Closure>,
        roots: &dyn GcRoots,
    ) -> ObjRef<BoundMethod> {
        self.maybe_collect(roots);
        let size = std::mem::size_of::<BoundMethod>();
        ObjRef::new(self.push_object(HeapObject::BoundMethod(BoundMethod { receiver, method }), size))
    }

    // -- accessors ---------------------------------------------------------

    pub fn get_string(&self, r: ObjRef<LoxString>) -> &LoxString {
        match &self.objects[r.index() as usize].object {
            HeapObject::Str(s) => s,
            other => panic!("corrupt heap: expected string, found {}", other.kind_name()),
        }
    }

    pub fn get_function(&self, r: ObjRef<LoxFunction>) -> &LoxFunction {
        match &self.objects[r.index() as usize].object {
            HeapObject::Function(f) => f,
            other => panic!("corrupt heap: expected function, found {}", other.kind_name()),
        }
    }

    pub fn get_function_mut(&mut self, r: ObjRef<LoxFunction>) -> &mut LoxFunction {
        match &mut self.objects[r.index() as usize].object {
            HeapObject::Function(f) => f,
            other => panic!("corrupt heap: expected function, found {}", other.kind_name()),
        }
    }

    pub fn get_native(&self, r: ObjRef<NativeFn>) -> &NativeFn {
        match &self.objects[r.index() as usize].object {
            HeapObject::Native(n) => n,
            other => panic!("corrupt heap: expected native, found {}", other.kind_name()),
        }
    }

    pub fn get_closure(&self, r: ObjRef<Closure>) -> &Closure {
        match &self.objects[r.index() as usize].object {
            HeapObject::Closure(c) => c,
            other => panic!("corrupt heap: expected closure, found {}", other.kind_name()),
        }
    }

    pub fn get_upvalue(&self, r: ObjRef<UpvalueObj>) -> &UpvalueObj {
        match &self.objects[r.index() as usize].object {
            HeapObject::Upvalue(u) => u,
            other => panic!("corrupt heap: expected upvalue, found {}", other.kind_name()),
        }
    }

    pub fn get_upvalue_mut(&mut self, r: ObjRef<UpvalueObj>) -> &mut UpvalueObj {
        match &mut self.objects[r.index() as usize].object {
            HeapObject::Upvalue(u) => u,
            other => panic!("corrupt heap: expected upvalue, found {}", other.kind_name()),
        }
    }

    pub fn get_class(&self, r: ObjRef<Class>) -> &Class {
        match &self.objects[r.index() as usize].object {
            HeapObject::Class(c) => c,
            other => panic!("corrupt heap: expected class, found {}", other.kind_name()),
        }
    }

    pub fn get_class_mut(&mut self, r: ObjRef<Class>) -> &mut Class {
        match &mut self.objects[r.index() as usize].object {
            HeapObject::Class(c) => c,
            other => panic!("corrupt heap: expected class, found {}", other.kind_name()),
        }
    }

    pub fn get_instance(&self, r: ObjRef<Instance>) -> &Instance {
        match &self.objects[r.index() as usize].object {
            HeapObject::Instance(i) => i,
            other => panic!("corrupt heap: expected instance, found {}", other.kind_name()),
        }
    }

    pub fn get_instance_mut(&mut self, r: ObjRef<Instance>) -> &mut Instance {
        match &mut self.objects[r.index() as usize].object {
            HeapObject::Instance(i) => i,
            other => panic!("corrupt heap: expected instance, found {}", other.kind_name()),
        }
    }

    pub fn get_bound_method(&self, r: ObjRef<BoundMethod>) -> &BoundMethod {
        match &self.objects[r.index() as usize].object {
            HeapObject::BoundMethod(b) => b,
            other => panic!("corrupt heap: expected bound method, found {}", other.kind_name()),
        }
    }

    pub fn chunk_mut(&mut self, r: ObjRef<LoxFunction>) -> &mut Chunk {
        match &mut self.objects[r.index() as usize].object {
            HeapObject::Function(f) => &mut f.chunk,
            other => panic!("corrupt heap: expected function, found {}", other.kind_name()),
        }
    }

    pub fn chunk(&self, r: ObjRef<LoxFunction>) -> &Chunk {
        match &self.objects[r.index() as usize].object {
            HeapObject::Function(f) => &f.chunk,
            other => panic!("corrupt heap: expected function, found {}", other.kind_name()),
        }
    }

    /// Render `value` the way `print` and string concatenation need:
    /// strings by content, functions/classes by name, instances as
    /// `"<ClassName instance>"`. `Value`'s own `Display` can't do this
    /// since it has no access to the heap.
    pub fn stringify(&self, value: &Value) -> String {
        match value {
            Value::Obj(Obj::Str(r)) => self.get_string(*r).as_str().to_string(),
            Value::Obj(Obj::Function(r)) => match self.get_function(*r).name {
                Some(name) => format!("<fn {}>", self.get_string(name).as_str()),
                None => "<script>".to_string(),
            },
            Value::Obj(Obj::Native(_)) => "<native fn>".to_string(),
            Value::Obj(Obj::Closure(r)) => {
                let function = self.get_closure(*r).function;
                self.stringify(&Value::Obj(Obj::Function(function)))
            }
            Value::Obj(Obj::Class(r)) => self.get_string(self.get_class(*r).name).as_str().to_string(),
            Value::Obj(Obj::Instance(r)) => {
                let class = self.get_instance(*r).class;
                format!("{} instance", self.get_string(self.get_class(class).name).as_str())
            }
            Value::Obj(Obj::BoundMethod(r)) => {
                let method = self.get_bound_method(*r).method;
                self.stringify(&Value::Obj(Obj::Closure(method)))
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_returns_same_handle() {
        let mut heap = Heap::new(GcConfig::default());
        let a = heap.intern("hello", &NoRoots);
        let b = heap.intern("hello", &NoRoots);
        assert_eq!(a, b);
        let c = heap.intern("world", &NoRoots);
        assert_ne!(a, c);
    }

    #[test]
    fn unreachable_objects_are_freed_on_collect() {
        let mut heap = Heap::new(GcConfig::default());
        heap.intern("doomed", &NoRoots);
        assert_eq!(heap.object_count(), 1);
        heap.collect(&NoRoots);
        assert_eq!(heap.object_count(), 0);
        assert!(heap.strings.is_empty());
    }

    #[test]
    fn stress_gc_does_not_panic_across_many_allocations() {
        let mut config = GcConfig::default();
        config.stress_gc = true;
        let mut heap = Heap::new(config);
        for i in 0..100 {
            heap.intern(&format!("s{i}"), &NoRoots);
        }
    }
}
