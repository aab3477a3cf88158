//! The dispatch loop and runtime semantics (spec.md §4.5).

use std::io::Write;

use corvid_core::{
    BoundMethod, Class, Closure, GcConfig, GcRoots, Heap, LoxFunction, LoxString, NativeFn,
    NativeFunction, NoRoots, Obj, ObjRef, OpCode, Table, UpvalueObj, UpvalueState, Value,
};

use crate::error::RuntimeError;
use crate::frame::CallFrame;

const FRAMES_MAX: usize = 64;
const STACK_MAX: usize = FRAMES_MAX * 256;

/// Exposes the VM's live state to the collector: the value stack,
/// call-frame closures, the globals table, and the open-upvalue list.
///
/// Per spec.md §9, an open upvalue's stack pointer is not itself an
/// object reference (the stack is rooted separately); the upvalue
/// *object* still needs rooting while open, since nothing else on the
/// heap points at it yet.
struct VmRoots<'a> {
    stack: &'a [Value],
    frames: &'a [CallFrame],
    globals: &'a Table<Value>,
    open_upvalues: &'a [ObjRef<UpvalueObj>],
    init_string: ObjRef<LoxString>,
}

impl GcRoots for VmRoots<'_> {
    fn mark_roots(&self, heap: &mut Heap) {
        for v in self.stack {
            heap.mark_value(v);
        }
        for frame in self.frames {
            heap.mark_object_ref(frame.closure);
        }
        heap.mark_table(self.globals);
        for u in self.open_upvalues {
            heap.mark_object_ref(*u);
        }
        heap.mark_object_ref(self.init_string);
    }
}

/// The Corvid virtual machine: value stack, call frames, globals, the
/// open-upvalue list and the heap they all point into.
///
/// A `Vm` owns its `Heap` so a REPL can compile and run one line at a
/// time against the same heap, keeping globals, interned strings and
/// previously defined closures alive across lines.
pub struct Vm {
    heap: Heap,
    frames: Vec<CallFrame>,
    stack: Vec<Value>,
    globals: Table<Value>,
    open_upvalues: Vec<ObjRef<UpvalueObj>>,
    init_string: ObjRef<LoxString>,
    stdout: Box<dyn Write>,
}

impl Vm {
    pub fn new(config: GcConfig) -> Self {
        Self::with_stdout(config, Box::new(std::io::stdout()))
    }

    pub fn with_stdout(config: GcConfig, stdout: Box<dyn Write>) -> Self {
        let mut heap = Heap::new(config);
        let init_string = heap.intern("init", &NoRoots);
        Vm {
            heap,
            frames: Vec::new(),
            stack: Vec::new(),
            globals: Table::new(),
            open_upvalues: Vec::new(),
            init_string,
            stdout,
        }
    }

    pub fn heap_mut(&mut self) -> &mut Heap {
        &mut self.heap
    }

    pub fn define_native(&mut self, name: &str, arity: u8, function: NativeFunction) {
        let roots = self.roots();
        let name_ref = self.heap.intern(name, &roots);
        let hash = self.heap.get_string(name_ref).hash;
        let roots = self.roots();
        let native_ref = self.heap.alloc_native(NativeFn { name: name_ref, arity, function }, &roots);
        self.globals.set(name_ref, hash, Value::Obj(Obj::Native(native_ref)));
    }

    /// Wrap `function` (as returned by `corvid_compiler::compile`) in a
    /// closure with no upvalues and run it as the outermost frame.
    pub fn interpret(&mut self, function: ObjRef<LoxFunction>) -> Result<(), RuntimeError> {
        tracing::debug!("interpreting top-level script");
        let roots = self.roots();
        let closure_ref = self.heap.alloc_closure(Closure { function, upvalues: Vec::new() }, &roots);
        self.push(Value::Obj(Obj::Closure(closure_ref)))?;
        self.frames.push(CallFrame { closure: closure_ref, ip: 0, base: 0 });
        self.run()
    }

    fn roots(&self) -> VmRoots<'_> {
        VmRoots {
            stack: &self.stack,
            frames: &self.frames,
            globals: &self.globals,
            open_upvalues: &self.open_upvalues,
            init_string: self.init_string,
        }
    }

    // ---- stack helpers -------------------------------------------------

    fn push(&mut self, value: Value) -> Result<(), RuntimeError> {
        if self.stack.len() >= STACK_MAX {
            return Err(self.runtime_error("Stack overflow."));
        }
        self.stack.push(value);
        Ok(())
    }

    fn pop(&mut self) -> Value {
        self.stack.pop().expect("stack underflow is a compiler bug")
    }

    fn peek(&self, distance: usize) -> Value {
        self.stack[self.stack.len() - 1 - distance]
    }

    // ---- bytecode stream -------------------------------------------------

    fn read_u8(&mut self) -> u8 {
        let frame = self.frames.last_mut().expect("at least one active frame");
        let closure_ref = frame.closure;
        let ip = frame.ip;
        frame.ip += 1;
        let function_ref = self.heap.get_closure(closure_ref).function;
        self.heap.chunk(function_ref).code[ip]
    }

    fn read_u16(&mut self) -> u16 {
        let hi = self.read_u8() as u16;
        let lo = self.read_u8() as u16;
        (hi << 8) | lo
    }

    fn read_constant(&mut self, idx: usize) -> Value {
        let closure_ref = self.frames.last().expect("at least one active frame").closure;
        let function_ref = self.heap.get_closure(closure_ref).function;
        self.heap.chunk(function_ref).constants[idx]
    }

    // ---- errors ------------------------------------------------------

    fn runtime_error(&mut self, message: impl Into<String>) -> RuntimeError {
        let message = message.into();
        tracing::debug!(message = %message, frames = self.frames.len(), "aborting with a runtime error");
        let mut stack_trace = Vec::with_capacity(self.frames.len());
        for frame in self.frames.iter().rev() {
            let function_ref = self.heap.get_closure(frame.closure).function;
            let function = self.heap.get_function(function_ref);
            let line = function.chunk.line_at(frame.ip.saturating_sub(1));
            let name = match function.name {
                Some(name_ref) => format!("{}()", self.heap.get_string(name_ref).as_str()),
                None => "script".to_string(),
            };
            stack_trace.push(format!("[line {line}] in {name}"));
        }
        self.stack.clear();
        self.frames.clear();
        self.open_upvalues.clear();
        RuntimeError { message, stack_trace }
    }

    // ---- calls ---------------------------------------------------------

    fn call_value(&mut self, callee: Value, arg_count: u8) -> Result<(), RuntimeError> {
        match callee {
            Value::Obj(Obj::Closure(r)) => self.call_closure(r, arg_count),
            Value::Obj(Obj::Native(r)) => self.call_native(r, arg_count),
            Value::Obj(Obj::Class(r)) => self.call_class(r, arg_count),
            Value::Obj(Obj::BoundMethod(r)) => self.call_bound_method(r, arg_count),
            _ => Err(self.runtime_error("Can only call functions and classes.")),
        }
    }

    fn call_closure(&mut self, closure_ref: ObjRef<Closure>, arg_count: u8) -> Result<(), RuntimeError> {
        let function_ref = self.heap.get_closure(closure_ref).function;
        let arity = self.heap.get_function(function_ref).arity;
        if arg_count != arity {
            return Err(self.runtime_error(format!("Expected {arity} arguments but got {arg_count}.")));
        }
        if self.frames.len() >= FRAMES_MAX {
            return Err(self.runtime_error("Stack overflow."));
        }
        let base = self.stack.len() - arg_count as usize - 1;
        tracing::trace!(depth = self.frames.len() + 1, arg_count, "entering call frame");
        self.frames.push(CallFrame { closure: closure_ref, ip: 0, base });
        Ok(())
    }

    fn call_native(&mut self, native_ref: ObjRef<NativeFn>, arg_count: u8) -> Result<(), RuntimeError> {
        let native = *self.heap.get_native(native_ref);
        if arg_count != native.arity {
            return Err(self.runtime_error(format!("Expected {} arguments but got {arg_count}.", native.arity)));
        }
        let arg_start = self.stack.len() - arg_count as usize;
        let args: Vec<Value> = self.stack[arg_start..].to_vec();
        let result = match (native.function)(&args) {
            Ok(v) => v,
            Err(msg) => return Err(self.runtime_error(msg)),
        };
        self.stack.truncate(arg_start - 1);
        self.push(result)
    }

    fn call_class(&mut self, class_ref: ObjRef<Class>, arg_count: u8) -> Result<(), RuntimeError> {
        let roots = self.roots();
        let instance_ref = self.heap.alloc_instance(class_ref, &roots);
        let slot = self.stack.len() - arg_count as usize - 1;
        self.stack[slot] = Value::Obj(Obj::Instance(instance_ref));

        let init_hash = self.heap.get_string(self.init_string).hash;
        let initializer = self.heap.get_class(class_ref).methods.get(self.init_string, init_hash).copied();
        if let Some(Value::Obj(Obj::Closure(closure_ref))) = initializer {
            return self.call_closure(closure_ref, arg_count);
        }
        if arg_count != 0 {
            return Err(self.runtime_error(format!("Expected 0 arguments but got {arg_count}.")));
        }
        Ok(())
    }

    fn call_bound_method(&mut self, bound_ref: ObjRef<BoundMethod>, arg_count: u8) -> Result<(), RuntimeError> {
        let bound = self.heap.get_bound_method(bound_ref).clone();
        let slot = self.stack.len() - arg_count as usize - 1;
        self.stack[slot] = bound.receiver;
        self.call_closure(bound.method, arg_count)
    }

    fn invoke(&mut self, name: ObjRef<LoxString>, arg_count: u8) -> Result<(), RuntimeError> {
        let receiver = self.peek(arg_count as usize);
        let instance_ref = match receiver {
            Value::Obj(Obj::Instance(r)) => r,
            _ => return Err(self.runtime_error("Only instances have methods.")),
        };
        let hash = self.heap.get_string(name).hash;
        let field = self.heap.get_instance(instance_ref).fields.get(name, hash).copied();
        if let Some(value) = field {
            let slot = self.stack.len() - arg_count as usize - 1;
            self.stack[slot] = value;
            return self.call_value(value, arg_count);
        }
        let class_ref = self.heap.get_instance(instance_ref).class;
        self.invoke_from_class(class_ref, name, arg_count)
    }

    fn invoke_from_class(
        &mut self,
        class_ref: ObjRef<Class>,
        name: ObjRef<LoxString>,
        arg_count: u8,
    ) -> Result<(), RuntimeError> {
        let hash = self.heap.get_string(name).hash;
        let method = self.heap.get_class(class_ref).methods.get(name, hash).copied();
        match method {
            Some(Value::Obj(Obj::Closure(closure_ref))) => self.call_closure(closure_ref, arg_count),
            Some(_) => unreachable!("a class method table only ever stores closures"),
            None => {
                let msg = format!("Undefined property '{}'.", self.heap.get_string(name).as_str());
                Err(self.runtime_error(msg))
            }
        }
    }

    fn bind_method(&mut self, class_ref: ObjRef<Class>, name: ObjRef<LoxString>) -> Result<(), RuntimeError> {
        let hash = self.heap.get_string(name).hash;
        let method = self.heap.get_class(class_ref).methods.get(name, hash).copied();
        match method {
            Some(Value::Obj(Obj::Closure(closure_ref))) => {
                let receiver = self.pop();
                let roots = self.roots();
                let bound_ref = self.heap.alloc_bound_method(receiver, closure_ref, &roots);
                self.push(Value::Obj(Obj::BoundMethod(bound_ref)))
            }
            Some(_) => unreachable!("a class method table only ever stores closures"),
            None => {
                let msg = format!("Undefined property '{}'.", self.heap.get_string(name).as_str());
                Err(self.runtime_error(msg))
            }
        }
    }

    fn define_method(&mut self, name: ObjRef<LoxString>) {
        let method_val = self.peek(0);
        let class_val = self.peek(1);
        let class_ref = match class_val {
            Value::Obj(Obj::Class(r)) => r,
            _ => unreachable!("METHOD always follows its class on the stack"),
        };
        let hash = self.heap.get_string(name).hash;
        self.heap.get_class_mut(class_ref).methods.set(name, hash, method_val);
        self.pop();
    }

    // ---- upvalues ------------------------------------------------------

    fn capture_upvalue(&mut self, stack_slot: usize) -> ObjRef<UpvalueObj> {
        for &existing in &self.open_upvalues {
            if let UpvalueState::Open(s) = &self.heap.get_upvalue(existing).state {
                if *s == stack_slot {
                    return existing;
                }
            }
        }
        let roots = self.roots();
        let upvalue_ref = self.heap.alloc_upvalue(stack_slot, &roots);
        self.open_upvalues.push(upvalue_ref);
        upvalue_ref
    }

    fn close_upvalues(&mut self, from_slot: usize) {
        let mut i = 0;
        while i < self.open_upvalues.len() {
            let upvalue_ref = self.open_upvalues[i];
            let open_slot = match &self.heap.get_upvalue(upvalue_ref).state {
                UpvalueState::Open(s) => Some(*s),
                UpvalueState::Closed(_) => None,
            };
            match open_slot {
                Some(s) if s >= from_slot => {
                    let value = self.stack[s];
                    self.heap.get_upvalue_mut(upvalue_ref).state = UpvalueState::Closed(value);
                    self.open_upvalues.remove(i);
                }
                _ => i += 1,
            }
        }
    }

    // ---- arithmetic ---------------------------------------------------

    fn binary_number_op(&mut self, f: impl Fn(f64, f64) -> Value) -> Result<(), RuntimeError> {
        let b = self.peek(0);
        let a = self.peek(1);
        match (a.as_number(), b.as_number()) {
            (Some(an), Some(bn)) => {
                self.pop();
                self.pop();
                self.push(f(an, bn))
            }
            _ => Err(self.runtime_error("Operands must be numbers.")),
        }
    }

    // ---- dispatch loop -------------------------------------------------

    fn run(&mut self) -> Result<(), RuntimeError> {
        loop {
            let opcode =
                OpCode::from_u8(self.read_u8()).expect("the compiler never emits an invalid opcode byte");
            match opcode {
                OpCode::Constant => {
                    let idx = self.read_u8() as usize;
                    let value = self.read_constant(idx);
                    self.push(value)?;
                }
                OpCode::ConstantLong => {
                    let b0 = self.read_u8() as usize;
                    let b1 = self.read_u8() as usize;
                    let b2 = self.read_u8() as usize;
                    let idx = b0 | (b1 << 8) | (b2 << 16);
                    let value = self.read_constant(idx);
                    self.push(value)?;
                }
                OpCode::Nil => self.push(Value::Nil)?,
                OpCode::True => self.push(Value::Bool(true))?,
                OpCode::False => self.push(Value::Bool(false))?,
                OpCode::Pop => {
                    self.pop();
                }
                OpCode::GetLocal => {
                    let slot = self.read_u8() as usize;
                    let base = self.frames.last().expect("active frame").base;
                    let value = self.stack[base + slot];
                    self.push(value)?;
                }
                OpCode::SetLocal => {
                    let slot = self.read_u8() as usize;
                    let base = self.frames.last().expect("active frame").base;
                    let value = self.peek(0);
                    self.stack[base + slot] = value;
                }
                OpCode::GetGlobal => {
                    let idx = self.read_u8() as usize;
                    let name = self.read_constant(idx).as_string_ref().expect("identifier constant");
                    let hash = self.heap.get_string(name).hash;
                    match self.globals.get(name, hash).copied() {
                        Some(value) => self.push(value)?,
                        None => {
                            let msg = format!("Undefined variable '{}'.", self.heap.get_string(name).as_str());
                            return Err(self.runtime_error(msg));
                        }
                    }
                }
                OpCode::SetGlobal => {
                    let idx = self.read_u8() as usize;
                    let name = self.read_constant(idx).as_string_ref().expect("identifier constant");
                    let hash = self.heap.get_string(name).hash;
                    let value = self.peek(0);
                    if self.globals.set(name, hash, value) {
                        self.globals.delete(name, hash);
                        let msg = format!("Undefined variable '{}'.", self.heap.get_string(name).as_str());
                        return Err(self.runtime_error(msg));
                    }
                }
                OpCode::DefineGlobal => {
                    let idx = self.read_u8() as usize;
                    let name = self.read_constant(idx).as_string_ref().expect("identifier constant");
                    let hash = self.heap.get_string(name).hash;
                    let value = self.peek(0);
                    self.globals.set(name, hash, value);
                    self.pop();
                }
                OpCode::GetUpvalue => {
                    let slot = self.read_u8() as usize;
                    let closure_ref = self.frames.last().expect("active frame").closure;
                    let upvalue_ref = self.heap.get_closure(closure_ref).upvalues[slot];
                    let value = match &self.heap.get_upvalue(upvalue_ref).state {
                        UpvalueState::Open(s) => self.stack[*s],
                        UpvalueState::Closed(v) => *v,
                    };
                    self.push(value)?;
                }
                OpCode::SetUpvalue => {
                    let slot = self.read_u8() as usize;
                    let closure_ref = self.frames.last().expect("active frame").closure;
                    let upvalue_ref = self.heap.get_closure(closure_ref).upvalues[slot];
                    let value = self.peek(0);
                    let open_slot = match &self.heap.get_upvalue(upvalue_ref).state {
                        UpvalueState::Open(s) => Some(*s),
                        UpvalueState::Closed(_) => None,
                    };
                    match open_slot {
                        Some(s) => self.stack[s] = value,
                        None => self.heap.get_upvalue_mut(upvalue_ref).state = UpvalueState::Closed(value),
                    }
                }
                OpCode::GetProperty => {
                    let idx = self.read_u8() as usize;
                    let name = self.read_constant(idx).as_string_ref().expect("identifier constant");
                    let receiver = self.peek(0);
                    let instance_ref = match receiver {
                        Value::Obj(Obj::Instance(r)) => r,
                        _ => return Err(self.runtime_error("Only instances have properties.")),
                    };
                    let hash = self.heap.get_string(name).hash;
                    let field = self.heap.get_instance(instance_ref).fields.get(name, hash).copied();
                    if let Some(value) = field {
                        self.pop();
                        self.push(value)?;
                    } else {
                        let class_ref = self.heap.get_instance(instance_ref).class;
                        self.bind_method(class_ref, name)?;
                    }
                }
                OpCode::SetProperty => {
                    let idx = self.read_u8() as usize;
                    let name = self.read_constant(idx).as_string_ref().expect("identifier constant");
                    let receiver = self.peek(1);
                    let instance_ref = match receiver {
                        Value::Obj(Obj::Instance(r)) => r,
                        _ => return Err(self.runtime_error("Only instances have fields.")),
                    };
                    let hash = self.heap.get_string(name).hash;
                    let value = self.peek(0);
                    self.heap.get_instance_mut(instance_ref).fields.set(name, hash, value);
                    let value = self.pop();
                    self.pop();
                    self.push(value)?;
                }
                OpCode::GetSuper => {
                    let idx = self.read_u8() as usize;
                    let name = self.read_constant(idx).as_string_ref().expect("identifier constant");
                    let superclass = self.pop();
                    let class_ref = match superclass {
                        Value::Obj(Obj::Class(r)) => r,
                        _ => unreachable!("the compiler only emits GET_SUPER with a class on top"),
                    };
                    self.bind_method(class_ref, name)?;
                }
                OpCode::Equal => {
                    let b = self.pop();
                    let a = self.pop();
                    self.push(Value::Bool(a == b))?;
                }
                OpCode::Greater => self.binary_number_op(|a, b| Value::Bool(a > b))?,
                OpCode::Less => self.binary_number_op(|a, b| Value::Bool(a < b))?,
                OpCode::Add => {
                    let b = self.peek(0);
                    let a = self.peek(1);
                    match (a, b) {
                        (Value::Number(an), Value::Number(bn)) => {
                            self.pop();
                            self.pop();
                            self.push(Value::Number(an + bn))?;
                        }
                        (Value::Obj(Obj::Str(ar)), Value::Obj(Obj::Str(br))) => {
                            let mut concatenated = self.heap.get_string(ar).as_str().to_string();
                            concatenated.push_str(self.heap.get_string(br).as_str());
                            self.pop();
                            self.pop();
                            let roots = self.roots();
                            let str_ref = self.heap.intern(&concatenated, &roots);
                            self.push(Value::Obj(Obj::Str(str_ref)))?;
                        }
                        _ => return Err(self.runtime_error("Operands must be two numbers or two strings.")),
                    }
                }
                OpCode::Subtract => self.binary_number_op(|a, b| Value::Number(a - b))?,
                OpCode::Multiply => self.binary_number_op(|a, b| Value::Number(a * b))?,
                OpCode::Divide => self.binary_number_op(|a, b| Value::Number(a / b))?,
                OpCode::Not => {
                    let v = self.pop();
                    self.push(Value::Bool(v.is_falsey()))?;
                }
                OpCode::Negate => {
                    let v = self.peek(0);
                    match v.as_number() {
                        Some(n) => {
                            self.pop();
                            self.push(Value::Number(-n))?;
                        }
                        None => return Err(self.runtime_error("Operand must be a number.")),
                    }
                }
                OpCode::Print => {
                    let v = self.pop();
                    let rendered = self.heap.stringify(&v);
                    if let Err(e) = writeln!(self.stdout, "{rendered}") {
                        return Err(self.runtime_error(format!("I/O error writing output: {e}")));
                    }
                }
                OpCode::Jump => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().expect("active frame").ip += offset;
                }
                OpCode::JumpIfFalse => {
                    let offset = self.read_u16() as usize;
                    if self.peek(0).is_falsey() {
                        self.frames.last_mut().expect("active frame").ip += offset;
                    }
                }
                OpCode::Loop => {
                    let offset = self.read_u16() as usize;
                    self.frames.last_mut().expect("active frame").ip -= offset;
                }
                OpCode::Call => {
                    let arg_count = self.read_u8();
                    let callee = self.peek(arg_count as usize);
                    self.call_value(callee, arg_count)?;
                }
                OpCode::Invoke => {
                    let idx = self.read_u8() as usize;
                    let name = self.read_constant(idx).as_string_ref().expect("identifier constant");
                    let arg_count = self.read_u8();
                    self.invoke(name, arg_count)?;
                }
                OpCode::SuperInvoke => {
                    let idx = self.read_u8() as usize;
                    let name = self.read_constant(idx).as_string_ref().expect("identifier constant");
                    let arg_count = self.read_u8();
                    let superclass = self.pop();
                    let class_ref = match superclass {
                        Value::Obj(Obj::Class(r)) => r,
                        _ => unreachable!("the compiler only emits SUPER_INVOKE with a class on top"),
                    };
                    self.invoke_from_class(class_ref, name, arg_count)?;
                }
                OpCode::Closure => {
                    let idx = self.read_u8() as usize;
                    let function_value = self.read_constant(idx);
                    let function_ref = match function_value {
                        Value::Obj(Obj::Function(r)) => r,
                        _ => unreachable!("CLOSURE's operand is always a function constant"),
                    };
                    let upvalue_count = self.heap.get_function(function_ref).upvalue_count as usize;
                    let mut upvalues = Vec::with_capacity(upvalue_count);
                    for _ in 0..upvalue_count {
                        let is_local = self.read_u8() != 0;
                        let index = self.read_u8() as usize;
                        if is_local {
                            let base = self.frames.last().expect("active frame").base;
                            upvalues.push(self.capture_upvalue(base + index));
                        } else {
                            let enclosing = self.frames.last().expect("active frame").closure;
                            upvalues.push(self.heap.get_closure(enclosing).upvalues[index]);
                        }
                    }
                    let roots = self.roots();
                    let closure_ref = self.heap.alloc_closure(Closure { function: function_ref, upvalues }, &roots);
                    self.push(Value::Obj(Obj::Closure(closure_ref)))?;
                }
                OpCode::CloseUpvalue => {
                    let top = self.stack.len() - 1;
                    self.close_upvalues(top);
                    self.pop();
                }
                OpCode::Return => {
                    let result = self.pop();
                    let base = self.frames.last().expect("active frame").base;
                    self.close_upvalues(base);
                    self.frames.pop();
                    if self.frames.is_empty() {
                        self.pop();
                        return Ok(());
                    }
                    self.stack.truncate(base);
                    self.push(result)?;
                }
                OpCode::Class => {
                    let idx = self.read_u8() as usize;
                    let name = self.read_constant(idx).as_string_ref().expect("identifier constant");
                    let roots = self.roots();
                    let class_ref = self.heap.alloc_class(name, &roots);
                    self.push(Value::Obj(Obj::Class(class_ref)))?;
                }
                OpCode::Inherit => {
                    let superclass_val = self.peek(1);
                    let superclass_ref = match superclass_val {
                        Value::Obj(Obj::Class(r)) => r,
                        _ => return Err(self.runtime_error("Superclass must be a class.")),
                    };
                    let subclass_val = self.peek(0);
                    let subclass_ref = match subclass_val {
                        Value::Obj(Obj::Class(r)) => r,
                        _ => unreachable!("the compiler only emits INHERIT right after a class"),
                    };
                    let methods_copy = self.heap.get_class(superclass_ref).methods.clone();
                    self.heap.get_class_mut(subclass_ref).methods.copy_from(&methods_copy);
                    self.pop();
                }
                OpCode::Method => {
                    let idx = self.read_u8() as usize;
                    let name = self.read_constant(idx).as_string_ref().expect("identifier constant");
                    self.define_method(name);
                }
            }
        }
    }
}
