use std::cell::RefCell;
use std::io;
use std::rc::Rc;

use corvid_core::GcConfig;
use corvid_vm::{RuntimeError, Vm};

/// An in-memory `io::Write` sink that can be read back after the VM
/// that owns it (as a `Box<dyn Write>`) has run.
#[derive(Clone, Default)]
pub struct SharedBuffer(Rc<RefCell<Vec<u8>>>);

impl SharedBuffer {
    pub fn new() -> Self {
        SharedBuffer::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.borrow().clone()).expect("program output is valid UTF-8")
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.borrow_mut().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn run(source: &str) -> Result<String, RuntimeError> {
    run_with_config(source, GcConfig::default())
}

pub fn run_with_config(source: &str, config: GcConfig) -> Result<String, RuntimeError> {
    let buffer = SharedBuffer::new();
    let mut vm = Vm::with_stdout(config, Box::new(buffer.clone()));
    vm.define_native("clock", 0, corvid_vm::native::clock);
    let function = corvid_compiler::compile(source, vm.heap_mut()).expect("test source compiles");
    vm.interpret(function)?;
    Ok(buffer.contents())
}
