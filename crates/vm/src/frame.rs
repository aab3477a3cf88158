//! Call frames (spec.md §4.5's "call-frame stack").

use corvid_core::{Closure, ObjRef};

/// One activation record: which closure is running, where execution is
/// within its chunk, and where its stack window begins.
///
/// `base` is the index into the VM's value stack of slot 0 -- the
/// callee itself, serving as the implicit receiver for methods (spec.md
/// §4.5's calling protocol).
pub struct CallFrame {
    pub closure: ObjRef<Closure>,
    pub ip: usize,
    pub base: usize,
}
