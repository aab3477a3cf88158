//! Native (host-provided) functions (spec.md §6).
//!
//! The minimum required native is `clock()`; the CLI registers it (and
//! any others it wants) via [`crate::vm::Vm::define_native`].

use corvid_core::Value;
use std::time::{SystemTime, UNIX_EPOCH};

/// `clock()` -- seconds since the Unix epoch, as a number.
pub fn clock(_args: &[Value]) -> Result<Value, String> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|_| "system clock is before the Unix epoch".to_string())?;
    Ok(Value::Number(now.as_secs_f64()))
}
