//! Trampolines between the engine's fixed callback signature and host
//! hooks.
//!
//! The engine only knows how to call a plain `fn(CoreId, u16, u8) -> i32`.
//! Each trampoline resolves the handle back to its wrapper through the
//! registry, pulls the callable out of the hook table for the address, and
//! invokes it with the wrapper itself. The hook table entry is guaranteed
//! to exist whenever the engine slot is occupied; a miss here means the
//! lockstep invariant was broken and is unrecoverable.
//!
//! Setting `M6502_TRACE` in the environment logs every dispatch to stderr.

use std::sync::OnceLock;

use crate::engine::OP_JSR;
use crate::registry::{self, CoreId};

fn tracing() -> bool {
    static ENABLED: OnceLock<bool> = OnceLock::new();
    *ENABLED.get_or_init(|| std::env::var_os("M6502_TRACE").is_some())
}

pub(crate) fn read_trampoline(id: CoreId, addr: u16, _data: u8) -> i32 {
    let mpu = registry::resolve(id);
    let hook = mpu
        .inner
        .hooks
        .read_hook(addr)
        .unwrap_or_else(|| panic!("read dispatch fired with no hook at {addr:#06x}"));
    let result = hook(&mpu, addr);
    if tracing() {
        eprintln!("[m6502-dispatch] read  {addr:#06x} -> {:#04x}", result as u8);
    }
    debug_assert!(
        mpu.inner.hooks.borrow_free() && mpu.inner.core.borrow_free(),
        "host read hook at {addr:#06x} returned with state still borrowed"
    );
    result
}

pub(crate) fn write_trampoline(id: CoreId, addr: u16, data: u8) -> i32 {
    let mpu = registry::resolve(id);
    let hook = mpu
        .inner
        .hooks
        .write_hook(addr)
        .unwrap_or_else(|| panic!("write dispatch fired with no hook at {addr:#06x}"));
    hook(&mpu, addr, data);
    if tracing() {
        eprintln!("[m6502-dispatch] write {addr:#06x} <- {data:#04x}");
    }
    debug_assert!(
        mpu.inner.hooks.borrow_free() && mpu.inner.core.borrow_free(),
        "host write hook at {addr:#06x} returned with state still borrowed"
    );
    0
}

pub(crate) fn call_trampoline(id: CoreId, addr: u16, inst: u8) -> i32 {
    let mpu = registry::resolve(id);
    let hook = mpu
        .inner
        .hooks
        .call_hook(addr)
        .unwrap_or_else(|| panic!("call dispatch fired with no hook at {addr:#06x}"));
    let result = hook(&mpu, addr, inst);
    if tracing() {
        eprintln!(
            "[m6502-dispatch] call  {addr:#06x} inst {inst:#04x} -> {result:#06x}"
        );
    }
    debug_assert!(
        mpu.inner.hooks.borrow_free() && mpu.inner.core.borrow_free(),
        "host call hook at {addr:#06x} returned with state still borrowed"
    );
    // A JSR hook returning 0 means "behave like RTS": unwind the return
    // address the engine pushed and resume after the JSR.
    if inst == OP_JSR && result == 0 {
        return mpu.inner.core.pop_word().wrapping_add(1) as i32;
    }
    result
}
