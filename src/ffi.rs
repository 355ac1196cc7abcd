//! C ABI for embedding from dynamic-FFI hosts (Ruby Fiddle, Python
//! ctypes, Lua via a thin C shim).
//!
//! The library hands out an opaque `MpuContext` pointer; every call takes
//! it back as the first argument. Host callbacks are plain C function
//! pointers paired with a `user_data` pointer; passing a null function
//! pointer to an `m6502_on_*` installer clears the hook instead.
//!
//! Strings returned by `m6502_dump` and `m6502_status_json` are owned by
//! the caller and must be released with `m6502_free_string`.

use std::ffi::{c_char, c_int, c_uint, c_void, CString};
use std::slice;

use crate::Mpu;

/// Opaque handle wrapping one [`Mpu`].
pub struct MpuContext {
    mpu: Mpu,
}

pub type ReadFn = unsafe extern "C" fn(*mut MpuContext, c_uint, *mut c_void) -> c_int;
pub type WriteFn = unsafe extern "C" fn(*mut MpuContext, c_uint, c_uint, *mut c_void);
pub type CallFn = unsafe extern "C" fn(*mut MpuContext, c_uint, c_uint, *mut c_void) -> c_int;

// ============================================================================
// Lifecycle
// ============================================================================

/// Creates a new MPU. Returns an owned pointer; release with
/// [`m6502_destroy`].
#[no_mangle]
pub extern "C" fn m6502_new() -> *mut MpuContext {
    Box::into_raw(Box::new(MpuContext { mpu: Mpu::new() }))
}

/// Destroys an MPU created with [`m6502_new`].
///
/// # Safety
/// `ctx` must be a pointer returned by `m6502_new` that has not been
/// destroyed, or null.
#[no_mangle]
pub unsafe extern "C" fn m6502_destroy(ctx: *mut MpuContext) {
    if !ctx.is_null() {
        drop(Box::from_raw(ctx));
    }
}

// ============================================================================
// Execution
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn m6502_run(ctx: *mut MpuContext) {
    if let Some(ctx) = ctx.as_ref() {
        ctx.mpu.run();
    }
}

/// Runs at most `max_instructions`; returns how many actually ran.
#[no_mangle]
pub unsafe extern "C" fn m6502_run_for(ctx: *mut MpuContext, max_instructions: usize) -> usize {
    match ctx.as_ref() {
        Some(ctx) => ctx.mpu.run_for(max_instructions),
        None => 0,
    }
}

#[no_mangle]
pub unsafe extern "C" fn m6502_step(ctx: *mut MpuContext) {
    if let Some(ctx) = ctx.as_ref() {
        ctx.mpu.step();
    }
}

#[no_mangle]
pub unsafe extern "C" fn m6502_halt(ctx: *mut MpuContext) {
    if let Some(ctx) = ctx.as_ref() {
        ctx.mpu.halt();
    }
}

#[no_mangle]
pub unsafe extern "C" fn m6502_halted(ctx: *mut MpuContext) -> c_int {
    match ctx.as_ref() {
        Some(ctx) => ctx.mpu.halted() as c_int,
        None => 0,
    }
}

#[no_mangle]
pub unsafe extern "C" fn m6502_reset(ctx: *mut MpuContext) {
    if let Some(ctx) = ctx.as_ref() {
        ctx.mpu.reset();
    }
}

// ============================================================================
// Registers
// ============================================================================

macro_rules! register_accessors {
    ($get:ident, $set:ident, $getter:ident, $setter:ident, $ty:ty) => {
        #[no_mangle]
        pub unsafe extern "C" fn $get(ctx: *mut MpuContext) -> c_uint {
            match ctx.as_ref() {
                Some(ctx) => ctx.mpu.$getter() as c_uint,
                None => 0,
            }
        }

        #[no_mangle]
        pub unsafe extern "C" fn $set(ctx: *mut MpuContext, value: c_uint) {
            if let Some(ctx) = ctx.as_ref() {
                ctx.mpu.$setter(value as $ty);
            }
        }
    };
}

register_accessors!(m6502_get_a, m6502_set_a, a, set_a, u8);
register_accessors!(m6502_get_x, m6502_set_x, x, set_x, u8);
register_accessors!(m6502_get_y, m6502_set_y, y, set_y, u8);
register_accessors!(m6502_get_p, m6502_set_p, p, set_p, u8);
register_accessors!(m6502_get_s, m6502_set_s, s, set_s, u8);
register_accessors!(m6502_get_pc, m6502_set_pc, pc, set_pc, u16);

// ============================================================================
// Memory
// ============================================================================

/// Reads one byte into `out`. Returns 0 on success, -1 on a bad address.
#[no_mangle]
pub unsafe extern "C" fn m6502_peek(
    ctx: *mut MpuContext,
    addr: c_uint,
    direct: c_int,
    out: *mut u8,
) -> c_int {
    let Some(ctx) = ctx.as_ref() else { return -1 };
    if out.is_null() {
        return -1;
    }
    match ctx.mpu.peek(addr, direct != 0) {
        Ok(value) => {
            *out = value;
            0
        }
        Err(_) => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn m6502_poke(
    ctx: *mut MpuContext,
    addr: c_uint,
    value: c_uint,
    direct: c_int,
) -> c_int {
    let Some(ctx) = ctx.as_ref() else { return -1 };
    match ctx.mpu.poke(addr, value as u8, direct != 0) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Reads a little-endian word into `out`. Fails at `0xFFFF`.
#[no_mangle]
pub unsafe extern "C" fn m6502_peekw(
    ctx: *mut MpuContext,
    addr: c_uint,
    direct: c_int,
    out: *mut u16,
) -> c_int {
    let Some(ctx) = ctx.as_ref() else { return -1 };
    if out.is_null() {
        return -1;
    }
    match ctx.mpu.peekw(addr, direct != 0) {
        Ok(value) => {
            *out = value;
            0
        }
        Err(_) => -1,
    }
}

#[no_mangle]
pub unsafe extern "C" fn m6502_pokew(
    ctx: *mut MpuContext,
    addr: c_uint,
    value: c_uint,
    direct: c_int,
) -> c_int {
    let Some(ctx) = ctx.as_ref() else { return -1 };
    match ctx.mpu.pokew(addr, value as u16, direct != 0) {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Copies up to `len` bytes starting at `addr` into `buf`. Returns the
/// number of bytes copied (clipped at the end of memory), or -1 on a bad
/// address.
#[no_mangle]
pub unsafe extern "C" fn m6502_peeks(
    ctx: *mut MpuContext,
    addr: c_uint,
    buf: *mut u8,
    len: usize,
    direct: c_int,
) -> isize {
    let Some(ctx) = ctx.as_ref() else { return -1 };
    if buf.is_null() {
        return -1;
    }
    match ctx.mpu.peeks(addr, len, direct != 0) {
        Ok(bytes) => {
            slice::from_raw_parts_mut(buf, bytes.len()).copy_from_slice(&bytes);
            bytes.len() as isize
        }
        Err(_) => -1,
    }
}

/// Writes `len` bytes from `buf` starting at `addr`. Returns the number
/// of bytes written (clipped at the end of memory), or -1 on a bad
/// address.
#[no_mangle]
pub unsafe extern "C" fn m6502_pokes(
    ctx: *mut MpuContext,
    addr: c_uint,
    buf: *const u8,
    len: usize,
    direct: c_int,
) -> isize {
    let Some(ctx) = ctx.as_ref() else { return -1 };
    if buf.is_null() {
        return -1;
    }
    let data = slice::from_raw_parts(buf, len);
    match ctx.mpu.pokes(addr, data, direct != 0) {
        Ok(written) => written as isize,
        Err(_) => -1,
    }
}

// ============================================================================
// Machine stack
// ============================================================================

#[no_mangle]
pub unsafe extern "C" fn m6502_push(ctx: *mut MpuContext, value: c_uint) {
    if let Some(ctx) = ctx.as_ref() {
        ctx.mpu.push(value as u8);
    }
}

#[no_mangle]
pub unsafe extern "C" fn m6502_pop(ctx: *mut MpuContext) -> c_uint {
    match ctx.as_ref() {
        Some(ctx) => ctx.mpu.pop() as c_uint,
        None => 0,
    }
}

#[no_mangle]
pub unsafe extern "C" fn m6502_pushw(ctx: *mut MpuContext, value: c_uint) {
    if let Some(ctx) = ctx.as_ref() {
        ctx.mpu.pushw(value as u16);
    }
}

#[no_mangle]
pub unsafe extern "C" fn m6502_popw(ctx: *mut MpuContext) -> c_uint {
    match ctx.as_ref() {
        Some(ctx) => ctx.mpu.popw() as c_uint,
        None => 0,
    }
}

// ============================================================================
// Callbacks
// ============================================================================

/// Installs a read callback at `addr`, or clears it when `cb` is null.
/// Returns 0 on success, -1 on a bad address.
#[no_mangle]
pub unsafe extern "C" fn m6502_on_read(
    ctx: *mut MpuContext,
    addr: c_uint,
    cb: Option<ReadFn>,
    user_data: *mut c_void,
) -> c_int {
    let Some(ctx_ref) = ctx.as_ref() else { return -1 };
    let result = match cb {
        Some(cb) => ctx_ref.mpu.on_read(addr, move |_, addr| unsafe {
            cb(ctx, addr as c_uint, user_data)
        }),
        None => ctx_ref.mpu.clear_read(addr),
    };
    match result {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Installs a write callback at `addr`, or clears it when `cb` is null.
#[no_mangle]
pub unsafe extern "C" fn m6502_on_write(
    ctx: *mut MpuContext,
    addr: c_uint,
    cb: Option<WriteFn>,
    user_data: *mut c_void,
) -> c_int {
    let Some(ctx_ref) = ctx.as_ref() else { return -1 };
    let result = match cb {
        Some(cb) => ctx_ref.mpu.on_write(addr, move |_, addr, data| unsafe {
            cb(ctx, addr as c_uint, data as c_uint, user_data)
        }),
        None => ctx_ref.mpu.clear_write(addr),
    };
    match result {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

/// Installs a call callback at `addr`, or clears it when `cb` is null.
#[no_mangle]
pub unsafe extern "C" fn m6502_on_call(
    ctx: *mut MpuContext,
    addr: c_uint,
    cb: Option<CallFn>,
    user_data: *mut c_void,
) -> c_int {
    let Some(ctx_ref) = ctx.as_ref() else { return -1 };
    let result = match cb {
        Some(cb) => ctx_ref.mpu.on_call(addr, move |_, addr, inst| unsafe {
            cb(ctx, addr as c_uint, inst as c_uint, user_data)
        }),
        None => ctx_ref.mpu.clear_call(addr),
    };
    match result {
        Ok(()) => 0,
        Err(_) => -1,
    }
}

// ============================================================================
// Inspection
// ============================================================================

/// Disassembles the instruction at `addr` into `buf` (NUL-terminated).
/// Returns the instruction length in bytes, or -1 when the address is bad
/// or the buffer too small.
#[no_mangle]
pub unsafe extern "C" fn m6502_dis(
    ctx: *mut MpuContext,
    addr: c_uint,
    buf: *mut c_char,
    buf_len: usize,
) -> c_int {
    let Some(ctx) = ctx.as_ref() else { return -1 };
    if buf.is_null() {
        return -1;
    }
    let Ok((text, len)) = ctx.mpu.dis(addr) else { return -1 };
    if text.len() + 1 > buf_len {
        return -1;
    }
    std::ptr::copy_nonoverlapping(text.as_ptr(), buf as *mut u8, text.len());
    *buf.add(text.len()) = 0;
    len as c_int
}

/// One-line register dump. Release with [`m6502_free_string`].
#[no_mangle]
pub unsafe extern "C" fn m6502_dump(ctx: *mut MpuContext) -> *mut c_char {
    match ctx.as_ref() {
        Some(ctx) => CString::new(ctx.mpu.dump()).unwrap().into_raw(),
        None => std::ptr::null_mut(),
    }
}

/// Register snapshot serialized as JSON. Release with
/// [`m6502_free_string`].
#[no_mangle]
pub unsafe extern "C" fn m6502_status_json(ctx: *mut MpuContext) -> *mut c_char {
    let Some(ctx) = ctx.as_ref() else {
        return std::ptr::null_mut();
    };
    match serde_json::to_string(&ctx.mpu.status()) {
        Ok(json) => CString::new(json).unwrap().into_raw(),
        Err(_) => std::ptr::null_mut(),
    }
}

/// Releases a string returned by [`m6502_dump`] or [`m6502_status_json`].
///
/// # Safety
/// `s` must come from one of those functions and not have been freed.
#[no_mangle]
pub unsafe extern "C" fn m6502_free_string(s: *mut c_char) {
    if !s.is_null() {
        drop(CString::from_raw(s));
    }
}

#[cfg(test)]
mod tests {
    use std::ffi::{c_uint, c_void, CStr};

    use super::*;

    #[test]
    fn lifecycle_and_register_round_trip() {
        let ctx = m6502_new();
        unsafe {
            m6502_set_a(ctx, 0x141); // truncates to 8 bits
            assert_eq!(m6502_get_a(ctx), 0x41);
            assert_eq!(m6502_get_s(ctx), 0xFF);
            m6502_destroy(ctx);
        }
    }

    #[test]
    fn peek_poke_report_bad_addresses() {
        let ctx = m6502_new();
        unsafe {
            let mut out = 0u8;
            assert_eq!(m6502_poke(ctx, 0x2000, 0xAB, 1), 0);
            assert_eq!(m6502_peek(ctx, 0x2000, 1, &mut out), 0);
            assert_eq!(out, 0xAB);
            assert_eq!(m6502_peek(ctx, 0x10000, 1, &mut out), -1);
            m6502_destroy(ctx);
        }
    }

    unsafe extern "C" fn fixed_read(
        _ctx: *mut MpuContext,
        _addr: c_uint,
        user_data: *mut c_void,
    ) -> i32 {
        *(user_data as *mut u32) += 1;
        0x5A
    }

    #[test]
    fn read_callback_fires_with_user_data() {
        let ctx = m6502_new();
        let mut hits = 0u32;
        unsafe {
            assert_eq!(
                m6502_on_read(ctx, 0x9000, Some(fixed_read), &mut hits as *mut u32 as *mut c_void),
                0
            );
            let mut out = 0u8;
            assert_eq!(m6502_peek(ctx, 0x9000, 0, &mut out), 0);
            assert_eq!(out, 0x5A);
            assert_eq!(hits, 1);
            // Null function pointer clears the hook.
            assert_eq!(m6502_on_read(ctx, 0x9000, None, std::ptr::null_mut()), 0);
            assert_eq!(m6502_peek(ctx, 0x9000, 0, &mut out), 0);
            assert_eq!(out, 0);
            m6502_destroy(ctx);
        }
    }

    #[test]
    fn program_runs_through_the_c_surface() {
        let ctx = m6502_new();
        unsafe {
            let program = [0xA9u8, 0x07, 0x00];
            assert_eq!(m6502_pokes(ctx, 0x600, program.as_ptr(), program.len(), 1), 3);
            m6502_set_pc(ctx, 0x600);
            m6502_run(ctx);
            assert_eq!(m6502_get_a(ctx), 7);
            assert_eq!(m6502_halted(ctx), 1);
            m6502_destroy(ctx);
        }
    }

    #[test]
    fn dump_and_json_are_caller_owned() {
        let ctx = m6502_new();
        unsafe {
            let dump = m6502_dump(ctx);
            assert!(CStr::from_ptr(dump).to_str().unwrap().contains("SP=01FF"));
            m6502_free_string(dump);
            let json = m6502_status_json(ctx);
            let text = CStr::from_ptr(json).to_str().unwrap();
            assert!(text.contains("\"s\":255"));
            m6502_free_string(json);
            m6502_destroy(ctx);
        }
    }

    #[test]
    fn dis_writes_into_the_caller_buffer() {
        let ctx = m6502_new();
        unsafe {
            let program = [0xA9u8, 0x07];
            m6502_pokes(ctx, 0x600, program.as_ptr(), program.len(), 1);
            let mut buf = [0 as std::ffi::c_char; 32];
            let len = m6502_dis(ctx, 0x600, buf.as_mut_ptr(), buf.len());
            assert_eq!(len, 2);
            assert_eq!(
                CStr::from_ptr(buf.as_ptr()).to_str().unwrap(),
                "LDA #$07"
            );
            m6502_destroy(ctx);
        }
    }
}
