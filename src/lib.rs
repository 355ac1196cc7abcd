//! Scriptable MOS 6502 host layer.
//!
//! Wraps a 6502 execution core in per-address dispatch: any of the 65536
//! addresses can carry a read, write, and call hook, and an installed hook
//! takes over that access while every other address behaves like plain
//! memory. Handlers get the owning [`Mpu`] back, so they can inspect
//! registers, peek and poke memory, reinstall hooks, or halt the run that
//! invoked them.
//!
//! ```
//! use m6502_host::Mpu;
//!
//! let mpu = Mpu::new();
//! mpu.pokes(0x600, &[0xA9, 0x07, 0x00], true).unwrap(); // LDA #$07; BRK
//! mpu.set_pc(0x600);
//! mpu.run();
//! assert_eq!(mpu.a(), 7);
//! assert!(mpu.halted());
//! ```
//!
//! A C ABI mirroring the Rust surface lives in [`ffi`] for dynamic-FFI
//! hosts; build with `crate-type = ["cdylib"]` and drive it from Fiddle,
//! ctypes, or a Lua shim.

mod bridge;
mod engine;
mod error;
pub mod ffi;
mod hooks;
mod mem;
mod mpu;
mod regs;
mod registry;
mod stack;

pub use error::{MpuError, Result};
pub use hooks::{CallHook, HookKind, ReadHook, WriteHook};
pub use mpu::Mpu;
pub use regs::Status;

/// Size of the flat address space.
pub const MEMORY_SIZE: usize = 0x10000;

/// Base of the machine stack page.
pub const STACK_PAGE: u16 = 0x0100;

/// Reset vector location, read by [`Mpu::reset`].
pub const RESET_VECTOR: u16 = 0xFFFC;

/// BRK/IRQ vector location, read when a BRK dispatches.
pub const BRK_VECTOR: u16 = 0xFFFE;
