//! The host-facing MPU wrapper.
//!
//! An [`Mpu`] owns one engine core plus the hook tables for it, records
//! itself in the registry at construction, and unregisters on drop.
//! Handlers receive a borrowed `&Mpu` resolved fresh for each dispatch, so
//! a handler never extends the wrapper's lifetime and can freely peek,
//! poke, touch registers, reinstall hooks, or halt the run that invoked
//! it.

use std::rc::Rc;

use crate::engine::Core;
use crate::error::{check_addr, Result};
use crate::hooks::{CallHook, HookTables, ReadHook, WriteHook};
use crate::regs::Status;
use crate::registry;

/// A scriptable MOS 6502 with per-address read, write, and call hooks.
pub struct Mpu {
    pub(crate) inner: Rc<MpuInner>,
}

pub(crate) struct MpuInner {
    pub(crate) core: Core,
    pub(crate) hooks: HookTables,
}

impl Drop for MpuInner {
    fn drop(&mut self) {
        registry::unregister(self.core.id());
    }
}

/// Default handler on the BRK vector target: dump the registers and stop
/// the run, so a stray BRK surfaces instead of spinning.
fn default_brk_hook(mpu: &Mpu, _addr: u16, _inst: u8) -> i32 {
    eprintln!("BRK: {}", mpu.status());
    mpu.halt();
    0
}

impl Mpu {
    /// Creates a core with zeroed registers and memory, the stack pointer
    /// at `0xFF`, and the default BRK handler installed at the (zeroed)
    /// BRK vector target.
    pub fn new() -> Self {
        let inner = Rc::new(MpuInner {
            core: Core::new(),
            hooks: HookTables::new(),
        });
        let id = registry::record(&inner);
        inner.core.bind(id);
        inner.core.set_s(0xFF);
        let mpu = Mpu { inner };
        mpu.inner
            .hooks
            .install_call(&mpu.inner.core, 0x0000, Some(Rc::new(default_brk_hook)));
        mpu
    }

    pub(crate) fn from_inner(inner: Rc<MpuInner>) -> Self {
        Mpu { inner }
    }

    pub(crate) fn core(&self) -> &Core {
        &self.inner.core
    }

    // ------------------------------------------------------------------
    // Execution control
    // ------------------------------------------------------------------

    /// Runs until halted.
    pub fn run(&self) {
        self.core().run();
    }

    /// Runs at most `max_instructions`; returns how many actually ran.
    pub fn run_for(&self, max_instructions: usize) -> usize {
        self.core().run_for(max_instructions)
    }

    /// Executes a single instruction. A no-op while halted.
    pub fn step(&self) {
        self.core().step();
    }

    /// Stops the current (or next) run after the instruction in flight.
    /// Callable from inside a handler.
    pub fn halt(&self) {
        self.core().halt();
    }

    pub fn halted(&self) -> bool {
        self.core().halted()
    }

    /// Zeroes A/X/Y/P, resets S to `0xFF`, loads PC from the reset vector
    /// and clears the halt flag. Memory and hooks are untouched.
    pub fn reset(&self) {
        self.core().reset();
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    /// Snapshot of the register file and halt flag.
    pub fn status(&self) -> Status {
        self.core().status()
    }

    /// One-line register dump, the same text the default BRK handler
    /// prints.
    pub fn dump(&self) -> String {
        self.status().to_string()
    }

    /// Disassembles the instruction at `addr`; returns its text and its
    /// length in bytes.
    pub fn dis(&self, addr: u32) -> Result<(String, u8)> {
        let addr = check_addr(addr)?;
        Ok(self.core().disassemble(addr))
    }

    // ------------------------------------------------------------------
    // Hook installation
    // ------------------------------------------------------------------

    /// Intercepts byte reads at `addr`. The handler's result (truncated
    /// to a byte) is what the CPU sees.
    pub fn on_read(&self, addr: u32, hook: impl Fn(&Mpu, u16) -> i32 + 'static) -> Result<()> {
        let addr = check_addr(addr)?;
        self.inner
            .hooks
            .install_read(self.core(), addr, Some(Rc::new(hook) as ReadHook));
        Ok(())
    }

    /// Intercepts byte writes at `addr`. The backing array is not touched
    /// unless the handler pokes it.
    pub fn on_write(&self, addr: u32, hook: impl Fn(&Mpu, u16, u8) + 'static) -> Result<()> {
        let addr = check_addr(addr)?;
        self.inner
            .hooks
            .install_write(self.core(), addr, Some(Rc::new(hook) as WriteHook));
        Ok(())
    }

    /// Intercepts control transfers (JSR, JMP, BRK) landing on `addr`.
    /// The handler's result becomes the next PC; returning 0 from a JSR
    /// behaves like RTS.
    pub fn on_call(&self, addr: u32, hook: impl Fn(&Mpu, u16, u8) -> i32 + 'static) -> Result<()> {
        let addr = check_addr(addr)?;
        self.inner
            .hooks
            .install_call(self.core(), addr, Some(Rc::new(hook) as CallHook));
        Ok(())
    }

    /// Removes the read hook at `addr`, restoring plain memory access.
    pub fn clear_read(&self, addr: u32) -> Result<()> {
        let addr = check_addr(addr)?;
        self.inner.hooks.install_read(self.core(), addr, None);
        Ok(())
    }

    /// Removes the write hook at `addr`.
    pub fn clear_write(&self, addr: u32) -> Result<()> {
        let addr = check_addr(addr)?;
        self.inner.hooks.install_write(self.core(), addr, None);
        Ok(())
    }

    /// Removes the call hook at `addr`.
    pub fn clear_call(&self, addr: u32) -> Result<()> {
        let addr = check_addr(addr)?;
        self.inner.hooks.install_call(self.core(), addr, None);
        Ok(())
    }
}

impl Default for Mpu {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MpuError;

    #[test]
    fn default_brk_handler_halts_the_run() {
        let mpu = Mpu::new();
        mpu.pokes(0x600, &[0xEA, 0x00], true).unwrap();
        mpu.set_pc(0x600);
        mpu.run();
        assert!(mpu.halted());
    }

    #[test]
    fn hook_installation_validates_the_address() {
        let mpu = Mpu::new();
        assert_eq!(
            mpu.on_read(0x10000, |_, _| 0),
            Err(MpuError::AddressRange(0x10000))
        );
        assert_eq!(mpu.clear_call(0x20000), Err(MpuError::AddressRange(0x20000)));
    }

    #[test]
    fn reset_clears_the_halt_flag() {
        let mpu = Mpu::new();
        mpu.halt();
        assert!(mpu.halted());
        mpu.reset();
        assert!(!mpu.halted());
    }

    #[test]
    fn distinct_mpus_are_isolated() {
        let a = Mpu::new();
        let b = Mpu::new();
        a.poke(0x10, 0xAA, true).unwrap();
        a.on_read(0x20, |_, _| 0x11).unwrap();
        assert_eq!(b.peek(0x10, true).unwrap(), 0);
        assert_eq!(b.peek(0x20, false).unwrap(), 0);
        assert_eq!(a.peek(0x20, false).unwrap(), 0x11);
    }

    #[test]
    fn drop_releases_the_registry_slot() {
        let a = Mpu::new();
        let id = a.core().id();
        drop(a);
        let b = Mpu::new();
        // The slot is reusable and the new handle is distinct.
        assert_ne!(b.core().id(), id);
    }
}
