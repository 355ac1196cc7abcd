//! Per-address callback tables.
//!
//! One fixed 65536-entry table per callback kind (read/write/call), giving
//! O(1) lookup over the whole 16-bit address space. A table entry always
//! moves together with the matching engine-side trampoline slot: install
//! sets both, clear drops both, never one without the other. An empty
//! entry means the access falls through to the backing memory array.

use std::cell::RefCell;
use std::rc::Rc;

use crate::bridge;
use crate::engine::Core;
use crate::mpu::Mpu;
use crate::MEMORY_SIZE;

/// Host handler for an intercepted read: `(mpu, addr) -> byte`. The result
/// is truncated to a byte by the engine.
pub type ReadHook = Rc<dyn Fn(&Mpu, u16) -> i32>;

/// Host handler for an intercepted write: `(mpu, addr, data)`.
pub type WriteHook = Rc<dyn Fn(&Mpu, u16, u8)>;

/// Host handler for an intercepted control transfer:
/// `(mpu, addr, instruction) -> next pc` (0 from a JSR means "return to
/// the caller").
pub type CallHook = Rc<dyn Fn(&Mpu, u16, u8) -> i32>;

/// The three kinds of per-address interception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookKind {
    Read,
    Write,
    Call,
}

fn empty_table<T: Clone>() -> RefCell<Box<[Option<T>]>> {
    RefCell::new(vec![None; MEMORY_SIZE].into_boxed_slice())
}

pub(crate) struct HookTables {
    read: RefCell<Box<[Option<ReadHook>]>>,
    write: RefCell<Box<[Option<WriteHook>]>>,
    call: RefCell<Box<[Option<CallHook>]>>,
}

impl HookTables {
    pub fn new() -> Self {
        Self {
            read: empty_table(),
            write: empty_table(),
            call: empty_table(),
        }
    }

    pub fn read_hook(&self, addr: u16) -> Option<ReadHook> {
        self.read.borrow()[addr as usize].clone()
    }

    pub fn write_hook(&self, addr: u16) -> Option<WriteHook> {
        self.write.borrow()[addr as usize].clone()
    }

    pub fn call_hook(&self, addr: u16) -> Option<CallHook> {
        self.call.borrow()[addr as usize].clone()
    }

    /// Installs or clears the read hook at `addr`, keeping the engine-side
    /// trampoline slot in lockstep. Replacing a hook releases the previous
    /// callable before the new one goes in.
    pub fn install_read(&self, core: &Core, addr: u16, hook: Option<ReadHook>) {
        let mut table = self.read.borrow_mut();
        table[addr as usize] = None;
        core.set_callback(HookKind::Read, addr, None);
        if let Some(hook) = hook {
            table[addr as usize] = Some(hook);
            core.set_callback(HookKind::Read, addr, Some(bridge::read_trampoline));
        }
    }

    pub fn install_write(&self, core: &Core, addr: u16, hook: Option<WriteHook>) {
        let mut table = self.write.borrow_mut();
        table[addr as usize] = None;
        core.set_callback(HookKind::Write, addr, None);
        if let Some(hook) = hook {
            table[addr as usize] = Some(hook);
            core.set_callback(HookKind::Write, addr, Some(bridge::write_trampoline));
        }
    }

    pub fn install_call(&self, core: &Core, addr: u16, hook: Option<CallHook>) {
        let mut table = self.call.borrow_mut();
        table[addr as usize] = None;
        core.set_callback(HookKind::Call, addr, None);
        if let Some(hook) = hook {
            table[addr as usize] = Some(hook);
            core.set_callback(HookKind::Call, addr, Some(bridge::call_trampoline));
        }
    }

    /// True when no table is left borrowed; checked by the bridge after
    /// every host callback returns.
    #[cfg(debug_assertions)]
    pub fn borrow_free(&self) -> bool {
        self.read.try_borrow_mut().is_ok()
            && self.write.try_borrow_mut().is_ok()
            && self.call.try_borrow_mut().is_ok()
    }
}
