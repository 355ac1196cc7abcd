//! Machine stack operations on page 0x0100.
//!
//! The stack pointer is an 8-bit offset into the stack page and wraps
//! modulo 256, exactly as the hardware does. Pushes store first and then
//! decrement; pops increment first and then load. Stack accesses are
//! always direct: they never dispatch to read or write callbacks.

use crate::engine::Core;
use crate::{Mpu, STACK_PAGE};

impl Core {
    pub(crate) fn push_byte(&self, value: u8) {
        self.mem_set(STACK_PAGE + self.s() as u16, value);
        self.set_s(self.s().wrapping_sub(1));
    }

    pub(crate) fn pop_byte(&self) -> u8 {
        self.set_s(self.s().wrapping_add(1));
        self.mem_get(STACK_PAGE + self.s() as u16)
    }

    /// High byte first, so the word reads back little-endian in memory.
    pub(crate) fn push_word(&self, value: u16) {
        self.push_byte((value >> 8) as u8);
        self.push_byte(value as u8);
    }

    pub(crate) fn pop_word(&self) -> u16 {
        let lo = self.pop_byte() as u16;
        let hi = self.pop_byte() as u16;
        lo | hi << 8
    }
}

impl Mpu {
    /// Pushes a byte onto the machine stack.
    pub fn push(&self, value: u8) {
        self.inner.core.push_byte(value);
    }

    /// Pops a byte off the machine stack.
    pub fn pop(&self) -> u8 {
        self.inner.core.pop_byte()
    }

    /// Pushes a 16-bit word, high byte first.
    pub fn pushw(&self, value: u16) {
        self.inner.core.push_word(value);
    }

    /// Pops a 16-bit word pushed by [`pushw`](Self::pushw).
    pub fn popw(&self) -> u16 {
        self.inner.core.pop_word()
    }
}
