//! Register file and the per-register accessor surface.
//!
//! Registers are `Cell`-backed so the engine, the facades, and re-entrant
//! host callbacks can all touch them without holding a borrow across a
//! dispatch. Each register gets an explicit get/set pair; width wrap is
//! enforced by the parameter types (8 bits for A/X/Y/P/S, 16 for PC).

use std::cell::Cell;
use std::fmt;

use serde::Serialize;

use crate::mpu::Mpu;

/// The six-register MOS 6502 register file.
#[derive(Default)]
pub(crate) struct Registers {
    pub a: Cell<u8>,
    pub x: Cell<u8>,
    pub y: Cell<u8>,
    pub p: Cell<u8>,
    pub s: Cell<u8>,
    pub pc: Cell<u16>,
}

impl Registers {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Point-in-time snapshot of the register file, exported to hosts over FFI
/// as JSON and formatted by [`Mpu::dump`](crate::Mpu::dump).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub p: u8,
    pub s: u8,
    pub pc: u16,
    pub halted: bool,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut flags = String::with_capacity(8);
        for (bit, name) in (0..8).rev().zip("NV-BDIZC".chars()) {
            if bit == 5 {
                flags.push('-');
            } else if self.p & (1 << bit) != 0 {
                flags.push(name);
            } else {
                flags.push('.');
            }
        }
        write!(
            f,
            "PC={:04X} SP=01{:02X} A={:02X} X={:02X} Y={:02X} P={:02X} {}",
            self.pc, self.s, self.a, self.x, self.y, self.p, flags
        )
    }
}

impl Mpu {
    pub fn a(&self) -> u8 {
        self.core().regs.a.get()
    }

    pub fn set_a(&self, value: u8) {
        self.core().regs.a.set(value);
    }

    pub fn x(&self) -> u8 {
        self.core().regs.x.get()
    }

    pub fn set_x(&self, value: u8) {
        self.core().regs.x.set(value);
    }

    pub fn y(&self) -> u8 {
        self.core().regs.y.get()
    }

    pub fn set_y(&self, value: u8) {
        self.core().regs.y.set(value);
    }

    pub fn p(&self) -> u8 {
        self.core().regs.p.get()
    }

    pub fn set_p(&self, value: u8) {
        self.core().regs.p.set(value);
    }

    /// The stack pointer. Initialized to `0xFF` by [`Mpu::new`](crate::Mpu::new).
    pub fn s(&self) -> u8 {
        self.core().regs.s.get()
    }

    pub fn set_s(&self, value: u8) {
        self.core().regs.s.set(value);
    }

    /// The program counter. Point it at your program before calling
    /// [`run`](crate::Mpu::run).
    pub fn pc(&self) -> u16 {
        self.core().regs.pc.get()
    }

    pub fn set_pc(&self, value: u16) {
        self.core().regs.pc.set(value);
    }
}
