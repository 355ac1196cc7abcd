//! MOS 6502 execution engine.
//!
//! This is the CPU-emulation collaborator behind [`Mpu`](crate::Mpu): it
//! owns the native machine state (register file, the 65536-byte memory,
//! per-address trampoline slots) and knows nothing about the host. When it
//! reaches an address with an installed trampoline it invokes the fixed
//! function with its own [`CoreId`] and the address; resolving that handle
//! back to a wrapper is the bridge's problem.
//!
//! Dispatch points:
//! - data loads and stores consult the read/write slots (instruction and
//!   operand fetch stay direct, they are part of the instruction stream);
//! - control transfers (JSR, JMP, BRK) consult the call slots at the
//!   transfer target; for BRK the target is the vector stored at 0xFFFE;
//! - a trampoline's return value becomes the byte read or the next PC.
//!
//! The instruction set is a practical subset: loads/stores, transfers,
//! binary-mode arithmetic, logic, shifts and rotates, inc/dec, compares,
//! branches, stack and flag ops, JMP/JSR/RTS/RTI/BRK/NOP. BCD arithmetic
//! is not implemented; the D flag is tracked but ignored. Illegal opcodes
//! halt the core.

use std::cell::{Cell, RefCell};

use crate::hooks::HookKind;
use crate::regs::{Registers, Status};
use crate::registry::CoreId;
use crate::{BRK_VECTOR, MEMORY_SIZE, RESET_VECTOR};

// Status flag bit positions
pub const FLAG_C: u8 = 0;
pub const FLAG_Z: u8 = 1;
pub const FLAG_I: u8 = 2;
pub const FLAG_D: u8 = 3;
pub const FLAG_B: u8 = 4;
pub const FLAG_V: u8 = 6;
pub const FLAG_N: u8 = 7;

pub(crate) const OP_BRK: u8 = 0x00;
pub(crate) const OP_JSR: u8 = 0x20;
const OP_JMP_ABS: u8 = 0x4C;
const OP_JMP_IND: u8 = 0x6C;

/// Fixed native trampoline signature: `(handle, addr, data) -> result`.
/// Reads truncate the result to a byte; calls take it as the next PC.
pub type EngineCallback = fn(CoreId, u16, u8) -> i32;

fn empty_slots() -> RefCell<Box<[Option<EngineCallback>]>> {
    RefCell::new(vec![None; MEMORY_SIZE].into_boxed_slice())
}

/// Engine-side trampoline slots, one array per callback kind. A slot is
/// occupied exactly when the wrapper's hook table holds a callable at the
/// same address.
struct CallbackSlots {
    read: RefCell<Box<[Option<EngineCallback>]>>,
    write: RefCell<Box<[Option<EngineCallback>]>>,
    call: RefCell<Box<[Option<EngineCallback>]>>,
}

impl CallbackSlots {
    fn new() -> Self {
        Self {
            read: empty_slots(),
            write: empty_slots(),
            call: empty_slots(),
        }
    }

    fn table(&self, kind: HookKind) -> &RefCell<Box<[Option<EngineCallback>]>> {
        match kind {
            HookKind::Read => &self.read,
            HookKind::Write => &self.write,
            HookKind::Call => &self.call,
        }
    }
}

/// Native CPU state: the object a [`CoreId`] identifies.
pub struct Core {
    id: Cell<CoreId>,
    pub(crate) regs: Registers,
    mem: RefCell<Vec<u8>>,
    slots: CallbackSlots,
    halted: Cell<bool>,
}

impl Core {
    pub(crate) fn new() -> Self {
        Self {
            id: Cell::new(CoreId::UNBOUND),
            regs: Registers::new(),
            mem: RefCell::new(vec![0; MEMORY_SIZE]),
            slots: CallbackSlots::new(),
            halted: Cell::new(false),
        }
    }

    /// Binds the registry id. Runs once, right after the wrapper records
    /// itself; trampolines must not fire before this.
    pub(crate) fn bind(&self, id: CoreId) {
        self.id.set(id);
    }

    pub(crate) fn id(&self) -> CoreId {
        self.id.get()
    }

    pub(crate) fn set_callback(&self, kind: HookKind, addr: u16, cb: Option<EngineCallback>) {
        self.slots.table(kind).borrow_mut()[addr as usize] = cb;
    }

    fn callback(&self, kind: HookKind, addr: u16) -> Option<EngineCallback> {
        self.slots.table(kind).borrow()[addr as usize]
    }

    // ------------------------------------------------------------------
    // Memory
    // ------------------------------------------------------------------

    /// Direct read of the backing array, bypassing all callbacks.
    pub(crate) fn mem_get(&self, addr: u16) -> u8 {
        self.mem.borrow()[addr as usize]
    }

    /// Direct write to the backing array, bypassing all callbacks.
    pub(crate) fn mem_set(&self, addr: u16, value: u8) {
        self.mem.borrow_mut()[addr as usize] = value;
    }

    /// Direct little-endian word read. Caller guarantees `addr < 0xFFFF`.
    pub(crate) fn direct_word(&self, addr: u16) -> u16 {
        let mem = self.mem.borrow();
        u16::from_le_bytes([mem[addr as usize], mem[addr as usize + 1]])
    }

    pub(crate) fn direct_word_set(&self, addr: u16, value: u16) {
        let mut mem = self.mem.borrow_mut();
        let [lo, hi] = value.to_le_bytes();
        mem[addr as usize] = lo;
        mem[addr as usize + 1] = hi;
    }

    /// Direct bulk copy out of the backing array.
    pub(crate) fn copy_out(&self, addr: u16, len: usize) -> Vec<u8> {
        let mem = self.mem.borrow();
        mem[addr as usize..addr as usize + len].to_vec()
    }

    /// Direct bulk copy into the backing array.
    pub(crate) fn copy_in(&self, addr: u16, data: &[u8]) {
        let mut mem = self.mem.borrow_mut();
        mem[addr as usize..addr as usize + data.len()].copy_from_slice(data);
    }

    /// Routed byte read: dispatches to the installed trampoline, falling
    /// through to the backing array when the slot is empty.
    pub(crate) fn load(&self, addr: u16) -> u8 {
        match self.callback(HookKind::Read, addr) {
            Some(cb) => cb(self.id.get(), addr, 0) as u8,
            None => self.mem_get(addr),
        }
    }

    /// Routed byte write.
    pub(crate) fn store(&self, addr: u16, value: u8) {
        match self.callback(HookKind::Write, addr) {
            Some(cb) => {
                cb(self.id.get(), addr, value);
            }
            None => self.mem_set(addr, value),
        }
    }

    // ------------------------------------------------------------------
    // Register helpers
    // ------------------------------------------------------------------

    fn a(&self) -> u8 {
        self.regs.a.get()
    }

    fn set_a(&self, v: u8) {
        self.regs.a.set(v);
    }

    fn x(&self) -> u8 {
        self.regs.x.get()
    }

    fn set_x(&self, v: u8) {
        self.regs.x.set(v);
    }

    fn y(&self) -> u8 {
        self.regs.y.get()
    }

    fn set_y(&self, v: u8) {
        self.regs.y.set(v);
    }

    fn p(&self) -> u8 {
        self.regs.p.get()
    }

    fn set_p(&self, v: u8) {
        self.regs.p.set(v);
    }

    pub(crate) fn s(&self) -> u8 {
        self.regs.s.get()
    }

    pub(crate) fn set_s(&self, v: u8) {
        self.regs.s.set(v);
    }

    fn pc(&self) -> u16 {
        self.regs.pc.get()
    }

    fn set_pc(&self, v: u16) {
        self.regs.pc.set(v);
    }

    fn flag(&self, flag: u8) -> u8 {
        (self.p() >> flag) & 1
    }

    fn set_flag(&self, flag: u8, value: bool) {
        if value {
            self.set_p(self.p() | 1 << flag);
        } else {
            self.set_p(self.p() & !(1 << flag));
        }
    }

    fn set_nz(&self, value: u8) -> u8 {
        self.set_flag(FLAG_Z, value == 0);
        self.set_flag(FLAG_N, value & 0x80 != 0);
        value
    }

    // ------------------------------------------------------------------
    // Fetch and addressing modes (direct: part of the instruction stream)
    // ------------------------------------------------------------------

    fn fetch_byte(&self) -> u8 {
        let byte = self.mem_get(self.pc());
        self.set_pc(self.pc().wrapping_add(1));
        byte
    }

    fn fetch_word(&self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        lo | hi << 8
    }

    fn addr_zero_page(&self) -> u16 {
        self.fetch_byte() as u16
    }

    fn addr_zero_page_x(&self) -> u16 {
        self.fetch_byte().wrapping_add(self.x()) as u16
    }

    fn addr_absolute(&self) -> u16 {
        self.fetch_word()
    }

    fn addr_absolute_x(&self) -> u16 {
        self.fetch_word().wrapping_add(self.x() as u16)
    }

    fn addr_absolute_y(&self) -> u16 {
        self.fetch_word().wrapping_add(self.y() as u16)
    }

    fn addr_indirect_indexed(&self) -> u16 {
        // (zp),Y
        let ptr = self.fetch_byte();
        let lo = self.mem_get(ptr as u16) as u16;
        let hi = self.mem_get(ptr.wrapping_add(1) as u16) as u16;
        (lo | hi << 8).wrapping_add(self.y() as u16)
    }

    fn addr_indirect(&self) -> u16 {
        // JMP (abs), with the page-boundary quirk: a pointer at xxFF takes
        // its high byte from xx00.
        let ptr = self.fetch_word();
        let lo = self.mem_get(ptr) as u16;
        let hi_addr = if ptr & 0xFF == 0xFF { ptr & 0xFF00 } else { ptr + 1 };
        lo | (self.mem_get(hi_addr) as u16) << 8
    }

    fn addr_relative(&self) -> u16 {
        let offset = self.fetch_byte() as i8 as i16;
        self.pc().wrapping_add(offset as u16)
    }

    // ------------------------------------------------------------------
    // ALU
    // ------------------------------------------------------------------

    fn do_adc(&self, value: u8) {
        let sum = self.a() as u16 + value as u16 + self.flag(FLAG_C) as u16;
        let overflow = (!(self.a() ^ value) & (self.a() ^ sum as u8) & 0x80) != 0;
        self.set_flag(FLAG_C, sum > 0xFF);
        self.set_flag(FLAG_V, overflow);
        self.set_a(self.set_nz(sum as u8));
    }

    fn do_sbc(&self, value: u8) {
        // SBC is ADC with the operand inverted.
        self.do_adc(value ^ 0xFF);
    }

    fn do_cmp(&self, reg: u8, value: u8) {
        self.set_flag(FLAG_C, reg >= value);
        self.set_nz(reg.wrapping_sub(value));
    }

    fn do_asl(&self, value: u8) -> u8 {
        self.set_flag(FLAG_C, value & 0x80 != 0);
        self.set_nz(value << 1)
    }

    fn do_lsr(&self, value: u8) -> u8 {
        self.set_flag(FLAG_C, value & 1 != 0);
        self.set_nz(value >> 1)
    }

    fn do_rol(&self, value: u8) -> u8 {
        let carry = self.flag(FLAG_C);
        self.set_flag(FLAG_C, value & 0x80 != 0);
        self.set_nz(value << 1 | carry)
    }

    fn do_ror(&self, value: u8) -> u8 {
        let carry = self.flag(FLAG_C);
        self.set_flag(FLAG_C, value & 1 != 0);
        self.set_nz(value >> 1 | carry << 7)
    }

    fn branch_if(&self, condition: bool) {
        let target = self.addr_relative();
        if condition {
            self.set_pc(target);
        }
    }

    /// Read-modify-write against a routed address.
    fn modify(&self, addr: u16, op: impl Fn(&Self, u8) -> u8) {
        let value = self.load(addr);
        let result = op(self, value);
        self.store(addr, result);
    }

    // ------------------------------------------------------------------
    // Control transfer dispatch
    // ------------------------------------------------------------------

    /// Jump to `target`, letting an installed call trampoline take over.
    /// The trampoline's return value becomes the next PC.
    fn transfer(&self, target: u16, inst: u8) {
        match self.callback(HookKind::Call, target) {
            Some(cb) => {
                let next = cb(self.id.get(), target, inst);
                self.set_pc(next as u16);
            }
            None => self.set_pc(target),
        }
    }

    // ------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------

    pub(crate) fn halted(&self) -> bool {
        self.halted.get()
    }

    pub(crate) fn halt(&self) {
        self.halted.set(true);
    }

    /// Zeroes A/X/Y/P, resets S to 0xFF and loads PC from the reset vector.
    pub(crate) fn reset(&self) {
        self.set_a(0);
        self.set_x(0);
        self.set_y(0);
        self.set_p(0);
        self.set_s(0xFF);
        self.set_pc(self.direct_word(RESET_VECTOR));
        self.halted.set(false);
    }

    pub(crate) fn status(&self) -> Status {
        Status {
            a: self.a(),
            x: self.x(),
            y: self.y(),
            p: self.p(),
            s: self.s(),
            pc: self.pc(),
            halted: self.halted(),
        }
    }

    /// Runs until something halts the core: the default BRK handler, a
    /// host callback calling [`Mpu::halt`](crate::Mpu::halt), or an
    /// illegal opcode.
    pub(crate) fn run(&self) {
        while !self.halted.get() {
            self.step();
        }
    }

    /// Runs at most `max_instructions`; returns how many actually ran.
    pub(crate) fn run_for(&self, max_instructions: usize) -> usize {
        let mut count = 0;
        while count < max_instructions && !self.halted.get() {
            self.step();
            count += 1;
        }
        count
    }

    /// Executes one instruction.
    pub(crate) fn step(&self) {
        if self.halted.get() {
            return;
        }
        let opcode = self.fetch_byte();
        self.execute(opcode);
    }

    fn execute(&self, opcode: u8) {
        match opcode {
            // LDA
            0xA9 => { let v = self.fetch_byte(); self.set_a(self.set_nz(v)); }
            0xA5 => { let a = self.addr_zero_page(); let v = self.load(a); self.set_a(self.set_nz(v)); }
            0xB5 => { let a = self.addr_zero_page_x(); let v = self.load(a); self.set_a(self.set_nz(v)); }
            0xAD => { let a = self.addr_absolute(); let v = self.load(a); self.set_a(self.set_nz(v)); }
            0xBD => { let a = self.addr_absolute_x(); let v = self.load(a); self.set_a(self.set_nz(v)); }
            0xB9 => { let a = self.addr_absolute_y(); let v = self.load(a); self.set_a(self.set_nz(v)); }
            0xB1 => { let a = self.addr_indirect_indexed(); let v = self.load(a); self.set_a(self.set_nz(v)); }

            // LDX
            0xA2 => { let v = self.fetch_byte(); self.set_x(self.set_nz(v)); }
            0xA6 => { let a = self.addr_zero_page(); let v = self.load(a); self.set_x(self.set_nz(v)); }
            0xAE => { let a = self.addr_absolute(); let v = self.load(a); self.set_x(self.set_nz(v)); }

            // LDY
            0xA0 => { let v = self.fetch_byte(); self.set_y(self.set_nz(v)); }
            0xA4 => { let a = self.addr_zero_page(); let v = self.load(a); self.set_y(self.set_nz(v)); }
            0xAC => { let a = self.addr_absolute(); let v = self.load(a); self.set_y(self.set_nz(v)); }

            // STA
            0x85 => { let a = self.addr_zero_page(); self.store(a, self.a()); }
            0x95 => { let a = self.addr_zero_page_x(); self.store(a, self.a()); }
            0x8D => { let a = self.addr_absolute(); self.store(a, self.a()); }
            0x9D => { let a = self.addr_absolute_x(); self.store(a, self.a()); }
            0x99 => { let a = self.addr_absolute_y(); self.store(a, self.a()); }
            0x91 => { let a = self.addr_indirect_indexed(); self.store(a, self.a()); }

            // STX / STY
            0x86 => { let a = self.addr_zero_page(); self.store(a, self.x()); }
            0x8E => { let a = self.addr_absolute(); self.store(a, self.x()); }
            0x84 => { let a = self.addr_zero_page(); self.store(a, self.y()); }
            0x8C => { let a = self.addr_absolute(); self.store(a, self.y()); }

            // ADC
            0x69 => { let v = self.fetch_byte(); self.do_adc(v); }
            0x65 => { let a = self.addr_zero_page(); let v = self.load(a); self.do_adc(v); }
            0x6D => { let a = self.addr_absolute(); let v = self.load(a); self.do_adc(v); }

            // SBC
            0xE9 => { let v = self.fetch_byte(); self.do_sbc(v); }
            0xE5 => { let a = self.addr_zero_page(); let v = self.load(a); self.do_sbc(v); }
            0xED => { let a = self.addr_absolute(); let v = self.load(a); self.do_sbc(v); }

            // AND / ORA / EOR
            0x29 => { let v = self.fetch_byte(); self.set_a(self.set_nz(self.a() & v)); }
            0x25 => { let a = self.addr_zero_page(); let v = self.load(a); self.set_a(self.set_nz(self.a() & v)); }
            0x2D => { let a = self.addr_absolute(); let v = self.load(a); self.set_a(self.set_nz(self.a() & v)); }
            0x09 => { let v = self.fetch_byte(); self.set_a(self.set_nz(self.a() | v)); }
            0x05 => { let a = self.addr_zero_page(); let v = self.load(a); self.set_a(self.set_nz(self.a() | v)); }
            0x0D => { let a = self.addr_absolute(); let v = self.load(a); self.set_a(self.set_nz(self.a() | v)); }
            0x49 => { let v = self.fetch_byte(); self.set_a(self.set_nz(self.a() ^ v)); }
            0x45 => { let a = self.addr_zero_page(); let v = self.load(a); self.set_a(self.set_nz(self.a() ^ v)); }
            0x4D => { let a = self.addr_absolute(); let v = self.load(a); self.set_a(self.set_nz(self.a() ^ v)); }

            // CMP / CPX / CPY
            0xC9 => { let v = self.fetch_byte(); self.do_cmp(self.a(), v); }
            0xC5 => { let a = self.addr_zero_page(); let v = self.load(a); self.do_cmp(self.a(), v); }
            0xCD => { let a = self.addr_absolute(); let v = self.load(a); self.do_cmp(self.a(), v); }
            0xE0 => { let v = self.fetch_byte(); self.do_cmp(self.x(), v); }
            0xE4 => { let a = self.addr_zero_page(); let v = self.load(a); self.do_cmp(self.x(), v); }
            0xEC => { let a = self.addr_absolute(); let v = self.load(a); self.do_cmp(self.x(), v); }
            0xC0 => { let v = self.fetch_byte(); self.do_cmp(self.y(), v); }
            0xC4 => { let a = self.addr_zero_page(); let v = self.load(a); self.do_cmp(self.y(), v); }
            0xCC => { let a = self.addr_absolute(); let v = self.load(a); self.do_cmp(self.y(), v); }

            // BIT
            0x24 => {
                let a = self.addr_zero_page();
                let v = self.load(a);
                self.set_flag(FLAG_Z, self.a() & v == 0);
                self.set_flag(FLAG_N, v & 0x80 != 0);
                self.set_flag(FLAG_V, v & 0x40 != 0);
            }
            0x2C => {
                let a = self.addr_absolute();
                let v = self.load(a);
                self.set_flag(FLAG_Z, self.a() & v == 0);
                self.set_flag(FLAG_N, v & 0x80 != 0);
                self.set_flag(FLAG_V, v & 0x40 != 0);
            }

            // Register transfers
            0xAA => { let v = self.a(); self.set_x(self.set_nz(v)); }      // TAX
            0x8A => { let v = self.x(); self.set_a(self.set_nz(v)); }      // TXA
            0xA8 => { let v = self.a(); self.set_y(self.set_nz(v)); }      // TAY
            0x98 => { let v = self.y(); self.set_a(self.set_nz(v)); }      // TYA
            0xBA => { let v = self.s(); self.set_x(self.set_nz(v)); }      // TSX
            0x9A => { self.set_s(self.x()); }                              // TXS (no flags)

            // Increment/decrement registers
            0xE8 => { let v = self.x().wrapping_add(1); self.set_x(self.set_nz(v)); } // INX
            0xCA => { let v = self.x().wrapping_sub(1); self.set_x(self.set_nz(v)); } // DEX
            0xC8 => { let v = self.y().wrapping_add(1); self.set_y(self.set_nz(v)); } // INY
            0x88 => { let v = self.y().wrapping_sub(1); self.set_y(self.set_nz(v)); } // DEY

            // Increment/decrement memory
            0xE6 => { let a = self.addr_zero_page(); self.modify(a, |c, v| c.set_nz(v.wrapping_add(1))); }
            0xEE => { let a = self.addr_absolute(); self.modify(a, |c, v| c.set_nz(v.wrapping_add(1))); }
            0xC6 => { let a = self.addr_zero_page(); self.modify(a, |c, v| c.set_nz(v.wrapping_sub(1))); }
            0xCE => { let a = self.addr_absolute(); self.modify(a, |c, v| c.set_nz(v.wrapping_sub(1))); }

            // Shifts and rotates
            0x0A => { let v = self.a(); let r = self.do_asl(v); self.set_a(r); }
            0x06 => { let a = self.addr_zero_page(); self.modify(a, Self::do_asl); }
            0x0E => { let a = self.addr_absolute(); self.modify(a, Self::do_asl); }
            0x4A => { let v = self.a(); let r = self.do_lsr(v); self.set_a(r); }
            0x46 => { let a = self.addr_zero_page(); self.modify(a, Self::do_lsr); }
            0x4E => { let a = self.addr_absolute(); self.modify(a, Self::do_lsr); }
            0x2A => { let v = self.a(); let r = self.do_rol(v); self.set_a(r); }
            0x26 => { let a = self.addr_zero_page(); self.modify(a, Self::do_rol); }
            0x2E => { let a = self.addr_absolute(); self.modify(a, Self::do_rol); }
            0x6A => { let v = self.a(); let r = self.do_ror(v); self.set_a(r); }
            0x66 => { let a = self.addr_zero_page(); self.modify(a, Self::do_ror); }
            0x6E => { let a = self.addr_absolute(); self.modify(a, Self::do_ror); }

            // Branches
            0x10 => { let c = self.flag(FLAG_N) == 0; self.branch_if(c); } // BPL
            0x30 => { let c = self.flag(FLAG_N) == 1; self.branch_if(c); } // BMI
            0x50 => { let c = self.flag(FLAG_V) == 0; self.branch_if(c); } // BVC
            0x70 => { let c = self.flag(FLAG_V) == 1; self.branch_if(c); } // BVS
            0x90 => { let c = self.flag(FLAG_C) == 0; self.branch_if(c); } // BCC
            0xB0 => { let c = self.flag(FLAG_C) == 1; self.branch_if(c); } // BCS
            0xD0 => { let c = self.flag(FLAG_Z) == 0; self.branch_if(c); } // BNE
            0xF0 => { let c = self.flag(FLAG_Z) == 1; self.branch_if(c); } // BEQ

            // Jumps and subroutines
            OP_JMP_ABS => { let t = self.addr_absolute(); self.transfer(t, OP_JMP_ABS); }
            OP_JMP_IND => { let t = self.addr_indirect(); self.transfer(t, OP_JMP_IND); }
            OP_JSR => {
                let target = self.addr_absolute();
                // JSR pushes the address of its own last byte.
                self.push_word(self.pc().wrapping_sub(1));
                self.transfer(target, OP_JSR);
            }
            0x60 => { let ret = self.pop_word(); self.set_pc(ret.wrapping_add(1)); } // RTS
            0x40 => {
                // RTI
                let p = self.pop_byte() | 0x20;
                self.set_p(p);
                let pc = self.pop_word();
                self.set_pc(pc);
            }
            OP_BRK => {
                // Architectural state push, then transfer through the
                // vector; an installed call trampoline at the vector
                // target takes over.
                self.set_pc(self.pc().wrapping_add(1)); // BRK skips a byte
                self.push_word(self.pc());
                self.push_byte(self.p() | 0x10);
                self.set_flag(FLAG_I, true);
                let vector = self.direct_word(BRK_VECTOR);
                self.transfer(vector, OP_BRK);
            }

            // Stack ops
            0x48 => { self.push_byte(self.a()); }                              // PHA
            0x68 => { let v = self.pop_byte(); self.set_a(self.set_nz(v)); }   // PLA
            0x08 => { self.push_byte(self.p() | 0x10); }                       // PHP
            0x28 => { let v = self.pop_byte() | 0x20; self.set_p(v); }         // PLP

            // Flag ops
            0x18 => self.set_flag(FLAG_C, false),
            0x38 => self.set_flag(FLAG_C, true),
            0x58 => self.set_flag(FLAG_I, false),
            0x78 => self.set_flag(FLAG_I, true),
            0xB8 => self.set_flag(FLAG_V, false),
            0xD8 => self.set_flag(FLAG_D, false),
            0xF8 => self.set_flag(FLAG_D, true),

            // NOP
            0xEA => {}

            // Anything else halts the core.
            _ => self.halted.set(true),
        }
    }

    // ------------------------------------------------------------------
    // Disassembly
    // ------------------------------------------------------------------

    /// Disassembles the instruction at `addr` (direct reads only) and
    /// returns its text plus its length in bytes. Unknown opcodes render
    /// as `.DB $xx`.
    pub(crate) fn disassemble(&self, addr: u16) -> (String, u8) {
        let opcode = self.mem_get(addr);
        let Some((mnemonic, mode)) = opcode_info(opcode) else {
            return (format!(".DB ${opcode:02X}"), 1);
        };
        let b1 = self.mem_get(addr.wrapping_add(1));
        let b2 = self.mem_get(addr.wrapping_add(2));
        let w = b1 as u16 | (b2 as u16) << 8;
        let (operand, len) = match mode {
            Mode::Imp => (String::new(), 1),
            Mode::Acc => (" A".to_string(), 1),
            Mode::Imm => (format!(" #${b1:02X}"), 2),
            Mode::Zp => (format!(" ${b1:02X}"), 2),
            Mode::ZpX => (format!(" ${b1:02X},X"), 2),
            Mode::Abs => (format!(" ${w:04X}"), 3),
            Mode::AbsX => (format!(" ${w:04X},X"), 3),
            Mode::AbsY => (format!(" ${w:04X},Y"), 3),
            Mode::IndY => (format!(" (${b1:02X}),Y"), 2),
            Mode::Ind => (format!(" (${w:04X})"), 3),
            Mode::Rel => {
                let target = addr.wrapping_add(2).wrapping_add(b1 as i8 as i16 as u16);
                (format!(" ${target:04X}"), 2)
            }
        };
        (format!("{mnemonic}{operand}"), len)
    }

    /// True when no interior state is left borrowed; checked by the bridge
    /// after every host callback returns.
    #[cfg(debug_assertions)]
    pub(crate) fn borrow_free(&self) -> bool {
        self.mem.try_borrow_mut().is_ok()
            && self.slots.read.try_borrow_mut().is_ok()
            && self.slots.write.try_borrow_mut().is_ok()
            && self.slots.call.try_borrow_mut().is_ok()
    }
}

#[derive(Clone, Copy)]
enum Mode {
    Imp,
    Acc,
    Imm,
    Zp,
    ZpX,
    Abs,
    AbsX,
    AbsY,
    IndY,
    Ind,
    Rel,
}

fn opcode_info(opcode: u8) -> Option<(&'static str, Mode)> {
    use Mode::*;
    Some(match opcode {
        0xA9 => ("LDA", Imm),
        0xA5 => ("LDA", Zp),
        0xB5 => ("LDA", ZpX),
        0xAD => ("LDA", Abs),
        0xBD => ("LDA", AbsX),
        0xB9 => ("LDA", AbsY),
        0xB1 => ("LDA", IndY),
        0xA2 => ("LDX", Imm),
        0xA6 => ("LDX", Zp),
        0xAE => ("LDX", Abs),
        0xA0 => ("LDY", Imm),
        0xA4 => ("LDY", Zp),
        0xAC => ("LDY", Abs),
        0x85 => ("STA", Zp),
        0x95 => ("STA", ZpX),
        0x8D => ("STA", Abs),
        0x9D => ("STA", AbsX),
        0x99 => ("STA", AbsY),
        0x91 => ("STA", IndY),
        0x86 => ("STX", Zp),
        0x8E => ("STX", Abs),
        0x84 => ("STY", Zp),
        0x8C => ("STY", Abs),
        0x69 => ("ADC", Imm),
        0x65 => ("ADC", Zp),
        0x6D => ("ADC", Abs),
        0xE9 => ("SBC", Imm),
        0xE5 => ("SBC", Zp),
        0xED => ("SBC", Abs),
        0x29 => ("AND", Imm),
        0x25 => ("AND", Zp),
        0x2D => ("AND", Abs),
        0x09 => ("ORA", Imm),
        0x05 => ("ORA", Zp),
        0x0D => ("ORA", Abs),
        0x49 => ("EOR", Imm),
        0x45 => ("EOR", Zp),
        0x4D => ("EOR", Abs),
        0xC9 => ("CMP", Imm),
        0xC5 => ("CMP", Zp),
        0xCD => ("CMP", Abs),
        0xE0 => ("CPX", Imm),
        0xE4 => ("CPX", Zp),
        0xEC => ("CPX", Abs),
        0xC0 => ("CPY", Imm),
        0xC4 => ("CPY", Zp),
        0xCC => ("CPY", Abs),
        0x24 => ("BIT", Zp),
        0x2C => ("BIT", Abs),
        0xAA => ("TAX", Imp),
        0x8A => ("TXA", Imp),
        0xA8 => ("TAY", Imp),
        0x98 => ("TYA", Imp),
        0xBA => ("TSX", Imp),
        0x9A => ("TXS", Imp),
        0xE8 => ("INX", Imp),
        0xCA => ("DEX", Imp),
        0xC8 => ("INY", Imp),
        0x88 => ("DEY", Imp),
        0xE6 => ("INC", Zp),
        0xEE => ("INC", Abs),
        0xC6 => ("DEC", Zp),
        0xCE => ("DEC", Abs),
        0x0A => ("ASL", Acc),
        0x06 => ("ASL", Zp),
        0x0E => ("ASL", Abs),
        0x4A => ("LSR", Acc),
        0x46 => ("LSR", Zp),
        0x4E => ("LSR", Abs),
        0x2A => ("ROL", Acc),
        0x26 => ("ROL", Zp),
        0x2E => ("ROL", Abs),
        0x6A => ("ROR", Acc),
        0x66 => ("ROR", Zp),
        0x6E => ("ROR", Abs),
        0x10 => ("BPL", Rel),
        0x30 => ("BMI", Rel),
        0x50 => ("BVC", Rel),
        0x70 => ("BVS", Rel),
        0x90 => ("BCC", Rel),
        0xB0 => ("BCS", Rel),
        0xD0 => ("BNE", Rel),
        0xF0 => ("BEQ", Rel),
        0x4C => ("JMP", Abs),
        0x6C => ("JMP", Ind),
        0x20 => ("JSR", Abs),
        0x60 => ("RTS", Imp),
        0x40 => ("RTI", Imp),
        0x00 => ("BRK", Imp),
        0x48 => ("PHA", Imp),
        0x68 => ("PLA", Imp),
        0x08 => ("PHP", Imp),
        0x28 => ("PLP", Imp),
        0x18 => ("CLC", Imp),
        0x38 => ("SEC", Imp),
        0x58 => ("CLI", Imp),
        0x78 => ("SEI", Imp),
        0xB8 => ("CLV", Imp),
        0xD8 => ("CLD", Imp),
        0xF8 => ("SED", Imp),
        0xEA => ("NOP", Imp),
        _ => return None,
    })
}
