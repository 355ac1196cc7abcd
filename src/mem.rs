//! Host-facing memory accessors.
//!
//! Every accessor takes the address as a `u32` and validates it up front,
//! so out-of-range requests fail before any state changes. The `direct`
//! flag picks between touching the backing array (callbacks bypassed) and
//! routing each byte through the dispatch layer exactly as an executing
//! instruction would.
//!
//! Words are little-endian. A direct word is one two-byte unit; a routed
//! word is two independent byte accesses, low byte first, so per-address
//! hooks fire for each half.

use crate::error::{check_addr, Result};
use crate::{Mpu, MpuError, MEMORY_SIZE};

impl Mpu {
    /// Reads one byte.
    pub fn peek(&self, addr: u32, direct: bool) -> Result<u8> {
        let addr = check_addr(addr)?;
        let core = self.core();
        Ok(if direct { core.mem_get(addr) } else { core.load(addr) })
    }

    /// Writes one byte.
    pub fn poke(&self, addr: u32, value: u8, direct: bool) -> Result<()> {
        let addr = check_addr(addr)?;
        let core = self.core();
        if direct {
            core.mem_set(addr, value);
        } else {
            core.store(addr, value);
        }
        Ok(())
    }

    /// Reads a little-endian word. Fails at `0xFFFF`: the high byte would
    /// fall outside memory.
    pub fn peekw(&self, addr: u32, direct: bool) -> Result<u16> {
        let addr = check_addr(addr)?;
        if addr == 0xFFFF {
            return Err(MpuError::WordAtLastByte);
        }
        let core = self.core();
        Ok(if direct {
            core.direct_word(addr)
        } else {
            core.load(addr) as u16 | (core.load(addr + 1) as u16) << 8
        })
    }

    /// Writes a little-endian word. Fails at `0xFFFF`.
    pub fn pokew(&self, addr: u32, value: u16, direct: bool) -> Result<()> {
        let addr = check_addr(addr)?;
        if addr == 0xFFFF {
            return Err(MpuError::WordAtLastByte);
        }
        let core = self.core();
        if direct {
            core.direct_word_set(addr, value);
        } else {
            core.store(addr, value as u8);
            core.store(addr + 1, (value >> 8) as u8);
        }
        Ok(())
    }

    /// Reads up to `len` bytes starting at `addr`. A range running past
    /// the end of memory is silently clipped; the returned buffer may be
    /// shorter than requested.
    pub fn peeks(&self, addr: u32, len: usize, direct: bool) -> Result<Vec<u8>> {
        let addr = check_addr(addr)?;
        let len = len.min(MEMORY_SIZE - addr as usize);
        let core = self.core();
        if direct {
            Ok(core.copy_out(addr, len))
        } else {
            Ok((0..len).map(|i| core.load(addr + i as u16)).collect())
        }
    }

    /// Writes `data` starting at `addr`, clipping at the end of memory.
    /// Returns the number of bytes actually written.
    pub fn pokes(&self, addr: u32, data: &[u8], direct: bool) -> Result<usize> {
        let addr = check_addr(addr)?;
        let len = data.len().min(MEMORY_SIZE - addr as usize);
        let core = self.core();
        if direct {
            core.copy_in(addr, &data[..len]);
        } else {
            for (i, &byte) in data[..len].iter().enumerate() {
                core.store(addr + i as u16, byte);
            }
        }
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use quickcheck::quickcheck;

    use crate::{Mpu, MpuError};

    #[test]
    fn byte_round_trip() {
        let mpu = Mpu::new();
        mpu.poke(0x1234, 0xAB, true).unwrap();
        assert_eq!(mpu.peek(0x1234, true).unwrap(), 0xAB);
        assert_eq!(mpu.peek(0x1234, false).unwrap(), 0xAB);
    }

    #[test]
    fn out_of_range_address_is_rejected() {
        let mpu = Mpu::new();
        assert_eq!(
            mpu.peek(0x10000, true),
            Err(MpuError::AddressRange(0x10000))
        );
        assert_eq!(
            mpu.poke(0xFFFF_FFFF, 0, false),
            Err(MpuError::AddressRange(0xFFFF_FFFF))
        );
    }

    #[test]
    fn word_is_little_endian() {
        let mpu = Mpu::new();
        mpu.pokew(0x2000, 0x1234, true).unwrap();
        assert_eq!(mpu.peek(0x2000, true).unwrap(), 0x34);
        assert_eq!(mpu.peek(0x2001, true).unwrap(), 0x12);
        assert_eq!(mpu.peekw(0x2000, true).unwrap(), 0x1234);
    }

    #[test]
    fn word_at_last_byte_is_rejected() {
        let mpu = Mpu::new();
        assert_eq!(mpu.peekw(0xFFFF, true), Err(MpuError::WordAtLastByte));
        assert_eq!(mpu.pokew(0xFFFF, 0, true), Err(MpuError::WordAtLastByte));
        // One byte earlier is fine.
        mpu.pokew(0xFFFE, 0xCAFE, true).unwrap();
        assert_eq!(mpu.peekw(0xFFFE, true).unwrap(), 0xCAFE);
    }

    #[test]
    fn routed_word_fires_a_hook_per_byte() {
        let mpu = Mpu::new();
        let hits = Rc::new(Cell::new(0u32));
        for addr in [0x3000u32, 0x3001] {
            let hits = Rc::clone(&hits);
            mpu.on_read(addr, move |_, _| {
                hits.set(hits.get() + 1);
                0x55
            })
            .unwrap();
        }
        assert_eq!(mpu.peekw(0x3000, false).unwrap(), 0x5555);
        assert_eq!(hits.get(), 2);
    }

    #[test]
    fn direct_word_bypasses_hooks() {
        let mpu = Mpu::new();
        mpu.on_read(0x3000, |_, _| panic!("direct access dispatched"))
            .unwrap();
        mpu.pokew(0x3000, 0xBEEF, true).unwrap();
        assert_eq!(mpu.peekw(0x3000, true).unwrap(), 0xBEEF);
    }

    #[test]
    fn ranges_clip_at_the_end_of_memory() {
        let mpu = Mpu::new();
        let written = mpu.pokes(0xFFF0, &[0xAA; 32], true).unwrap();
        assert_eq!(written, 16);
        assert_eq!(mpu.peek(0xFFFF, true).unwrap(), 0xAA);
        let read = mpu.peeks(0xFFF0, 32, true).unwrap();
        assert_eq!(read.len(), 16);
        assert!(read.iter().all(|&b| b == 0xAA));
    }

    #[test]
    fn routed_range_goes_through_hooks_in_ascending_order() {
        let mpu = Mpu::new();
        let order = Rc::new(std::cell::RefCell::new(Vec::new()));
        for addr in 0x4000u32..0x4003 {
            let order = Rc::clone(&order);
            mpu.on_write(addr, move |mpu, addr, data| {
                order.borrow_mut().push(addr);
                mpu.poke(u32::from(addr), data ^ 0xFF, true).unwrap();
            })
            .unwrap();
        }
        mpu.pokes(0x4000, &[1, 2, 3], false).unwrap();
        assert_eq!(*order.borrow(), vec![0x4000, 0x4001, 0x4002]);
        assert_eq!(mpu.peeks(0x4000, 3, true).unwrap(), vec![0xFE, 0xFD, 0xFC]);
    }

    quickcheck! {
        fn direct_byte_round_trips(addr: u16, value: u8) -> bool {
            let mpu = Mpu::new();
            mpu.poke(u32::from(addr), value, true).unwrap();
            mpu.peek(u32::from(addr), true).unwrap() == value
        }

        fn pokes_never_writes_past_the_end(addr: u16, data: Vec<u8>) -> bool {
            let mpu = Mpu::new();
            let written = mpu.pokes(u32::from(addr), &data, true).unwrap();
            written == data.len().min(0x10000 - addr as usize)
        }
    }
}
