//! Error taxonomy for the host layer.
//!
//! Only caller-recoverable conditions are represented here. Invariant
//! violations (a dispatch firing for an unrecorded handle, a handler found
//! missing where the engine claims one is installed) are bugs and panic
//! instead of returning an error.

use thiserror::Error;

/// Recoverable errors raised by the host-facing API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MpuError {
    /// Address outside the 16-bit memory range.
    #[error("address out of memory range (should be within [0, 0xffff], but got {0:#x})")]
    AddressRange(u32),

    /// Word access at 0xFFFF; a word needs two in-range bytes.
    #[error("cannot read or write a word at the last byte of memory")]
    WordAtLastByte,
}

pub type Result<T> = std::result::Result<T, MpuError>;

/// Validates an incoming address into the 16-bit space.
///
/// Every accessor goes through this before touching any state, so failed
/// accesses are all-or-nothing.
pub(crate) fn check_addr(addr: u32) -> Result<u16> {
    if addr > 0xFFFF {
        Err(MpuError::AddressRange(addr))
    } else {
        Ok(addr as u16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_full_16_bit_range() {
        assert_eq!(check_addr(0), Ok(0));
        assert_eq!(check_addr(0xFFFF), Ok(0xFFFF));
    }

    #[test]
    fn rejects_out_of_range() {
        assert_eq!(check_addr(0x10000), Err(MpuError::AddressRange(0x10000)));
    }

    #[test]
    fn names_the_offending_value() {
        let msg = MpuError::AddressRange(0x12345).to_string();
        assert!(msg.contains("0x12345"));
    }
}
