//! Address decomposition for `lui` + base/offset access pairs.
//!
//! The offset keeps 11 bits, not the 12 an I/S-type immediate holds: a
//! 12-bit offset with bit 11 set is sign-extended by the hardware, and the
//! high part is a plain `addr >> 12` with no rounding to compensate. Bit 11 of
//! the address is therefore dropped.

/// Mask applied to the low part of an address.
pub const LOW_MASK: u64 = 0x7FF;

/// An address split into its `lui` part and its offset part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Split {
    pub high: i64,
    pub low: i32,
}

impl Split {
    /// True when a `lui` is needed to form the base register.
    pub fn needs_upper(&self) -> bool {
        self.high != 0
    }

    /// The 20-bit `lui` immediate field for the high part.
    pub fn upper_imm(&self) -> u32 {
        (self.high as u32) & 0xF_FFFF
    }
}

/// Arithmetic shift of the address by 12, matching `lui` sign extension.
pub fn high_part(addr: u64) -> i64 {
    (addr as i64) >> 12
}

/// Low offset bits; zero for non-positive (as signed) addresses.
pub fn low_part(addr: u64) -> i32 {
    if (addr as i64) > 0 {
        (addr & LOW_MASK) as i32
    } else {
        0
    }
}

pub fn split(addr: u64) -> Split {
    Split {
        high: high_part(addr),
        low: low_part(addr),
    }
}
