use std::ops::Range;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

pub trait Bus {
    fn read_u8(&mut self, addr: u64) -> Result<u8>;
    fn read_u16(&mut self, addr: u64) -> Result<u16>;
    fn read_u32(&mut self, addr: u64) -> Result<u32>;
    fn read_u64(&mut self, addr: u64) -> Result<u64>;
    fn write_u8(&mut self, addr: u64, val: u8) -> Result<()>;
    fn write_u16(&mut self, addr: u64, val: u16) -> Result<()>;
    fn write_u32(&mut self, addr: u64, val: u32) -> Result<()>;
    fn write_u64(&mut self, addr: u64, val: u64) -> Result<()>;
}

/// Little-endian RAM mapped at `base`.
#[derive(Clone, Serialize, Deserialize)]
pub struct LinearMemory {
    pub mem: Vec<u8>,
    pub base: u64,
}

impl LinearMemory {
    pub fn at(base: u64, size: usize) -> Self {
        Self {
            mem: vec![0; size],
            base,
        }
    }

    fn span(&self, addr: u64, len: usize) -> Result<Range<usize>> {
        let off = addr.wrapping_sub(self.base);
        ensure!(
            addr >= self.base && off.saturating_add(len as u64) <= self.mem.len() as u64,
            "{len}-byte access at {addr:#x} outside [{:#x}, {:#x})",
            self.base,
            self.base.wrapping_add(self.mem.len() as u64)
        );
        let off = off as usize;
        Ok(off..off + len)
    }

    fn load<const N: usize>(&self, addr: u64) -> Result<[u8; N]> {
        let span = self.span(addr, N)?;
        let mut bytes = [0u8; N];
        bytes.copy_from_slice(&self.mem[span]);
        Ok(bytes)
    }

    fn store(&mut self, addr: u64, bytes: &[u8]) -> Result<()> {
        let span = self.span(addr, bytes.len())?;
        self.mem[span].copy_from_slice(bytes);
        Ok(())
    }
}

impl Bus for LinearMemory {
    fn read_u8(&mut self, addr: u64) -> Result<u8> {
        Ok(self.load::<1>(addr)?[0])
    }
    fn read_u16(&mut self, addr: u64) -> Result<u16> {
        Ok(u16::from_le_bytes(self.load(addr)?))
    }
    fn read_u32(&mut self, addr: u64) -> Result<u32> {
        Ok(u32::from_le_bytes(self.load(addr)?))
    }
    fn read_u64(&mut self, addr: u64) -> Result<u64> {
        Ok(u64::from_le_bytes(self.load(addr)?))
    }
    fn write_u8(&mut self, addr: u64, val: u8) -> Result<()> {
        self.store(addr, &[val])
    }
    fn write_u16(&mut self, addr: u64, val: u16) -> Result<()> {
        self.store(addr, &val.to_le_bytes())
    }
    fn write_u32(&mut self, addr: u64, val: u32) -> Result<()> {
        self.store(addr, &val.to_le_bytes())
    }
    fn write_u64(&mut self, addr: u64, val: u64) -> Result<()> {
        self.store(addr, &val.to_le_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn high_mapped_access_and_bounds() {
        let mut mem = LinearMemory::at(0x8000_0000, 16);
        mem.write_u32(0x8000_0004, 0xdead_beef).unwrap();
        assert_eq!(mem.read_u16(0x8000_0006).unwrap(), 0xdead);
        assert!(mem.read_u8(0x7fff_ffff).is_err());
        assert!(mem.read_u64(0x8000_000c).is_err());
        assert!(mem.write_u64(0x8000_0008, 1).is_ok());
    }
}
