use std::fmt;

use bitvec::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::error::{Error, Result};

pub const GPR_COUNT: usize = 32;

const ABI_NAMES: [&str; GPR_COUNT] = [
    "zero", "ra", "sp", "gp", "tp", "t0", "t1", "t2", "s0", "s1", "a0", "a1", "a2", "a3", "a4",
    "a5", "a6", "a7", "s2", "s3", "s4", "s5", "s6", "s7", "s8", "s9", "s10", "s11", "t3", "t4",
    "t5", "t6",
];

/// General-purpose register x0..x31.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Reg(u8);

impl Reg {
    pub const ZERO: Reg = Reg(0);
    pub const SP: Reg = Reg(2);
    pub const T0: Reg = Reg(5);
    pub const S0: Reg = Reg(8);
    pub const S1: Reg = Reg(9);
    pub const A0: Reg = Reg(10);
    pub const A1: Reg = Reg(11);
    pub const T6: Reg = Reg(31);

    /// `x{index}`. Panics if `index >= 32`.
    pub const fn x(index: u8) -> Self {
        assert!((index as usize) < GPR_COUNT, "gpr index out of range");
        Reg(index)
    }

    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn abi_name(self) -> &'static str {
        ABI_NAMES[self.index()]
    }
}

impl fmt::Display for Reg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.abi_name())
    }
}

impl TryFrom<u8> for Reg {
    type Error = String;

    fn try_from(index: u8) -> std::result::Result<Self, Self::Error> {
        if (index as usize) < GPR_COUNT {
            Ok(Reg(index))
        } else {
            Err(format!("x{index} is not a general-purpose register"))
        }
    }
}

impl From<Reg> for u8 {
    fn from(reg: Reg) -> u8 {
        reg.0
    }
}

/// Set of general-purpose registers, one bit per register.
#[derive(Clone, PartialEq)]
pub struct RegSet(BitArr!(for GPR_COUNT, in u32, Lsb0));

impl RegSet {
    pub fn new() -> Self {
        Self(BitArray::ZERO)
    }

    pub fn contains(&self, reg: Reg) -> bool {
        self.0[reg.index()]
    }

    pub fn insert(&mut self, reg: Reg) {
        self.0.set(reg.index(), true);
    }

    pub fn remove(&mut self, reg: Reg) {
        self.0.set(reg.index(), false);
    }

    pub fn is_empty(&self) -> bool {
        self.0.not_any()
    }

    pub fn len(&self) -> usize {
        self.0.count_ones()
    }

    /// Members in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = Reg> + '_ {
        self.0.iter_ones().map(|i| Reg(i as u8))
    }
}

impl Default for RegSet {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RegSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl FromIterator<Reg> for RegSet {
    fn from_iter<I: IntoIterator<Item = Reg>>(iter: I) -> Self {
        let mut set = RegSet::new();
        for reg in iter {
            set.insert(reg);
        }
        set
    }
}

/// Scratch register pool plus the program's "needs restore" bookkeeping.
///
/// Temporaries come from `s0..=t6`; `x1..x7` stay out of the pool because
/// the surrounding debugger code depends on them.
#[derive(Debug, Clone, Default)]
pub struct TempAllocator {
    allocated: RegSet,
    dirty: RegSet,
}

impl TempAllocator {
    pub const FIRST: Reg = Reg::S0;
    pub const LAST: Reg = Reg::T6;
    pub const POOL_SIZE: usize = Self::LAST.index() - Self::FIRST.index() + 1;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn pool() -> impl Iterator<Item = Reg> {
        (Self::FIRST.0..=Self::LAST.0).map(Reg)
    }

    /// Hands out the lowest free pool register. It is marked dirty: a
    /// temporary is assumed written once handed out.
    pub fn allocate(&mut self) -> Result<Reg> {
        self.allocate_where(|_| true)
    }

    /// Like [`allocate`](Self::allocate), but never hands out `avoid`, even
    /// when the caller is using it without having allocated it.
    pub fn allocate_except(&mut self, avoid: Reg) -> Result<Reg> {
        self.allocate_where(|r| r != avoid)
    }

    fn allocate_where(&mut self, usable: impl Fn(Reg) -> bool) -> Result<Reg> {
        let Some(reg) = Self::pool().find(|r| usable(*r) && !self.allocated.contains(*r)) else {
            error!("ran out of temporary registers ({} in pool)", Self::POOL_SIZE);
            return Err(Error::ExhaustedRegisters);
        };
        self.allocated.insert(reg);
        self.dirty.insert(reg);
        Ok(reg)
    }

    /// Returns `reg` to the pool. Its dirty flag is left alone.
    pub fn release(&mut self, reg: Reg) {
        self.allocated.remove(reg);
    }

    pub fn mark_dirty(&mut self, reg: Reg) {
        self.dirty.insert(reg);
    }

    pub fn mark_clean(&mut self, reg: Reg) {
        self.dirty.remove(reg);
    }

    pub fn is_allocated(&self, reg: Reg) -> bool {
        self.allocated.contains(reg)
    }

    pub fn is_dirty(&self, reg: Reg) -> bool {
        self.dirty.contains(reg)
    }

    pub fn dirty(&self) -> &RegSet {
        &self.dirty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn abi_names_line_up() {
        assert_eq!(Reg::ZERO.to_string(), "zero");
        assert_eq!(Reg::x(5).to_string(), "t0");
        assert_eq!(Reg::S0.to_string(), "s0");
        assert_eq!(Reg::x(18).to_string(), "s2");
        assert_eq!(Reg::T6.to_string(), "t6");
    }

    #[test]
    fn regset_iterates_ascending() {
        let set: RegSet = [Reg::x(20), Reg::S0, Reg::T6].into_iter().collect();
        let got: Vec<Reg> = set.iter().collect();
        assert_eq!(got, vec![Reg::S0, Reg::x(20), Reg::T6]);
        assert_eq!(set.len(), 3);
    }

    #[test]
    fn reg_rejects_out_of_range_index() {
        assert!(Reg::try_from(32u8).is_err());
        assert_eq!(Reg::try_from(31u8).unwrap(), Reg::T6);
    }
}
