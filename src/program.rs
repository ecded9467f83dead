use std::collections::BTreeMap;

use tracing::{error, trace};

use crate::addr::{self, Split};
use crate::buffer::InstructionBuffer;
use crate::disasm::{fmt_insn, fmt_word};
use crate::encoding::{encode, Insn, Width, CSR_MAX};
use crate::error::{Error, Result};
use crate::regs::{Reg, RegSet, TempAllocator};
use crate::target::Target;

/// One program buffer build session.
///
/// Instructions are appended in execution order and never removed. The
/// program is handed to [`crate::exec::execute`] exactly once; every
/// temporary taken with [`allocate`](Self::allocate) must be released before
/// that.
#[derive(Debug, Clone)]
pub struct Program {
    xlen: u32,
    implicit_ebreak: bool,
    buffer: InstructionBuffer,
    temps: TempAllocator,
    writes_memory: bool,
    captured: RegSet,
    inputs: BTreeMap<Reg, u64>,
}

impl Program {
    /// Sizes the program for `target`: buffer capacity, xlen and the
    /// implicit-ebreak convention are read once, here.
    pub fn new<T: Target + ?Sized>(target: &T) -> Self {
        Self::with_capacity(target.xlen(), target.debug_buffer_size())
            .with_implicit_ebreak(target.implicit_ebreak())
    }

    pub fn with_capacity(xlen: u32, capacity: usize) -> Self {
        Self {
            xlen,
            implicit_ebreak: true,
            buffer: InstructionBuffer::new(capacity),
            temps: TempAllocator::new(),
            writes_memory: false,
            captured: RegSet::new(),
            inputs: BTreeMap::new(),
        }
    }

    pub fn with_implicit_ebreak(mut self, implicit: bool) -> Self {
        self.implicit_ebreak = implicit;
        self
    }

    pub fn xlen(&self) -> u32 {
        self.xlen
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buffer.capacity()
    }

    pub fn words(&self) -> &[u32] {
        self.buffer.words()
    }

    pub fn writes_memory(&self) -> bool {
        self.writes_memory
    }

    pub fn is_dirty(&self, reg: Reg) -> bool {
        self.temps.is_dirty(reg)
    }

    pub fn is_allocated(&self, reg: Reg) -> bool {
        self.temps.is_allocated(reg)
    }

    /// Registers saved before and restored after execution.
    pub fn dirty(&self) -> &RegSet {
        self.temps.dirty()
    }

    pub fn captured(&self) -> &RegSet {
        &self.captured
    }

    pub fn inputs(&self) -> &BTreeMap<Reg, u64> {
        &self.inputs
    }

    /// Disassembly of the filled slots, one line per slot.
    pub fn listing(&self) -> Vec<String> {
        self.words()
            .iter()
            .enumerate()
            .map(|(i, w)| format!("{:02x}: {:08x}  {}", i, w, fmt_word(*w)))
            .collect()
    }

    /// Appends an arbitrary instruction and returns its slot.
    pub fn insert(&mut self, insn: Insn) -> Result<usize> {
        let slot = self.buffer.insert(encode(insn)).inspect_err(|_| {
            error!(
                "unable to insert `{}`: {} of {} slots used",
                fmt_insn(&insn),
                self.buffer.len(),
                self.buffer.capacity()
            );
        })?;
        trace!("[{:02x}] {}", slot, fmt_insn(&insn));
        Ok(slot)
    }

    // Temporaries and restore bookkeeping

    pub fn allocate(&mut self) -> Result<Reg> {
        self.temps.allocate()
    }

    pub fn release(&mut self, reg: Reg) {
        self.temps.release(reg);
    }

    /// Restore `reg` after execution.
    pub fn keep_register(&mut self, reg: Reg) {
        self.temps.mark_dirty(reg);
    }

    /// Leave whatever the program wrote into `reg` in place.
    pub fn discard_register(&mut self, reg: Reg) {
        self.temps.mark_clean(reg);
    }

    /// Read `reg` back after execution, before it is restored.
    pub fn capture(&mut self, reg: Reg) {
        self.captured.insert(reg);
    }

    /// Load `value` into `reg` right before execution. The register is
    /// saved first and restored afterwards.
    pub fn set_input(&mut self, reg: Reg, value: u64) {
        assert!(!reg.is_zero(), "x0 cannot carry an input");
        self.inputs.insert(reg, value);
        self.temps.mark_dirty(reg);
    }

    // Primitive forms

    pub fn lui(&mut self, rd: Reg, imm: u32) -> Result<()> {
        self.insert(Insn::Lui { rd, imm })?;
        Ok(())
    }

    pub fn addi(&mut self, rd: Reg, rs1: Reg, imm: i32) -> Result<()> {
        self.insert(Insn::Addi { rd, rs1, imm })?;
        Ok(())
    }

    fn load_upper(&mut self, rd: Reg, split: Split) -> Result<()> {
        if !split.needs_upper() {
            return Ok(());
        }
        self.lui(rd, split.upper_imm())
    }

    /// `l{b,h,w,d} dest, offset(base)`
    pub fn load_relative(&mut self, width: Width, dest: Reg, base: Reg, offset: i32) -> Result<()> {
        self.insert(Insn::Load {
            width,
            rd: dest,
            rs1: base,
            offset,
        })?;
        Ok(())
    }

    /// `s{b,h,w,d} src, offset(base)`
    pub fn store_relative(&mut self, width: Width, src: Reg, base: Reg, offset: i32) -> Result<()> {
        self.writes_memory = true;
        self.insert(Insn::Store {
            width,
            rs2: src,
            rs1: base,
            offset,
        })?;
        Ok(())
    }

    // Absolute accesses

    /// Loads from `addr` into `dest`. When the address needs a `lui`, `dest`
    /// doubles as the base register; otherwise `x0` is the base and `dest`
    /// is only written by the load itself. A load into `x0` borrows a
    /// temporary for the base instead.
    pub fn load(&mut self, width: Width, dest: Reg, addr: u64) -> Result<()> {
        let split = addr::split(addr);
        let (base, borrowed) = match (split.needs_upper(), dest.is_zero()) {
            (false, _) => (Reg::ZERO, false),
            (true, false) => (dest, false),
            (true, true) => (self.allocate()?, true),
        };
        self.load_upper(base, split)?;
        self.load_relative(width, dest, base, split.low)?;
        if borrowed {
            self.release(base);
        }
        Ok(())
    }

    /// Stores `src` to `addr`, borrowing a temporary base register when the
    /// address needs a `lui`.
    pub fn store(&mut self, width: Width, src: Reg, addr: u64) -> Result<()> {
        self.writes_memory = true;
        let split = addr::split(addr);
        let base = if split.needs_upper() {
            self.temps.allocate_except(src)?
        } else {
            Reg::ZERO
        };
        self.load_upper(base, split)?;
        self.store_relative(width, src, base, split.low)?;
        if !base.is_zero() {
            self.release(base);
        }
        Ok(())
    }

    pub fn load_byte(&mut self, dest: Reg, addr: u64) -> Result<()> {
        self.load(Width::Byte, dest, addr)
    }

    pub fn load_half(&mut self, dest: Reg, addr: u64) -> Result<()> {
        self.load(Width::Half, dest, addr)
    }

    pub fn load_word(&mut self, dest: Reg, addr: u64) -> Result<()> {
        self.load(Width::Word, dest, addr)
    }

    pub fn load_double(&mut self, dest: Reg, addr: u64) -> Result<()> {
        self.load(Width::Double, dest, addr)
    }

    pub fn store_byte(&mut self, src: Reg, addr: u64) -> Result<()> {
        self.store(Width::Byte, src, addr)
    }

    pub fn store_half(&mut self, src: Reg, addr: u64) -> Result<()> {
        self.store(Width::Half, src, addr)
    }

    pub fn store_word(&mut self, src: Reg, addr: u64) -> Result<()> {
        self.store(Width::Word, src, addr)
    }

    pub fn store_double(&mut self, src: Reg, addr: u64) -> Result<()> {
        self.store(Width::Double, src, addr)
    }

    /// Access width matching the target's xlen.
    pub fn native_width(&self) -> Result<Width> {
        match self.xlen {
            32 => Ok(Width::Word),
            64 => Ok(Width::Double),
            xlen => {
                error!("unknown xlen {}", xlen);
                Err(Error::UnsupportedWidth { xlen })
            }
        }
    }

    pub fn load_extended(&mut self, dest: Reg, addr: u64) -> Result<()> {
        let width = self.native_width()?;
        self.load(width, dest, addr)
    }

    pub fn store_extended(&mut self, src: Reg, addr: u64) -> Result<()> {
        let width = self.native_width()?;
        self.store(width, src, addr)
    }

    // CSRs

    /// `csrr dest, csr`. Panics if `csr` is outside the 12-bit CSR space.
    pub fn read_csr(&mut self, dest: Reg, csr: u16) -> Result<()> {
        assert!(csr <= CSR_MAX, "csr {csr:#x} out of range");
        self.insert(Insn::Csrrs {
            rd: dest,
            rs1: Reg::ZERO,
            csr,
        })?;
        Ok(())
    }

    /// `csrw csr, src`
    pub fn write_csr(&mut self, src: Reg, csr: u16) -> Result<()> {
        assert!(csr <= CSR_MAX, "csr {csr:#x} out of range");
        self.insert(Insn::Csrrw {
            rd: Reg::ZERO,
            rs1: src,
            csr,
        })?;
        Ok(())
    }

    /// `csrrw dest, csr, src`
    pub fn read_modify_write_csr(&mut self, dest: Reg, src: Reg, csr: u16) -> Result<()> {
        assert!(csr <= CSR_MAX, "csr {csr:#x} out of range");
        self.insert(Insn::Csrrw { rd: dest, rs1: src, csr })?;
        Ok(())
    }

    // Barriers and termination

    pub fn fence(&mut self) -> Result<()> {
        self.insert(Insn::Fence)?;
        Ok(())
    }

    pub fn instruction_fence(&mut self) -> Result<()> {
        self.insert(Insn::FenceI)?;
        Ok(())
    }

    /// Appends `ebreak`, unless the buffer is full and the hardware provides
    /// one right after the last slot.
    pub fn insert_breakpoint(&mut self) -> Result<()> {
        if self.implicit_ebreak && self.buffer.is_full() {
            trace!("buffer full, relying on the implicit ebreak");
            return Ok(());
        }
        self.insert(Insn::Ebreak)?;
        Ok(())
    }

    /// `lui` + `addi`, always both, even for zero. The upper part absorbs the
    /// sign of the low 12 bits so the sum is `value` for anything that fits
    /// in a sign-extended 32-bit immediate.
    pub fn load_immediate(&mut self, dest: Reg, value: i64) -> Result<()> {
        let low = ((value << 52) >> 52) as i32;
        let high = (value.wrapping_sub(low as i64) >> 12) as u32 & 0xF_FFFF;
        self.lui(dest, high)?;
        self.addi(dest, dest, low)
    }

    /// Trailing fence for stores, then the terminating trap.
    pub(crate) fn finalize(&mut self) -> Result<()> {
        if self.writes_memory {
            self.fence()?;
        }
        self.insert_breakpoint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_never_uses_source_as_base() {
        // s0 is in the pool but was never allocated by the caller
        let mut p = Program::with_capacity(32, 8);
        p.store_word(Reg::S0, 0x4000).unwrap();
        match crate::decoder::decode(p.words()[1]) {
            Some(Insn::Store { rs2, rs1, .. }) => {
                assert_eq!(rs2, Reg::S0);
                assert_eq!(rs1, Reg::S1);
            }
            other => panic!("expected a store, got {other:?}"),
        }
        assert!(!p.is_dirty(Reg::S0));
        assert!(p.is_dirty(Reg::S1));
    }
}
