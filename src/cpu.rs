use std::collections::BTreeMap;

use anyhow::{bail, Error};
use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::decoder::decode;
use crate::encoding::{encode, Insn, Width};
use crate::memory::{Bus, LinearMemory};
use crate::regs::{Reg, GPR_COUNT};
use crate::target::Target;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HartConfig {
    pub xlen: u32,
    pub progbuf_size: usize,
    pub impebreak: bool, // hardware ebreak after the last buffer slot
    pub memory_base: u64,
    pub memory_size: usize,
    pub faults: Faults,
}

impl Default for HartConfig {
    fn default() -> Self {
        Self {
            xlen: 32,
            progbuf_size: 16,
            impebreak: true,
            memory_base: 0,
            memory_size: 64 * 1024,
            faults: Faults::empty(),
        }
    }
}

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Faults: u8 {
const WRITE_BUFFER = 1 << 0;
const READ_BUFFER = 1 << 1;
const EXECUTE = 1 << 2;
const READ_REGISTER = 1 << 3;
const WRITE_REGISTER = 1 << 4;
}
}

#[derive(thiserror::Error, Debug)]
pub enum Trap {
    #[error("Illegal instruction {word:#010x} in slot {slot}")]
    IllegalInstruction { slot: usize, word: u32 },
    #[error("Unaligned {width}-byte access at {addr:#x}")]
    Unaligned { addr: u64, width: usize },
    #[error("Bus error at {addr:#x}: {source}")]
    Bus { addr: u64, #[source] source: Error },
    #[error("Ran off the end of the program buffer")]
    RanOffEnd,
}

enum Flow {
    Next,
    Halt,
}

/// A halted RISC-V hart behind a debug module, with just enough of RV32I /
/// RV64I to run what the program builder emits.
#[derive(Clone)]
pub struct Hart<B: Bus = LinearMemory> {
    pub gpr: [u64; GPR_COUNT],
    pub csr: BTreeMap<u16, u64>,
    pub progbuf: Vec<u32>,
    pub bus: B,
    pub cfg: HartConfig,
    pub executions: usize, // times the buffer was run
    pub fences: usize,
}

impl Hart<LinearMemory> {
    pub fn new(cfg: HartConfig) -> Self {
        let mem = LinearMemory::at(cfg.memory_base, cfg.memory_size);
        Self::with_bus(cfg, mem)
    }
}

impl<B: Bus> Hart<B> {
    pub fn with_bus(cfg: HartConfig, bus: B) -> Self {
        Self {
            gpr: [0; GPR_COUNT],
            csr: BTreeMap::new(),
            // Unwritten slots hold an illegal encoding
            progbuf: vec![u32::MAX; cfg.progbuf_size],
            bus,
            cfg,
            executions: 0,
            fences: 0,
        }
    }

    fn mask(&self, v: u64) -> u64 {
        if self.cfg.xlen == 32 {
            v as u32 as u64
        } else {
            v
        }
    }

    pub fn x(&self, reg: Reg) -> u64 {
        self.gpr[reg.index()]
    }

    pub fn set_x(&mut self, reg: Reg, v: u64) {
        if !reg.is_zero() {
            self.gpr[reg.index()] = self.mask(v);
        }
    }

    pub fn csr(&self, csr: u16) -> u64 {
        self.csr.get(&csr).copied().unwrap_or(0)
    }

    /// Runs the program buffer from slot 0 until `ebreak`, or until the
    /// end of the buffer when the implicit ebreak is present. Returns the
    /// number of instructions retired.
    pub fn run_program_buffer(&mut self) -> Result<usize, Trap> {
        self.executions += 1;
        let mut slot = 0;
        let mut retired = 0;
        loop {
            let Some(&word) = self.progbuf.get(slot) else {
                return if self.cfg.impebreak {
                    Ok(retired)
                } else {
                    Err(Trap::RanOffEnd)
                };
            };
            let insn = decode(word).ok_or(Trap::IllegalInstruction { slot, word })?;
            trace!("hart [{:02x}] {:?}", slot, insn);
            retired += 1;
            match self.exec(slot, insn)? {
                Flow::Next => slot += 1,
                Flow::Halt => return Ok(retired),
            }
        }
    }

    fn effective_addr(&self, base: Reg, offset: i32, width: Width) -> Result<u64, Trap> {
        let addr = self.mask(self.x(base).wrapping_add(offset as i64 as u64));
        if addr % width.bytes() as u64 != 0 {
            return Err(Trap::Unaligned {
                addr,
                width: width.bytes(),
            });
        }
        Ok(addr)
    }

    fn exec(&mut self, slot: usize, insn: Insn) -> Result<Flow, Trap> {
        match insn {
            Insn::Lui { rd, imm } => {
                let v = ((imm << 12) as i32) as i64 as u64;
                self.set_x(rd, v);
            }
            Insn::Addi { rd, rs1, imm } => {
                let v = self.x(rs1).wrapping_add(imm as i64 as u64);
                self.set_x(rd, v);
            }
            Insn::Load {
                width,
                rd,
                rs1,
                offset,
            } => {
                if width == Width::Double && self.cfg.xlen == 32 {
                    return Err(Trap::IllegalInstruction {
                        slot,
                        word: encode(insn),
                    });
                }
                let addr = self.effective_addr(rs1, offset, width)?;
                let v = match width {
                    Width::Byte => self.bus.read_u8(addr).map(|v| v as i8 as i64 as u64),
                    Width::Half => self.bus.read_u16(addr).map(|v| v as i16 as i64 as u64),
                    Width::Word => self.bus.read_u32(addr).map(|v| v as i32 as i64 as u64),
                    Width::Double => self.bus.read_u64(addr),
                }
                .map_err(|source| Trap::Bus { addr, source })?;
                self.set_x(rd, v);
            }
            Insn::Store {
                width,
                rs2,
                rs1,
                offset,
            } => {
                if width == Width::Double && self.cfg.xlen == 32 {
                    return Err(Trap::IllegalInstruction {
                        slot,
                        word: encode(insn),
                    });
                }
                let addr = self.effective_addr(rs1, offset, width)?;
                let v = self.x(rs2);
                match width {
                    Width::Byte => self.bus.write_u8(addr, v as u8),
                    Width::Half => self.bus.write_u16(addr, v as u16),
                    Width::Word => self.bus.write_u32(addr, v as u32),
                    Width::Double => self.bus.write_u64(addr, v),
                }
                .map_err(|source| Trap::Bus { addr, source })?;
            }
            Insn::Csrrw { rd, rs1, csr } => {
                let old = self.csr(csr);
                let new = self.mask(self.x(rs1));
                self.csr.insert(csr, new);
                self.set_x(rd, old);
            }
            Insn::Csrrs { rd, rs1, csr } => {
                let old = self.csr(csr);
                if !rs1.is_zero() {
                    let new = self.mask(old | self.x(rs1));
                    self.csr.insert(csr, new);
                }
                self.set_x(rd, old);
            }
            Insn::Fence | Insn::FenceI => self.fences += 1,
            Insn::Ebreak => return Ok(Flow::Halt),
        }
        Ok(Flow::Next)
    }
}

impl<B: Bus> Target for Hart<B> {
    fn xlen(&self) -> u32 {
        self.cfg.xlen
    }

    fn debug_buffer_size(&self) -> usize {
        self.cfg.progbuf_size
    }

    fn implicit_ebreak(&self) -> bool {
        self.cfg.impebreak
    }

    fn write_debug_buffer(&mut self, index: usize, word: u32) -> anyhow::Result<()> {
        if self.cfg.faults.contains(Faults::WRITE_BUFFER) {
            bail!("progbuf{index} write rejected");
        }
        let Some(slot) = self.progbuf.get_mut(index) else {
            bail!("progbuf{index} does not exist");
        };
        *slot = word;
        Ok(())
    }

    fn read_debug_buffer(&mut self, index: usize) -> anyhow::Result<u32> {
        if self.cfg.faults.contains(Faults::READ_BUFFER) {
            bail!("progbuf{index} read rejected");
        }
        match self.progbuf.get(index) {
            Some(&word) => Ok(word),
            None => bail!("progbuf{index} does not exist"),
        }
    }

    fn execute_debug_buffer(&mut self) -> anyhow::Result<()> {
        if self.cfg.faults.contains(Faults::EXECUTE) {
            bail!("hart did not return to debug mode");
        }
        self.run_program_buffer()?;
        Ok(())
    }

    fn read_register(&mut self, reg: Reg) -> anyhow::Result<u64> {
        if self.cfg.faults.contains(Faults::READ_REGISTER) {
            bail!("abstract command failed reading {reg}");
        }
        Ok(self.x(reg))
    }

    fn write_register(&mut self, reg: Reg, value: u64) -> anyhow::Result<()> {
        if self.cfg.faults.contains(Faults::WRITE_REGISTER) {
            bail!("abstract command failed writing {reg}");
        }
        self.set_x(reg, value);
        Ok(())
    }
}
