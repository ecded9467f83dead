use serde::{Deserialize, Serialize};

use crate::regs::Reg;

pub const OPC_LOAD: u32 = 0x03;
pub const OPC_MISC_MEM: u32 = 0x0f;
pub const OPC_OP_IMM: u32 = 0x13;
pub const OPC_STORE: u32 = 0x23;
pub const OPC_LUI: u32 = 0x37;
pub const OPC_SYSTEM: u32 = 0x73;

pub const F3_ADDI: u32 = 0b000;
pub const F3_CSRRW: u32 = 0b001;
pub const F3_CSRRS: u32 = 0b010;
pub const F3_FENCE_I: u32 = 0b001;

/// `fence iorw, iorw`
pub const FENCE: u32 = 0x0ff0_000f;
pub const FENCE_I: u32 = 0x0000_100f;
pub const EBREAK: u32 = 0x0010_0073;

/// Highest CSR number addressable by the 12-bit CSR field.
pub const CSR_MAX: u16 = 0xFFF;

/// Access width of a load or store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Width {
    Byte = 1,
    Half = 2,
    Word = 4,
    Double = 8,
}

impl Width {
    pub fn bytes(self) -> usize {
        self as usize
    }

    /// funct3 of the load/store encoding.
    pub fn funct3(self) -> u32 {
        match self {
            Width::Byte => 0b000,
            Width::Half => 0b001,
            Width::Word => 0b010,
            Width::Double => 0b011,
        }
    }

    pub fn from_funct3(f3: u32) -> Option<Self> {
        match f3 {
            0b000 => Some(Width::Byte),
            0b001 => Some(Width::Half),
            0b010 => Some(Width::Word),
            0b011 => Some(Width::Double),
            _ => None,
        }
    }

    pub fn from_bytes(bytes: usize) -> Option<Self> {
        match bytes {
            1 => Some(Width::Byte),
            2 => Some(Width::Half),
            4 => Some(Width::Word),
            8 => Some(Width::Double),
            _ => None,
        }
    }

    /// Mask covering the value bits of an access of this width.
    pub fn mask(self) -> u64 {
        match self {
            Width::Double => u64::MAX,
            w => (1u64 << (w.bytes() * 8)) - 1,
        }
    }

    /// Load/store mnemonic suffix (`b`, `h`, `w`, `d`).
    pub fn suffix(self) -> char {
        match self {
            Width::Byte => 'b',
            Width::Half => 'h',
            Width::Word => 'w',
            Width::Double => 'd',
        }
    }
}

/// The instruction forms the program builder emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Insn {
    /// `imm` is the 20-bit upper immediate field.
    Lui { rd: Reg, imm: u32 },
    Addi { rd: Reg, rs1: Reg, imm: i32 },
    Load { width: Width, rd: Reg, rs1: Reg, offset: i32 },
    Store { width: Width, rs2: Reg, rs1: Reg, offset: i32 },
    Csrrw { rd: Reg, rs1: Reg, csr: u16 },
    Csrrs { rd: Reg, rs1: Reg, csr: u16 },
    Fence,
    FenceI,
    Ebreak,
}

#[inline]
fn rix(r: Reg) -> u32 {
    r.index() as u32
}

#[inline]
fn i_type(imm12: i32, rs1: Reg, f3: u32, rd: Reg, opc: u32) -> u32 {
    let imm = (imm12 as u32) & 0xFFF;
    (imm << 20) | (rix(rs1) << 15) | (f3 << 12) | (rix(rd) << 7) | opc
}

#[inline]
fn s_type(imm12: i32, rs2: Reg, rs1: Reg, f3: u32, opc: u32) -> u32 {
    let imm = (imm12 as u32) & 0xFFF;
    let imm_lo = imm & 0x1F;
    let imm_hi = (imm >> 5) & 0x7F;
    (imm_hi << 25) | (rix(rs2) << 20) | (rix(rs1) << 15) | (f3 << 12) | (imm_lo << 7) | opc
}

#[inline]
fn u_type(imm20: u32, rd: Reg, opc: u32) -> u32 {
    ((imm20 & 0xF_FFFF) << 12) | (rix(rd) << 7) | opc
}

#[inline]
fn csr_type(csr: u16, rs1: Reg, f3: u32, rd: Reg) -> u32 {
    ((csr as u32 & 0xFFF) << 20) | (rix(rs1) << 15) | (f3 << 12) | (rix(rd) << 7) | OPC_SYSTEM
}

/// Encodes `insn` into its 32-bit instruction word. Immediates are
/// truncated to their field widths.
pub fn encode(insn: Insn) -> u32 {
    use Insn::*;
    match insn {
        Lui { rd, imm } => u_type(imm, rd, OPC_LUI),
        Addi { rd, rs1, imm } => i_type(imm, rs1, F3_ADDI, rd, OPC_OP_IMM),
        Load {
            width,
            rd,
            rs1,
            offset,
        } => i_type(offset, rs1, width.funct3(), rd, OPC_LOAD),
        Store {
            width,
            rs2,
            rs1,
            offset,
        } => s_type(offset, rs2, rs1, width.funct3(), OPC_STORE),
        Csrrw { rd, rs1, csr } => csr_type(csr, rs1, F3_CSRRW, rd),
        Csrrs { rd, rs1, csr } => csr_type(csr, rs1, F3_CSRRS, rd),
        Fence => FENCE,
        FenceI => FENCE_I,
        Ebreak => EBREAK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_reference_words() {
        assert_eq!(encode(Insn::Lui { rd: Reg::x(5), imm: 2 }), 0x0000_22b7);
        assert_eq!(
            encode(Insn::Load { width: Width::Word, rd: Reg::x(5), rs1: Reg::x(5), offset: 0 }),
            0x0002_a283
        );
        assert_eq!(
            encode(Insn::Store { width: Width::Word, rs2: Reg::x(5), rs1: Reg::S0, offset: 4 }),
            0x0054_2223
        );
        assert_eq!(
            encode(Insn::Addi { rd: Reg::A0, rs1: Reg::A0, imm: -1 }),
            0xfff5_0513
        );
        assert_eq!(
            encode(Insn::Csrrs { rd: Reg::S0, rs1: Reg::ZERO, csr: 0x7b0 }),
            0x7b00_2473
        );
    }
}
