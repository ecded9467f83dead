use crate::encoding::{
    Insn, Width, EBREAK, F3_ADDI, F3_CSRRS, F3_CSRRW, F3_FENCE_I, OPC_LOAD, OPC_LUI, OPC_MISC_MEM,
    OPC_OP_IMM, OPC_STORE, OPC_SYSTEM,
};
use crate::regs::Reg;

#[inline]
fn reg(raw: u32, lsb: u32) -> Reg {
    Reg::x(((raw >> lsb) & 0x1F) as u8)
}

/// Decodes the subset of RV32I/RV64I that [`crate::encoding::encode`]
/// produces. Anything else is `None`.
pub fn decode(raw: u32) -> Option<Insn> {
    let opc = raw & 0x7F;
    let f3 = (raw >> 12) & 0x7;
    let rd = reg(raw, 7);
    let rs1 = reg(raw, 15);
    let rs2 = reg(raw, 20);
    // I-type immediate, sign-extended from bit 31
    let imm_i = (raw as i32) >> 20;
    let imm_s = (((raw as i32) >> 25) << 5) | ((raw >> 7) & 0x1F) as i32;

    match opc {
        OPC_LUI => Some(Insn::Lui { rd, imm: raw >> 12 }),
        OPC_OP_IMM if f3 == F3_ADDI => Some(Insn::Addi { rd, rs1, imm: imm_i }),
        OPC_LOAD => Width::from_funct3(f3).map(|width| Insn::Load {
            width,
            rd,
            rs1,
            offset: imm_i,
        }),
        OPC_STORE => Width::from_funct3(f3).map(|width| Insn::Store {
            width,
            rs2,
            rs1,
            offset: imm_s,
        }),
        OPC_MISC_MEM if f3 == 0 => Some(Insn::Fence),
        OPC_MISC_MEM if f3 == F3_FENCE_I => Some(Insn::FenceI),
        OPC_SYSTEM if raw == EBREAK => Some(Insn::Ebreak),
        OPC_SYSTEM => {
            let csr = (raw >> 20) as u16;
            match f3 {
                F3_CSRRW => Some(Insn::Csrrw { rd, rs1, csr }),
                F3_CSRRS => Some(Insn::Csrrs { rd, rs1, csr }),
                _ => None,
            }
        }
        _ => None,
    }
}
