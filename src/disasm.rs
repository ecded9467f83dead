use crate::decoder::decode;
use crate::encoding::Insn;

pub fn fmt_insn(insn: &Insn) -> String {
    match *insn {
        Insn::Lui { rd, imm } => format!("lui {}, {:#x}", rd, imm),
        Insn::Addi { rd, rs1, imm } => format!("addi {}, {}, {}", rd, rs1, imm),
        Insn::Load {
            width,
            rd,
            rs1,
            offset,
        } => format!("l{} {}, {}({})", width.suffix(), rd, offset, rs1),
        Insn::Store {
            width,
            rs2,
            rs1,
            offset,
        } => format!("s{} {}, {}({})", width.suffix(), rs2, offset, rs1),
        Insn::Csrrw { rd, rs1, csr } => {
            if rd.is_zero() {
                format!("csrw {:#x}, {}", csr, rs1)
            } else {
                format!("csrrw {}, {:#x}, {}", rd, csr, rs1)
            }
        }
        Insn::Csrrs { rd, rs1, csr } => {
            if rs1.is_zero() {
                format!("csrr {}, {:#x}", rd, csr)
            } else {
                format!("csrrs {}, {:#x}, {}", rd, csr, rs1)
            }
        }
        Insn::Fence => "fence".to_string(),
        Insn::FenceI => "fence.i".to_string(),
        Insn::Ebreak => "ebreak".to_string(),
    }
}

/// Disassembles a raw word, falling back to `.word` for anything the
/// decoder does not know.
pub fn fmt_word(raw: u32) -> String {
    match decode(raw) {
        Some(insn) => fmt_insn(&insn),
        None => format!(".word {:#010x}", raw),
    }
}
