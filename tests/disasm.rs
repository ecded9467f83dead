use pretty_assertions::assert_eq;
use riscv_progbuf::disasm::{fmt_insn, fmt_word};
use riscv_progbuf::{Insn, Program, Reg, Width};

#[test]
fn listing() {
    let mut p = Program::with_capacity(32, 16);
    p.load_word(Reg::T0, 0x2000).unwrap();
    p.store_word(Reg::T0, 0x3004).unwrap();
    p.read_csr(Reg::S1, 0x7b0).unwrap();
    assert_eq!(
        p.listing(),
        vec![
            "00: 000022b7  lui t0, 0x2",
            "01: 0002a283  lw t0, 0(t0)",
            "02: 00003437  lui s0, 0x3",
            "03: 00542223  sw t0, 4(s0)",
            "04: 7b0024f3  csrr s1, 0x7b0",
        ]
    );
}

#[test]
fn instruction_text() {
    let cases = [
        (Insn::Addi { rd: Reg::A0, rs1: Reg::A0, imm: -1 }, "addi a0, a0, -1"),
        (
            Insn::Store { width: Width::Double, rs2: Reg::A0, rs1: Reg::SP, offset: -8 },
            "sd a0, -8(sp)",
        ),
        (Insn::Csrrw { rd: Reg::ZERO, rs1: Reg::S1, csr: 0x300 }, "csrw 0x300, s1"),
        (Insn::Csrrw { rd: Reg::A0, rs1: Reg::A1, csr: 0x341 }, "csrrw a0, 0x341, a1"),
        (Insn::Csrrs { rd: Reg::A0, rs1: Reg::A1, csr: 0x341 }, "csrrs a0, 0x341, a1"),
        (Insn::Fence, "fence"),
        (Insn::FenceI, "fence.i"),
        (Insn::Ebreak, "ebreak"),
    ];
    for (insn, text) in cases {
        assert_eq!(fmt_insn(&insn), text);
    }
}

#[test]
fn unknown_words_fall_back() {
    assert_eq!(fmt_word(0xffff_ffff), ".word 0xffffffff");
    assert_eq!(fmt_word(0x0010_0073), "ebreak");
}
