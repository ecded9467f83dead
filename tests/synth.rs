use pretty_assertions::assert_eq;
use riscv_progbuf::decoder::decode;
use riscv_progbuf::{execute, Error, Hart, HartConfig, Insn, Program, Reg, Width};

fn insns(p: &Program) -> Vec<Insn> {
    p.words().iter().map(|w| decode(*w).expect("decode")).collect()
}

#[test]
fn load_immediate_is_always_two_instructions() {
    for v in [0i64, 1, -1, 0x7ff, 0x800, 0x1234_5678, -0x8000_0000] {
        let mut p = Program::with_capacity(32, 4);
        p.load_immediate(Reg::A0, v).unwrap();
        let got = insns(&p);
        assert_eq!(got.len(), 2, "value {v:#x}");
        assert!(matches!(got[0], Insn::Lui { rd: Reg::A0, .. }));
        assert!(matches!(got[1], Insn::Addi { rd: Reg::A0, rs1: Reg::A0, .. }));
    }

    let mut p = Program::with_capacity(32, 4);
    p.load_immediate(Reg::A0, 0).unwrap();
    assert_eq!(
        insns(&p),
        vec![
            Insn::Lui { rd: Reg::A0, imm: 0 },
            Insn::Addi { rd: Reg::A0, rs1: Reg::A0, imm: 0 },
        ]
    );
}

#[test]
fn load_immediate_values_land_in_register() {
    let cases: [(u32, i64, u64); 7] = [
        (32, 0x800, 0x800),
        (32, 0xfff, 0xfff),
        (32, -1, 0xffff_ffff),
        (32, 0x1234_5678, 0x1234_5678),
        (32, -0x8000_0000, 0x8000_0000),
        (64, -1, u64::MAX),
        (64, -0x800, 0xffff_ffff_ffff_f800),
    ];
    for (xlen, value, expected) in cases {
        let mut hart = Hart::new(HartConfig { xlen, ..HartConfig::default() });
        let mut p = Program::new(&hart);
        p.load_immediate(Reg::A0, value).unwrap();
        execute(p, &mut hart).unwrap();
        assert_eq!(hart.x(Reg::A0), expected, "xlen {xlen} value {value:#x}");
    }
}

#[test]
fn csr_forms() {
    let mut p = Program::with_capacity(32, 8);
    p.read_csr(Reg::S0, 0x7b0).unwrap();
    p.write_csr(Reg::S1, 0x300).unwrap();
    p.read_modify_write_csr(Reg::A0, Reg::A1, 0x341).unwrap();
    p.read_csr(Reg::S0, 0xfff).unwrap();
    assert_eq!(
        insns(&p),
        vec![
            Insn::Csrrs { rd: Reg::S0, rs1: Reg::ZERO, csr: 0x7b0 },
            Insn::Csrrw { rd: Reg::ZERO, rs1: Reg::S1, csr: 0x300 },
            Insn::Csrrw { rd: Reg::A0, rs1: Reg::A1, csr: 0x341 },
            Insn::Csrrs { rd: Reg::S0, rs1: Reg::ZERO, csr: 0xfff },
        ]
    );
    assert!(!p.writes_memory());
}

#[test]
#[should_panic(expected = "out of range")]
fn csr_index_past_4095_panics() {
    let mut p = Program::with_capacity(32, 8);
    let _ = p.read_csr(Reg::S0, 0x1000);
}

#[test]
fn fences() {
    let mut p = Program::with_capacity(32, 8);
    p.fence().unwrap();
    p.instruction_fence().unwrap();
    assert_eq!(insns(&p), vec![Insn::Fence, Insn::FenceI]);
}

#[test]
fn breakpoint_appends_ebreak() {
    let mut p = Program::with_capacity(32, 4);
    p.insert_breakpoint().unwrap();
    assert_eq!(insns(&p), vec![Insn::Ebreak]);
}

#[test]
fn breakpoint_is_elided_when_buffer_is_full() {
    let mut p = Program::with_capacity(32, 2);
    p.load_immediate(Reg::A0, 5).unwrap();
    p.insert_breakpoint().unwrap();
    assert_eq!(p.len(), 2);
}

#[test]
fn breakpoint_overflows_without_implicit_ebreak() {
    let mut p = Program::with_capacity(32, 2).with_implicit_ebreak(false);
    p.load_immediate(Reg::A0, 5).unwrap();
    assert!(matches!(
        p.insert_breakpoint(),
        Err(Error::BufferFull { capacity: 2 })
    ));
    assert_eq!(p.len(), 2);
}

#[test]
fn full_buffer_rejects_and_keeps_count() {
    let mut p = Program::with_capacity(32, 3);
    p.load_word(Reg::T0, 0x2000).unwrap();
    p.fence().unwrap();
    for _ in 0..2 {
        assert!(matches!(p.fence(), Err(Error::BufferFull { capacity: 3 })));
        assert_eq!(p.len(), 3);
    }

    // the lui fits, the store does not
    let mut p = Program::with_capacity(32, 1);
    assert!(matches!(
        p.store_word(Reg::T0, 0x3000),
        Err(Error::BufferFull { capacity: 1 })
    ));
    assert_eq!(p.len(), 1);
}

#[test]
fn extended_forms_follow_xlen() {
    let mut p = Program::with_capacity(32, 8);
    p.load_extended(Reg::A0, 0x10).unwrap();
    p.store_extended(Reg::A0, 0x20).unwrap();
    assert_eq!(
        insns(&p),
        vec![
            Insn::Load { width: Width::Word, rd: Reg::A0, rs1: Reg::ZERO, offset: 0x10 },
            Insn::Store { width: Width::Word, rs2: Reg::A0, rs1: Reg::ZERO, offset: 0x20 },
        ]
    );

    let mut p = Program::with_capacity(64, 8);
    p.load_extended(Reg::A0, 0x10).unwrap();
    p.store_extended(Reg::A0, 0x20).unwrap();
    assert_eq!(
        insns(&p),
        vec![
            Insn::Load { width: Width::Double, rd: Reg::A0, rs1: Reg::ZERO, offset: 0x10 },
            Insn::Store { width: Width::Double, rs2: Reg::A0, rs1: Reg::ZERO, offset: 0x20 },
        ]
    );
}

#[test]
fn extended_forms_reject_unknown_xlen() {
    let mut p = Program::with_capacity(128, 8);
    assert!(matches!(
        p.load_extended(Reg::A0, 0x10),
        Err(Error::UnsupportedWidth { xlen: 128 })
    ));
    assert!(matches!(
        p.store_extended(Reg::A0, 0x10),
        Err(Error::UnsupportedWidth { xlen: 128 })
    ));
    assert!(p.is_empty());
}

#[test]
fn relative_forms_take_an_explicit_base() {
    let mut p = Program::with_capacity(64, 8);
    p.load_relative(Width::Half, Reg::A0, Reg::SP, -4).unwrap();
    assert!(!p.writes_memory());
    p.store_relative(Width::Double, Reg::A0, Reg::SP, -8).unwrap();
    assert!(p.writes_memory());
    assert_eq!(
        insns(&p),
        vec![
            Insn::Load { width: Width::Half, rd: Reg::A0, rs1: Reg::SP, offset: -4 },
            Insn::Store { width: Width::Double, rs2: Reg::A0, rs1: Reg::SP, offset: -8 },
        ]
    );
}

#[test]
fn keep_and_discard_toggle_restore() {
    let mut p = Program::with_capacity(32, 8);
    assert!(!p.is_dirty(Reg::A0));
    p.keep_register(Reg::A0);
    assert!(p.is_dirty(Reg::A0));
    p.discard_register(Reg::A0);
    assert!(!p.is_dirty(Reg::A0));
}
