//! One-shot memory and CSR accesses through the program buffer.
//!
//! Each call builds a single program around one or two temporaries, feeds
//! values and addresses in with [`Program::set_input`] and reads results
//! back with [`Program::capture`], so the target's GPRs read the same before
//! and after.

use anyhow::anyhow;

use crate::encoding::Width;
use crate::error::{Error, Result};
use crate::exec::{execute, execute_with, Collected, ExecFlags};
use crate::program::Program;
use crate::regs::Reg;
use crate::target::Target;

fn captured(collected: &Collected, reg: Reg) -> Result<u64> {
    collected.register(reg).ok_or_else(|| Error::RegisterAccess {
        reg,
        source: anyhow!("{reg} was not captured"),
    })
}

/// Takes a temporary holding the full `addr` when execution starts. The
/// `lui` + offset split cannot reach every address.
fn address_input(program: &mut Program, addr: u64) -> Result<Reg> {
    let base = program.allocate()?;
    program.set_input(base, addr);
    Ok(base)
}

/// Reads `width` bytes at `addr`, zero-extended.
pub fn read_memory<T: Target + ?Sized>(target: &mut T, addr: u64, width: Width) -> Result<u64> {
    let mut program = Program::new(target);
    let data = program.allocate()?;
    let base = address_input(&mut program, addr)?;
    program.load_relative(width, data, base, 0)?;
    program.capture(data);
    program.release(base);
    program.release(data);
    let collected = execute_with(program, target, ExecFlags::empty())?;
    Ok(captured(&collected, data)? & width.mask())
}

/// Writes the low `width` bytes of `value` to `addr`.
pub fn write_memory<T: Target + ?Sized>(
    target: &mut T,
    addr: u64,
    width: Width,
    value: u64,
) -> Result<()> {
    let mut program = Program::new(target);
    let data = program.allocate()?;
    program.set_input(data, value & width.mask());
    let base = address_input(&mut program, addr)?;
    program.store_relative(width, data, base, 0)?;
    program.release(base);
    program.release(data);
    execute(program, target)
}

pub fn read_csr<T: Target + ?Sized>(target: &mut T, csr: u16) -> Result<u64> {
    let mut program = Program::new(target);
    let data = program.allocate()?;
    program.read_csr(data, csr)?;
    program.capture(data);
    program.release(data);
    let collected = execute_with(program, target, ExecFlags::empty())?;
    captured(&collected, data)
}

pub fn write_csr<T: Target + ?Sized>(target: &mut T, csr: u16, value: u64) -> Result<()> {
    let mut program = Program::new(target);
    let data = program.allocate()?;
    program.set_input(data, value);
    program.write_csr(data, csr)?;
    program.release(data);
    execute(program, target)
}
