use anyhow::Result;

use crate::regs::Reg;

/// The debug-module side of a hart: program buffer transfer, execution
/// trigger, and GPR access.
///
/// Callers must serialize access for the whole build/execute/restore cycle;
/// the executor holds `&mut` for one execution.
pub trait Target {
    /// Native register width in bits (32 or 64).
    fn xlen(&self) -> u32;
    /// Number of 32-bit slots in the program buffer.
    fn debug_buffer_size(&self) -> usize;
    /// Whether the hardware supplies an `ebreak` right after the last slot.
    fn implicit_ebreak(&self) -> bool {
        true
    }

    fn write_debug_buffer(&mut self, index: usize, word: u32) -> Result<()>;
    fn read_debug_buffer(&mut self, index: usize) -> Result<u32>;
    /// Runs the buffer from slot 0 until it traps back into debug mode.
    fn execute_debug_buffer(&mut self) -> Result<()>;

    fn read_register(&mut self, reg: Reg) -> Result<u64>;
    fn write_register(&mut self, reg: Reg, value: u64) -> Result<()>;
}
