use std::collections::BTreeMap;

use bitflags::bitflags;
use tracing::{debug, error};

use crate::disasm::fmt_word;
use crate::error::{Error, Result};
use crate::program::Program;
use crate::regs::Reg;
use crate::target::Target;

bitflags! {
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecFlags: u8 {
const READBACK = 1 << 0; // read the filled buffer slots back after execution
}
}

/// Where an [`Execution`] is in the build/run/restore sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecState {
    Building,
    Finalizing,
    Transferring,
    Executing,
    Collecting,
    Restoring,
    Done,
    Failed,
}

/// Values read back from the target between execution and restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Collected {
    pub registers: BTreeMap<Reg, u64>,
    pub buffer: Option<Vec<u32>>,
}

impl Collected {
    pub fn register(&self, reg: Reg) -> Option<u64> {
        self.registers.get(&reg).copied()
    }
}

/// Runs one [`Program`] on a target while keeping the target's registers
/// intact.
///
/// Registers the program dirties are saved right before the trigger and
/// written back afterwards, including when the trigger or read-back fails.
pub struct Execution<'t, T: Target + ?Sized> {
    target: &'t mut T,
    flags: ExecFlags,
    state: ExecState,
}

impl<'t, T: Target + ?Sized> Execution<'t, T> {
    pub fn new(target: &'t mut T) -> Self {
        Self {
            target,
            flags: ExecFlags::empty(),
            state: ExecState::Building,
        }
    }

    pub fn with_flags(mut self, flags: ExecFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn state(&self) -> ExecState {
        self.state
    }

    fn enter(&mut self, next: ExecState) {
        debug!("{:?} -> {:?}", self.state, next);
        self.state = next;
    }

    pub fn run(&mut self, program: Program) -> Result<Collected> {
        let result = self.drive(program);
        match result {
            Ok(_) => self.enter(ExecState::Done),
            Err(_) => self.enter(ExecState::Failed),
        }
        result
    }

    fn drive(&mut self, mut program: Program) -> Result<Collected> {
        self.enter(ExecState::Finalizing);
        if let Err(e) = program.finalize() {
            // A store without its fence must never run.
            error!("unable to finalize program: {e}");
            for line in program.listing() {
                error!("  {line}");
            }
            return Err(e);
        }

        self.enter(ExecState::Transferring);
        self.transfer(&program)?;

        self.enter(ExecState::Executing);
        let saved = self.save(&program)?;
        if let Err(e) = self.write_inputs(&program) {
            let _ = self.restore(&saved);
            return Err(e);
        }
        if let Err(source) = self.target.execute_debug_buffer() {
            error!("unable to execute program: {source:#}");
            let _ = self.restore(&saved);
            return Err(Error::ExecutionFailed { source });
        }

        self.enter(ExecState::Collecting);
        let collected = self.collect(&program);

        self.enter(ExecState::Restoring);
        let restored = self.restore(&saved);
        let collected = collected?;
        restored?;
        Ok(collected)
    }

    fn transfer(&mut self, program: &Program) -> Result<()> {
        for (slot, &word) in program.words().iter().enumerate() {
            debug!("debug_buffer[{:02x}] = {}", slot, fmt_word(word));
            self.target
                .write_debug_buffer(slot, word)
                .map_err(|source| Error::TransferFailed { slot, source })?;
        }
        Ok(())
    }

    fn save(&mut self, program: &Program) -> Result<BTreeMap<Reg, u64>> {
        let mut saved = BTreeMap::new();
        for reg in program.dirty().iter().filter(|r| !r.is_zero()) {
            debug!("saving register {} as used by program", reg);
            let value = self
                .target
                .read_register(reg)
                .map_err(|source| Error::RegisterAccess { reg, source })?;
            saved.insert(reg, value);
        }
        Ok(saved)
    }

    fn write_inputs(&mut self, program: &Program) -> Result<()> {
        for (&reg, &value) in program.inputs() {
            debug!("loading {} = {:#x}", reg, value);
            self.target
                .write_register(reg, value)
                .map_err(|source| Error::RegisterAccess { reg, source })?;
        }
        Ok(())
    }

    fn collect(&mut self, program: &Program) -> Result<Collected> {
        let mut collected = Collected::default();
        for reg in program.captured().iter() {
            let value = self
                .target
                .read_register(reg)
                .map_err(|source| Error::RegisterAccess { reg, source })?;
            collected.registers.insert(reg, value);
        }
        if self.flags.contains(ExecFlags::READBACK) {
            let mut words = Vec::with_capacity(program.len());
            for slot in 0..program.len() {
                let word = self
                    .target
                    .read_debug_buffer(slot)
                    .map_err(|source| Error::TransferFailed { slot, source })?;
                words.push(word);
            }
            collected.buffer = Some(words);
        }
        Ok(collected)
    }

    /// Writes every saved register back in ascending order. Keeps going
    /// past failures and returns the first one.
    fn restore(&mut self, saved: &BTreeMap<Reg, u64>) -> Result<()> {
        let mut first = None;
        for (&reg, &value) in saved {
            debug!("restoring register {} = {:#x}", reg, value);
            if let Err(source) = self.target.write_register(reg, value) {
                error!("unable to restore register {}: {source:#}", reg);
                if first.is_none() {
                    first = Some(Error::RestoreFailed { reg, source });
                }
            }
        }
        match first {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

/// Finalizes `program`, runs it on `target` and restores the registers it
/// dirtied.
pub fn execute<T: Target + ?Sized>(program: Program, target: &mut T) -> Result<()> {
    Execution::new(target).run(program).map(|_| ())
}

/// [`execute`], also returning captured registers and, with
/// [`ExecFlags::READBACK`], the buffer contents after execution.
pub fn execute_with<T: Target + ?Sized>(
    program: Program,
    target: &mut T,
    flags: ExecFlags,
) -> Result<Collected> {
    Execution::new(target).with_flags(flags).run(program)
}
