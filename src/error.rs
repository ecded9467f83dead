use anyhow::Error as Cause;

use crate::regs::Reg;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures surfaced while building or executing a program.
///
/// `BufferFull`, `ExhaustedRegisters` and `UnsupportedWidth` are logic or
/// configuration defects: the program being built is discarded. The rest
/// come from the target collaborator and may be transient.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("debug buffer full ({capacity} slots)")]
    BufferFull { capacity: usize },
    #[error("ran out of temporary registers")]
    ExhaustedRegisters,
    #[error("unsupported xlen {xlen}")]
    UnsupportedWidth { xlen: u32 },
    #[error("failed to transfer debug buffer slot {slot:#04x}: {source}")]
    TransferFailed {
        slot: usize,
        #[source]
        source: Cause,
    },
    #[error("failed to execute debug buffer: {source}")]
    ExecutionFailed {
        #[source]
        source: Cause,
    },
    #[error("failed to access register {reg}: {source}")]
    RegisterAccess {
        reg: Reg,
        #[source]
        source: Cause,
    },
    #[error("failed to restore register {reg}: {source}")]
    RestoreFailed {
        reg: Reg,
        #[source]
        source: Cause,
    },
}
