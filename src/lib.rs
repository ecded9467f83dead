pub mod access;
pub mod addr;
pub mod buffer;
pub mod cpu;
pub mod decoder;
pub mod disasm;
pub mod encoding;
pub mod error;
pub mod exec;
pub mod memory;
pub mod program;
pub mod regs;
pub mod target;

pub use cpu::{Faults, Hart, HartConfig, Trap};
pub use encoding::{Insn, Width};
pub use error::{Error, Result};
pub use exec::{execute, execute_with, Collected, ExecFlags, ExecState, Execution};
pub use memory::{Bus, LinearMemory};
pub use program::Program;
pub use regs::{Reg, RegSet, TempAllocator};
pub use target::Target;
