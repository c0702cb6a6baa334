/*!
  The mk1 reference machine: an 8-bit stack machine with a 16-bit address space. The
  instruction set is declared in `instructions`, executed by `model::Context`.
*/

pub mod alu;
mod instructions;
mod model;
mod regs;

pub use instructions::*;
pub use model::{Context, Flow, RunOptions, RunOutcome};
pub use regs::{Reg, Reg16, RegFile};
