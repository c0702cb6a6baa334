/*!
  The instruction set independent half of the toolkit.

  A concrete instruction set implements `InstructionSet`, listing its formats. A `Registry`
  built from it allocates opcodes and is then shared by everything else: `Code` and the
  assembly parser encode with it, `disassemble` and execution engines decode with it.

  Values not known while code is being built, chiefly label addresses, are `Deferred`. Each
  deferred byte is computed from its label's slot in a `LabelTable` once `Code::resolve` has
  given every label an address.
*/

pub mod assembly;
pub mod code;
pub mod disasm;
pub mod instruction;
pub mod label;
pub mod raw;
pub mod registry;

pub use assembly::parse_assembly;
pub use code::{AssembleOptions, Block, Code, Resolved, Unit};
pub use disasm::{disassemble, listing, opcode_map, Record};
pub use instruction::{Arg, Decoded, Format, Invocation, Operand, Values};
pub use label::{Deferred, Label, LabelTable, Reference};
pub use raw::{Endian, RawField};
pub use registry::{InstructionSet, Registry};
