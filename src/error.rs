//! Errors raised while building an instruction set, assembling a program, or parsing assembly
//! text. Nothing in here is raised by execution: unclassified opcodes decode as `Unknown`, and
//! memory and register access is total.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug, Eq, PartialEq, Error)]
pub enum Error {
  /// A deferred byte was evaluated before its label was given an address.
  #[error("unresolved reference to label {label}")]
  UnresolvedReference { label: String },

  /// A label already holding an address was given a different one.
  #[error("label {label} is already at {existing:#06x}, cannot move it to {requested:#06x}")]
  LabelConflict { label: String, existing: u64, requested: u64 },

  #[error("opcode space exhausted at {format}: needs raw opcodes up to {needed:#x}, only {available:#x} exist")]
  OpcodeSpaceExhausted { format: String, needed: u64, available: u64 },

  #[error("reserved opcodes of {first} and {second} overlap")]
  ReservedOverlap { first: String, second: String },

  #[error("reserved id {id:#x} of {format} is not aligned to its {count} opcodes")]
  MisalignedReservedId { format: String, id: u64, count: u64 },

  #[error("{0} is not part of this instruction set")]
  UnknownFormat(String),

  #[error("{format} takes {expected} arguments but was given {found}")]
  ArityMismatch { format: String, expected: usize, found: usize },

  #[error("{format} has {expected} operand fields but was given {found} values")]
  OperandCount { format: String, expected: usize, found: usize },

  #[error("operand {value} of {format} does not fit below {limit}")]
  OperandOutOfRange { format: String, value: u64, limit: u64 },

  /// Padding up to a fixed label would grow the image past `AssembleOptions::max_size`.
  #[error("label {label} at {address:#x} would grow the image past {limit} bytes")]
  ImageTooLarge { label: String, address: u64, limit: u64 },

  #[error("error on line {line}: {message}")]
  Syntax { line: usize, message: String },
}
