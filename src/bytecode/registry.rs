/*!
  The instruction set registry. Given the catalog of formats of an instruction set, in
  declaration order, it allocates each format a numeric id such that no two formats share a
  raw opcode value. The same registry is used for encoding and for decoding.

  Allocation runs once, when the registry is built:

   1. Formats with a reserved id occupy the raw range `[id, id + count)`, where `count` is the
      number of raw opcodes the format spans (`2^w` for an option width of `w`). These ranges are
      sorted and must not overlap each other.
   2. The remaining formats are walked in order with a cursor starting at zero. The cursor is
      aligned up to a multiple of the format's count; while the candidate range overlaps a
      reserved range the cursor jumps to the end of that range and is aligned again.
   3. The format's id is `cursor >> w`; the low `w` bits carry its embedded operand.

  Reserved formats take no cursor space. Running out of opcode space, including a range whose
  end cannot even be represented, is reported when the registry is built, never later.

  Classification is total: a raw opcode matching no format, or selecting an operand variant
  that does not exist, is the catch-all Unknown format.
*/

use std::collections::HashMap;
use std::fmt::{Debug, Display};
use std::hash::Hash;

use tracing::debug;

use super::code::Code;
use super::instruction::{Decoded, Format, Invocation};
use super::raw::RawField;
use crate::error::{Error, Result};

/// A concrete instruction set.
pub trait InstructionSet: Sized {
  /// One value per format, including the catch-all.
  type Kind: Copy + Eq + Hash + Debug + Display;
  /// A fully typed decoded instruction.
  type Instr;

  /// The opcode field, common to every format.
  const OPCODE: RawField;

  /// Every format in declaration order. Order decides id allocation.
  fn catalog() -> Vec<Format<Self::Kind>>;

  /// The format of opcodes that match nothing in the catalog.
  fn unknown() -> Format<Self::Kind>;

  /// Turns a decoded record into the typed instruction.
  fn lift(decoded: &Decoded<Self::Kind>) -> Self::Instr;
}

/// The format a raw opcode belongs to, with its id and operand values.
#[derive(Debug)]
pub struct Classified<'r, K> {
  pub format  : &'r Format<K>,
  pub id      : u64,
  pub options : Vec<u64>,
}

pub struct Registry<I: InstructionSet> {
  formats : Vec<Format<I::Kind>>,
  ids     : Vec<u64>,
  index   : HashMap<I::Kind, usize>,
  unknown : Format<I::Kind>,
}

/// Rounds `value` up to a multiple of `count`, `None` on overflow.
fn align(value: u64, count: u64) -> Option<u64> {
  match value % count {
    0 => Some(value),
    r => value.checked_add(count - r)
  }
}

fn exhausted<K: Display>(format: &Format<K>, needed: Option<u64>, space: u64) -> Error {
  Error::OpcodeSpaceExhausted {
    format    : format.kind.to_string(),
    needed    : needed.unwrap_or(u64::MAX),
    available : space
  }
}

/// Allocates an id for each format of `formats` within `space` raw opcode values.
pub fn allocate<K: Display>(formats: &[Format<K>], space: u64) -> Result<Vec<u64>> {
  for format in formats.iter() {
    if format.option_width() >= 64 {
      return Err(exhausted(format, None, space));
    }
    if format.instr_count() > space {
      return Err(exhausted(format, Some(format.instr_count() - 1), space));
    }
  }

  // (start, end, index) of every reserved raw range.
  let mut reserved: Vec<(u64, u64, usize)> = vec![];
  for (i, format) in formats.iter().enumerate() {
    if let Some(id) = format.reserved_id {
      let count = format.instr_count();
      if id % count != 0 {
        return Err(Error::MisalignedReservedId {
          format : format.kind.to_string(),
          id,
          count
        });
      }
      let end =
        id.checked_add(count)
          .filter(|&end| end <= space)
          .ok_or_else(|| exhausted(format, id.checked_add(count - 1), space))?;
      reserved.push((id, end, i));
    }
  }
  reserved.sort();

  for pair in reserved.windows(2) {
    let ((_, first_end, first), (second_start, _, second)) = (pair[0], pair[1]);
    if first_end > second_start {
      return Err(Error::ReservedOverlap {
        first  : formats[first].kind.to_string(),
        second : formats[second].kind.to_string()
      });
    }
  }

  let mut cursor = 0u64;
  let mut ids    = Vec::with_capacity(formats.len());
  for format in formats.iter() {
    let width = format.option_width();
    if let Some(id) = format.reserved_id {
      ids.push(id >> width);
      continue;
    }

    let count = format.instr_count();
    let place = |from: u64| {
      align(from, count)
        .and_then(|start| start.checked_add(count).map(|end| (start, end)))
        .ok_or_else(|| exhausted(format, None, space))
    };
    let (mut start, mut end) = place(cursor)?;
    while let Some(&(_, taken, _)) = reserved.iter().find(|&&(s, e, _)| s < end && start < e) {
      let next = place(taken)?;
      start = next.0;
      end   = next.1;
    }
    if end > space {
      return Err(exhausted(format, Some(end - 1), space));
    }

    debug!(format = %format.kind, id = start >> width, width, "opcode allocated");
    ids.push(start >> width);
    cursor = end;
  }

  Ok(ids)
}

impl<I: InstructionSet> Registry<I> {

  /// Builds the registry of the catalog of `I`.
  pub fn new() -> Result<Registry<I>> {
    Registry::from_catalog(I::catalog(), I::unknown())
  }

  pub fn from_catalog(formats: Vec<Format<I::Kind>>, unknown: Format<I::Kind>) -> Result<Registry<I>> {
    let space = I::OPCODE.mask().saturating_add(1);
    let ids   = allocate(&formats, space)?;
    let index =
      formats
        .iter()
        .enumerate()
        .map(|(i, format)| (format.kind, i))
        .collect();

    Ok(Registry { formats, ids, index, unknown })
  }

  pub fn opcode(&self) -> RawField {
    I::OPCODE
  }

  pub fn format(&self, kind: I::Kind) -> Option<&Format<I::Kind>> {
    if kind == self.unknown.kind {
      return Some(&self.unknown);
    }
    self.index.get(&kind).map(|i| &self.formats[*i])
  }

  pub fn unknown(&self) -> &Format<I::Kind> {
    &self.unknown
  }

  /// The id allocated to `kind`.
  pub fn id(&self, kind: I::Kind) -> Option<u64> {
    self.index.get(&kind).map(|i| self.ids[*i])
  }

  /// Formats with their ids, in declaration order.
  pub fn formats(&self) -> impl Iterator<Item = (&Format<I::Kind>, u64)> {
    self.formats.iter().zip(self.ids.iter().copied())
  }

  /// `(name, id, option width)` of every format.
  pub fn list(&self) -> Vec<(String, u64, u32)> {
    self.formats()
        .map(|(format, id)| (format.kind.to_string(), id, format.option_width()))
        .collect()
  }

  /// The operand values of `raw` if it is an opcode of the format at `i`.
  fn matches(&self, i: usize, raw: u64) -> Option<Vec<u64>> {
    let format = &self.formats[i];
    let (id, options) = format.unpack(raw);
    match id == self.ids[i] && format.accepts(&options) {
      true  => Some(options),
      false => None
    }
  }

  /**
    Whether `raw` is an opcode of `kind`. The id bits must match, and so must every operand
    field: a field with fewer variants than its width allows (five variants in three bits)
    leaves spare encodings that belong to no format.
  */
  pub fn is_instr(&self, kind: I::Kind, raw: u64) -> bool {
    match self.index.get(&kind) {
      Some(i) => self.matches(*i, raw).is_some(),
      None => false
    }
  }

  /**
    Finds the format of a raw opcode, falling back to Unknown. Matching follows `is_instr`, so
    a raw value with the right id but an operand outside its field's variants is Unknown, not
    the format with an out-of-range operand.
  */
  pub fn classify(&self, raw: u64) -> Classified<'_, I::Kind> {
    for (i, (format, id)) in self.formats().enumerate() {
      if let Some(options) = self.matches(i, raw) {
        return Classified { format, id, options };
      }
    }
    Classified { format: &self.unknown, id: raw, options: vec![] }
  }

  /// Calls `visit` with the format `raw` belongs to and its operand values.
  pub fn dispatch<R>(&self, raw: u64, visit: impl FnOnce(&Format<I::Kind>, &[u64]) -> R) -> R {
    let classified = self.classify(raw);
    visit(classified.format, &classified.options)
  }

  /**
    Decodes one instruction. `fetch(i)` returns the byte `i` positions after the start of the
    instruction; it is called for the opcode bytes and then for each argument field in turn.
  */
  pub fn decode(&self, fetch: impl Fn(usize) -> u8) -> Decoded<I::Kind> {
    let opcode: Vec<u8> = (0..I::OPCODE.size).map(&fetch).collect();
    let raw = I::OPCODE.decode_bits(&opcode);
    let classified = self.classify(raw);
    self.decode_args(classified.format, raw, classified.options, fetch)
  }

  /// Decodes the arguments of an already classified instruction.
  pub fn decode_args(
    &self,
    format: &Format<I::Kind>,
    raw: u64,
    options: Vec<u64>,
    fetch: impl Fn(usize) -> u8
  ) -> Decoded<I::Kind> {
    let mut cursor = I::OPCODE.size;
    let mut args   = Vec::with_capacity(format.args.len());
    for field in format.args.iter() {
      let bytes: Vec<u8> = (cursor..cursor + field.size).map(&fetch).collect();
      args.push(field.decode(&bytes));
      cursor += field.size;
    }
    Decoded { kind: format.kind, raw, options, args, size: format.size() }
  }

  /// Decodes and lifts one instruction to its typed form.
  pub fn decode_instr(&self, fetch: impl Fn(usize) -> u8) -> (I::Instr, Decoded<I::Kind>) {
    let decoded = self.decode(fetch);
    (I::lift(&decoded), decoded)
  }

  /// Encodes one instruction.
  pub fn encode(&self, invocation: &Invocation<I::Kind>) -> Result<Code> {
    let i = *self.index
                 .get(&invocation.kind)
                 .ok_or_else(|| Error::UnknownFormat(invocation.kind.to_string()))?;
    let format = &self.formats[i];

    if invocation.args.len() != format.args.len() {
      return Err(Error::ArityMismatch {
        format   : format.kind.to_string(),
        expected : format.args.len(),
        found    : invocation.args.len()
      });
    }
    if invocation.options.len() != format.operands.len() {
      return Err(Error::OperandCount {
        format   : format.kind.to_string(),
        expected : format.operands.len(),
        found    : invocation.options.len()
      });
    }
    for (operand, value) in format.operands.iter().zip(invocation.options.iter()) {
      if !operand.accepts(*value) {
        return Err(Error::OperandOutOfRange {
          format : format.kind.to_string(),
          value  : *value,
          limit  : operand.limit()
        });
      }
    }

    let mut code = Code::new();
    code.bytes(&I::OPCODE.encode(format.pack(self.ids[i], &invocation.options) as i128));
    for (field, arg) in format.args.iter().zip(invocation.args.iter()) {
      code.field(*field, *arg);
    }
    Ok(code)
  }
}
