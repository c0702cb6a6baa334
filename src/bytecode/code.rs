/*!
  The code builder. A `Code` is an ordered list of units: concrete bytes, deferred bytes, and
  label placeholders. Producing the final bytes takes two passes:

   1. `resolve` walks the units once, fixing the address of every label placeholder it meets
      (or padding up to a label that already has an address) and dropping the placeholders.
      Nothing is evaluated yet, so labels may be referenced before they are defined.
   2. `Resolved::assemble` evaluates each deferred byte against the label table, now complete,
      giving it the position of the byte being produced.

  Running both passes again over the same code with the same table reproduces the same bytes.
*/

use tracing::debug;

use super::instruction::{Arg, Invocation};
use super::label::{Deferred, Label, LabelTable};
use super::raw::RawField;
use super::registry::{InstructionSet, Registry};
use crate::error::{Error, Result};

/// One element of a program.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Unit {
  Byte(u8),
  Deferred(Deferred),
  /// Zero width marker fixing the address of a label.
  Label(Label),
}

/// One byte of resolved output, possibly still waiting on a label.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Data {
  Byte(u8),
  Deferred(Deferred),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct AssembleOptions {
  /// Address of the first byte.
  pub origin   : u64,
  /// Filler written when a label pinned ahead of the current position is reached.
  pub padding  : u8,
  /// Largest image, in bytes, that padding up to a pinned label may produce.
  pub max_size : u64,
}

impl Default for AssembleOptions {
  fn default() -> AssembleOptions {
    AssembleOptions { origin: 0, padding: 0xFF, max_size: 1 << 24 }
  }
}

/// Output of the first pass: every label placeholder has been consumed.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Resolved {
  pub origin : u64,
  pub data   : Vec<Data>,
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Code {
  units: Vec<Unit>,
}

/// A body of code or data framed by two labels, so that its extent is known once resolved.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Block {
  pub start : Label,
  pub body  : Code,
  pub end   : Label,
}

impl Code {

  pub fn new() -> Code {
    Code { units: vec![] }
  }

  pub fn units(&self) -> &[Unit] {
    &self.units
  }

  /// Number of bytes the code emits, not counting padding. Label placeholders count zero.
  pub fn size(&self) -> usize {
    self.units
        .iter()
        .filter(|unit| !matches!(unit, Unit::Label(_)))
        .count()
  }

  pub fn push(&mut self, unit: Unit) -> &mut Code {
    self.units.push(unit);
    self
  }

  pub fn byte(&mut self, byte: u8) -> &mut Code {
    self.push(Unit::Byte(byte))
  }

  pub fn bytes(&mut self, bytes: &[u8]) -> &mut Code {
    self.units.extend(bytes.iter().map(|byte| Unit::Byte(*byte)));
    self
  }

  pub fn deferred(&mut self, deferred: Deferred) -> &mut Code {
    self.push(Unit::Deferred(deferred))
  }

  /// Marks the current position with `label`.
  pub fn label(&mut self, label: Label) -> &mut Code {
    self.push(Unit::Label(label))
  }

  /// Encodes `value` as a data field.
  pub fn field(&mut self, field: RawField, value: impl Into<Arg>) -> &mut Code {
    self.units.extend(value.into().units(field));
    self
  }

  pub fn append(&mut self, other: Code) -> &mut Code {
    self.units.extend(other.units);
    self
  }

  pub fn block(&mut self, block: Block) -> &mut Code {
    self.label(block.start);
    self.append(block.body);
    self.label(block.end)
  }

  /// Encodes one instruction with `registry` and appends it.
  pub fn emit<I: InstructionSet>(
    &mut self,
    registry: &Registry<I>,
    invocation: Invocation<I::Kind>
  ) -> Result<&mut Code> {
    let code = registry.encode(&invocation)?;
    Ok(self.append(code))
  }

  /**
    The first pass. Labels without an address are given the address of their position. A label
    that already has an address further ahead is padded up to with `options.padding`; one whose
    address lies behind the current position is a `LabelConflict`. Padding that would make the
    image larger than `options.max_size` bytes is `ImageTooLarge`.
  */
  pub fn resolve(&self, labels: &mut LabelTable, options: AssembleOptions) -> Result<Resolved> {
    let origin = options.origin;
    let mut data: Vec<Data> = Vec::with_capacity(self.size());

    for unit in self.units.iter() {
      match unit {

        Unit::Byte(byte)         => data.push(Data::Byte(*byte)),

        Unit::Deferred(deferred) => data.push(Data::Deferred(*deferred)),

        Unit::Label(label)       => {
          let here = origin + data.len() as u64;
          match labels.get(*label) {
            Some(address) if address < here => {
              return Err(
                Error::LabelConflict { label: labels.name(*label), existing: address, requested: here }
              );
            }
            Some(address) => {
              let size = address - origin;
              if size > options.max_size {
                return Err(
                  Error::ImageTooLarge { label: labels.name(*label), address, limit: options.max_size }
                );
              }
              data.resize(size as usize, Data::Byte(options.padding));
            }
            None => labels.set(*label, here)?
          }
        }

      } // end match on unit
    }

    debug!(origin, size = data.len(), "code resolved");
    Ok(Resolved { origin, data })
  }

  /// Both passes with the given options.
  pub fn assemble_with(&self, labels: &mut LabelTable, options: AssembleOptions) -> Result<Vec<u8>> {
    self.resolve(labels, options)?.assemble(labels)
  }

  /// Both passes from address zero, padding with `0xFF`.
  pub fn assemble(&self, labels: &mut LabelTable) -> Result<Vec<u8>> {
    self.assemble_with(labels, AssembleOptions::default())
  }
}

impl Resolved {
  /**
    The second pass. Each deferred byte is evaluated with the address it lands at, that is the
    origin plus the number of bytes emitted before it.

    Positions are addresses, not byte counts. With a non-zero origin an absolute reference to
    a position and a plain count of bytes emitted differ by the origin. Relative references
    subtract two addresses and come out the same for any origin.
  */
  pub fn assemble(&self, labels: &LabelTable) -> Result<Vec<u8>> {
    let mut bytes: Vec<u8> = Vec::with_capacity(self.data.len());
    for data in self.data.iter() {
      let byte = match data {
        Data::Byte(byte)         => *byte,
        Data::Deferred(deferred) => deferred.eval(labels, self.origin + bytes.len() as u64)?
      };
      bytes.push(byte);
    }
    debug!(origin = self.origin, size = bytes.len(), "code assembled");
    Ok(bytes)
  }
}

impl Block {
  /// A block with two fresh anonymous labels.
  pub fn new(labels: &mut LabelTable, body: Code) -> Block {
    Block { start: labels.anonymous(), body, end: labels.anonymous() }
  }

  /// Size in bytes once resolved, padding included.
  pub fn len(&self, labels: &LabelTable) -> Option<u64> {
    Some(labels.get(self.end)? - labels.get(self.start)?)
  }
}
