/*!
  The shape of one instruction kind.

  An encoded instruction is an opcode field followed by zero or more argument fields:

  ```text
    [opcode: id | option][arg 0]...[arg n-1]
  ```

  The opcode field is shared by the whole instruction set (commonly one byte). Its high bits
  hold the id the registry allocates to the kind. Its low `w` bits, the "option" bits, hold
  the embedded operand fields, such as a register selector or a small flag, the first field
  lowest. `w` is the sum of the field widths, and a kind without embedded operands has
  `w = 0`. Packing and unpacking are plain shifts and masks over the raw opcode value.
*/

use std::fmt::{Display, Formatter};

use super::code::Unit;
use super::label::{Deferred, Label};
use super::raw::RawField;

/// Number of bits needed to tell `count` variants apart, `ceil(log2(max(count, 1)))`.
pub fn option_width(count: usize) -> u32 {
  let count = count.max(1) as u64;
  64 - (count - 1).leading_zeros()
}

fn low_mask(bits: u32) -> u64 {
  match bits >= 64 {
    true  => u64::MAX,
    false => (1u64 << bits) - 1
  }
}

/// The values an embedded operand field can hold.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Values {
  /// An enumeration, encoded as the index of the variant.
  Named(&'static [&'static str]),
  /// An unsigned integer of the given width in bits.
  Integer(u32),
}

/// One operand field packed into the low bits of the opcode.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Operand {
  pub name   : &'static str,
  pub values : Values,
}

impl Operand {
  pub fn width(&self) -> u32 {
    match self.values {
      Values::Named(variants) => option_width(variants.len()),
      Values::Integer(bits)   => bits
    }
  }

  pub fn mask(&self) -> u64 {
    low_mask(self.width())
  }

  /// Whether `value` is one this field can hold.
  pub fn accepts(&self, value: u64) -> bool {
    match self.values {
      Values::Named(variants) => value < variants.len().max(1) as u64,
      Values::Integer(_)      => value <= self.mask()
    }
  }

  /// Exclusive upper bound of the accepted values, saturating at `u64::MAX`.
  pub fn limit(&self) -> u64 {
    match self.values {
      Values::Named(variants) => variants.len().max(1) as u64,
      Values::Integer(_)      => self.mask().saturating_add(1)
    }
  }

  /// The text of `value`: the variant name, or the number itself.
  pub fn text(&self, value: u64) -> Option<String> {
    match self.values {
      Values::Named(variants) => variants.get(value as usize).map(|name| name.to_string()),
      Values::Integer(_)      => Some(value).filter(|v| self.accepts(*v)).map(|v| v.to_string())
    }
  }
}

/**
  Describes one instruction kind. Built once, when the instruction set is declared.

  Operand fields are laid out from the lowest bit of the opcode upward in declaration order;
  the id sits above the last of them.
*/
#[derive(Clone, Debug)]
pub struct Format<K> {
  pub kind        : K,
  pub opcode      : RawField,
  pub operands    : Vec<Operand>,
  pub args        : Vec<RawField>,
  /// A raw opcode value this kind is pinned to, outside of sequential allocation.
  pub reserved_id : Option<u64>,
  size            : usize,
}

impl<K> Format<K> {

  pub fn new(kind: K, opcode: RawField) -> Format<K> {
    Format {
      kind,
      opcode,
      operands    : vec![],
      args        : vec![],
      reserved_id : None,
      size        : opcode.size
    }
  }

  /// Adds an enumerated operand field.
  pub fn operand(mut self, name: &'static str, variants: &'static [&'static str]) -> Format<K> {
    self.operands.push(Operand { name, values: Values::Named(variants) });
    self
  }

  /// Adds an integer operand field `bits` wide.
  pub fn integer(mut self, name: &'static str, bits: u32) -> Format<K> {
    self.operands.push(Operand { name, values: Values::Integer(bits) });
    self
  }

  pub fn arg(mut self, field: RawField) -> Format<K> {
    self.size += field.size;
    self.args.push(field);
    self
  }

  pub fn reserved(mut self, id: u64) -> Format<K> {
    self.reserved_id = Some(id);
    self
  }

  /// Total encoded size in bytes: the opcode plus every argument.
  pub fn size(&self) -> usize {
    self.size
  }

  /// Sum of the operand field widths.
  pub fn option_width(&self) -> u32 {
    self.operands.iter().map(|operand| operand.width()).sum()
  }

  /// Number of raw opcode values the kind occupies, saturating at `u64::MAX`.
  pub fn instr_count(&self) -> u64 {
    self.option_mask().saturating_add(1)
  }

  pub fn option_mask(&self) -> u64 {
    low_mask(self.option_width())
  }

  /// Whether `options` holds one acceptable value per operand field.
  pub fn accepts(&self, options: &[u64]) -> bool {
    options.len() == self.operands.len()
      && self.operands.iter().zip(options.iter()).all(|(operand, value)| operand.accepts(*value))
  }

  /// Packs one value per operand field into the low bits.
  pub fn join(&self, options: &[u64]) -> u64 {
    let mut low   = 0u64;
    let mut shift = 0u32;
    for (operand, value) in self.operands.iter().zip(options.iter()) {
      low   |= (value & operand.mask()).checked_shl(shift).unwrap_or(0);
      shift += operand.width();
    }
    low
  }

  /// Splits the low bits into one value per operand field.
  pub fn split(&self, low: u64) -> Vec<u64> {
    let mut shift = 0u32;
    self.operands
        .iter()
        .map(|operand| {
          let value = low.checked_shr(shift).unwrap_or(0) & operand.mask();
          shift += operand.width();
          value
        })
        .collect()
  }

  /// Places `id` in the high bits and the operand values in the low bits of a raw opcode.
  pub fn pack(&self, id: u64, options: &[u64]) -> u64 {
    id.checked_shl(self.option_width()).unwrap_or(0) | self.join(options)
  }

  /// Splits a raw opcode into the id and one value per operand field.
  pub fn unpack(&self, raw: u64) -> (u64, Vec<u64>) {
    (raw.checked_shr(self.option_width()).unwrap_or(0), self.split(raw & self.option_mask()))
  }

  /// Text of every operand value, in field order. Values a field cannot hold print as numbers.
  pub fn operand_text(&self, options: &[u64]) -> Vec<String> {
    self.operands
        .iter()
        .zip(options.iter())
        .map(|(operand, value)| operand.text(*value).unwrap_or_else(|| value.to_string()))
        .collect()
  }
}

/// A value for an argument field: known now, or known once a label is resolved.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Arg {
  Value(i128),
  Deferred(Deferred),
}

impl Arg {
  /// The code units encoding this value in `field`.
  pub fn units(&self, field: RawField) -> Vec<Unit> {
    match self {
      Arg::Value(value) => {
        field.encode(*value).into_iter().map(Unit::Byte).collect()
      }
      Arg::Deferred(deferred) => {
        field.lazy(deferred).into_iter().map(Unit::Deferred).collect()
      }
    }
  }
}

macro_rules! arg_from_integer {
  ($($t:ty),*) => {
    $(
      impl From<$t> for Arg {
        fn from(value: $t) -> Arg {
          Arg::Value(value as i128)
        }
      }
    )*
  };
}

arg_from_integer!(u8, i8, u16, i16, u32, i32, u64, i64, i128, usize);

impl From<Deferred> for Arg {
  fn from(deferred: Deferred) -> Arg {
    Arg::Deferred(deferred)
  }
}

impl From<Label> for Arg {
  fn from(label: Label) -> Arg {
    Arg::Deferred(label.lazy())
  }
}

impl Display for Arg {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Arg::Value(value) => write!(f, "{}", value),
      Arg::Deferred(deferred) => write!(f, "{}", deferred.label)
    }
  }
}

/// One use of an instruction in a program: the kind, its operand values, and its arguments.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Invocation<K> {
  pub kind    : K,
  pub options : Vec<u64>,
  pub args    : Vec<Arg>,
}

impl<K> Invocation<K> {
  pub fn new(kind: K) -> Invocation<K> {
    Invocation { kind, options: vec![], args: vec![] }
  }

  /// Supplies the value of the next operand field.
  pub fn option(mut self, option: u64) -> Invocation<K> {
    self.options.push(option);
    self
  }

  pub fn arg(mut self, arg: impl Into<Arg>) -> Invocation<K> {
    self.args.push(arg.into());
    self
  }
}

impl<K: Display> Display for Invocation<K> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.kind)?;
    if !self.options.is_empty() {
      write!(
        f,
        "[{}]",
        self.options
            .iter()
            .map(|option| option.to_string())
            .collect::<Vec<String>>()
            .join(", ")
      )?;
    }
    if !self.args.is_empty() {
      write!(
        f,
        " {}",
        self.args
            .iter()
            .map(|arg| arg.to_string())
            .collect::<Vec<String>>()
            .join(", ")
      )?;
    }
    Ok(())
  }
}

/// An instruction read back from bytes.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Decoded<K> {
  pub kind    : K,
  /// The raw opcode value.
  pub raw     : u64,
  /// One value per operand field.
  pub options : Vec<u64>,
  pub args    : Vec<i128>,
  /// Bytes consumed, opcode included.
  pub size    : usize,
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::raw::{le, I8, U8};

  static REGS: [&str; 4] = ["BA", "DC", "FE", "HL"];
  static FNS: [&str; 5] = ["A", "B", "C", "D", "E"];

  #[test]
  fn option_widths(){
    assert_eq!(option_width(0), 0);
    assert_eq!(option_width(1), 0);
    assert_eq!(option_width(2), 1);
    assert_eq!(option_width(4), 2);
    assert_eq!(option_width(5), 3);
    assert_eq!(option_width(8), 3);
    assert_eq!(option_width(9), 4);
  }

  #[test]
  fn size_is_fixed_at_definition(){
    let format = Format::new("LoadFar", U8).operand("from", &REGS).arg(le::I16);
    assert_eq!(format.size(), 3);
    assert_eq!(format.option_width(), 2);
    assert_eq!(format.instr_count(), 4);

    let bare = Format::new("Return", U8);
    assert_eq!(bare.size(), 1);
    assert_eq!(bare.instr_count(), 1);

    let two = Format::new("Two", U8).arg(I8).arg(le::U16);
    assert_eq!(two.size(), 4);
  }

  #[test]
  fn pack_and_unpack(){
    let format = Format::new("Calc", U8).operand("fn", &FNS);
    assert_eq!(format.option_width(), 3);
    let raw = format.pack(6, &[4]);
    assert_eq!(raw, 0b110_100);
    assert_eq!(format.unpack(raw), (6, vec![4]));
    assert_eq!(format.operand_text(&[4]), vec!["E"]);
    assert!(format.accepts(&[4]));
    assert!(!format.accepts(&[5]));
    assert!(!format.accepts(&[]));
  }

  #[test]
  fn several_operand_fields(){
    // A register pair selector in bits 0..2 and a flag in bit 2.
    let format = Format::new("Move", U8).operand("pair", &REGS).integer("high", 1).arg(I8);
    assert_eq!(format.option_width(), 3);
    assert_eq!(format.instr_count(), 8);
    assert_eq!(format.size(), 2);

    let raw = format.pack(5, &[2, 1]);
    assert_eq!(raw, 0b101_1_10);
    assert_eq!(format.unpack(raw), (5, vec![2, 1]));
    assert_eq!(format.operand_text(&[2, 1]), vec!["FE", "1"]);
    assert_eq!(format.operand_text(&[3, 0]), vec!["HL", "0"]);

    assert!(format.accepts(&[3, 1]));
    assert!(!format.accepts(&[3, 2]));
    assert!(!format.accepts(&[3]));
    assert_eq!(format.operands[1].limit(), 2);
  }

  #[test]
  fn wide_integer_fields_do_not_overflow(){
    let format = Format::new("Wide", le::U64).integer("value", 64);
    assert_eq!(format.option_width(), 64);
    assert_eq!(format.instr_count(), u64::MAX);
    assert_eq!(format.unpack(u64::MAX), (0, vec![u64::MAX]));
    assert_eq!(format.operands[0].limit(), u64::MAX);
  }

  #[test]
  fn invocation_display(){
    let invocation = Invocation::new("Jump").arg(12u16);
    assert_eq!(invocation.to_string(), "Jump 12");
    let invocation = Invocation::new("Pop").option(1);
    assert_eq!(invocation.to_string(), "Pop[1]");
    let invocation = Invocation::new("Move").option(2).option(1).arg(-3i8);
    assert_eq!(invocation.to_string(), "Move[2, 1] -3");
  }
}
