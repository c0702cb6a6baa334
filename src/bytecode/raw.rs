/*!
  Fixed width integer fields, the unit of byte level interchange. A `RawField` knows its width
  in bytes, its byte order, and whether its value is signed. Values are carried around as
  `i128` so that every `u64` and every `i64` is representable.

  Byte `i` of an `N` byte big-endian field holds bits `[8*(N-i-1), 8*(N-i))` of the value,
  byte `i` of a little-endian field holds bits `[8*i, 8*(i+1))`.
*/

use super::label::Deferred;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Endian {
  Little,
  Big,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct RawField {
  pub size   : usize,
  pub endian : Endian,
  pub signed : bool,
}

pub const U8: RawField = RawField::new(1, Endian::Little, false);
pub const I8: RawField = RawField::new(1, Endian::Little, true);

pub mod le {
  use super::{Endian, RawField};

  pub const U16: RawField = RawField::new(2, Endian::Little, false);
  pub const I16: RawField = RawField::new(2, Endian::Little, true);
  pub const U32: RawField = RawField::new(4, Endian::Little, false);
  pub const I32: RawField = RawField::new(4, Endian::Little, true);
  pub const U64: RawField = RawField::new(8, Endian::Little, false);
  pub const I64: RawField = RawField::new(8, Endian::Little, true);
}

pub mod be {
  use super::{Endian, RawField};

  pub const U16: RawField = RawField::new(2, Endian::Big, false);
  pub const I16: RawField = RawField::new(2, Endian::Big, true);
  pub const U32: RawField = RawField::new(4, Endian::Big, false);
  pub const I32: RawField = RawField::new(4, Endian::Big, true);
  pub const U64: RawField = RawField::new(8, Endian::Big, false);
  pub const I64: RawField = RawField::new(8, Endian::Big, true);
}

impl RawField {
  /// `size` is one of 1, 2, 4 or 8.
  pub const fn new(size: usize, endian: Endian, signed: bool) -> RawField {
    RawField { size, endian, signed }
  }

  pub fn bits(&self) -> u32 {
    8 * self.size as u32
  }

  /// All ones over the width of the field.
  pub fn mask(&self) -> u64 {
    match self.size >= 8 {
      true  => u64::MAX,
      false => (1u64 << self.bits()) - 1
    }
  }

  /// Bit offset of the value held by byte `i`.
  pub fn offset(&self, i: usize) -> u32 {
    match self.endian {
      Endian::Big    => 8 * (self.size - i - 1) as u32,
      Endian::Little => 8 * i as u32
    }
  }

  /// Encodes `value`, silently truncated to the width of the field.
  pub fn encode(&self, value: i128) -> Vec<u8> {
    (0..self.size)
      .map(|i| ((value >> self.offset(i)) & 0xFF) as u8)
      .collect()
  }

  /// The unsigned bit pattern held by the first `size` bytes of `bytes`.
  pub fn decode_bits(&self, bytes: &[u8]) -> u64 {
    bytes
      .iter()
      .take(self.size)
      .enumerate()
      .fold(0u64, |bits, (i, byte)| bits | (*byte as u64) << self.offset(i))
  }

  /// Decodes the first `size` bytes of `bytes`, sign extending signed fields.
  pub fn decode(&self, bytes: &[u8]) -> i128 {
    let bits = self.decode_bits(bytes);
    match self.signed {
      true  => {
        let unused = 128 - self.bits();
        ((bits as i128) << unused) >> unused
      }
      false => bits as i128
    }
  }

  /// One deferred byte per byte of the field, each selecting its part of the resolved value.
  pub fn lazy(&self, value: &Deferred) -> Vec<Deferred> {
    (0..self.size)
      .map(|i| value.shift(self.offset(i)))
      .collect()
  }
}
