//! The register file: eight byte registers, four of which pairs can be read and written as one
//! 16-bit value. In a pair the first named register holds the high byte.

use std::fmt::{Display, Formatter};

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::IntoEnumIterator;
use strum_macros::{Display as StrumDisplay, EnumIter, EnumVariantNames};

#[derive(
  StrumDisplay, EnumVariantNames, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq,       PartialEq,        Debug,         Hash
)]
#[repr(u8)]
pub enum Reg {
  A, B,
  C, D,
  E, F,
  L, H,
}

#[derive(
  StrumDisplay, EnumVariantNames, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq,       PartialEq,        Debug,         Hash
)]
#[repr(u8)]
pub enum Reg16 {
  BA,
  DC,
  FE,
  HL,
}

impl Reg16 {
  /// The `(high, low)` byte registers of the pair.
  pub fn pair(self) -> (Reg, Reg) {
    match self {
      Reg16::BA => (Reg::B, Reg::A),
      Reg16::DC => (Reg::D, Reg::C),
      Reg16::FE => (Reg::F, Reg::E),
      Reg16::HL => (Reg::H, Reg::L),
    }
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct RegFile {
  regs: [u8; 8],
}

impl RegFile {

  pub fn new() -> RegFile {
    RegFile { regs: [0; 8] }
  }

  pub fn get(&self, reg: Reg) -> u8 {
    self.regs[u8::from(reg) as usize]
  }

  pub fn set(&mut self, reg: Reg, value: u8) {
    self.regs[u8::from(reg) as usize] = value;
  }

  pub fn get16(&self, reg: Reg16) -> u16 {
    let (high, low) = reg.pair();
    (self.get(high) as u16) << 8 | self.get(low) as u16
  }

  pub fn set16(&mut self, reg: Reg16, value: u16) {
    let (high, low) = reg.pair();
    self.set(high, (value >> 8) as u8);
    self.set(low, value as u8);
  }

  pub fn iter(&self) -> impl Iterator<Item = (Reg, u8)> + '_ {
    Reg::iter().map(move |reg| (reg, self.get(reg)))
  }
}

impl Display for RegFile {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let text =
      self.iter()
          .map(|(reg, value)| format!("{}={}", reg, value))
          .collect::<Vec<String>>()
          .join(" ");
    write!(f, "{}", text)
  }
}
