/*!
  Byte addressed memory seen by the execution engine. Addresses are 16 bits wide.

  `Overlay` keeps a program image read only and records writes on top of it, so the same image
  can be run any number of times. Reads past the end of the image that were never written give
  zero.
*/

use std::collections::BTreeMap;

pub trait Memory {
  fn get(&self, address: u16) -> u8;
  fn set(&mut self, address: u16, value: u8);

  /// Copies `bytes` in starting at `address`, wrapping at the top of the address space.
  fn load(&mut self, address: u16, bytes: &[u8]) {
    for (i, byte) in bytes.iter().enumerate() {
      self.set(address.wrapping_add(i as u16), *byte);
    }
  }
}

#[derive(Clone, Debug, Default)]
pub struct Overlay<'a> {
  base    : &'a [u8],
  written : BTreeMap<u16, u8>,
}

impl<'a> Overlay<'a> {

  pub fn new(base: &'a [u8]) -> Overlay<'a> {
    Overlay { base, written: BTreeMap::new() }
  }

  /// Every address written since creation or the last `reset`, in address order.
  pub fn written(&self) -> impl Iterator<Item = (u16, u8)> + '_ {
    self.written.iter().map(|(address, value)| (*address, *value))
  }

  /// Forgets all writes.
  pub fn reset(&mut self) {
    self.written.clear();
  }
}

impl<'a> Memory for Overlay<'a> {
  fn get(&self, address: u16) -> u8 {
    match self.written.get(&address) {
      Some(value) => *value,
      None        => self.base.get(address as usize).copied().unwrap_or(0)
    }
  }

  fn set(&mut self, address: u16, value: u8) {
    self.written.insert(address, value);
  }
}

/// A full 64 KiB address space.
impl Memory for Vec<u8> {
  fn get(&self, address: u16) -> u8 {
    self.as_slice().get(address as usize).copied().unwrap_or(0)
  }

  fn set(&mut self, address: u16, value: u8) {
    let address = address as usize;
    if address >= self.len() {
      self.resize(address + 1, 0);
    }
    self[address] = value;
  }
}
