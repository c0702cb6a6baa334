/*!
  Labels and deferred values, the unit of relocation.

  A `LabelTable` is created for one assembly session and owns one address slot per label. A
  `Label` is only a handle into that table, so every deferred byte derived from a label
  observes the same eventual address. Named labels are kept in a `BiMap` between interned
  names and handles; asking for the same name twice yields the same handle.

  A `Deferred` is a symbolic reference to a label plus the information needed to turn the
  resolved address into one byte: whether the address is absolute or relative to the position
  of the byte being produced, and which byte of the (possibly multi-byte) value to select.
  Deferred values are evaluated during `assemble`, never before.
*/

use std::fmt::{Display, Formatter};

use bimap::BiMap;
use string_cache::DefaultAtom;
use tracing::debug;

use crate::error::{Error, Result};

/// Handle to an address slot in a `LabelTable`.
#[derive(Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub struct Label(usize);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum Reference {
  /// The address of the label.
  Absolute,
  /// The address of the label minus the position of the byte being produced.
  Relative,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct Deferred {
  pub label     : Label,
  pub reference : Reference,
  /// Bit offset of the byte this value yields.
  pub offset    : u32,
}

impl Label {
  pub fn index(&self) -> usize {
    self.0
  }

  /// The absolute address of the label.
  pub fn lazy(self) -> Deferred {
    Deferred { label: self, reference: Reference::Absolute, offset: 0 }
  }

  /// The address of the label relative to the position of the referencing byte.
  pub fn offset(self) -> Deferred {
    Deferred { label: self, reference: Reference::Relative, offset: 0 }
  }
}

impl Display for Label {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "#{}", self.0)
  }
}

impl Deferred {
  /// The same reference, selecting the byte `by` bits further up.
  pub fn shift(&self, by: u32) -> Deferred {
    Deferred { offset: self.offset + by, ..*self }
  }

  /// The full resolved value, before byte selection.
  pub fn value(&self, labels: &LabelTable, position: u64) -> Result<u64> {
    let address = labels.get(self.label).ok_or_else(|| {
      Error::UnresolvedReference { label: labels.name(self.label) }
    })?;
    Ok(
      match self.reference {
        Reference::Absolute => address,
        Reference::Relative => address.wrapping_sub(position)
      }
    )
  }

  /// The byte this value yields when it lands at `position`.
  pub fn eval(&self, labels: &LabelTable, position: u64) -> Result<u8> {
    let value = self.value(labels, position)?;
    Ok(
      match self.offset < 64 {
        true  => ((value >> self.offset) & 0xFF) as u8,
        false => 0
      }
    )
  }
}

/// The label slots of one assembly session.
#[derive(Clone, Debug, Default)]
pub struct LabelTable {
  slots : Vec<Option<u64>>,
  names : BiMap<DefaultAtom, Label>,
}

impl LabelTable {

  pub fn new() -> LabelTable {
    LabelTable {
      slots: vec![],
      names: BiMap::new()
    }
  }

  pub fn len(&self) -> usize {
    self.slots.len()
  }

  pub fn is_empty(&self) -> bool {
    self.slots.is_empty()
  }

  /// A fresh label without a name.
  pub fn anonymous(&mut self) -> Label {
    self.slots.push(None);
    Label(self.slots.len() - 1)
  }

  /// The label called `name`, created on first use.
  pub fn named(&mut self, name: &str) -> Label {
    let atom = DefaultAtom::from(name);
    if let Some(label) = self.names.get_by_left(&atom) {
      return *label;
    }
    let label = self.anonymous();
    self.names.insert(atom, label);
    label
  }

  /// The label called `name` pinned to `address`, for code that must start at a fixed location.
  pub fn fixed(&mut self, name: &str, address: u64) -> Result<Label> {
    let label = self.named(name);
    self.set(label, address)?;
    Ok(label)
  }

  /// Looks up a named label without creating it.
  pub fn lookup(&self, name: &str) -> Option<Label> {
    self.names.get_by_left(&DefaultAtom::from(name)).copied()
  }

  /// The name of a label, or its handle if it is anonymous.
  pub fn name(&self, label: Label) -> String {
    match self.names.get_by_right(&label) {
      Some(name) => name.to_string(),
      None       => label.to_string()
    }
  }

  pub fn get(&self, label: Label) -> Option<u64> {
    self.slots.get(label.0).copied().flatten()
  }

  /**
    Fixes the address of `label`. Setting the address a label already has is a no-op; setting a
    different one is a `LabelConflict`.
  */
  pub fn set(&mut self, label: Label, address: u64) -> Result<()> {
    if label.0 >= self.slots.len() {
      self.slots.resize(label.0 + 1, None);
    }
    match self.slots[label.0] {
      Some(existing) if existing != address => {
        Err(Error::LabelConflict { label: self.name(label), existing, requested: address })
      }
      Some(_) => Ok(()),
      None    => {
        debug!(label = %self.name(label), address, "label defined");
        self.slots[label.0] = Some(address);
        Ok(())
      }
    }
  }

  /// Forgets every address while keeping the labels, so the table can drive a fresh pass.
  pub fn clear_addresses(&mut self) {
    for slot in self.slots.iter_mut() {
      *slot = None;
    }
  }

  /// Named labels with their addresses, in definition order.
  pub fn symbols(&self) -> Vec<(String, Option<u64>)> {
    let mut symbols: Vec<(Label, String)> =
      self.names
          .iter()
          .map(|(name, label)| (*label, name.to_string()))
          .collect();
    symbols.sort();
    symbols
      .into_iter()
      .map(|(label, name)| (name, self.get(label)))
      .collect()
  }
}
