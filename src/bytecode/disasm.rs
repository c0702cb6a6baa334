/*!
  Walks a byte buffer instruction by instruction. Every opcode is classified with the registry
  and its argument fields are decoded from the bytes that follow, so the walk never gets stuck:
  unclassified bytes come out as the Unknown format, one opcode wide. An opcode whose arguments
  would run past the end of the buffer is reported as Unknown as well.
*/

use std::fmt::{Display, Formatter};

use prettytable::{format as TableFormat, Table};

use super::instruction::Decoded;
use super::registry::{InstructionSet, Registry};

/// One disassembled instruction.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record<'a, K> {
  pub address  : u64,
  pub bytes    : &'a [u8],
  pub decoded  : Decoded<K>,
  /// Text of each operand field value, in field order.
  pub operands : Vec<String>,
}

impl<'a, K: Display> Display for Record<'a, K> {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let operands: Vec<String> =
      self.operands
          .iter()
          .cloned()
          .chain(self.decoded.args.iter().map(|arg| arg.to_string()))
          .collect();

    match operands.is_empty() {
      true  => write!(f, "{}", self.decoded.kind),
      false => write!(f, "{} {}", self.decoded.kind, operands.join(", "))
    }
  }
}

/// Lazy disassembly of a buffer. Created by [`disassemble`].
pub struct Disassembly<'a, 'r, I: InstructionSet> {
  registry : &'r Registry<I>,
  data     : &'a [u8],
  origin   : u64,
  pc       : usize,
}

/// Disassembles `data`, whose first byte lives at address `origin`.
pub fn disassemble<'a, 'r, I: InstructionSet>(
  registry: &'r Registry<I>,
  data: &'a [u8],
  origin: u64
) -> Disassembly<'a, 'r, I> {
  Disassembly { registry, data, origin, pc: 0 }
}

impl<'a, 'r, I: InstructionSet> Iterator for Disassembly<'a, 'r, I> {
  type Item = Record<'a, I::Kind>;

  fn next(&mut self) -> Option<Self::Item> {
    let opcode    = self.registry.opcode();
    let remaining = &self.data[self.pc.min(self.data.len())..];
    if remaining.len() < opcode.size {
      return None;
    }

    let raw        = opcode.decode_bits(remaining);
    let classified = self.registry.classify(raw);
    let (format, options) =
      match classified.format.size() <= remaining.len() {
        true  => (classified.format, classified.options),
        false => (self.registry.unknown(), vec![])
      };

    let decoded = self.registry.decode_args(format, raw, options, |i| remaining[i]);
    let record  = Record {
      address  : self.origin + self.pc as u64,
      bytes    : &remaining[..decoded.size],
      operands : format.operand_text(&decoded.options),
      decoded
    };
    self.pc += record.bytes.len();
    Some(record)
  }
}

lazy_static! {
  pub(crate) static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}

/// Formats records as an address / bytes / instruction table.
pub fn listing<'a, K: Display>(records: impl IntoIterator<Item = Record<'a, K>>) -> Table {
  let mut table = Table::new();

  table.set_format(*TABLE_DISPLAY_FORMAT);
  table.set_titles(row![ubr->"Address", ubl->"Bytes", ubl->"Instruction"]);

  for record in records {
    let bytes =
      record.bytes
            .iter()
            .map(|byte| format!("{:02X}", byte))
            .collect::<Vec<String>>()
            .join(" ");
    table.add_row(row![r->format!("{:04X}", record.address), bytes, record.to_string()]);
  }
  table
}

/// The opcode map of a registry: every format with its id and option width.
pub fn opcode_map<I: InstructionSet>(registry: &Registry<I>) -> Table {
  let mut table = Table::new();

  table.set_format(*TABLE_DISPLAY_FORMAT);
  table.set_titles(row![ubl->"Instruction", ubr->"Id", ubr->"Opcodes", ubr->"Size"]);

  for (format, id) in registry.formats() {
    let first = format.pack(id, &[]);
    let last  = first | format.option_mask();
    let opcodes =
      match first == last {
        true  => format!("{:02X}", first),
        false => format!("{:02X}-{:02X}", first, last)
      };
    table.add_row(row![format.kind.to_string(), r->id, r->opcodes, r->format.size()]);
  }
  table
}
