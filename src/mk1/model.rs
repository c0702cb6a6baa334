/*!
  The mk1 execution engine. A `Context` owns the register file, the stack pointer, the program
  counter, the carry flag and a memory. Each `step` fetches the opcode at `pc`, classifies it
  with the registry, decodes the argument fields that follow, and executes the instruction.
  Unless the instruction sets `pc` itself, `pc` then moves past the opcode and its arguments.

  The stack grows downward from address zero: a push decrements `sp` and stores at `[sp]`, a pop
  loads `[sp]` and increments `sp`. 16-bit values keep their low byte at the lower address.

  A step that leaves `pc` where it was is the halt signal. `Halt` and unclassified opcodes do
  exactly that.
*/

use std::fmt::{Display, Formatter};

use prettytable::Table;
use tracing::{debug, trace};

use super::alu;
use super::instructions::{Instr, Mk1};
use super::regs::{Reg16, RegFile};
use crate::bytecode::disasm::TABLE_DISPLAY_FORMAT;
use crate::bytecode::raw::le;
use crate::bytecode::registry::Registry;
use crate::memory::Memory;

#[cfg(feature = "trace_computation")]
use crate::bytecode::disasm::Record;

/// Where `pc` goes after an instruction.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Flow {
  /// Past the instruction.
  Next,
  Jump(u16),
  /// Nowhere.
  Stay,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RunOptions {
  /// Upper bound on executed steps; a program that never halts stops here.
  pub max_steps: usize,
}

impl Default for RunOptions {
  fn default() -> RunOptions {
    RunOptions { max_steps: 1000 }
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct RunOutcome {
  /// Steps that moved `pc`.
  pub steps  : usize,
  /// Whether a step left `pc` in place before the step limit was hit.
  pub halted : bool,
}

pub struct Context<'r, M: Memory> {
  registry : &'r Registry<Mk1>,
  pub mem  : M,
  pub reg  : RegFile,
  pub sp   : u16,
  pub pc   : u16,
  pub cf   : bool,

  #[cfg(feature = "trace_computation")] last : String,
}

impl<'r, M: Memory> Context<'r, M> {

  // region Display methods

  fn make_stack_table(&self, depth: usize) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    let used = 0u16.wrapping_sub(self.sp) as usize;
    for i in 0..used.min(depth) {
      let address = self.sp.wrapping_add(i as u16);
      let label = match i {
        0 => format!("* --> [{:04X}] =", address),
        _ => format!("[{:04X}] =", address)
      };
      table.add_row(row![r->label, format!("{:02X}", self.mem.get(address))]);
    }
    table
  }

  fn make_register_table(&self) -> Table {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Register", ubl->"Contents"]);

    for (reg, value) in self.reg.iter() {
      table.add_row(row![r->format!("{} =", reg), format!("{:02X}", value)]);
    }
    table.add_row(row![r->"PC =", format!("{:04X}", self.pc)]);
    table.add_row(row![r->"SP =", format!("{:04X}", self.sp)]);
    table.add_row(row![r->"CF =", self.cf as u8]);
    table
  }

  // endregion

  pub fn new(registry: &'r Registry<Mk1>, mem: M) -> Context<'r, M> {
    Context {
      registry,
      mem,
      reg : RegFile::new(),
      sp  : 0,
      pc  : 0,
      cf  : true,
      #[cfg(feature = "trace_computation")] last : String::new(),
    }
  }

  // region Stack

  pub fn push8(&mut self, value: u8) {
    self.sp = self.sp.wrapping_sub(1);
    self.mem.set(self.sp, value);
  }

  pub fn pop8(&mut self) -> u8 {
    let value = self.mem.get(self.sp);
    self.sp = self.sp.wrapping_add(1);
    value
  }

  pub fn push16(&mut self, value: u16) {
    for byte in le::U16.encode(value as i128).into_iter().rev() {
      self.push8(byte);
    }
  }

  pub fn pop16(&mut self) -> u16 {
    let low  = self.pop8();
    let high = self.pop8();
    le::U16.decode(&[low, high]) as u16
  }

  // endregion

  fn address(&self, base: Reg16, offset: i16) -> u16 {
    self.reg.get16(base).wrapping_add(offset as u16)
  }

  /// Runs the semantics of `instr`. `next` is the address following it.
  pub fn execute(&mut self, instr: Instr, next: u16) -> Flow {
    match instr {

      Instr::Init => {
        self.sp = 0;
        Flow::Jump(0)
      }

      Instr::IntCall => Flow::Next,

      Instr::LoadFar { from, offset } => {
        let value = self.mem.get(self.address(from, offset));
        self.push8(value);
        Flow::Next
      }

      Instr::SaveFar { to, offset } => {
        let value   = self.pop8();
        let address = self.address(to, offset);
        self.mem.set(address, value);
        Flow::Next
      }

      Instr::LoadNear { from, offset } => self.execute(Instr::LoadFar { from, offset: offset as i16 }, next),

      Instr::SaveNear { to, offset }   => self.execute(Instr::SaveFar { to, offset: offset as i16 }, next),

      Instr::Load { from }             => self.execute(Instr::LoadFar { from, offset: 0 }, next),

      Instr::Save { to }               => self.execute(Instr::SaveFar { to, offset: 0 }, next),

      Instr::SaveImm { to, value } => {
        self.mem.set(self.reg.get16(to), value);
        Flow::Next
      }

      Instr::Push(from) => {
        self.push8(self.reg.get(from));
        Flow::Next
      }

      Instr::Pop(to) => {
        let value = self.pop8();
        self.reg.set(to, value);
        Flow::Next
      }

      Instr::Calc(function) => {
        let rhs = self.pop8();
        let lhs = match function.arity() {
          2 => self.pop8(),
          _ => 0
        };
        let (value, carry) = alu::calc(function, lhs, rhs, self.cf);
        self.cf = carry;
        self.push8(value);
        Flow::Next
      }

      Instr::Logic(function) => {
        let rhs = self.pop8();
        let lhs = match function.arity() {
          2 => self.pop8(),
          _ => 0
        };
        self.push8(alu::logic(function, lhs, rhs));
        Flow::Next
      }

      Instr::BranchCF(address) => match self.cf {
        true  => Flow::Jump(address),
        false => Flow::Next
      },

      Instr::BranchZero(address) => match self.pop8() {
        0 => Flow::Jump(address),
        _ => Flow::Next
      },

      Instr::ImmVal(value) => {
        self.push8(value);
        Flow::Next
      }

      Instr::Jump(address) => Flow::Jump(address),

      Instr::Call(address) => {
        self.push16(next);
        Flow::Jump(address)
      }

      Instr::Return => Flow::Jump(self.pop16()),

      Instr::Adjust(offset) => {
        self.sp = self.sp.wrapping_add(offset as u16);
        Flow::Next
      }

      Instr::Enter(bp) => {
        self.push16(self.reg.get16(bp));
        self.reg.set16(bp, self.sp);
        Flow::Next
      }

      Instr::Leave(bp) => {
        self.sp = self.reg.get16(bp);
        let saved = self.pop16();
        self.reg.set16(bp, saved);
        Flow::Next
      }

      Instr::CallPtr => {
        let target = self.pop16();
        self.push16(next);
        Flow::Jump(target)
      }

      Instr::Halt | Instr::Unknown(_) => Flow::Stay,

    } // end match on instr
  }

  /// Executes one instruction. Returns whether `pc` moved.
  pub fn step(&mut self) -> bool {
    let pc       = self.pc;
    let registry = self.registry;
    let mem      = &self.mem;

    let (instr, decoded) = registry.decode_instr(|i| mem.get(pc.wrapping_add(i as u16)));
    trace!(pc, kind = %decoded.kind, size = decoded.size, "step");

    #[cfg(feature = "trace_computation")]
    {
      let operands =
        registry.format(decoded.kind)
                .map(|format| format.operand_text(&decoded.options))
                .unwrap_or_default();
      self.last = Record { address: pc as u64, bytes: &[], decoded: decoded.clone(), operands }.to_string();
    }

    let next = pc.wrapping_add(decoded.size as u16);
    match self.execute(instr, next) {
      Flow::Next          => self.pc = next,
      Flow::Jump(address) => self.pc = address,
      Flow::Stay          => {}
    }
    self.pc != pc
  }

  /// Steps until the halt signal or `options.max_steps`.
  pub fn run(&mut self, options: RunOptions) -> RunOutcome {
    let mut steps = 0;

    while steps < options.max_steps {
      let moved = self.step();

      #[cfg(feature = "trace_computation")] println!("{}", self);

      if !moved {
        debug!(steps, pc = self.pc, "halted");
        return RunOutcome { steps, halted: true };
      }
      steps += 1;
    }

    debug!(steps, pc = self.pc, "step limit reached");
    RunOutcome { steps, halted: false }
  }
}

impl<'r, M: Memory> Display for Context<'r, M> {

  #[cfg(feature = "trace_computation")]
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let reg_table   = self.make_register_table();
    let stack_table = self.make_stack_table(8);

    let mut combined_table = table!([reg_table, stack_table]);

    combined_table.set_titles(row![ub->"Registers", ub->"Stack"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "Executed: {}\n{}", self.last, combined_table)
  }

  #[cfg(not(feature = "trace_computation"))]
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let reg_table   = self.make_register_table();
    let stack_table = self.make_stack_table(8);

    let mut combined_table = table!([reg_table, stack_table]);

    combined_table.set_titles(row![ub->"Registers", ub->"Stack"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    write!(f, "{}", combined_table)
  }
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::assembly::parse_assembly;
  use crate::bytecode::label::LabelTable;
  use crate::memory::Overlay;
  use crate::mk1::Reg;

  fn assemble(registry: &Registry<Mk1>, labels: &mut LabelTable, text: &str) -> Vec<u8> {
    parse_assembly(text, registry, labels)
      .unwrap()
      .assemble(labels)
      .unwrap()
  }

  const SUM_DOWN: &str = "
        ImmVal 3
        Pop A
        ImmVal 0
        Pop B
    start:
        Push A
        BranchZero end
        Push A           # B += A
        Push B
        Calc ADD
        Pop B
        Push A           # A -= 1
        ImmVal 1
        Calc SUB
        Pop A
        Jump start
    end:
        Halt
  ";

  #[test]
  fn loop_accumulates_and_halts(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();
    let image      = assemble(&registry, &mut labels, SUM_DOWN);

    let mut ctx = Context::new(&registry, Overlay::new(&image));
    let outcome = ctx.run(RunOptions::default());

    // 4 setup steps, 11 per trip, 2 to leave the loop.
    assert_eq!(outcome, RunOutcome { steps: 4 + 3 * 11 + 2, halted: true });
    assert_eq!(ctx.reg.get(Reg::A), 0);
    assert_eq!(ctx.reg.get(Reg::B), 6);
    assert_eq!(ctx.sp, 0);
    assert_eq!(Some(ctx.pc as u64), labels.get(labels.lookup("end").unwrap()));
  }

  #[test]
  fn loop_counts_trips(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();
    let text       = SUM_DOWN.replace("Push A           # B += A", "ImmVal 1");
    let image      = assemble(&registry, &mut labels, &text);

    let mut ctx = Context::new(&registry, Overlay::new(&image));
    assert!(ctx.run(RunOptions::default()).halted);
    assert_eq!(ctx.reg.get(Reg::B), 3);
    assert_eq!(ctx.reg.get(Reg::A), 0);
  }

  #[test]
  fn step_limit_bounds_endless_programs(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();
    let image      = assemble(&registry, &mut labels, "top: ImmVal 0\nPop A\nJump top");

    let mut ctx = Context::new(&registry, Overlay::new(&image));
    assert_eq!(ctx.run(RunOptions { max_steps: 10 }), RunOutcome { steps: 10, halted: false });
  }

  #[test]
  fn stack_layout(){
    let registry = Mk1::registry().unwrap();
    let mut ctx  = Context::new(&registry, Overlay::new(&[]));

    ctx.push16(0x1234);
    assert_eq!(ctx.sp, 0xFFFE);
    assert_eq!(ctx.mem.get(0xFFFE), 0x34);
    assert_eq!(ctx.mem.get(0xFFFF), 0x12);

    ctx.push8(0xAB);
    assert_eq!(ctx.pop8(), 0xAB);
    assert_eq!(ctx.pop16(), 0x1234);
    assert_eq!(ctx.sp, 0);
  }

  #[test]
  fn call_with_frame(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();
    let image      = assemble(&registry, &mut labels, "
        ImmVal 7
        Call double
        Pop B
        Halt
    double:              # doubles the byte above the return address
        Enter HL
        LoadNear HL, 4
        Calc SHL
        SaveNear HL, 4
        Leave HL
        Return
    ");

    let mut ctx = Context::new(&registry, Overlay::new(&image));
    assert!(ctx.run(RunOptions::default()).halted);
    assert_eq!(ctx.reg.get(Reg::B), 14);
    assert_eq!(ctx.reg.get16(Reg16::HL), 0);
    assert_eq!(ctx.sp, 0);
    assert_eq!(ctx.pc, 6);
  }

  #[test]
  fn call_through_pointer(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();
    let image      = assemble(&registry, &mut labels, "
        ImmVal 0         # target, high byte
        ImmVal target    # target, low byte
        CallPtr
        Halt
    target:
        ImmVal 9
        Pop D
        Return
    ");

    let mut ctx = Context::new(&registry, Overlay::new(&image));
    assert!(ctx.run(RunOptions::default()).halted);
    assert_eq!(ctx.reg.get(Reg::D), 9);
    assert_eq!(ctx.sp, 0);
    assert_eq!(ctx.pc, 5);
  }

  #[test]
  fn memory_access(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();
    let image      = assemble(&registry, &mut labels, "
        ImmVal 0x12
        Pop H
        ImmVal 0x00
        Pop L
        SaveImm HL, 0x55
        LoadFar HL, 0
        SaveFar HL, 0x100
        Load HL
        SaveNear HL, -1
        Adjust -3
        Adjust 3
        Halt
    ");

    let mut ctx = Context::new(&registry, Overlay::new(&image));
    assert!(ctx.run(RunOptions::default()).halted);
    assert_eq!(ctx.mem.get(0x1200), 0x55);
    assert_eq!(ctx.mem.get(0x1300), 0x55);
    assert_eq!(ctx.mem.get(0x11FF), 0x55);
    assert_eq!(ctx.sp, 0);
    assert_eq!(image.len(), 24);
  }

  #[test]
  fn carry_branch_and_logic(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();
    let image      = assemble(&registry, &mut labels, "
        ImmVal 0xF0
        ImmVal 0x3C
        Logic AND
        Pop A
        ImmVal 0xFF
        ImmVal 1
        Calc ADD
        BranchCF carried
        Halt
    carried:
        Pop B
        done: Halt
    ");

    let mut ctx = Context::new(&registry, Overlay::new(&image));
    assert!(ctx.run(RunOptions::default()).halted);
    assert_eq!(ctx.reg.get(Reg::A), 0x30);
    assert!(ctx.cf);
    assert_eq!(Some(ctx.pc as u64), labels.get(labels.lookup("done").unwrap()));
  }

  #[test]
  fn halt_and_unknown_stay_put(){
    let registry = Mk1::registry().unwrap();

    let image   = [0xFFu8];
    let mut ctx = Context::new(&registry, Overlay::new(&image));
    assert!(!ctx.step());
    assert_eq!(ctx.pc, 0);

    let image   = [0x4Du8];
    let mut ctx = Context::new(&registry, Overlay::new(&image));
    assert_eq!(ctx.run(RunOptions::default()), RunOutcome { steps: 0, halted: true });
  }

  #[test]
  fn init_resets(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();
    let image      = assemble(&registry, &mut labels, "ImmVal 1\nINTCall\nInit");

    let mut ctx = Context::new(&registry, Overlay::new(&image));
    assert!(ctx.step());
    assert_eq!(ctx.sp, 0xFFFF);
    assert!(ctx.step());
    assert_eq!(ctx.pc, 3);
    assert!(ctx.step());
    assert_eq!((ctx.pc, ctx.sp), (0, 0));
  }

  #[test]
  fn state_table(){
    let registry = Mk1::registry().unwrap();
    let ctx      = Context::new(&registry, Overlay::new(&[]));
    let text     = ctx.to_string();
    assert!(text.contains("PC ="));
    assert!(text.contains("Registers"));
  }
}
