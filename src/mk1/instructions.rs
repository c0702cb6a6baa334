/*!
  The mk1 instruction set: a byte wide opcode, a downward growing byte stack, and eight byte
  registers paired into four 16-bit address registers.

  The order of `Mk1::catalog` decides the opcode map, so new instructions go at the end. Three
  opcodes are pinned: `Init` at `0x00`, `INTCall` at `0xCD` and `Halt` at `0xFF`.

  | Instruction  | Operand       | Arguments | Effect                                        |
  |:-------------|:--------------|:----------|:----------------------------------------------|
  | `Init`       |               |           | `sp = 0`, `pc = 0`                            |
  | `INTCall`    |               |           | nothing                                       |
  | `LoadFar`    | `from: Reg16` | `i16`     | push `mem[from + offset]`                     |
  | `SaveFar`    | `to: Reg16`   | `i16`     | pop into `mem[to + offset]`                   |
  | `LoadNear`   | `from: Reg16` | `i8`      | push `mem[from + offset]`                     |
  | `SaveNear`   | `to: Reg16`   | `i8`      | pop into `mem[to + offset]`                   |
  | `Load`       | `from: Reg16` |           | push `mem[from]`                              |
  | `Save`       | `to: Reg16`   |           | pop into `mem[to]`                            |
  | `SaveImm`    | `to: Reg16`   | `u8`      | `mem[to] = value`                             |
  | `Push`       | `from: Reg`   |           | push `from`                                   |
  | `Pop`        | `to: Reg`     |           | pop into `to`                                 |
  | `Calc`       | `fn: CalcFn`  |           | pop operands, push result, set carry          |
  | `Logic`      | `fn: LogicFn` |           | pop operands, push result                     |
  | `BranchCF`   |               | `u16`     | jump if carry                                 |
  | `BranchZero` |               | `u16`     | pop, jump if zero                             |
  | `ImmVal`     |               | `u8`      | push value                                    |
  | `Jump`       |               | `u16`     | jump                                          |
  | `Call`       |               | `u16`     | push return address, jump                     |
  | `Return`     |               |           | pop `pc`                                      |
  | `Adjust`     |               | `i16`     | `sp += offset`                                |
  | `Enter`      | `bp: Reg16`   |           | push `bp`, `bp = sp`                          |
  | `Leave`      | `bp: Reg16`   |           | `sp = bp`, pop `bp`                           |
  | `CallPtr`    |               |           | pop target, push return address, jump         |
  | `Halt`       |               |           | stays put                                     |

  Arguments are little endian. Binary `Calc` and `Logic` functions pop the right operand first.
*/

use std::convert::TryFrom;

use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum::VariantNames;
use strum_macros::{Display as StrumDisplay, EnumVariantNames};

use super::regs::{Reg, Reg16};
use crate::bytecode::{
  instruction::{Arg, Decoded, Format, Invocation},
  raw::{le, RawField, I8, U8},
  registry::{InstructionSet, Registry}
};
use crate::error::Result;

#[derive(StrumDisplay, Clone, Copy, Eq, PartialEq, Debug, Hash)]
pub enum Op {
  Init,
  INTCall,
  LoadFar,
  SaveFar,
  LoadNear,
  SaveNear,
  Load,
  Save,
  SaveImm,
  Push,
  Pop,
  Calc,
  Logic,
  BranchCF,
  BranchZero,
  ImmVal,
  Jump,
  Call,
  Return,
  Adjust,
  Enter,
  Leave,
  CallPtr,
  Halt,
  Unknown,
}

/// Functions of `Calc`. The shifts take one operand, the rest two.
#[allow(clippy::upper_case_acronyms)]
#[derive(
  StrumDisplay, EnumVariantNames, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq,               PartialEq,     Debug
)]
#[repr(u8)]
pub enum CalcFn {
  SHL,
  SHR,
  /// Rotate left through carry.
  RCL,
  /// Rotate right through carry.
  RCR,
  ADD,
  SUB,
  /// Add with carry.
  ADC,
  /// Subtract with carry, the carry being the inverted borrow.
  SUC,
}

/// Functions of `Logic`. `NOT` takes one operand, the rest two.
#[allow(clippy::upper_case_acronyms)]
#[derive(
  StrumDisplay, EnumVariantNames, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,             Eq,               PartialEq,     Debug
)]
#[repr(u8)]
pub enum LogicFn {
  NOT,
  AND,
  OR,
  XOR,
}

/// A decoded mk1 instruction with its operands typed.
#[derive(Clone, Copy, Eq, PartialEq, Debug)]
pub enum Instr {
  Init,
  IntCall,
  LoadFar  { from: Reg16, offset: i16 },
  SaveFar  { to: Reg16,   offset: i16 },
  LoadNear { from: Reg16, offset: i8  },
  SaveNear { to: Reg16,   offset: i8  },
  Load     { from: Reg16 },
  Save     { to: Reg16 },
  SaveImm  { to: Reg16,   value: u8   },
  Push(Reg),
  Pop(Reg),
  Calc(CalcFn),
  Logic(LogicFn),
  BranchCF(u16),
  BranchZero(u16),
  ImmVal(u8),
  Jump(u16),
  Call(u16),
  Return,
  Adjust(i16),
  Enter(Reg16),
  Leave(Reg16),
  CallPtr,
  Halt,
  /// The raw opcode of an unclassified byte.
  Unknown(u8),
}

pub struct Mk1;

impl Mk1 {
  pub fn registry() -> Result<Registry<Mk1>> {
    Registry::new()
  }
}

impl InstructionSet for Mk1 {
  type Kind  = Op;
  type Instr = Instr;
  const OPCODE: RawField = U8;

  fn catalog() -> Vec<Format<Op>> {
    let op = |kind| Format::new(kind, U8);
    vec![
      op(Op::Init).reserved(0x00),
      op(Op::INTCall).reserved(0xCD),

      op(Op::LoadFar).operand("from", Reg16::VARIANTS).arg(le::I16),
      op(Op::SaveFar).operand("to", Reg16::VARIANTS).arg(le::I16),
      op(Op::LoadNear).operand("from", Reg16::VARIANTS).arg(I8),
      op(Op::SaveNear).operand("to", Reg16::VARIANTS).arg(I8),
      op(Op::Load).operand("from", Reg16::VARIANTS),
      op(Op::Save).operand("to", Reg16::VARIANTS),
      op(Op::SaveImm).operand("to", Reg16::VARIANTS).arg(U8),

      op(Op::Push).operand("from", Reg::VARIANTS),
      op(Op::Pop).operand("to", Reg::VARIANTS),

      op(Op::Calc).operand("fn", CalcFn::VARIANTS),
      op(Op::Logic).operand("fn", LogicFn::VARIANTS),

      op(Op::BranchCF).arg(le::U16),
      op(Op::BranchZero).arg(le::U16),
      op(Op::ImmVal).arg(U8),
      op(Op::Jump).arg(le::U16),
      op(Op::Call).arg(le::U16),
      op(Op::Return),
      op(Op::Adjust).arg(le::I16),
      op(Op::Enter).operand("bp", Reg16::VARIANTS),
      op(Op::Leave).operand("bp", Reg16::VARIANTS),
      op(Op::CallPtr),

      op(Op::Halt).reserved(0xFF),
    ]
  }

  fn unknown() -> Format<Op> {
    Format::new(Op::Unknown, U8)
  }

  fn lift(decoded: &Decoded<Op>) -> Instr {
    typed(decoded).unwrap_or(Instr::Unknown(decoded.raw as u8))
  }
}

fn typed(decoded: &Decoded<Op>) -> Option<Instr> {
  // Every mk1 operand format has a single field.
  let option = u8::try_from(decoded.options.first().copied().unwrap_or(0)).ok()?;
  let reg    = || Reg::try_from(option).ok();
  let pair   = || Reg16::try_from(option).ok();

  let instr =
    match (decoded.kind, decoded.args.as_slice()) {
      (Op::Init,       [])         => Instr::Init,
      (Op::INTCall,    [])         => Instr::IntCall,
      (Op::LoadFar,    [offset])   => Instr::LoadFar { from: pair()?, offset: *offset as i16 },
      (Op::SaveFar,    [offset])   => Instr::SaveFar { to: pair()?, offset: *offset as i16 },
      (Op::LoadNear,   [offset])   => Instr::LoadNear { from: pair()?, offset: *offset as i8 },
      (Op::SaveNear,   [offset])   => Instr::SaveNear { to: pair()?, offset: *offset as i8 },
      (Op::Load,       [])         => Instr::Load { from: pair()? },
      (Op::Save,       [])         => Instr::Save { to: pair()? },
      (Op::SaveImm,    [value])    => Instr::SaveImm { to: pair()?, value: *value as u8 },
      (Op::Push,       [])         => Instr::Push(reg()?),
      (Op::Pop,        [])         => Instr::Pop(reg()?),
      (Op::Calc,       [])         => Instr::Calc(CalcFn::try_from(option).ok()?),
      (Op::Logic,      [])         => Instr::Logic(LogicFn::try_from(option).ok()?),
      (Op::BranchCF,   [address])  => Instr::BranchCF(*address as u16),
      (Op::BranchZero, [address])  => Instr::BranchZero(*address as u16),
      (Op::ImmVal,     [value])    => Instr::ImmVal(*value as u8),
      (Op::Jump,       [address])  => Instr::Jump(*address as u16),
      (Op::Call,       [address])  => Instr::Call(*address as u16),
      (Op::Return,     [])         => Instr::Return,
      (Op::Adjust,     [offset])   => Instr::Adjust(*offset as i16),
      (Op::Enter,      [])         => Instr::Enter(pair()?),
      (Op::Leave,      [])         => Instr::Leave(pair()?),
      (Op::CallPtr,    [])         => Instr::CallPtr,
      (Op::Halt,       [])         => Instr::Halt,
      _                            => return None
    };
  Some(instr)
}

// region Builders

fn with(kind: Op, option: u8) -> Invocation<Op> {
  Invocation::new(kind).option(option as u64)
}

pub fn init() -> Invocation<Op> {
  Invocation::new(Op::Init)
}

pub fn int_call() -> Invocation<Op> {
  Invocation::new(Op::INTCall)
}

pub fn load_far(from: Reg16, offset: impl Into<Arg>) -> Invocation<Op> {
  with(Op::LoadFar, from.into()).arg(offset)
}

pub fn save_far(to: Reg16, offset: impl Into<Arg>) -> Invocation<Op> {
  with(Op::SaveFar, to.into()).arg(offset)
}

pub fn load_near(from: Reg16, offset: impl Into<Arg>) -> Invocation<Op> {
  with(Op::LoadNear, from.into()).arg(offset)
}

pub fn save_near(to: Reg16, offset: impl Into<Arg>) -> Invocation<Op> {
  with(Op::SaveNear, to.into()).arg(offset)
}

pub fn load(from: Reg16) -> Invocation<Op> {
  with(Op::Load, from.into())
}

pub fn save(to: Reg16) -> Invocation<Op> {
  with(Op::Save, to.into())
}

pub fn save_imm(to: Reg16, value: impl Into<Arg>) -> Invocation<Op> {
  with(Op::SaveImm, to.into()).arg(value)
}

pub fn push(from: Reg) -> Invocation<Op> {
  with(Op::Push, from.into())
}

pub fn pop(to: Reg) -> Invocation<Op> {
  with(Op::Pop, to.into())
}

pub fn calc(function: CalcFn) -> Invocation<Op> {
  with(Op::Calc, function.into())
}

pub fn logic(function: LogicFn) -> Invocation<Op> {
  with(Op::Logic, function.into())
}

pub fn branch_cf(address: impl Into<Arg>) -> Invocation<Op> {
  Invocation::new(Op::BranchCF).arg(address)
}

pub fn branch_zero(address: impl Into<Arg>) -> Invocation<Op> {
  Invocation::new(Op::BranchZero).arg(address)
}

pub fn imm_val(value: impl Into<Arg>) -> Invocation<Op> {
  Invocation::new(Op::ImmVal).arg(value)
}

pub fn jump(address: impl Into<Arg>) -> Invocation<Op> {
  Invocation::new(Op::Jump).arg(address)
}

pub fn call(address: impl Into<Arg>) -> Invocation<Op> {
  Invocation::new(Op::Call).arg(address)
}

pub fn ret() -> Invocation<Op> {
  Invocation::new(Op::Return)
}

pub fn adjust(offset: impl Into<Arg>) -> Invocation<Op> {
  Invocation::new(Op::Adjust).arg(offset)
}

pub fn enter(bp: Reg16) -> Invocation<Op> {
  with(Op::Enter, bp.into())
}

pub fn leave(bp: Reg16) -> Invocation<Op> {
  with(Op::Leave, bp.into())
}

pub fn call_ptr() -> Invocation<Op> {
  Invocation::new(Op::CallPtr)
}

pub fn halt() -> Invocation<Op> {
  Invocation::new(Op::Halt)
}

// endregion
