/*!
  The arithmetic and logic unit. Every arithmetic function returns the result byte together
  with the new carry flag.

  Subtraction is addition of the one's complement of the right operand, with the carry in
  standing for "no borrow". `sub(l, r, true)` is therefore `l - r`, and the carry out is set
  exactly when no borrow occurred (`l >= r`).
*/

use super::instructions::{CalcFn, LogicFn};

pub fn shift_left(value: u8, carry: bool) -> (u8, bool) {
  (value << 1 | carry as u8, value & 0x80 != 0)
}

pub fn shift_right(value: u8, carry: bool) -> (u8, bool) {
  (value >> 1 | if carry { 0x80 } else { 0 }, value & 0x01 != 0)
}

/// The carry out is bit 8 of the full sum.
pub fn add(lhs: u8, rhs: u8, carry: bool) -> (u8, bool) {
  let sum = lhs as u16 + rhs as u16 + carry as u16;
  (sum as u8, sum & 0x100 != 0)
}

pub fn sub(lhs: u8, rhs: u8, carry: bool) -> (u8, bool) {
  add(lhs, !rhs, carry)
}

impl CalcFn {
  /// Number of operands popped from the stack.
  pub fn arity(self) -> usize {
    match self {
      CalcFn::SHL | CalcFn::SHR | CalcFn::RCL | CalcFn::RCR => 1,
      _ => 2
    }
  }
}

impl LogicFn {
  pub fn arity(self) -> usize {
    match self {
      LogicFn::NOT => 1,
      _ => 2
    }
  }
}

/// Applies `function`. Unary functions read `rhs` only.
pub fn calc(function: CalcFn, lhs: u8, rhs: u8, carry: bool) -> (u8, bool) {
  match function {
    CalcFn::SHL => shift_left(rhs, false),
    CalcFn::SHR => shift_right(rhs, false),
    CalcFn::RCL => shift_left(rhs, carry),
    CalcFn::RCR => shift_right(rhs, carry),
    CalcFn::ADD => add(lhs, rhs, false),
    CalcFn::SUB => sub(lhs, rhs, true),
    CalcFn::ADC => add(lhs, rhs, carry),
    CalcFn::SUC => sub(lhs, rhs, carry),
  }
}

/// Applies `function`. `NOT` reads `rhs` only.
pub fn logic(function: LogicFn, lhs: u8, rhs: u8) -> u8 {
  match function {
    LogicFn::NOT => !rhs,
    LogicFn::AND => lhs & rhs,
    LogicFn::OR  => lhs | rhs,
    LogicFn::XOR => lhs ^ rhs,
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn shifts(){
    assert_eq!(shift_left(0x80, false), (0x00, true));
    assert_eq!(shift_left(0x41, true), (0x83, false));
    assert_eq!(shift_right(0x01, false), (0x00, true));
    assert_eq!(shift_right(0x02, true), (0x81, false));
  }

  #[test]
  fn addition(){
    assert_eq!(add(0xFF, 0x01, false), (0x00, true));
    assert_eq!(add(0x7F, 0x01, false), (0x80, false));
    assert_eq!(add(0xFF, 0xFF, true), (0xFF, true));
  }

  #[test]
  fn subtraction_carries_when_no_borrow(){
    assert_eq!(sub(5, 3, true), (2, true));
    assert_eq!(sub(3, 3, true), (0, true));
    assert_eq!(sub(3, 5, true), (0xFE, false));
    // Borrow in.
    assert_eq!(sub(5, 3, false), (1, true));
    assert_eq!(sub(0, 0, false), (0xFF, false));
  }

  #[test]
  fn multi_byte_subtraction_chains_carry(){
    // 0x0100 - 0x0001 = 0x00FF
    let (low, carry)  = calc(CalcFn::SUB, 0x00, 0x01, true);
    let (high, carry) = calc(CalcFn::SUC, 0x01, 0x00, carry);
    assert_eq!((high, low, carry), (0x00, 0xFF, true));
  }

  #[test]
  fn rotates_through_carry(){
    assert_eq!(calc(CalcFn::RCL, 0, 0x80, true), (0x01, true));
    assert_eq!(calc(CalcFn::RCR, 0, 0x01, false), (0x00, true));
    assert_eq!(CalcFn::RCL.arity(), 1);
    assert_eq!(CalcFn::ADC.arity(), 2);
  }

  #[test]
  fn logic_functions(){
    assert_eq!(logic(LogicFn::NOT, 0, 0x0F), 0xF0);
    assert_eq!(logic(LogicFn::AND, 0xF0, 0x3C), 0x30);
    assert_eq!(logic(LogicFn::OR,  0xF0, 0x0F), 0xFF);
    assert_eq!(logic(LogicFn::XOR, 0xFF, 0x0F), 0xF0);
    assert_eq!(LogicFn::NOT.arity(), 1);
  }
}
