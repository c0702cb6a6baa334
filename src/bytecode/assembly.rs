/*!
  The human readable textual form of a program is called assembly. This module parses assembly
  into a `Code`, using the format names of a registry as mnemonics. One statement per line:

  ```text
  # Comments run to the end of the line.
  start:                     # a label definition
      ImmVal 3               # mnemonic and arguments
      Pop A                  # an embedded operand is named by its variant
      Move FE, 1, -3         # integer operand fields are numbers, one token per field
      LoadFar BA, -2         # arguments are separated by commas
      Jump start             # a label as an argument is its absolute address
      Jump ~start            # `~label` is its address relative to the referencing byte
  end: Halt                  # a label and a statement may share a line
      .byte 1, 0x02, end     # raw data bytes
  ```

  Numbers are decimal or `0x` hexadecimal, optionally negative.
*/

use std::convert::TryFrom;

use nom::{
  IResult,
  branch::alt,
  bytes::complete::tag,
  character::complete::{
    alpha1,
    alphanumeric1,
    char as one_char,
    digit1,
    hex_digit1,
    space0,
    space1
  },
  combinator::{all_consuming, map, map_res, opt, recognize},
  multi::{many0, separated_list},
  sequence::{delimited, pair, preceded, terminated, tuple}
};

use super::code::Code;
use super::instruction::{Arg, Invocation, Values};
use super::label::LabelTable;
use super::raw::U8;
use super::registry::{InstructionSet, Registry};
use crate::error::{Error, Result};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
enum Token<'a> {
  Number(i128),
  Name(&'a str),
  Relative(&'a str),
}

#[derive(Clone, Eq, PartialEq, Debug)]
struct Line<'a> {
  label     : Option<&'a str>,
  statement : Option<(&'a str, Vec<Token<'a>>)>,
}

fn identifier(input: &str) -> IResult<&str, &str> {
  recognize(
    pair(
      alt((alpha1, tag("_"))),
      many0(alt((alphanumeric1, tag("_"))))
    )
  )(input)
}

fn number(input: &str) -> IResult<&str, i128> {
  map(
    pair(
      opt(one_char('-')),
      alt((
        map_res(preceded(tag("0x"), hex_digit1), |digits: &str| i128::from_str_radix(digits, 16)),
        map_res(digit1, |digits: &str| digits.parse::<i128>())
      ))
    ),
    |(sign, value)| match sign {
      Some(_) => -value,
      None    => value
    }
  )(input)
}

fn token(input: &str) -> IResult<&str, Token> {
  alt((
    map(number, Token::Number),
    map(preceded(one_char('~'), identifier), Token::Relative),
    map(identifier, Token::Name)
  ))(input)
}

fn mnemonic(input: &str) -> IResult<&str, &str> {
  recognize(pair(opt(one_char('.')), identifier))(input)
}

fn statement(input: &str) -> IResult<&str, (&str, Vec<Token>)> {
  pair(
    mnemonic,
    map(
      opt(
        preceded(
          space1,
          separated_list(delimited(space0, one_char(','), space0), token)
        )
      ),
      |tokens| tokens.unwrap_or_default()
    )
  )(input)
}

fn line(input: &str) -> IResult<&str, Line> {
  all_consuming(
    map(
      pair(
        opt(terminated(identifier, tuple((space0, one_char(':'), space0)))),
        opt(statement)
      ),
      |(label, statement)| Line { label, statement }
    )
  )(input)
}

fn token_arg(labels: &mut LabelTable, token: &Token) -> Arg {
  match token {
    Token::Number(value)  => Arg::Value(*value),
    Token::Name(name)     => Arg::Deferred(labels.named(name).lazy()),
    Token::Relative(name) => Arg::Deferred(labels.named(name).offset())
  }
}

fn statement_code<I: InstructionSet>(
  registry : &Registry<I>,
  labels   : &mut LabelTable,
  line     : usize,
  mnemonic : &str,
  tokens   : &[Token]
) -> Result<Code> {
  let syntax = |message: String| Error::Syntax { line, message };

  if mnemonic == ".byte" {
    let mut code = Code::new();
    for token in tokens {
      code.field(U8, token_arg(labels, token));
    }
    return Ok(code);
  }

  let format =
    registry
      .formats()
      .map(|(format, _)| format)
      .find(|format| format.kind.to_string() == mnemonic)
      .ok_or_else(|| syntax(format!("{} is not an instruction", mnemonic)))?;

  let mut invocation = Invocation::new(format.kind);
  let mut tokens     = tokens.iter();
  for operand in format.operands.iter() {
    let option = match (operand.values, tokens.next()) {
      (Values::Named(variants), Some(Token::Name(name))) => {
        variants.iter()
                .position(|variant| variant == name)
                .ok_or_else(|| syntax(format!("{} is not a valid {} for {}", name, operand.name, mnemonic)))?
                as u64
      }
      (Values::Integer(_), Some(Token::Number(value))) => {
        u64::try_from(*value)
          .ok()
          .filter(|value| operand.accepts(*value))
          .ok_or_else(|| syntax(format!("{} does not fit the {} of {}", value, operand.name, mnemonic)))?
      }
      _ => return Err(syntax(format!("{} expects a {} operand", mnemonic, operand.name)))
    };
    invocation = invocation.option(option);
  }
  for token in tokens {
    invocation = invocation.arg(token_arg(labels, token));
  }

  registry.encode(&invocation).map_err(|error| syntax(error.to_string()))
}

/// Parses `text` into code, creating or reusing labels in `labels`.
pub fn parse_assembly<I: InstructionSet>(
  text: &str,
  registry: &Registry<I>,
  labels: &mut LabelTable
) -> Result<Code> {
  let mut code = Code::new();

  for (i, source) in text.lines().enumerate() {
    let number = i + 1;
    let source = source.split('#').next().unwrap_or("").trim();
    if source.is_empty() {
      continue;
    }

    let (_, parsed) = line(source).map_err(|_| {
      Error::Syntax { line: number, message: format!("cannot parse `{}`", source) }
    })?;

    if let Some(name) = parsed.label {
      code.label(labels.named(name));
    }
    if let Some((mnemonic, tokens)) = parsed.statement {
      code.append(statement_code(registry, labels, number, mnemonic, &tokens)?);
    }
  }

  Ok(code)
}


#[cfg(test)]
mod tests {
  use super::*;
  use crate::bytecode::disasm::disassemble;
  use crate::bytecode::instruction::{Decoded, Format};
  use crate::bytecode::raw::{RawField, I8};
  use crate::mk1::{self, Mk1, Reg, Reg16};

  /// Moves between register pairs, with a flag selecting the high byte.
  struct Pairs;

  impl InstructionSet for Pairs {
    type Kind  = &'static str;
    type Instr = ();
    const OPCODE: RawField = U8;

    fn catalog() -> Vec<Format<&'static str>> {
      vec![
        Format::new("Halt", U8),
        Format::new("Move", U8).operand("pair", &["BA", "DC", "FE", "HL"]).integer("high", 1).arg(I8),
      ]
    }

    fn unknown() -> Format<&'static str> {
      Format::new("Unknown", U8)
    }

    fn lift(_: &Decoded<&'static str>) {}
  }

  #[test]
  fn lines(){
    assert_eq!(
      line("end: Halt"),
      Ok(("", Line { label: Some("end"), statement: Some(("Halt", vec![])) }))
    );
    assert_eq!(
      line("LoadFar BA , -0x10"),
      Ok(("", Line {
        label: None,
        statement: Some(("LoadFar", vec![Token::Name("BA"), Token::Number(-16)]))
      }))
    );
    assert_eq!(
      line("Jump ~top"),
      Ok(("", Line { label: None, statement: Some(("Jump", vec![Token::Relative("top")])) }))
    );
    assert_eq!(line("start:"), Ok(("", Line { label: Some("start"), statement: None })));
    assert!(line("Pop A B").is_err());
  }

  #[test]
  fn text_matches_builder(){
    let registry = Mk1::registry().unwrap();

    let mut labels = LabelTable::new();
    let text = "
      ImmVal 3       # three
      Pop A
    top:
      Push A
      BranchZero done
      LoadNear HL, -1
      Jump top
    done: Halt
    ";
    let parsed = parse_assembly(text, &registry, &mut labels).unwrap();
    let from_text = parsed.assemble(&mut labels).unwrap();

    let mut labels = LabelTable::new();
    let top  = labels.named("top");
    let done = labels.named("done");
    let mut code = Code::new();
    code.emit(&registry, mk1::imm_val(3)).unwrap()
        .emit(&registry, mk1::pop(Reg::A)).unwrap()
        .label(top)
        .emit(&registry, mk1::push(Reg::A)).unwrap()
        .emit(&registry, mk1::branch_zero(done)).unwrap()
        .emit(&registry, mk1::load_near(Reg16::HL, -1i8)).unwrap()
        .emit(&registry, mk1::jump(top)).unwrap()
        .label(done)
        .emit(&registry, mk1::halt()).unwrap();
    let from_builder = code.assemble(&mut labels).unwrap();

    assert_eq!(from_text, from_builder);
  }

  #[test]
  fn disassembly_reads_back_as_assembly(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();
    let text = "Calc ADD\nSaveFar DC, 300\nPush H\nAdjust -2\nHalt";
    let bytes = parse_assembly(text, &registry, &mut labels)
      .unwrap()
      .assemble(&mut labels)
      .unwrap();

    let lines: Vec<String> = disassemble(&registry, &bytes, 0).map(|r| r.to_string()).collect();
    assert_eq!(lines, vec!["Calc ADD", "SaveFar DC, 300", "Push H", "Adjust -2", "Halt"]);

    let mut labels = LabelTable::new();
    let again = parse_assembly(&lines.join("\n"), &registry, &mut labels)
      .unwrap()
      .assemble(&mut labels)
      .unwrap();
    assert_eq!(again, bytes);
  }

  #[test]
  fn data_bytes(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();
    let code = parse_assembly(".byte 1, 0x7F, -1, here\nhere:", &registry, &mut labels).unwrap();
    assert_eq!(code.assemble(&mut labels).unwrap(), vec![0x01, 0x7F, 0xFF, 0x04]);
  }

  #[test]
  fn errors_carry_line_numbers(){
    let registry   = Mk1::registry().unwrap();
    let mut labels = LabelTable::new();

    let error = parse_assembly("Halt\nFly 3", &registry, &mut labels).unwrap_err();
    assert_eq!(error, Error::Syntax { line: 2, message: "Fly is not an instruction".to_string() });

    let error = parse_assembly("\n\nPop Q", &registry, &mut labels).unwrap_err();
    assert_eq!(error, Error::Syntax { line: 3, message: "Q is not a valid to for Pop".to_string() });

    let error = parse_assembly("Jump", &registry, &mut labels).unwrap_err();
    assert!(matches!(error, Error::Syntax { line: 1, .. }));

    let error = parse_assembly("Push A B", &registry, &mut labels).unwrap_err();
    assert_eq!(error, Error::Syntax { line: 1, message: "cannot parse `Push A B`".to_string() });
  }

  #[test]
  fn one_token_per_operand_field(){
    let registry   = Registry::<Pairs>::new().unwrap();
    let mut labels = LabelTable::new();
    // Move is id 1 over 0x08..0x10.
    let bytes = parse_assembly("Move FE, 1, -3\nHalt", &registry, &mut labels)
      .unwrap()
      .assemble(&mut labels)
      .unwrap();
    assert_eq!(bytes, vec![0x0E, 0xFD, 0x00]);

    let lines: Vec<String> = disassemble(&registry, &bytes, 0).map(|r| r.to_string()).collect();
    assert_eq!(lines, vec!["Move FE, 1, -3", "Halt"]);

    let error = parse_assembly("Move FE, 2, 0", &registry, &mut labels).unwrap_err();
    assert_eq!(
      error,
      Error::Syntax { line: 1, message: "2 does not fit the high of Move".to_string() }
    );
    let error = parse_assembly("Move FE, HL, 0", &registry, &mut labels).unwrap_err();
    assert_eq!(
      error,
      Error::Syntax { line: 1, message: "Move expects a high operand".to_string() }
    );
  }
}
