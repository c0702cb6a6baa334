use tinyisa::bytecode::{disassemble, listing, opcode_map, parse_assembly, AssembleOptions, LabelTable};
use tinyisa::memory::Overlay;
use tinyisa::mk1::{Context, Mk1, Reg, RunOptions};
use tinyisa::Result;

fn run() -> Result<()> {
  let registry = Mk1::registry()?;

  println!("Opcode map:\n{}", opcode_map(&registry));

  let text = "
        ImmVal 3
        Pop A              # A counts down
        ImmVal 0
        Pop B              # B accumulates
    start:
        Push A
        BranchZero end
        Push A
        Push B
        Calc ADD
        Pop B
        Push A
        ImmVal 1
        Calc SUB
        Pop A
        Jump start
    end:
        Halt
  ";

  let mut labels = LabelTable::new();
  let code  = parse_assembly(text, &registry, &mut labels)?;
  let image = code.assemble_with(&mut labels, AssembleOptions::default())?;

  println!("Assembled {} bytes:\n{}", image.len(), listing(disassemble(&registry, &image, 0)));
  for (name, address) in labels.symbols() {
    if let Some(address) = address {
      println!("{:>8} = {:04X}", name, address);
    }
  }

  #[cfg(feature = "trace_computation")]
  println!("Computation Tracing ENABLED");

  let mut ctx = Context::new(&registry, Overlay::new(&image));
  let outcome = ctx.run(RunOptions::default());

  match outcome.halted {
    true  => println!("Halted after {} steps.", outcome.steps),
    false => println!("Stopped at the step limit of {}.", outcome.steps)
  }
  println!("A = {}, B = {}", ctx.reg.get(Reg::A), ctx.reg.get(Reg::B));
  Ok(())
}

fn main() {
  if let Err(error) = run() {
    eprintln!("error: {}", error);
    std::process::exit(1);
  }
}
