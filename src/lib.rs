/*!
  Tools for small custom instruction sets: declare the formats once, then assemble symbolic
  programs into bytes, list them back, and run them on a software model of the processor.

  The generic machinery lives in `bytecode`. `mk1` is a complete 8-bit instruction set with its
  CPU model, built on that machinery.
*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod bytecode;
pub mod error;
pub mod memory;
pub mod mk1;

pub use error::{Error, Result};
