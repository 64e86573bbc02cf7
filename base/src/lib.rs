//! The `base` crate defines the Alto-related things which are useful
//! in both a simulator and other associated tools.  The idea is that
//! if you want to write a microcode assembler or a debugger, it would
//! depend on the base crate but would not need to depend on the
//! simulator library itself.

mod microinstruction;
mod rom;
mod types;

pub mod collections;
pub mod prelude;

pub use crate::microinstruction::*;
pub use crate::rom::*;
pub use crate::types::*;
