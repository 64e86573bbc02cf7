//! The prelude exports the structs which are useful in representing
//! things to do with the Alto's microcoded processor.  Providing this
//! prelude is the main purpose of the base crate.
pub use super::microinstruction::*;
pub use super::rom::*;
pub use super::types::*;
