//! Decoding of the Alto's horizontal 32-bit microcode words.
//!
//! A raw control word packs eight fields:
//!
//! ```text
//! | rselect | aluf | bs  | f1  | f2  | T | L | next    |
//! | 5 bits  | 4    | 3   | 4   | 4   | 1 | 1 | 10 bits |
//! ```
//!
//! Decoding is a pure function of the raw word and the constant ROM,
//! so the microcode store memoizes decoded instructions by address.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use super::rom::ConstantRom;
use super::types::Word;

/// Bus source field values.  Codes 3 and 4 mean different things to
/// different tasks and are resolved by the task's own behaviour.
pub mod bus_source {
    pub const READ_R: u8 = 0;
    pub const LOAD_R: u8 = 1;
    pub const NONE: u8 = 2;
    pub const TASK_SPECIFIC_1: u8 = 3;
    pub const TASK_SPECIFIC_2: u8 = 4;
    pub const READ_MD: u8 = 5;
    pub const READ_MOUSE: u8 = 6;
    pub const READ_DISP: u8 = 7;
}

/// F1 special function codes common to every task.  Codes 8 and up
/// are task-specific.
pub mod f1 {
    pub const NONE: u8 = 0;
    pub const LOAD_MAR: u8 = 1;
    pub const TASK: u8 = 2;
    pub const BLOCK: u8 = 3;
    pub const LLSH1: u8 = 4;
    pub const LRSH1: u8 = 5;
    pub const LLCY8: u8 = 6;
    pub const CONSTANT: u8 = 7;
}

/// F2 special function codes common to every task.  Codes 8 and up
/// are task-specific.
pub mod f2 {
    pub const NONE: u8 = 0;
    pub const BUSEQ0: u8 = 1;
    pub const SHLT0: u8 = 2;
    pub const SHEQ0: u8 = 3;
    pub const BUS: u8 = 4;
    pub const ALUCY: u8 = 5;
    pub const STORE_MD: u8 = 6;
    pub const CONSTANT: u8 = 7;
}

/// ALU function codes.  Codes 14 and 15 are unassigned; executing one
/// is a microcode-contract violation.
pub mod aluf {
    pub const BUS: u8 = 0;
    pub const T: u8 = 1;
    pub const BUS_OR_T: u8 = 2;
    pub const BUS_AND_T: u8 = 3;
    pub const BUS_XOR_T: u8 = 4;
    pub const BUS_PLUS_1: u8 = 5;
    pub const BUS_MINUS_1: u8 = 6;
    pub const BUS_PLUS_T: u8 = 7;
    pub const BUS_MINUS_T: u8 = 8;
    pub const BUS_MINUS_T_MINUS_1: u8 = 9;
    pub const BUS_PLUS_T_PLUS_1: u8 = 10;
    pub const BUS_PLUS_SKIP: u8 = 11;
    pub const ALU_BUS_AND_T: u8 = 12;
    pub const BUS_AND_NOT_T: u8 = 13;
}

/// The kind of memory-bus transaction a microinstruction initiates or
/// depends on, used to ask the bus whether it is ready.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub enum MemoryOperation {
    None,
    LoadAddress,
    Read,
    Store,
}

/// One decoded microcode word, with the derived predicates the
/// execution cycle consults every clock precomputed.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize)]
pub struct Microinstruction {
    pub rselect: u8,
    pub aluf: u8,
    pub bs: u8,
    pub f1: u8,
    pub f2: u8,
    pub load_t: bool,
    pub load_l: bool,
    pub next: u16,

    /// F1 or F2 carries the CONSTANT code, so the bus source field is
    /// reinterpreted as part of a constant ROM index.
    pub constant_access: bool,
    /// The constant ROM output is ANDed onto the bus (constant access
    /// or any bus source code above 4).
    pub constant_access_or_bs4: bool,
    pub constant_value: Word,
    /// F2 examines the shifter output, so the shifter must run even
    /// when no register load wants its result.
    pub need_shifter_output: bool,
    pub memory_access: bool,
    pub memory_operation: MemoryOperation,
    /// T is loaded from the ALU output rather than from the bus for
    /// this ALU function.
    pub load_t_from_alu: bool,
}

impl Microinstruction {
    #[must_use]
    pub fn decode(raw: u32, constants: &ConstantRom) -> Microinstruction {
        let rselect = ((raw >> 27) & 0x1f) as u8;
        let aluf = ((raw >> 23) & 0x0f) as u8;
        let bs = ((raw >> 20) & 0x07) as u8;
        let f1 = ((raw >> 16) & 0x0f) as u8;
        let f2 = ((raw >> 12) & 0x0f) as u8;
        let load_t = raw & 0x800 != 0;
        let load_l = raw & 0x400 != 0;
        let next = (raw & 0x3ff) as u16;

        let constant_access = f1 == f1::CONSTANT || f2 == f2::CONSTANT;
        let constant_access_or_bs4 = constant_access || bs > 4;
        let constant_value = constants.get((usize::from(rselect) << 3) | usize::from(bs));

        // Code 10 is the emulator task's LOAD_DNS, which also reads
        // the shifter output.  Decode does not know which task will
        // execute the word, but no other task assigns that code.
        let need_shifter_output = f2 == f2::SHLT0 || f2 == f2::SHEQ0 || f2 == 10;

        let memory_read = bs == bus_source::READ_MD && !constant_access;
        let memory_access = memory_read || f1 == f1::LOAD_MAR || f2 == f2::STORE_MD;
        let memory_operation = if f1 == f1::LOAD_MAR {
            MemoryOperation::LoadAddress
        } else if memory_read {
            MemoryOperation::Read
        } else if f2 == f2::STORE_MD {
            MemoryOperation::Store
        } else {
            MemoryOperation::None
        };

        let load_t_from_alu = matches!(
            aluf,
            aluf::BUS
                | aluf::BUS_OR_T
                | aluf::BUS_PLUS_1
                | aluf::BUS_MINUS_1
                | aluf::BUS_PLUS_T_PLUS_1
                | aluf::BUS_PLUS_SKIP
                | aluf::ALU_BUS_AND_T
        );

        Microinstruction {
            rselect,
            aluf,
            bs,
            f1,
            f2,
            load_t,
            load_l,
            next,
            constant_access,
            constant_access_or_bs4,
            constant_value,
            need_shifter_output,
            memory_access,
            memory_operation,
            load_t_from_alu,
        }
    }
}

impl Display for Microinstruction {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RSELECT={} ALUF={} BS={} F1={} F2={} LoadT={} LoadL={} NEXT={:o}",
            self.rselect,
            self.aluf,
            self.bs,
            self.f1,
            self.f2,
            u8::from(self.load_t),
            u8::from(self.load_l),
            self.next,
        )
    }
}
