//! Alto alarms.
//!
//! An alarm is a fatal condition: either the emulated microcode broke
//! the hardware's contract (issued an unassigned function code,
//! started a memory operation while one was in flight) or a host
//! caller broke the emulator's contract (tried to block the emulator
//! task).  None of them are recoverable; the run loop stops at the
//! first one.  Device absence is deliberately not an alarm, because
//! real machines tolerated unpopulated option slots.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

/// Identifies the kind of an [`Alarm`], without its diagnostic
/// payload.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
pub enum AlarmKind {
    UnimplementedAluFunction,
    UnhandledBusSource,
    UnhandledF1,
    UnhandledF2,
    MemoryProtocolViolation,
    InvalidShifterUse,
    ProtectedTaskMisuse,
}

impl Display for AlarmKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            AlarmKind::UnimplementedAluFunction => "UnimplementedAluFunction",
            AlarmKind::UnhandledBusSource => "UnhandledBusSource",
            AlarmKind::UnhandledF1 => "UnhandledF1",
            AlarmKind::UnhandledF2 => "UnhandledF2",
            AlarmKind::MemoryProtocolViolation => "MemoryProtocolViolation",
            AlarmKind::InvalidShifterUse => "InvalidShifterUse",
            AlarmKind::ProtectedTaskMisuse => "ProtectedTaskMisuse",
        })
    }
}

/// A fatal condition detected by the emulation core.
#[derive(Debug, PartialEq, Eq, Clone, Serialize)]
pub enum Alarm {
    /// The microcode executed an unassigned ALU function code.
    UnimplementedAluFunction { aluf: u8 },
    /// A task used a bus source code it has no assignment for.
    UnhandledBusSource { task: TaskKind, bs: u8 },
    /// A task used an F1 code it has no assignment for.
    UnhandledF1 { task: TaskKind, f1: u8 },
    /// An F2 code with no assignment, in either the early or the late
    /// decode position.
    UnhandledF2 { task: TaskKind, f2: u8 },
    /// LOAD_MAR was issued while a memory operation was already in
    /// flight.
    MemoryOperationAlreadyActive { task: TaskKind, address: Word },
    /// MD was read in a cycle where no data can be on the bus; the
    /// microcode should have stalled on the ready check.
    ReadMdDuringCycle { cycle: u32 },
    /// MD was written in a cycle where the bus cannot accept store
    /// data.
    LoadMdDuringCycle { cycle: u32 },
    /// A Nova shift was requested on a rotate-right, which the
    /// hardware cannot express.
    DnsOnRotateRight,
    /// A magic shift was requested with a count other than one.
    BadMagicShiftCount { count: u8 },
    /// A caller tried to block or wake the emulator task, which is
    /// always runnable.
    CannotBlockEmulatorTask,
    CannotWakeEmulatorTask,
}

impl Alarm {
    #[must_use]
    pub fn kind(&self) -> AlarmKind {
        match self {
            Alarm::UnimplementedAluFunction { .. } => AlarmKind::UnimplementedAluFunction,
            Alarm::UnhandledBusSource { .. } => AlarmKind::UnhandledBusSource,
            Alarm::UnhandledF1 { .. } => AlarmKind::UnhandledF1,
            Alarm::UnhandledF2 { .. } => AlarmKind::UnhandledF2,
            Alarm::MemoryOperationAlreadyActive { .. }
            | Alarm::ReadMdDuringCycle { .. }
            | Alarm::LoadMdDuringCycle { .. } => AlarmKind::MemoryProtocolViolation,
            Alarm::DnsOnRotateRight | Alarm::BadMagicShiftCount { .. } => {
                AlarmKind::InvalidShifterUse
            }
            Alarm::CannotBlockEmulatorTask | Alarm::CannotWakeEmulatorTask => {
                AlarmKind::ProtectedTaskMisuse
            }
        }
    }
}

impl Display for Alarm {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            Alarm::UnimplementedAluFunction { aluf } => {
                write!(f, "unimplemented ALU function {aluf}")
            }
            Alarm::UnhandledBusSource { task, bs } => {
                write!(f, "unhandled bus source {bs} in {task} task")
            }
            Alarm::UnhandledF1 { task, f1 } => {
                write!(f, "unhandled special function 1 code {f1} in {task} task")
            }
            Alarm::UnhandledF2 { task, f2 } => {
                write!(f, "unhandled special function 2 code {f2} in {task} task")
            }
            Alarm::MemoryOperationAlreadyActive { task, address } => write!(
                f,
                "{task} task loaded MAR with {address:#06x} while a memory operation was active"
            ),
            Alarm::ReadMdDuringCycle { cycle } => {
                write!(f, "MD read during memory cycle {cycle}")
            }
            Alarm::LoadMdDuringCycle { cycle } => {
                write!(f, "MD written during memory cycle {cycle}")
            }
            Alarm::DnsOnRotateRight => f.write_str("Nova shift mode applied to a rotate right"),
            Alarm::BadMagicShiftCount { count } => {
                write!(f, "magic shift must have count 1, not {count}")
            }
            Alarm::CannotBlockEmulatorTask => f.write_str("the emulator task cannot be blocked"),
            Alarm::CannotWakeEmulatorTask => {
                f.write_str("the emulator task cannot be explicitly woken")
            }
        }
    }
}

impl Error for Alarm {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alarm_kind_mapping() {
        assert_eq!(
            Alarm::UnimplementedAluFunction { aluf: 14 }.kind(),
            AlarmKind::UnimplementedAluFunction
        );
        assert_eq!(
            Alarm::DnsOnRotateRight.kind(),
            AlarmKind::InvalidShifterUse
        );
        assert_eq!(
            Alarm::BadMagicShiftCount { count: 2 }.kind(),
            AlarmKind::InvalidShifterUse
        );
        assert_eq!(
            Alarm::CannotBlockEmulatorTask.kind(),
            AlarmKind::ProtectedTaskMisuse
        );
    }

    #[test]
    fn alarm_messages_name_the_task() {
        let alarm = Alarm::UnhandledF1 {
            task: TaskKind::DiskWord,
            f1: 8,
        };
        assert_eq!(
            alarm.to_string(),
            "unhandled special function 1 code 8 in disk word task"
        );
    }
}
