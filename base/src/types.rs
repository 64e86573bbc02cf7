//! Fundamental value types for the Alto processor: the 16-bit machine
//! word, the hardware task identifiers and the machine configuration.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

#[cfg(test)]
use test_strategy::Arbitrary;

/// The Alto is a 16-bit machine; every register, bus and memory
/// location holds one of these.  All arithmetic wraps modulo 2^16.
pub type Word = u16;

/// Mask a wider intermediate result down to a machine word.
#[must_use]
pub fn mask16(value: u32) -> Word {
    (value & 0xffff) as Word
}

/// Identifies one of the microcode tasks.  The discriminant is the
/// task's hardware priority (higher wins), its slot in the task
/// table, and the micro-address its program counter is seeded with at
/// reset.  Slots 1-3, 5, 6 and 15 exist in the hardware but have no
/// assigned device and are never woken.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum TaskKind {
    /// Interprets Nova instruction-set machine code; the lowest
    /// priority task and the only one that can never block.
    Emulator = 0,
    DiskSector = 4,
    Ethernet = 7,
    MemoryRefresh = 8,
    DisplayWord = 9,
    Cursor = 10,
    DisplayHorizontal = 11,
    DisplayVertical = 12,
    Parity = 13,
    DiskWord = 14,
}

impl TaskKind {
    /// All tasks with assigned devices, in ascending priority order.
    pub const ALL: [TaskKind; 10] = [
        TaskKind::Emulator,
        TaskKind::DiskSector,
        TaskKind::Ethernet,
        TaskKind::MemoryRefresh,
        TaskKind::DisplayWord,
        TaskKind::Cursor,
        TaskKind::DisplayHorizontal,
        TaskKind::DisplayVertical,
        TaskKind::Parity,
        TaskKind::DiskWord,
    ];

    /// The task's slot in the task table (which is also its priority).
    #[must_use]
    pub fn index(&self) -> usize {
        *self as usize
    }

    #[must_use]
    pub fn from_index(index: usize) -> Option<TaskKind> {
        TaskKind::ALL.iter().copied().find(|t| t.index() == index)
    }
}

impl Display for TaskKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Emulator => "emulator",
            TaskKind::DiskSector => "disk sector",
            TaskKind::Ethernet => "ethernet",
            TaskKind::MemoryRefresh => "memory refresh",
            TaskKind::DisplayWord => "display word",
            TaskKind::Cursor => "cursor",
            TaskKind::DisplayHorizontal => "display horizontal",
            TaskKind::DisplayVertical => "display vertical",
            TaskKind::Parity => "parity",
            TaskKind::DiskWord => "disk word",
        })
    }
}

/// Which generation of machine is being emulated.  The generations
/// differ in memory-bus timing, microcode store size and the way the
/// physical memory bank is derived from a task's bank register.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq, Serialize)]
#[cfg_attr(test, derive(Arbitrary))]
pub enum SystemType {
    AltoI,
    /// Alto II with the original 1K microcode ROM.
    AltoII,
    /// Alto II with extended memory and the 2K ROM option.
    AltoIIXm2k,
    /// Alto II with extended memory and 3K of microcode RAM.
    AltoIIXm3k,
}

impl SystemType {
    #[must_use]
    pub fn is_alto_i(&self) -> bool {
        matches!(self, SystemType::AltoI)
    }

    #[must_use]
    pub fn has_2k_rom(&self) -> bool {
        matches!(self, SystemType::AltoIIXm2k)
    }

    #[must_use]
    pub fn has_3k_ram(&self) -> bool {
        matches!(self, SystemType::AltoIIXm3k)
    }

    #[must_use]
    pub fn extended_memory(&self) -> bool {
        matches!(self, SystemType::AltoIIXm2k | SystemType::AltoIIXm3k)
    }
}

impl Display for SystemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SystemType::AltoI => "Alto I",
            SystemType::AltoII => "Alto II",
            SystemType::AltoIIXm2k => "Alto II XM (2K ROM)",
            SystemType::AltoIIXm3k => "Alto II XM (3K RAM)",
        })
    }
}

impl Default for SystemType {
    fn default() -> SystemType {
        SystemType::AltoIIXm2k
    }
}
