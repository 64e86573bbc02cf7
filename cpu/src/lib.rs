//! This crate emulates the Alto's microcoded processor: the sixteen
//! hardware tasks, the ALU and shifter, the microcode store, the
//! memory bus timing state machine, and the device registers the
//! microcode talks to.
#![crate_name = "cpu"]

mod alarm;
mod alu;
mod bus;
mod control;
mod io;
mod memory;
mod scheduler;
mod shifter;
mod system;
mod task;
mod ucode;

pub use alarm::{Alarm, AlarmKind};
pub use alu::Alu;
pub use bus::MemoryBus;
pub use control::Cpu;
pub use io::Peripherals;
pub use memory::{MainMemory, MemoryRange};
pub use scheduler::{EventAction, EventId, FiredEvent, Scheduler, TIME_STEP_NSEC};
pub use shifter::{Shifter, ShifterOp};
pub use system::Alto;
pub use task::{Completion, TaskState};
pub use ucode::{MicrocodeBank, UCodeMemory};
