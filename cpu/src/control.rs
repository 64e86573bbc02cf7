//! Processor registers and the round-robin-free task dispatcher.
//!
//! The sixteen task slots are purely priority ordered: whenever a
//! switch is called for, the highest numbered task with its wakeup
//! line asserted gets the processor.  The emulator task (priority
//! zero) always has its wakeup asserted, so the machine never idles.
use tracing::{Level, event};

use base::prelude::*;

use super::alarm::Alarm;
use super::task::TaskState;

/// There are sixteen task slots in the hardware; only the ones named
/// by [`TaskKind`] are wired to anything.
pub const TASK_SLOTS: usize = 16;

pub struct Cpu {
    pub t: Word,
    pub l: Word,
    /// Holds the value L had when it was last loaded by the
    /// RAM-related task; the S registers and microcode RAM writes
    /// read from it.
    pub m: Word,
    /// The Nova instruction register.
    pub ir: Word,
    pub r: [Word; 32],
    pub s: [[Word; 32]; 8],
    /// Carry out of the ALU at the most recent Load-L, for the ALUCY
    /// branch.
    pub alu_c0: Word,
    /// The reset mode register: bit i chooses the microcode bank task
    /// i restarts in at the next soft reset.
    pub rmr: Word,
    pub tasks: [TaskState; TASK_SLOTS],
    pub current_task: TaskKind,
    pub next_task: Option<TaskKind>,
}

impl Cpu {
    #[must_use]
    pub fn new() -> Cpu {
        let mut cpu = Cpu {
            t: 0,
            l: 0,
            m: 0,
            ir: 0,
            r: [0; 32],
            s: [[0; 32]; 8],
            alu_c0: 0,
            rmr: 0,
            tasks: [TaskState::new(); TASK_SLOTS],
            current_task: TaskKind::Emulator,
            next_task: None,
        };
        cpu.reset();
        cpu
    }

    pub fn reset(&mut self) {
        self.r = [0; 32];
        self.s = [[0; 32]; 8];
        self.t = 0;
        self.l = 0;
        self.m = 0;
        self.ir = 0;
        self.alu_c0 = 0;
        // All tasks restart in ROM0.
        self.rmr = 0xffff;

        for task in TaskKind::ALL {
            self.tasks[task.index()].reset(task);
        }
        // The emulator's wakeup line is wired on.
        self.tasks[TaskKind::Emulator.index()].wakeup = true;

        self.next_task = None;
        self.task_switch();
        self.current_task = self.next_task.take().unwrap_or(TaskKind::Emulator);
    }

    /// Pick the next task: the highest priority slot with its wakeup
    /// line asserted.  The switch takes effect at the end of the
    /// instruction after the one that requested it.
    pub fn task_switch(&mut self) {
        for index in (0..TASK_SLOTS).rev() {
            let Some(task) = TaskKind::from_index(index) else {
                continue;
            };
            if self.tasks[index].wakeup {
                self.tasks[index].first_instruction_after_switch = true;
                if self.next_task != Some(task) {
                    event!(Level::TRACE, "task switch pending: {}", task);
                }
                self.next_task = Some(task);
                break;
            }
        }
    }

    pub fn wakeup_task(&mut self, task: TaskKind) -> Result<(), Alarm> {
        if task == TaskKind::Emulator {
            return Err(Alarm::CannotWakeEmulatorTask);
        }
        self.tasks[task.index()].wakeup = true;
        Ok(())
    }

    pub fn block_task(&mut self, task: TaskKind) -> Result<(), Alarm> {
        if task == TaskKind::Emulator {
            return Err(Alarm::CannotBlockEmulatorTask);
        }
        self.tasks[task.index()].wakeup = false;
        Ok(())
    }
}

impl Default for Cpu {
    fn default() -> Cpu {
        Cpu::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reset_starts_in_the_emulator_task() {
        let cpu = Cpu::new();
        assert_eq!(cpu.current_task, TaskKind::Emulator);
        assert_eq!(cpu.next_task, None);
        assert_eq!(cpu.rmr, 0xffff);
        assert!(cpu.tasks[TaskKind::Emulator.index()].wakeup);
    }

    #[test]
    fn task_switch_prefers_the_highest_priority_wakeup() {
        let mut cpu = Cpu::new();
        cpu.wakeup_task(TaskKind::DiskSector).unwrap();
        cpu.wakeup_task(TaskKind::DiskWord).unwrap();
        cpu.task_switch();
        assert_eq!(cpu.next_task, Some(TaskKind::DiskWord));
        assert!(cpu.tasks[TaskKind::DiskWord.index()].first_instruction_after_switch);
    }

    #[test]
    fn blocking_clears_a_pending_wakeup() {
        let mut cpu = Cpu::new();
        cpu.wakeup_task(TaskKind::Cursor).unwrap();
        cpu.block_task(TaskKind::Cursor).unwrap();
        cpu.task_switch();
        assert_eq!(cpu.next_task, Some(TaskKind::Emulator));
    }

    #[test]
    fn emulator_wakeup_is_not_software_controlled() {
        let mut cpu = Cpu::new();
        assert_eq!(
            cpu.block_task(TaskKind::Emulator),
            Err(Alarm::CannotBlockEmulatorTask)
        );
        assert_eq!(
            cpu.wakeup_task(TaskKind::Emulator),
            Err(Alarm::CannotWakeEmulatorTask)
        );
    }

    #[test]
    fn each_task_restarts_at_its_own_priority() {
        let cpu = Cpu::new();
        for task in TaskKind::ALL {
            assert_eq!(cpu.tasks[task.index()].mpc, task.index() as u16);
        }
    }
}
