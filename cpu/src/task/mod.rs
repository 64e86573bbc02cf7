//! The microinstruction cycle and the per-task specializations.
//!
//! Every task runs the same base cycle; what differs between tasks is
//! a small set of hook points (extra bus sources, task-specific F1
//! and F2 codes, block and switch-in behaviour) collected in the
//! [`TaskBehavior`] trait.  The hardware tasks are stateless
//! dispatchers over the machine, so each behaviour is a unit struct
//! and all mutable state lives in [`TaskState`] and the devices.
//!
//! Branch modifiers computed during one microinstruction are latched
//! in the task state and applied to the NEXT field of the following
//! microinstruction, never the current one.  The cycle below keeps
//! that straight by moving the latched modifier into a local before
//! any F2 runs.
use tracing::{Level, event};

use base::prelude::*;

use super::alarm::Alarm;
use super::shifter::ShifterOp;
use super::system::Alto;

mod disk;
mod display;
mod emulator;
mod ethernet;

/// How a microinstruction finished.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Completion {
    Normal,
    /// The instruction held a TASK function; a task switch is due
    /// after the next instruction completes.
    TaskSwitch,
    /// The instruction needed memory that is not ready yet; nothing
    /// was executed and the same instruction will retry.
    MemoryWait,
}

/// Hardware state of one task: its microprogram counter, wakeup
/// request line, and the flip-flops that carry information from one
/// of its cycles to the next.
///
/// Cross-cycle fields: `next_modifier` applies to the following
/// instruction's NEXT field; `rd_ram`, `wrt_ram` and `sw_mode` arm a
/// microcode RAM access or bank switch that the following instruction
/// performs; `skip` and `carry` are the emulator's Nova flip-flops.
/// Everything else is scratch rewritten every cycle.
#[derive(Clone, Copy, Debug)]
pub struct TaskState {
    pub mpc: u16,
    pub wakeup: bool,
    pub next_modifier: u16,
    pub rd_ram: bool,
    pub wrt_ram: bool,
    pub sw_mode: bool,
    pub skip: Word,
    pub carry: Word,
    pub rb: usize,
    pub bus_data: Word,
    pub r_select: usize,
    pub sr_select: usize,
    pub load_r: bool,
    pub load_s: bool,
    pub was_soft_reset: bool,
    pub first_instruction_after_switch: bool,
}

impl TaskState {
    #[must_use]
    pub fn new() -> TaskState {
        TaskState {
            mpc: 0,
            wakeup: false,
            next_modifier: 0,
            rd_ram: false,
            wrt_ram: false,
            sw_mode: false,
            skip: 0,
            carry: 0,
            rb: 0,
            bus_data: 0,
            r_select: 0,
            sr_select: 0,
            load_r: false,
            load_s: false,
            was_soft_reset: false,
            first_instruction_after_switch: false,
        }
    }

    /// Hard reset: the task restarts at its own number, with every
    /// flip-flop cleared.  The emulator task's always-on wakeup is
    /// reasserted by the CPU reset.
    pub fn reset(&mut self, task: TaskKind) {
        *self = TaskState::new();
        self.mpc = u16::from(task.index() as u8);
    }

    /// Soft reset only rewinds the microprogram counter.
    pub fn soft_reset(&mut self, task: TaskKind) {
        self.mpc = u16::from(task.index() as u8);
    }
}

impl Default for TaskState {
    fn default() -> TaskState {
        TaskState::new()
    }
}

/// The hook points where a task diverges from the base cycle.  The
/// defaults are the hardware defaults: nothing wired up, so an
/// unassigned code is an alarm and the other hooks do nothing.
pub(crate) trait TaskBehavior: Sync {
    /// Runs before the instruction is fetched.  The Ethernet task
    /// uses it to consume an armed countdown wakeup.
    fn pre_execute(&self, _alto: &mut Alto, _task: TaskKind) {}

    /// Task-specific bus sources (codes 3 and 4).
    fn bus_source(&self, _alto: &mut Alto, task: TaskKind, bs: u8) -> Result<Word, Alarm> {
        Err(Alarm::UnhandledBusSource { task, bs })
    }

    /// F1s that must see or change bus data before the ALU runs.
    fn f1_early(&self, _alto: &mut Alto, _task: TaskKind, _instruction: &Microinstruction) {}

    fn f1(
        &self,
        _alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        Err(Alarm::UnhandledF1 {
            task,
            f1: instruction.f1,
        })
    }

    /// F2s that modify cycle parameters before bus selection, like
    /// the emulator's accumulator addressing.
    fn f2_early(&self, _alto: &mut Alto, _task: TaskKind, _instruction: &Microinstruction) {}

    fn f2(
        &self,
        _alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        Err(Alarm::UnhandledF2 {
            task,
            f2: instruction.f2,
        })
    }

    /// F2 work that needs the shifter output and register writebacks
    /// to have happened.
    fn f2_late(&self, _alto: &mut Alto, _task: TaskKind, _instruction: &Microinstruction) {}

    /// Device-side consequences of a BLOCK F1, run at the end of the
    /// cycle.
    fn execute_block(&self, _alto: &mut Alto, _task: TaskKind) -> Result<(), Alarm> {
        Ok(())
    }

    /// Runs when the task actually gains the processor.
    fn on_task_switch(&self, _alto: &mut Alto, _task: TaskKind) {}
}

struct ParityTask;

impl TaskBehavior for ParityTask {}

pub(crate) fn behavior(task: TaskKind) -> &'static dyn TaskBehavior {
    match task {
        TaskKind::Emulator => &emulator::EmulatorTask,
        TaskKind::DiskSector | TaskKind::DiskWord => &disk::DiskTask,
        TaskKind::Ethernet => &ethernet::EthernetTask,
        TaskKind::MemoryRefresh => &display::MemoryRefreshTask,
        TaskKind::DisplayWord => &display::DisplayWordTask,
        TaskKind::Cursor => &display::CursorTask,
        TaskKind::DisplayHorizontal => &display::DisplayHorizontalTask,
        TaskKind::DisplayVertical => &display::DisplayVerticalTask,
        TaskKind::Parity => &ParityTask,
    }
}

impl Alto {
    /// Fetch and execute one microinstruction on the current task.
    pub(crate) fn execute_next(&mut self) -> Result<Completion, Alarm> {
        let task = self.cpu.current_task;
        let behavior = behavior(task);

        behavior.pre_execute(self, task);

        let instruction = {
            let mpc = self.cpu.tasks[task.index()].mpc;
            self.ucode.get_instruction(mpc, task)
        };
        self.execute_instruction(task, behavior, &instruction)
    }

    fn execute_instruction(
        &mut self,
        task: TaskKind,
        behavior: &dyn TaskBehavior,
        instruction: &Microinstruction,
    ) -> Result<Completion, Alarm> {
        let index = task.index();

        event!(
            Level::TRACE,
            "{}: mpc={:o} nextmod={:o} t={:o} {}",
            task,
            self.cpu.tasks[index].mpc,
            self.cpu.tasks[index].next_modifier,
            self.cpu.t,
            instruction
        );

        let mut completion = Completion::Normal;
        let mut sw_mode = false;
        let mut block = false;

        {
            let state = &mut self.cpu.tasks[index];
            state.load_r = false;
            state.load_s = false;
            state.r_select = 0;
            state.sr_select = 0;
            state.bus_data = 0;
            state.was_soft_reset = false;
        }
        self.shifter.reset();

        if instruction.memory_access && !self.bus.ready(instruction.memory_operation) {
            // Memory is still busy; retry this instruction next
            // clock.
            return Ok(Completion::MemoryWait);
        }

        // The branch modifier computed by the PREVIOUS instruction
        // applies to this one's NEXT field; anything the F2s below
        // compute is latched for the instruction after.
        let next_modifier = {
            let state = &mut self.cpu.tasks[index];
            let modifier = state.next_modifier;
            state.next_modifier = 0;
            state.r_select = usize::from(instruction.rselect);
            state.sr_select = usize::from(instruction.rselect);
            modifier
        };

        behavior.f2_early(self, task, instruction);

        let source_data = if instruction.constant_access {
            instruction.constant_value
        } else {
            match instruction.bs {
                bus_source::READ_R => self.cpu.r[self.cpu.tasks[index].r_select],
                bus_source::LOAD_R => {
                    // Loading R forces the bus to zero so an ALU
                    // function of zero and T can run in the same
                    // cycle.
                    self.cpu.tasks[index].load_r = true;
                    0
                }
                bus_source::NONE => 0xffff,
                bus_source::TASK_SPECIFIC_1 | bus_source::TASK_SPECIFIC_2 => {
                    behavior.bus_source(self, task, instruction.bs)?
                }
                bus_source::READ_MD => self.bus.read_md()?,
                bus_source::READ_MOUSE => self.io.mouse.poll_mouse_bits(),
                bus_source::READ_DISP => {
                    // The displacement field of IR, sign-extended
                    // unless the instruction uses page-zero
                    // addressing.
                    let mut data = self.cpu.ir & 0xff;
                    if (self.cpu.ir & 0x300) != 0 && (self.cpu.ir & 0x80) == 0x80 {
                        data |= 0xff00;
                    }
                    data
                }
                _ => return Err(Alarm::UnhandledBusSource {
                    task,
                    bs: instruction.bs,
                }),
            }
        };
        self.cpu.tasks[index].bus_data = source_data;

        // The bus ANDs everything gated onto it, so a constant
        // addressed by RSELECT,,BS masks the selected source.
        if instruction.constant_access_or_bs4 {
            self.cpu.tasks[index].bus_data &= instruction.constant_value;
        }

        // A RDRAM in the previous cycle gates the microcode RAM word
        // onto the bus now.
        if self.cpu.tasks[index].rd_ram {
            self.cpu.tasks[index].bus_data &= self.ucode.read_ram();
            self.cpu.tasks[index].rd_ram = false;
        }

        behavior.f1_early(self, task, instruction);

        let bus_data = self.cpu.tasks[index].bus_data;
        let alu_data = if instruction.aluf == aluf::BUS {
            self.alu.carry = 0;
            bus_data
        } else {
            self.alu
                .execute(instruction.aluf, bus_data, self.cpu.t, self.cpu.tasks[index].skip)?
        };

        // A WRTRAM in the previous cycle commits this cycle's ALU
        // output and the held M register to the microcode RAM.
        if self.cpu.tasks[index].wrt_ram {
            self.ucode.write_ram(alu_data, self.cpu.m);
            self.cpu.tasks[index].wrt_ram = false;
        }

        // An SWMODE in the previous cycle switches banks at the end
        // of this one.
        if self.cpu.tasks[index].sw_mode {
            self.cpu.tasks[index].sw_mode = false;
            sw_mode = true;
        }

        match instruction.f1 {
            f1::NONE | f1::CONSTANT => (),
            f1::LOAD_MAR => {
                // On Alto II machines an MD<- paired with the MAR<-
                // makes this an extended memory reference.
                let extended = if self.system_type.is_alto_i() {
                    false
                } else {
                    instruction.f2 == f2::STORE_MD
                };
                self.bus.load_mar(alu_data, task, extended)?;
            }
            f1::TASK => {
                // A TASK in the first instruction after a switch does
                // not take effect.  Observed on real hardware.
                if !self.cpu.tasks[index].first_instruction_after_switch {
                    completion = Completion::TaskSwitch;
                }
            }
            f1::BLOCK => {
                self.cpu.block_task(task)?;
                block = true;
            }
            f1::LLSH1 => self.shifter.set_operation(ShifterOp::ShiftLeft, 1),
            f1::LRSH1 => self.shifter.set_operation(ShifterOp::ShiftRight, 1),
            f1::LLCY8 => self.shifter.set_operation(ShifterOp::RotateLeft, 8),
            _ => behavior.f1(self, task, instruction)?,
        }

        match instruction.f2 {
            f2::NONE | f2::CONSTANT => (),
            f2::BUSEQ0 => {
                if self.cpu.tasks[index].bus_data == 0 {
                    self.cpu.tasks[index].next_modifier = 1;
                }
            }
            // Handled after the shifter runs.
            f2::SHLT0 | f2::SHEQ0 => (),
            f2::BUS => {
                self.cpu.tasks[index].next_modifier = self.cpu.tasks[index].bus_data & 0x3ff;
            }
            f2::ALUCY => {
                // The carry from the most recent Load-L, not from
                // this instruction's ALU operation.
                self.cpu.tasks[index].next_modifier = self.cpu.alu_c0;
            }
            f2::STORE_MD => {
                // When F1 is a MAR<- on an Alto II this pairing means
                // XMAR and no store happens.
                let data = self.cpu.tasks[index].bus_data;
                if self.system_type.is_alto_i() || instruction.f1 != f1::LOAD_MAR {
                    self.bus.load_md(data, &mut self.memory, &mut self.io)?;
                }
            }
            _ => behavior.f2(self, task, instruction)?,
        }

        // The shifter only runs when something consumes its output.
        // With no shift operation set it passes L through.
        if self.cpu.tasks[index].load_r || instruction.need_shifter_output {
            if self.shifter.op() == ShifterOp::None {
                self.shifter.set_output(self.cpu.l);
            } else {
                self.shifter.operate(self.cpu.l, self.cpu.t)?;
            }
        }

        match instruction.f2 {
            f2::SHLT0 => {
                if (self.shifter.output() & 0x8000) != 0 {
                    self.cpu.tasks[index].next_modifier = 1;
                }
            }
            f2::SHEQ0 => {
                if self.shifter.output() == 0 {
                    self.cpu.tasks[index].next_modifier = 1;
                }
            }
            _ => (),
        }

        if self.cpu.tasks[index].load_r {
            let r_select = self.cpu.tasks[index].r_select;
            self.cpu.r[r_select] = self.shifter.output();
        }

        if self.cpu.tasks[index].load_s {
            let rb = self.cpu.tasks[index].rb;
            let sr_select = self.cpu.tasks[index].sr_select;
            self.cpu.s[rb][sr_select] = self.cpu.m;
        }

        if instruction.load_t {
            self.cpu.t = if instruction.load_t_from_alu {
                alu_data
            } else {
                self.cpu.tasks[index].bus_data
            };
            // The control RAM address register loads from the ALU
            // output whenever T loads.
            self.ucode.load_control_ram_address(alu_data);
        }

        if instruction.load_l {
            self.cpu.l = alu_data;
            // Only the RAM-related task keeps M in step with L.
            if task == TaskKind::Emulator {
                self.cpu.m = alu_data;
            }
            self.cpu.alu_c0 = self.alu.carry;
        }

        behavior.f2_late(self, task, instruction);

        // Bank switching armed last cycle keys off this instruction's
        // modified NEXT field.
        if sw_mode {
            self.ucode.switch_mode(instruction.next | next_modifier, task);
        }

        if block {
            behavior.execute_block(self, task)?;
        }

        if !self.cpu.tasks[index].was_soft_reset {
            self.cpu.tasks[index].mpc = instruction.next | next_modifier;
        }

        self.cpu.tasks[index].first_instruction_after_switch = false;

        Ok(completion)
    }
}
