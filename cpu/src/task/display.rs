//! Display pipeline tasks (word, horizontal, vertical, cursor) and
//! the memory refresh task.  The horizontal, vertical and cursor
//! tasks run once per wakeup; the word task's wakeup is governed by
//! the display FIFO and the self-block flags in the controller.
use base::prelude::*;

use crate::alarm::Alarm;
use crate::system::Alto;

use super::TaskBehavior;

mod dwf2 {
    pub const LOAD_DDR: u8 = 8;
}

mod dhf2 {
    pub const EVENFIELD: u8 = 8;
    pub const SETMODE: u8 = 9;
}

mod dvf2 {
    pub const EVENFIELD: u8 = 8;
}

mod cf2 {
    pub const LOAD_XPREG: u8 = 8;
    pub const LOAD_CSR: u8 = 9;
}

pub(crate) struct DisplayWordTask;

impl TaskBehavior for DisplayWordTask {
    fn f2(
        &self,
        alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        match instruction.f2 {
            dwf2::LOAD_DDR => {
                let bus_data = alto.cpu.tasks[task.index()].bus_data;
                let action = alto.io.display.load_ddr(bus_data);
                alto.apply_action(action)
            }
            _ => Err(Alarm::UnhandledF2 {
                task,
                f2: instruction.f2,
            }),
        }
    }

    fn execute_block(&self, alto: &mut Alto, _task: TaskKind) -> Result<(), Alarm> {
        let action = alto.io.display.set_dwt_block(true);
        alto.apply_action(action)?;
        // The horizontal task takes over at end of the word task's
        // scanline work, unless it has blocked itself for the field.
        if !alto.io.display.dht_blocked() {
            alto.cpu.wakeup_task(TaskKind::DisplayHorizontal)?;
        }
        Ok(())
    }
}

pub(crate) struct DisplayHorizontalTask;

impl TaskBehavior for DisplayHorizontalTask {
    fn on_task_switch(&self, alto: &mut Alto, task: TaskKind) {
        alto.cpu.tasks[task.index()].wakeup = false;
    }

    fn f2(
        &self,
        alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        let index = task.index();
        match instruction.f2 {
            dhf2::EVENFIELD => {
                if alto.io.display.even_field {
                    alto.cpu.tasks[index].next_modifier |= 1;
                }
            }
            dhf2::SETMODE => {
                let bus_data = alto.cpu.tasks[index].bus_data;
                alto.io.display.set_mode(bus_data);
                if (bus_data & 0x8000) != 0 {
                    alto.cpu.tasks[index].next_modifier |= 1;
                }
            }
            _ => {
                return Err(Alarm::UnhandledF2 {
                    task,
                    f2: instruction.f2,
                });
            }
        }
        Ok(())
    }

    fn execute_block(&self, alto: &mut Alto, _task: TaskKind) -> Result<(), Alarm> {
        let action = alto.io.display.set_dht_block(true);
        alto.apply_action(action)
    }
}

pub(crate) struct DisplayVerticalTask;

impl TaskBehavior for DisplayVerticalTask {
    fn on_task_switch(&self, alto: &mut Alto, task: TaskKind) {
        alto.cpu.tasks[task.index()].wakeup = false;
    }

    fn f2(
        &self,
        alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        match instruction.f2 {
            dvf2::EVENFIELD => {
                if alto.io.display.even_field {
                    alto.cpu.tasks[task.index()].next_modifier |= 1;
                }
                Ok(())
            }
            _ => Err(Alarm::UnhandledF2 {
                task,
                f2: instruction.f2,
            }),
        }
    }
}

pub(crate) struct CursorTask;

impl TaskBehavior for CursorTask {
    fn on_task_switch(&self, alto: &mut Alto, task: TaskKind) {
        alto.cpu.tasks[task.index()].wakeup = false;
    }

    fn f2(
        &self,
        alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        let bus_data = alto.cpu.tasks[task.index()].bus_data;
        match instruction.f2 {
            cf2::LOAD_XPREG => {
                alto.io.display.load_xpreg(bus_data);
                Ok(())
            }
            cf2::LOAD_CSR => {
                alto.io.display.load_csr(bus_data);
                Ok(())
            }
            _ => Err(Alarm::UnhandledF2 {
                task,
                f2: instruction.f2,
            }),
        }
    }
}

pub(crate) struct MemoryRefreshTask;

impl TaskBehavior for MemoryRefreshTask {
    fn f1_early(&self, alto: &mut Alto, task: TaskKind, instruction: &Microinstruction) {
        // Alto I quirk: a MAR<- from R37 is the refresh idiom and
        // blocks the task instead of starting a memory operation.
        let index = task.index();
        if alto.system_type.is_alto_i()
            && instruction.f1 == f1::LOAD_MAR
            && alto.cpu.tasks[index].r_select == 31
        {
            alto.cpu.tasks[index].wakeup = false;
        }
    }
}
