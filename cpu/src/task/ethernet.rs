//! Ethernet task.  The controller behind it is a register-level stub
//! with no network attached, but the full microcode protocol (FIFO
//! access, status post, command branches, countdown wakeups) is
//! honoured.
use base::prelude::*;

use crate::alarm::Alarm;
use crate::scheduler::{EventAction, TIME_STEP_NSEC};
use crate::system::Alto;

use super::TaskBehavior;

mod bs {
    pub const EIDFCT: u8 = 4;
}

mod nf1 {
    pub const EILFCT: u8 = 11;
    pub const EPFCT: u8 = 12;
    pub const EWFCT: u8 = 13;
}

mod nf2 {
    pub const EODFCT: u8 = 8;
    pub const EOSFCT: u8 = 9;
    pub const ERBFCT: u8 = 10;
    pub const EEFCT: u8 = 11;
    pub const EBFCT: u8 = 12;
    pub const ECBFCT: u8 = 13;
    pub const EISFCT: u8 = 14;
}

pub(crate) struct EthernetTask;

impl TaskBehavior for EthernetTask {
    fn pre_execute(&self, alto: &mut Alto, task: TaskKind) {
        // A countdown wakeup only lasts until the task runs once.
        if alto.io.ethernet.countdown_wakeup {
            alto.io.ethernet.countdown_wakeup = false;
            alto.cpu.tasks[task.index()].wakeup = false;
        }
    }

    fn bus_source(&self, alto: &mut Alto, task: TaskKind, bs: u8) -> Result<Word, Alarm> {
        match bs {
            bs::EIDFCT => {
                // Input data function: gate the FIFO head onto the
                // bus and advance the read pointer.
                let (data, action) = alto.io.ethernet.read_input_fifo();
                if let Some(action) = action {
                    alto.apply_action(action)?;
                }
                Ok(data)
            }
            _ => Err(Alarm::UnhandledBusSource { task, bs }),
        }
    }

    fn f1_early(&self, alto: &mut Alto, task: TaskKind, instruction: &Microinstruction) {
        if instruction.f1 == nf1::EILFCT {
            // Input look function: the FIFO head without consuming
            // it.
            let head = alto.io.ethernet.peek_input_fifo();
            alto.cpu.tasks[task.index()].bus_data &= head;
        }
    }

    fn f1(
        &self,
        alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        match instruction.f1 {
            nf1::EILFCT => {
                // Handled early.
            }
            nf1::EPFCT => {
                // Post function: interface status onto the bus, then
                // reset the interface and drop the wakeup.
                let status = alto.io.ethernet.status;
                alto.cpu.tasks[task.index()].bus_data &= status;
                let action = alto.io.ethernet.reset_interface();
                alto.apply_action(action)?;
                alto.cpu.tasks[task.index()].wakeup = false;
            }
            nf1::EWFCT => {
                // Countdown wakeup: a flip-flop that wakes this task
                // on the next timer tick.
                alto.io.ethernet.countdown_wakeup = true;
                alto.scheduler.schedule(
                    TIME_STEP_NSEC,
                    0,
                    EventAction::WakeTask(TaskKind::Ethernet),
                );
            }
            _ => {
                return Err(Alarm::UnhandledF1 {
                    task,
                    f1: instruction.f1,
                });
            }
        }
        Ok(())
    }

    fn f2(
        &self,
        alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        let index = task.index();
        match instruction.f2 {
            nf2::EODFCT => {
                let bus_data = alto.cpu.tasks[index].bus_data;
                alto.io.ethernet.write_output_fifo(bus_data);
            }
            nf2::EOSFCT => {
                let action = alto.io.ethernet.start_output();
                alto.apply_action(action)?;
            }
            nf2::ERBFCT => {
                // Command dispatch: the ICMD/OCMD flip-flops the
                // emulator set with STARTF merge into NEXT[6-7].
                alto.cpu.tasks[index].next_modifier = alto.io.ethernet.io_cmd() << 2;
            }
            nf2::EEFCT => {
                let action = alto.io.ethernet.end_transmission();
                alto.apply_action(action)?;
            }
            nf2::EBFCT => {
                if alto.io.ethernet.data_late()
                    || alto.io.ethernet.io_cmd() != 0
                    || alto.io.ethernet.operation_done()
                {
                    alto.cpu.tasks[index].next_modifier |= 0x4;
                }
                if alto.io.ethernet.collision() {
                    alto.cpu.tasks[index].next_modifier |= 0x8;
                }
            }
            nf2::ECBFCT => {
                // Countdown branch: NEXT[7] when the FIFO has data.
                if !alto.io.ethernet.fifo_empty() {
                    alto.cpu.tasks[index].next_modifier |= 0x4;
                }
            }
            nf2::EISFCT => {
                alto.io.ethernet.start_input();
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
}
