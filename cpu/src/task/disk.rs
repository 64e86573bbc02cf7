//! Disk sector and disk word tasks.  Both share one behaviour; the
//! word task additionally participates in the WDINIT protocol, which
//! ORs 0x1f into the branch modifier on INIT and RWC style branches
//! while the microcode is setting a transfer up.
use base::prelude::*;

use crate::alarm::Alarm;
use crate::io::KSTAT_STROBE;
use crate::system::Alto;

use super::TaskBehavior;

mod bs {
    pub const READ_KSTAT: u8 = 3;
    pub const READ_KDATA: u8 = 4;
}

mod df1 {
    pub const STROBE: u8 = 9;
    pub const LOAD_KSTAT: u8 = 10;
    pub const INCRECNO: u8 = 11;
    pub const CLRSTAT: u8 = 12;
    pub const LOAD_KCOMM: u8 = 13;
    pub const LOAD_KADR: u8 = 14;
    pub const LOAD_KDATA: u8 = 15;
}

mod df2 {
    pub const INIT: u8 = 8;
    pub const RWC: u8 = 9;
    pub const RECNO: u8 = 10;
    pub const XFRDAT: u8 = 11;
    pub const SWRNRDY: u8 = 12;
    pub const NFER: u8 = 13;
    pub const STROBON: u8 = 14;
}

pub(crate) struct DiskTask;

fn init_modifier(alto: &Alto, task: TaskKind) -> u16 {
    if task == TaskKind::DiskWord && alto.io.disk.wd_init {
        0x1f
    } else {
        0
    }
}

impl TaskBehavior for DiskTask {
    fn on_task_switch(&self, alto: &mut Alto, task: TaskKind) {
        if task == TaskKind::DiskSector {
            alto.io.disk.seclate_enable = false;
        }
    }

    fn bus_source(&self, alto: &mut Alto, task: TaskKind, bs: u8) -> Result<Word, Alarm> {
        match bs {
            bs::READ_KSTAT => Ok(alto.io.disk.kstat()),
            bs::READ_KDATA => Ok(alto.io.disk.kdata()),
            _ => Err(Alarm::UnhandledBusSource { task, bs }),
        }
    }

    fn f1(
        &self,
        alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        let bus_data = alto.cpu.tasks[task.index()].bus_data;
        match instruction.f1 {
            df1::STROBE => alto.io.disk.strobe(),
            df1::LOAD_KSTAT => alto.io.disk.set_kstat(bus_data),
            df1::INCRECNO => alto.io.disk.increment_record(),
            df1::CLRSTAT => alto.io.disk.clear_status(),
            df1::LOAD_KCOMM => alto.io.disk.set_kcom((bus_data & 0x7c00) >> 10),
            df1::LOAD_KADR => alto.io.disk.set_kadr(bus_data & 0xff),
            df1::LOAD_KDATA => alto.io.disk.set_kdata(bus_data),
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
        let mut modifier = init_modifier(alto, task);
        match instruction.f2 {
            df2::INIT => (),
            df2::RWC => {
                // Branch on the action field of KADR: read, check,
                // or write.
                match alto.io.disk.rwc() {
                    1 => modifier |= 0x2,
                    2 | 3 => modifier |= 0x3,
                    _ => (),
                }
            }
            df2::RECNO => modifier |= alto.io.disk.recno(),
            df2::XFRDAT => {
                if alto.io.disk.data_xfer() {
                    modifier |= 0x1;
                }
            }
            df2::SWRNRDY => {
                if !alto.io.disk.ready() {
                    modifier |= 0x1;
                }
            }
            df2::NFER => {
                if !alto.io.disk.fatal_error() {
                    modifier |= 0x1;
                }
            }
            df2::STROBON => {
                if (alto.io.disk.kstat() & KSTAT_STROBE) != 0 {
                    modifier |= 0x1;
                }
            }
            _ => {
                return Err(Alarm::UnhandledF2 {
                    task,
                    f2: instruction.f2,
                });
            }
        }
        alto.cpu.tasks[task.index()].next_modifier |= modifier;
        Ok(())
    }

    fn execute_block(&self, alto: &mut Alto, task: TaskKind) -> Result<(), Alarm> {
        if task == TaskKind::DiskWord {
            alto.io.disk.wd_init = false;
        }
        Ok(())
    }
}
