//! Emulator task: the Nova instruction-set interpreter's hardware
//! assists.  These are the S register file, the IR dispatch PROMs,
//! Nova-style shifts with carry and skip, and the control functions
//! that reach the microcode RAM and the reset machinery.
use tracing::{Level, event};

use base::prelude::*;

use crate::alarm::Alarm;
use crate::system::Alto;

use super::TaskBehavior;

mod bs {
    pub const READ_S_LOCATION: u8 = 3;
    pub const LOAD_S_LOCATION: u8 = 4;
}

mod ef1 {
    pub const SWMODE: u8 = 8;
    pub const WRTRAM: u8 = 9;
    pub const RDRAM: u8 = 10;
    pub const LOAD_RMR: u8 = 11;
    pub const LOAD_ESRB: u8 = 13;
    pub const RSNF: u8 = 14;
    pub const STARTF: u8 = 15;
}

mod ef2 {
    pub const BUSODD: u8 = 8;
    pub const MAGIC: u8 = 9;
    pub const LOAD_DNS: u8 = 10;
    pub const ACDEST: u8 = 11;
    pub const LOAD_IR: u8 = 12;
    pub const IDISP: u8 = 13;
    pub const ACSOURCE: u8 = 14;
}

pub(crate) struct EmulatorTask;

impl TaskBehavior for EmulatorTask {
    fn bus_source(&self, alto: &mut Alto, task: TaskKind, bs: u8) -> Result<Word, Alarm> {
        let index = task.index();
        match bs {
            bs::READ_S_LOCATION => {
                // S register address zero gates the held M register
                // onto the bus instead.
                let state = &alto.cpu.tasks[index];
                if state.sr_select != 0 {
                    Ok(alto.cpu.s[state.rb][state.sr_select])
                } else {
                    Ok(alto.cpu.m)
                }
            }
            bs::LOAD_S_LOCATION => {
                alto.cpu.tasks[index].load_s = true;
                Ok(0xffff)
            }
            _ => Err(Alarm::UnhandledBusSource { task, bs }),
        }
    }

    fn f1_early(&self, alto: &mut Alto, task: TaskKind, instruction: &Microinstruction) {
        if instruction.f1 == ef1::RSNF {
            // The Ethernet interface gates the host address onto
            // BUS[8-15]; the high byte is not driven and stays ones.
            alto.cpu.tasks[task.index()].bus_data &= 0xff00 | crate::io::ETHERNET_ADDRESS;
        }
    }

    fn f1(
        &self,
        alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        let index = task.index();
        match instruction.f1 {
            ef1::SWMODE => alto.cpu.tasks[index].sw_mode = true,
            ef1::WRTRAM => alto.cpu.tasks[index].wrt_ram = true,
            ef1::RDRAM => alto.cpu.tasks[index].rd_ram = true,
            ef1::LOAD_RMR => {
                // Bus bit i selects the startup microcode bank of
                // task i at the next soft reset: 1 for ROM0, 0 for
                // RAM0.
                alto.cpu.rmr = alto.cpu.tasks[index].bus_data;
            }
            ef1::LOAD_ESRB => {
                let mut rb = usize::from((alto.cpu.tasks[index].bus_data & 0xe) >> 1);
                if rb != 0 && !alto.system_type.has_3k_ram() {
                    // Machines without the 3K RAM option only have S
                    // bank zero.
                    rb = 0;
                }
                alto.cpu.tasks[index].rb = rb;
            }
            ef1::RSNF => {
                // Handled early.
            }
            ef1::STARTF => {
                let bus_data = alto.cpu.tasks[index].bus_data;
                if (bus_data & 0x8000) != 0 {
                    // BOOT: soft-reset the machine using the current
                    // reset mode register.  The MPC update at the end
                    // of this cycle is suppressed.
                    alto.soft_reset()?;
                } else if bus_data != 0 {
                    if bus_data < 4 {
                        let action = alto.io.ethernet.startf(bus_data);
                        alto.apply_action(action)?;
                    } else {
                        event!(
                            Level::WARN,
                            "STARTF for a device that is not attached (code {:o})",
                            bus_data
                        );
                    }
                }
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

    fn f2_early(&self, alto: &mut Alto, task: TaskKind, instruction: &Microinstruction) {
        let index = task.index();
        match instruction.f2 {
            ef2::ACSOURCE => {
                // Replace the low two bits of RSELECT with the
                // complement of the SrcAC field of IR, addressing the
                // accumulators in R0-R3.
                let state = &mut alto.cpu.tasks[index];
                state.r_select = (state.r_select & !0x3)
                    | usize::from(((alto.cpu.ir & 0x6000) >> 13) ^ 3);
            }
            ef2::ACDEST | ef2::LOAD_DNS => {
                // Same substitution from the DstAC field.
                let state = &mut alto.cpu.tasks[index];
                state.r_select = (state.r_select & !0x3)
                    | usize::from(((alto.cpu.ir & 0x1800) >> 11) ^ 3);
            }
            _ => (),
        }
    }

    fn f2(
        &self,
        alto: &mut Alto,
        task: TaskKind,
        instruction: &Microinstruction,
    ) -> Result<(), Alarm> {
        let index = task.index();
        match instruction.f2 {
            ef2::LOAD_IR => {
                let bus_data = alto.cpu.tasks[index].bus_data;
                alto.cpu.ir = bus_data;
                // IR<- merges bus bits 0, 5, 6 and 7 into NEXT[6-9]
                // for the first-level instruction dispatch, and
                // clears SKIP.
                alto.cpu.tasks[index].next_modifier =
                    ((bus_data & 0x8000) >> 12) | ((bus_data & 0x0700) >> 8);
                alto.cpu.tasks[index].skip = 0;
            }
            ef2::IDISP => {
                // 16-way dispatch under a PROM and a multiplexer.
                if (alto.cpu.ir & 0x8000) != 0 {
                    alto.cpu.tasks[index].next_modifier = 3 - ((alto.cpu.ir & 0xc0) >> 6);
                } else {
                    let prom_index = usize::from((alto.cpu.ir & 0x7f00) >> 8) + 0x80;
                    alto.cpu.tasks[index].next_modifier =
                        Word::from(alto.ucode.acsource(prom_index));
                }
            }
            ef2::ACSOURCE => {
                // Late half: another PROM dispatch, this one keyed
                // without the IDISP offset.
                if (alto.cpu.ir & 0x8000) != 0 {
                    alto.cpu.tasks[index].next_modifier = 3 - ((alto.cpu.ir & 0xc0) >> 6);
                } else {
                    let prom_index = usize::from((alto.cpu.ir & 0x7f00) >> 8);
                    alto.cpu.tasks[index].next_modifier =
                        Word::from(alto.ucode.acsource(prom_index));
                }
            }
            ef2::ACDEST => {
                // Handled early.
            }
            ef2::BUSODD => {
                // Merge BUS[15] into NEXT[9].
                alto.cpu.tasks[index].next_modifier |= alto.cpu.tasks[index].bus_data & 0x1;
            }
            ef2::MAGIC => alto.shifter.set_magic(true),
            ef2::LOAD_DNS => {
                // DNS<- stores into R unless IR[12] is set, and runs
                // the shifter in Nova mode with a carry input derived
                // from the carry control field and the ALU result.
                alto.cpu.tasks[index].load_r = (alto.cpu.ir & 0x0008) == 0;

                let mut carry = match alto.cpu.ir & 0x30 {
                    0x10 => 0,
                    0x20 => 1,
                    0x30 => !alto.cpu.tasks[index].carry & 0x1,
                    _ => alto.cpu.tasks[index].carry,
                };

                match alto.cpu.ir & 0x700 {
                    // COM, MOV, AND leave carry alone.
                    0x000 | 0x200 | 0x700 => (),
                    // NEG, INC, ADC, SUB, ADD invert it when the ALU
                    // carried.
                    _ => {
                        if alto.cpu.alu_c0 != 0 {
                            carry = !carry & 0x1;
                        }
                    }
                }

                alto.shifter.set_dns(true, carry);
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

    fn f2_late(&self, alto: &mut Alto, task: TaskKind, instruction: &Microinstruction) {
        if instruction.f2 == ef2::LOAD_DNS {
            // Set the SKIP and CARRY flip-flops from the result after
            // it has passed through the shifter.
            let result = alto.shifter.output();
            let carry = alto.shifter.dns_carry();
            let state = &mut alto.cpu.tasks[task.index()];

            state.skip = match alto.cpu.ir & 0x7 {
                1 => 1,                                            // SKP
                2 => Word::from(carry == 0),                       // SZC
                3 => carry,                                        // SNC
                4 => Word::from(result == 0),                      // SZR
                5 => Word::from(result != 0),                      // SNR
                6 => Word::from(result == 0 || carry == 0),        // SEZ
                7 => Word::from(result != 0 && carry != 0),        // SBN
                _ => 0,
            };

            if state.load_r {
                state.carry = carry;
            }
        }
    }
}
