//! The whole machine: registers, microcode store, ALU, shifter,
//! memory, bus, devices and scheduler, stepped one microinstruction
//! cycle at a time.
use tracing::{Level, event};

use wasm_bindgen::prelude::*;

use base::prelude::*;

use super::alarm::Alarm;
use super::alu::Alu;
use super::bus::MemoryBus;
use super::control::Cpu;
use super::io::Peripherals;
use super::memory::MainMemory;
use super::scheduler::{EventAction, Scheduler};
use super::shifter::Shifter;
use super::task::{Completion, behavior};
use super::ucode::UCodeMemory;

#[wasm_bindgen]
pub struct Alto {
    pub(crate) system_type: SystemType,
    pub(crate) cpu: Cpu,
    pub(crate) bus: MemoryBus,
    pub(crate) memory: MainMemory,
    pub(crate) ucode: UCodeMemory,
    pub(crate) alu: Alu,
    pub(crate) shifter: Shifter,
    pub(crate) scheduler: Scheduler,
    pub(crate) io: Peripherals,
}

impl Alto {
    /// A machine with blank ROMs; useful when the microcode will be
    /// loaded into the writable bank.
    #[must_use]
    pub fn new(system_type: SystemType) -> Alto {
        Alto::with_roms(
            system_type,
            ConstantRom::default(),
            AcSourceRom::default(),
            &MicrocodeRom::default(),
        )
    }

    #[must_use]
    pub fn with_roms(
        system_type: SystemType,
        constants: ConstantRom,
        acsource: AcSourceRom,
        microcode: &MicrocodeRom,
    ) -> Alto {
        event!(Level::DEBUG, "building {} machine", system_type);
        Alto {
            system_type,
            cpu: Cpu::new(),
            bus: MemoryBus::new(system_type),
            memory: MainMemory::new(system_type),
            ucode: UCodeMemory::new(system_type, constants, acsource, microcode),
            alu: Alu::new(),
            shifter: Shifter::new(),
            scheduler: Scheduler::new(),
            io: Peripherals::new(),
        }
    }

    #[must_use]
    pub fn system_type(&self) -> SystemType {
        self.system_type
    }

    #[must_use]
    pub fn current_task(&self) -> TaskKind {
        self.cpu.current_task
    }

    #[must_use]
    pub fn simulated_time_nsec(&self) -> u64 {
        self.scheduler.current_time_nsec()
    }

    /// Hard reset, as at power-up.
    pub fn reset(&mut self) {
        self.cpu.reset();
        self.bus.reset();
        self.memory.reset();
        self.ucode.reset();
        self.alu.reset();
        self.shifter.reset();
        self.scheduler.reset();
        self.io.reset();
    }

    /// The BOOT soft reset: every task restarts at its own address in
    /// the microcode bank the reset mode register names for it, and
    /// the emulator resumes control.
    pub(crate) fn soft_reset(&mut self) -> Result<(), Alarm> {
        for task in TaskKind::ALL {
            self.cpu.tasks[task.index()].soft_reset(task);
        }
        self.ucode.load_banks_from_rmr(self.cpu.rmr);
        self.cpu.rmr = 0;
        self.cpu.current_task = TaskKind::Emulator;

        // The sector task must reinitialise itself as soon as the
        // emulator yields, or it stomps on the control block the boot
        // microcode sets up.
        self.cpu.wakeup_task(TaskKind::DiskSector)?;

        // Suppress the MPC update at the end of the instruction that
        // issued the reset.
        self.cpu.tasks[TaskKind::Emulator.index()].was_soft_reset = true;

        event!(Level::DEBUG, "soft reset");
        Ok(())
    }

    pub(crate) fn apply_action(&mut self, action: EventAction) -> Result<(), Alarm> {
        match action {
            EventAction::WakeTask(task) => self.cpu.wakeup_task(task),
            EventAction::BlockTask(task) => self.cpu.block_task(task),
        }
    }

    /// One system clock: the memory state machine, one
    /// microinstruction on the current task, then any due scheduler
    /// events.
    pub fn step(&mut self) -> Result<(), Alarm> {
        self.bus.clock(&mut self.memory, &mut self.io);

        match self.execute_next()? {
            Completion::TaskSwitch => {
                // Takes effect after the NEXT instruction completes,
                // not this one.
                self.cpu.task_switch();
            }
            Completion::Normal => {
                if let Some(next) = self.cpu.next_task.take() {
                    self.cpu.current_task = next;
                    behavior(next).on_task_switch(self, next);
                }
            }
            Completion::MemoryWait => {
                // Nothing happened, and a pending switch stays
                // pending.
            }
        }

        for fired in self.scheduler.clock() {
            event!(
                Level::TRACE,
                "event at {}ns (skew {}ns): {:?}",
                fired.time_nsec,
                fired.skew_nsec,
                fired.action
            );
            self.apply_action(fired.action)?;
        }
        Ok(())
    }

    /// Step `steps` times, stopping at the first alarm.
    pub fn run(&mut self, steps: u64) -> Result<(), Alarm> {
        for _ in 0..steps {
            self.step()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ucode::MicrocodeBank;

    fn encode(
        rselect: u32,
        aluf: u32,
        bs: u32,
        f1: u32,
        f2: u32,
        load_t: bool,
        load_l: bool,
        next: u32,
    ) -> u32 {
        (rselect << 27)
            | (aluf << 23)
            | (bs << 20)
            | (f1 << 16)
            | (f2 << 12)
            | (u32::from(load_t) << 11)
            | (u32::from(load_l) << 10)
            | next
    }

    const BS_NONE: u32 = 2;

    /// Machine with real-looking mask constants (all ones) running
    /// from the writable microcode bank.
    fn test_machine() -> Alto {
        let mut alto = Alto::with_roms(
            SystemType::AltoIIXm2k,
            ConstantRom::from_words([0xffff; 256]),
            AcSourceRom::default(),
            &MicrocodeRom::default(),
        );
        alto.ucode.load_banks_from_rmr(0);
        alto
    }

    fn put(alto: &mut Alto, address: u16, raw: u32) {
        alto.ucode.write_ram_word(address, raw);
    }

    #[test]
    fn task_switch_takes_effect_one_instruction_late() {
        let mut alto = test_machine();
        put(&mut alto, 0, encode(0, 0, BS_NONE, 0, 0, false, false, 1));
        put(&mut alto, 1, encode(0, 0, BS_NONE, 2, 0, false, false, 2)); // TASK
        put(&mut alto, 2, encode(0, 0, BS_NONE, 0, 0, false, false, 3));
        put(&mut alto, 14, encode(0, 0, BS_NONE, 0, 0, false, false, 0o20));
        alto.cpu.wakeup_task(TaskKind::DiskWord).unwrap();

        alto.step().unwrap();
        assert_eq!(alto.current_task(), TaskKind::Emulator);
        alto.step().unwrap(); // TASK executes here
        assert_eq!(alto.current_task(), TaskKind::Emulator);
        alto.step().unwrap(); // switch applies after the next instruction
        assert_eq!(alto.current_task(), TaskKind::DiskWord);
        assert_eq!(alto.cpu.tasks[TaskKind::Emulator.index()].mpc, 3);
    }

    #[test]
    fn task_in_first_instruction_after_switch_is_ignored() {
        let mut alto = test_machine();
        // The very first instruction after reset counts as
        // first-after-switch too.
        put(&mut alto, 0, encode(0, 0, BS_NONE, 2, 0, false, false, 1)); // TASK
        put(&mut alto, 1, encode(0, 0, BS_NONE, 2, 0, false, false, 2)); // TASK
        alto.cpu.wakeup_task(TaskKind::DiskWord).unwrap();

        alto.step().unwrap();
        assert_eq!(alto.cpu.next_task, None);
        alto.step().unwrap();
        assert_eq!(alto.cpu.next_task, Some(TaskKind::DiskWord));
    }

    #[test]
    fn swmode_switches_banks_one_instruction_late() {
        let mut alto = test_machine();
        put(&mut alto, 0, encode(0, 0, BS_NONE, 8, 0, false, false, 1)); // SWMODE
        put(&mut alto, 1, encode(0, 0, BS_NONE, 0, 0, false, false, 0x100));

        alto.step().unwrap();
        assert_eq!(alto.ucode.get_bank(TaskKind::Emulator), MicrocodeBank::Ram0);
        alto.step().unwrap();
        // The NEXT field of the following instruction names the
        // destination bank.
        assert_eq!(alto.ucode.get_bank(TaskKind::Emulator), MicrocodeBank::Rom1);
    }

    #[test]
    fn memory_wait_freezes_the_task_until_data_is_ready() {
        let mut alto = test_machine();
        alto.memory.load(0, 0x1234, TaskKind::Emulator, false);
        // MAR<- 0 (loading R forces the bus to zero).
        put(&mut alto, 0, encode(0, 0, 1, 1, 0, false, false, 1));
        // T<- MD
        put(&mut alto, 1, encode(0, 0, 5, 0, 0, true, false, 2));

        alto.step().unwrap();
        assert_eq!(alto.cpu.tasks[TaskKind::Emulator.index()].mpc, 1);
        for _ in 0..3 {
            // Cycles 2 through 4: memory not ready, nothing executes.
            alto.step().unwrap();
            assert_eq!(alto.cpu.tasks[TaskKind::Emulator.index()].mpc, 1);
        }
        alto.step().unwrap();
        assert_eq!(alto.cpu.tasks[TaskKind::Emulator.index()].mpc, 2);
        assert_eq!(alto.cpu.t, 0x1234);
    }

    #[test]
    fn pending_task_switch_survives_a_memory_wait() {
        let mut alto = test_machine();
        // MAR<- 0, then TASK, then T<- MD which must stall.
        put(&mut alto, 0, encode(0, 0, 1, 1, 0, false, false, 1));
        put(&mut alto, 1, encode(0, 0, BS_NONE, 2, 0, false, false, 2));
        put(&mut alto, 2, encode(0, 0, 5, 0, 0, true, false, 3));
        put(&mut alto, 14, encode(0, 0, BS_NONE, 0, 0, false, false, 0o20));
        alto.cpu.wakeup_task(TaskKind::DiskWord).unwrap();

        alto.step().unwrap();
        alto.step().unwrap(); // TASK
        assert_eq!(alto.cpu.next_task, Some(TaskKind::DiskWord));
        for _ in 0..2 {
            // Memory cycles 3 and 4: the read stalls and the pending
            // switch must not be consumed.
            alto.step().unwrap();
            assert_eq!(alto.current_task(), TaskKind::Emulator);
            assert_eq!(alto.cpu.next_task, Some(TaskKind::DiskWord));
        }
        alto.step().unwrap();
        assert_eq!(alto.current_task(), TaskKind::DiskWord);
    }

    #[test]
    fn startf_boot_soft_resets_the_machine() {
        let mut alto = test_machine();
        // Bus data is all ones, so bit 0x8000 selects the BOOT path.
        put(&mut alto, 0, encode(0, 0, BS_NONE, 15, 0, false, false, 0o77));

        alto.step().unwrap();
        assert_eq!(alto.cpu.tasks[TaskKind::Emulator.index()].mpc, 0);
        assert_eq!(alto.cpu.rmr, 0);
        assert!(alto.cpu.tasks[TaskKind::DiskSector.index()].wakeup);
        // RMR was still the power-up value of all ones, so every task
        // lands back in ROM0.
        assert_eq!(alto.ucode.get_bank(TaskKind::Emulator), MicrocodeBank::Rom0);
    }

    #[test]
    fn load_ir_dispatch_modifies_the_following_next_field() {
        let mut alto = test_machine();
        // IR<- with all ones on the bus: bus bits 0, 5, 6, 7 merge
        // into NEXT of the instruction after this one.
        put(&mut alto, 0, encode(0, 0, BS_NONE, 0, 12, false, false, 0x10));
        put(&mut alto, 0x10, encode(0, 0, BS_NONE, 0, 0, false, false, 0x20));

        alto.step().unwrap();
        assert_eq!(alto.cpu.ir, 0xffff);
        assert_eq!(alto.cpu.tasks[TaskKind::Emulator.index()].mpc, 0x10);
        alto.step().unwrap();
        assert_eq!(alto.cpu.tasks[TaskKind::Emulator.index()].mpc, 0x2f);
    }

    #[test]
    fn dns_sets_the_nova_skip_and_carry_flip_flops() {
        let mut alto = test_machine();
        // A Nova MOV 0,3 SZR: destination from 3-IR[3-4], carry
        // control Z, skip on zero result.
        alto.cpu.ir = 0x214;
        put(&mut alto, 0, encode(0, 0, BS_NONE, 0, 10, false, false, 1)); // DNS<-

        alto.step().unwrap();
        let state = &alto.cpu.tasks[TaskKind::Emulator.index()];
        // L was zero, so the result is zero and SZR skips.
        assert_eq!(state.skip, 1);
        assert_eq!(state.carry, 0);
        assert_eq!(alto.cpu.r[3], 0);
    }

    #[test]
    fn scheduler_events_deliver_task_wakeups() {
        let mut alto = test_machine();
        put(&mut alto, 0, encode(0, 0, BS_NONE, 0, 0, false, false, 0));
        alto.scheduler.schedule(
            crate::scheduler::TIME_STEP_NSEC,
            0,
            EventAction::WakeTask(TaskKind::Ethernet),
        );

        assert!(!alto.cpu.tasks[TaskKind::Ethernet.index()].wakeup);
        alto.step().unwrap();
        assert!(alto.cpu.tasks[TaskKind::Ethernet.index()].wakeup);
    }

    #[test]
    fn block_f1_from_the_emulator_is_an_alarm() {
        let mut alto = test_machine();
        put(&mut alto, 0, encode(0, 0, BS_NONE, 3, 0, false, false, 1)); // BLOCK

        assert_eq!(alto.step(), Err(Alarm::CannotBlockEmulatorTask));
    }
}
