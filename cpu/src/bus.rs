//! The memory bus and its timing state machine.
//!
//! Main memory takes several microinstruction cycles to answer; the
//! bus models that with a cycle counter that starts at LOAD_MAR and
//! determines when read data is latched, when store data is accepted
//! and when a new operation may begin.  The two machine generations
//! run the state machine on different schedules.  Only one operation
//! can be in flight system-wide.
use tracing::{Level, event};

use base::prelude::*;

use super::alarm::Alarm;
use super::io::Peripherals;
use super::memory::{MEM_TOP, MainMemory};

pub struct MemoryBus {
    system_type: SystemType,
    memory_cycle: u32,
    memory_address: Word,
    memory_data: Word,
    memory_data2: Word,
    double_word_store: bool,
    double_word_mixed: bool,
    memory_operation_active: bool,
    extended_memory_reference: bool,
    task: TaskKind,
}

impl MemoryBus {
    #[must_use]
    pub fn new(system_type: SystemType) -> MemoryBus {
        MemoryBus {
            system_type,
            memory_cycle: 0,
            memory_address: 0,
            memory_data: 0,
            memory_data2: 0,
            double_word_store: false,
            double_word_mixed: false,
            memory_operation_active: false,
            extended_memory_reference: false,
            task: TaskKind::Emulator,
        }
    }

    pub fn reset(&mut self) {
        self.memory_cycle = 0;
        self.memory_address = 0;
        self.memory_data = 0;
        self.memory_data2 = 0;
        self.double_word_store = false;
        self.double_word_mixed = false;
        self.memory_operation_active = false;
        self.extended_memory_reference = false;
    }

    #[must_use]
    pub fn operation_active(&self) -> bool {
        self.memory_operation_active
    }

    #[must_use]
    pub fn cycle(&self) -> u32 {
        self.memory_cycle
    }

    pub fn clock(&mut self, memory: &mut MainMemory, io: &mut Peripherals) {
        self.memory_cycle += 1;
        if !self.memory_operation_active {
            return;
        }
        if self.system_type.is_alto_i() {
            match self.memory_cycle {
                4 => {
                    self.memory_data = self.read_from_bus(self.memory_address, memory, io);
                }
                5 => {
                    // Second word of a double-word read.
                    self.memory_data2 = self.read_from_bus(self.memory_address | 1, memory, io);
                }
                7 => {
                    self.memory_operation_active = false;
                    self.double_word_store = false;
                }
                _ => (),
            }
        } else {
            match self.memory_cycle {
                3 => {
                    self.memory_data = self.read_from_bus(self.memory_address, memory, io);
                }
                4 => {
                    self.memory_data2 = self.read_from_bus(self.memory_address ^ 1, memory, io);
                }
                5 => {
                    self.memory_operation_active = false;
                    self.double_word_store = false;
                }
                _ => (),
            }
        }
    }

    /// Whether a microinstruction needing `operation` can proceed
    /// this cycle, or must stall.
    #[must_use]
    pub fn ready(&self, operation: MemoryOperation) -> bool {
        if !self.memory_operation_active {
            return true;
        }
        match operation {
            MemoryOperation::None => true,
            MemoryOperation::LoadAddress => false,
            MemoryOperation::Read => self.memory_cycle > 4,
            MemoryOperation::Store => {
                if self.system_type.is_alto_i() {
                    self.memory_cycle > 4
                } else {
                    self.memory_cycle > 2
                }
            }
        }
    }

    /// Begin a memory operation.  Starting one while another is in
    /// flight is a microcode-contract violation.
    pub fn load_mar(
        &mut self,
        address: Word,
        task: TaskKind,
        extended_memory_reference: bool,
    ) -> Result<(), Alarm> {
        if self.memory_operation_active {
            return Err(Alarm::MemoryOperationAlreadyActive { task, address });
        }
        event!(
            Level::TRACE,
            "{task} task starts memory operation at {address:#06x}"
        );
        self.memory_operation_active = true;
        self.double_word_store = false;
        self.double_word_mixed = false;
        self.memory_address = address;
        self.extended_memory_reference = extended_memory_reference;
        self.task = task;
        self.memory_cycle = 1;
        Ok(())
    }

    /// Read the memory data register.  The cycle already stalled on
    /// `ready`, so reaching an early cycle here is a protocol
    /// violation.
    pub fn read_md(&mut self) -> Result<Word, Alarm> {
        if self.system_type.is_alto_i() {
            if !self.memory_operation_active {
                return Ok(0xffff);
            }
            match self.memory_cycle {
                5 => Ok(self.memory_data),
                6 => Ok(self.memory_data2),
                cycle => Err(Alarm::ReadMdDuringCycle { cycle }),
            }
        } else if self.memory_operation_active {
            match self.memory_cycle {
                5 => Ok(self.memory_data),
                cycle => Err(Alarm::ReadMdDuringCycle { cycle }),
            }
        } else {
            // The Alto II latches memory contents, so MD stays
            // readable after the operation has ended.  Cycle 6 (or a
            // mixed double-word access) yields the second word.
            let data = if self.memory_cycle == 6 || (self.memory_cycle == 5 && self.double_word_mixed)
            {
                self.memory_data2
            } else {
                self.memory_data
            };
            self.double_word_mixed = false;
            Ok(data)
        }
    }

    /// Write the memory data register, storing to the in-flight
    /// address.  A second write in the right cycle makes the
    /// operation a double-word store.
    pub fn load_md(
        &mut self,
        data: Word,
        memory: &mut MainMemory,
        io: &mut Peripherals,
    ) -> Result<(), Alarm> {
        if !self.memory_operation_active {
            return Ok(());
        }
        if self.system_type.is_alto_i() {
            match self.memory_cycle {
                cycle @ 1..=4 => Err(Alarm::LoadMdDuringCycle { cycle }),
                5 => {
                    self.memory_data = data;
                    self.write_to_bus(self.memory_address, data, memory, io);
                    self.double_word_store = true;
                    self.double_word_mixed = true;
                    Ok(())
                }
                6 => {
                    self.memory_data = data;
                    self.write_to_bus(self.memory_address | 1, data, memory, io);
                    Ok(())
                }
                _ => Ok(()),
            }
        } else {
            match self.memory_cycle {
                cycle @ (1 | 2 | 5) => Err(Alarm::LoadMdDuringCycle { cycle }),
                3 => {
                    self.memory_data = data;
                    self.write_to_bus(self.memory_address, data, memory, io);
                    self.double_word_store = true;
                    self.double_word_mixed = true;
                    Ok(())
                }
                4 => {
                    self.memory_data = data;
                    let address = if self.double_word_store {
                        self.memory_address ^ 1
                    } else {
                        self.memory_address
                    };
                    self.write_to_bus(address, data, memory, io);
                    Ok(())
                }
                _ => Ok(()),
            }
        }
    }

    fn read_from_bus(&self, address: Word, memory: &MainMemory, io: &mut Peripherals) -> Word {
        if address <= MEM_TOP || memory.has_bank_registers() && is_bank_register(address) {
            memory.read(address, self.task, self.extended_memory_reference)
        } else {
            // Unpopulated I/O page addresses read as zero.
            io.read(address, self.task, self.extended_memory_reference)
                .unwrap_or(0)
        }
    }

    fn write_to_bus(&self, address: Word, data: Word, memory: &mut MainMemory, io: &mut Peripherals) {
        if address <= MEM_TOP || memory.has_bank_registers() && is_bank_register(address) {
            memory.load(address, data, self.task, self.extended_memory_reference);
        } else {
            // Attempts to write unpopulated addresses are dropped.
            io.load(address, data, self.task, self.extended_memory_reference);
        }
    }
}

fn is_bank_register(address: Word) -> bool {
    (super::memory::XM_BANK_START..super::memory::XM_BANK_START + 16).contains(&address)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(system_type: SystemType) -> (MemoryBus, MainMemory, Peripherals) {
        (
            MemoryBus::new(system_type),
            MainMemory::new(system_type),
            Peripherals::new(),
        )
    }

    fn run_cycles(bus: &mut MemoryBus, memory: &mut MainMemory, io: &mut Peripherals, n: u32) {
        for _ in 0..n {
            bus.clock(memory, io);
        }
    }

    #[test]
    fn idle_bus_is_ready_for_everything() {
        let (bus, _, _) = machine(SystemType::AltoIIXm2k);
        assert!(bus.ready(MemoryOperation::LoadAddress));
        assert!(bus.ready(MemoryOperation::Read));
        assert!(bus.ready(MemoryOperation::Store));
    }

    #[test]
    fn store_ready_thresholds_differ_by_generation() {
        for (system_type, threshold) in [(SystemType::AltoI, 4), (SystemType::AltoIIXm2k, 2)] {
            let (mut bus, mut mem, mut io) = machine(system_type);
            bus.load_mar(0x100, TaskKind::Emulator, false).unwrap();
            // load_mar leaves the bus in cycle 1
            while bus.cycle() <= threshold {
                assert!(!bus.ready(MemoryOperation::Store), "{system_type} cycle {}", bus.cycle());
                bus.clock(&mut mem, &mut io);
            }
            assert!(bus.ready(MemoryOperation::Store), "{system_type}");
        }
    }

    #[test]
    fn read_ready_after_cycle_four() {
        let (mut bus, mut mem, mut io) = machine(SystemType::AltoIIXm2k);
        bus.load_mar(0x100, TaskKind::Emulator, false).unwrap();
        while bus.cycle() <= 4 {
            assert!(!bus.ready(MemoryOperation::Read));
            bus.clock(&mut mem, &mut io);
        }
        assert!(bus.ready(MemoryOperation::Read));
    }

    #[test]
    fn load_mar_during_active_operation_alarms() {
        let (mut bus, _, _) = machine(SystemType::AltoIIXm2k);
        bus.load_mar(0x100, TaskKind::Emulator, false).unwrap();
        assert_eq!(
            bus.load_mar(0x200, TaskKind::DiskWord, false),
            Err(Alarm::MemoryOperationAlreadyActive {
                task: TaskKind::DiskWord,
                address: 0x200
            })
        );
    }

    #[test]
    fn single_word_read() {
        let (mut bus, mut mem, mut io) = machine(SystemType::AltoIIXm2k);
        mem.load(0x100, 0xbeef, TaskKind::Emulator, false);
        bus.load_mar(0x100, TaskKind::Emulator, false).unwrap();
        run_cycles(&mut bus, &mut mem, &mut io, 4);
        assert_eq!(bus.read_md(), Ok(0xbeef));
    }

    #[test]
    fn double_word_read_pairs_addresses() {
        let (mut bus, mut mem, mut io) = machine(SystemType::AltoIIXm2k);
        mem.load(0x101, 0x1111, TaskKind::Emulator, false);
        mem.load(0x100, 0x2222, TaskKind::Emulator, false);
        bus.load_mar(0x101, TaskKind::Emulator, false).unwrap();
        run_cycles(&mut bus, &mut mem, &mut io, 4);
        assert_eq!(bus.read_md(), Ok(0x1111));
        run_cycles(&mut bus, &mut mem, &mut io, 1);
        // Cycle 6: the second word, from address 0x101 ^ 1.
        assert_eq!(bus.read_md(), Ok(0x2222));
    }

    #[test]
    fn alto_ii_latches_md_after_the_operation_ends() {
        let (mut bus, mut mem, mut io) = machine(SystemType::AltoIIXm2k);
        mem.load(0x100, 0xcafe, TaskKind::Emulator, false);
        bus.load_mar(0x100, TaskKind::Emulator, false).unwrap();
        run_cycles(&mut bus, &mut mem, &mut io, 6);
        assert!(!bus.operation_active());
        assert_eq!(bus.read_md(), Ok(0xcafe));
    }

    #[test]
    fn store_writes_through_to_memory() {
        let (mut bus, mut mem, mut io) = machine(SystemType::AltoIIXm2k);
        bus.load_mar(0x180, TaskKind::Emulator, false).unwrap();
        run_cycles(&mut bus, &mut mem, &mut io, 2);
        bus.load_md(0x5555, &mut mem, &mut io).unwrap();
        assert_eq!(mem.read(0x180, TaskKind::Emulator, false), 0x5555);
        // A second write in the next cycle goes to the paired address.
        run_cycles(&mut bus, &mut mem, &mut io, 1);
        bus.load_md(0x6666, &mut mem, &mut io).unwrap();
        assert_eq!(mem.read(0x181, TaskKind::Emulator, false), 0x6666);
    }

    #[test]
    fn read_md_too_early_alarms() {
        let (mut bus, mut mem, mut io) = machine(SystemType::AltoIIXm2k);
        bus.load_mar(0x100, TaskKind::Emulator, false).unwrap();
        run_cycles(&mut bus, &mut mem, &mut io, 2);
        assert_eq!(bus.read_md(), Err(Alarm::ReadMdDuringCycle { cycle: 3 }));
    }

    #[test]
    fn unpopulated_io_addresses_read_zero() {
        let (bus, mem, mut io) = machine(SystemType::AltoIIXm2k);
        assert_eq!(bus.read_from_bus(0xfe00, &mem, &mut io), 0);
    }
}
