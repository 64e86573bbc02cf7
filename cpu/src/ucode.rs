//! The microcode store: ROM banks, the writable microcode RAM and the
//! per-task bank selection, plus the decode cache in front of them.
//!
//! Decoding a control word is pure, so each bank memoizes the decoded
//! form of each address and a RAM write invalidates just that entry.
use tracing::{Level, event};

use base::prelude::*;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MicrocodeBank {
    Rom0,
    Rom1,
    Ram0,
}

struct Bank {
    words: Box<[u32; 1024]>,
    cache: Box<[Option<Microinstruction>; 1024]>,
}

impl Bank {
    fn new(words: Box<[u32; 1024]>) -> Bank {
        Bank {
            words,
            cache: Box::new([None; 1024]),
        }
    }

    fn blank() -> Bank {
        Bank::new(Box::new([0; 1024]))
    }

    fn get(&mut self, address: u16, constants: &ConstantRom) -> Microinstruction {
        let slot = &mut self.cache[usize::from(address) & 0x3ff];
        *slot.get_or_insert_with(|| {
            Microinstruction::decode(self.words[usize::from(address) & 0x3ff], constants)
        })
    }

    fn put(&mut self, address: u16, raw: u32) {
        self.words[usize::from(address) & 0x3ff] = raw;
        self.cache[usize::from(address) & 0x3ff] = None;
    }
}

pub struct UCodeMemory {
    system_type: SystemType,
    constants: ConstantRom,
    acsource: AcSourceRom,
    rom0: Bank,
    rom1: Bank,
    ram0: Bank,
    microcode_bank: [MicrocodeBank; 16],

    // Control RAM addressing, loaded from the ALU output on every
    // Load-T rather than when RDRAM or WRTRAM fire.
    ram_addr: u16,
    ram_bank: usize,
    ram_select: bool,
    low_halfsel: bool,
}

impl UCodeMemory {
    #[must_use]
    pub fn new(
        system_type: SystemType,
        constants: ConstantRom,
        acsource: AcSourceRom,
        microcode: &MicrocodeRom,
    ) -> UCodeMemory {
        let mut rom0 = [0u32; 1024];
        rom0.copy_from_slice(microcode.bank0());
        let mut rom1 = [0u32; 1024];
        rom1.copy_from_slice(microcode.bank1());
        UCodeMemory {
            system_type,
            constants,
            acsource,
            rom0: Bank::new(Box::new(rom0)),
            rom1: Bank::new(Box::new(rom1)),
            ram0: Bank::blank(),
            microcode_bank: [MicrocodeBank::Rom0; 16],
            ram_addr: 0,
            ram_bank: 0,
            ram_select: true,
            low_halfsel: true,
        }
    }

    pub fn reset(&mut self) {
        self.microcode_bank = [MicrocodeBank::Rom0; 16];
        self.ram_addr = 0;
        self.ram_bank = 0;
        self.ram_select = true;
        self.low_halfsel = true;
    }

    #[must_use]
    pub fn constants(&self) -> &ConstantRom {
        &self.constants
    }

    /// AC source dispatch PROM lookup for the emulator task.
    #[must_use]
    pub fn acsource(&self, index: usize) -> u8 {
        self.acsource.get(index)
    }

    #[must_use]
    pub fn get_bank(&self, task: TaskKind) -> MicrocodeBank {
        self.microcode_bank[task.index()]
    }

    pub fn get_instruction(&mut self, mpc: u16, task: TaskKind) -> Microinstruction {
        let bank = match self.microcode_bank[task.index()] {
            MicrocodeBank::Rom0 => &mut self.rom0,
            MicrocodeBank::Rom1 => &mut self.rom1,
            MicrocodeBank::Ram0 => &mut self.ram0,
        };
        bank.get(mpc, &self.constants)
    }

    /// Select ROM bank 0 or RAM bank 0 for each task from the reset
    /// mode register: bit `i` set puts task `i` in ROM0.
    pub fn load_banks_from_rmr(&mut self, rmr: Word) {
        for (i, bank) in self.microcode_bank.iter_mut().enumerate() {
            *bank = if rmr & (1 << i) != 0 {
                MicrocodeBank::Rom0
            } else {
                MicrocodeBank::Ram0
            };
        }
    }

    /// Apply a bank switch for `task`.  Called one instruction after
    /// the SWMODE special function, with that later instruction's
    /// next-address field.
    pub fn switch_mode(&mut self, next: u16, task: TaskKind) {
        let current = self.microcode_bank[task.index()];
        let select = next & 0x100 != 0;
        let target = if self.system_type.has_2k_rom() || self.system_type.has_3k_ram() {
            match (current, select) {
                (MicrocodeBank::Rom0, true) => MicrocodeBank::Rom1,
                (MicrocodeBank::Rom0, false) => MicrocodeBank::Ram0,
                (MicrocodeBank::Rom1, true) => MicrocodeBank::Rom0,
                (MicrocodeBank::Rom1, false) => MicrocodeBank::Ram0,
                (MicrocodeBank::Ram0, true) => MicrocodeBank::Rom1,
                (MicrocodeBank::Ram0, false) => MicrocodeBank::Rom0,
            }
        } else {
            // One ROM bank: SWMODE just toggles ROM0 and RAM0.
            match current {
                MicrocodeBank::Ram0 => MicrocodeBank::Rom0,
                _ => MicrocodeBank::Ram0,
            }
        };
        event!(
            Level::TRACE,
            "{task} task switches microcode bank {current:?} -> {target:?}"
        );
        self.microcode_bank[task.index()] = target;
    }

    /// Latch the control RAM address register from the ALU output.
    pub fn load_control_ram_address(&mut self, alu: Word) {
        self.ram_addr = alu & 0x3ff;
        self.low_halfsel = alu & 0x800 == 0;
        self.ram_select = alu & 0x1000 == 0;
        self.ram_bank = 0;
    }

    /// The half of the addressed control RAM word selected by the
    /// address register.
    #[must_use]
    pub fn read_ram(&self) -> Word {
        let raw = self.ram0.words[usize::from(self.ram_addr)];
        if self.low_halfsel {
            mask16(raw)
        } else {
            mask16(raw >> 16)
        }
    }

    /// Store a control RAM word: `m` supplies the high half and `alu`
    /// the low half.
    pub fn write_ram(&mut self, alu: Word, m: Word) {
        let raw = (u32::from(m) << 16) | u32::from(alu);
        self.ram0.put(self.ram_addr, raw);
    }

    /// Host access for loading a microcode image directly into RAM.
    pub fn write_ram_word(&mut self, address: u16, raw: u32) {
        self.ram0.put(address, raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(system_type: SystemType) -> UCodeMemory {
        UCodeMemory::new(
            system_type,
            ConstantRom::default(),
            AcSourceRom::default(),
            &MicrocodeRom::default(),
        )
    }

    #[test]
    fn initial_state() {
        let ucode = store(SystemType::AltoIIXm2k);
        for task in TaskKind::ALL {
            assert_eq!(ucode.get_bank(task), MicrocodeBank::Rom0);
        }
        assert_eq!(ucode.ram_addr, 0);
        assert_eq!(ucode.ram_bank, 0);
        assert!(ucode.ram_select);
        assert!(ucode.low_halfsel);
    }

    #[test]
    fn banks_selected_from_reset_mode_register() {
        let mut ucode = store(SystemType::AltoIIXm2k);
        ucode.load_banks_from_rmr(0x5a5a);
        for i in 0..16 {
            let expected = if 0x5a5a & (1 << i) != 0 {
                MicrocodeBank::Rom0
            } else {
                MicrocodeBank::Ram0
            };
            assert_eq!(ucode.microcode_bank[i], expected, "task {i}");
        }
        assert_eq!(ucode.get_bank(TaskKind::Emulator), MicrocodeBank::Ram0);
        assert_eq!(ucode.get_bank(TaskKind::DiskSector), MicrocodeBank::Rom0);
    }

    #[test]
    fn switch_mode_from_rom0() {
        let mut ucode = store(SystemType::AltoIIXm2k);
        assert_eq!(ucode.get_bank(TaskKind::Emulator), MicrocodeBank::Rom0);
        ucode.switch_mode(0x31f, TaskKind::Emulator);
        assert_eq!(ucode.get_bank(TaskKind::Emulator), MicrocodeBank::Rom1);
        ucode.switch_mode(0x01f, TaskKind::Emulator);
        assert_eq!(ucode.get_bank(TaskKind::Emulator), MicrocodeBank::Ram0);
        ucode.switch_mode(0x000, TaskKind::Emulator);
        assert_eq!(ucode.get_bank(TaskKind::Emulator), MicrocodeBank::Rom0);
    }

    #[test]
    fn switch_mode_on_a_one_rom_machine_toggles() {
        let mut ucode = store(SystemType::AltoII);
        ucode.switch_mode(0x100, TaskKind::Emulator);
        assert_eq!(ucode.get_bank(TaskKind::Emulator), MicrocodeBank::Ram0);
        ucode.switch_mode(0x100, TaskKind::Emulator);
        assert_eq!(ucode.get_bank(TaskKind::Emulator), MicrocodeBank::Rom0);
    }

    #[test]
    fn ram_write_and_read_back() {
        let mut ucode = store(SystemType::AltoIIXm2k);
        ucode.write_ram(0xf234, 0xf678);
        assert!(ucode.low_halfsel);
        assert_eq!(ucode.read_ram(), 0xf234);
        ucode.low_halfsel = false;
        assert_eq!(ucode.read_ram(), 0xf678);
    }

    #[test]
    fn control_ram_address_register_fields() {
        let mut ucode = store(SystemType::AltoIIXm2k);
        ucode.load_control_ram_address(0x1b03);
        assert_eq!(ucode.ram_addr, 0x303);
        assert!(!ucode.low_halfsel);
        assert!(!ucode.ram_select);
        ucode.load_control_ram_address(0x0000);
        assert_eq!(ucode.ram_addr, 0);
        assert!(ucode.low_halfsel);
        assert!(ucode.ram_select);
    }

    #[test]
    fn ram_writes_invalidate_the_decode_cache() {
        let mut ucode = store(SystemType::AltoIIXm2k);
        ucode.load_banks_from_rmr(0);
        let before = ucode.get_instruction(5, TaskKind::Emulator);
        assert_eq!(before.aluf, aluf::BUS);
        ucode.write_ram_word(5, 0x0962_3903);
        let after = ucode.get_instruction(5, TaskKind::Emulator);
        assert_eq!(after.aluf, aluf::BUS_OR_T);
        assert_eq!(after.next, 0o403);
    }
}
