//! Main storage: sixteen 64K banks of RAM plus the per-task extended
//! memory bank registers mapped into the I/O page.
use base::prelude::*;

pub const MEM_SIZE: usize = 0x40000;
pub const BANK_SIZE: usize = 0x10000;

/// Main memory answers addresses below the I/O page.
pub const MEM_TOP: Word = 0xfdff;
/// The sixteen bank registers follow, one per task.
pub const XM_BANK_START: Word = 0xffe0;

/// An inclusive range of bus addresses claimed by a device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemoryRange {
    pub start: Word,
    pub end: Word,
}

impl MemoryRange {
    #[must_use]
    pub fn new(start: Word, end: Word) -> MemoryRange {
        assert!(end >= start);
        MemoryRange { start, end }
    }

    #[must_use]
    pub fn contains(&self, address: Word) -> bool {
        address >= self.start && address <= self.end
    }

    #[must_use]
    pub fn overlaps(&self, other: &MemoryRange) -> bool {
        (other.start >= self.start && other.start <= self.end)
            || (other.end >= self.start && other.end <= self.end)
    }
}

pub struct MainMemory {
    system_type: SystemType,
    mem: Vec<Word>,
    xm_banks: [Word; 16],
}

impl MainMemory {
    #[must_use]
    pub fn new(system_type: SystemType) -> MainMemory {
        MainMemory {
            system_type,
            mem: vec![0; MEM_SIZE],
            xm_banks: [0; 16],
        }
    }

    pub fn reset(&mut self) {
        self.mem.fill(0);
        self.xm_banks = [0; 16];
    }

    /// Whether this machine maps the bank registers at all; the
    /// Alto I has no extended memory option.
    #[must_use]
    pub fn has_bank_registers(&self) -> bool {
        !self.system_type.is_alto_i()
    }

    fn is_bank_register(&self, address: Word) -> bool {
        self.has_bank_registers() && address >= XM_BANK_START && address < XM_BANK_START + 16
    }

    pub fn read(&self, address: Word, task: TaskKind, extended_memory_reference: bool) -> Word {
        if self.is_bank_register(address) {
            // Unassigned register bits read back as ones.
            self.xm_banks[usize::from(address - XM_BANK_START)] | 0xfff0
        } else {
            let physical = usize::from(address)
                + BANK_SIZE * self.bank_number(task, extended_memory_reference);
            self.mem[physical]
        }
    }

    pub fn load(
        &mut self,
        address: Word,
        data: Word,
        task: TaskKind,
        extended_memory_reference: bool,
    ) {
        if self.is_bank_register(address) {
            self.xm_banks[usize::from(address - XM_BANK_START)] = data;
        } else {
            let physical = usize::from(address)
                + BANK_SIZE * self.bank_number(task, extended_memory_reference);
            self.mem[physical] = data;
        }
    }

    /// The physical bank a task's access lands in.  An extended
    /// memory reference uses the low pair of register bits, a normal
    /// reference the next pair.
    fn bank_number(&self, task: TaskKind, extended_memory_reference: bool) -> usize {
        let register = self.xm_banks[task.index()];
        usize::from(if extended_memory_reference {
            register & 0x3
        } else {
            (register & 0xc) >> 2
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_membership_and_overlap() {
        let range = MemoryRange::new(0xfe18, 0xfe1b);
        assert!(range.contains(0xfe18));
        assert!(range.contains(0xfe1b));
        assert!(!range.contains(0xfe1c));
        assert!(range.overlaps(&MemoryRange::new(0xfe1b, 0xfe1f)));
        assert!(!range.overlaps(&MemoryRange::new(0xfe1c, 0xfe1f)));
    }

    #[test]
    fn plain_read_write() {
        let mut mem = MainMemory::new(SystemType::AltoIIXm2k);
        mem.load(0x1234, 0xabcd, TaskKind::Emulator, false);
        assert_eq!(mem.read(0x1234, TaskKind::Emulator, false), 0xabcd);
        assert_eq!(mem.read(0x1235, TaskKind::Emulator, false), 0);
    }

    #[test]
    fn bank_registers_read_back_with_high_bits_set() {
        let mut mem = MainMemory::new(SystemType::AltoIIXm2k);
        mem.load(XM_BANK_START, 0x3, TaskKind::Emulator, false);
        assert_eq!(mem.read(XM_BANK_START, TaskKind::Emulator, false), 0xfff3);
    }

    #[test]
    fn alto_i_has_no_bank_registers() {
        let mut mem = MainMemory::new(SystemType::AltoI);
        // Falls through to ordinary storage rather than a register.
        mem.load(XM_BANK_START, 0x3, TaskKind::Emulator, false);
        assert_eq!(mem.read(XM_BANK_START, TaskKind::Emulator, false), 0x3);
    }

    #[test]
    fn extended_references_switch_banks() {
        let mut mem = MainMemory::new(SystemType::AltoIIXm2k);
        // Emulator bank register: normal accesses to bank 1,
        // extended references to bank 2.
        mem.load(XM_BANK_START, 0b0110, TaskKind::Emulator, false);
        mem.load(0x0100, 0x1111, TaskKind::Emulator, false);
        mem.load(0x0100, 0x2222, TaskKind::Emulator, true);
        assert_eq!(mem.read(0x0100, TaskKind::Emulator, false), 0x1111);
        assert_eq!(mem.read(0x0100, TaskKind::Emulator, true), 0x2222);
        // Another task with a zeroed register sees bank 0.
        assert_eq!(mem.read(0x0100, TaskKind::DiskWord, false), 0);
    }
}
