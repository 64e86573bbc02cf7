//! Memory mapped peripherals and the device-side controller state the
//! task specializations drive.
//!
//! The address dispatch mirrors the hardware: everything from 0xfe00
//! up that a device claims goes to that device, unclaimed addresses
//! read as zero and swallow writes.  Devices that influence task
//! wakeups never touch the CPU directly; their methods return
//! [`EventAction`](crate::scheduler::EventAction) values and the task
//! layer applies them, so wakeup policy stays in one place.
use base::prelude::*;

use super::scheduler::EventAction;

/// Mouse coordinate registers, 0xfe18 through 0xfe1b.
pub const MOUSE_ADDRESS_FIRST: Word = 0xfe18;
pub const MOUSE_ADDRESS_LAST: Word = 0xfe1b;

/// Keyboard matrix words, 0xfe1c through 0xfe1f.
pub const KEYBOARD_ADDRESS_FIRST: Word = 0xfe1c;
pub const KEYBOARD_ADDRESS_LAST: Word = 0xfe1f;

/// The quadrature mouse.  The host sets a target position and the
/// hardware interface walks the current position toward it one count
/// per poll, reporting the direction moved as the nibble the MOUSE
/// microcode expects.
#[derive(Debug, Default)]
pub struct Mouse {
    current_x: i32,
    current_y: i32,
    target_x: i32,
    target_y: i32,
}

impl Mouse {
    pub fn reset(&mut self) {
        self.current_x = 0;
        self.current_y = 0;
        self.target_x = 0;
        self.target_y = 0;
    }

    /// Host-side input: where the pointer should end up.
    pub fn mouse_move(&mut self, x: i32, y: i32) {
        self.target_x = x;
        self.target_y = y;
    }

    /// Step one count toward the target and report the direction
    /// moved.  0 means no motion; 1 up, 2 down, 3 left, 6 right, and
    /// 4, 5, 7, 8 the four diagonals.
    pub fn poll_mouse_bits(&mut self) -> Word {
        let dx = (self.target_x - self.current_x).signum();
        let dy = (self.target_y - self.current_y).signum();
        self.current_x += dx;
        self.current_y += dy;
        match (dx, dy) {
            (0, -1) => 1,
            (0, 1) => 2,
            (-1, 0) => 3,
            (-1, -1) => 4,
            (-1, 1) => 5,
            (1, 0) => 6,
            (1, -1) => 7,
            (1, 1) => 8,
            _ => 0,
        }
    }
}

/// The keyboard matrix: four words of key-down bits, read back
/// active-low through the mapped addresses.
#[derive(Debug, Default)]
pub struct Keyboard {
    keys: [Word; 4],
}

impl Keyboard {
    pub fn reset(&mut self) {
        self.keys = [0; 4];
    }

    pub fn key_down(&mut self, bank: usize, mask: Word) {
        if bank < self.keys.len() {
            self.keys[bank] |= mask;
        }
    }

    pub fn key_up(&mut self, bank: usize, mask: Word) {
        if bank < self.keys.len() {
            self.keys[bank] &= !mask;
        }
    }

    fn read(&self, address: Word) -> Word {
        let index = usize::from(address - KEYBOARD_ADDRESS_FIRST);
        !self.keys[index]
    }
}

// KSTAT condition bits.
pub const KSTAT_SECLATE: Word = 0x10;
pub const KSTAT_NOTREADY: Word = 0x20;
pub const KSTAT_STROBE: Word = 0x40;
pub const KSTAT_SEEKFAIL: Word = 0x80;

/// Record-number encoding presented by the RECNO branch, indexed by
/// the raw record counter.
const REC_MAP: [Word; 4] = [0, 2, 3, 1];

/// The Diablo disk controller registers, with no pack mounted behind
/// them.  The sector and word tasks can exercise the full KSTAT,
/// KCOM, KADR and KDATA protocol; any attempt to address the platter
/// reports a seek failure and the drive never comes ready.
#[derive(Debug, Default)]
pub struct DiskController {
    k_stat: Word,
    k_data_read: Word,
    k_data_write: Word,
    k_data_write_latch: bool,
    k_adr: Word,
    k_com: Word,
    xfer_off: bool,
    wd_inhib: bool,
    b_clk_source: bool,
    wffo: bool,
    send_adr: bool,
    data_xfer: bool,
    disk: Word,
    rec_no: usize,
    seeking: bool,
    pub seclate_enable: bool,
    pub wd_init: bool,
    disk_bit_counter_enable: bool,
}

impl DiskController {
    pub fn reset(&mut self) {
        *self = DiskController {
            wd_inhib: true,
            xfer_off: true,
            ..DiskController::default()
        };
    }

    /// KSTAT as seen from the bus: the unimplemented sector bits of
    /// the middle field always read as ones.
    #[must_use]
    pub fn kstat(&self) -> Word {
        self.k_stat | 0x0f00
    }

    #[must_use]
    pub fn kdata(&self) -> Word {
        self.k_data_read
    }

    pub fn set_kstat(&mut self, bus_data: Word) {
        // Bits 12-14 load from the bus with bit 13 inverted, the rest
        // keep their hardware-maintained values.
        self.k_stat = (self.kstat() & 0xfff4) | ((bus_data & 0xb) | (!bus_data & 0x4));
    }

    pub fn set_kdata(&mut self, value: Word) {
        self.k_data_write = value;
        self.k_data_write_latch = true;
    }

    pub fn set_kadr(&mut self, value: Word) {
        self.k_adr = value;
        self.rec_no = 0;
        self.data_xfer = (self.k_adr & 0x2) != 0x2;
        self.disk = (self.k_data_write & 0x2) >> 1;
        if (self.k_data_write & 0x1) != 0 {
            self.init_seek(0);
        }
    }

    pub fn set_kcom(&mut self, value: Word) {
        self.k_com = value;
        self.xfer_off = (self.k_com & 0x10) != 0;
        self.wd_inhib = (self.k_com & 0x08) != 0;
        self.b_clk_source = (self.k_com & 0x04) != 0;
        self.wffo = (self.k_com & 0x02) != 0;
        self.send_adr = (self.k_com & 0x01) != 0;

        self.disk_bit_counter_enable = self.wffo;

        if self.wd_inhib {
            self.wd_init = true;
        }

        if self.send_adr && (self.k_data_write & 0x2) != 0 {
            self.seeking = false;
        }
    }

    pub fn clear_status(&mut self) {
        self.k_stat &= 0xff4b;
    }

    pub fn increment_record(&mut self) {
        // Shifts KADR so the next record's action field is presented.
        self.k_adr = mask16(u32::from(self.k_adr) << 2);
        self.rec_no += 1;
        if self.rec_no > 3 {
            self.rec_no = 0;
        }
    }

    #[must_use]
    pub fn recno(&self) -> Word {
        REC_MAP[self.rec_no]
    }

    #[must_use]
    pub fn rwc(&self) -> Word {
        (self.k_adr & 0xc0) >> 6
    }

    #[must_use]
    pub fn data_xfer(&self) -> bool {
        self.data_xfer
    }

    pub fn strobe(&mut self) {
        // Only meaningful with SENDADR set, but microcode that issues
        // it anyway just gets the seek outcome.
        self.init_seek((self.k_data_write & 0x0ff8) >> 3);
    }

    fn init_seek(&mut self, _dest_cylinder: Word) {
        // No pack is mounted, so every seek fails immediately.
        self.k_stat |= KSTAT_SEEKFAIL;
        self.seeking = false;
    }

    #[must_use]
    pub fn ready(&self) -> bool {
        false
    }

    #[must_use]
    pub fn fatal_error(&self) -> bool {
        (self.k_stat & (KSTAT_SECLATE | KSTAT_SEEKFAIL | KSTAT_NOTREADY)) != 0 || !self.ready()
    }
}

/// Host address wired onto the Ethernet interface backplane.
pub const ETHERNET_ADDRESS: Word = 0o43;

/// The Ethernet interface registers, with no network behind them.
/// Status condition bits are active low; the FIFO and the ICMD/OCMD
/// flip-flops behave as the microcode protocol requires.
#[derive(Debug)]
pub struct EthernetController {
    pub status: Word,
    pub countdown_wakeup: bool,
    data_late: bool,
    collision: bool,
    crc_bad: bool,
    incomplete: bool,
    io_cmd: Word,
    o_busy: bool,
    i_busy: bool,
    fifo: Vec<Word>,
}

impl Default for EthernetController {
    fn default() -> EthernetController {
        EthernetController {
            status: 0xffff,
            countdown_wakeup: false,
            data_late: false,
            collision: false,
            crc_bad: false,
            incomplete: false,
            io_cmd: 0,
            o_busy: false,
            i_busy: false,
            fifo: Vec::new(),
        }
    }
}

impl EthernetController {
    pub fn reset(&mut self) {
        let _ = self.reset_interface();
    }

    /// STARTF from the emulator: latch the I/O command bits and wake
    /// the Ethernet task.
    pub fn startf(&mut self, bus_data: Word) -> EventAction {
        self.io_cmd = bus_data & 0x3;
        EventAction::WakeTask(TaskKind::Ethernet)
    }

    #[must_use]
    pub fn operation_done(&self) -> bool {
        !self.o_busy && !self.i_busy
    }

    #[must_use]
    pub fn io_cmd(&self) -> Word {
        self.io_cmd
    }

    #[must_use]
    pub fn data_late(&self) -> bool {
        self.data_late
    }

    #[must_use]
    pub fn collision(&self) -> bool {
        self.collision
    }

    /// EPFCT tail: recompute the status word (condition bits are
    /// active low, so a clear condition sets its bit), clear the
    /// command and busy state, and drop the FIFO.
    pub fn reset_interface(&mut self) -> EventAction {
        self.status = 0xffc0;
        if !self.data_late {
            self.status |= 0x20;
        }
        if !self.collision {
            self.status |= 0x10;
        }
        if !self.crc_bad {
            self.status |= 0x08;
        }
        if !self.incomplete {
            self.status |= 0x01;
        }
        // The ICMD/OCMD bits clear along with the rest.
        self.status |= 0x06;

        self.io_cmd = 0;
        self.o_busy = false;
        self.i_busy = false;
        self.data_late = false;
        self.crc_bad = false;
        self.incomplete = false;
        self.fifo.clear();

        EventAction::BlockTask(TaskKind::Ethernet)
    }

    /// EIDFCT: pop the input FIFO.  With nothing on the wire the FIFO
    /// runs dry immediately and the task blocks.
    pub fn read_input_fifo(&mut self) -> (Word, Option<EventAction>) {
        if self.fifo.is_empty() {
            return (0, None);
        }
        self.fifo.remove(0);
        if self.fifo.len() < 2 {
            (0, None)
        } else {
            (0, Some(EventAction::BlockTask(TaskKind::Ethernet)))
        }
    }

    /// EILFCT: look at the head of the input FIFO without consuming.
    #[must_use]
    pub fn peek_input_fifo(&self) -> Word {
        self.fifo.first().copied().unwrap_or(0)
    }

    pub fn write_output_fifo(&mut self, bus_data: Word) {
        self.fifo.push(bus_data);
    }

    pub fn start_output(&mut self) -> EventAction {
        self.o_busy = true;
        EventAction::WakeTask(TaskKind::Ethernet)
    }

    pub fn start_input(&mut self) {
        // Hunting for a packet with no network attached never finds
        // one.
    }

    pub fn end_transmission(&mut self) -> EventAction {
        self.fifo.clear();
        EventAction::BlockTask(TaskKind::Ethernet)
    }

    #[must_use]
    pub fn fifo_empty(&self) -> bool {
        self.fifo.is_empty()
    }
}

/// Display words buffered ahead of the video shifter before the word
/// task must block.
const DISPLAY_FIFO_LIMIT: usize = 15;

/// The display controller's task-visible state: field parity, the
/// mode and cursor latches, the data FIFO, and the self-block flags
/// the word and horizontal tasks maintain.
#[derive(Debug)]
pub struct DisplayController {
    pub even_field: bool,
    low_res: bool,
    low_res_latch: bool,
    white_on_black: bool,
    white_on_black_latch: bool,
    sw_mode_latch: bool,
    cursor_reg: Word,
    cursor_reg_latch: bool,
    cursor_x: Word,
    cursor_x_latch: bool,
    dwt_blocked: bool,
    dht_blocked: bool,
    data_buffer: Vec<Word>,
}

impl Default for DisplayController {
    fn default() -> DisplayController {
        DisplayController {
            even_field: false,
            low_res: false,
            low_res_latch: false,
            white_on_black: false,
            white_on_black_latch: false,
            sw_mode_latch: false,
            cursor_reg: 0,
            cursor_reg_latch: false,
            cursor_x: 0,
            cursor_x_latch: false,
            dwt_blocked: true,
            dht_blocked: false,
            data_buffer: Vec::new(),
        }
    }
}

impl DisplayController {
    pub fn reset(&mut self) -> EventAction {
        *self = DisplayController::default();
        self.word_wakeup()
    }

    #[must_use]
    pub fn dht_blocked(&self) -> bool {
        self.dht_blocked
    }

    pub fn set_dwt_block(&mut self, blocked: bool) -> EventAction {
        self.dwt_blocked = blocked;
        self.word_wakeup()
    }

    pub fn set_dht_block(&mut self, blocked: bool) -> EventAction {
        self.dht_blocked = blocked;
        self.word_wakeup()
    }

    /// The word task runs only while the FIFO has room and neither it
    /// nor the horizontal task has blocked itself for the field.
    fn word_wakeup(&self) -> EventAction {
        if self.fifo_full() || self.dht_blocked || self.dwt_blocked {
            EventAction::BlockTask(TaskKind::DisplayWord)
        } else {
            EventAction::WakeTask(TaskKind::DisplayWord)
        }
    }

    fn fifo_full(&self) -> bool {
        self.data_buffer.len() >= DISPLAY_FIFO_LIMIT
    }

    pub fn load_ddr(&mut self, word: Word) -> EventAction {
        self.data_buffer.push(word);
        if self.data_buffer.len() > DISPLAY_FIFO_LIMIT + 1 {
            self.data_buffer.remove(0);
        }
        self.word_wakeup()
    }

    /// Cursor X loads only while unlatched; the register takes the
    /// complement of the bus word.
    pub fn load_xpreg(&mut self, word: Word) {
        if !self.cursor_x_latch {
            self.cursor_x_latch = true;
            self.cursor_x = !word;
        }
    }

    pub fn load_csr(&mut self, word: Word) {
        if !self.cursor_reg_latch {
            self.cursor_reg_latch = true;
            self.cursor_reg = word;
        }
    }

    /// SETMODE latches resolution and polarity for the next scanline.
    pub fn set_mode(&mut self, word: Word) {
        self.low_res_latch = (word & 0x8000) != 0;
        self.white_on_black_latch = (word & 0x4000) != 0;
        self.sw_mode_latch = true;
    }
}

/// Every device on the machine, dispatched by memory-mapped address
/// for bus access and reached directly by the task specializations.
#[derive(Debug, Default)]
pub struct Peripherals {
    pub mouse: Mouse,
    pub keyboard: Keyboard,
    pub disk: DiskController,
    pub ethernet: EthernetController,
    pub display: DisplayController,
}

impl Peripherals {
    #[must_use]
    pub fn new() -> Peripherals {
        Peripherals::default()
    }

    pub fn reset(&mut self) {
        self.mouse.reset();
        self.keyboard.reset();
        self.disk.reset();
        self.ethernet.reset();
        let _ = self.display.reset();
    }

    /// Bus read from I/O space.  `None` means no device claims the
    /// address.
    pub fn read(
        &mut self,
        address: Word,
        _task: TaskKind,
        _extended_memory_reference: bool,
    ) -> Option<Word> {
        match address {
            MOUSE_ADDRESS_FIRST..=MOUSE_ADDRESS_LAST => Some(0xffff),
            KEYBOARD_ADDRESS_FIRST..=KEYBOARD_ADDRESS_LAST => Some(self.keyboard.read(address)),
            _ => None,
        }
    }

    /// Bus write into I/O space.  The mapped mouse and keyboard
    /// registers are read-only, and unclaimed addresses swallow
    /// stores, so every write lands here and is dropped.
    pub fn load(
        &mut self,
        _address: Word,
        _data: Word,
        _task: TaskKind,
        _extended_memory_reference: bool,
    ) {
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keyboard_reads_active_low() {
        let mut io = Peripherals::new();
        assert_eq!(
            io.read(KEYBOARD_ADDRESS_FIRST, TaskKind::Emulator, false),
            Some(0xffff)
        );
        io.keyboard.key_down(0, 0x4000);
        assert_eq!(
            io.read(KEYBOARD_ADDRESS_FIRST, TaskKind::Emulator, false),
            Some(0xbfff)
        );
        io.keyboard.key_up(0, 0x4000);
        assert_eq!(
            io.read(KEYBOARD_ADDRESS_FIRST, TaskKind::Emulator, false),
            Some(0xffff)
        );
    }

    #[test]
    fn mouse_registers_read_all_ones() {
        let mut io = Peripherals::new();
        assert_eq!(
            io.read(MOUSE_ADDRESS_FIRST, TaskKind::Emulator, false),
            Some(0xffff)
        );
    }

    #[test]
    fn unmapped_io_address_is_unclaimed() {
        let mut io = Peripherals::new();
        assert_eq!(io.read(0xfe00, TaskKind::Emulator, false), None);
    }

    #[test]
    fn mouse_walks_toward_target() {
        let mut mouse = Mouse::default();
        mouse.mouse_move(2, -1);
        assert_eq!(mouse.poll_mouse_bits(), 7); // up and right
        assert_eq!(mouse.poll_mouse_bits(), 6); // right only
        assert_eq!(mouse.poll_mouse_bits(), 0); // arrived
    }

    #[test]
    fn disk_status_reads_with_sector_field_ones() {
        let mut disk = DiskController::default();
        disk.reset();
        assert_eq!(disk.kstat() & 0x0f00, 0x0f00);
    }

    #[test]
    fn disk_seek_with_no_pack_fails() {
        let mut disk = DiskController::default();
        disk.reset();
        disk.set_kcom(0x01); // SENDADR
        disk.strobe();
        assert_ne!(disk.kstat() & KSTAT_SEEKFAIL, 0);
        assert!(disk.fatal_error());
    }

    #[test]
    fn disk_record_counter_follows_the_record_map() {
        let mut disk = DiskController::default();
        disk.reset();
        assert_eq!(disk.recno(), 0);
        disk.increment_record();
        assert_eq!(disk.recno(), 2);
        disk.increment_record();
        assert_eq!(disk.recno(), 3);
        disk.increment_record();
        assert_eq!(disk.recno(), 1);
    }

    #[test]
    fn ethernet_reset_sets_clear_conditions_active_low() {
        let mut net = EthernetController::default();
        let action = net.reset_interface();
        assert_eq!(action, EventAction::BlockTask(TaskKind::Ethernet));
        assert_eq!(net.status, 0xffff);
        assert_eq!(net.io_cmd(), 0);
        assert!(net.operation_done());
    }

    #[test]
    fn display_word_task_blocks_until_unblocked() {
        let mut display = DisplayController::default();
        assert_eq!(
            display.load_ddr(0x1234),
            EventAction::BlockTask(TaskKind::DisplayWord)
        );
        assert_eq!(
            display.set_dwt_block(false),
            EventAction::WakeTask(TaskKind::DisplayWord)
        );
    }

    #[test]
    fn cursor_registers_latch_once_per_scanline() {
        let mut display = DisplayController::default();
        display.load_xpreg(0x00ff);
        display.load_xpreg(0x1234);
        assert_eq!(display.cursor_x, 0xff00);
        display.load_csr(0xaaaa);
        display.load_csr(0x5555);
        assert_eq!(display.cursor_reg, 0xaaaa);
    }
}
