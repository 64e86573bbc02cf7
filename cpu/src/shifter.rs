//! The barrel shifter sitting between L and the R register file.
//!
//! Three mutually exclusive modes: plain shifts and rotates, "magic"
//! shifts that cross-feed the displaced bit position from T, and Nova
//! shifts (DNS) that rotate a 17th bit through an external carry
//! flip-flop on behalf of the emulator task.
use base::prelude::*;

use super::alarm::Alarm;

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ShifterOp {
    #[default]
    None,
    ShiftLeft,
    ShiftRight,
    RotateLeft,
    RotateRight,
}

#[derive(Debug, Default)]
pub struct Shifter {
    op: ShifterOp,
    count: u8,
    output: Word,
    magic: bool,
    dns: bool,
    /// The Nova carry flip-flop value being rotated through; 0 or 1.
    dns_carry: Word,
}

impl Shifter {
    #[must_use]
    pub fn new() -> Shifter {
        Shifter::default()
    }

    pub fn reset(&mut self) {
        *self = Shifter::default();
    }

    pub fn set_operation(&mut self, op: ShifterOp, count: u8) {
        self.op = op;
        self.count = count;
    }

    pub fn set_magic(&mut self, magic: bool) {
        self.magic = magic;
    }

    pub fn set_dns(&mut self, dns: bool, carry: Word) {
        self.dns = dns;
        self.dns_carry = carry;
    }

    #[must_use]
    pub fn op(&self) -> ShifterOp {
        self.op
    }

    /// The result of the last operation.
    #[must_use]
    pub fn output(&self) -> Word {
        self.output
    }

    /// Set the output directly, used when the operation is NONE and
    /// the shifter body is bypassed entirely.
    pub fn set_output(&mut self, output: Word) {
        self.output = output;
    }

    #[must_use]
    pub fn dns_carry(&self) -> Word {
        self.dns_carry
    }

    pub fn operate(&mut self, input: Word, t: Word) -> Result<Word, Alarm> {
        match self.op {
            ShifterOp::None => {
                self.output = input;
            }
            ShifterOp::ShiftLeft => {
                self.output = mask16(u32::from(input) << self.count);
                if self.magic {
                    if self.count != 1 {
                        return Err(Alarm::BadMagicShiftCount { count: self.count });
                    }
                    // The high bit of T enters at the low end.
                    self.output |= (t & 0x8000) >> 15;
                } else if self.dns {
                    // 17-bit rotate: carry enters at bit 0, bit 15
                    // leaves into the carry.
                    self.output |= self.dns_carry;
                    self.dns_carry = (input & 0x8000) >> 15;
                }
            }
            ShifterOp::ShiftRight => {
                self.output = mask16(u32::from(input) >> self.count);
                if self.magic {
                    if self.count != 1 {
                        return Err(Alarm::BadMagicShiftCount { count: self.count });
                    }
                    // The low bit of T enters at the high end.
                    self.output |= (t & 1) << 15;
                } else if self.dns {
                    self.output |= self.dns_carry << 15;
                    self.dns_carry = input & 1;
                }
            }
            ShifterOp::RotateLeft => {
                if self.dns {
                    // DNS on a left rotate means byte swap; the carry
                    // is not involved.
                    self.output = input.rotate_left(8);
                } else {
                    self.output = input.rotate_left(u32::from(self.count) % 16);
                }
            }
            ShifterOp::RotateRight => {
                if self.dns {
                    return Err(Alarm::DnsOnRotateRight);
                }
                self.output = input.rotate_right(u32::from(self.count) % 16);
            }
        }
        Ok(self.output)
    }
}

#[cfg(test)]
mod tests {
    use test_strategy::proptest;

    use super::*;

    fn shifter_for(op: ShifterOp, count: u8) -> Shifter {
        let mut shifter = Shifter::new();
        shifter.set_operation(op, count);
        shifter
    }

    #[test]
    fn plain_shifts() {
        let mut shifter = shifter_for(ShifterOp::ShiftLeft, 1);
        assert_eq!(shifter.operate(1, 0), Ok(2));
        assert_eq!(shifter.operate(0x8000, 0), Ok(0));

        let mut shifter = shifter_for(ShifterOp::ShiftRight, 1);
        assert_eq!(shifter.operate(2, 0), Ok(1));
        assert_eq!(shifter.operate(0xffff, 0), Ok(0x7fff));
    }

    #[test]
    fn rotates() {
        let mut shifter = shifter_for(ShifterOp::RotateLeft, 1);
        assert_eq!(shifter.operate(0x8000, 0), Ok(1));
        shifter.set_operation(ShifterOp::RotateLeft, 16);
        assert_eq!(shifter.operate(1, 0), Ok(1));

        let mut shifter = shifter_for(ShifterOp::RotateRight, 15);
        assert_eq!(shifter.operate(0x8000, 0), Ok(1));
        shifter.set_operation(ShifterOp::RotateRight, 16);
        assert_eq!(shifter.operate(1, 0), Ok(1));
    }

    #[test]
    fn magic_feeds_the_displaced_bit_from_t() {
        let mut shifter = shifter_for(ShifterOp::ShiftLeft, 1);
        shifter.set_magic(true);
        assert_eq!(shifter.operate(2, 0x8000), Ok(5));

        let mut shifter = shifter_for(ShifterOp::ShiftRight, 1);
        shifter.set_magic(true);
        assert_eq!(shifter.operate(2, 1), Ok(0x8001));
    }

    #[test]
    fn magic_requires_count_one() {
        let mut shifter = shifter_for(ShifterOp::ShiftLeft, 8);
        shifter.set_magic(true);
        assert_eq!(
            shifter.operate(1, 0),
            Err(Alarm::BadMagicShiftCount { count: 8 })
        );
    }

    #[test]
    fn dns_rotates_through_the_carry() {
        let mut shifter = shifter_for(ShifterOp::ShiftLeft, 1);
        shifter.set_dns(true, 1);
        assert_eq!(shifter.operate(0x8000, 0), Ok(1));
        assert_eq!(shifter.dns_carry(), 1);
        shifter.set_dns(true, 0);
        assert_eq!(shifter.operate(0x4000, 0), Ok(0x8000));
        assert_eq!(shifter.dns_carry(), 0);

        let mut shifter = shifter_for(ShifterOp::ShiftRight, 1);
        shifter.set_dns(true, 1);
        assert_eq!(shifter.operate(1, 0), Ok(0x8000));
        assert_eq!(shifter.dns_carry(), 1);
    }

    #[test]
    fn dns_rotate_left_is_a_byte_swap() {
        let mut shifter = shifter_for(ShifterOp::RotateLeft, 1);
        shifter.set_dns(true, 1);
        assert_eq!(shifter.operate(0x12ab, 0), Ok(0xab12));
        assert_eq!(shifter.dns_carry(), 1);
    }

    #[test]
    fn dns_rotate_right_is_impossible() {
        let mut shifter = shifter_for(ShifterOp::RotateRight, 1);
        shifter.set_dns(true, 0);
        assert_eq!(shifter.operate(1, 0), Err(Alarm::DnsOnRotateRight));
    }

    #[proptest]
    fn rotate_round_trip(input: Word, #[strategy(0u8..=16)] count: u8) {
        let mut left = shifter_for(ShifterOp::RotateLeft, count);
        let rotated = left.operate(input, 0).unwrap();
        let mut right = shifter_for(ShifterOp::RotateRight, count);
        assert_eq!(right.operate(rotated, 0), Ok(input));
    }
}
