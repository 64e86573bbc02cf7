//! The 16-bit arithmetic-logic unit.
//!
//! Combinational apart from a one-bit carry latch.  The carry
//! convention is the hardware's: additions carry out on overflow, but
//! the subtraction family latches the *complement* of the borrow, so
//! a subtraction that does not underflow reports carry 1.
use base::prelude::*;

use super::alarm::Alarm;

#[derive(Debug, Default)]
pub struct Alu {
    /// Carry out of the last operation; always 0 or 1.
    pub carry: Word,
}

impl Alu {
    #[must_use]
    pub fn new() -> Alu {
        Alu { carry: 0 }
    }

    pub fn reset(&mut self) {
        self.carry = 0;
    }

    pub fn execute(&mut self, function: u8, bus: Word, t: Word, skip: Word) -> Result<Word, Alarm> {
        let result: u32 = match function {
            aluf::BUS => {
                self.carry = 0;
                u32::from(bus)
            }
            aluf::T => {
                self.carry = 0;
                u32::from(t)
            }
            aluf::BUS_OR_T => {
                self.carry = 0;
                u32::from(bus | t)
            }
            aluf::BUS_AND_T | aluf::ALU_BUS_AND_T => {
                self.carry = 0;
                u32::from(bus & t)
            }
            aluf::BUS_XOR_T => {
                self.carry = 0;
                u32::from(bus ^ t)
            }
            aluf::BUS_PLUS_1 => self.add(u32::from(bus) + 1),
            aluf::BUS_MINUS_1 => self.subtract(i32::from(bus) - 1),
            aluf::BUS_PLUS_T => self.add(u32::from(bus) + u32::from(t)),
            aluf::BUS_MINUS_T => self.subtract(i32::from(bus) - i32::from(t)),
            aluf::BUS_MINUS_T_MINUS_1 => self.subtract(i32::from(bus) - i32::from(t) - 1),
            aluf::BUS_PLUS_T_PLUS_1 => self.add(u32::from(bus) + u32::from(t) + 1),
            aluf::BUS_PLUS_SKIP => self.add(u32::from(bus) + u32::from(skip)),
            aluf::BUS_AND_NOT_T => {
                self.carry = 0;
                u32::from(bus & !t)
            }
            _ => {
                return Err(Alarm::UnimplementedAluFunction { aluf: function });
            }
        };
        Ok(mask16(result))
    }

    fn add(&mut self, raw: u32) -> u32 {
        self.carry = Word::from(raw > 0xffff);
        raw
    }

    fn subtract(&mut self, raw: i32) -> u32 {
        self.carry = Word::from(raw >= 0);
        raw as u32
    }
}

#[cfg(test)]
mod tests {
    use test_strategy::proptest;

    use super::*;

    fn run(function: u8, bus: Word, t: Word, skip: Word) -> (Word, Word) {
        let mut alu = Alu::new();
        // Start with the latch set so forced-zero cases are visible.
        alu.carry = 1;
        let result = alu
            .execute(function, bus, t, skip)
            .expect("assigned function codes must execute");
        (result, alu.carry)
    }

    #[test]
    fn logical_functions_force_carry_low() {
        assert_eq!(run(aluf::BUS, 0x1234, 0xffff, 0), (0x1234, 0));
        assert_eq!(run(aluf::T, 0x1234, 0x4321, 0), (0x4321, 0));
        assert_eq!(run(aluf::BUS_OR_T, 0xf0f0, 0x0f0f, 0), (0xffff, 0));
        assert_eq!(run(aluf::BUS_AND_T, 0xf0f0, 0xff00, 0), (0xf000, 0));
        assert_eq!(run(aluf::ALU_BUS_AND_T, 0xf0f0, 0xff00, 0), (0xf000, 0));
        assert_eq!(run(aluf::BUS_XOR_T, 0xff00, 0x0ff0, 0), (0xf0f0, 0));
        assert_eq!(run(aluf::BUS_AND_NOT_T, 0xffff, 0x00ff, 0), (0xff00, 0));
    }

    #[test]
    fn increment_wraps_with_carry() {
        assert_eq!(run(aluf::BUS_PLUS_1, 0xffff, 0, 0), (0x0000, 1));
        assert_eq!(run(aluf::BUS_PLUS_1, 0x0000, 0, 0), (0x0001, 0));
    }

    #[test]
    fn decrement_wraps_with_borrow_complement() {
        assert_eq!(run(aluf::BUS_MINUS_1, 0x0000, 0, 0), (0xffff, 0));
        assert_eq!(run(aluf::BUS_MINUS_1, 0x0001, 0, 0), (0x0000, 1));
    }

    #[test]
    fn sum_with_skip_value() {
        assert_eq!(run(aluf::BUS_PLUS_SKIP, 0x0010, 0, 1), (0x0011, 0));
        assert_eq!(run(aluf::BUS_PLUS_SKIP, 0xffff, 0, 1), (0x0000, 1));
    }

    #[test]
    fn unassigned_codes_alarm() {
        let mut alu = Alu::new();
        for function in [14, 15] {
            assert_eq!(
                alu.execute(function, 0, 0, 0),
                Err(Alarm::UnimplementedAluFunction { aluf: function })
            );
        }
    }

    #[proptest]
    fn addition_family_matches_wrapping_arithmetic(bus: Word, t: Word) {
        assert_eq!(
            run(aluf::BUS_PLUS_T, bus, t, 0),
            (
                bus.wrapping_add(t),
                Word::from(u32::from(bus) + u32::from(t) > 0xffff)
            )
        );
        assert_eq!(
            run(aluf::BUS_PLUS_T_PLUS_1, bus, t, 0),
            (
                bus.wrapping_add(t).wrapping_add(1),
                Word::from(u32::from(bus) + u32::from(t) + 1 > 0xffff)
            )
        );
    }

    #[proptest]
    fn subtraction_family_latches_inverted_borrow(bus: Word, t: Word) {
        assert_eq!(
            run(aluf::BUS_MINUS_T, bus, t, 0),
            (bus.wrapping_sub(t), Word::from(bus >= t))
        );
        assert_eq!(
            run(aluf::BUS_MINUS_T_MINUS_1, bus, t, 0),
            (
                bus.wrapping_sub(t).wrapping_sub(1),
                Word::from(i32::from(bus) - i32::from(t) - 1 >= 0)
            )
        );
    }

    #[proptest]
    fn bus_passthrough_is_carry_independent(bus: Word, t: Word) {
        assert_eq!(run(aluf::BUS, bus, t, 0), (bus, 0));
    }
}
