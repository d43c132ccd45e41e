//! Mulberry32: a 32-bit mix-xor-shift generator for reproducible rolls.
//!
//! Only ability damage against NPCs is rolled with this generator; every other
//! roll uses whatever generator the caller supplies.

use rand::RngCore;

use super::{DiceNotation, DiceRoll};

/// Mulberry32 state.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    /// Seed the generator.
    #[must_use]
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next float in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }

    /// Roll one die as `floor(next_f64 * sides) + 1`.
    pub fn roll_die(&mut self, sides: u32) -> i32 {
        if sides == 0 {
            return 0;
        }
        let face = (self.next_f64() * f64::from(sides)).floor() as u32 + 1;
        i32::try_from(face).unwrap_or(i32::MAX)
    }

    /// Roll a dice expression with this generator.
    pub fn roll_dice(&mut self, notation: &str) -> DiceRoll {
        let Some(parsed) = DiceNotation::parse(notation) else {
            return DiceRoll {
                total: 0,
                rolls: Vec::new(),
                modifier: 0,
                formula: notation.to_string(),
            };
        };
        let rolls: Vec<i32> = (0..parsed.count).map(|_| self.roll_die(parsed.sides)).collect();
        let total = rolls
            .iter()
            .fold(0i32, |acc, r| acc.saturating_add(*r))
            .saturating_add(parsed.modifier);
        DiceRoll {
            total,
            rolls,
            modifier: parsed.modifier,
            formula: notation.to_string(),
        }
    }
}

impl RngCore for Mulberry32 {
    fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut t = self.state;
        t = (t ^ (t >> 15)).wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        t ^ (t >> 14)
    }

    fn next_u64(&mut self) -> u64 {
        let hi = u64::from(self.next_u32());
        let lo = u64::from(self.next_u32());
        (hi << 32) | lo
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(4) {
            let bytes = self.next_u32().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_same_sequence() {
        let mut a = Mulberry32::new(42);
        let mut b = Mulberry32::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_u32(), b.next_u32());
        }
    }

    #[test]
    fn matches_reference_first_output() {
        // mulberry32(1) produces 2693262067 first (0.6270739405881613 as a float).
        let mut rng = Mulberry32::new(1);
        assert_eq!(rng.next_u32(), 2_693_262_067);
    }

    #[test]
    fn seeded_dice_stay_in_range() {
        let mut rng = Mulberry32::new(7);
        for _ in 0..200 {
            let roll = rng.roll_dice("2d6+1");
            assert!((3..=13).contains(&roll.total));
        }
        assert_eq!(rng.roll_dice("nonsense").total, 0);
    }

    #[test]
    fn fill_bytes_handles_partial_chunks() {
        let mut rng = Mulberry32::new(9);
        let mut buf = [0u8; 7];
        rng.fill_bytes(&mut buf);
        assert!(buf.iter().any(|b| *b != 0));
    }
}
