//! Character generation: initial ability scores.

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::roll_die;
use crate::types::Attributes;

/// The D&D 5e standard array.
pub const STANDARD_ARRAY: [i32; 6] = [15, 14, 13, 12, 10, 8];

/// How initial scores are produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatMethod {
    /// 4d6, drop the lowest die, per attribute.
    Random,
    /// The standard array in shuffled order.
    StandardArray,
    /// All tens; the player spends points afterwards.
    #[default]
    PointBuy,
}

impl StatMethod {
    /// Parse a method name; anything unrecognized is point-buy.
    #[must_use]
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "random" => Self::Random,
            "standard_array" => Self::StandardArray,
            _ => Self::PointBuy,
        }
    }
}

/// Roll 4d6 and sum the highest three.
pub fn roll_stat<R: Rng + ?Sized>(rng: &mut R) -> i32 {
    let mut rolls = [0; 4];
    for r in &mut rolls {
        *r = roll_die(rng, 6);
    }
    rolls.sort_unstable_by(|a, b| b.cmp(a));
    rolls[..3].iter().sum()
}

/// Generate a full set of ability scores.
pub fn generate_attributes<R: Rng + ?Sized>(rng: &mut R, method: StatMethod) -> Attributes {
    match method {
        StatMethod::Random => Attributes {
            strength: roll_stat(rng),
            dexterity: roll_stat(rng),
            constitution: roll_stat(rng),
            intelligence: roll_stat(rng),
            wisdom: roll_stat(rng),
            charisma: roll_stat(rng),
        },
        StatMethod::StandardArray => {
            let mut scores = STANDARD_ARRAY;
            scores.shuffle(rng);
            Attributes {
                strength: scores[0],
                dexterity: scores[1],
                constitution: scores[2],
                intelligence: scores[3],
                wisdom: scores[4],
                charisma: scores[5],
            }
        }
        StatMethod::PointBuy => Attributes::uniform(10),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn random_stats_are_three_to_eighteen() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..100 {
            let stat = roll_stat(&mut rng);
            assert!((3..=18).contains(&stat));
        }
    }

    #[test]
    fn standard_array_is_a_permutation() {
        let mut rng = StdRng::seed_from_u64(5);
        let attrs = generate_attributes(&mut rng, StatMethod::StandardArray);
        let mut got = [
            attrs.strength,
            attrs.dexterity,
            attrs.constitution,
            attrs.intelligence,
            attrs.wisdom,
            attrs.charisma,
        ];
        got.sort_unstable();
        assert_eq!(got, [8, 10, 12, 13, 14, 15]);
    }

    #[test]
    fn point_buy_is_all_tens() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            generate_attributes(&mut rng, StatMethod::parse_lenient("point_buy")),
            Attributes::uniform(10)
        );
        assert_eq!(StatMethod::parse_lenient("whatever"), StatMethod::PointBuy);
    }
}
