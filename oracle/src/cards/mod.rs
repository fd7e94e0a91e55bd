//! Tarot cards and the three-card hand sampler.
//!
//! A hand is drawn by rejection sampling over the union of the major and
//! minor universes: pick a universe with a fair coin, pick a card uniformly
//! inside it, keep it unless its key was already drawn.

pub mod layout;
pub mod render;

use crate::error::{OracleError, OracleResult};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use strum::{Display, IntoStaticStr, VariantArray};

/// Number of cards in a spread.
pub const HAND_SIZE: usize = 3;

/// The 22 major arcana. String forms match the card asset file names.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, VariantArray, Serialize, Deserialize,
)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "kebab-case")]
pub enum MajorArcana {
    Chariot,
    Empress,
    Hierophant,
    Lovers,
    Strength,
    WheelOfFortune,
    Death,
    Fool,
    #[strum(serialize = "high-priestress")]
    #[serde(rename = "high-priestress")]
    HighPriestess,
    Magician,
    Sun,
    World,
    Devil,
    HangedMan,
    Judgement,
    Moon,
    Temperance,
    Emperor,
    Hermit,
    Justice,
    Star,
    Tower,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, VariantArray, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Suit {
    Wands,
    Cups,
    Swords,
    Pentacles,
}

/// The 14 values of a minor arcana suit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr, VariantArray, Serialize, Deserialize,
)]
pub enum Rank {
    #[strum(serialize = "10")]
    #[serde(rename = "10")]
    Ten,
    #[strum(serialize = "3")]
    #[serde(rename = "3")]
    Three,
    #[strum(serialize = "5")]
    #[serde(rename = "5")]
    Five,
    #[strum(serialize = "7")]
    #[serde(rename = "7")]
    Seven,
    #[strum(serialize = "9")]
    #[serde(rename = "9")]
    Nine,
    #[strum(serialize = "king")]
    #[serde(rename = "king")]
    King,
    #[strum(serialize = "page")]
    #[serde(rename = "page")]
    Page,
    #[strum(serialize = "2")]
    #[serde(rename = "2")]
    Two,
    #[strum(serialize = "4")]
    #[serde(rename = "4")]
    Four,
    #[strum(serialize = "6")]
    #[serde(rename = "6")]
    Six,
    #[strum(serialize = "8")]
    #[serde(rename = "8")]
    Eight,
    #[strum(serialize = "ace")]
    #[serde(rename = "ace")]
    Ace,
    #[strum(serialize = "knight")]
    #[serde(rename = "knight")]
    Knight,
    #[strum(serialize = "queen")]
    #[serde(rename = "queen")]
    Queen,
}

/// A single card, tagged by universe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Card {
    Major { value: MajorArcana },
    Minor { suit: Suit, value: Rank },
}

impl Card {
    /// Draw one card: fair coin for the universe, uniform inside it.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        if rng.random_bool(0.5) {
            Card::Major {
                value: pick(rng, MajorArcana::VARIANTS),
            }
        } else {
            Card::Minor {
                suit: pick(rng, Suit::VARIANTS),
                value: pick(rng, Rank::VARIANTS),
            }
        }
    }

    /// Composite key used for uniqueness within a hand.
    pub fn key(&self) -> String {
        match self {
            Card::Major { value } => format!("major-{value}"),
            Card::Minor { suit, value } => format!("minor-{suit}-{value}"),
        }
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Card::Major { value } => write!(f, "{value} (Major Arcana)"),
            Card::Minor { suit, value } => write!(f, "{value} of {suit} (Minor Arcana)"),
        }
    }
}

fn pick<T: Copy, R: Rng + ?Sized>(rng: &mut R, items: &[T]) -> T {
    items[rng.random_range(0..items.len())]
}

/// An ordered spread of three distinct cards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hand([Card; HAND_SIZE]);

impl Hand {
    pub fn cards(&self) -> &[Card; HAND_SIZE] {
        &self.0
    }

    /// One card per line, in the form used inside prompts and logs.
    pub fn describe(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl fmt::Display for Hand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

/// Draw a hand from the thread-local RNG.
pub fn draw() -> Hand {
    draw_with(&mut rand::rng())
}

/// Draw a hand, resampling on collisions until three unique cards are found.
pub fn draw_with<R: Rng + ?Sized>(rng: &mut R) -> Hand {
    let mut used = HashSet::with_capacity(HAND_SIZE);
    Hand([
        next_unique(rng, &mut used),
        next_unique(rng, &mut used),
        next_unique(rng, &mut used),
    ])
}

/// Like [`draw_with`], but gives up after `max_draws` total draws.
pub fn try_draw_with<R: Rng + ?Sized>(rng: &mut R, max_draws: usize) -> OracleResult<Hand> {
    let mut used = HashSet::with_capacity(HAND_SIZE);
    let mut draws = 0;
    Ok(Hand([
        next_unique_capped(rng, &mut used, &mut draws, max_draws)?,
        next_unique_capped(rng, &mut used, &mut draws, max_draws)?,
        next_unique_capped(rng, &mut used, &mut draws, max_draws)?,
    ]))
}

fn next_unique<R: Rng + ?Sized>(rng: &mut R, used: &mut HashSet<String>) -> Card {
    loop {
        let card = Card::random(rng);
        if used.insert(card.key()) {
            return card;
        }
    }
}

fn next_unique_capped<R: Rng + ?Sized>(
    rng: &mut R,
    used: &mut HashSet<String>,
    draws: &mut usize,
    max_draws: usize,
) -> OracleResult<Card> {
    while *draws < max_draws {
        *draws += 1;
        let card = Card::random(rng);
        if used.insert(card.key()) {
            return Ok(card);
        }
    }
    Err(OracleError::SamplingExhausted { draws: *draws })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{RngCore, SeedableRng};

    /// Always yields zero bits, so every draw is the same major card.
    struct ZeroRng;

    impl RngCore for ZeroRng {
        fn next_u32(&mut self) -> u32 {
            0
        }

        fn next_u64(&mut self) -> u64 {
            0
        }

        fn fill_bytes(&mut self, dst: &mut [u8]) {
            dst.fill(0);
        }
    }

    #[test]
    fn test_universe_sizes() {
        assert_eq!(MajorArcana::VARIANTS.len(), 22);
        assert_eq!(Suit::VARIANTS.len(), 4);
        assert_eq!(Rank::VARIANTS.len(), 14);
    }

    #[test]
    fn test_hand_has_three_distinct_cards() {
        let hand = draw();
        let keys: HashSet<String> = hand.cards().iter().map(Card::key).collect();
        assert_eq!(hand.cards().len(), HAND_SIZE);
        assert_eq!(keys.len(), HAND_SIZE);
    }

    #[test]
    fn test_ten_thousand_draws_stay_in_universe() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut saw_major = false;
        let mut saw_minor = false;

        for _ in 0..10_000 {
            let hand = draw_with(&mut rng);
            let mut keys = HashSet::new();
            for card in hand.cards() {
                match card {
                    Card::Major { value } => {
                        saw_major = true;
                        assert!(MajorArcana::VARIANTS.contains(value));
                    }
                    Card::Minor { suit, value } => {
                        saw_minor = true;
                        assert!(Suit::VARIANTS.contains(suit));
                        assert!(Rank::VARIANTS.contains(value));
                    }
                }
                assert!(keys.insert(card.key()), "duplicate card in {hand}");
            }
        }

        assert!(saw_major && saw_minor);
    }

    #[test]
    fn test_keys_never_collide_across_universes() {
        let major = Card::Major {
            value: MajorArcana::Fool,
        };
        let minor = Card::Minor {
            suit: Suit::Cups,
            value: Rank::Ace,
        };
        assert_eq!(major.key(), "major-fool");
        assert_eq!(minor.key(), "minor-cups-ace");
        assert_ne!(major.key(), minor.key());
    }

    #[test]
    fn test_description_format() {
        let hand = Hand([
            Card::Major {
                value: MajorArcana::WheelOfFortune,
            },
            Card::Minor {
                suit: Suit::Pentacles,
                value: Rank::Ten,
            },
            Card::Major {
                value: MajorArcana::HighPriestess,
            },
        ]);

        assert_eq!(
            hand.describe(),
            "wheel-of-fortune (Major Arcana)\n10 of pentacles (Minor Arcana)\nhigh-priestress (Major Arcana)"
        );
    }

    #[test]
    fn test_capped_draw_reports_exhaustion() {
        let result = try_draw_with(&mut ZeroRng, 50);
        assert!(matches!(
            result,
            Err(OracleError::SamplingExhausted { draws: 50 })
        ));
    }

    #[test]
    fn test_capped_draw_succeeds_with_real_rng() {
        let mut rng = StdRng::seed_from_u64(42);
        let hand = try_draw_with(&mut rng, 1_000).unwrap();
        assert_eq!(hand.cards().len(), HAND_SIZE);
    }

    #[test]
    fn test_card_serializes_with_kind_tag() {
        let card = Card::Minor {
            suit: Suit::Swords,
            value: Rank::Knight,
        };
        let json = serde_json::to_value(card).unwrap();
        assert_eq!(json["kind"], "minor");
        assert_eq!(json["suit"], "swords");
        assert_eq!(json["value"], "knight");
    }
}
