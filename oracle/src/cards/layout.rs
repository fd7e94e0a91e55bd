//! Fixed placement plan for the spread image, consumed by
//! [`SpreadRenderer`](super::render::SpreadRenderer).

use super::{Card, Hand};
use serde::Serialize;
use std::path::PathBuf;

pub const CANVAS_WIDTH: u32 = 3058;
pub const CANVAS_HEIGHT: u32 = 1720;
pub const CARD_WIDTH: u32 = 503;
pub const CARD_HEIGHT: u32 = 836;
pub const CARDS_X: u32 = 635;
pub const CARDS_Y: u32 = 442;
pub const CARDS_GAP: u32 = 139;

/// Where one card image goes on the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Placement {
    pub asset: PathBuf,
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Resolves card artwork under an assets directory laid out as
/// `template.png`, `cards/major-arcana/<value>.png` and
/// `cards/minor-arcana/<suit>/<value>.png`.
#[derive(Debug, Clone)]
pub struct SpreadLayout {
    assets_dir: PathBuf,
}

impl SpreadLayout {
    pub fn new(assets_dir: impl Into<PathBuf>) -> Self {
        Self {
            assets_dir: assets_dir.into(),
        }
    }

    pub fn template_path(&self) -> PathBuf {
        self.assets_dir.join("template.png")
    }

    pub fn asset_path(&self, card: &Card) -> PathBuf {
        let cards = self.assets_dir.join("cards");
        match card {
            Card::Major { value } => cards.join("major-arcana").join(format!("{value}.png")),
            Card::Minor { suit, value } => cards
                .join("minor-arcana")
                .join(suit.to_string())
                .join(format!("{value}.png")),
        }
    }

    /// Left-to-right placements for the three cards of a hand.
    pub fn plan(&self, hand: &Hand) -> Vec<Placement> {
        hand.cards()
            .iter()
            .enumerate()
            .map(|(slot, card)| Placement {
                asset: self.asset_path(card),
                x: CARDS_X + slot as u32 * (CARD_WIDTH + CARDS_GAP),
                y: CARDS_Y,
                width: CARD_WIDTH,
                height: CARD_HEIGHT,
            })
            .collect()
    }

    /// Assets referenced by the plan that are not present on disk.
    pub fn missing_assets(&self, hand: &Hand) -> Vec<PathBuf> {
        std::iter::once(self.template_path())
            .chain(hand.cards().iter().map(|card| self.asset_path(card)))
            .filter(|path| !path.exists())
            .collect()
    }
}
