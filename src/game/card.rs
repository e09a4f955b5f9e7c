//! Card Definitions
//!
//! The nine card kinds of Exploding Cats and the deck composition rules.

use std::fmt;
use std::str::FromStr;

use serde::{Serialize, Deserialize};

/// A single card.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Card {
    /// Eliminates the drawer unless they hold a Defuse.
    ExplodingCat,
    /// Neutralizes an Exploding Cat.
    Defuse,
    /// Ends the turn without drawing and forces the next player to take an extra turn.
    Attack,
    /// Ends the turn without drawing, or cancels one stacked Attack draw.
    Skip,
    /// Combo-only cat.
    Tacocat,
    /// Combo-only cat.
    HairyPotatoCat,
    /// Combo-only cat.
    RainbowRalphingCat,
    /// Combo-only cat.
    Cattermelon,
    /// Combo-only cat.
    BeardedCat,
}

impl Card {
    /// Every card kind, in declaration order.
    pub const ALL: [Card; 9] = [
        Card::ExplodingCat,
        Card::Defuse,
        Card::Attack,
        Card::Skip,
        Card::Tacocat,
        Card::HairyPotatoCat,
        Card::RainbowRalphingCat,
        Card::Cattermelon,
        Card::BeardedCat,
    ];

    /// The five cat cards that only work as pairs or trios.
    pub const COMBO_CARDS: [Card; 5] = [
        Card::Tacocat,
        Card::HairyPotatoCat,
        Card::RainbowRalphingCat,
        Card::Cattermelon,
        Card::BeardedCat,
    ];

    /// Cards playable on their own through `play_action`.
    pub const ACTION_CARDS: [Card; 2] = [Card::Skip, Card::Attack];

    /// Wire name (`snake_case`).
    pub const fn as_str(self) -> &'static str {
        match self {
            Card::ExplodingCat => "exploding_cat",
            Card::Defuse => "defuse",
            Card::Attack => "attack",
            Card::Skip => "skip",
            Card::Tacocat => "tacocat",
            Card::HairyPotatoCat => "hairy_potato_cat",
            Card::RainbowRalphingCat => "rainbow_ralphing_cat",
            Card::Cattermelon => "cattermelon",
            Card::BeardedCat => "bearded_cat",
        }
    }

    /// Human readable name used in session logs.
    pub const fn display_name(self) -> &'static str {
        match self {
            Card::ExplodingCat => "Exploding Cat",
            Card::Defuse => "Defuse",
            Card::Attack => "Attack",
            Card::Skip => "Skip",
            Card::Tacocat => "Tacocat",
            Card::HairyPotatoCat => "Hairy Potato Cat",
            Card::RainbowRalphingCat => "Rainbow-Ralphing Cat",
            Card::Cattermelon => "Cattermelon",
            Card::BeardedCat => "Bearded Cat",
        }
    }

    /// Check if this card only works in a pair/trio.
    #[inline]
    pub fn is_combo(self) -> bool {
        Self::COMBO_CARDS.contains(&self)
    }

    /// Check if this card can be played alone as an action.
    #[inline]
    pub fn is_action(self) -> bool {
        Self::ACTION_CARDS.contains(&self)
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string is not a card name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown card: {0}")]
pub struct UnknownCard(pub String);

impl FromStr for Card {
    type Err = UnknownCard;

    /// Parses a wire name. Input is trimmed and lower-cased first.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        Card::ALL
            .iter()
            .copied()
            .find(|card| card.as_str() == normalized)
            .ok_or(UnknownCard(normalized))
    }
}

// =============================================================================
// DECK COMPOSITION
// =============================================================================

/// Players covered by one box of cards.
pub const PLAYERS_PER_BOX: usize = 5;

/// Draw cards dealt to each player next to their Defuse.
pub const STARTING_DRAW_CARDS: usize = 4;

/// Spare Defuse cards shuffled into the deck after dealing.
pub const SPARE_DEFUSES: usize = 2;

/// Per-box quotas of the cards that form the initial draw pile.
pub const BOX_QUOTAS: [(Card, usize); 7] = [
    (Card::Attack, 4),
    (Card::Skip, 4),
    (Card::Tacocat, 4),
    (Card::HairyPotatoCat, 4),
    (Card::RainbowRalphingCat, 4),
    (Card::Cattermelon, 4),
    (Card::BeardedCat, 4),
];

/// Number of boxes needed for a player count.
pub fn boxes_for(players: usize) -> usize {
    players.div_ceil(PLAYERS_PER_BOX).max(1)
}

/// Build the unshuffled draw pile (no Defuse, no Exploding Cat).
pub fn build_draw_pile(players: usize) -> Vec<Card> {
    let boxes = boxes_for(players);
    let mut pile = Vec::with_capacity(boxes * BOX_QUOTAS.iter().map(|(_, n)| n).sum::<usize>());
    for _ in 0..boxes {
        for (card, count) in BOX_QUOTAS {
            pile.extend(std::iter::repeat(card).take(count));
        }
    }
    pile
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_normalizes() {
        assert_eq!(" Skip ".parse::<Card>(), Ok(Card::Skip));
        assert_eq!("HAIRY_POTATO_CAT".parse::<Card>(), Ok(Card::HairyPotatoCat));
        assert_eq!(
            "nope".parse::<Card>(),
            Err(UnknownCard("nope".to_string()))
        );
    }

    #[test]
    fn test_wire_names_match_serde() {
        for card in Card::ALL {
            let json = serde_json::to_string(&card).unwrap();
            assert_eq!(json, format!("\"{}\"", card.as_str()));
        }
    }

    #[test]
    fn test_card_categories() {
        assert!(Card::Tacocat.is_combo());
        assert!(!Card::Skip.is_combo());
        assert!(Card::Attack.is_action());
        assert!(!Card::Defuse.is_action());
        assert!(!Card::ExplodingCat.is_action());
    }

    #[test]
    fn test_draw_pile_scales_with_players() {
        assert_eq!(boxes_for(2), 1);
        assert_eq!(boxes_for(5), 1);
        assert_eq!(boxes_for(6), 2);
        assert_eq!(build_draw_pile(2).len(), 28);
        assert_eq!(build_draw_pile(7).len(), 56);
        assert!(build_draw_pile(4)
            .iter()
            .all(|c| *c != Card::Defuse && *c != Card::ExplodingCat));
    }
}
