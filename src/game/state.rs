//! Game State Definitions
//!
//! The Exploding Cats snapshot and its per-player state. A snapshot is plain
//! data: the engine clones it, mutates the clone, and hands the clone back.

use std::fmt;

use serde::{Serialize, Deserialize};

use crate::game::card::Card;
use crate::game::log::LogEntry;

// =============================================================================
// PLAYER ID
// =============================================================================

/// Unique player identifier (the platform user id).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub String);

impl PlayerId {
    /// Create from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlayerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlayerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// =============================================================================
// PLAYER STATE
// =============================================================================

/// State of a single participant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    /// Participant id.
    pub player_id: PlayerId,
    /// Cards in hand (a multiset; order carries no meaning).
    pub hand: Vec<Card>,
    /// Is player still in the game?
    pub alive: bool,
}

impl PlayerState {
    /// Create a live player with an empty hand.
    pub fn new(player_id: PlayerId) -> Self {
        Self {
            player_id,
            hand: Vec::new(),
            alive: true,
        }
    }

    /// Count copies of a card in hand.
    pub fn count(&self, card: Card) -> usize {
        self.hand.iter().filter(|c| **c == card).count()
    }

    /// Check for at least one copy of a card.
    pub fn holds(&self, card: Card) -> bool {
        self.hand.contains(&card)
    }

    /// Remove one copy of a card. Returns false if absent.
    pub fn remove_one(&mut self, card: Card) -> bool {
        match self.hand.iter().position(|c| *c == card) {
            Some(idx) => {
                self.hand.remove(idx);
                true
            }
            None => false,
        }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Authoritative snapshot of one Exploding Cats session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplodingCatsState {
    /// Draw pile. The top card is the last element.
    pub deck: Vec<Card>,
    /// Played and discarded cards, oldest first.
    pub discard_pile: Vec<Card>,
    /// Alive players in turn order.
    pub player_order: Vec<PlayerId>,
    /// Index into `player_order` of the player to act.
    pub current_turn_index: usize,
    /// Draws the current player still owes (always at least 1).
    pub pending_draws: u32,
    /// Every participant, eliminated players included, in seating order.
    pub players: Vec<PlayerState>,
    /// Append-only session log.
    pub logs: Vec<LogEntry>,
}

impl ExplodingCatsState {
    /// Look up a participant.
    pub fn player(&self, id: &PlayerId) -> Option<&PlayerState> {
        self.players.iter().find(|p| &p.player_id == id)
    }

    /// Look up a participant mutably.
    pub fn player_mut(&mut self, id: &PlayerId) -> Option<&mut PlayerState> {
        self.players.iter_mut().find(|p| &p.player_id == id)
    }

    /// Player whose turn it is, if anyone is left.
    pub fn current_player(&self) -> Option<&PlayerId> {
        self.player_order.get(self.current_turn_index)
    }

    /// Check whether `id` holds the turn.
    pub fn is_turn_of(&self, id: &PlayerId) -> bool {
        self.current_player() == Some(id)
    }

    /// Number of alive players.
    pub fn alive_player_count(&self) -> usize {
        self.players.iter().filter(|p| p.alive).count()
    }

    /// Game is over once at most one player remains.
    pub fn is_finished(&self) -> bool {
        self.player_order.len() <= 1
    }

    /// The last player standing, if the game ended with one.
    pub fn winner(&self) -> Option<&PlayerId> {
        match self.player_order.as_slice() {
            [only] => Some(only),
            _ => None,
        }
    }

    /// Total cards across deck, discard pile and every hand.
    pub fn total_cards(&self) -> usize {
        self.deck.len()
            + self.discard_pile.len()
            + self.players.iter().map(|p| p.hand.len()).sum::<usize>()
    }

    /// Count a card kind everywhere it can live.
    pub fn count_everywhere(&self, card: Card) -> usize {
        self.deck.iter().filter(|c| **c == card).count()
            + self.discard_pile.iter().filter(|c| **c == card).count()
            + self.players.iter().map(|p| p.count(card)).sum::<usize>()
    }

    /// Verify the structural invariants that must hold between actions.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.player_order.len() != self.alive_player_count() {
            return Err(format!(
                "player_order has {} entries but {} players are alive",
                self.player_order.len(),
                self.alive_player_count()
            ));
        }
        if !self.player_order.is_empty() {
            let current = self
                .player_order
                .get(self.current_turn_index)
                .ok_or_else(|| format!("current_turn_index {} out of range", self.current_turn_index))?;
            if !self.player(current).is_some_and(|p| p.alive) {
                return Err(format!("current player {current} is not alive"));
            }
        }
        if self.pending_draws < 1 {
            return Err("pending_draws dropped below 1".to_string());
        }
        for player in &self.players {
            if !player.alive && !player.hand.is_empty() {
                return Err(format!("eliminated player {} still holds cards", player.player_id));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_player_state() -> ExplodingCatsState {
        let a = PlayerId::from("a");
        let b = PlayerId::from("b");
        ExplodingCatsState {
            deck: vec![Card::Skip, Card::Attack],
            discard_pile: vec![Card::Tacocat],
            player_order: vec![a.clone(), b.clone()],
            current_turn_index: 1,
            pending_draws: 1,
            players: vec![
                PlayerState { player_id: a, hand: vec![Card::Defuse], alive: true },
                PlayerState { player_id: b, hand: vec![Card::Skip, Card::Skip], alive: true },
            ],
            logs: Vec::new(),
        }
    }

    #[test]
    fn test_turn_lookup() {
        let state = two_player_state();
        assert!(state.is_turn_of(&PlayerId::from("b")));
        assert!(!state.is_turn_of(&PlayerId::from("a")));
        assert_eq!(state.winner(), None);
    }

    #[test]
    fn test_card_counting() {
        let state = two_player_state();
        assert_eq!(state.total_cards(), 6);
        assert_eq!(state.count_everywhere(Card::Skip), 3);
        assert_eq!(state.player(&PlayerId::from("b")).unwrap().count(Card::Skip), 2);
    }

    #[test]
    fn test_remove_one_removes_single_copy() {
        let mut player = PlayerState::new(PlayerId::from("x"));
        player.hand = vec![Card::Skip, Card::Skip];
        assert!(player.remove_one(Card::Skip));
        assert_eq!(player.hand, vec![Card::Skip]);
        assert!(!player.remove_one(Card::Attack));
    }

    #[test]
    fn test_invariant_violations_detected() {
        let mut state = two_player_state();
        assert!(state.check_invariants().is_ok());

        state.pending_draws = 0;
        assert!(state.check_invariants().is_err());

        let mut state = two_player_state();
        state.players[0].alive = false;
        assert!(state.check_invariants().is_err());

        let mut state = two_player_state();
        state.current_turn_index = 5;
        assert!(state.check_invariants().is_err());
    }

    #[test]
    fn test_snapshot_uses_camel_case() {
        let json = serde_json::to_value(two_player_state()).unwrap();
        assert!(json.get("discardPile").is_some());
        assert!(json.get("playerOrder").is_some());
        assert_eq!(json["currentTurnIndex"], 1);
        assert_eq!(json["pendingDraws"], 1);
        assert_eq!(json["players"][0]["playerId"], "a");
    }
}
