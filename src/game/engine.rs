//! Exploding Cats Transitions
//!
//! Pure state machine for one game. Every transition borrows the current
//! snapshot, works on a private clone, and returns the clone together with the
//! log entries it produced. Randomness and time come in through
//! [`ActionContext`], so a transition replayed with the same context yields the
//! same snapshot.

use chrono::{DateTime, Utc};
use serde::{Serialize, Deserialize};

use crate::core::rng::DeterministicRng;
use crate::game::card::{build_draw_pile, Card, SPARE_DEFUSES, STARTING_DRAW_CARDS};
use crate::game::log::LogEntry;
use crate::game::state::{ExplodingCatsState, PlayerId, PlayerState};

/// Randomness and clock for one transition.
#[derive(Clone, Debug)]
pub struct ActionContext {
    /// Seeded RNG for shuffles, insert positions, steals and log ids.
    pub rng: DeterministicRng,
    /// Timestamp stamped on log entries.
    pub now: DateTime<Utc>,
}

impl ActionContext {
    /// Create a context from a seed and a timestamp.
    pub fn new(seed: u64, now: DateTime<Utc>) -> Self {
        Self {
            rng: DeterministicRng::new(seed),
            now,
        }
    }
}

/// Shape of a cat combo as chosen by the player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComboMode {
    /// Two matching cats: steal a random card.
    Pair,
    /// Three matching cats: name a card to take.
    Trio,
}

impl ComboMode {
    /// Copies of the cat the combo consumes.
    pub const fn required_copies(self) -> usize {
        match self {
            ComboMode::Pair => 2,
            ComboMode::Trio => 3,
        }
    }
}

/// A fully validated cat combo.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum Combo {
    /// Steal one random card.
    Pair,
    /// Take the named card if the target has it.
    Trio {
        /// Card the player asks for.
        desired: Card,
    },
}

impl Combo {
    /// Mode of this combo.
    pub const fn mode(self) -> ComboMode {
        match self {
            Combo::Pair => ComboMode::Pair,
            Combo::Trio { .. } => ComboMode::Trio,
        }
    }
}

/// Every move a player can make.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameAction {
    /// Draw the top card.
    Draw,
    /// Play a Skip.
    PlaySkip,
    /// Play an Attack.
    PlayAttack,
    /// Play a pair or trio of cats against another player.
    PlayCatCombo {
        /// Cat being combined.
        cat: Card,
        /// Pair or trio.
        combo: Combo,
        /// Player being robbed.
        target: PlayerId,
    },
}

/// Result of a successful transition.
#[derive(Clone, Debug)]
pub struct Transition {
    /// Snapshot after the move.
    pub state: ExplodingCatsState,
    /// Entries appended to `state.logs` by this move.
    pub logs: Vec<LogEntry>,
    /// Whether the move ended the game.
    pub completed: bool,
}

/// Rule violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RuleError {
    /// Actor does not hold the turn.
    #[error("It is not your turn")]
    NotYourTurn,

    /// Actor has already exploded.
    #[error("Player {0} has been eliminated")]
    PlayerEliminated(PlayerId),

    /// Actor is not part of this game.
    #[error("Player {0} is not part of this game")]
    UnknownPlayer(PlayerId),

    /// Card is missing from the actor's hand.
    #[error("Card {0} is not in your hand")]
    CardNotInHand(Card),

    /// Not enough cats for the requested combo.
    #[error("A {mode:?} of {card} needs {required} copies but you hold {held}")]
    InsufficientComboCopies {
        /// Cat requested.
        card: Card,
        /// Combo mode.
        mode: ComboMode,
        /// Copies the combo needs.
        required: usize,
        /// Copies the actor holds.
        held: usize,
    },

    /// Card is not one of the five cats.
    #[error("Card {0} cannot be played as a combo")]
    NotAComboCard(Card),

    /// Combo target is the actor, unknown, or eliminated.
    #[error("Invalid combo target: {0}")]
    InvalidTarget(String),

    /// Nothing left to draw.
    #[error("Deck and discard pile are both empty")]
    DeckAndDiscardEmpty,

    /// Initialization needs two distinct players.
    #[error("At least two unique players are required")]
    FewerThanTwoPlayers,

    /// Session already has a winner.
    #[error("The game is already over")]
    GameOver,
}

// =============================================================================
// INITIALIZATION
// =============================================================================

/// Deal a new game.
///
/// Duplicate ids are dropped keeping the first occurrence, so a host listed
/// first keeps the first turn.
pub fn initialize(
    player_ids: &[PlayerId],
    ctx: &mut ActionContext,
) -> Result<Transition, RuleError> {
    let mut order: Vec<PlayerId> = Vec::with_capacity(player_ids.len());
    for id in player_ids {
        if !order.contains(id) {
            order.push(id.clone());
        }
    }
    if order.len() < 2 {
        return Err(RuleError::FewerThanTwoPlayers);
    }

    let mut pile = build_draw_pile(order.len());
    ctx.rng.shuffle(&mut pile);

    let mut players = Vec::with_capacity(order.len());
    for id in &order {
        let mut player = PlayerState::new(id.clone());
        player.hand.push(Card::Defuse);
        for _ in 0..STARTING_DRAW_CARDS {
            if let Some(card) = pile.pop() {
                player.hand.push(card);
            }
        }
        players.push(player);
    }

    let mut deck = pile;
    for _ in 0..SPARE_DEFUSES {
        insert_at_random(&mut deck, Card::Defuse, &mut ctx.rng);
    }
    for _ in 1..order.len() {
        insert_at_random(&mut deck, Card::ExplodingCat, &mut ctx.rng);
    }

    let first = order[0].clone();
    let mut state = ExplodingCatsState {
        deck,
        discard_pile: Vec::new(),
        player_order: order,
        current_turn_index: 0,
        pending_draws: 1,
        players,
        logs: Vec::new(),
    };

    let entry = LogEntry::system(
        &mut ctx.rng,
        format!(
            "Game started with {} players. {} goes first.",
            state.player_order.len(),
            first
        ),
        ctx.now,
    );
    state.logs.push(entry);

    Ok(finish(state, 0, false))
}

// =============================================================================
// DISPATCH
// =============================================================================

/// Apply any player action to a snapshot.
pub fn apply(
    state: &ExplodingCatsState,
    actor: &PlayerId,
    action: &GameAction,
    ctx: &mut ActionContext,
) -> Result<Transition, RuleError> {
    match action {
        GameAction::Draw => draw(state, actor, ctx),
        GameAction::PlaySkip => play_skip(state, actor, ctx),
        GameAction::PlayAttack => play_attack(state, actor, ctx),
        GameAction::PlayCatCombo { cat, combo, target } => {
            play_cat_combo(state, actor, *cat, *combo, target, ctx)
        }
    }
}

// =============================================================================
// DRAW
// =============================================================================

/// Draw the top card, resolving Exploding Cats.
pub fn draw(
    state: &ExplodingCatsState,
    actor: &PlayerId,
    ctx: &mut ActionContext,
) -> Result<Transition, RuleError> {
    ensure_can_act(state, actor)?;
    if state.deck.is_empty() && state.discard_pile.is_empty() {
        return Err(RuleError::DeckAndDiscardEmpty);
    }

    let mut next = state.clone();
    let log_start = next.logs.len();

    if next.deck.is_empty() {
        let mut reshuffled = std::mem::take(&mut next.discard_pile);
        ctx.rng.shuffle(&mut reshuffled);
        next.deck = reshuffled;
        push_system(&mut next, ctx, "The discard pile was shuffled into a new deck.".to_string());
    }

    let card = next.deck.pop().ok_or(RuleError::DeckAndDiscardEmpty)?;
    let mut survived = true;

    if card == Card::ExplodingCat {
        let defused = next
            .player_mut(actor)
            .map(|p| p.remove_one(Card::Defuse))
            .unwrap_or(false);

        if defused {
            next.discard_pile.push(Card::Defuse);
            insert_at_random(&mut next.deck, Card::ExplodingCat, &mut ctx.rng);
            push_action(
                &mut next,
                ctx,
                format!("{actor} drew an Exploding Cat and used a Defuse."),
            );
        } else {
            if let Some(player) = next.player_mut(actor) {
                player.alive = false;
                let hand = std::mem::take(&mut player.hand);
                next.discard_pile.extend(hand);
            }
            next.discard_pile.push(Card::ExplodingCat);
            remove_from_order(&mut next, actor);
            push_system(
                &mut next,
                ctx,
                format!("{actor} drew an Exploding Cat and was eliminated."),
            );
            survived = false;
        }
    } else {
        if let Some(player) = next.player_mut(actor) {
            player.hand.push(card);
        }
        push_action(&mut next, ctx, format!("{actor} drew a card."));
    }

    if next.is_finished() {
        next.pending_draws = 1;
        next.current_turn_index = 0;
        if let Some(winner) = next.winner().cloned() {
            push_system(&mut next, ctx, format!("{winner} wins the game!"));
        }
        return Ok(finish(next, log_start, true));
    }

    if survived && next.pending_draws > 1 {
        next.pending_draws -= 1;
    } else {
        next.pending_draws = 1;
        if survived {
            advance_turn(&mut next);
        }
    }

    Ok(finish(next, log_start, false))
}

// =============================================================================
// ACTION CARDS
// =============================================================================

/// Play a Skip: end the turn, or cancel one stacked Attack draw.
pub fn play_skip(
    state: &ExplodingCatsState,
    actor: &PlayerId,
    ctx: &mut ActionContext,
) -> Result<Transition, RuleError> {
    let mut next = play_card_from_hand(state, actor, Card::Skip)?;
    let log_start = state.logs.len();

    push_action(&mut next, ctx, format!("{actor} played Skip."));

    if next.pending_draws > 1 {
        next.pending_draws -= 1;
    } else {
        next.pending_draws = 1;
        advance_turn(&mut next);
    }

    Ok(finish(next, log_start, false))
}

/// Play an Attack: end the turn and hand the next player the stacked draws.
pub fn play_attack(
    state: &ExplodingCatsState,
    actor: &PlayerId,
    ctx: &mut ActionContext,
) -> Result<Transition, RuleError> {
    let mut next = play_card_from_hand(state, actor, Card::Attack)?;
    let log_start = state.logs.len();

    let stacked = next.pending_draws + 1;
    advance_turn(&mut next);
    next.pending_draws = stacked;

    let victim = next.current_player().cloned();
    let message = match victim {
        Some(victim) => format!("{actor} played Attack. {victim} must draw {stacked} cards."),
        None => format!("{actor} played Attack."),
    };
    push_action(&mut next, ctx, message);

    Ok(finish(next, log_start, false))
}

// =============================================================================
// CAT COMBOS
// =============================================================================

/// Play a pair or trio of matching cats against `target`.
pub fn play_cat_combo(
    state: &ExplodingCatsState,
    actor: &PlayerId,
    cat: Card,
    combo: Combo,
    target: &PlayerId,
    ctx: &mut ActionContext,
) -> Result<Transition, RuleError> {
    ensure_can_act(state, actor)?;

    if !cat.is_combo() {
        return Err(RuleError::NotAComboCard(cat));
    }

    let mode = combo.mode();
    let required = mode.required_copies();
    let held = state.player(actor).map(|p| p.count(cat)).unwrap_or(0);
    if held < required {
        return Err(RuleError::InsufficientComboCopies { card: cat, mode, required, held });
    }

    if target == actor {
        return Err(RuleError::InvalidTarget("you cannot target yourself".to_string()));
    }
    match state.player(target) {
        None => return Err(RuleError::InvalidTarget(format!("{target} is not part of this game"))),
        Some(p) if !p.alive => {
            return Err(RuleError::InvalidTarget(format!("{target} has been eliminated")))
        }
        Some(_) => {}
    }

    let mut next = state.clone();
    let log_start = next.logs.len();

    if let Some(player) = next.player_mut(actor) {
        for _ in 0..required {
            player.remove_one(cat);
        }
    }
    next.discard_pile.extend(std::iter::repeat(cat).take(required));

    let taken = match combo {
        Combo::Pair => next.player_mut(target).and_then(|victim| {
            if victim.hand.is_empty() {
                None
            } else {
                let idx = ctx.rng.next_index(victim.hand.len());
                Some(victim.hand.remove(idx))
            }
        }),
        Combo::Trio { desired } => next
            .player_mut(target)
            .and_then(|victim| victim.remove_one(desired).then_some(desired)),
    };

    if let (Some(card), Some(player)) = (taken, next.player_mut(actor)) {
        player.hand.push(card);
    }

    let message = match (combo, taken) {
        (Combo::Pair, Some(_)) => {
            format!("{actor} played a pair of {} and stole a card from {target}.", cat.display_name())
        }
        (Combo::Pair, None) => {
            format!("{actor} played a pair of {} but {target} had no cards.", cat.display_name())
        }
        (Combo::Trio { desired }, Some(_)) => format!(
            "{actor} played three {} and took a {} from {target}.",
            cat.display_name(),
            desired.display_name()
        ),
        (Combo::Trio { desired }, None) => format!(
            "{actor} played three {} and asked {target} for a {}, but they had none.",
            cat.display_name(),
            desired.display_name()
        ),
    };
    push_action(&mut next, ctx, message);

    Ok(finish(next, log_start, false))
}

// =============================================================================
// HELPERS
// =============================================================================

fn ensure_can_act(state: &ExplodingCatsState, actor: &PlayerId) -> Result<(), RuleError> {
    if state.is_finished() {
        return Err(RuleError::GameOver);
    }
    let player = state
        .player(actor)
        .ok_or_else(|| RuleError::UnknownPlayer(actor.clone()))?;
    if !player.alive {
        return Err(RuleError::PlayerEliminated(actor.clone()));
    }
    if !state.is_turn_of(actor) {
        return Err(RuleError::NotYourTurn);
    }
    Ok(())
}

/// Validate turn, move `card` from the actor's hand to the discard pile.
fn play_card_from_hand(
    state: &ExplodingCatsState,
    actor: &PlayerId,
    card: Card,
) -> Result<ExplodingCatsState, RuleError> {
    ensure_can_act(state, actor)?;
    if !state.player(actor).is_some_and(|p| p.holds(card)) {
        return Err(RuleError::CardNotInHand(card));
    }

    let mut next = state.clone();
    if let Some(player) = next.player_mut(actor) {
        player.remove_one(card);
    }
    next.discard_pile.push(card);
    Ok(next)
}

fn insert_at_random(deck: &mut Vec<Card>, card: Card, rng: &mut DeterministicRng) {
    let idx = rng.next_index(deck.len() + 1);
    deck.insert(idx, card);
}

fn advance_turn(state: &mut ExplodingCatsState) {
    if state.player_order.is_empty() {
        state.current_turn_index = 0;
    } else {
        state.current_turn_index = (state.current_turn_index + 1) % state.player_order.len();
    }
}

/// Drop an eliminated player from the turn order. The turn index ends up on
/// the player who followed them.
fn remove_from_order(state: &mut ExplodingCatsState, id: &PlayerId) {
    let Some(removed) = state.player_order.iter().position(|p| p == id) else {
        return;
    };
    state.player_order.remove(removed);

    let len = state.player_order.len();
    if len == 0 {
        state.current_turn_index = 0;
        return;
    }
    if removed < state.current_turn_index {
        state.current_turn_index -= 1;
    }
    state.current_turn_index %= len;
}

fn push_action(state: &mut ExplodingCatsState, ctx: &mut ActionContext, message: String) {
    let entry = LogEntry::action(&mut ctx.rng, message, ctx.now);
    state.logs.push(entry);
}

fn push_system(state: &mut ExplodingCatsState, ctx: &mut ActionContext, message: String) {
    let entry = LogEntry::system(&mut ctx.rng, message, ctx.now);
    state.logs.push(entry);
}

fn finish(state: ExplodingCatsState, log_start: usize, completed: bool) -> Transition {
    let logs = state.logs[log_start..].to_vec();
    Transition { state, logs, completed }
}
