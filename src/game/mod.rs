//! Game Logic Module
//!
//! Exploding Cats rules. Pure and deterministic given an [`ActionContext`].
//!
//! ## Module Structure
//!
//! - `card`: Card kinds and deck composition
//! - `log`: Session log entries
//! - `state`: Session snapshot and player state
//! - `engine`: Initialization and player transitions

pub mod card;
pub mod log;
pub mod state;
pub mod engine;

// Re-export key types
pub use card::{Card, UnknownCard};
pub use log::{LogEntry, LogKind};
pub use state::{ExplodingCatsState, PlayerState, PlayerId};
pub use engine::{ActionContext, Combo, ComboMode, GameAction, RuleError, Transition};
