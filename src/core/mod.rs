//! Core primitives shared by the game engine and the session layer.

pub mod rng;

// Re-export core types
pub use rng::{DeterministicRng, derive_action_seed};
