//! # Exploding Cats Session Server
//!
//! Authoritative turn-based session engine for Exploding Cats, plus the
//! realtime gateway that keeps every player in a room on the same snapshot.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  EXPLODING CATS SERVER                       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  core/           - Deterministic primitives                  │
//! │  └── rng.rs      - Xorshift128+ PRNG, per-action seeding     │
//! │                                                              │
//! │  game/           - Rules (pure, no I/O)                      │
//! │  ├── card.rs     - Card kinds and deck composition           │
//! │  ├── log.rs      - Session log entries                       │
//! │  ├── state.rs    - Session snapshot and player state         │
//! │  └── engine.rs   - Initialization and transitions            │
//! │                                                              │
//! │  rooms.rs        - Room registry interface                   │
//! │  store.rs        - Session documents, optimistic locking     │
//! │  service.rs      - Session orchestration                     │
//! │  config.rs       - Server configuration                      │
//! │                                                              │
//! │  network/        - Networking                                │
//! │  ├── protocol.rs - `games.*` message types                   │
//! │  ├── hub.rs      - Room channels                             │
//! │  ├── gateway.rs  - Per-message handlers                      │
//! │  └── server.rs   - WebSocket server                          │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Flow
//!
//! A client frame is validated by the gateway, authorized and applied by the
//! session service, and committed with a conditional write on the session's
//! `lock_version`. The service then notifies the hub, which broadcasts the new
//! snapshot to the room, while the gateway acknowledges the caller.
//!
//! ## Determinism
//!
//! `game/` transitions take an explicit RNG and timestamp and never touch the
//! input snapshot. Replaying a transition with the same context yields the
//! same result.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod core;
pub mod game;
pub mod rooms;
pub mod store;
pub mod service;
pub mod config;
pub mod network;

// Re-export commonly used types
pub use crate::core::rng::DeterministicRng;
pub use game::card::Card;
pub use game::engine::{ActionContext, GameAction, RuleError, Transition};
pub use game::state::{ExplodingCatsState, PlayerState, PlayerId};
pub use service::{SessionError, SessionService};
pub use store::{GameSession, SessionStore};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
