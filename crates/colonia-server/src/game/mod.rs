//! Game state and simulation management.

pub mod state;

pub use state::{ApplyResult, DeltasByPlayer, GameState};
