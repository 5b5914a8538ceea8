//! Colonia client
//!
//! Keeps a replica of what the server lets this player see and turns local
//! intents into submissions, with the move-mode guard and desync recovery.

pub mod connection;
pub mod error;
pub mod orchestrator;
pub mod replica;

pub use connection::{connect, Link};
pub use error::ClientError;
pub use orchestrator::{ClientEvent, Gateway, MoveMode, Orchestrator};
pub use replica::{Applied, Replica};
