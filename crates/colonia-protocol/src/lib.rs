//! Wire-level types shared by the authoritative server and its clients.
//!
//! Nothing in this crate mutates game state. It describes what players may ask
//! for (`Command`), what the server may ask them back (`DecisionRequest`), and
//! the visibility-scoped deltas (`Delta`) they receive after each operation.

mod command;
mod decision;
mod delta;
mod diplomacy;
mod geo;
mod ids;
mod notice;
mod snapshot;
mod types;
pub mod wire;

pub use crate::command::*;
pub use crate::decision::*;
pub use crate::delta::*;
pub use crate::diplomacy::*;
pub use crate::geo::*;
pub use crate::ids::*;
pub use crate::notice::*;
pub use crate::snapshot::*;
pub use crate::types::*;
