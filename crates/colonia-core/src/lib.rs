//! Authoritative game rules for Colonia.
//!
//! The server owns a [`GameEngine`]; every player action arrives as a
//! `Command` and comes back as a [`ChangeSet`] that is rendered into
//! per-player deltas.

mod change;
mod combat;
mod controller;
mod decision;
mod entities;
mod error;
mod map;
mod market;
pub mod movement;
mod options;
pub mod pathfind;
mod rng;
mod rules;
mod session;
mod setup;
pub mod tension;
mod world;

pub use crate::change::*;
pub use crate::combat::*;
pub use crate::controller::{GameEngine, VictoryCheck};
pub use crate::decision::*;
pub use crate::entities::*;
pub use crate::error::*;
pub use crate::map::*;
pub use crate::market::*;
pub use crate::options::*;
pub use crate::rng::*;
pub use crate::rules::*;
pub use crate::session::*;
pub use crate::setup::*;
pub use crate::tension::Tension;
pub use crate::world::*;
