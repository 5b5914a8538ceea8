//! Colonia multiplayer server
//!
//! Authoritative server over TCP. Seats are the world's human players; the
//! rest are played by the server.

pub mod config;
pub mod error;
pub mod game;
pub mod protocol;
pub mod seats;
pub mod server;
pub mod transport;

pub use config::ServerConfig;
pub use error::ServerError;
pub use protocol::*;
pub use seats::{ClientId, Seat, SeatError, SeatManager, SeatState};
pub use server::{Request, Server};
pub use transport::serve;
