//! Seat management: which connection plays which human player.
//!
//! Seats come from the world's human players. A seat survives its connection;
//! after the grace period a disconnected seat is handed to the AI until the
//! owner reconnects with their token.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use colonia_protocol::PlayerId;
use rand::Rng;
use thiserror::Error;

pub type ClientId = u64;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SeatState {
    /// Nobody has claimed the seat yet.
    Open,
    Connected { since: Instant },
    /// Dropped, still within the grace period.
    Disconnected { since: Instant },
    AiControlled,
}

#[derive(Clone, Debug)]
pub struct Seat {
    pub player: PlayerId,
    pub name: String,
    pub client: Option<ClientId>,
    pub token: Option<String>,
    pub state: SeatState,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SeatError {
    #[error("no open seat")]
    NoOpenSeat,
    #[error("client already holds a seat")]
    AlreadySeated,
    #[error("invalid reconnect token")]
    InvalidToken,
    #[error("seat is already connected")]
    AlreadyConnected,
}

pub struct SeatManager {
    seats: HashMap<PlayerId, Seat>,
    clients: HashMap<ClientId, PlayerId>,
    tokens: HashMap<String, PlayerId>,
    disconnect_grace: Duration,
}

impl SeatManager {
    pub fn new(humans: impl IntoIterator<Item = (PlayerId, String)>, disconnect_grace: Duration) -> Self {
        let seats = humans
            .into_iter()
            .map(|(player, name)| {
                let seat = Seat {
                    player,
                    name,
                    client: None,
                    token: None,
                    state: SeatState::Open,
                };
                (player, seat)
            })
            .collect();
        Self {
            seats,
            clients: HashMap::new(),
            tokens: HashMap::new(),
            disconnect_grace,
        }
    }

    /// Claims the open seat named `name`, or the lowest open seat otherwise.
    pub fn join(&mut self, client: ClientId, name: &str) -> Result<(PlayerId, String), SeatError> {
        if self.clients.contains_key(&client) {
            return Err(SeatError::AlreadySeated);
        }
        let mut open: Vec<&Seat> = self
            .seats
            .values()
            .filter(|s| s.state == SeatState::Open)
            .collect();
        open.sort_by_key(|s| (s.name != name, s.player));
        let player = open.first().map(|s| s.player).ok_or(SeatError::NoOpenSeat)?;

        let token = generate_token();
        let seat = self.seats.get_mut(&player).ok_or(SeatError::NoOpenSeat)?;
        seat.client = Some(client);
        seat.token = Some(token.clone());
        seat.state = SeatState::Connected {
            since: Instant::now(),
        };
        self.clients.insert(client, player);
        self.tokens.insert(token.clone(), player);
        Ok((player, token))
    }

    /// Returns a dropped or AI-controlled seat to its owner.
    pub fn reconnect(&mut self, client: ClientId, token: &str) -> Result<PlayerId, SeatError> {
        let player = self.tokens.get(token).copied().ok_or(SeatError::InvalidToken)?;
        let seat = self.seats.get_mut(&player).ok_or(SeatError::InvalidToken)?;
        match seat.state {
            SeatState::Connected { .. } => Err(SeatError::AlreadyConnected),
            SeatState::Open => Err(SeatError::InvalidToken),
            SeatState::Disconnected { .. } | SeatState::AiControlled => {
                seat.client = Some(client);
                seat.state = SeatState::Connected {
                    since: Instant::now(),
                };
                self.clients.insert(client, player);
                Ok(player)
            }
        }
    }

    pub fn disconnect(&mut self, client: ClientId) -> Option<PlayerId> {
        let player = self.clients.remove(&client)?;
        let seat = self.seats.get_mut(&player)?;
        seat.client = None;
        if matches!(seat.state, SeatState::Connected { .. }) {
            seat.state = SeatState::Disconnected {
                since: Instant::now(),
            };
        }
        Some(player)
    }

    /// Hands seats whose grace period ran out to the AI.
    pub fn process_disconnections(&mut self, now: Instant) -> Vec<PlayerId> {
        let mut takeovers = Vec::new();
        for seat in self.seats.values_mut() {
            if let SeatState::Disconnected { since } = seat.state {
                if now.duration_since(since) >= self.disconnect_grace {
                    seat.state = SeatState::AiControlled;
                    takeovers.push(seat.player);
                }
            }
        }
        takeovers.sort();
        takeovers
    }

    pub fn player_for_client(&self, client: ClientId) -> Option<PlayerId> {
        self.clients.get(&client).copied()
    }

    pub fn client_for_player(&self, player: PlayerId) -> Option<ClientId> {
        self.seats.get(&player).and_then(|s| s.client)
    }

    pub fn seat(&self, player: PlayerId) -> Option<&Seat> {
        self.seats.get(&player)
    }

    pub fn is_connected(&self, player: PlayerId) -> bool {
        self.seats
            .get(&player)
            .is_some_and(|s| matches!(s.state, SeatState::Connected { .. }))
    }

    pub fn is_ai_controlled(&self, player: PlayerId) -> bool {
        self.seats
            .get(&player)
            .is_some_and(|s| s.state == SeatState::AiControlled)
    }
}

fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    (0..32)
        .map(|_| {
            let idx = rng.gen_range(0..36u8);
            if idx < 10 {
                (b'0' + idx) as char
            } else {
                (b'a' + idx - 10) as char
            }
        })
        .collect()
}
