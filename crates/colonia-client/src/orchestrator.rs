//! Turns local intents into server submissions and server messages into
//! replica updates.
//!
//! Decisions the server asks for are offered to a [`DecisionSource`] first
//! (an AI, or canned answers); anything it declines is surfaced as a
//! [`ClientEvent::DecisionNeeded`] for the presentation layer.

use std::collections::{BTreeSet, VecDeque};

use colonia_core::DecisionSource;
use colonia_protocol::{
    monarch_request_action, Command, DecisionAnswer, DecisionRequest, Direction, Location, Notice,
    PlayerId, Position, Rejection, Terrain, UnitId, UnitState,
};
use colonia_server::{ClientMessage, ServerMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::replica::Replica;

/// Where outgoing messages go.
pub trait Gateway {
    fn send(&mut self, message: ClientMessage) -> Result<(), ClientError>;
}

impl Gateway for mpsc::UnboundedSender<ClientMessage> {
    fn send(&mut self, message: ClientMessage) -> Result<(), ClientError> {
        mpsc::UnboundedSender::send(self, message).map_err(|_| ClientError::Closed)
    }
}

/// How far the current turn has progressed on this client.
///
/// Only ever narrows within a turn (`narrow` takes the maximum) and resets to
/// `NextActiveUnit` when a new turn starts, so a late goto pass can never run
/// after the player asked to end the turn.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum MoveMode {
    #[default]
    NextActiveUnit,
    ExecuteGotoOrders,
    EndTurn,
}

impl MoveMode {
    pub fn narrow(self, other: MoveMode) -> MoveMode {
        self.max(other)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClientEvent {
    Joined {
        player: PlayerId,
    },
    JoinRejected {
        reason: String,
    },
    StateReplaced,
    TurnStarted {
        turn: u32,
        player: PlayerId,
    },
    Notice(Notice),
    Accepted,
    Rejected {
        index: usize,
        reason: Rejection,
    },
    Failed {
        index: usize,
        message: String,
    },
    DecisionNeeded(DecisionRequest),
    WaitingFor(PlayerId),
    Desync {
        expected: u64,
        received: u64,
    },
    /// A move was accepted but the unit did not end up where it should have.
    UnitSkipped(UnitId),
    GameOver,
}

/// A plain step onto an empty tile must leave the unit on that tile.
#[derive(Clone, Copy, Debug)]
struct MoveExpectation {
    unit: UnitId,
    target: Position,
}

pub struct Orchestrator<G> {
    gateway: G,
    decider: Box<dyn DecisionSource + Send>,
    player: Option<PlayerId>,
    reconnect_token: Option<String>,
    replica: Option<Replica>,
    mode: MoveMode,
    in_flight: bool,
    expectations: Vec<MoveExpectation>,
    /// Units skipped locally for the rest of the turn.
    skipped: BTreeSet<UnitId>,
    pending_decision: Option<DecisionRequest>,
    resync_on_drift: bool,
    events: VecDeque<ClientEvent>,
}

impl<G: Gateway> Orchestrator<G> {
    pub fn new(gateway: G, decider: Box<dyn DecisionSource + Send>) -> Self {
        Self {
            gateway,
            decider,
            player: None,
            reconnect_token: None,
            replica: None,
            mode: MoveMode::default(),
            in_flight: false,
            expectations: Vec::new(),
            skipped: BTreeSet::new(),
            pending_decision: None,
            resync_on_drift: false,
            events: VecDeque::new(),
        }
    }

    /// Compare the replica's own hash with the server's after every batch and
    /// ask for a full state when they differ.
    pub fn with_resync_on_drift(mut self, enabled: bool) -> Self {
        self.resync_on_drift = enabled;
        self
    }

    pub fn player(&self) -> Option<PlayerId> {
        self.player
    }

    pub fn reconnect_token(&self) -> Option<&str> {
        self.reconnect_token.as_deref()
    }

    pub fn replica(&self) -> Option<&Replica> {
        self.replica.as_ref()
    }

    pub fn move_mode(&self) -> MoveMode {
        self.mode
    }

    pub fn pending_decision(&self) -> Option<&DecisionRequest> {
        self.pending_decision.as_ref()
    }

    pub fn take_events(&mut self) -> Vec<ClientEvent> {
        self.events.drain(..).collect()
    }

    /// Asks for a seat, reusing the reconnect token if we had one.
    pub fn join(&mut self, name: &str) -> Result<(), ClientError> {
        self.gateway.send(ClientMessage::Join {
            player_name: name.to_string(),
            reconnect_token: self.reconnect_token.clone(),
        })
    }

    pub fn request_state(&mut self) -> Result<(), ClientError> {
        self.gateway.send(ClientMessage::RequestState)
    }

    /// Lowest-id unit of ours that can still act this turn.
    pub fn next_active_unit(&self) -> Option<UnitId> {
        if self.mode > MoveMode::NextActiveUnit {
            return None;
        }
        let replica = self.replica.as_ref()?;
        let me = self.player?;
        replica
            .view()
            .units
            .iter()
            .filter(|u| u.owner == me && u.state == UnitState::Active)
            .filter(|u| u.moves_left.unwrap_or(0) > 0)
            .filter(|u| !self.skipped.contains(&u.id))
            .map(|u| u.id)
            .min()
    }

    pub fn skip_unit(&mut self, unit: UnitId) {
        self.skipped.insert(unit);
    }

    pub fn move_unit(&mut self, unit: UnitId, direction: Direction) -> Result<(), ClientError> {
        self.ensure_can_act(MoveMode::NextActiveUnit)?;
        let expectation = self.plain_step(unit, direction)?;
        self.submit(vec![Command::MoveUnit { unit, direction }])?;
        self.expectations.extend(expectation);
        Ok(())
    }

    /// Submits arbitrary intents for the current turn.
    pub fn perform(&mut self, commands: Vec<Command>) -> Result<(), ClientError> {
        self.ensure_can_act(MoveMode::NextActiveUnit)?;
        self.submit(commands)
    }

    pub fn execute_goto_orders(&mut self) -> Result<(), ClientError> {
        self.ensure_can_act(MoveMode::ExecuteGotoOrders)?;
        self.mode = self.mode.narrow(MoveMode::ExecuteGotoOrders);
        self.submit(vec![Command::ExecuteGotoOrders])
    }

    pub fn end_turn(&mut self) -> Result<(), ClientError> {
        self.ensure_can_act(MoveMode::EndTurn)?;
        self.mode = self.mode.narrow(MoveMode::EndTurn);
        self.submit(vec![Command::EndTurn])
    }

    /// Answers the decision the decider could not.
    pub fn answer(&mut self, answer: DecisionAnswer) -> Result<(), ClientError> {
        let request = self
            .pending_decision
            .take()
            .ok_or(ClientError::NoPendingDecision)?;
        self.reply(&request, answer)
    }

    pub fn handle(&mut self, message: ServerMessage) -> Result<(), ClientError> {
        match message {
            ServerMessage::JoinAccepted {
                player_id,
                reconnect_token,
            } => {
                info!(player = ?player_id, "joined");
                self.player = Some(player_id);
                self.reconnect_token = Some(reconnect_token);
                self.events.push_back(ClientEvent::Joined { player: player_id });
            }
            ServerMessage::JoinRejected { reason } => {
                warn!(%reason, "join rejected");
                self.events.push_back(ClientEvent::JoinRejected { reason });
            }
            ServerMessage::GameState { view, checksum } => {
                let (turn, player) = (view.turn, view.current_player);
                let new_turn = self
                    .replica
                    .as_ref()
                    .is_none_or(|r| (r.view().turn, r.view().current_player) != (turn, player));
                match self.replica.as_mut() {
                    Some(replica) => replica.reset(view, checksum),
                    None => self.replica = Some(Replica::new(view, checksum)),
                }
                self.events.push_back(ClientEvent::StateReplaced);
                if new_turn {
                    self.start_turn(turn, player);
                }
            }
            ServerMessage::StateDelta { deltas, checksum } => self.apply_deltas(&deltas, checksum)?,
            ServerMessage::SubmissionAccepted => {
                self.in_flight = false;
                self.check_expectations()?;
                self.events.push_back(ClientEvent::Accepted);
            }
            ServerMessage::SubmissionRejected { index, reason } => {
                debug!(index, ?reason, "submission rejected");
                self.in_flight = false;
                self.expectations.clear();
                self.events.push_back(ClientEvent::Rejected { index, reason });
            }
            ServerMessage::SubmissionFailed { index, message } => {
                warn!(index, %message, "submission failed");
                self.in_flight = false;
                self.expectations.clear();
                self.events.push_back(ClientEvent::Failed { index, message });
            }
            ServerMessage::DecisionNeeded { request } => {
                let me = self.player.ok_or(ClientError::NotJoined)?;
                match self.decider.decide(me, &request) {
                    Some(answer) => self.reply(&request, answer)?,
                    None => {
                        self.pending_decision = Some(request.clone());
                        self.events.push_back(ClientEvent::DecisionNeeded(request));
                    }
                }
            }
            ServerMessage::AwaitingDecision { player } => {
                self.events.push_back(ClientEvent::WaitingFor(player));
            }
            ServerMessage::DesyncDetected { expected, received } => {
                warn!(expected, received, "server reported a desync");
                self.in_flight = false;
                self.expectations.clear();
                self.events.push_back(ClientEvent::Desync { expected, received });
                self.request_state()?;
            }
            ServerMessage::Pong { timestamp } => debug!(timestamp, "pong"),
        }
        Ok(())
    }

    fn apply_deltas(&mut self, deltas: &[colonia_protocol::Delta], checksum: u64) -> Result<(), ClientError> {
        let replica = self.replica.as_mut().ok_or(ClientError::NoState)?;
        let applied = replica.apply(deltas, checksum);
        let (turn, player) = (replica.view().turn, replica.view().current_player);
        let drift = if self.resync_on_drift {
            let local = replica.local_checksum()?;
            (local != checksum).then_some(local)
        } else {
            None
        };

        self.events
            .extend(applied.notices.into_iter().map(ClientEvent::Notice));
        if applied.turn_changed {
            self.start_turn(turn, player);
        }
        if applied.game_ended {
            self.events.push_back(ClientEvent::GameOver);
        }
        if let Some(local) = drift {
            debug!(local, server = checksum, "replica drifted, resyncing");
            self.events.push_back(ClientEvent::Desync {
                expected: checksum,
                received: local,
            });
            self.request_state()?;
        }
        Ok(())
    }

    fn start_turn(&mut self, turn: u32, player: PlayerId) {
        self.mode = MoveMode::default();
        self.skipped.clear();
        self.events.push_back(ClientEvent::TurnStarted { turn, player });
    }

    fn check_expectations(&mut self) -> Result<(), ClientError> {
        let replica = self.replica.as_ref().ok_or(ClientError::NoState)?;
        let mut drifted = Vec::new();
        for expectation in self.expectations.drain(..) {
            if replica.unit_position(expectation.unit) != Some(expectation.target) {
                warn!(unit = ?expectation.unit, target = ?expectation.target, "unit is not where the move put it");
                drifted.push(expectation.unit);
            }
        }
        if drifted.is_empty() {
            return Ok(());
        }
        for unit in drifted {
            self.skipped.insert(unit);
            self.events.push_back(ClientEvent::UnitSkipped(unit));
        }
        if self.resync_on_drift {
            self.request_state()?;
        }
        Ok(())
    }

    fn ensure_can_act(&self, wanted: MoveMode) -> Result<(), ClientError> {
        let replica = self.replica.as_ref().ok_or(ClientError::NoState)?;
        if self.player.is_none() {
            return Err(ClientError::NotJoined);
        }
        if !replica.is_our_turn() {
            return Err(ClientError::NotYourTurn);
        }
        if self.mode > wanted {
            return Err(ClientError::TurnEnding);
        }
        if self.in_flight {
            return Err(ClientError::SubmissionInFlight);
        }
        Ok(())
    }

    /// The target tile if this move can only be an ordinary step.
    fn plain_step(&self, unit: UnitId, direction: Direction) -> Result<Option<MoveExpectation>, ClientError> {
        let replica = self.replica.as_ref().ok_or(ClientError::NoState)?;
        let snapshot = replica.unit(unit).ok_or(ClientError::UnknownUnit(unit))?;
        let Location::Tile { position } = snapshot.location else {
            return Ok(None);
        };
        let target = position.step(direction);
        let (Some(from), Some(to)) = (replica.tile(position), replica.tile(target)) else {
            return Ok(None);
        };
        let plain = snapshot.moves_left.unwrap_or(0) > 0
            && from.terrain.is_water() == to.terrain.is_water()
            && to.terrain != Terrain::HighSeas
            && !to.rumour
            && to.settlement.is_none()
            && replica.settlement_at(target).is_none()
            && replica.units_at(target).next().is_none();
        Ok(plain.then_some(MoveExpectation { unit, target }))
    }

    fn submit(&mut self, commands: Vec<Command>) -> Result<(), ClientError> {
        let replica = self.replica.as_ref().ok_or(ClientError::NoState)?;
        let state_checksum = replica.server_checksum();
        self.gateway.send(ClientMessage::Submit {
            commands,
            answers: Vec::new(),
            state_checksum,
        })?;
        self.in_flight = true;
        Ok(())
    }

    fn reply(&mut self, request: &DecisionRequest, answer: DecisionAnswer) -> Result<(), ClientError> {
        match monarch_request_action(request) {
            Some(action) => self.gateway.send(ClientMessage::MonarchAnswer {
                action,
                accept: answer.as_confirm().unwrap_or(false),
            }),
            None => self.gateway.send(ClientMessage::Answer { answer }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn move_mode_only_narrows() {
        let mode = MoveMode::NextActiveUnit.narrow(MoveMode::EndTurn);
        assert_eq!(mode, MoveMode::EndTurn);
        assert_eq!(mode.narrow(MoveMode::ExecuteGotoOrders), MoveMode::EndTurn);
        assert_eq!(
            MoveMode::ExecuteGotoOrders.narrow(MoveMode::NextActiveUnit),
            MoveMode::ExecuteGotoOrders
        );
    }
}
