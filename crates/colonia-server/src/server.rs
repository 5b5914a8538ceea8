//! The serialized request loop.
//!
//! Every state-mutating request goes through one `mpsc` channel and is handled
//! to completion before the next one is read. Network reads and writes run on
//! their own tasks. Crown offers are put to players by a worker task that waits
//! for the answer (or a timeout) off the loop and then queues the result back
//! through the same channel.

use std::collections::HashMap;
use std::time::Instant;

use colonia_core::{DecisionSource, PassiveDecisions};
use colonia_protocol::{
    Command, DecisionAnswer, DecisionRequest, MonarchAction, PlayerId, ResolvedDecision,
};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::game::{ApplyResult, DeltasByPlayer, GameState};
use crate::protocol::{ClientMessage, ServerMessage};
use crate::seats::{ClientId, SeatManager};

pub type Outbox = mpsc::UnboundedSender<ServerMessage>;

/// Everything the loop reacts to.
#[derive(Debug)]
pub enum Request {
    Connected { client: ClientId, outbox: Outbox },
    Message { client: ClientId, message: ClientMessage },
    Disconnected { client: ClientId },
    /// The monarch worker settled a crown offer.
    MonarchResolved {
        player: PlayerId,
        action: MonarchAction,
        accept: bool,
    },
    /// Periodic housekeeping (disconnect grace).
    Tick,
}

/// A submission parked until `waiting_on` answers.
#[derive(Clone, Debug)]
struct PendingSubmission {
    player: PlayerId,
    commands: Vec<Command>,
    answers: Vec<ResolvedDecision>,
    waiting_on: PlayerId,
}

pub struct Server {
    config: ServerConfig,
    game: GameState,
    seats: SeatManager,
    outboxes: HashMap<ClientId, Outbox>,
    pending: Option<PendingSubmission>,
    monarch_waiters: HashMap<(PlayerId, MonarchAction), oneshot::Sender<bool>>,
    requests: mpsc::UnboundedSender<Request>,
}

impl Server {
    pub fn new(config: ServerConfig, game: GameState, requests: mpsc::UnboundedSender<Request>) -> Self {
        let seats = SeatManager::new(game.human_seats(), config.disconnect_grace);
        Self {
            config,
            game,
            seats,
            outboxes: HashMap::new(),
            pending: None,
            monarch_waiters: HashMap::new(),
            requests,
        }
    }

    pub fn game(&self) -> &GameState {
        &self.game
    }

    pub fn seats(&self) -> &SeatManager {
        &self.seats
    }

    /// Handles one request to completion.
    pub fn handle(&mut self, request: Request) {
        let result = match request {
            Request::Connected { client, outbox } => {
                debug!(client, "client connected");
                self.outboxes.insert(client, outbox);
                Ok(())
            }
            Request::Message { client, message } => self.handle_client_message(client, message),
            Request::Disconnected { client } => self.handle_disconnect(client),
            Request::MonarchResolved {
                player,
                action,
                accept,
            } => {
                self.monarch_waiters.remove(&(player, action));
                let deltas = self.game.apply_monarch_answer(player, action, accept);
                self.broadcast_deltas(&deltas)
            }
            Request::Tick => self.handle_tick(Instant::now()),
        };
        if let Err(err) = result {
            error!(%err, "request failed");
        }
    }

    fn handle_client_message(&mut self, client: ClientId, message: ClientMessage) -> Result<(), ServerError> {
        let message = match message {
            ClientMessage::Join {
                player_name,
                reconnect_token,
            } => return self.handle_join(client, &player_name, reconnect_token.as_deref()),
            ClientMessage::Ping { timestamp } => {
                self.send(client, ServerMessage::Pong { timestamp });
                return Ok(());
            }
            other => other,
        };
        let Some(player) = self.seats.player_for_client(client) else {
            warn!(client, "message from a client without a seat");
            return Ok(());
        };

        match message {
            ClientMessage::Submit {
                commands,
                answers,
                state_checksum,
            } => {
                if self.pending.is_some() {
                    self.send(
                        client,
                        ServerMessage::SubmissionFailed {
                            index: 0,
                            message: "another submission is waiting for a decision".to_string(),
                        },
                    );
                    return Ok(());
                }
                let answers = answers
                    .into_iter()
                    .map(|answer| ResolvedDecision { player, answer })
                    .collect();
                let submission = PendingSubmission {
                    player,
                    commands,
                    answers,
                    waiting_on: player,
                };
                self.run_submission(submission, state_checksum)
            }
            ClientMessage::Answer { answer } => self.handle_answer(player, answer),
            ClientMessage::MonarchAnswer { action, accept } => {
                match self.monarch_waiters.remove(&(player, action)) {
                    // The worker forwards it back through the loop.
                    Some(waiter) => {
                        let _ = waiter.send(accept);
                        Ok(())
                    }
                    None => {
                        let deltas = self.game.apply_monarch_answer(player, action, accept);
                        self.broadcast_deltas(&deltas)
                    }
                }
            }
            ClientMessage::RequestState => self.send_game_state(player),
            ClientMessage::Join { .. } | ClientMessage::Ping { .. } => Ok(()),
        }
    }

    fn handle_join(&mut self, client: ClientId, name: &str, token: Option<&str>) -> Result<(), ServerError> {
        let joined = match token {
            Some(token) => self
                .seats
                .reconnect(client, token)
                .map(|player| (player, token.to_string())),
            None => self.seats.join(client, name),
        };
        let (player, reconnect_token) = match joined {
            Ok(joined) => joined,
            Err(err) => {
                info!(client, %err, "join rejected");
                self.send(
                    client,
                    ServerMessage::JoinRejected {
                        reason: err.to_string(),
                    },
                );
                return Ok(());
            }
        };
        info!(client, ?player, name, "seat taken");
        self.game.set_connected(player, true);
        self.game.set_ai_controlled(player, false);
        self.send(
            client,
            ServerMessage::JoinAccepted {
                player_id: player,
                reconnect_token,
            },
        );
        self.send_game_state(player)?;
        self.dispatch_monarch_offers();
        Ok(())
    }

    fn handle_answer(&mut self, player: PlayerId, answer: DecisionAnswer) -> Result<(), ServerError> {
        let Some(mut submission) = self.pending.take() else {
            debug!(?player, "answer without a pending decision");
            return Ok(());
        };
        if submission.waiting_on != player {
            debug!(?player, waiting_on = ?submission.waiting_on, "answer from the wrong player");
            self.pending = Some(submission);
            return Ok(());
        }
        submission.answers.push(ResolvedDecision { player, answer });
        self.run_submission(submission, 0)
    }

    /// Runs a submission; parks it if someone still has to answer.
    fn run_submission(&mut self, mut submission: PendingSubmission, checksum: u64) -> Result<(), ServerError> {
        let submitter = submission.player;
        loop {
            let result = self.game.apply_commands(
                submitter,
                &submission.commands,
                &submission.answers,
                checksum,
            )?;
            match result {
                ApplyResult::Success {
                    deltas_by_player,
                    turn_ended,
                } => {
                    debug!(?submitter, turn_ended, "submission applied");
                    // Deltas first, so the acknowledgement finds the replica current.
                    self.broadcast_deltas(&deltas_by_player)?;
                    self.send_to_player(submitter, ServerMessage::SubmissionAccepted);
                    self.dispatch_monarch_offers();
                    return Ok(());
                }
                ApplyResult::Rejected { index, reason } => {
                    self.send_to_player(submitter, ServerMessage::SubmissionRejected { index, reason });
                    return Ok(());
                }
                ApplyResult::Failed { index, message } => {
                    warn!(?submitter, index, %message, "submission failed");
                    self.send_to_player(submitter, ServerMessage::SubmissionFailed { index, message });
                    return Ok(());
                }
                ApplyResult::DesyncDetected { expected, received } => {
                    warn!(?submitter, expected, received, "desync detected");
                    self.send_to_player(submitter, ServerMessage::DesyncDetected { expected, received });
                    if self.config.force_resync_on_desync {
                        self.send_game_state(submitter)?;
                    }
                    return Ok(());
                }
                ApplyResult::DecisionNeeded {
                    player, request, ..
                } => {
                    if self.seats.is_connected(player) {
                        debug!(?submitter, asked = ?player, "submission waiting for a decision");
                        if player != submitter {
                            self.send_to_player(submitter, ServerMessage::AwaitingDecision { player });
                        }
                        self.send_to_player(player, ServerMessage::DecisionNeeded { request });
                        submission.waiting_on = player;
                        self.pending = Some(submission);
                        return Ok(());
                    }
                    // Nobody at that seat to ask.
                    let Some(answer) = PassiveDecisions.decide(player, &request) else {
                        self.send_to_player(
                            submitter,
                            ServerMessage::SubmissionFailed {
                                index: 0,
                                message: format!("{player:?} cannot answer {request:?}"),
                            },
                        );
                        return Ok(());
                    };
                    submission.answers.push(ResolvedDecision { player, answer });
                }
            }
        }
    }

    fn handle_disconnect(&mut self, client: ClientId) -> Result<(), ServerError> {
        self.outboxes.remove(&client);
        let Some(player) = self.seats.disconnect(client) else {
            return Ok(());
        };
        info!(client, ?player, "seat dropped");
        self.game.set_connected(player, false);

        if let Some(submission) = self.pending.take() {
            if submission.player == player {
                debug!(?player, "dropping the disconnected player's submission");
            } else if submission.waiting_on == player {
                // Re-run; the seat is gone, so the passive answer applies.
                self.run_submission(submission, 0)?;
            } else {
                self.pending = Some(submission);
            }
        }

        let deltas = self.game.force_end_turn(player);
        self.broadcast_deltas(&deltas)
    }

    fn handle_tick(&mut self, now: Instant) -> Result<(), ServerError> {
        let takeovers = self.seats.process_disconnections(now);
        if takeovers.is_empty() {
            return Ok(());
        }
        let mut deltas = DeltasByPlayer::new();
        for player in takeovers {
            info!(?player, "seat handed to the AI");
            self.game.set_ai_controlled(player, true);
        }
        self.game.run_automatic_turns(&mut deltas);
        self.broadcast_deltas(&deltas)
    }

    /// Puts new crown offers to their players through worker tasks.
    fn dispatch_monarch_offers(&mut self) {
        for (player, action, request) in self.game.pending_monarch_requests() {
            if self.monarch_waiters.contains_key(&(player, action)) {
                continue;
            }
            let Some(client) = self.seats.client_for_player(player) else {
                continue;
            };
            let (reply, waiting) = oneshot::channel();
            self.monarch_waiters.insert((player, action), reply);
            let fallback = default_monarch_answer(player, &request);
            self.send(client, ServerMessage::DecisionNeeded { request });

            let requests = self.requests.clone();
            let timeout = self.config.monarch_reply_timeout;
            tokio::spawn(async move {
                let accept = match tokio::time::timeout(timeout, waiting).await {
                    Ok(Ok(accept)) => accept,
                    Ok(Err(_)) | Err(_) => {
                        debug!(?player, ?action, "no crown answer, using the default");
                        fallback
                    }
                };
                let _ = requests.send(Request::MonarchResolved {
                    player,
                    action,
                    accept,
                });
            });
        }
    }

    fn send_game_state(&mut self, player: PlayerId) -> Result<(), ServerError> {
        let view = self.game.view_for(player);
        let checksum = self.game.checksum_for(player)?;
        self.send_to_player(player, ServerMessage::GameState { view, checksum });
        Ok(())
    }

    fn broadcast_deltas(&mut self, deltas_by_player: &DeltasByPlayer) -> Result<(), ServerError> {
        for (player, deltas) in deltas_by_player {
            if deltas.is_empty() || self.seats.client_for_player(*player).is_none() {
                continue;
            }
            let checksum = self.game.checksum_for(*player)?;
            self.send_to_player(
                *player,
                ServerMessage::StateDelta {
                    deltas: deltas.clone(),
                    checksum,
                },
            );
        }
        Ok(())
    }

    fn send_to_player(&mut self, player: PlayerId, message: ServerMessage) {
        if let Some(client) = self.seats.client_for_player(player) {
            self.send(client, message);
        }
    }

    fn send(&mut self, client: ClientId, message: ServerMessage) {
        let Some(outbox) = self.outboxes.get(&client) else {
            return;
        };
        if outbox.send(message).is_err() {
            debug!(client, "outbox closed");
            self.outboxes.remove(&client);
        }
    }
}

fn default_monarch_answer(player: PlayerId, request: &DecisionRequest) -> bool {
    PassiveDecisions
        .decide(player, request)
        .and_then(|a| a.as_confirm())
        .unwrap_or(false)
}

/// Drains the request channel until every sender is gone.
pub async fn run(mut server: Server, mut requests: mpsc::UnboundedReceiver<Request>) {
    while let Some(request) = requests.recv().await {
        server.handle(request);
    }
    info!("request loop stopped");
}
