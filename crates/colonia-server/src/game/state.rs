//! Server-authoritative game state.
//!
//! `colonia-server` owns seats, connections and the request loop; the
//! simulation itself lives in `colonia-core::GameEngine`. This module wraps the
//! engine and exposes:
//! - visibility-filtered views with a per-player checksum
//! - atomic application of a whole submission
//! - per-player deltas materialised from each command's change set
//! - the automatic turn flow for seats without a human at the controls

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use colonia_core::{
    generate_world, load_rules, ChangeSet, DecisionSource, GameEngine, GameError, GameOptions,
    Layered, MapConfig, PassiveDecisions, PendingMonarch, RulesSource, ScriptedDecisions, SeatSpec,
};
use colonia_protocol::wire::{view_hash, WireError};
use colonia_protocol::{
    Command, DecisionRequest, Delta, MonarchAction, PlayerId, Rejection, ResolvedDecision,
    WorldView,
};
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;

pub type DeltasByPlayer = BTreeMap<PlayerId, Vec<Delta>>;

/// Result of validating and applying a submission.
#[derive(Debug, PartialEq)]
pub enum ApplyResult {
    /// Every command applied.
    Success {
        deltas_by_player: DeltasByPlayer,
        turn_ended: bool,
    },
    /// Command `index` is illegal; nothing was applied.
    Rejected { index: usize, reason: Rejection },
    /// Command `index` needs an answer from `player`. Nothing was applied; the
    /// submission is re-run once the answer arrives.
    DecisionNeeded {
        index: usize,
        player: PlayerId,
        request: DecisionRequest,
    },
    /// Command `index` broke an invariant; nothing was applied.
    Failed { index: usize, message: String },
    DesyncDetected { expected: u64, received: u64 },
}

/// Server game state with validation and checksum support.
#[derive(Debug)]
pub struct GameState {
    engine: GameEngine,
    /// Human seats currently played by the server.
    ai_seats: BTreeSet<PlayerId>,
}

impl GameState {
    pub fn new(engine: GameEngine) -> Self {
        Self {
            engine,
            ai_seats: BTreeSet::new(),
        }
    }

    /// Generates a fresh game from the server configuration.
    pub fn from_config(config: &ServerConfig) -> Result<Self, ServerError> {
        let rules = match &config.rules_path {
            Some(path) => load_rules(RulesSource::Path(path.clone()))?,
            None => load_rules(RulesSource::Embedded)?,
        };
        let options = match &config.options_path {
            Some(path) => GameOptions::load(path)?,
            None => GameOptions::default(),
        };
        let map = MapConfig {
            width: config.map.width,
            height: config.map.height,
            settlements_per_tribe: config.map.settlements_per_tribe,
            rumour_pct: config.map.rumour_pct,
            starting_gold: config.map.starting_gold,
        };
        let seats: Vec<SeatSpec> = config
            .seats
            .iter()
            .map(|s| SeatSpec {
                name: s.name.clone(),
                kind: s.kind,
                human: s.human,
            })
            .collect();
        let world = generate_world(Arc::new(rules), options, &map, &seats, config.seed)?;
        info!(
            players = seats.len(),
            width = map.width,
            height = map.height,
            seed = config.seed,
            "game generated"
        );
        Ok(Self::new(GameEngine::new(world)))
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn turn_number(&self) -> u32 {
        self.engine.world().turn
    }

    pub fn current_player(&self) -> PlayerId {
        self.engine.current_player()
    }

    pub fn is_game_over(&self) -> bool {
        self.engine.world().game_over.is_some()
    }

    /// Human players, by id and name, for seating.
    pub fn human_seats(&self) -> Vec<(PlayerId, String)> {
        self.engine
            .world()
            .players
            .iter()
            .filter(|p| p.human)
            .map(|p| (p.id, p.name.clone()))
            .collect()
    }

    pub fn view_for(&self, player: PlayerId) -> WorldView {
        self.engine.world().view(Some(player))
    }

    /// Hash of what `player` is allowed to know. Clients echo the last one
    /// they received so stale submissions are caught before they apply.
    pub fn checksum_for(&self, player: PlayerId) -> Result<u64, WireError> {
        view_hash(&self.view_for(player))
    }

    pub fn set_connected(&mut self, player: PlayerId, connected: bool) {
        if let Ok(p) = self.engine.world_mut().player_mut(player) {
            p.connected = connected;
        }
    }

    /// Hands a human seat to the server or gives it back. A server-played
    /// seat counts as present, so the turn order stops skipping it.
    pub fn set_ai_controlled(&mut self, player: PlayerId, ai: bool) {
        if ai {
            self.ai_seats.insert(player);
            self.set_connected(player, true);
        } else {
            self.ai_seats.remove(&player);
        }
    }

    pub fn is_ai(&self, player: PlayerId) -> bool {
        self.ai_seats.contains(&player)
            || self
                .engine
                .world()
                .player(player)
                .is_ok_and(|p| !p.human)
    }

    fn ai_players(&self) -> Vec<PlayerId> {
        self.engine
            .world()
            .player_ids()
            .into_iter()
            .filter(|p| self.is_ai(*p))
            .collect()
    }

    /// Applies a submission as one unit: either every command commits or none.
    pub fn apply_commands(
        &mut self,
        player: PlayerId,
        commands: &[Command],
        answers: &[ResolvedDecision],
        client_checksum: u64,
    ) -> Result<ApplyResult, ServerError> {
        if client_checksum != 0 {
            let expected = self.checksum_for(player)?;
            if expected != client_checksum {
                return Ok(ApplyResult::DesyncDetected {
                    expected,
                    received: client_checksum,
                });
            }
        }

        // EndTurn at most once, and only as the final command.
        if let Some(index) = commands
            .iter()
            .position(|c| matches!(c, Command::EndTurn))
            .filter(|i| i + 1 != commands.len())
        {
            return Ok(ApplyResult::Failed {
                index,
                message: "EndTurn must be the final command in a submission".to_string(),
            });
        }
        let turn_ended = matches!(commands.last(), Some(Command::EndTurn));

        let mut scripted = ScriptedDecisions::from_resolved(answers);
        let mut passive = PassiveDecisions;
        let mut decisions = Layered {
            first: &mut scripted,
            second: &mut passive,
            fallback_for: self.ai_players(),
        };

        let mut scratch = self.engine.clone();
        let mut deltas_by_player = DeltasByPlayer::new();
        for (index, command) in commands.iter().enumerate() {
            match scratch.apply(player, command, &mut decisions) {
                Ok(cs) => collect_deltas(&scratch, &cs, &mut deltas_by_player),
                Err(GameError::Rejected(reason)) => {
                    debug!(?player, index, %reason, "submission rejected");
                    return Ok(ApplyResult::Rejected { index, reason });
                }
                Err(GameError::DecisionRequired {
                    player: asked,
                    request,
                }) => {
                    return Ok(ApplyResult::DecisionNeeded {
                        index,
                        player: asked,
                        request,
                    });
                }
                Err(err) => {
                    return Ok(ApplyResult::Failed {
                        index,
                        message: err.to_string(),
                    });
                }
            }
        }

        // Commit.
        self.engine = scratch;
        if turn_ended {
            self.run_automatic_turns(&mut deltas_by_player);
        }
        Ok(ApplyResult::Success {
            deltas_by_player,
            turn_ended,
        })
    }

    /// Ends turns for server-played seats until a human is to move, and
    /// settles crown offers made to them.
    pub fn run_automatic_turns(&mut self, deltas: &mut DeltasByPlayer) {
        let limit = self.engine.world().players.len() + 1;
        for _ in 0..limit {
            self.settle_ai_monarch(deltas);
            let current = self.current_player();
            if self.is_game_over() || !self.is_ai(current) {
                return;
            }
            debug!(player = ?current, "automatic end of turn");
            if let Err(err) = self.apply_with_passive(current, &Command::EndTurn, deltas) {
                warn!(player = ?current, %err, "automatic end of turn failed");
                return;
            }
        }
    }

    /// Ends the current player's turn on their behalf (disconnect, AI takeover).
    pub fn force_end_turn(&mut self, player: PlayerId) -> DeltasByPlayer {
        let mut deltas = DeltasByPlayer::new();
        if self.is_game_over() || self.current_player() != player {
            return deltas;
        }
        info!(?player, "forcing end of turn");
        match self.apply_with_passive(player, &Command::EndTurn, &mut deltas) {
            Ok(()) => self.run_automatic_turns(&mut deltas),
            Err(err) => warn!(?player, %err, "forced end of turn failed"),
        }
        deltas
    }

    /// Crown offers waiting on human players who are not server-played.
    pub fn pending_monarch_requests(&self) -> Vec<(PlayerId, MonarchAction, DecisionRequest)> {
        self.engine
            .world()
            .players
            .iter()
            .filter(|p| !p.dead && !self.is_ai(p.id))
            .flat_map(|p| {
                p.pending_monarch
                    .iter()
                    .map(move |m: &PendingMonarch| (p.id, m.action(), m.request()))
            })
            .collect()
    }

    /// Applies the answer to a crown offer. An offer that is no longer pending
    /// is ignored.
    pub fn apply_monarch_answer(
        &mut self,
        player: PlayerId,
        action: MonarchAction,
        accept: bool,
    ) -> DeltasByPlayer {
        let mut deltas = DeltasByPlayer::new();
        let command = Command::AnswerMonarch { action, accept };
        match self.apply_with_passive(player, &command, &mut deltas) {
            Ok(()) => {}
            Err(GameError::Rejected(Rejection::NoPendingMonarchAction)) => {
                debug!(?player, ?action, "crown offer already settled");
            }
            Err(err) => warn!(?player, ?action, %err, "crown answer failed"),
        }
        deltas
    }

    fn settle_ai_monarch(&mut self, deltas: &mut DeltasByPlayer) {
        let offers: Vec<(PlayerId, MonarchAction, DecisionRequest)> = self
            .engine
            .world()
            .players
            .iter()
            .filter(|p| !p.dead && self.is_ai(p.id))
            .flat_map(|p| p.pending_monarch.iter().map(move |m| (p.id, m.action(), m.request())))
            .collect();
        for (player, action, request) in offers {
            let accept = PassiveDecisions
                .decide(player, &request)
                .and_then(|a| a.as_confirm())
                .unwrap_or(false);
            let command = Command::AnswerMonarch { action, accept };
            if let Err(err) = self.apply_with_passive(player, &command, deltas) {
                warn!(?player, ?action, %err, "automatic crown answer failed");
            }
        }
    }

    fn apply_with_passive(
        &mut self,
        player: PlayerId,
        command: &Command,
        deltas: &mut DeltasByPlayer,
    ) -> Result<(), GameError> {
        let cs = self.engine.apply(player, command, &mut PassiveDecisions)?;
        collect_deltas(&self.engine, &cs, deltas);
        Ok(())
    }
}

/// Materialises one change set for every living player, against the world as
/// it stands right after the command that produced it.
fn collect_deltas(engine: &GameEngine, cs: &ChangeSet, out: &mut DeltasByPlayer) {
    let world = engine.world();
    for player in world.players.iter().filter(|p| !p.dead) {
        let deltas = cs.build(world, player.id);
        if !deltas.is_empty() {
            out.entry(player.id).or_default().extend(deltas);
        }
    }
}
