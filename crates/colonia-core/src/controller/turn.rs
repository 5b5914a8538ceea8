//! End of turn, the yearly round, the crown, founding fathers and independence.

use std::collections::BTreeMap;

use colonia_protocol::{
    FatherCategory, FatherId, Location, MonarchAction, Notice, ObjectId, PlayerId, PlayerKind,
    Position, PrivatePatch, PublicPatch, Rejection, Stance, Terrain, UnitRole, UnitState,
    UnitTypeId, VictoryReason,
};
use tracing::{debug, info};

use crate::change::{ChangeSet, See};
use crate::controller::GameEngine;
use crate::decision::DecisionSource;
use crate::error::{reject, GameError};
use crate::rules::{Expertise, FatherEffect};
use crate::world::{PendingMonarch, Settlement};

/// Turns at which founding-father offers move to the middle and late ages.
const MIDDLE_AGE_TURN: u32 = 60;
const LATE_AGE_TURN: u32 = 120;

/// Outcome of the victory conditions enabled in the game options.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VictoryCheck {
    pub winner: Option<PlayerId>,
    pub reason: VictoryReason,
}

impl GameEngine {
    pub(super) fn end_turn(
        &mut self,
        player: PlayerId,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.execute_goto_orders(player, decisions, cs)?;
        let closed = self.sessions.close_all_for_player(&mut self.world, player);
        if closed > 0 {
            debug!(?player, closed, "expired trade sessions");
        }

        self.grant_independence(cs)?;
        self.check_deaths(cs)?;
        if let Some(victory) = self.check_victory() {
            info!(winner = ?victory.winner, reason = ?victory.reason, "game over");
            self.world.game_over = Some((victory.winner, victory.reason));
            cs.add_game_ended(victory.winner, victory.reason);
            return Ok(());
        }

        let next = self.advance(player, cs)?;
        self.world.current_player = next;
        self.start_turn(next, cs)?;
        cs.add_turn_changed(self.world.turn, next);
        Ok(())
    }

    /// Finds the next player to move, running the yearly round on wraparound.
    /// Makes a single pass over the table; when every living seat is skipped
    /// the first one after `player` moves anyway.
    fn advance(&mut self, player: PlayerId, cs: &mut ChangeSet) -> Result<PlayerId, GameError> {
        let count = self.world.players.len();
        if count == 0 {
            return Err(GameError::Invariant("no players".into()));
        }
        let mut index = player.index();
        let mut fallback = None;
        for _ in 0..count {
            index += 1;
            if index >= count {
                index = 0;
                self.new_round(cs)?;
            }
            let p = &self.world.players[index];
            if p.dead {
                continue;
            }
            fallback.get_or_insert(p.id);
            let skipped = (p.human && !p.connected) || (!p.human && self.world.ai_turn_skip > 0);
            if !skipped {
                return Ok(p.id);
            }
        }
        fallback.ok_or_else(|| GameError::Invariant("no living players".into()))
    }

    fn start_turn(&mut self, player: PlayerId, cs: &mut ChangeSet) -> Result<(), GameError> {
        for unit in self.world.units_of(player) {
            let moves = self.world.unit_moves(self.world.unit(unit)?);
            let u = self.world.unit_mut(unit)?;
            let state = match u.state {
                UnitState::Skipped => UnitState::Active,
                UnitState::Fortifying => UnitState::Fortified,
                other => other,
            };
            if state != u.state {
                u.state = state;
                cs.add_private(player, PrivatePatch::UnitState { unit, state });
            }
            self.set_moves(unit, moves, cs)?;
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Death and victory
    // ------------------------------------------------------------------

    fn check_deaths(&mut self, cs: &mut ChangeSet) -> Result<(), GameError> {
        for id in self.world.player_ids() {
            let p = self.world.player(id)?;
            if p.dead {
                continue;
            }
            let alive = match p.kind {
                PlayerKind::Royal => {
                    let reserve = p
                        .opponent
                        .and_then(|o| self.world.players.get(o.index()))
                        .is_some_and(|o| o.royal_force.values().any(|n| *n > 0));
                    reserve || !self.world.units_of(id).is_empty()
                }
                _ => self.world.has_assets(id),
            };
            if alive {
                continue;
            }
            info!(player = ?id, "player eliminated");
            self.sessions.close_all_for_player(&mut self.world, id);
            let p = self.world.player_mut(id)?;
            p.dead = true;
            p.pending_monarch.clear();
            cs.add_public(See::All, PublicPatch::PlayerDead { player: id });
        }
        Ok(())
    }

    /// A rebel whose royal expeditionary force has no land units left wins
    /// independence.
    fn grant_independence(&mut self, cs: &mut ChangeSet) -> Result<(), GameError> {
        for id in self.world.player_ids() {
            let p = self.world.player(id)?;
            if p.kind != PlayerKind::Rebel || p.dead {
                continue;
            }
            let Some(royal) = p.opponent else {
                continue;
            };
            if !self.ref_defeated(id, royal) {
                continue;
            }
            info!(player = ?id, "independence achieved");
            self.world.player_mut(id)?.kind = PlayerKind::Independent;
            self.world.set_stance(id, royal, Stance::Peace);
            cs.add_stance(See::All, id, royal, Stance::Peace);
            cs.add_public(
                See::All,
                PublicPatch::PlayerKind {
                    player: id,
                    kind: PlayerKind::Independent,
                },
            );
            cs.add_message(See::All, Notice::IndependenceAchieved { player: id });
            for unit in self.world.units_of(royal) {
                if !self.world.units.contains(unit) {
                    continue;
                }
                cs.add_dispose_unit(&self.world, unit);
                self.world.dispose_unit(unit);
            }
        }
        Ok(())
    }

    fn ref_defeated(&self, rebel: PlayerId, royal: PlayerId) -> bool {
        let naval = |id| {
            self.world
                .units
                .get(id)
                .is_some_and(|u| self.world.is_naval(u))
        };
        let land_left = self.world.units_of(royal).into_iter().any(|u| !naval(u));
        let reserve_left = self.world.players.get(rebel.index()).is_some_and(|p| {
            p.royal_force.iter().any(|(t, n)| {
                *n > 0 && self.world.rules.unit_type(*t).is_some_and(|t| !t.naval)
            })
        });
        !land_left && !reserve_left
    }

    /// Evaluates the enabled victory conditions against the current world.
    pub fn check_victory(&self) -> Option<VictoryCheck> {
        let o = &self.world.options;
        let players = &self.world.players;

        if o.victory_defeat_ref {
            if let Some(p) = players
                .iter()
                .find(|p| !p.dead && p.kind == PlayerKind::Independent)
            {
                return Some(VictoryCheck {
                    winner: Some(p.id),
                    reason: VictoryReason::RefDefeated,
                });
            }
        }
        if o.victory_defeat_europeans {
            let europeans: Vec<_> = players.iter().filter(|p| p.is_european()).collect();
            let living: Vec<_> = europeans.iter().filter(|p| !p.dead).collect();
            if europeans.len() > 1 && living.len() == 1 {
                return Some(VictoryCheck {
                    winner: Some(living[0].id),
                    reason: VictoryReason::SoleEuropean,
                });
            }
        }
        if o.victory_defeat_humans {
            let humans: Vec<_> = players.iter().filter(|p| p.human).collect();
            let living: Vec<_> = humans.iter().filter(|p| !p.dead).collect();
            if humans.len() > 1 && living.len() <= 1 {
                return Some(VictoryCheck {
                    winner: living.first().map(|p| p.id),
                    reason: VictoryReason::SoleHuman,
                });
            }
        }
        None
    }

    // ------------------------------------------------------------------
    // The yearly round
    // ------------------------------------------------------------------

    fn new_round(&mut self, cs: &mut ChangeSet) -> Result<(), GameError> {
        self.world.turn += 1;
        if self.world.ai_turn_skip > 0 {
            self.world.ai_turn_skip -= 1;
        }
        debug!(turn = self.world.turn, "new round");
        self.decay_markets(cs)?;
        self.convert_natives(cs)?;
        self.monarch_actions(cs)?;
        self.offer_fathers(cs)?;
        self.accrue_liberty(cs)?;
        self.advance_sailing(cs)?;
        self.spanish_succession(cs)?;
        for id in self.world.player_ids() {
            let score = self.world.compute_score(id);
            let p = self.world.player_mut(id)?;
            if !p.dead && p.score != score {
                p.score = score;
                cs.add_public(See::All, PublicPatch::Score { player: id, score });
            }
        }
        Ok(())
    }

    fn decay_markets(&mut self, cs: &mut ChangeSet) -> Result<(), GameError> {
        let (pct, extra) = (
            self.world.options.market_decay_pct,
            self.world.options.market_extra_decay_pct,
        );
        for id in self.world.player_ids() {
            let p = self.world.player(id)?;
            if p.dead || p.kind != PlayerKind::Colonial {
                continue;
            }
            let goods: Vec<_> = p.market.goods().collect();
            let Some(pick) = self.world.rng.pick_weighted(&vec![1; goods.len()]) else {
                continue;
            };
            let market = &mut self.world.player_mut(id)?.market;
            for (index, g) in goods.iter().enumerate() {
                let mut moved = market.decay(*g, pct);
                if index == pick {
                    moved |= market.decay(*g, extra);
                }
                if moved {
                    if let Some(entry) = market.entry(*g) {
                        cs.add_private(id, PrivatePatch::MarketEntry { entry });
                    }
                }
            }
        }
        Ok(())
    }

    /// Missions may convert natives, who join the nearest colony of the
    /// missionary's owner within reach.
    fn convert_natives(&mut self, cs: &mut ChangeSet) -> Result<(), GameError> {
        let missions: Vec<_> = self
            .world
            .settlements
            .iter_ordered()
            .filter_map(|(id, s)| {
                let missionary = s.as_native()?.missionary?;
                Some((id, s.position, missionary))
            })
            .collect();
        let o = &self.world.options;
        let (chance, expert_bonus, radius) =
            (o.conversion_chance_pct, o.conversion_expert_bonus_pct, o.convert_radius);

        for (settlement, position, missionary) in missions {
            let Some(m) = self.world.units.get(missionary) else {
                continue;
            };
            let owner = m.owner;
            let expert = self.world.is_expert(m, Expertise::Missionary)
                || self.world.has_father_effect(owner, FatherEffect::ExpertMissionaries);
            let pct = chance + if expert { expert_bonus } else { 0 };
            if !self.world.rng.chance(pct) {
                continue;
            }
            let colony = self
                .world
                .colonies_of(owner)
                .into_iter()
                .filter_map(|c| self.world.settlements.get(c))
                .filter(|c| c.position.distance(position) <= radius)
                .min_by_key(|c| (c.position.distance(position), c.id))
                .map(|c| c.id);
            let Some(colony) = colony else {
                continue;
            };
            let convert = self.world.rules.special.convert;
            let unit = self.world.spawn_unit(
                owner,
                convert,
                UnitRole::Default,
                Location::Settlement { settlement: colony },
            );
            info!(?owner, ?settlement, ?unit, "native converted");
            cs.add_unit(&self.world, unit);
            cs.add_message(See::Only(owner), Notice::ConvertJoined { settlement, unit });
        }
        Ok(())
    }

    fn monarch_actions(&mut self, cs: &mut ChangeSet) -> Result<(), GameError> {
        for id in self.world.player_ids() {
            let p = self.world.player(id)?;
            if p.dead || p.kind != PlayerKind::Colonial {
                continue;
            }
            let o = &self.world.options;
            let can_raise = p.tax < o.max_tax;
            let enemies: Vec<PlayerId> = self
                .world
                .players
                .iter()
                .filter(|other| {
                    other.id != id
                        && !other.dead
                        && other.kind == PlayerKind::Colonial
                        && matches!(self.world.stance(id, other.id), Stance::Peace | Stance::CeaseFire)
                })
                .map(|other| other.id)
                .collect();
            let weights = [
                if can_raise { o.monarch_weight_raise_tax } else { 0 },
                o.monarch_weight_add_to_ref,
                if enemies.is_empty() { 0 } else { o.monarch_weight_declare_war },
                o.monarch_weight_offer_mercenaries,
            ];
            let (chance_pct, max_tax, max_raise, merc_price) = (
                o.monarch_action_chance_pct,
                o.max_tax,
                o.max_tax_raise.max(1),
                o.mercenary_price,
            );
            let tax = p.tax;
            let market_goods: Vec<_> = p.market.goods().collect();

            if !self.world.rng.chance(chance_pct) {
                continue;
            }
            let action = match self.world.rng.pick_weighted(&weights) {
                Some(0) => MonarchAction::RaiseTax,
                Some(1) => MonarchAction::AddToRef,
                Some(2) => MonarchAction::DeclareWar,
                Some(3) => MonarchAction::OfferMercenaries,
                _ => continue,
            };
            info!(player = ?id, ?action, "monarch acts");
            match action {
                MonarchAction::RaiseTax => {
                    let raise = 1 + self.world.rng.below(max_raise as u32) as u8;
                    let new_tax = tax.saturating_add(raise).min(max_tax);
                    let Some(goods) = market_goods
                        .get(self.world.rng.below(market_goods.len() as u32) as usize)
                        .copied()
                    else {
                        continue;
                    };
                    self.queue_monarch(id, PendingMonarch::RaiseTax { tax: new_tax, goods })?;
                }
                MonarchAction::AddToRef => {
                    let force = self.world.rules.royal_force.clone();
                    let Some((unit_type, _)) = force
                        .get(self.world.rng.below(force.len() as u32) as usize)
                        .copied()
                    else {
                        continue;
                    };
                    let added = self.world.rng.between(1, 2);
                    *self
                        .world
                        .player_mut(id)?
                        .royal_force
                        .entry(unit_type)
                        .or_insert(0) += added;
                    cs.add_message(See::Only(id), Notice::RefReinforced { added });
                }
                MonarchAction::DeclareWar => {
                    let against = enemies[self.world.rng.below(enemies.len() as u32) as usize];
                    self.declare_war(id, against, cs);
                    cs.add_message(See::Only(id), Notice::WarDeclaredByCrown { against });
                    cs.add_message(See::Only(against), Notice::WarDeclaredByCrown { against: id });
                }
                MonarchAction::OfferMercenaries => {
                    let units = self
                        .world
                        .rules
                        .mercenaries
                        .iter()
                        .flat_map(|(t, n)| std::iter::repeat(*t).take(*n as usize))
                        .collect();
                    self.queue_monarch(
                        id,
                        PendingMonarch::Mercenaries {
                            price: merc_price,
                            units,
                        },
                    )?;
                }
            }
            cs.add_message(See::Only(id), Notice::Monarch { action });
        }
        Ok(())
    }

    /// At most one pending offer per kind; a newer one replaces the older.
    fn queue_monarch(&mut self, player: PlayerId, pending: PendingMonarch) -> Result<(), GameError> {
        let queue = &mut self.world.player_mut(player)?.pending_monarch;
        queue.retain(|p| p.action() != pending.action());
        queue.push(pending);
        Ok(())
    }

    fn offer_fathers(&mut self, cs: &mut ChangeSet) -> Result<(), GameError> {
        let age = match self.world.turn {
            t if t < MIDDLE_AGE_TURN => 0,
            t if t < LATE_AGE_TURN => 1,
            _ => 2,
        };
        for id in self.world.player_ids() {
            let p = self.world.player(id)?;
            let eligible = !p.dead
                && matches!(p.kind, PlayerKind::Colonial | PlayerKind::Rebel)
                && p.current_father.is_none()
                && p.father_offers.is_empty();
            if !eligible {
                continue;
            }
            let joined = p.fathers.clone();
            let mut offers: Vec<FatherId> = Vec::new();
            for category in FatherCategory::ALL {
                let candidates: Vec<_> = self
                    .world
                    .rules
                    .fathers
                    .iter()
                    .filter(|f| f.category == category && !joined.contains(&f.id))
                    .map(|f| (f.id, f.weights[age]))
                    .collect();
                let weights: Vec<u32> = candidates.iter().map(|(_, w)| *w).collect();
                if let Some(pick) = self.world.rng.pick_weighted(&weights) {
                    offers.push(candidates[pick].0);
                }
            }
            if offers.is_empty() {
                continue;
            }
            self.world.player_mut(id)?.father_offers = offers.clone();
            cs.add_private(id, PrivatePatch::FatherOffers { offers });
        }
        Ok(())
    }

    fn accrue_liberty(&mut self, cs: &mut ChangeSet) -> Result<(), GameError> {
        let o = self.world.options.clone();
        for id in self.world.player_ids() {
            let p = self.world.player(id)?;
            if p.dead || !p.is_european() {
                continue;
            }
            let colonial = p.kind == PlayerKind::Colonial;
            let boost = self.world.has_father_effect(id, FatherEffect::LibertyBoost);
            let immigration_boost = self.world.has_father_effect(id, FatherEffect::ImmigrationBoost);

            let colonies = self.world.colonies_of(id);
            let mut produced = 0;
            for colony in &colonies {
                let mut bells = self.world.colony_population(*colony) as i32 * o.bells_per_colonist;
                if boost {
                    bells += bells * o.liberty_boost_pct / 100;
                }
                if let Some(c) = self
                    .world
                    .settlements
                    .get_mut(*colony)
                    .and_then(Settlement::as_colony_mut)
                {
                    c.bells += bells;
                }
                produced += bells;
            }

            let mut immigrant = false;
            {
                let p = self.world.player_mut(id)?;
                p.liberty += produced;
                if colonial {
                    p.immigration += colonies.len() as i32 * o.immigration_per_colony
                        + if immigration_boost { o.immigration_boost } else { 0 };
                    if p.immigration >= p.immigration_required {
                        p.immigration -= p.immigration_required;
                        p.immigration_required += o.immigration_required_increment;
                        immigrant = true;
                    }
                }
            }
            if immigrant {
                let colonist = self.world.rules.special.colonist;
                let unit = self
                    .world
                    .spawn_unit(id, colonist, UnitRole::Default, Location::Europe);
                info!(player = ?id, ?unit, "immigrant arrived");
                cs.add_unit(&self.world, unit);
                cs.add_message(See::Only(id), Notice::ImmigrantArrived { unit });
            }

            self.join_father(id, cs)?;
            let p = self.world.player(id)?;
            cs.add_private(id, PrivatePatch::Liberty { points: p.liberty });
            cs.add_private(id, PrivatePatch::Immigration { points: p.immigration });
        }
        Ok(())
    }

    fn join_father(&mut self, player: PlayerId, cs: &mut ChangeSet) -> Result<(), GameError> {
        let o = &self.world.options;
        let (base, increment) = (o.father_cost_base, o.father_cost_increment);
        let p = self.world.player(player)?;
        let Some(father) = p.current_father else {
            return Ok(());
        };
        let cost = base + increment * p.fathers.len() as i32;
        if p.liberty < cost {
            return Ok(());
        }
        {
            let p = self.world.player_mut(player)?;
            p.liberty -= cost;
            p.fathers.insert(father);
            p.current_father = None;
            p.father_offers.clear();
        }
        info!(?player, ?father, "founding father joined");
        cs.add_public(See::All, PublicPatch::FatherJoined { player, father });
        cs.add_private(player, PrivatePatch::CurrentFather { father: None });
        cs.add_private(player, PrivatePatch::FatherOffers { offers: Vec::new() });

        let effect = self.world.rules.father(father).map(|f| f.effect);
        if effect == Some(FatherEffect::PeaceWithNatives) {
            self.make_peace_with_natives(player, cs)?;
        }
        Ok(())
    }

    fn make_peace_with_natives(&mut self, player: PlayerId, cs: &mut ChangeSet) -> Result<(), GameError> {
        for native in self.world.player_ids() {
            if self.world.player(native)?.kind != PlayerKind::Native {
                continue;
            }
            let reset = self.world.player(native)?.tension_toward(player).delta_to(0);
            self.world.modify_tension(native, player, reset);
        }
        let natives: Vec<_> = self
            .world
            .settlements
            .iter_ordered()
            .filter(|(_, s)| !s.is_colony())
            .map(|(id, _)| id)
            .collect();
        for settlement in natives {
            if let Some(n) = self.world.settlement_mut(settlement)?.as_native_mut() {
                let alarm = n.alarm.entry(player).or_default();
                let reset = alarm.delta_to(0);
                alarm.modify(reset);
                cs.add_private(
                    player,
                    PrivatePatch::SettlementAlarm {
                        settlement,
                        level: alarm.level(),
                    },
                );
            }
        }
        Ok(())
    }

    fn advance_sailing(&mut self, cs: &mut ChangeSet) -> Result<(), GameError> {
        let sailing: Vec<_> = self
            .world
            .units
            .iter_ordered()
            .filter(|(_, u)| matches!(u.state, UnitState::ToEurope | UnitState::ToAmerica))
            .map(|(id, _)| id)
            .collect();
        for unit in sailing {
            let u = self.world.unit_mut(unit)?;
            u.work_left = u.work_left.saturating_sub(1);
            if u.work_left > 0 {
                continue;
            }
            let (owner, state) = (u.owner, u.state);
            if state == UnitState::ToEurope {
                u.location = Location::Europe;
                u.state = UnitState::InEurope;
                debug!(?unit, "arrived in Europe");
                cs.add(See::Only(owner), ObjectId::Unit(unit));
                continue;
            }
            let Some(arrival) = self.arrival_tile(owner) else {
                continue;
            };
            let u = self.world.unit_mut(unit)?;
            u.location = Location::tile(arrival);
            u.state = UnitState::Active;
            debug!(?unit, ?arrival, "arrived in the New World");
            cs.add_move(unit, owner, Location::HighSeas, None, Location::tile(arrival));
            self.reveal_around_unit(unit, cs)?;
        }
        Ok(())
    }

    /// Where ships from Europe reappear: the player's entry location, else the
    /// first high-seas tile.
    pub(super) fn arrival_tile(&self, player: PlayerId) -> Option<Position> {
        self.world
            .players
            .get(player.index())
            .and_then(|p| p.entry_location)
            .or_else(|| {
                self.world
                    .map
                    .positions()
                    .find(|p| self.world.map.terrain(*p) == Some(Terrain::HighSeas))
            })
    }

    /// Once per game, when a colonial power's rebels reach the threshold, the
    /// weakest computer-run colonial power is absorbed by the strongest.
    fn spanish_succession(&mut self, cs: &mut ChangeSet) -> Result<(), GameError> {
        if !self.world.options.spanish_succession || self.world.spanish_succession_done {
            return Ok(());
        }
        let threshold = self.world.options.succession_rebel_pct;
        let triggered = self.world.players.iter().any(|p| {
            !p.dead && p.kind == PlayerKind::Colonial && self.world.rebel_pct(p.id) >= threshold
        });
        if !triggered {
            return Ok(());
        }
        let mut candidates: Vec<_> = self
            .world
            .players
            .iter()
            .filter(|p| !p.dead && p.kind == PlayerKind::Colonial && !p.human)
            .map(|p| (p.score, p.id))
            .collect();
        if candidates.len() < 2 {
            return Ok(());
        }
        candidates.sort();
        let loser = candidates[0].1;
        let winner = candidates[candidates.len() - 1].1;
        info!(?loser, ?winner, "spanish succession");

        for settlement in self.world.settlements_of(loser) {
            self.world.transfer_settlement(settlement, winner)?;
            cs.add(See::perhaps_always(winner), ObjectId::Settlement(settlement));
        }
        for unit in self.world.units_of(loser) {
            self.world.transfer_unit(unit, winner);
            cs.add_unit(&self.world, unit);
        }
        let gold = std::mem::take(&mut self.world.player_mut(loser)?.gold);
        self.earn_gold(winner, gold, cs)?;
        self.world.player_mut(loser)?.dead = true;
        self.world.spanish_succession_done = true;
        cs.add_public(See::All, PublicPatch::PlayerDead { player: loser });
        cs.add_message(See::All, Notice::SpanishSuccession { loser, winner });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Crown answers, fathers, independence
    // ------------------------------------------------------------------

    pub(super) fn answer_monarch(
        &mut self,
        player: PlayerId,
        action: MonarchAction,
        accept: bool,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let p = self.world.player_mut(player)?;
        let Some(index) = p.pending_monarch.iter().position(|m| m.action() == action) else {
            return reject(Rejection::NoPendingMonarchAction);
        };
        let pending = p.pending_monarch.remove(index);
        info!(?player, ?action, accept, "monarch answered");
        match pending {
            PendingMonarch::RaiseTax { tax, goods } => {
                if accept {
                    p.tax = tax;
                    cs.add_private(player, PrivatePatch::Tax { tax });
                    cs.add_message(See::Only(player), Notice::TaxRaised { tax });
                } else {
                    p.market.boycott(goods);
                    if let Some(entry) = p.market.entry(goods) {
                        cs.add_private(player, PrivatePatch::MarketEntry { entry });
                    }
                    cs.add_message(See::Only(player), Notice::GoodsBoycotted { goods });
                }
            }
            PendingMonarch::Mercenaries { price, units } => {
                if accept {
                    self.spend_gold(player, price as i64, cs)?;
                    for unit_type in &units {
                        let role = if self
                            .world
                            .rules
                            .unit_type(*unit_type)
                            .is_some_and(|t| t.is_expert(Expertise::Soldier))
                        {
                            UnitRole::Soldier
                        } else {
                            UnitRole::Default
                        };
                        let unit = self.world.spawn_unit(player, *unit_type, role, Location::Europe);
                        cs.add_unit(&self.world, unit);
                    }
                    cs.add_message(
                        See::Only(player),
                        Notice::MercenariesHired {
                            count: units.len() as u32,
                        },
                    );
                }
            }
        }
        Ok(())
    }

    pub(super) fn choose_founding_father(
        &mut self,
        player: PlayerId,
        father: FatherId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let p = self.world.player_mut(player)?;
        if !p.father_offers.contains(&father) {
            return reject(Rejection::FatherNotOffered);
        }
        p.current_father = Some(father);
        cs.add_private(
            player,
            PrivatePatch::CurrentFather {
                father: Some(father),
            },
        );
        Ok(())
    }

    pub(super) fn declare_independence(
        &mut self,
        player: PlayerId,
        nation_name: &str,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let nation_name = nation_name.trim();
        if nation_name.is_empty() {
            return reject(Rejection::EmptyName);
        }
        let p = self.world.player(player)?;
        let ready = self.world.rebel_pct(player) >= self.world.options.independence_rebel_pct;
        if p.kind != PlayerKind::Colonial || !ready {
            return reject(Rejection::CannotDeclareIndependence);
        }
        let crown_name = format!("{} Crown", p.name);
        let force: Vec<_> = p.royal_force.iter().map(|(t, n)| (*t, *n)).collect();

        let royal = self.world.add_player(&crown_name, PlayerKind::Royal, false);
        {
            let rebel = self.world.player_mut(player)?;
            rebel.kind = PlayerKind::Rebel;
            rebel.tax = 0;
            rebel.opponent = Some(royal);
            rebel.pending_monarch.clear();
        }
        self.world.player_mut(royal)?.opponent = Some(player);
        info!(?player, nation_name, ?royal, "independence declared");

        self.world.set_stance(player, royal, Stance::War);
        cs.add(See::All, ObjectId::Player(royal));
        cs.add_stance(See::All, player, royal, Stance::War);
        cs.add_public(
            See::All,
            PublicPatch::PlayerKind {
                player,
                kind: PlayerKind::Rebel,
            },
        );
        cs.add_message(
            See::All,
            Notice::IndependenceDeclared {
                player,
                nation_name: nation_name.to_string(),
            },
        );
        self.land_expeditionary_force(player, royal, force, cs)
    }

    /// Ships of the royal force arrive at the rebel's entry location carrying as
    /// many land units as they can; the rest stays in reserve.
    fn land_expeditionary_force(
        &mut self,
        rebel: PlayerId,
        royal: PlayerId,
        force: Vec<(UnitTypeId, u32)>,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let Some(arrival) = self.arrival_tile(rebel) else {
            return Ok(());
        };
        let rules = self.world.rules.clone();
        let is_naval = |t| rules.unit_type(t).is_some_and(|t| t.naval);
        let mut ships = Vec::new();
        for (unit_type, count) in force.iter().filter(|(t, _)| is_naval(*t)) {
            for _ in 0..*count {
                let ship = self.world.spawn_unit(
                    royal,
                    *unit_type,
                    UnitRole::Default,
                    Location::tile(arrival),
                );
                ships.push(ship);
            }
        }
        let mut reserve = BTreeMap::new();
        for (unit_type, count) in force.iter().filter(|(t, _)| !is_naval(*t)) {
            for _ in 0..*count {
                let carrier = ships.iter().copied().find(|s| {
                    self.world
                        .units
                        .get(*s)
                        .is_some_and(|s| self.world.free_slots(s) > 0)
                });
                match carrier {
                    Some(carrier) => {
                        self.world.spawn_unit(
                            royal,
                            *unit_type,
                            UnitRole::Soldier,
                            Location::Carrier { unit: carrier },
                        );
                    }
                    None => *reserve.entry(*unit_type).or_insert(0) += 1,
                }
            }
        }
        self.world.player_mut(rebel)?.royal_force = reserve;
        for unit in self.world.units_of(royal) {
            cs.add_unit(&self.world, unit);
        }
        self.world.explore(royal, arrival, 2);
        Ok(())
    }
}
