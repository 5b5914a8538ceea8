//! Scouts, missionaries, learning, tribute and trade with native settlements,
//! plus the scout's visit to a foreign colony.

use colonia_protocol::{
    DecisionAnswer, DecisionRequest, GoodsAmount, GoodsTypeId, Location, MissionaryAction, MoveType,
    NativeTradeAction, Notice, ObjectId, PlayerId, Position, PrivatePatch, PublicPatch, Rejection,
    ScoutAction, ScoutColonyAction, ScoutOutcome, SettlementId, Stance, TensionLevel, UnitId,
    UnitRole, UnitState,
};
use tracing::{debug, info};

use crate::change::{ChangeSet, See};
use crate::controller::GameEngine;
use crate::decision::{ask, confirm, DecisionSource};
use crate::error::{reject, GameError};
use crate::movement::is_expert_scout;
use crate::rules::{Expertise, FatherEffect};
use crate::session::{SessionAction, SessionStore, TradeSession};
use crate::tension::{TENSION_ADD_NORMAL, TENSION_ADD_WAR_INCITER, WAR_MODIFIER};
use crate::world::{NativeSettlement, Orders, World};

/// Percent bonus natives pay for the goods they want most, and for the others they want.
const WANTED_FIRST_PCT: u64 = 150;
const WANTED_OTHER_PCT: u64 = 125;

impl GameEngine {
    fn native_at(&self, to: Position) -> Result<(SettlementId, PlayerId, NativeSettlement), GameError> {
        let id = self
            .world
            .settlement_at(to)
            .ok_or_else(|| GameError::Invariant(format!("no settlement at {to:?}")))?;
        let s = self.world.settlement(id)?;
        let native = s
            .as_native()
            .ok_or_else(|| GameError::Invariant(format!("{id:?} is not a native settlement")))?;
        Ok((id, s.owner, native.clone()))
    }

    fn kill_unit(&mut self, unit: UnitId, cs: &mut ChangeSet) {
        cs.add_dispose_unit(&self.world, unit);
        self.world.dispose_unit(unit);
    }

    fn alarm_changed(
        &mut self,
        player: PlayerId,
        settlement: SettlementId,
        delta: i32,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let change = self.world.modify_alarm(settlement, player, delta)?;
        if change.settlement_changed() {
            cs.add_private(
                player,
                PrivatePatch::SettlementAlarm {
                    settlement,
                    level: change.settlement_after,
                },
            );
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Scouts
    // ------------------------------------------------------------------

    pub(super) fn scout_native_settlement(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        to: Position,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let (settlement, _, native) = self.native_at(to)?;
        let request = DecisionRequest::ScoutSettlement { unit, settlement };
        let action = match ask(decisions, player, request.clone())? {
            DecisionAnswer::Scout(action) => action,
            _ => return Err(GameError::UnexpectedAnswer { request }),
        };
        match action {
            ScoutAction::Cancel => Ok(()),
            ScoutAction::Attack => self.attack(player, unit, to, decisions, cs),
            ScoutAction::Tribute => self.demand_tribute_native(player, unit, settlement, cs),
            ScoutAction::Speak => self.speak_to_chief(player, unit, settlement, &native, cs),
        }
    }

    fn speak_to_chief(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        native: &NativeSettlement,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let outcome = if native.alarm(player).level() == TensionLevel::Hateful {
            ScoutOutcome::Died
        } else if native.has_visited(player) {
            ScoutOutcome::Nothing
        } else {
            let expert = is_expert_scout(&self.world, self.world.unit(unit)?);
            let o = &self.world.options;
            let weights = [
                if expert { 0 } else { o.scout_weight_expert },
                o.scout_weight_tales,
                o.scout_weight_beads,
            ];
            match self.world.rng.pick_weighted(&weights) {
                Some(0) => {
                    let expert_scout = self.world.rules.special.expert_scout;
                    self.world.unit_mut(unit)?.unit_type = expert_scout;
                    cs.add_public(
                        See::perhaps_always(player),
                        PublicPatch::UnitType {
                            unit,
                            unit_type: expert_scout,
                        },
                    );
                    ScoutOutcome::Expert
                }
                Some(1) => {
                    let center = self.world.settlement(settlement)?.position;
                    let radius = self.world.options.tales_radius;
                    let revealed = self.reveal(player, center, radius, cs);
                    ScoutOutcome::Tales {
                        revealed: revealed as u32,
                    }
                }
                _ => {
                    let o = &self.world.options;
                    let (random, base, expert_pct) =
                        (o.beads_random, o.beads_base, o.expert_scout_beads_pct);
                    let mut gold = self.world.rng.below(random) * native.bonus.max(1) + base;
                    if expert {
                        gold = gold * expert_pct / 100;
                    }
                    self.earn_gold(player, gold as i64, cs)?;
                    ScoutOutcome::Beads { gold }
                }
            }
        };
        info!(?player, ?settlement, ?outcome, "scout spoke to chief");

        if outcome == ScoutOutcome::Died {
            self.kill_unit(unit, cs);
        } else {
            if let Some(n) = self.world.settlement_mut(settlement)?.as_native_mut() {
                n.visited.insert(player);
            }
            self.set_moves(unit, 0, cs)?;
            cs.add(See::Only(player), ObjectId::Settlement(settlement));
        }
        cs.add_message(
            See::Only(player),
            Notice::ScoutResult {
                unit,
                settlement,
                outcome,
            },
        );
        Ok(())
    }

    pub(super) fn scout_foreign_colony(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        to: Position,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let settlement = self
            .world
            .settlement_at(to)
            .ok_or_else(|| GameError::Invariant(format!("no colony at {to:?}")))?;
        let owner = self.world.settlement(settlement)?.owner;
        let request = DecisionRequest::ScoutColony { unit, settlement };
        let action = match ask(decisions, player, request.clone())? {
            DecisionAnswer::ScoutColony(action) => action,
            _ => return Err(GameError::UnexpectedAnswer { request }),
        };
        match action {
            ScoutColonyAction::Cancel => Ok(()),
            ScoutColonyAction::Attack => self.attack(player, unit, to, decisions, cs),
            ScoutColonyAction::Negotiate => {
                let request = DecisionRequest::DraftTrade {
                    unit,
                    counterparty: owner,
                };
                match ask(decisions, player, request.clone())? {
                    DecisionAnswer::Trade(agreement) => {
                        self.propose_trade(player, agreement, Some(unit), decisions, cs)
                    }
                    _ => Err(GameError::UnexpectedAnswer { request }),
                }
            }
            ScoutColonyAction::Spy => {
                debug!(?player, ?settlement, "spying on colony");
                cs.add(See::Only(player), ObjectId::Settlement(settlement));
                for inside in self.world.units_in(settlement) {
                    cs.add(See::Only(player), ObjectId::Unit(inside));
                }
                self.set_moves(unit, 0, cs)
            }
        }
    }

    // ------------------------------------------------------------------
    // Missionaries
    // ------------------------------------------------------------------

    pub(super) fn missionary_at_settlement(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        to: Position,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let (settlement, native_owner, native) = self.native_at(to)?;
        let rival = native
            .missionary
            .and_then(|m| self.world.units.get(m))
            .map(|m| (m.id, m.owner))
            .filter(|(_, owner)| *owner != player);
        let request = DecisionRequest::MissionarySettlement {
            unit,
            settlement,
            can_denounce: rival.is_some(),
        };
        let action = match ask(decisions, player, request.clone())? {
            DecisionAnswer::Missionary(action) => action,
            _ => return Err(GameError::UnexpectedAnswer { request }),
        };
        match action {
            MissionaryAction::Cancel => Ok(()),
            MissionaryAction::Establish => {
                if native.missionary.is_some() {
                    return reject(Rejection::IllegalMove {
                        move_type: MoveType::MoveNoAccessSettlement,
                    });
                }
                match native.alarm(player).level() {
                    TensionLevel::Hateful => {
                        self.kill_unit(unit, cs);
                        cs.add_message(See::Only(player), Notice::MissionaryKilled { settlement });
                    }
                    TensionLevel::Angry => {
                        self.set_moves(unit, 0, cs)?;
                        cs.add_message(See::Only(player), Notice::MissionRefused { settlement });
                    }
                    _ => {
                        self.install_missionary(player, unit, settlement, cs)?;
                        cs.add_message(
                            See::Only(player),
                            Notice::MissionEstablished {
                                settlement,
                                owner: player,
                            },
                        );
                    }
                }
                Ok(())
            }
            MissionaryAction::Denounce => {
                let Some((rival_unit, rival_owner)) = rival else {
                    return Err(GameError::UnexpectedAnswer { request });
                };
                self.denounce(player, unit, settlement, rival_unit, rival_owner, cs)
            }
            MissionaryAction::Incite => {
                self.incite(player, unit, settlement, native_owner, decisions, cs)
            }
        }
    }

    fn install_missionary(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let from = self.location_of(unit)?;
        let from_position = self.world.unit_position(unit);
        let to = Location::Settlement { settlement };
        {
            let u = self.world.unit_mut(unit)?;
            u.location = to;
            u.state = UnitState::Sentry;
            u.moves_left = 0;
            u.orders = Orders::None;
        }
        if let Some(n) = self.world.settlement_mut(settlement)?.as_native_mut() {
            n.missionary = Some(unit);
        }
        cs.add_move(unit, player, from, from_position, to);
        cs.add_public(
            See::perhaps_always(player),
            PublicPatch::Missionary {
                settlement,
                owner: Some(player),
            },
        );
        Ok(())
    }

    /// Contest for an occupied mission. The roll favours the side with more
    /// immigration, and expert missionaries shift it.
    fn denounce(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        rival_unit: UnitId,
        rival_owner: PlayerId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let ours = self.world.player(player)?.immigration.max(0) as i64;
        let theirs = self.world.player(rival_owner)?.immigration.max(0) as i64;
        let bonus = self.world.options.denounce_expert_bonus as i64;
        let threshold = self.world.options.denounce_threshold as i64;

        let mut roll = self.world.rng.below(100) as i64 * (ours + 1) / (theirs + 1);
        if self.world.is_expert(self.world.unit(unit)?, Expertise::Missionary)
            || self.world.has_father_effect(player, FatherEffect::ExpertMissionaries)
        {
            roll += bonus;
        }
        if self.world.is_expert(self.world.unit(rival_unit)?, Expertise::Missionary)
            || self
                .world
                .has_father_effect(rival_owner, FatherEffect::ExpertMissionaries)
        {
            roll -= bonus;
        }
        let success = roll >= threshold;
        info!(?player, ?rival_owner, roll, success, "mission denounced");

        if success {
            self.kill_unit(rival_unit, cs);
            self.install_missionary(player, unit, settlement, cs)?;
        } else {
            self.kill_unit(unit, cs);
        }
        let notice = Notice::MissionDenounced {
            settlement,
            by: player,
            success,
        };
        cs.add_message(See::Only(player), notice.clone());
        cs.add_message(See::Only(rival_owner), notice);
        Ok(())
    }

    fn incite(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        native: PlayerId,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let candidates: Vec<PlayerId> = self
            .world
            .players
            .iter()
            .filter(|p| {
                p.id != player
                    && p.is_european()
                    && !p.dead
                    && self.world.stance(native, p.id) != Stance::Uncontacted
            })
            .map(|p| p.id)
            .collect();
        let request = DecisionRequest::SelectInciteTarget {
            settlement,
            candidates: candidates.clone(),
        };
        let target = match ask(decisions, player, request.clone())? {
            DecisionAnswer::Player(None) => return Ok(()),
            DecisionAnswer::Player(Some(target)) if candidates.contains(&target) => target,
            _ => return Err(GameError::UnexpectedAnswer { request }),
        };

        let natives = self.world.player(native)?;
        let toward_inciter = natives.tension_toward(player).value();
        let toward_target = natives.tension_toward(target).value();
        let price = self.world.options.incite_price(toward_inciter, toward_target);
        let request = DecisionRequest::ConfirmIncite {
            settlement,
            target,
            price,
        };
        if !confirm(decisions, player, request)? {
            return Ok(());
        }
        self.set_moves(unit, 0, cs)?;
        if self.world.player(player)?.gold < price as i64 {
            cs.add_message(
                See::Only(player),
                Notice::InciteUnaffordable { settlement, price },
            );
            return Ok(());
        }

        info!(?player, ?native, ?target, price, "natives incited");
        self.spend_gold(player, price as i64, cs)?;
        self.world.player_mut(native)?.gold += price as i64;
        self.world.modify_tension(native, target, WAR_MODIFIER);
        self.declare_war(native, target, cs);
        self.world.modify_tension(target, player, TENSION_ADD_WAR_INCITER);
        cs.add_message(
            See::Only(player),
            Notice::IncitePaid {
                settlement,
                target,
                price,
            },
        );
        cs.add_message(
            See::Only(target),
            Notice::IncitedAgainst {
                inciter: player,
                native,
            },
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Learning
    // ------------------------------------------------------------------

    pub(super) fn learn_skill(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        to: Position,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let (settlement, _, native) = self.native_at(to)?;
        let skill = native
            .learnable_skill
            .ok_or_else(|| GameError::Invariant(format!("{settlement:?} teaches nothing")))?;
        let request = DecisionRequest::LearnSkill {
            unit,
            settlement,
            skill,
        };
        if !confirm(decisions, player, request)? {
            return Ok(());
        }
        match native.alarm(player).level() {
            TensionLevel::Hateful => {
                self.kill_unit(unit, cs);
                cs.add_message(See::Only(player), Notice::UnitKilled { unit, settlement });
            }
            TensionLevel::Angry => {
                self.set_moves(unit, 0, cs)?;
                cs.add_message(See::Only(player), Notice::SkillRefused { settlement });
            }
            _ => {
                self.world.unit_mut(unit)?.unit_type = skill;
                if let Some(n) = self.world.settlement_mut(settlement)?.as_native_mut() {
                    n.learnable_skill = None;
                }
                self.set_moves(unit, 0, cs)?;
                cs.add_public(
                    See::perhaps_always(player),
                    PublicPatch::UnitType {
                        unit,
                        unit_type: skill,
                    },
                );
                cs.add_private(
                    player,
                    PrivatePatch::LearnableSkill {
                        settlement,
                        skill: None,
                    },
                );
                cs.add_message(See::Only(player), Notice::SkillLearned { unit, skill });
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Tribute
    // ------------------------------------------------------------------

    pub(super) fn demand_tribute(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        let s = self.adjacent_settlement(unit, settlement)?;
        if u.moves_left == 0 {
            return reject(Rejection::NoMovesLeft);
        }
        let armed = self.world.is_offensive(&u) || u.role == UnitRole::Scout;
        if s.owner == player || !armed || self.world.is_naval(&u) {
            return reject(Rejection::TributeNotAllowed);
        }
        if s.is_colony() {
            self.demand_tribute_colony(player, unit, settlement, s.owner, decisions, cs)
        } else {
            self.demand_tribute_native(player, unit, settlement, cs)
        }
    }

    fn demand_tribute_native(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let s = self.world.settlement(settlement)?;
        let owner = s.owner;
        let native = s
            .as_native()
            .ok_or_else(|| GameError::Invariant(format!("{settlement:?} is not native")))?;
        let o = &self.world.options;
        let cooling = native
            .last_tribute_turn
            .is_some_and(|t| self.world.turn < t + o.tribute_cooldown_turns);
        let pct = match native.alarm(player).level() {
            _ if cooling => 0,
            TensionLevel::Happy | TensionLevel::Content => o.tribute_fraction_pct_content,
            TensionLevel::Displeased => o.tribute_fraction_pct_displeased,
            TensionLevel::Angry | TensionLevel::Hateful => 0,
        };
        let tribute_tension = o.tribute_tension;
        let treasury = self.world.player(owner)?.gold.max(0);
        let gold = (treasury * pct as i64 / 100) as u32;

        if gold > 0 {
            self.world.player_mut(owner)?.gold -= gold as i64;
            self.earn_gold(player, gold as i64, cs)?;
            let turn = self.world.turn;
            if let Some(n) = self.world.settlement_mut(settlement)?.as_native_mut() {
                n.last_tribute_turn = Some(turn);
            }
        }
        self.alarm_changed(player, settlement, tribute_tension, cs)?;
        self.set_moves(unit, 0, cs)?;
        info!(?player, ?settlement, gold, "tribute demanded from natives");
        cs.add_message(See::Only(player), Notice::TributePaid { settlement, gold });
        Ok(())
    }

    fn demand_tribute_colony(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        owner: PlayerId,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let max = self.world.player(owner)?.gold.clamp(0, u32::MAX as i64) as u32;
        let request = DecisionRequest::SelectTributeAmount { settlement, max };
        let amount = match ask(decisions, player, request.clone())? {
            DecisionAnswer::Amount(None) => return Ok(()),
            DecisionAnswer::Amount(Some(amount)) if amount > 0 && amount <= max => amount,
            _ => return Err(GameError::UnexpectedAnswer { request }),
        };
        let request = DecisionRequest::AcceptTributeDemand {
            demander: player,
            settlement,
            amount,
        };
        let accepted = confirm(decisions, owner, request)?;
        if accepted {
            self.spend_gold(owner, amount as i64, cs)?;
            self.earn_gold(player, amount as i64, cs)?;
        } else {
            self.world.modify_tension(owner, player, TENSION_ADD_NORMAL);
        }
        self.set_moves(unit, 0, cs)?;
        info!(?player, ?owner, amount, accepted, "tribute demanded from colony");
        let notice = Notice::TributeDemanded {
            demander: player,
            settlement,
            amount,
            accepted,
        };
        cs.add_message(See::Only(player), notice.clone());
        cs.add_message(See::Only(owner), notice);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Trade sessions
    // ------------------------------------------------------------------

    pub(super) fn open_trade_session(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        let s = self.adjacent_settlement(unit, settlement)?;
        let Some(native) = s.as_native() else {
            return reject(Rejection::IllegalMove {
                move_type: MoveType::MoveNoAccessTrade,
            });
        };
        if !self.world.is_naval(&u) {
            return reject(Rejection::IllegalMove {
                move_type: MoveType::MoveNoAccessGoods,
            });
        }
        if u.moves_left == 0 && !self.sessions.is_open(unit, settlement) {
            return reject(Rejection::NoMovesLeft);
        }
        let session = self.sessions.open(&mut self.world, unit, settlement)?.clone();
        cs.add_private(player, PrivatePatch::MovesLeft { unit, moves_left: 0 });
        cs.add_message(
            See::Only(player),
            Notice::TradeSessionOpened {
                unit,
                settlement,
                can_buy: session.can_buy,
                can_sell: session.can_sell,
                can_gift: session.can_gift,
                for_sale: for_sale(native),
            },
        );
        Ok(())
    }

    /// Trade with a native settlement after sailing into it. Human players get
    /// a session to drive command by command; other seats negotiate at once.
    pub(super) fn carrier_enters_native_settlement(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        to: Position,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let (settlement, _, native) = self.native_at(to)?;
        if self.world.player(player)?.human {
            return self.open_trade_session(player, unit, settlement, cs);
        }
        let max_rounds = self.world.options.max_haggles + 1;
        SessionStore::transient(&mut self.world, unit, settlement, |world, session| {
            for _ in 0..max_rounds {
                let request = DecisionRequest::NativeTrade {
                    unit,
                    settlement,
                    can_buy: session.can_buy,
                    can_sell: session.can_sell,
                    can_gift: session.can_gift,
                    for_sale: for_sale(&native),
                };
                let (action, goods, amount) = match ask(decisions, player, request.clone())? {
                    DecisionAnswer::NativeTrade(NativeTradeAction::Done) => break,
                    DecisionAnswer::NativeTrade(NativeTradeAction::Buy { goods, amount }) => {
                        (SessionAction::Buy, goods, amount)
                    }
                    DecisionAnswer::NativeTrade(NativeTradeAction::Sell { goods, amount }) => {
                        (SessionAction::Sell, goods, amount)
                    }
                    DecisionAnswer::NativeTrade(NativeTradeAction::Gift { goods, amount }) => {
                        (SessionAction::Gift, goods, amount)
                    }
                    _ => return Err(GameError::UnexpectedAnswer { request }),
                };
                native_trade(world, session, action, goods, amount, None, cs)?;
                if session.action_taken() {
                    break;
                }
            }
            Ok(())
        })?;
        let moves_left = self.world.unit(unit)?.moves_left;
        cs.add_private(player, PrivatePatch::MovesLeft { unit, moves_left });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn session_trade(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        action: SessionAction,
        goods: GoodsTypeId,
        amount: u32,
        price: Option<u32>,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.owned_unit(player, unit)?;
        let session = self
            .sessions
            .get_mut(unit, settlement)
            .ok_or(GameError::SessionNotOpen { unit, settlement })?;
        native_trade(&mut self.world, session, action, goods, amount, price, cs)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn buy_from_natives(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        goods: GoodsTypeId,
        amount: u32,
        price: Option<u32>,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.session_trade(player, unit, settlement, SessionAction::Buy, goods, amount, price, cs)
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn sell_to_natives(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        goods: GoodsTypeId,
        amount: u32,
        price: Option<u32>,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.session_trade(player, unit, settlement, SessionAction::Sell, goods, amount, price, cs)
    }

    pub(super) fn gift_to_natives(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        goods: GoodsTypeId,
        amount: u32,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.session_trade(player, unit, settlement, SessionAction::Gift, goods, amount, None, cs)
    }

    pub(super) fn close_trade_session(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        settlement: SettlementId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.owned_unit(player, unit)?;
        self.sessions.close(&mut self.world, unit, settlement)?;
        let moves_left = self.world.unit(unit)?.moves_left;
        cs.add_private(player, PrivatePatch::MovesLeft { unit, moves_left });
        Ok(())
    }
}

fn for_sale(native: &NativeSettlement) -> Vec<GoodsAmount> {
    native
        .goods
        .iter()
        .filter(|(_, amount)| **amount > 0)
        .map(|(goods, amount)| GoodsAmount::new(*goods, *amount))
        .collect()
}

fn add_gold(world: &mut World, player: PlayerId, delta: i64, cs: &mut ChangeSet) -> Result<(), GameError> {
    let p = world.player_mut(player)?;
    p.gold += delta;
    if p.is_european() {
        cs.add_private(player, PrivatePatch::Gold { gold: p.gold });
    }
    Ok(())
}

/// Settles the price of a buy or sell. `None` means the natives turned the
/// offer down; the refusal uses up the session's action.
fn haggle(
    world: &mut World,
    session: &mut TradeSession,
    buying: bool,
    asking: u32,
    offer: Option<u32>,
    cs: &mut ChangeSet,
) -> Result<Option<u32>, GameError> {
    let Some(offer) = offer else {
        return Ok(Some(asking));
    };
    let in_our_favour = if buying { offer < asking } else { offer > asking };
    if !in_our_favour {
        return Ok(Some(offer));
    }
    let o = &world.options;
    let max = o.max_haggles;
    if session.haggles >= max {
        return reject(Rejection::HaggleRefused);
    }
    let margin = o.haggle_margin_pct;
    let success_pct = o.haggle_success_pct;
    let within = if buying {
        offer as u64 * 100 >= asking as u64 * (100 - margin.min(100)) as u64
    } else {
        offer as u64 * 100 <= asking as u64 * (100 + margin) as u64
    };
    if within && world.rng.chance(success_pct) {
        return Ok(Some(offer));
    }
    session.haggles += 1;
    session.record(if buying { SessionAction::Buy } else { SessionAction::Sell })?;
    debug!(unit = ?session.unit, haggles = session.haggles, "haggle failed");
    cs.add_message(
        See::Only(session.owner),
        Notice::HaggleFailed {
            settlement: session.settlement,
            attempts_left: max.saturating_sub(session.haggles),
        },
    );
    Ok(None)
}

/// One buy, sell or gift under the single-action rule.
fn native_trade(
    world: &mut World,
    session: &mut TradeSession,
    action: SessionAction,
    goods: GoodsTypeId,
    amount: u32,
    price: Option<u32>,
    cs: &mut ChangeSet,
) -> Result<(), GameError> {
    if session.action_taken() {
        return reject(Rejection::SessionActionTaken);
    }
    if !session.allows(action) {
        return reject(Rejection::CapabilityDenied);
    }
    let (player, unit, settlement) = (session.owner, session.unit, session.settlement);
    let Some(goods_type) = world.rules.goods_type(goods) else {
        return reject(Rejection::InsufficientGoods);
    };
    if amount == 0 {
        return reject(Rejection::InsufficientGoods);
    }
    let value = (goods_type.native_price as u64 * amount as u64 / 100) as u32;
    let s = world.settlement(settlement)?;
    let native_owner = s.owner;
    let native = s
        .as_native()
        .ok_or_else(|| GameError::Invariant(format!("{settlement:?} is not native")))?;
    let stock = native.goods_amount(goods);
    let wanted_pct = match native.wanted_goods.iter().position(|g| *g == goods) {
        Some(0) => WANTED_FIRST_PCT,
        Some(_) => WANTED_OTHER_PCT,
        None => 100,
    };
    let divisor = world.options.gift_tension_divisor.max(1);

    let gold = match action {
        SessionAction::Gift => {
            if world.unit(unit)?.goods_amount(goods) < amount {
                return reject(Rejection::InsufficientGoods);
            }
            session.record(action)?;
            world.unit_mut(unit)?.remove_cargo(goods, amount);
            native_goods(world, settlement, goods, amount as i64)?;
            let change = world.modify_alarm(settlement, player, -((value / divisor) as i32))?;
            if change.settlement_changed() {
                cs.add_private(
                    player,
                    PrivatePatch::SettlementAlarm {
                        settlement,
                        level: change.settlement_after,
                    },
                );
            }
            cs.add_message(
                See::Only(player),
                Notice::GiftAccepted {
                    settlement,
                    goods,
                    amount,
                },
            );
            0
        }
        SessionAction::Buy => {
            if stock < amount {
                return reject(Rejection::InsufficientGoods);
            }
            if !world.can_carry(world.unit(unit)?, goods, amount) {
                return reject(Rejection::NoCargoSpace);
            }
            let Some(agreed) = haggle(world, session, true, value, price, cs)? else {
                return Ok(());
            };
            let available = world.player(player)?.gold;
            if available < agreed as i64 {
                return reject(Rejection::InsufficientGold {
                    needed: agreed as i64,
                    available,
                });
            }
            session.record(action)?;
            native_goods(world, settlement, goods, -(amount as i64))?;
            world.unit_mut(unit)?.add_cargo(goods, amount);
            add_gold(world, player, -(agreed as i64), cs)?;
            add_gold(world, native_owner, agreed as i64, cs)?;
            -(agreed as i64)
        }
        SessionAction::Sell => {
            if world.unit(unit)?.goods_amount(goods) < amount {
                return reject(Rejection::InsufficientGoods);
            }
            let asking = (value as u64 * wanted_pct / 100) as u32;
            let Some(agreed) = haggle(world, session, false, asking, price, cs)? else {
                return Ok(());
            };
            session.record(action)?;
            world.unit_mut(unit)?.remove_cargo(goods, amount);
            native_goods(world, settlement, goods, amount as i64)?;
            add_gold(world, player, agreed as i64, cs)?;
            let natives = world.player_mut(native_owner)?;
            natives.gold = (natives.gold - agreed as i64).max(0);
            let change = world.modify_alarm(settlement, player, -((agreed / divisor / 2) as i32))?;
            if change.settlement_changed() {
                cs.add_private(
                    player,
                    PrivatePatch::SettlementAlarm {
                        settlement,
                        level: change.settlement_after,
                    },
                );
            }
            agreed as i64
        }
    };

    info!(?player, ?settlement, ?action, amount, gold, "native trade");
    let cargo = world.unit(unit)?.cargo.clone();
    cs.add_private(player, PrivatePatch::Cargo { unit, cargo });
    if action != SessionAction::Gift {
        cs.add_message(
            See::Only(player),
            Notice::NativeTradeDone {
                settlement,
                goods,
                amount,
                gold,
            },
        );
    }
    Ok(())
}

fn native_goods(
    world: &mut World,
    settlement: SettlementId,
    goods: GoodsTypeId,
    delta: i64,
) -> Result<(), GameError> {
    let native = world
        .settlement_mut(settlement)?
        .as_native_mut()
        .ok_or_else(|| GameError::Invariant(format!("{settlement:?} is not native")))?;
    let entry = native.goods.entry(goods).or_insert(0);
    *entry = (*entry as i64 + delta).max(0) as u32;
    Ok(())
}
