//! Diplomatic trade negotiation between two European players.

use colonia_protocol::{
    DecisionAnswer, DecisionRequest, DiplomaticTrade, Notice, ObjectId, PlayerId, PrivatePatch,
    Rejection, TradeItem, TradeStatus, UnitId,
};
use tracing::{info, warn};

use crate::change::{ChangeSet, See};
use crate::controller::GameEngine;
use crate::decision::{ask, DecisionSource};
use crate::error::{reject, GameError};

impl GameEngine {
    pub(super) fn propose_trade(
        &mut self,
        player: PlayerId,
        agreement: DiplomaticTrade,
        via: Option<UnitId>,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let recipient = agreement.recipient;
        let valid_recipient = self
            .world
            .player(recipient)
            .is_ok_and(|p| p.is_european() && !p.dead);
        let parties_only = agreement
            .items
            .iter()
            .filter_map(TradeItem::giver)
            .all(|giver| giver == player || giver == recipient);
        if agreement.sender != player || recipient == player || !valid_recipient || !parties_only {
            return reject(Rejection::InvalidTrade);
        }
        if let Some(stance) = agreement.stance_item() {
            if !self.world.stance(player, recipient).can_transition_to(stance) {
                return reject(Rejection::InvalidStanceChange);
            }
        }
        if let Some(unit) = via {
            self.owned_unit(player, unit)?;
            self.sessions.close_for_unit(&mut self.world, unit);
            self.set_moves(unit, 0, cs)?;
        }

        let mut current = agreement.with_status(TradeStatus::Propose);
        let mut respondent = recipient;
        for _ in 0..self.world.options.max_trade_rounds.max(1) {
            let request = DecisionRequest::RespondToTrade {
                agreement: current.clone(),
            };
            let response = match ask(decisions, respondent, request.clone())? {
                DecisionAnswer::Trade(response) => response,
                _ => return Err(GameError::UnexpectedAnswer { request }),
            };
            let status = if !response.involves(player, recipient) {
                TradeStatus::Reject
            } else {
                match response.status {
                    TradeStatus::Accept if response.items != current.items => TradeStatus::Reject,
                    TradeStatus::Propose if response.sender != respondent => TradeStatus::Reject,
                    other => other,
                }
            };
            match status {
                TradeStatus::Accept => {
                    info!(?player, ?recipient, items = current.items.len(), "trade accepted");
                    self.apply_trade(&current, cs)?;
                    self.trade_outcome(player, recipient, true, cs);
                    return Ok(());
                }
                TradeStatus::Reject => break,
                TradeStatus::Propose => {
                    let version = current.version + 1;
                    current = response;
                    current.version = version;
                    respondent = current.other_party(respondent);
                }
            }
        }
        info!(?player, ?recipient, "trade rejected");
        self.trade_outcome(player, recipient, false, cs);
        Ok(())
    }

    fn trade_outcome(&self, a: PlayerId, b: PlayerId, accepted: bool, cs: &mut ChangeSet) {
        let notice = |with| {
            if accepted {
                Notice::TradeAccepted { with }
            } else {
                Notice::TradeRejected { with }
            }
        };
        cs.add_message(See::Only(a), notice(b));
        cs.add_message(See::Only(b), notice(a));
    }

    /// Applies an accepted agreement. Items that no longer hold are skipped.
    fn apply_trade(&mut self, agreement: &DiplomaticTrade, cs: &mut ChangeSet) -> Result<(), GameError> {
        let (a, b) = (agreement.sender, agreement.recipient);
        for item in &agreement.items {
            if !self.apply_item(a, b, item, cs)? {
                warn!(?item, "stale trade item skipped");
                let notice = Notice::TradeItemSkipped { item: item.clone() };
                cs.add_message(See::Only(a), notice.clone());
                cs.add_message(See::Only(b), notice);
            }
        }
        Ok(())
    }

    fn apply_item(
        &mut self,
        a: PlayerId,
        b: PlayerId,
        item: &TradeItem,
        cs: &mut ChangeSet,
    ) -> Result<bool, GameError> {
        let other = |from: PlayerId| if from == a { b } else { a };
        match item {
            TradeItem::Stance { stance } => {
                if !self.world.stance(a, b).can_transition_to(*stance) {
                    return Ok(false);
                }
                self.world.set_stance(a, b, *stance);
                cs.add_stance(See::All, a, b, *stance);
            }
            TradeItem::Gold { from, amount } => {
                let amount = *amount as i64;
                if self.world.player(*from)?.gold < amount {
                    return Ok(false);
                }
                self.spend_gold(*from, amount, cs)?;
                self.earn_gold(other(*from), amount, cs)?;
            }
            TradeItem::Goods {
                from,
                carrier,
                settlement,
                goods,
                amount,
            } => {
                let (Some(c), Some(s)) = (
                    self.world.units.get(*carrier),
                    self.world.settlements.get(*settlement),
                ) else {
                    return Ok(false);
                };
                let adjacent = self
                    .world
                    .unit_position(*carrier)
                    .is_some_and(|p| p.distance(s.position) <= 1);
                let (carrier_owner, colony_owner) = (c.owner, s.owner);
                let parties = [carrier_owner, colony_owner];
                if !adjacent || !s.is_colony() || !parties.contains(&a) || !parties.contains(&b) {
                    return Ok(false);
                }
                if *from == carrier_owner {
                    if c.goods_amount(*goods) < *amount {
                        return Ok(false);
                    }
                    self.world.unit_mut(*carrier)?.remove_cargo(*goods, *amount);
                    if let Some(colony) = self.world.settlement_mut(*settlement)?.as_colony_mut() {
                        colony.add_goods(*goods, *amount);
                    }
                } else {
                    let stocked = s.as_colony().is_some_and(|col| col.goods_amount(*goods) >= *amount);
                    if !stocked || !self.world.can_carry(c, *goods, *amount) {
                        return Ok(false);
                    }
                    if let Some(colony) = self.world.settlement_mut(*settlement)?.as_colony_mut() {
                        colony.remove_goods(*goods, *amount);
                    }
                    self.world.unit_mut(*carrier)?.add_cargo(*goods, *amount);
                }
                let cargo = self.world.unit(*carrier)?.cargo.clone();
                cs.add_private(carrier_owner, PrivatePatch::Cargo { unit: *carrier, cargo });
                if let Some(colony) = self.world.settlement(*settlement)?.as_colony() {
                    cs.add_private(
                        colony_owner,
                        PrivatePatch::ColonyGoods {
                            settlement: *settlement,
                            goods: colony.goods_list(),
                        },
                    );
                }
            }
            TradeItem::Colony { from, settlement } => {
                let owned = self
                    .world
                    .settlements
                    .get(*settlement)
                    .is_some_and(|s| s.owner == *from && s.is_colony());
                if !owned {
                    return Ok(false);
                }
                let to = other(*from);
                self.world.transfer_settlement(*settlement, to)?;
                cs.add(See::perhaps_always(*from), ObjectId::Settlement(*settlement));
                cs.add(See::Only(to), ObjectId::Settlement(*settlement));
                for tile in self.world.settlement_tiles(*settlement) {
                    cs.add(See::perhaps(), ObjectId::Tile(tile));
                }
                for inside in self.world.units_in(*settlement) {
                    cs.add(See::Only(*from), ObjectId::Unit(inside));
                    cs.add_unit(&self.world, inside);
                }
            }
            TradeItem::Unit { from, unit } => {
                let owned = self.world.units.get(*unit).is_some_and(|u| u.owner == *from);
                if !owned {
                    return Ok(false);
                }
                self.sessions.close_for_unit(&mut self.world, *unit);
                self.world.transfer_unit(*unit, other(*from));
                cs.add(See::Only(*from), ObjectId::Unit(*unit));
                cs.add_unit(&self.world, *unit);
                for passenger in self.world.units_aboard(*unit) {
                    cs.add_unit(&self.world, passenger);
                }
            }
        }
        Ok(true)
    }
}
