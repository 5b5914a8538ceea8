//! Authoritative command processing.
//!
//! `GameEngine::apply` runs one command to completion against a scratch copy
//! of the game and commits only on success, so a rejected or abandoned
//! command never leaves partial state behind.

mod attack;
mod diplomacy;
mod europe;
mod moves;
mod native;
mod turn;

use std::sync::Arc;

use colonia_protocol::{
    Command, Location, PlayerId, Position, PrivatePatch, Rejection, SettlementId, Stance, UnitId,
};
use tracing::{debug, error};

use crate::change::{ChangeSet, See};
use crate::combat::{CombatResolver, StrengthCombat};
use crate::decision::DecisionSource;
use crate::error::{reject, GameError};
use crate::session::SessionStore;
use crate::world::{Settlement, Unit, World};

pub use turn::VictoryCheck;

#[derive(Clone, Debug)]
pub struct GameEngine {
    world: World,
    sessions: SessionStore,
    combat: Arc<dyn CombatResolver>,
}

impl GameEngine {
    pub fn new(world: World) -> Self {
        Self::with_combat(world, Arc::new(StrengthCombat))
    }

    pub fn with_combat(world: World, combat: Arc<dyn CombatResolver>) -> Self {
        Self {
            world,
            sessions: SessionStore::new(),
            combat,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    /// Direct world access for scenario setup and tests.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    pub fn current_player(&self) -> PlayerId {
        self.world.current_player
    }

    /// Applies one command atomically.
    pub fn apply(
        &mut self,
        player: PlayerId,
        command: &Command,
        decisions: &mut dyn DecisionSource,
    ) -> Result<ChangeSet, GameError> {
        let mut scratch = self.clone();
        match scratch.dispatch(player, command, decisions) {
            Ok(cs) => {
                scratch.sessions.discard_disposed(&scratch.world);
                *self = scratch;
                Ok(cs)
            }
            Err(err) => {
                if err.is_contract_violation() {
                    error!(?player, ?command, %err, "contract violation");
                } else {
                    debug!(?player, %err, "command not applied");
                }
                Err(err)
            }
        }
    }

    fn dispatch(
        &mut self,
        player: PlayerId,
        command: &Command,
        decisions: &mut dyn DecisionSource,
    ) -> Result<ChangeSet, GameError> {
        if self.world.game_over.is_some() {
            return reject(Rejection::GameOver);
        }
        if self.world.player(player)?.dead {
            return reject(Rejection::NotYourTurn);
        }
        if !command.allowed_out_of_turn() && player != self.world.current_player {
            return reject(Rejection::NotYourTurn);
        }

        let mut cs = ChangeSet::new();
        match command {
            Command::MoveUnit { unit, direction } => {
                self.move_unit(player, *unit, *direction, decisions, &mut cs)?
            }
            Command::SetDestination { unit, destination } => {
                self.set_destination(player, *unit, *destination, &mut cs)?
            }
            Command::ClearOrders { unit } => self.clear_orders(player, *unit, &mut cs)?,
            Command::SetUnitState { unit, state } => {
                self.set_unit_state(player, *unit, *state, &mut cs)?
            }
            Command::Embark { unit, carrier } => self.embark(player, *unit, *carrier, &mut cs)?,
            Command::Disembark { unit } => self.disembark(player, *unit, &mut cs)?,
            Command::BuildColony { unit, name } => self.build_colony(player, *unit, name, &mut cs)?,
            Command::EquipRole { unit, role } => self.equip_role(player, *unit, *role, &mut cs)?,
            Command::LoadGoods {
                unit,
                goods,
                amount,
            } => self.load_goods(player, *unit, *goods, *amount, &mut cs)?,
            Command::UnloadGoods {
                unit,
                goods,
                amount,
            } => self.unload_goods(player, *unit, *goods, *amount, &mut cs)?,
            Command::CreateTradeRoute { name, stops } => {
                self.create_trade_route(player, name, stops, &mut cs)?
            }
            Command::AssignTradeRoute { unit, route } => {
                self.assign_trade_route(player, *unit, *route, &mut cs)?
            }
            Command::RecruitUnit => self.recruit_unit(player, &mut cs)?,
            Command::TrainUnit { unit_type } => self.train_unit(player, *unit_type, &mut cs)?,
            Command::SailToEurope { unit } => self.sail_to_europe(player, *unit, &mut cs)?,
            Command::SailToAmerica { unit } => self.sail_to_america(player, *unit, &mut cs)?,
            Command::OpenTradeSession { unit, settlement } => {
                self.open_trade_session(player, *unit, *settlement, &mut cs)?
            }
            Command::BuyGoods {
                unit,
                settlement,
                goods,
                amount,
                price,
            } => self.buy_from_natives(player, *unit, *settlement, *goods, *amount, *price, &mut cs)?,
            Command::SellGoods {
                unit,
                settlement,
                goods,
                amount,
                price,
            } => self.sell_to_natives(player, *unit, *settlement, *goods, *amount, *price, &mut cs)?,
            Command::GiveGift {
                unit,
                settlement,
                goods,
                amount,
            } => self.gift_to_natives(player, *unit, *settlement, *goods, *amount, &mut cs)?,
            Command::CloseTradeSession { unit, settlement } => {
                self.close_trade_session(player, *unit, *settlement, &mut cs)?
            }
            Command::DemandTribute { unit, settlement } => {
                self.demand_tribute(player, *unit, *settlement, decisions, &mut cs)?
            }
            Command::ProposeTrade { agreement, via } => {
                self.propose_trade(player, agreement.clone(), *via, decisions, &mut cs)?
            }
            Command::AnswerMonarch { action, accept } => {
                self.answer_monarch(player, *action, *accept, &mut cs)?
            }
            Command::ChooseFoundingFather { father } => {
                self.choose_founding_father(player, *father, &mut cs)?
            }
            Command::DeclareIndependence { nation_name } => {
                self.declare_independence(player, nation_name, &mut cs)?
            }
            Command::NameRegion { position, name } => {
                self.name_region(player, *position, name, &mut cs)?
            }
            Command::NameNewLand { name } => self.name_new_land(player, name, &mut cs)?,
            Command::ExecuteGotoOrders => self.execute_goto_orders(player, decisions, &mut cs)?,
            Command::EndTurn => self.end_turn(player, decisions, &mut cs)?,
        }
        Ok(cs)
    }

    // ------------------------------------------------------------------
    // Shared lookups
    // ------------------------------------------------------------------

    fn owned_unit(&self, player: PlayerId, unit: UnitId) -> Result<Unit, GameError> {
        let u = self.world.unit(unit)?;
        if u.owner != player {
            return reject(Rejection::NotYourUnit);
        }
        Ok(u.clone())
    }

    /// A foreign settlement next to (or around) the unit.
    fn adjacent_settlement(
        &self,
        unit: UnitId,
        settlement: SettlementId,
    ) -> Result<Settlement, GameError> {
        let s = self.world.settlement(settlement)?;
        let Some(pos) = self.world.unit_position(unit) else {
            return reject(Rejection::NotOnMap);
        };
        if pos.distance(s.position) > 1 {
            return reject(Rejection::NotAdjacent);
        }
        Ok(s.clone())
    }

    fn set_moves(&mut self, unit: UnitId, moves_left: u32, cs: &mut ChangeSet) -> Result<(), GameError> {
        let u = self.world.unit_mut(unit)?;
        if u.moves_left != moves_left {
            u.moves_left = moves_left;
            let owner = u.owner;
            cs.add_private(owner, PrivatePatch::MovesLeft { unit, moves_left });
        }
        Ok(())
    }

    fn gold_changed(&self, player: PlayerId, cs: &mut ChangeSet) -> Result<(), GameError> {
        let gold = self.world.player(player)?.gold;
        cs.add_private(player, PrivatePatch::Gold { gold });
        Ok(())
    }

    fn spend_gold(&mut self, player: PlayerId, amount: i64, cs: &mut ChangeSet) -> Result<(), GameError> {
        let p = self.world.player_mut(player)?;
        if p.gold < amount {
            return reject(Rejection::InsufficientGold {
                needed: amount,
                available: p.gold,
            });
        }
        p.gold -= amount;
        self.gold_changed(player, cs)
    }

    fn earn_gold(&mut self, player: PlayerId, amount: i64, cs: &mut ChangeSet) -> Result<(), GameError> {
        self.world.player_mut(player)?.gold += amount;
        self.gold_changed(player, cs)
    }

    /// Marks two players as having met.
    fn make_contact(&mut self, a: PlayerId, b: PlayerId, cs: &mut ChangeSet) {
        if a == b || self.world.stance(a, b) != Stance::Uncontacted {
            return;
        }
        self.world.set_stance(a, b, Stance::Peace);
        cs.add_stance(See::All, a, b, Stance::Peace);
        cs.add_message(See::Only(a), colonia_protocol::Notice::FirstContact { other: b });
        cs.add_message(See::Only(b), colonia_protocol::Notice::FirstContact { other: a });
        debug!(?a, ?b, "first contact");
    }

    /// Contact with every foreign unit or settlement next to `pos`.
    fn contact_around(&mut self, player: PlayerId, pos: Position, cs: &mut ChangeSet) {
        let mut met = Vec::new();
        for near in pos.square(1) {
            for id in self.world.units_near(near) {
                if let Some(u) = self.world.units.get(id) {
                    met.push(u.owner);
                }
            }
            if let Some(s) = self.world.settlement_at(near).and_then(|s| self.world.settlements.get(s)) {
                met.push(s.owner);
            }
        }
        met.sort();
        met.dedup();
        for other in met {
            self.make_contact(player, other, cs);
        }
    }

    /// Explores around a unit and syncs whatever came into view.
    fn reveal_around_unit(&mut self, unit: UnitId, cs: &mut ChangeSet) -> Result<(), GameError> {
        let (owner, radius) = {
            let u = self.world.unit(unit)?;
            (u.owner, self.world.unit_line_of_sight(u))
        };
        let Some(pos) = self.world.unit_position(unit) else {
            return Ok(());
        };
        self.reveal(owner, pos, radius, cs);
        Ok(())
    }

    /// Returns how many tiles were newly explored.
    fn reveal(&mut self, player: PlayerId, center: Position, radius: i32, cs: &mut ChangeSet) -> usize {
        let fresh = self.world.explore(player, center, radius);
        cs.add_explored(player, &fresh);
        let area: Vec<Position> = self.world.map.square(center, radius).collect();
        for pos in area {
            if let Some(s) = self.world.settlement_at(pos) {
                if self.world.settlements.get(s).is_some_and(|s| s.owner != player) {
                    cs.add(See::Only(player), colonia_protocol::ObjectId::Settlement(s));
                }
            }
            for id in self.world.units_at(pos) {
                if self.world.units.get(id).is_some_and(|u| u.owner != player) {
                    cs.add(See::Only(player), colonia_protocol::ObjectId::Unit(id));
                }
            }
        }
        fresh.len()
    }

    fn location_of(&self, unit: UnitId) -> Result<Location, GameError> {
        Ok(self.world.unit(unit)?.location)
    }
}
