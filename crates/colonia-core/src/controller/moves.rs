use colonia_protocol::{
    DecisionAnswer, DecisionRequest, Direction, GoodsTypeId, Location, MoveType, Notice, ObjectId,
    PlayerId, PlayerKind, Position, PrivatePatch, PublicPatch, Rejection, RumourOutcome,
    SettlementId, TensionLevel, Terrain, TradeRouteId, TradeStop, UnitId, UnitRole, UnitState,
};
use tracing::{debug, info};

use crate::change::{ChangeSet, See};
use crate::controller::GameEngine;
use crate::decision::{ask, confirm, DecisionSource};
use crate::error::{reject, GameError};
use crate::movement::{classify, move_cost};
use crate::pathfind::{find_path, goal_tiles};
use crate::rules::FatherEffect;
use crate::world::{Colony, Orders, SettlementKind, TradeRoute, SLOT_SIZE};

/// Upper bound on steps a unit takes while following orders in one call.
const MAX_GOTO_STEPS: usize = 64;

impl GameEngine {
    pub(super) fn move_unit(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        direction: Direction,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.owned_unit(player, unit)?;
        let move_type = classify(&self.world, unit, direction)?;
        self.perform_move(player, unit, direction, move_type, decisions, cs)?;

        // A direct move that spends the last point cancels standing goto orders.
        if let Some(u) = self.world.units.get_mut(unit) {
            if u.moves_left == 0 && matches!(u.orders, Orders::Goto { .. }) {
                u.orders = Orders::None;
                cs.add_private(player, PrivatePatch::Destination { unit, destination: None });
            }
        }
        Ok(())
    }

    fn perform_move(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        direction: Direction,
        move_type: MoveType,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let Some(to) = crate::movement::target(&self.world, unit, direction) else {
            return reject(Rejection::NotOnMap);
        };
        match move_type {
            MoveType::Move | MoveType::ExploreLostCityRumour => {
                self.step_unit(unit, to, decisions, cs)
            }
            MoveType::MoveHighSeas => {
                let heading_to_europe = self.world.destination(self.world.unit(unit)?)
                    == Some(Location::Europe);
                let sail = heading_to_europe
                    || confirm(decisions, player, DecisionRequest::ConfirmHighSeas { unit })?;
                self.step_unit(unit, to, decisions, cs)?;
                if sail {
                    self.sail_to_europe(player, unit, cs)?;
                }
                Ok(())
            }
            MoveType::Embark => self.embark_at(player, unit, to, decisions, cs),
            MoveType::AttackUnit | MoveType::AttackSettlement => {
                self.attack(player, unit, to, decisions, cs)
            }
            MoveType::EnterNativeSettlementWithScout => {
                self.scout_native_settlement(player, unit, to, decisions, cs)
            }
            MoveType::EnterNativeSettlementWithMissionary => {
                self.missionary_at_settlement(player, unit, to, decisions, cs)
            }
            MoveType::EnterNativeSettlementWithColonist => {
                self.learn_skill(player, unit, to, decisions, cs)
            }
            MoveType::EnterForeignColonyWithScout => {
                self.scout_foreign_colony(player, unit, to, decisions, cs)
            }
            MoveType::EnterSettlementWithCarrierAndGoods => {
                self.carrier_enters_native_settlement(player, unit, to, decisions, cs)
            }
            MoveType::MoveNoAccessLand if !self.world.units_aboard(unit).is_empty() => {
                self.disembark_flow(player, unit, direction, decisions, cs)
            }
            illegal => reject(Rejection::IllegalMove {
                move_type: illegal,
            }),
        }
    }

    /// Relocates a unit by one tile and handles what it finds there.
    pub(super) fn step_unit(
        &mut self,
        unit: UnitId,
        to: Position,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let (owner, from, cost, naval, offensive) = {
            let u = self.world.unit(unit)?;
            (
                u.owner,
                u.location,
                move_cost(&self.world, u, to),
                self.world.is_naval(u),
                self.world.is_offensive(u),
            )
        };
        let from_position = self.world.unit_position(unit);
        let to_location = match self.world.settlement_at(to) {
            Some(settlement) => Location::Settlement { settlement },
            None => Location::tile(to),
        };
        let in_settlement = matches!(to_location, Location::Settlement { .. });
        {
            let u = self.world.unit_mut(unit)?;
            u.location = to_location;
            u.moves_left -= cost;
            u.state = if in_settlement && !naval && !offensive {
                UnitState::InColony
            } else {
                UnitState::Active
            };
        }
        cs.add_move(unit, owner, from, from_position, to_location);
        cs.add_private(
            owner,
            PrivatePatch::MovesLeft {
                unit,
                moves_left: self.world.unit(unit)?.moves_left,
            },
        );
        if let Location::Settlement { settlement } = to_location {
            cs.add(See::Only(owner), ObjectId::Settlement(settlement));
        }
        self.reveal_around_unit(unit, cs)?;
        for passenger in self.world.units_aboard(unit) {
            self.reveal_around_unit(passenger, cs)?;
        }
        self.contact_around(owner, to, cs);

        if self.world.map.get(to).is_some_and(|t| t.rumour) && !naval {
            self.explore_rumour(owner, unit, to, cs)?;
        }
        Ok(())
    }

    fn explore_rumour(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        pos: Position,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        if let Some(tile) = self.world.map.get_mut(pos) {
            tile.rumour = false;
        }
        cs.add(See::perhaps(), ObjectId::Tile(pos));

        let o = &self.world.options;
        let safe = self.world.has_father_effect(player, FatherEffect::SafeRumours);
        let native_owner = self
            .world
            .map
            .get(pos)
            .and_then(|t| t.owner)
            .filter(|owner| {
                self.world
                    .players
                    .get(owner.index())
                    .is_some_and(|p| p.kind == PlayerKind::Native)
            });
        let weights = [
            o.rumour_weight_nothing,
            o.rumour_weight_treasure,
            o.rumour_weight_colonist,
            if safe || native_owner.is_none() { 0 } else { o.rumour_weight_burial },
            if safe { 0 } else { o.rumour_weight_vanish },
        ];
        let (treasure_min, treasure_max) = (o.rumour_treasure_min, o.rumour_treasure_max);
        let pick = self.world.rng.pick_weighted(&weights).unwrap_or(0);

        let outcome = match pick {
            1 => {
                let gold = self.world.rng.between(treasure_min, treasure_max);
                self.earn_gold(player, gold as i64, cs)?;
                RumourOutcome::Treasure { gold }
            }
            2 => {
                let colonist = self.world.rules.special.colonist;
                let id = self
                    .world
                    .spawn_unit(player, colonist, UnitRole::Default, Location::tile(pos));
                if let Ok(u) = self.world.unit_mut(id) {
                    u.moves_left = 0;
                }
                cs.add_unit(&self.world, id);
                RumourOutcome::Colonist { unit: id }
            }
            3 => match native_owner {
                Some(native) => {
                    let current = self.world.player(native)?.tension_toward(player);
                    let raise = current.delta_to(TensionLevel::Angry.limit() + 1).max(0);
                    self.world.modify_tension(native, player, raise);
                    RumourOutcome::BurialGround { native }
                }
                None => RumourOutcome::Nothing,
            },
            4 => {
                cs.add_dispose_unit(&self.world, unit);
                self.world.dispose_unit(unit);
                RumourOutcome::ExpeditionVanishes
            }
            _ => RumourOutcome::Nothing,
        };
        info!(?player, ?outcome, "rumour explored");
        cs.add_message(See::Only(player), Notice::RumourExplored { unit, outcome });
        Ok(())
    }

    fn embark_at(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        to: Position,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let candidates: Vec<UnitId> = self
            .world
            .units_at(to)
            .into_iter()
            .filter(|id| {
                self.world.units.get(*id).is_some_and(|c| {
                    c.owner == player && self.world.is_naval(c) && self.world.free_slots(c) > 0
                })
            })
            .collect();
        let carrier = match candidates.as_slice() {
            [] => return Err(GameError::NoCarrierCandidates(unit)),
            [only] => *only,
            _ => {
                let request = DecisionRequest::ChooseCarrier {
                    unit,
                    candidates: candidates.clone(),
                };
                match ask(decisions, player, request.clone())? {
                    DecisionAnswer::Unit(chosen) if candidates.contains(&chosen) => chosen,
                    _ => return Err(GameError::UnexpectedAnswer { request }),
                }
            }
        };
        self.board(unit, carrier, cs)
    }

    fn board(&mut self, unit: UnitId, carrier: UnitId, cs: &mut ChangeSet) -> Result<(), GameError> {
        let from = self.location_of(unit)?;
        let from_position = self.world.unit_position(unit);
        let owner = {
            let u = self.world.unit_mut(unit)?;
            u.location = Location::Carrier { unit: carrier };
            u.state = UnitState::Sentry;
            u.moves_left = 0;
            u.owner
        };
        cs.add_move(
            unit,
            owner,
            from,
            from_position,
            Location::Carrier { unit: carrier },
        );
        cs.add_private(owner, PrivatePatch::MovesLeft { unit, moves_left: 0 });
        Ok(())
    }

    pub(super) fn embark(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        carrier: UnitId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        let c = self.owned_unit(player, carrier)?;
        let same_place = match (u.location, c.location) {
            (Location::Europe, Location::Europe) => true,
            (Location::Carrier { .. }, _) => false,
            _ => {
                self.world.unit_position(unit).is_some()
                    && self.world.unit_position(unit) == self.world.unit_position(carrier)
            }
        };
        if self.world.is_naval(&u)
            || !self.world.is_naval(&c)
            || !same_place
            || self.world.free_slots(&c) == 0
        {
            return reject(Rejection::CannotBoard);
        }
        if u.location != Location::Europe && u.moves_left == 0 {
            return reject(Rejection::NoMovesLeft);
        }
        self.board(unit, carrier, cs)
    }

    pub(super) fn disembark(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        let Location::Carrier { unit: carrier } = u.location else {
            return reject(Rejection::CannotDisembark);
        };
        let carrier_location = self.location_of(carrier)?;
        let (to, state) = match carrier_location {
            Location::Europe => (Location::Europe, UnitState::InEurope),
            Location::Settlement { settlement } => {
                let offensive = self.world.is_offensive(&u);
                let state = if offensive {
                    UnitState::Active
                } else {
                    UnitState::InColony
                };
                (Location::Settlement { settlement }, state)
            }
            _ => return reject(Rejection::CannotDisembark),
        };
        let from_position = self.world.unit_position(unit);
        {
            let u = self.world.unit_mut(unit)?;
            u.location = to;
            u.state = state;
        }
        cs.add_move(unit, player, u.location, from_position, to);
        if let Location::Settlement { settlement } = to {
            cs.add(See::Only(player), ObjectId::Settlement(settlement));
        }
        Ok(())
    }

    /// A carrier touching land without a settlement offers its passengers a landing.
    fn disembark_flow(
        &mut self,
        player: PlayerId,
        carrier: UnitId,
        direction: Direction,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let candidates: Vec<UnitId> = self
            .world
            .units_aboard(carrier)
            .into_iter()
            .filter(|id| self.world.units.get(*id).is_some_and(|u| u.moves_left > 0))
            .collect();
        if candidates.is_empty() {
            return reject(Rejection::IllegalMove {
                move_type: MoveType::MoveNoAccessLand,
            });
        }
        let request = DecisionRequest::ChooseDisembark {
            carrier,
            candidates: candidates.clone(),
        };
        let chosen = match ask(decisions, player, request.clone())? {
            DecisionAnswer::Units(units) if units.iter().all(|u| candidates.contains(u)) => units,
            _ => return Err(GameError::UnexpectedAnswer { request }),
        };
        for passenger in chosen {
            let move_type = classify(&self.world, passenger, direction)?;
            if !move_type.is_progress() {
                return reject(Rejection::IllegalMove { move_type });
            }
            self.perform_move(player, passenger, direction, move_type, decisions, cs)?;
        }
        Ok(())
    }

    pub(super) fn build_colony(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        name: &str,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        let name = name.trim();
        if name.is_empty() {
            return reject(Rejection::EmptyName);
        }
        let Location::Tile { position } = u.location else {
            return reject(Rejection::CannotBuildColony);
        };
        if self.world.is_naval(&u) || u.moves_left == 0 || !self.world.map.is_land(position) {
            return reject(Rejection::CannotBuildColony);
        }
        let crowded = self
            .world
            .map
            .square(position, 1)
            .any(|p| self.world.settlement_at(p).is_some());
        let claimed = self
            .world
            .map
            .get(position)
            .and_then(|t| t.owner)
            .is_some_and(|o| o != player);
        if crowded || claimed {
            return reject(Rejection::CannotBuildColony);
        }

        let settlement = self.world.add_settlement(
            player,
            name,
            position,
            SettlementKind::Colony(Colony::default()),
        )?;
        {
            let u = self.world.unit_mut(unit)?;
            u.location = Location::Settlement { settlement };
            u.state = UnitState::InColony;
            u.moves_left = 0;
            u.orders = Orders::None;
        }
        info!(?player, name, ?position, "colony founded");
        cs.add(See::perhaps_always(player), ObjectId::Settlement(settlement));
        for tile in self.world.settlement_tiles(settlement) {
            cs.add(See::perhaps_always(player), ObjectId::Tile(tile));
        }
        cs.add_move(
            unit,
            player,
            u.location,
            Some(position),
            Location::Settlement { settlement },
        );
        let radius = self.world.settlement(settlement)?.radius + 1;
        self.reveal(player, position, radius, cs);
        self.contact_around(player, position, cs);
        Ok(())
    }

    pub(super) fn set_destination(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        destination: Option<Location>,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        if u.trade_route().is_some() {
            return reject(Rejection::TradeRouteAssigned);
        }
        let orders = match destination {
            None => Orders::None,
            Some(dest) => {
                let valid = match dest {
                    Location::Tile { position } => self.world.map.in_bounds(position),
                    Location::Settlement { settlement } => {
                        self.world.settlements.contains(settlement)
                    }
                    Location::Europe => self.world.is_naval(&u),
                    Location::HighSeas | Location::Carrier { .. } => false,
                };
                if !valid {
                    return reject(Rejection::InvalidDestination);
                }
                Orders::Goto { destination: dest }
            }
        };
        self.world.unit_mut(unit)?.orders = orders;
        cs.add_private(player, PrivatePatch::Destination { unit, destination });
        Ok(())
    }

    pub(super) fn clear_orders(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        self.owned_unit(player, unit)?;
        let u = self.world.unit_mut(unit)?;
        u.orders = Orders::None;
        if u.state.is_player_settable() || u.state == UnitState::Fortified {
            u.state = UnitState::Active;
        }
        let state = u.state;
        cs.add_private(player, PrivatePatch::Destination { unit, destination: None });
        cs.add_private(player, PrivatePatch::UnitState { unit, state });
        Ok(())
    }

    pub(super) fn set_unit_state(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        state: UnitState,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        let allowed_here = !matches!(u.location, Location::Europe | Location::HighSeas)
            && (state != UnitState::Fortifying
                || !matches!(u.location, Location::Carrier { .. }));
        if !state.is_player_settable() || !allowed_here {
            return reject(Rejection::InvalidUnitState);
        }
        self.world.unit_mut(unit)?.state = state;
        if state == UnitState::Fortifying {
            self.set_moves(unit, 0, cs)?;
        }
        cs.add_private(player, PrivatePatch::UnitState { unit, state });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Cargo
    // ------------------------------------------------------------------

    pub(super) fn load_goods(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        goods: GoodsTypeId,
        amount: u32,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        if amount == 0 || !self.world.is_naval(&u) {
            return reject(Rejection::NoCargoSpace);
        }
        if !self.world.can_carry(&u, goods, amount) {
            return reject(Rejection::NoCargoSpace);
        }
        match u.location {
            Location::Settlement { settlement } => {
                let colony = self.own_colony_mut(player, settlement)?;
                if !colony.remove_goods(goods, amount) {
                    return reject(Rejection::InsufficientGoods);
                }
                let stock = colony.goods_list();
                cs.add_private(player, PrivatePatch::ColonyGoods { settlement, goods: stock });
            }
            Location::Europe => self.buy_in_europe(player, goods, amount, cs)?,
            _ => return reject(Rejection::NotYourSettlement),
        }
        let u = self.world.unit_mut(unit)?;
        u.add_cargo(goods, amount);
        let cargo = u.cargo.clone();
        cs.add_private(player, PrivatePatch::Cargo { unit, cargo });
        Ok(())
    }

    pub(super) fn unload_goods(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        goods: GoodsTypeId,
        amount: u32,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        if amount == 0 || u.goods_amount(goods) < amount {
            return reject(Rejection::InsufficientGoods);
        }
        match u.location {
            Location::Settlement { settlement } => {
                let colony = self.own_colony_mut(player, settlement)?;
                colony.add_goods(goods, amount);
                let stock = colony.goods_list();
                cs.add_private(player, PrivatePatch::ColonyGoods { settlement, goods: stock });
            }
            Location::Europe => self.sell_in_europe(player, goods, amount, cs)?,
            _ => return reject(Rejection::NotYourSettlement),
        }
        let u = self.world.unit_mut(unit)?;
        u.remove_cargo(goods, amount);
        let cargo = u.cargo.clone();
        cs.add_private(player, PrivatePatch::Cargo { unit, cargo });
        Ok(())
    }

    pub(super) fn own_colony_mut(
        &mut self,
        player: PlayerId,
        settlement: SettlementId,
    ) -> Result<&mut Colony, GameError> {
        let s = self.world.settlement_mut(settlement)?;
        if s.owner != player {
            return reject(Rejection::NotYourSettlement);
        }
        match s.as_colony_mut() {
            Some(colony) => Ok(colony),
            None => reject(Rejection::NotYourSettlement),
        }
    }

    // ------------------------------------------------------------------
    // Trade routes and goto orders
    // ------------------------------------------------------------------

    pub(super) fn create_trade_route(
        &mut self,
        player: PlayerId,
        name: &str,
        stops: &[TradeStop],
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let name = name.trim();
        if name.is_empty() {
            return reject(Rejection::EmptyName);
        }
        let valid = stops.len() >= 2
            && stops.iter().all(|stop| {
                self.world
                    .settlements
                    .get(stop.settlement)
                    .is_some_and(|s| s.owner == player && s.is_colony())
            });
        if !valid {
            return reject(Rejection::InvalidTradeRoute);
        }
        let id = self.world.trade_routes.insert_with(|id| TradeRoute {
            id,
            owner: player,
            name: name.to_string(),
            stops: stops.to_vec(),
        });
        cs.add(See::Only(player), ObjectId::TradeRoute(id));
        Ok(())
    }

    pub(super) fn assign_trade_route(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        route: Option<TradeRouteId>,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let u = self.owned_unit(player, unit)?;
        let orders = match route {
            None => Orders::None,
            Some(route) => {
                let r = self.world.trade_route(route)?;
                let carrier = self
                    .world
                    .rules
                    .unit_type(u.unit_type)
                    .is_some_and(|t| t.space > 0);
                if r.owner != player || !carrier {
                    return reject(Rejection::InvalidTradeRoute);
                }
                Orders::Route { route, stop: 0 }
            }
        };
        let u = self.world.unit_mut(unit)?;
        u.orders = orders;
        let destination = self.world.destination(self.world.unit(unit)?);
        cs.add_private(player, PrivatePatch::Destination { unit, destination });
        cs.add_unit(&self.world, unit);
        Ok(())
    }

    /// Moves every unit of `player` with standing orders, ordered by trade
    /// route name (plain goto orders first) and then unit id.
    pub(super) fn execute_goto_orders(
        &mut self,
        player: PlayerId,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let mut queue: Vec<(String, UnitId)> = self
            .world
            .units
            .iter_ordered()
            .filter(|(_, u)| u.owner == player && u.has_orders())
            .map(|(id, u)| {
                let route_name = u
                    .trade_route()
                    .and_then(|r| self.world.trade_routes.get(r))
                    .map(|r| r.name.clone())
                    .unwrap_or_default();
                (route_name, id)
            })
            .collect();
        queue.sort();
        for (_, unit) in queue {
            if self.world.units.contains(unit) {
                self.follow_orders(player, unit, decisions, cs)?;
            }
        }
        Ok(())
    }

    fn follow_orders(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        decisions: &mut dyn DecisionSource,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        for _ in 0..MAX_GOTO_STEPS {
            let Some(u) = self.world.units.get(unit) else {
                return Ok(());
            };
            if u.moves_left == 0 || self.world.unit_position(unit).is_none() {
                return Ok(());
            }
            let Some(destination) = self.world.destination(u) else {
                return Ok(());
            };
            let goals = goal_tiles(&self.world, unit, destination);
            let here = self.world.unit_position(unit);
            let arrived = match destination {
                Location::Settlement { settlement } => {
                    u.location == Location::Settlement { settlement }
                }
                Location::Europe => false,
                _ => here.is_some_and(|p| goals.contains(&p)),
            };
            if arrived {
                return self.arrive(player, unit, cs);
            }
            if destination == Location::Europe
                && here.is_some_and(|p| self.world.map.terrain(p) == Some(Terrain::HighSeas))
            {
                self.sail_to_europe(player, unit, cs)?;
                return Ok(());
            }

            let Some(path) = find_path(&self.world, unit, &goals) else {
                // Blocked for now; try again next turn.
                debug!(?unit, ?destination, "no path, skipping");
                self.world.unit_mut(unit)?.state = UnitState::Skipped;
                cs.add_private(player, PrivatePatch::UnitState { unit, state: UnitState::Skipped });
                return Ok(());
            };
            let Some(direction) = path.first().copied() else {
                return Ok(());
            };
            let move_type = classify(&self.world, unit, direction)?;
            if !move_type.is_progress() {
                debug!(?unit, ?move_type, "goto step failed, clearing orders");
                self.world.unit_mut(unit)?.orders = Orders::None;
                cs.add_private(player, PrivatePatch::Destination { unit, destination: None });
                return Ok(());
            }
            let to = crate::movement::target(&self.world, unit, direction)
                .ok_or(GameError::Invariant("goto target off map".into()))?;
            self.step_unit(unit, to, decisions, cs)?;
        }
        Ok(())
    }

    /// Handles reaching the current destination. Route units advance to their
    /// next stop; plain goto orders are finished.
    fn arrive(&mut self, player: PlayerId, unit: UnitId, cs: &mut ChangeSet) -> Result<(), GameError> {
        let orders = self.world.unit(unit)?.orders.clone();
        match orders {
            Orders::Route { route, stop } => {
                let r = self.world.trade_route(route)?.clone();
                if let Some(current) = r.stops.get(stop) {
                    self.service_stop(player, unit, current, cs)?;
                }
                let next = (stop + 1) % r.stops.len().max(1);
                self.world.unit_mut(unit)?.orders = Orders::Route { route, stop: next };
                let destination = self.world.destination(self.world.unit(unit)?);
                cs.add_private(player, PrivatePatch::Destination { unit, destination });
                // A unit servicing a stop is done for the turn.
                self.set_moves(unit, 0, cs)
            }
            _ => {
                let u = self.world.unit_mut(unit)?;
                u.orders = Orders::None;
                u.state = if u.state == UnitState::InColony {
                    UnitState::InColony
                } else {
                    UnitState::Active
                };
                cs.add_private(player, PrivatePatch::Destination { unit, destination: None });
                Ok(())
            }
        }
    }

    /// Unloads everything not loaded at this stop, then fills up with what is.
    fn service_stop(
        &mut self,
        player: PlayerId,
        unit: UnitId,
        stop: &TradeStop,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let settlement = stop.settlement;
        if self.world.settlement(settlement)?.owner != player {
            return Ok(());
        }
        let cargo = self.world.unit(unit)?.cargo.clone();
        for item in cargo.iter().filter(|g| !stop.load.contains(&g.goods)) {
            self.own_colony_mut(player, settlement)?
                .add_goods(item.goods, item.amount);
            self.world.unit_mut(unit)?.remove_cargo(item.goods, item.amount);
        }
        for goods in &stop.load {
            let available = self.own_colony_mut(player, settlement)?.goods_amount(*goods);
            let amount = available.min(self.room_for(unit, *goods)?);
            if amount == 0 {
                continue;
            }
            self.own_colony_mut(player, settlement)?
                .remove_goods(*goods, amount);
            self.world.unit_mut(unit)?.add_cargo(*goods, amount);
        }
        let stock = self.own_colony_mut(player, settlement)?.goods_list();
        cs.add_private(player, PrivatePatch::ColonyGoods { settlement, goods: stock });
        let cargo = self.world.unit(unit)?.cargo.clone();
        cs.add_private(player, PrivatePatch::Cargo { unit, cargo });
        Ok(())
    }

    /// Largest amount of `goods` that still fits aboard.
    fn room_for(&self, unit: UnitId, goods: GoodsTypeId) -> Result<u32, GameError> {
        let u = self.world.unit(unit)?;
        let held = u.goods_amount(goods);
        let slots = self.world.free_slots(u) + held.div_ceil(SLOT_SIZE);
        Ok((slots * SLOT_SIZE).saturating_sub(held))
    }

    // ------------------------------------------------------------------
    // Naming
    // ------------------------------------------------------------------

    pub(super) fn name_region(
        &mut self,
        player: PlayerId,
        position: Position,
        name: &str,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let name = name.trim();
        if name.is_empty() {
            return reject(Rejection::EmptyName);
        }
        if !self.world.player(player)?.explored.contains(&position) {
            return reject(Rejection::NotOnMap);
        }
        self.world
            .player_mut(player)?
            .region_names
            .insert(position, name.to_string());
        if let Some(tile) = self.world.map.get_mut(position) {
            tile.region = Some(name.to_string());
        }
        cs.add(See::perhaps_always(player), ObjectId::Tile(position));
        cs.add_message(
            See::Only(player),
            Notice::RegionNamed {
                position,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    pub(super) fn name_new_land(
        &mut self,
        player: PlayerId,
        name: &str,
        cs: &mut ChangeSet,
    ) -> Result<(), GameError> {
        let name = name.trim();
        if name.is_empty() {
            return reject(Rejection::EmptyName);
        }
        self.world.player_mut(player)?.new_land_name = Some(name.to_string());
        cs.add_message(
            See::All,
            Notice::NewLandNamed {
                player,
                name: name.to_string(),
            },
        );
        Ok(())
    }

    /// Role change shared by colony and Europe equipping.
    pub(super) fn change_role(&mut self, unit: UnitId, role: UnitRole, cs: &mut ChangeSet) -> Result<(), GameError> {
        self.world.unit_mut(unit)?.role = role;
        let moves = self.world.unit_moves(self.world.unit(unit)?);
        let u = self.world.unit_mut(unit)?;
        u.moves_left = u.moves_left.min(moves);
        cs.add_public(See::perhaps_always(u.owner), PublicPatch::UnitRole { unit, role });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::NoDecisions;
    use crate::setup::WorldBuilder;

    #[test]
    fn embark_without_a_carrier_is_a_contract_violation() {
        let mut b = WorldBuilder::new(6, 4, Terrain::Plains).unwrap();
        b.terrain(Position::new(1, 1), Terrain::Ocean);
        let dutch = b.player("Dutch", PlayerKind::Colonial, true);
        let colonist = b.unit(dutch, "free_colonist", UnitRole::Default, Position::new(2, 1));
        let mut engine = GameEngine::new(b.build().unwrap());

        // The water is empty, so classification would never say Embark here.
        assert_eq!(
            classify(&engine.world, colonist, Direction::W).unwrap(),
            MoveType::MoveNoAccessWater
        );
        let mut cs = ChangeSet::new();
        let err = engine
            .perform_move(dutch, colonist, Direction::W, MoveType::Embark, &mut NoDecisions, &mut cs)
            .unwrap_err();
        assert_eq!(err, GameError::NoCarrierCandidates(colonist));
        assert!(err.is_contract_violation());
        assert!(cs.is_empty());
    }
}
