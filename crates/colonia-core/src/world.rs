//! Authoritative world model.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use colonia_protocol::{
    DecisionRequest, FatherId, GoodsAmount, GoodsTypeId, Location, MonarchAction, ObjectId,
    PlayerId, PlayerKind, PlayerSnapshot, Position, SettlementId, SettlementSnapshot,
    SettlementView, Stance, StanceEntry, TensionLevel, TradeRouteId, TradeRouteSnapshot,
    TradeStop, UnitId, UnitRole, UnitSnapshot, UnitState, UnitTypeId, VictoryReason, WorldView,
};

use crate::entities::EntityStore;
use crate::error::GameError;
use crate::map::GameMap;
use crate::market::Market;
use crate::options::GameOptions;
use crate::rng::GameRng;
use crate::rules::{Expertise, FatherEffect, Rules, UnitType};
use crate::tension::Tension;

/// Goods per cargo slot.
pub const SLOT_SIZE: u32 = 100;
/// Settlement claim radius and sight bonus.
pub const COLONY_RADIUS: i32 = 1;
pub const NATIVE_RADIUS: i32 = 2;

/// A crown offer waiting for the player's answer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingMonarch {
    RaiseTax { tax: u8, goods: GoodsTypeId },
    Mercenaries { price: u32, units: Vec<UnitTypeId> },
}

impl PendingMonarch {
    pub fn action(&self) -> MonarchAction {
        match self {
            PendingMonarch::RaiseTax { .. } => MonarchAction::RaiseTax,
            PendingMonarch::Mercenaries { .. } => MonarchAction::OfferMercenaries,
        }
    }

    pub fn request(&self) -> DecisionRequest {
        match self {
            PendingMonarch::RaiseTax { tax, goods } => DecisionRequest::MonarchRaiseTax {
                goods: *goods,
                tax: *tax,
            },
            PendingMonarch::Mercenaries { price, units } => DecisionRequest::MonarchMercenaries {
                price: *price,
                units: units.clone(),
            },
        }
    }
}

#[derive(Clone, Debug)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub kind: PlayerKind,
    pub human: bool,
    pub connected: bool,
    pub dead: bool,
    pub gold: i64,
    pub tax: u8,
    pub score: i32,
    pub immigration: i32,
    pub immigration_required: i32,
    pub liberty: i32,
    pub current_father: Option<FatherId>,
    pub father_offers: Vec<FatherId>,
    pub fathers: BTreeSet<FatherId>,
    /// This player's tension toward others.
    pub tension: BTreeMap<PlayerId, Tension>,
    pub explored: BTreeSet<Position>,
    pub market: Market,
    /// Royal units held in reserve against this player's rebellion.
    pub royal_force: BTreeMap<UnitTypeId, u32>,
    /// Royal player fighting this rebel, or rebel fought by this royal player.
    pub opponent: Option<PlayerId>,
    /// Where ships arriving from Europe are placed.
    pub entry_location: Option<Position>,
    pub region_names: BTreeMap<Position, String>,
    pub new_land_name: Option<String>,
    pub pending_monarch: Vec<PendingMonarch>,
    /// Natives only: players whose missionaries are turned away.
    pub missions_banned: BTreeSet<PlayerId>,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: impl Into<String>,
        kind: PlayerKind,
        human: bool,
        rules: &Rules,
        options: &GameOptions,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            human,
            connected: true,
            dead: false,
            gold: 0,
            tax: 0,
            score: 0,
            immigration: 0,
            immigration_required: options.immigration_required_initial,
            liberty: 0,
            current_father: None,
            father_offers: Vec::new(),
            fathers: BTreeSet::new(),
            tension: BTreeMap::new(),
            explored: BTreeSet::new(),
            market: Market::new(rules),
            royal_force: BTreeMap::new(),
            opponent: None,
            entry_location: None,
            region_names: BTreeMap::new(),
            new_land_name: None,
            pending_monarch: Vec::new(),
            missions_banned: BTreeSet::new(),
        }
    }

    pub fn tension_toward(&self, other: PlayerId) -> Tension {
        self.tension.get(&other).copied().unwrap_or_default()
    }

    pub fn is_european(&self) -> bool {
        self.kind.is_european()
    }

    pub fn is_active(&self) -> bool {
        !self.dead
    }
}

/// Standing orders. A trade route owns the destination: it is read from the
/// current stop and cannot be set independently.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Orders {
    #[default]
    None,
    Goto {
        destination: Location,
    },
    Route {
        route: TradeRouteId,
        stop: usize,
    },
}

#[derive(Clone, Debug)]
pub struct Unit {
    pub id: UnitId,
    pub owner: PlayerId,
    pub unit_type: UnitTypeId,
    pub role: UnitRole,
    pub location: Location,
    pub state: UnitState,
    pub moves_left: u32,
    pub orders: Orders,
    pub cargo: Vec<GoodsAmount>,
    /// Turns left on the current crossing.
    pub work_left: u32,
}

impl Unit {
    pub fn goods_amount(&self, goods: GoodsTypeId) -> u32 {
        self.cargo
            .iter()
            .filter(|g| g.goods == goods)
            .map(|g| g.amount)
            .sum()
    }

    pub fn has_orders(&self) -> bool {
        self.orders != Orders::None
    }

    pub fn trade_route(&self) -> Option<TradeRouteId> {
        match self.orders {
            Orders::Route { route, .. } => Some(route),
            _ => None,
        }
    }

    pub(crate) fn add_cargo(&mut self, goods: GoodsTypeId, amount: u32) {
        if let Some(entry) = self.cargo.iter_mut().find(|g| g.goods == goods) {
            entry.amount += amount;
        } else if amount > 0 {
            self.cargo.push(GoodsAmount::new(goods, amount));
        }
    }

    pub(crate) fn remove_cargo(&mut self, goods: GoodsTypeId, amount: u32) -> bool {
        let Some(entry) = self.cargo.iter_mut().find(|g| g.goods == goods) else {
            return false;
        };
        if entry.amount < amount {
            return false;
        }
        entry.amount -= amount;
        self.cargo.retain(|g| g.amount > 0);
        true
    }
}

#[derive(Clone, Debug, Default)]
pub struct Colony {
    pub goods: BTreeMap<GoodsTypeId, u32>,
    pub bells: i32,
}

impl Colony {
    pub fn goods_amount(&self, goods: GoodsTypeId) -> u32 {
        self.goods.get(&goods).copied().unwrap_or(0)
    }

    pub fn add_goods(&mut self, goods: GoodsTypeId, amount: u32) {
        *self.goods.entry(goods).or_default() += amount;
    }

    pub fn remove_goods(&mut self, goods: GoodsTypeId, amount: u32) -> bool {
        match self.goods.get_mut(&goods) {
            Some(have) if *have >= amount => {
                *have -= amount;
                true
            }
            _ => false,
        }
    }

    pub fn goods_list(&self) -> Vec<GoodsAmount> {
        self.goods
            .iter()
            .filter(|(_, amount)| **amount > 0)
            .map(|(goods, amount)| GoodsAmount::new(*goods, *amount))
            .collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct NativeSettlement {
    pub capital: bool,
    /// Alarm toward each foreign player.
    pub alarm: BTreeMap<PlayerId, Tension>,
    pub learnable_skill: Option<UnitTypeId>,
    pub missionary: Option<UnitId>,
    pub last_tribute_turn: Option<u32>,
    /// Players who have scouted this settlement.
    pub visited: BTreeSet<PlayerId>,
    pub wanted_goods: Vec<GoodsTypeId>,
    /// Multiplier for scouting gifts.
    pub bonus: u32,
    pub goods: BTreeMap<GoodsTypeId, u32>,
}

impl NativeSettlement {
    pub fn alarm(&self, player: PlayerId) -> Tension {
        self.alarm.get(&player).copied().unwrap_or_default()
    }

    pub fn has_visited(&self, player: PlayerId) -> bool {
        self.visited.contains(&player)
    }

    pub fn goods_amount(&self, goods: GoodsTypeId) -> u32 {
        self.goods.get(&goods).copied().unwrap_or(0)
    }
}

#[derive(Clone, Debug)]
pub enum SettlementKind {
    Colony(Colony),
    Native(NativeSettlement),
}

#[derive(Clone, Debug)]
pub struct Settlement {
    pub id: SettlementId,
    pub owner: PlayerId,
    pub name: String,
    pub position: Position,
    pub radius: i32,
    pub kind: SettlementKind,
}

impl Settlement {
    pub fn as_colony(&self) -> Option<&Colony> {
        match &self.kind {
            SettlementKind::Colony(c) => Some(c),
            SettlementKind::Native(_) => None,
        }
    }

    pub fn as_colony_mut(&mut self) -> Option<&mut Colony> {
        match &mut self.kind {
            SettlementKind::Colony(c) => Some(c),
            SettlementKind::Native(_) => None,
        }
    }

    pub fn as_native(&self) -> Option<&NativeSettlement> {
        match &self.kind {
            SettlementKind::Native(n) => Some(n),
            SettlementKind::Colony(_) => None,
        }
    }

    pub fn as_native_mut(&mut self) -> Option<&mut NativeSettlement> {
        match &mut self.kind {
            SettlementKind::Native(n) => Some(n),
            SettlementKind::Colony(_) => None,
        }
    }

    pub fn is_colony(&self) -> bool {
        matches!(self.kind, SettlementKind::Colony(_))
    }
}

#[derive(Clone, Debug)]
pub struct TradeRoute {
    pub id: TradeRouteId,
    pub owner: PlayerId,
    pub name: String,
    pub stops: Vec<TradeStop>,
}

/// Level change caused by an alarm modification, for the settlement and its owner.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AlarmChange {
    pub settlement_before: TensionLevel,
    pub settlement_after: TensionLevel,
    pub owner_before: TensionLevel,
    pub owner_after: TensionLevel,
}

impl AlarmChange {
    pub fn settlement_changed(&self) -> bool {
        self.settlement_before != self.settlement_after
    }
}

#[derive(Clone, Debug)]
pub struct World {
    pub rules: Arc<Rules>,
    pub options: GameOptions,
    pub map: GameMap,
    pub players: Vec<Player>,
    stances: BTreeMap<(PlayerId, PlayerId), Stance>,
    pub units: EntityStore<Unit>,
    pub settlements: EntityStore<Settlement>,
    pub trade_routes: EntityStore<TradeRoute>,
    pub turn: u32,
    pub current_player: PlayerId,
    pub rng: GameRng,
    pub game_over: Option<(Option<PlayerId>, VictoryReason)>,
    pub spanish_succession_done: bool,
    pub ai_turn_skip: u32,
}

fn stance_key(a: PlayerId, b: PlayerId) -> (PlayerId, PlayerId) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

impl World {
    pub fn new(rules: Arc<Rules>, options: GameOptions, map: GameMap, seed: u64) -> Self {
        let ai_turn_skip = options.ai_turn_skip;
        Self {
            rules,
            options,
            map,
            players: Vec::new(),
            stances: BTreeMap::new(),
            units: EntityStore::default(),
            settlements: EntityStore::default(),
            trade_routes: EntityStore::default(),
            turn: 1,
            current_player: PlayerId(0),
            rng: GameRng::seed_from_u64(seed),
            game_over: None,
            spanish_succession_done: false,
            ai_turn_skip,
        }
    }

    // ------------------------------------------------------------------
    // Players and stances
    // ------------------------------------------------------------------

    pub fn add_player(&mut self, name: &str, kind: PlayerKind, human: bool) -> PlayerId {
        let id = PlayerId(self.players.len() as u8);
        let player = Player::new(id, name, kind, human, &self.rules, &self.options);
        self.players.push(player);
        id
    }

    pub fn player(&self, id: PlayerId) -> Result<&Player, GameError> {
        self.players
            .get(id.index())
            .ok_or(GameError::UnknownPlayer(id))
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Result<&mut Player, GameError> {
        self.players
            .get_mut(id.index())
            .ok_or(GameError::UnknownPlayer(id))
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.iter().map(|p| p.id).collect()
    }

    pub fn stance(&self, a: PlayerId, b: PlayerId) -> Stance {
        if a == b {
            return Stance::Peace;
        }
        self.stances
            .get(&stance_key(a, b))
            .copied()
            .unwrap_or(Stance::Uncontacted)
    }

    pub fn set_stance(&mut self, a: PlayerId, b: PlayerId, stance: Stance) {
        if a != b {
            self.stances.insert(stance_key(a, b), stance);
        }
    }

    pub fn at_war(&self, a: PlayerId, b: PlayerId) -> bool {
        self.stance(a, b) == Stance::War
    }

    pub fn has_father_effect(&self, player: PlayerId, effect: FatherEffect) -> bool {
        self.players.get(player.index()).is_some_and(|p| {
            p.fathers
                .iter()
                .any(|f| self.rules.father(*f).is_some_and(|f| f.effect == effect))
        })
    }

    pub fn modify_tension(&mut self, owner: PlayerId, toward: PlayerId, delta: i32) {
        if let Some(player) = self.players.get_mut(owner.index()) {
            player.tension.entry(toward).or_default().modify(delta);
        }
    }

    /// Changes a native settlement's alarm toward `player` and propagates to its
    /// owner: in full from a capital, halved otherwise.
    pub fn modify_alarm(
        &mut self,
        settlement: SettlementId,
        player: PlayerId,
        delta: i32,
    ) -> Result<AlarmChange, GameError> {
        let s = self
            .settlements
            .get_mut(settlement)
            .ok_or(GameError::UnknownSettlement(settlement))?;
        let owner = s.owner;
        let native = s
            .as_native_mut()
            .ok_or_else(|| GameError::Invariant("alarm on a colony".into()))?;
        let entry = native.alarm.entry(player).or_default();
        let settlement_before = entry.level();
        entry.modify(delta);
        let settlement_after = entry.level();
        let propagated = if native.capital { delta } else { delta / 2 };

        let owner_player = self.player_mut(owner)?;
        let tension = owner_player.tension.entry(player).or_default();
        let owner_before = tension.level();
        tension.modify(propagated);
        let owner_after = tension.level();

        Ok(AlarmChange {
            settlement_before,
            settlement_after,
            owner_before,
            owner_after,
        })
    }

    // ------------------------------------------------------------------
    // Units
    // ------------------------------------------------------------------

    pub fn unit(&self, id: UnitId) -> Result<&Unit, GameError> {
        self.units.get(id).ok_or(GameError::UnknownUnit(id))
    }

    pub fn unit_mut(&mut self, id: UnitId) -> Result<&mut Unit, GameError> {
        self.units.get_mut(id).ok_or(GameError::UnknownUnit(id))
    }

    pub fn settlement(&self, id: SettlementId) -> Result<&Settlement, GameError> {
        self.settlements
            .get(id)
            .ok_or(GameError::UnknownSettlement(id))
    }

    pub fn settlement_mut(&mut self, id: SettlementId) -> Result<&mut Settlement, GameError> {
        self.settlements
            .get_mut(id)
            .ok_or(GameError::UnknownSettlement(id))
    }

    pub fn trade_route(&self, id: TradeRouteId) -> Result<&TradeRoute, GameError> {
        self.trade_routes
            .get(id)
            .ok_or(GameError::UnknownTradeRoute(id))
    }

    pub fn unit_type_of(&self, unit: &Unit) -> Result<&UnitType, GameError> {
        self.rules
            .unit_type(unit.unit_type)
            .ok_or_else(|| GameError::Invariant(format!("unit type {:?}", unit.unit_type)))
    }

    pub fn is_naval(&self, unit: &Unit) -> bool {
        self.rules
            .unit_type(unit.unit_type)
            .is_some_and(|t| t.naval)
    }

    pub fn is_expert(&self, unit: &Unit, expertise: Expertise) -> bool {
        self.rules
            .unit_type(unit.unit_type)
            .is_some_and(|t| t.is_expert(expertise))
    }

    pub fn has_piracy(&self, unit: &Unit) -> bool {
        self.rules
            .unit_type(unit.unit_type)
            .is_some_and(|t| t.piracy)
    }

    /// Full movement allowance at the start of a turn.
    pub fn unit_moves(&self, unit: &Unit) -> u32 {
        let base = self.rules.unit_type(unit.unit_type).map_or(1, |t| t.moves);
        self.rules
            .role(unit.role)
            .and_then(|r| r.moves)
            .unwrap_or(base)
    }

    pub fn unit_line_of_sight(&self, unit: &Unit) -> i32 {
        let base = self
            .rules
            .unit_type(unit.unit_type)
            .map_or(1, |t| t.line_of_sight);
        let role = self
            .rules
            .role(unit.role)
            .and_then(|r| r.line_of_sight)
            .unwrap_or(0);
        base.max(role) as i32
    }

    pub fn offence(&self, unit: &Unit) -> i32 {
        let base = self.rules.unit_type(unit.unit_type).map_or(0, |t| t.offence);
        base + self.rules.role(unit.role).map_or(0, |r| r.offence)
    }

    pub fn defence(&self, unit: &Unit) -> i32 {
        let base = self.rules.unit_type(unit.unit_type).map_or(1, |t| t.defence);
        base + self.rules.role(unit.role).map_or(0, |r| r.defence)
    }

    pub fn is_offensive(&self, unit: &Unit) -> bool {
        self.offence(unit) > 0
    }

    /// Map position of a unit, following carriers and settlements.
    pub fn unit_position(&self, id: UnitId) -> Option<Position> {
        let unit = self.units.get(id)?;
        self.location_position(unit.location)
    }

    pub fn location_position(&self, location: Location) -> Option<Position> {
        match location {
            Location::Tile { position } => Some(position),
            Location::Settlement { settlement } => self.settlements.get(settlement).map(|s| s.position),
            Location::Carrier { unit } => self.unit_position(unit),
            Location::Europe | Location::HighSeas => None,
        }
    }

    /// Units standing directly on a tile (not inside a settlement or aboard).
    pub fn units_at(&self, pos: Position) -> Vec<UnitId> {
        self.units
            .iter_ordered()
            .filter(|(_, u)| u.location == Location::tile(pos))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn units_in(&self, settlement: SettlementId) -> Vec<UnitId> {
        self.units
            .iter_ordered()
            .filter(|(_, u)| u.location == Location::Settlement { settlement })
            .map(|(id, _)| id)
            .collect()
    }

    pub fn units_aboard(&self, carrier: UnitId) -> Vec<UnitId> {
        self.units
            .iter_ordered()
            .filter(|(_, u)| u.location == Location::Carrier { unit: carrier })
            .map(|(id, _)| id)
            .collect()
    }

    /// Units anywhere on the map at `pos`, inside a settlement there, or aboard.
    pub fn units_near(&self, pos: Position) -> Vec<UnitId> {
        self.units
            .iter_ordered()
            .filter(|(id, _)| self.unit_position(*id) == Some(pos))
            .map(|(id, _)| id)
            .collect()
    }

    pub fn units_of(&self, player: PlayerId) -> Vec<UnitId> {
        self.units
            .iter_ordered()
            .filter(|(_, u)| u.owner == player)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn settlement_at(&self, pos: Position) -> Option<SettlementId> {
        self.map.get(pos).and_then(|t| t.settlement)
    }

    pub fn settlements_of(&self, player: PlayerId) -> Vec<SettlementId> {
        self.settlements
            .iter_ordered()
            .filter(|(_, s)| s.owner == player)
            .map(|(id, _)| id)
            .collect()
    }

    pub fn colonies_of(&self, player: PlayerId) -> Vec<SettlementId> {
        self.settlements
            .iter_ordered()
            .filter(|(_, s)| s.owner == player && s.is_colony())
            .map(|(id, _)| id)
            .collect()
    }

    pub fn cargo_slots_used(&self, carrier: &Unit) -> u32 {
        let goods: u32 = carrier
            .cargo
            .iter()
            .map(|g| g.amount.div_ceil(SLOT_SIZE))
            .sum();
        goods + self.units_aboard(carrier.id).len() as u32
    }

    pub fn free_slots(&self, carrier: &Unit) -> u32 {
        let space = self.rules.unit_type(carrier.unit_type).map_or(0, |t| t.space);
        space.saturating_sub(self.cargo_slots_used(carrier))
    }

    /// Whether `amount` more of `goods` fit aboard.
    pub fn can_carry(&self, carrier: &Unit, goods: GoodsTypeId, amount: u32) -> bool {
        let space = self.rules.unit_type(carrier.unit_type).map_or(0, |t| t.space);
        let current = carrier.goods_amount(goods);
        let before = current.div_ceil(SLOT_SIZE);
        let after = (current + amount).div_ceil(SLOT_SIZE);
        self.cargo_slots_used(carrier) - before + after <= space
    }

    /// Current goto target, derived from the route stop when one is assigned.
    pub fn destination(&self, unit: &Unit) -> Option<Location> {
        match &unit.orders {
            Orders::None => None,
            Orders::Goto { destination } => Some(*destination),
            Orders::Route { route, stop } => {
                let route = self.trade_routes.get(*route)?;
                let stop = route.stops.get(*stop)?;
                Some(Location::Settlement {
                    settlement: stop.settlement,
                })
            }
        }
    }

    pub fn spawn_unit(
        &mut self,
        owner: PlayerId,
        unit_type: UnitTypeId,
        role: UnitRole,
        location: Location,
    ) -> UnitId {
        let state = match location {
            Location::Europe => UnitState::InEurope,
            Location::Settlement { .. } => UnitState::InColony,
            Location::Carrier { .. } => UnitState::Sentry,
            _ => UnitState::Active,
        };
        let id = self.units.insert_with(|id| Unit {
            id,
            owner,
            unit_type,
            role,
            location,
            state,
            moves_left: 0,
            orders: Orders::None,
            cargo: Vec::new(),
            work_left: 0,
        });
        let moves = self.units.get(id).map_or(0, |u| self.unit_moves(u));
        if let Some(unit) = self.units.get_mut(id) {
            unit.moves_left = moves;
        }
        id
    }

    /// Removes a unit and everything aboard. Returns every id disposed.
    pub fn dispose_unit(&mut self, id: UnitId) -> Vec<UnitId> {
        let mut disposed = Vec::new();
        for passenger in self.units_aboard(id) {
            disposed.extend(self.dispose_unit(passenger));
        }
        if let Some(unit) = self.units.remove(id) {
            if let Location::Settlement { settlement } = unit.location {
                if let Some(native) = self
                    .settlements
                    .get_mut(settlement)
                    .and_then(Settlement::as_native_mut)
                {
                    if native.missionary == Some(id) {
                        native.missionary = None;
                    }
                }
            }
            disposed.push(id);
        }
        disposed
    }

    pub fn transfer_unit(&mut self, id: UnitId, to: PlayerId) {
        for passenger in self.units_aboard(id) {
            self.transfer_unit(passenger, to);
        }
        if let Some(unit) = self.units.get_mut(id) {
            unit.owner = to;
            unit.orders = Orders::None;
        }
    }

    // ------------------------------------------------------------------
    // Settlements
    // ------------------------------------------------------------------

    pub fn add_settlement(
        &mut self,
        owner: PlayerId,
        name: &str,
        position: Position,
        kind: SettlementKind,
    ) -> Result<SettlementId, GameError> {
        let radius = match kind {
            SettlementKind::Colony(_) => COLONY_RADIUS,
            SettlementKind::Native(_) => NATIVE_RADIUS,
        };
        if self.map.get(position).is_none() {
            return Err(GameError::Invariant(format!("settlement off map at {position:?}")));
        }
        let id = self.settlements.insert_with(|id| Settlement {
            id,
            owner,
            name: name.to_string(),
            position,
            radius,
            kind,
        });
        let claimed: Vec<Position> = self.map.square(position, radius).collect();
        for pos in claimed {
            if let Some(tile) = self.map.get_mut(pos) {
                if tile.owning_settlement.is_none() && !tile.terrain.is_water() {
                    tile.owning_settlement = Some(id);
                    tile.owner = Some(owner);
                }
            }
        }
        if let Some(tile) = self.map.get_mut(position) {
            tile.settlement = Some(id);
            tile.owning_settlement = Some(id);
            tile.owner = Some(owner);
            tile.rumour = false;
        }
        Ok(id)
    }

    /// Tiles claimed by a settlement.
    pub fn settlement_tiles(&self, id: SettlementId) -> Vec<Position> {
        self.map
            .positions()
            .filter(|p| {
                self.map
                    .get(*p)
                    .is_some_and(|t| t.owning_settlement == Some(id))
            })
            .collect()
    }

    /// Hands a settlement, its claimed tiles, and everyone inside to `to`.
    /// The new owner inherits the old owner's exploration of the surrounding area.
    pub fn transfer_settlement(&mut self, id: SettlementId, to: PlayerId) -> Result<(), GameError> {
        let (from, position, radius) = {
            let s = self.settlement(id)?;
            (s.owner, s.position, s.radius)
        };
        self.settlement_mut(id)?.owner = to;
        for pos in self.settlement_tiles(id) {
            if let Some(tile) = self.map.get_mut(pos) {
                tile.owner = Some(to);
            }
        }
        for unit in self.units_in(id) {
            if self.units.get(unit).is_some_and(|u| u.owner == from) {
                self.transfer_unit(unit, to);
            }
        }
        let area: Vec<Position> = self.map.square(position, radius + 1).collect();
        let known: Vec<Position> = {
            let old = self.player(from)?;
            area.into_iter().filter(|p| old.explored.contains(p)).collect()
        };
        let new_owner = self.player_mut(to)?;
        new_owner.explored.extend(known);
        new_owner.explored.insert(position);
        Ok(())
    }

    /// Removes a settlement, clearing its claims. Units inside are disposed.
    pub fn dispose_settlement(&mut self, id: SettlementId) -> Result<Vec<UnitId>, GameError> {
        let mut disposed = Vec::new();
        for unit in self.units_in(id) {
            disposed.extend(self.dispose_unit(unit));
        }
        for pos in self.settlement_tiles(id) {
            if let Some(tile) = self.map.get_mut(pos) {
                tile.owning_settlement = None;
                tile.owner = None;
                if tile.settlement == Some(id) {
                    tile.settlement = None;
                }
            }
        }
        self.settlements
            .remove(id)
            .ok_or(GameError::UnknownSettlement(id))?;
        Ok(disposed)
    }

    pub fn colony_population(&self, id: SettlementId) -> u32 {
        let Some(owner) = self.settlements.get(id).map(|s| s.owner) else {
            return 0;
        };
        self.units_in(id)
            .into_iter()
            .filter(|u| {
                self.units
                    .get(*u)
                    .is_some_and(|u| u.owner == owner && u.state == UnitState::InColony)
            })
            .count() as u32
    }

    pub fn colony_liberty_pct(&self, id: SettlementId) -> u32 {
        let Some(colony) = self.settlements.get(id).and_then(Settlement::as_colony) else {
            return 0;
        };
        let population = self.colony_population(id).max(1) as i64;
        let needed = population * self.options.bells_per_rebel.max(1) as i64;
        ((colony.bells.max(0) as i64 * 100) / needed).min(100) as u32
    }

    /// Population-weighted share of rebels across a player's colonies.
    pub fn rebel_pct(&self, player: PlayerId) -> u32 {
        let mut weighted = 0u64;
        let mut total = 0u64;
        for colony in self.colonies_of(player) {
            let population = self.colony_population(colony) as u64;
            weighted += population * self.colony_liberty_pct(colony) as u64;
            total += population;
        }
        if total == 0 {
            0
        } else {
            (weighted / total) as u32
        }
    }

    pub fn compute_score(&self, player: PlayerId) -> i32 {
        let Ok(p) = self.player(player) else {
            return 0;
        };
        let colonies = self.colonies_of(player);
        let population: u32 = colonies.iter().map(|c| self.colony_population(*c)).sum();
        colonies.len() as i32 * 2
            + population as i32 * 4
            + p.fathers.len() as i32 * 5
            + (p.gold.max(0) / 1000) as i32
    }

    /// A player with neither units nor settlements has nothing left to play with.
    pub fn has_assets(&self, player: PlayerId) -> bool {
        self.units.iter_ordered().any(|(_, u)| u.owner == player)
            || self.settlements.iter_ordered().any(|(_, s)| s.owner == player)
    }

    // ------------------------------------------------------------------
    // Visibility
    // ------------------------------------------------------------------

    /// Tiles currently in sight of a player.
    pub fn visible_tiles(&self, player: PlayerId) -> BTreeSet<Position> {
        let mut visible = BTreeSet::new();
        if self.players.get(player.index()).is_none_or(|p| p.dead) {
            return visible;
        }
        for (id, unit) in self.units.iter_ordered() {
            if unit.owner != player {
                continue;
            }
            if let Some(pos) = self.unit_position(id) {
                let radius = self.unit_line_of_sight(unit);
                visible.extend(self.map.square(pos, radius));
            }
        }
        for (_, settlement) in self.settlements.iter_ordered() {
            if settlement.owner == player {
                visible.extend(self.map.square(settlement.position, settlement.radius + 1));
            }
        }
        visible
    }

    /// Marks tiles explored. Returns the newly explored ones.
    pub fn explore(&mut self, player: PlayerId, center: Position, radius: i32) -> Vec<Position> {
        let area: Vec<Position> = self.map.square(center, radius).collect();
        let Some(p) = self.players.get_mut(player.index()) else {
            return Vec::new();
        };
        area.into_iter().filter(|pos| p.explored.insert(*pos)).collect()
    }

    /// Explores around every unit and settlement of a player.
    pub fn explore_all(&mut self, player: PlayerId) -> Vec<Position> {
        let visible: Vec<Position> = self.visible_tiles(player).into_iter().collect();
        let Some(p) = self.players.get_mut(player.index()) else {
            return Vec::new();
        };
        visible.into_iter().filter(|pos| p.explored.insert(*pos)).collect()
    }

    pub fn object_position(&self, object: ObjectId) -> Option<Position> {
        match object {
            ObjectId::Unit(id) => self.unit_position(id),
            ObjectId::Settlement(id) => self.settlements.get(id).map(|s| s.position),
            ObjectId::Tile(pos) => Some(pos),
            ObjectId::Player(_) | ObjectId::TradeRoute(_) => None,
        }
    }

    pub fn object_owner(&self, object: ObjectId) -> Option<PlayerId> {
        match object {
            ObjectId::Unit(id) => self.units.get(id).map(|u| u.owner),
            ObjectId::Settlement(id) => self.settlements.get(id).map(|s| s.owner),
            ObjectId::Tile(pos) => self.map.get(pos).and_then(|t| t.owner),
            ObjectId::Player(id) => Some(id),
            ObjectId::TradeRoute(id) => self.trade_routes.get(id).map(|r| r.owner),
        }
    }

    // ------------------------------------------------------------------
    // Snapshots
    // ------------------------------------------------------------------

    fn sees_private(viewer: Option<PlayerId>, owner: PlayerId) -> bool {
        viewer.is_none_or(|v| v == owner)
    }

    pub fn unit_snapshot(&self, id: UnitId, viewer: Option<PlayerId>) -> Option<UnitSnapshot> {
        let unit = self.units.get(id)?;
        let private = Self::sees_private(viewer, unit.owner);
        Some(UnitSnapshot {
            id,
            owner: unit.owner,
            unit_type: unit.unit_type,
            role: unit.role,
            location: unit.location,
            state: unit.state,
            moves_left: private.then_some(unit.moves_left),
            destination: if private { self.destination(unit) } else { None },
            trade_route: if private { unit.trade_route() } else { None },
            cargo: if private { unit.cargo.clone() } else { Vec::new() },
        })
    }

    pub fn settlement_snapshot(
        &self,
        id: SettlementId,
        viewer: Option<PlayerId>,
    ) -> Option<SettlementSnapshot> {
        let s = self.settlements.get(id)?;
        let view = match &s.kind {
            SettlementKind::Colony(colony) => {
                let private = Self::sees_private(viewer, s.owner);
                SettlementView::Colony {
                    population: self.colony_population(id),
                    goods: private.then(|| colony.goods_list()),
                    liberty_pct: private.then(|| self.colony_liberty_pct(id)),
                }
            }
            SettlementKind::Native(native) => {
                let visited = viewer.is_none_or(|v| native.has_visited(v));
                SettlementView::Native {
                    capital: native.capital,
                    alarm: viewer.map(|v| native.alarm(v).level()),
                    visited,
                    learnable_skill: if visited { native.learnable_skill } else { None },
                    missionary: native
                        .missionary
                        .and_then(|m| self.units.get(m))
                        .map(|m| m.owner),
                    wanted_goods: if visited {
                        native.wanted_goods.clone()
                    } else {
                        Vec::new()
                    },
                }
            }
        };
        Some(SettlementSnapshot {
            id,
            owner: s.owner,
            name: s.name.clone(),
            position: s.position,
            view,
        })
    }

    pub fn player_snapshot(&self, id: PlayerId, viewer: Option<PlayerId>) -> Option<PlayerSnapshot> {
        let p = self.players.get(id.index())?;
        let private = Self::sees_private(viewer, id);
        Some(PlayerSnapshot {
            id,
            name: p.name.clone(),
            kind: p.kind,
            human: p.human,
            dead: p.dead,
            score: p.score,
            fathers: p.fathers.iter().copied().collect(),
            gold: private.then_some(p.gold),
            tax: private.then_some(p.tax),
            immigration: private.then_some(p.immigration),
            liberty: private.then_some(p.liberty),
            current_father: if private { p.current_father } else { None },
            father_offers: if private {
                p.father_offers.clone()
            } else {
                Vec::new()
            },
            market: if private { p.market.entries() } else { Vec::new() },
        })
    }

    pub fn trade_route_snapshot(&self, id: TradeRouteId) -> Option<TradeRouteSnapshot> {
        let route = self.trade_routes.get(id)?;
        Some(TradeRouteSnapshot {
            id,
            owner: route.owner,
            name: route.name.clone(),
            stops: route.stops.clone(),
        })
    }

    /// Whether `viewer` may see a unit at all (own, or in sight and not hidden aboard).
    pub fn unit_visible_to(&self, id: UnitId, viewer: PlayerId, visible: &BTreeSet<Position>) -> bool {
        let Some(unit) = self.units.get(id) else {
            return false;
        };
        if unit.owner == viewer {
            return true;
        }
        if matches!(unit.location, Location::Carrier { .. }) {
            return false;
        }
        self.unit_position(id).is_some_and(|p| visible.contains(&p))
    }

    /// Full world view for a viewer, or the omniscient view for `None`.
    pub fn view(&self, viewer: Option<PlayerId>) -> WorldView {
        let visible = viewer.map(|v| self.visible_tiles(v));
        let explored = viewer.and_then(|v| self.players.get(v.index()).map(|p| &p.explored));

        let tiles = self
            .map
            .positions()
            .filter(|pos| explored.is_none_or(|e| e.contains(pos)))
            .filter_map(|pos| self.map.snapshot(pos))
            .collect();

        let units = self
            .units
            .iter_ordered()
            .filter(|(id, _)| match (viewer, &visible) {
                (Some(v), Some(vis)) => self.unit_visible_to(*id, v, vis),
                _ => true,
            })
            .filter_map(|(id, _)| self.unit_snapshot(id, viewer))
            .collect();

        let settlements = self
            .settlements
            .iter_ordered()
            .filter(|(_, s)| {
                viewer.is_none_or(|v| s.owner == v)
                    || explored.is_none_or(|e| e.contains(&s.position))
            })
            .filter_map(|(id, _)| self.settlement_snapshot(id, viewer))
            .collect();

        let trade_routes = self
            .trade_routes
            .iter_ordered()
            .filter(|(_, r)| viewer.is_none_or(|v| r.owner == v))
            .filter_map(|(id, _)| self.trade_route_snapshot(id))
            .collect();

        WorldView {
            viewer,
            turn: self.turn,
            current_player: self.current_player,
            width: self.map.width(),
            height: self.map.height(),
            players: self
                .players
                .iter()
                .filter_map(|p| self.player_snapshot(p.id, viewer))
                .collect(),
            stances: self
                .stances
                .iter()
                .map(|((a, b), stance)| StanceEntry {
                    a: *a,
                    b: *b,
                    stance: *stance,
                })
                .collect(),
            tiles,
            units,
            settlements,
            trade_routes,
            game_over: self.game_over.is_some(),
        }
    }
}
