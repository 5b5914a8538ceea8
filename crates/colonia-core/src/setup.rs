//! World construction: a builder for hand-made scenarios and a simple
//! generator for new games.

use std::sync::Arc;

use colonia_protocol::{
    Location, PlayerId, PlayerKind, Position, SettlementId, Stance, Terrain, UnitId, UnitRole,
    UnitTypeId,
};
use thiserror::Error;

use crate::error::GameError;
use crate::map::GameMap;
use crate::options::GameOptions;
use crate::rng::GameRng;
use crate::rules::{load_rules, Rules, RulesError, RulesSource};
use crate::tension::Tension;
use crate::world::{Colony, NativeSettlement, SettlementKind, World};

#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error("unknown rules key: {0}")]
    UnknownKey(String),
    #[error(transparent)]
    Game(#[from] GameError),
    #[error("map too small for {0} players")]
    MapTooSmall(usize),
}

pub struct WorldBuilder {
    world: World,
    error: Option<SetupError>,
}

impl WorldBuilder {
    /// Builder over the embedded rules and default options.
    pub fn new(width: u32, height: u32, terrain: Terrain) -> Result<Self, SetupError> {
        let rules = Arc::new(load_rules(RulesSource::Embedded)?);
        Ok(Self::with_rules(rules, GameOptions::default(), width, height, terrain))
    }

    pub fn with_rules(
        rules: Arc<Rules>,
        options: GameOptions,
        width: u32,
        height: u32,
        terrain: Terrain,
    ) -> Self {
        let map = GameMap::new(width, height, terrain);
        Self {
            world: World::new(rules, options, map, 0),
            error: None,
        }
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn options(&mut self, options: GameOptions) -> &mut Self {
        self.world.ai_turn_skip = options.ai_turn_skip;
        self.world.options = options;
        self
    }

    pub fn seed(&mut self, seed: u64) -> &mut Self {
        self.world.rng = GameRng::seed_from_u64(seed);
        self
    }

    pub fn terrain(&mut self, pos: Position, terrain: Terrain) -> &mut Self {
        if let Some(tile) = self.world.map.get_mut(pos) {
            tile.terrain = terrain;
        }
        self
    }

    pub fn rumour(&mut self, pos: Position) -> &mut Self {
        if let Some(tile) = self.world.map.get_mut(pos) {
            tile.rumour = true;
        }
        self
    }

    pub fn player(&mut self, name: &str, kind: PlayerKind, human: bool) -> PlayerId {
        let id = self.world.add_player(name, kind, human);
        if kind == PlayerKind::Colonial {
            let force = self.world.rules.royal_force.clone();
            if let Ok(player) = self.world.player_mut(id) {
                player.royal_force = force.into_iter().collect();
            }
        }
        id
    }

    pub fn stance(&mut self, a: PlayerId, b: PlayerId, stance: Stance) -> &mut Self {
        self.world.set_stance(a, b, stance);
        self
    }

    pub fn gold(&mut self, player: PlayerId, gold: i64) -> &mut Self {
        if let Ok(p) = self.world.player_mut(player) {
            p.gold = gold;
        }
        self
    }

    pub fn entry_location(&mut self, player: PlayerId, pos: Position) -> &mut Self {
        if let Ok(p) = self.world.player_mut(player) {
            p.entry_location = Some(pos);
        }
        self
    }

    fn unit_type(&mut self, key: &str) -> UnitTypeId {
        match self.world.rules.unit_type_id(key) {
            Some(id) => id,
            None => {
                self.error.get_or_insert(SetupError::UnknownKey(key.to_string()));
                self.world.rules.special.colonist
            }
        }
    }

    pub fn unit(&mut self, owner: PlayerId, key: &str, role: UnitRole, pos: Position) -> UnitId {
        self.unit_at(owner, key, role, Location::tile(pos))
    }

    pub fn unit_at(
        &mut self,
        owner: PlayerId,
        key: &str,
        role: UnitRole,
        location: Location,
    ) -> UnitId {
        let unit_type = self.unit_type(key);
        self.world.spawn_unit(owner, unit_type, role, location)
    }

    pub fn cargo(&mut self, unit: UnitId, goods: &str, amount: u32) -> &mut Self {
        match self.world.rules.goods_id(goods) {
            Some(id) => {
                if let Some(u) = self.world.units.get_mut(unit) {
                    u.add_cargo(id, amount);
                }
            }
            None => {
                self.error.get_or_insert(SetupError::UnknownKey(goods.to_string()));
            }
        }
        self
    }

    fn settlement(
        &mut self,
        owner: PlayerId,
        name: &str,
        pos: Position,
        kind: SettlementKind,
    ) -> SettlementId {
        match self.world.add_settlement(owner, name, pos, kind) {
            Ok(id) => id,
            Err(err) => {
                self.error.get_or_insert(SetupError::Game(err));
                SettlementId::new(u32::MAX, 0)
            }
        }
    }

    pub fn colony(&mut self, owner: PlayerId, name: &str, pos: Position) -> SettlementId {
        self.settlement(owner, name, pos, SettlementKind::Colony(Colony::default()))
    }

    /// Native settlement teaching the first teachable skill, wanting the
    /// three goods natives value most.
    pub fn native_settlement(
        &mut self,
        owner: PlayerId,
        name: &str,
        pos: Position,
        capital: bool,
    ) -> SettlementId {
        let native = default_native(&self.world.rules, capital);
        self.settlement(owner, name, pos, SettlementKind::Native(native))
    }

    pub fn alarm(&mut self, settlement: SettlementId, player: PlayerId, value: i32) -> &mut Self {
        if let Some(native) = self
            .world
            .settlements
            .get_mut(settlement)
            .and_then(|s| s.as_native_mut())
        {
            native.alarm.insert(player, Tension::new(value));
        }
        self
    }

    pub fn colony_goods(&mut self, settlement: SettlementId, goods: &str, amount: u32) -> &mut Self {
        let Some(id) = self.world.rules.goods_id(goods) else {
            self.error.get_or_insert(SetupError::UnknownKey(goods.to_string()));
            return self;
        };
        if let Some(colony) = self
            .world
            .settlements
            .get_mut(settlement)
            .and_then(|s| s.as_colony_mut())
        {
            colony.add_goods(id, amount);
        }
        self
    }

    /// Direct access for adjustments the builder has no helper for.
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn build(mut self) -> Result<World, SetupError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        for id in self.world.player_ids() {
            self.world.explore_all(id);
            let score = self.world.compute_score(id);
            self.world.player_mut(id)?.score = score;
        }
        if let Some(first) = self.world.players.iter().find(|p| !p.dead) {
            self.world.current_player = first.id;
        }
        Ok(self.world)
    }
}

fn default_native(rules: &Rules, capital: bool) -> NativeSettlement {
    let mut by_price: Vec<_> = rules.storable_goods().collect();
    by_price.sort_by_key(|g| std::cmp::Reverse(g.native_price));
    let furs = rules.goods_id("furs");
    NativeSettlement {
        capital,
        learnable_skill: rules.unit_types.iter().find(|t| t.teachable).map(|t| t.id),
        bonus: if capital { 2 } else { 1 },
        wanted_goods: by_price.iter().take(3).map(|g| g.id).collect(),
        goods: furs.map(|f| (f, 100)).into_iter().collect(),
        ..NativeSettlement::default()
    }
}

/// Parameters for `generate_world`.
#[derive(Clone, Debug)]
pub struct MapConfig {
    pub width: u32,
    pub height: u32,
    pub settlements_per_tribe: u32,
    pub rumour_pct: u32,
    pub starting_gold: i64,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            width: 40,
            height: 30,
            settlements_per_tribe: 4,
            rumour_pct: 3,
            starting_gold: 1000,
        }
    }
}

/// One seat at the table.
#[derive(Clone, Debug)]
pub struct SeatSpec {
    pub name: String,
    pub kind: PlayerKind,
    pub human: bool,
}

/// A new-world layout: high seas on the west edge, a coastal strip, then land
/// with natives spread inland. Europeans start aboard a caravel offshore.
pub fn generate_world(
    rules: Arc<Rules>,
    options: GameOptions,
    config: &MapConfig,
    seats: &[SeatSpec],
    seed: u64,
) -> Result<World, SetupError> {
    let europeans = seats.iter().filter(|s| s.kind.is_european()).count();
    if config.width < 12 || (config.height as usize) < europeans * 2 + 2 {
        return Err(SetupError::MapTooSmall(seats.len()));
    }
    let mut b = WorldBuilder::with_rules(rules, options, config.width, config.height, Terrain::Plains);
    b.seed(seed);
    let mut rng = GameRng::seed_from_u64(seed ^ 0x9E37_79B9_7F4A_7C15);

    let land = [
        (Terrain::Plains, 40),
        (Terrain::Grassland, 25),
        (Terrain::Forest, 20),
        (Terrain::Hills, 10),
        (Terrain::Mountains, 5),
    ];
    let weights: Vec<u32> = land.iter().map(|(_, w)| *w).collect();
    for y in 0..config.height as i32 {
        for x in 0..config.width as i32 {
            let pos = Position::new(x, y);
            let terrain = match x {
                0 => Terrain::HighSeas,
                1 | 2 => Terrain::Ocean,
                _ => land[rng.pick_weighted(&weights).unwrap_or(0)].0,
            };
            b.terrain(pos, terrain);
            if !terrain.is_water() && x > 4 && rng.chance(config.rumour_pct) {
                b.rumour(pos);
            }
        }
    }

    let mut placed: Vec<Position> = Vec::new();
    for seat in seats {
        let id = b.player(&seat.name, seat.kind, seat.human);
        if seat.kind == PlayerKind::Native {
            for n in 0..config.settlements_per_tribe {
                let mut attempts = 0;
                while attempts < 200 {
                    attempts += 1;
                    let pos = Position::new(
                        rng.between(6, config.width - 1) as i32,
                        rng.between(0, config.height - 1) as i32,
                    );
                    if placed.iter().any(|p| p.distance(pos) < 4) {
                        continue;
                    }
                    if b.world().settlement_at(pos).is_some() {
                        continue;
                    }
                    b.terrain(pos, Terrain::Plains);
                    b.native_settlement(id, &format!("{} {}", seat.name, n + 1), pos, n == 0);
                    placed.push(pos);
                    break;
                }
            }
        }
    }

    let mut row = 1;
    for player in b.world().player_ids() {
        let kind = b.world().player(player)?.kind;
        if !kind.is_european() {
            continue;
        }
        let start = Position::new(2, row);
        row += 2;
        b.gold(player, config.starting_gold);
        b.entry_location(player, start);
        let ship = b.unit(player, "caravel", UnitRole::Default, start);
        b.unit_at(player, "free_colonist", UnitRole::Default, Location::Carrier { unit: ship });
        b.unit_at(player, "veteran_soldier", UnitRole::Soldier, Location::Carrier { unit: ship });
    }
    b.build()
}
