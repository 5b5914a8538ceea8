use serde::{Deserialize, Serialize};

use crate::{
    FatherId, GoodsAmount, GoodsTypeId, Location, PlayerId, PlayerKind, Position, SettlementId,
    Stance, TensionLevel, Terrain, TradeRouteId, UnitId, UnitRole, UnitState, UnitTypeId,
};

/// A unit as seen by one recipient. Owner-only fields are `None` for everyone else.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub owner: PlayerId,
    pub unit_type: UnitTypeId,
    pub role: UnitRole,
    pub location: Location,
    pub state: UnitState,
    #[serde(default)]
    pub moves_left: Option<u32>,
    #[serde(default)]
    pub destination: Option<Location>,
    #[serde(default)]
    pub trade_route: Option<TradeRouteId>,
    #[serde(default)]
    pub cargo: Vec<GoodsAmount>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum SettlementView {
    Colony {
        population: u32,
        #[serde(default)]
        goods: Option<Vec<GoodsAmount>>,
        #[serde(default)]
        liberty_pct: Option<u32>,
    },
    Native {
        capital: bool,
        /// Alarm toward the recipient.
        #[serde(default)]
        alarm: Option<TensionLevel>,
        /// Whether the recipient has already scouted this settlement.
        visited: bool,
        /// Only revealed once the recipient has visited.
        #[serde(default)]
        learnable_skill: Option<UnitTypeId>,
        #[serde(default)]
        missionary: Option<PlayerId>,
        #[serde(default)]
        wanted_goods: Vec<GoodsTypeId>,
    },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SettlementSnapshot {
    pub id: SettlementId,
    pub owner: PlayerId,
    pub name: String,
    pub position: Position,
    pub view: SettlementView,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TileSnapshot {
    pub position: Position,
    pub terrain: Terrain,
    #[serde(default)]
    pub owner: Option<PlayerId>,
    #[serde(default)]
    pub settlement: Option<SettlementId>,
    pub rumour: bool,
    #[serde(default)]
    pub region: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEntry {
    pub goods: GoodsTypeId,
    pub buy_price: u32,
    pub sell_price: u32,
    pub amount: u32,
    pub boycotted: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub id: PlayerId,
    pub name: String,
    pub kind: PlayerKind,
    pub human: bool,
    pub dead: bool,
    pub score: i32,
    #[serde(default)]
    pub fathers: Vec<FatherId>,
    #[serde(default)]
    pub gold: Option<i64>,
    #[serde(default)]
    pub tax: Option<u8>,
    #[serde(default)]
    pub immigration: Option<i32>,
    #[serde(default)]
    pub liberty: Option<i32>,
    #[serde(default)]
    pub current_father: Option<FatherId>,
    #[serde(default)]
    pub father_offers: Vec<FatherId>,
    #[serde(default)]
    pub market: Vec<MarketEntry>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeStop {
    pub settlement: SettlementId,
    /// Goods loaded at this stop; everything else aboard is unloaded here.
    #[serde(default)]
    pub load: Vec<GoodsTypeId>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeRouteSnapshot {
    pub id: TradeRouteId,
    pub owner: PlayerId,
    pub name: String,
    pub stops: Vec<TradeStop>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ObjectSnapshot {
    Unit(UnitSnapshot),
    Settlement(SettlementSnapshot),
    Tile(TileSnapshot),
    Player(PlayerSnapshot),
    TradeRoute(TradeRouteSnapshot),
}

impl ObjectSnapshot {
    pub fn id(&self) -> ObjectId {
        match self {
            ObjectSnapshot::Unit(u) => ObjectId::Unit(u.id),
            ObjectSnapshot::Settlement(s) => ObjectId::Settlement(s.id),
            ObjectSnapshot::Tile(t) => ObjectId::Tile(t.position),
            ObjectSnapshot::Player(p) => ObjectId::Player(p.id),
            ObjectSnapshot::TradeRoute(r) => ObjectId::TradeRoute(r.id),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id")]
pub enum ObjectId {
    Unit(UnitId),
    Settlement(SettlementId),
    Tile(Position),
    Player(PlayerId),
    TradeRoute(TradeRouteId),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StanceEntry {
    pub a: PlayerId,
    pub b: PlayerId,
    pub stance: Stance,
}

/// Full visibility-filtered world state, used for initial sync, resync and checksums.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldView {
    /// `None` for the omniscient server view.
    #[serde(default)]
    pub viewer: Option<PlayerId>,
    pub turn: u32,
    pub current_player: PlayerId,
    pub width: u32,
    pub height: u32,
    pub players: Vec<PlayerSnapshot>,
    pub stances: Vec<StanceEntry>,
    pub tiles: Vec<TileSnapshot>,
    pub units: Vec<UnitSnapshot>,
    pub settlements: Vec<SettlementSnapshot>,
    pub trade_routes: Vec<TradeRouteSnapshot>,
    pub game_over: bool,
}
