//! Visibility-scoped deltas.
//!
//! A delta is what one recipient learns from one server operation. Partial
//! updates are split by audience at the type level: a `PrivatePatch` can only be
//! queued for a single player, so a private field cannot leak through a
//! broader scope.

use serde::{Deserialize, Serialize};

use crate::{
    CombatResult, FatherId, GoodsAmount, Location, MarketEntry, Notice, ObjectId, ObjectSnapshot,
    PlayerId, PlayerKind, Position, SettlementId, Stance, TensionLevel, UnitId, UnitRole,
    UnitState, UnitTypeId, VictoryReason,
};

/// Fields only the owning player may see.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field")]
pub enum PrivatePatch {
    Gold { gold: i64 },
    Tax { tax: u8 },
    MovesLeft { unit: UnitId, moves_left: u32 },
    UnitState { unit: UnitId, state: UnitState },
    Destination { unit: UnitId, destination: Option<Location> },
    Cargo { unit: UnitId, cargo: Vec<GoodsAmount> },
    ColonyGoods { settlement: SettlementId, goods: Vec<GoodsAmount> },
    MarketEntry { entry: MarketEntry },
    Immigration { points: i32 },
    Liberty { points: i32 },
    FatherOffers { offers: Vec<FatherId> },
    CurrentFather { father: Option<FatherId> },
    SettlementAlarm { settlement: SettlementId, level: TensionLevel },
    LearnableSkill { settlement: SettlementId, skill: Option<UnitTypeId> },
}

/// Fields visible to anyone the scope reaches.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "field")]
pub enum PublicPatch {
    Score { player: PlayerId, score: i32 },
    PlayerDead { player: PlayerId },
    PlayerKind { player: PlayerId, kind: PlayerKind },
    FatherJoined { player: PlayerId, father: FatherId },
    Missionary { settlement: SettlementId, owner: Option<PlayerId> },
    TileOwner { position: Position, owner: Option<PlayerId> },
    UnitRole { unit: UnitId, role: UnitRole },
    UnitType { unit: UnitId, unit_type: UnitTypeId },
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scope", content = "patch")]
pub enum Patch {
    Private(PrivatePatch),
    Public(PublicPatch),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Delta {
    /// Full object sync.
    Update { object: ObjectSnapshot },
    Partial { patch: Patch },
    Stance {
        player: PlayerId,
        other: PlayerId,
        stance: Stance,
    },
    /// Animation hint; the location itself arrives in the accompanying update.
    Moved {
        unit: UnitId,
        from: Location,
        to: Location,
    },
    /// The object left the recipient's sight but still exists.
    Disappeared { object: ObjectId },
    /// The object is gone for good.
    Disposed { object: ObjectId },
    Attack {
        attacker: UnitId,
        defender: ObjectId,
        result: CombatResult,
    },
    Message { notice: Notice },
    TurnChanged { turn: u32, player: PlayerId },
    GameEnded {
        winner: Option<PlayerId>,
        reason: VictoryReason,
    },
}
