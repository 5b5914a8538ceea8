use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    GoodsAmount, GoodsTypeId, MonarchAction, MoveType, PlayerId, Position, RumourOutcome,
    ScoutOutcome, SettlementId, TradeItem, UnitId, UnitTypeId,
};

/// Informational messages attached to a change set.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Notice {
    FirstContact { other: PlayerId },
    ScoutResult {
        unit: UnitId,
        settlement: SettlementId,
        outcome: ScoutOutcome,
    },
    MissionEstablished { settlement: SettlementId, owner: PlayerId },
    MissionRefused { settlement: SettlementId },
    MissionDenounced {
        settlement: SettlementId,
        by: PlayerId,
        success: bool,
    },
    MissionaryKilled { settlement: SettlementId },
    TributePaid { settlement: SettlementId, gold: u32 },
    TributeDemanded {
        demander: PlayerId,
        settlement: SettlementId,
        amount: u32,
        accepted: bool,
    },
    IncitePaid {
        settlement: SettlementId,
        target: PlayerId,
        price: u32,
    },
    InciteUnaffordable { settlement: SettlementId, price: u32 },
    IncitedAgainst { inciter: PlayerId, native: PlayerId },
    SkillLearned { unit: UnitId, skill: UnitTypeId },
    UnitKilled { unit: UnitId, settlement: SettlementId },
    SkillRefused { settlement: SettlementId },
    TradeSessionOpened {
        unit: UnitId,
        settlement: SettlementId,
        can_buy: bool,
        can_sell: bool,
        can_gift: bool,
        for_sale: Vec<GoodsAmount>,
    },
    NativeTradeDone {
        settlement: SettlementId,
        goods: GoodsTypeId,
        amount: u32,
        /// Positive when the player received gold.
        gold: i64,
    },
    HaggleFailed {
        settlement: SettlementId,
        attempts_left: u32,
    },
    GiftAccepted {
        settlement: SettlementId,
        goods: GoodsTypeId,
        amount: u32,
    },
    RumourExplored { unit: UnitId, outcome: RumourOutcome },
    Monarch { action: MonarchAction },
    TaxRaised { tax: u8 },
    GoodsBoycotted { goods: GoodsTypeId },
    RefReinforced { added: u32 },
    WarDeclaredByCrown { against: PlayerId },
    MercenariesHired { count: u32 },
    ImmigrantArrived { unit: UnitId },
    ConvertJoined {
        settlement: SettlementId,
        unit: UnitId,
    },
    SpanishSuccession { loser: PlayerId, winner: PlayerId },
    TradeAccepted { with: PlayerId },
    TradeRejected { with: PlayerId },
    TradeItemSkipped { item: TradeItem },
    ColonyCaptured { settlement: SettlementId, by: PlayerId },
    SettlementDestroyed {
        settlement: SettlementId,
        by: PlayerId,
        plunder: u32,
    },
    IndependenceDeclared { player: PlayerId, nation_name: String },
    IndependenceAchieved { player: PlayerId },
    RegionNamed { position: Position, name: String },
    NewLandNamed { player: PlayerId, name: String },
}

/// Why a legal-looking request was refused. Surfaced to the originator only.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason")]
pub enum Rejection {
    #[error("illegal move: {move_type:?}")]
    IllegalMove { move_type: MoveType },
    #[error("not your turn")]
    NotYourTurn,
    #[error("unit does not belong to you")]
    NotYourUnit,
    #[error("settlement does not belong to you")]
    NotYourSettlement,
    #[error("unit is not on the map")]
    NotOnMap,
    #[error("unit has no moves left")]
    NoMovesLeft,
    #[error("not adjacent to the target")]
    NotAdjacent,
    #[error("not enough gold: need {needed}, have {available}")]
    InsufficientGold { needed: i64, available: i64 },
    #[error("not enough goods")]
    InsufficientGoods,
    #[error("no free cargo space")]
    NoCargoSpace,
    #[error("an action was already taken in this trade session")]
    SessionActionTaken,
    #[error("unit is already negotiating with another settlement")]
    SessionBusy,
    #[error("trade action not permitted in this session")]
    CapabilityDenied,
    #[error("the natives refuse the offered price")]
    HaggleRefused,
    #[error("tribute cannot be demanded here")]
    TributeNotAllowed,
    #[error("a colony cannot be built here")]
    CannotBuildColony,
    #[error("invalid destination")]
    InvalidDestination,
    #[error("unit follows a trade route")]
    TradeRouteAssigned,
    #[error("invalid trade route")]
    InvalidTradeRoute,
    #[error("stance change not permitted")]
    InvalidStanceChange,
    #[error("invalid trade agreement")]
    InvalidTrade,
    #[error("unit is not in Europe")]
    NotInEurope,
    #[error("unit is not on the high seas")]
    NotOnHighSeas,
    #[error("role cannot be equipped here")]
    InvalidRole,
    #[error("goods are boycotted")]
    Boycotted,
    #[error("no pending crown action of that kind")]
    NoPendingMonarchAction,
    #[error("founding father was not offered")]
    FatherNotOffered,
    #[error("independence cannot be declared now")]
    CannotDeclareIndependence,
    #[error("unit state cannot be set directly")]
    InvalidUnitState,
    #[error("unit cannot board that carrier")]
    CannotBoard,
    #[error("unit cannot disembark here")]
    CannotDisembark,
    #[error("unknown unit type")]
    UnknownUnitType,
    #[error("name is empty")]
    EmptyName,
    #[error("the game is over")]
    GameOver,
}
