use serde::{Deserialize, Serialize};

use crate::{
    DiplomaticTrade, Direction, FatherId, GoodsTypeId, Location, MonarchAction, Position,
    SettlementId, TradeRouteId, TradeStop, UnitId, UnitRole, UnitState, UnitTypeId,
};

/// All player intents. Shape is validated by the wire codec, legality by the server.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    // Unit orders
    MoveUnit { unit: UnitId, direction: Direction },
    SetDestination { unit: UnitId, destination: Option<Location> },
    ClearOrders { unit: UnitId },
    SetUnitState { unit: UnitId, state: UnitState },
    Embark { unit: UnitId, carrier: UnitId },
    Disembark { unit: UnitId },
    BuildColony { unit: UnitId, name: String },
    EquipRole { unit: UnitId, role: UnitRole },

    // Cargo
    LoadGoods {
        unit: UnitId,
        goods: GoodsTypeId,
        amount: u32,
    },
    UnloadGoods {
        unit: UnitId,
        goods: GoodsTypeId,
        amount: u32,
    },

    // Trade routes
    CreateTradeRoute { name: String, stops: Vec<TradeStop> },
    AssignTradeRoute { unit: UnitId, route: Option<TradeRouteId> },

    // Europe
    RecruitUnit,
    TrainUnit { unit_type: UnitTypeId },
    SailToEurope { unit: UnitId },
    SailToAmerica { unit: UnitId },

    // Native settlement trade sessions
    OpenTradeSession { unit: UnitId, settlement: SettlementId },
    BuyGoods {
        unit: UnitId,
        settlement: SettlementId,
        goods: GoodsTypeId,
        amount: u32,
        /// Haggled price; `None` accepts the asking price.
        #[serde(default)]
        price: Option<u32>,
    },
    SellGoods {
        unit: UnitId,
        settlement: SettlementId,
        goods: GoodsTypeId,
        amount: u32,
        #[serde(default)]
        price: Option<u32>,
    },
    GiveGift {
        unit: UnitId,
        settlement: SettlementId,
        goods: GoodsTypeId,
        amount: u32,
    },
    CloseTradeSession { unit: UnitId, settlement: SettlementId },
    DemandTribute { unit: UnitId, settlement: SettlementId },

    // Diplomacy and crown
    ProposeTrade {
        agreement: DiplomaticTrade,
        #[serde(default)]
        via: Option<UnitId>,
    },
    AnswerMonarch { action: MonarchAction, accept: bool },
    ChooseFoundingFather { father: FatherId },
    DeclareIndependence { nation_name: String },

    // Naming
    NameRegion { position: Position, name: String },
    NameNewLand { name: String },

    // Turn flow
    ExecuteGotoOrders,
    EndTurn,
}

impl Command {
    /// Commands accepted outside the sender's own turn.
    pub fn allowed_out_of_turn(&self) -> bool {
        matches!(self, Command::AnswerMonarch { .. })
    }
}
