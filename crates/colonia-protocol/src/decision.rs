//! Questions the server may need answered before it can finish an operation.
//!
//! The server never waits mid-mutation. If an answer is missing the operation
//! is rejected with the pending request, and the caller resubmits the command
//! with the answer attached.

use serde::{Deserialize, Serialize};

use crate::{
    DiplomaticTrade, GoodsAmount, GoodsTypeId, MissionaryAction, MonarchAction, PlayerId,
    ScoutAction, ScoutColonyAction, SettlementId, UnitId, UnitTypeId,
};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DecisionRequest {
    ConfirmHostile { unit: UnitId, target: PlayerId },
    ChooseCarrier { unit: UnitId, candidates: Vec<UnitId> },
    ChooseDisembark { carrier: UnitId, candidates: Vec<UnitId> },
    ConfirmHighSeas { unit: UnitId },
    ScoutSettlement { unit: UnitId, settlement: SettlementId },
    ScoutColony { unit: UnitId, settlement: SettlementId },
    MissionarySettlement {
        unit: UnitId,
        settlement: SettlementId,
        can_denounce: bool,
    },
    LearnSkill {
        unit: UnitId,
        settlement: SettlementId,
        skill: UnitTypeId,
    },
    SelectInciteTarget {
        settlement: SettlementId,
        candidates: Vec<PlayerId>,
    },
    ConfirmIncite {
        settlement: SettlementId,
        target: PlayerId,
        price: u32,
    },
    SelectTributeAmount {
        settlement: SettlementId,
        max: u32,
    },
    AcceptTributeDemand {
        demander: PlayerId,
        settlement: SettlementId,
        amount: u32,
    },
    /// The recipient sees the agreement as currently proposed.
    RespondToTrade { agreement: DiplomaticTrade },
    /// Sender drafts the opening agreement after choosing to negotiate.
    DraftTrade { unit: UnitId, counterparty: PlayerId },
    MonarchRaiseTax { goods: GoodsTypeId, tax: u8 },
    MonarchMercenaries { price: u32, units: Vec<UnitTypeId> },
    NativeTrade {
        unit: UnitId,
        settlement: SettlementId,
        can_buy: bool,
        can_sell: bool,
        can_gift: bool,
        for_sale: Vec<GoodsAmount>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NativeTradeAction {
    Buy { goods: GoodsTypeId, amount: u32 },
    Sell { goods: GoodsTypeId, amount: u32 },
    Gift { goods: GoodsTypeId, amount: u32 },
    Done,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum DecisionAnswer {
    Confirm(bool),
    Units(Vec<UnitId>),
    Unit(UnitId),
    Scout(ScoutAction),
    ScoutColony(ScoutColonyAction),
    Missionary(MissionaryAction),
    Player(Option<PlayerId>),
    Amount(Option<u32>),
    Trade(DiplomaticTrade),
    NativeTrade(NativeTradeAction),
}

impl DecisionAnswer {
    pub fn as_confirm(&self) -> Option<bool> {
        match self {
            DecisionAnswer::Confirm(value) => Some(*value),
            _ => None,
        }
    }
}

/// Answers supplied with a submission, tagged by the player who gave them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolvedDecision {
    pub player: PlayerId,
    pub answer: DecisionAnswer,
}

/// Monarch answers are matched on the action they respond to.
pub fn monarch_request_action(request: &DecisionRequest) -> Option<MonarchAction> {
    match request {
        DecisionRequest::MonarchRaiseTax { .. } => Some(MonarchAction::RaiseTax),
        DecisionRequest::MonarchMercenaries { .. } => Some(MonarchAction::OfferMercenaries),
        _ => None,
    }
}
