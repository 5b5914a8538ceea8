//! Diplomatic trade agreements between two players.

use serde::{Deserialize, Serialize};

use crate::{GoodsTypeId, PlayerId, SettlementId, Stance, UnitId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeStatus {
    Propose,
    Accept,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TradeItem {
    Stance {
        stance: Stance,
    },
    Gold {
        from: PlayerId,
        amount: u32,
    },
    /// Goods move between `carrier` and `settlement`, away from `from`.
    Goods {
        from: PlayerId,
        carrier: UnitId,
        settlement: SettlementId,
        goods: GoodsTypeId,
        amount: u32,
    },
    Colony {
        from: PlayerId,
        settlement: SettlementId,
    },
    Unit {
        from: PlayerId,
        unit: UnitId,
    },
}

impl TradeItem {
    /// Player giving something away, if the item has a direction.
    pub fn giver(&self) -> Option<PlayerId> {
        match self {
            TradeItem::Stance { .. } => None,
            TradeItem::Gold { from, .. }
            | TradeItem::Goods { from, .. }
            | TradeItem::Colony { from, .. }
            | TradeItem::Unit { from, .. } => Some(*from),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiplomaticTrade {
    pub sender: PlayerId,
    pub recipient: PlayerId,
    pub items: Vec<TradeItem>,
    pub status: TradeStatus,
    /// Bumped on every counter-proposal.
    #[serde(default)]
    pub version: u32,
}

impl DiplomaticTrade {
    pub fn propose(sender: PlayerId, recipient: PlayerId, items: Vec<TradeItem>) -> Self {
        Self {
            sender,
            recipient,
            items,
            status: TradeStatus::Propose,
            version: 0,
        }
    }

    pub fn involves(&self, a: PlayerId, b: PlayerId) -> bool {
        (self.sender == a && self.recipient == b) || (self.sender == b && self.recipient == a)
    }

    pub fn other_party(&self, player: PlayerId) -> PlayerId {
        if player == self.sender {
            self.recipient
        } else {
            self.sender
        }
    }

    pub fn with_status(mut self, status: TradeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn stance_item(&self) -> Option<Stance> {
        self.items.iter().find_map(|item| match item {
            TradeItem::Stance { stance } => Some(*stance),
            _ => None,
        })
    }
}
