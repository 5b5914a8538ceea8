use colonia_protocol::{
    DecisionRequest, ObjectId, PlayerId, Rejection, SettlementId, TradeRouteId, UnitId,
};
use thiserror::Error;

/// Failure of a single game operation. Either way the world is left untouched.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GameError {
    /// Illegal but expected; reported to the originating player only.
    #[error("rejected: {0}")]
    Rejected(#[from] Rejection),
    /// The operation needs an answer that was not supplied.
    #[error("decision required from player {player:?}")]
    DecisionRequired {
        player: PlayerId,
        request: DecisionRequest,
    },

    // Contract violations below: an invariant was broken upstream.
    #[error("unknown unit {0:?}")]
    UnknownUnit(UnitId),
    #[error("unknown settlement {0:?}")]
    UnknownSettlement(SettlementId),
    #[error("unknown player {0:?}")]
    UnknownPlayer(PlayerId),
    #[error("unknown trade route {0:?}")]
    UnknownTradeRoute(TradeRouteId),
    #[error("no trade session open for unit {unit:?} at {settlement:?}")]
    SessionNotOpen {
        unit: UnitId,
        settlement: SettlementId,
    },
    #[error("{0:?} has been disposed")]
    Disposed(ObjectId),
    #[error("embark classified for unit {0:?} but no carrier is available")]
    NoCarrierCandidates(UnitId),
    #[error("answer does not fit request {request:?}")]
    UnexpectedAnswer { request: DecisionRequest },
    #[error("world invariant broken: {0}")]
    Invariant(String),
}

impl GameError {
    pub fn is_contract_violation(&self) -> bool {
        !matches!(
            self,
            GameError::Rejected(_) | GameError::DecisionRequired { .. }
        )
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            GameError::Rejected(r) => Some(r),
            _ => None,
        }
    }
}

pub(crate) fn reject<T>(rejection: Rejection) -> Result<T, GameError> {
    Err(GameError::Rejected(rejection))
}
