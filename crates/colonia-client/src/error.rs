use colonia_protocol::wire::WireError;
use colonia_protocol::UnitId;
use colonia_server::ServerError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("not seated yet")]
    NotJoined,
    #[error("no game state received yet")]
    NoState,
    #[error("not our turn")]
    NotYourTurn,
    #[error("the turn is already ending")]
    TurnEnding,
    #[error("unknown unit {0:?}")]
    UnknownUnit(UnitId),
    #[error("a submission is already in flight")]
    SubmissionInFlight,
    #[error("no decision is waiting for an answer")]
    NoPendingDecision,
    #[error("connection closed")]
    Closed,
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error(transparent)]
    Transport(#[from] ServerError),
}
