//! Network protocol messages for multiplayer.
//!
//! Wraps the colonia-protocol game types in session-level messages. Frames on
//! the wire are a big-endian `u32` length followed by a MessagePack body.

use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use colonia_protocol::{
    Command, DecisionAnswer, DecisionRequest, Delta, MonarchAction, PlayerId, Rejection, WorldView,
};

use crate::error::ServerError;

/// Largest frame either side will accept.
pub const MAX_FRAME_BYTES: usize = 4 * 1024 * 1024;

/// Client-to-server messages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Claim a seat, or take back a dropped one with its token
    Join {
        player_name: String,
        reconnect_token: Option<String>,
    },
    /// Commands for the current turn, applied in order as one unit
    Submit {
        commands: Vec<Command>,
        /// The submitter's own answers, consumed in order
        answers: Vec<DecisionAnswer>,
        /// Last checksum the client received; 0 skips the check
        state_checksum: u64,
    },
    /// Answer to a `DecisionNeeded` raised by someone else's submission
    Answer { answer: DecisionAnswer },
    /// Answer to a crown offer forwarded by the monarch worker
    MonarchAnswer { action: MonarchAction, accept: bool },
    /// Full state (reconnect or suspected desync)
    RequestState,
    Ping { timestamp: u64 },
}

/// Server-to-client messages
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    JoinAccepted {
        player_id: PlayerId,
        reconnect_token: String,
    },
    JoinRejected { reason: String },
    /// Full visibility-filtered state
    GameState { view: WorldView, checksum: u64 },
    /// What the recipient learned from one operation
    StateDelta { deltas: Vec<Delta>, checksum: u64 },
    SubmissionAccepted,
    SubmissionRejected { index: usize, reason: Rejection },
    /// The submission broke a server invariant; nothing was applied
    SubmissionFailed { index: usize, message: String },
    /// The recipient must answer before a pending operation can finish
    DecisionNeeded { request: DecisionRequest },
    /// The submission is parked until `player` answers
    AwaitingDecision { player: PlayerId },
    DesyncDetected { expected: u64, received: u64 },
    Pong { timestamp: u64 },
}

pub fn serialize_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ServerError> {
    Ok(rmp_serde::to_vec_named(msg)?)
}

pub fn deserialize_client_message(data: &[u8]) -> Result<ClientMessage, ServerError> {
    Ok(rmp_serde::from_slice(data)?)
}

pub fn serialize_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ServerError> {
    Ok(rmp_serde::to_vec_named(msg)?)
}

pub fn deserialize_server_message(data: &[u8]) -> Result<ServerMessage, ServerError> {
    Ok(rmp_serde::from_slice(data)?)
}

pub async fn write_frame<W>(writer: &mut W, body: &[u8]) -> Result<(), ServerError>
where
    W: AsyncWrite + Unpin,
{
    if body.len() > MAX_FRAME_BYTES {
        return Err(ServerError::FrameTooLarge(body.len()));
    }
    writer.write_u32(body.len() as u32).await?;
    writer.write_all(body).await?;
    writer.flush().await?;
    Ok(())
}

/// Reads one frame; `None` on a clean end of stream.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Vec<u8>>, ServerError>
where
    R: AsyncRead + Unpin,
{
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    if len > MAX_FRAME_BYTES {
        return Err(ServerError::FrameTooLarge(len));
    }
    let mut body = vec![0; len];
    reader.read_exact(&mut body).await?;
    Ok(Some(body))
}
