use colonia_core::{RulesError, SetupError};
use colonia_protocol::wire::WireError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error(transparent)]
    Rules(#[from] RulesError),
    #[error(transparent)]
    Setup(#[from] SetupError),
    #[error(transparent)]
    Wire(#[from] WireError),
    #[error("message encode error: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("message decode error: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("frame of {0} bytes exceeds the limit")]
    FrameTooLarge(usize),
    #[error("request loop has shut down")]
    LoopClosed,
}
