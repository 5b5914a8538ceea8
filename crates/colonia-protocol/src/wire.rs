use rmp_serde::{decode, encode};
use thiserror::Error;

use crate::{Command, Delta, WorldView};

#[derive(Debug, Error)]
pub enum WireError {
    #[error("encode error: {0}")]
    Encode(#[from] encode::Error),
    #[error("decode error: {0}")]
    Decode(#[from] decode::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub fn serialize_command(cmd: &Command) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(cmd)?)
}

pub fn deserialize_command(bytes: &[u8]) -> Result<Command, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_deltas(deltas: &[Delta]) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(deltas)?)
}

pub fn deserialize_deltas(bytes: &[u8]) -> Result<Vec<Delta>, WireError> {
    Ok(decode::from_slice(bytes)?)
}

pub fn serialize_view(view: &WorldView) -> Result<Vec<u8>, WireError> {
    Ok(encode::to_vec_named(view)?)
}

pub fn deserialize_view(bytes: &[u8]) -> Result<WorldView, WireError> {
    Ok(decode::from_slice(bytes)?)
}

/// Human-readable form of a delta batch, for logs and debugging tools.
pub fn deltas_to_json(deltas: &[Delta]) -> Result<String, WireError> {
    Ok(serde_json::to_string(deltas)?)
}

pub fn command_from_json(text: &str) -> Result<Command, WireError> {
    Ok(serde_json::from_str(text)?)
}

/// Deterministic view hash for desync detection.
///
/// Hashes the MessagePack-serialized view using FNV-1a 64-bit.
pub fn view_hash(view: &WorldView) -> Result<u64, WireError> {
    let bytes = serialize_view(view)?;
    Ok(hash_bytes_fnv1a64(&bytes))
}

/// Deterministic, stable 64-bit hash for raw bytes (FNV-1a).
pub fn hash_bytes_fnv1a64(bytes: &[u8]) -> u64 {
    const OFFSET_BASIS: u64 = 0xcbf29ce484222325;
    const PRIME: u64 = 0x100000001b3;

    let mut hash = OFFSET_BASIS;
    for &byte in bytes {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(PRIME);
    }
    hash
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Direction, EntityId};

    #[test]
    fn fnv_known_vectors() {
        assert_eq!(hash_bytes_fnv1a64(b""), 0xcbf29ce484222325);
        assert_eq!(hash_bytes_fnv1a64(b"a"), 0xaf63dc4c8601ec8c);
    }

    #[test]
    fn command_survives_msgpack() {
        let cmd = Command::MoveUnit {
            unit: EntityId::new(4, 1),
            direction: Direction::SW,
        };
        let bytes = serialize_command(&cmd).unwrap();
        assert_eq!(deserialize_command(&bytes).unwrap(), cmd);
    }

    #[test]
    fn command_json_uses_type_tag() {
        let cmd = command_from_json(r#"{"type":"EndTurn"}"#).unwrap();
        assert_eq!(cmd, Command::EndTurn);
    }
}
