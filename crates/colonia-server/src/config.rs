//! Server configuration

use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;
use std::time::Duration;

use colonia_protocol::PlayerKind;
use serde::{Deserialize, Serialize};

use crate::error::ServerError;

/// Server configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind the server
    pub bind_address: SocketAddr,
    /// Grace period before a disconnected seat is handed to the AI
    pub disconnect_grace: Duration,
    /// How long the monarch worker waits for a player's answer
    pub monarch_reply_timeout: Duration,
    /// Send a full state after every detected desync instead of just reporting it
    pub force_resync_on_desync: bool,
    /// Optional `GameOptions` YAML; defaults apply when absent
    pub options_path: Option<String>,
    /// Optional rules directory; the embedded rules apply when absent
    pub rules_path: Option<String>,
    pub seed: u64,
    pub map: MapSettings,
    pub seats: Vec<SeatConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 7878)),
            disconnect_grace: Duration::from_secs(60),
            monarch_reply_timeout: Duration::from_secs(30),
            force_resync_on_desync: true,
            options_path: None,
            rules_path: None,
            seed: 1492,
            map: MapSettings::default(),
            seats: vec![
                SeatConfig::human("Dutch", PlayerKind::Colonial),
                SeatConfig::human("English", PlayerKind::Colonial),
                SeatConfig::ai("French", PlayerKind::Colonial),
                SeatConfig::ai("Arawak", PlayerKind::Native),
                SeatConfig::ai("Sioux", PlayerKind::Native),
            ],
        }
    }
}

impl ServerConfig {
    pub fn from_yaml(yaml: &str) -> Result<Self, ServerError> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ServerError> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml(&yaml)
    }
}

/// Generated map parameters
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MapSettings {
    pub width: u32,
    pub height: u32,
    pub settlements_per_tribe: u32,
    pub rumour_pct: u32,
    pub starting_gold: i64,
}

impl Default for MapSettings {
    fn default() -> Self {
        Self {
            width: 40,
            height: 30,
            settlements_per_tribe: 4,
            rumour_pct: 3,
            starting_gold: 1000,
        }
    }
}

/// One seat at the table
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SeatConfig {
    pub name: String,
    pub kind: PlayerKind,
    pub human: bool,
}

impl SeatConfig {
    pub fn human(name: &str, kind: PlayerKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            human: true,
        }
    }

    pub fn ai(name: &str, kind: PlayerKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            human: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_yaml_keeps_defaults() {
        let config = ServerConfig::from_yaml("seed: 7\nmap:\n  width: 20\n").unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.map.width, 20);
        assert_eq!(config.map.height, 30);
        assert_eq!(config.seats.len(), 5);
        assert!(config.force_resync_on_desync);
    }

    #[test]
    fn seats_parse_from_yaml() {
        let yaml = "seats:\n  - { name: Dutch, kind: Colonial, human: true }\n  - { name: Sioux, kind: Native, human: false }\n";
        let config = ServerConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.seats.len(), 2);
        assert_eq!(config.seats[1].kind, PlayerKind::Native);
        assert!(!config.seats[1].human);
    }
}
