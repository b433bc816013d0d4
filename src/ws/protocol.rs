//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Input actions a client may press. Anything outside this set is stripped
/// from incoming messages before it reaches the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameInput {
    Forward,
    Reverse,
    Left,
    Right,
    Brake,
    BarrelUp,
    BarrelDown,
    TurretLeft,
    TurretRight,
    Fire,
    Reset,
}

impl GameInput {
    /// Parse a wire key into a recognized action. Unknown keys yield `None`.
    pub fn from_wire(key: &str) -> Option<Self> {
        match key {
            "forward" => Some(Self::Forward),
            "reverse" => Some(Self::Reverse),
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "brake" => Some(Self::Brake),
            "barrel_up" => Some(Self::BarrelUp),
            "barrel_down" => Some(Self::BarrelDown),
            "turret_left" => Some(Self::TurretLeft),
            "turret_right" => Some(Self::TurretRight),
            "fire" => Some(Self::Fire),
            "reset" => Some(Self::Reset),
            _ => None,
        }
    }
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Player input for one client step. The key map is raw on purpose:
    /// unrecognized keys are dropped server-side, never rejected.
    Input {
        /// Client-side step counter, echoed back for reconciliation
        step: u32,
        /// Client clock at the time the input was sampled (ms)
        timestamp: f64,
        /// Pressed state per action key
        input: HashMap<String, bool>,
    },
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Welcome message after connection
    Welcome { session_id: Uuid, server_time: u64 },

    /// A fresh shell has been loaded into this client's barrel
    Load {},

    /// Replicated room state, sent at the patch rate
    State {
        status: RoomStatus,
        players: HashMap<Uuid, PlayerSnapshot>,
    },

    /// Match has ended
    #[serde(rename = "match-end")]
    MatchEnd {
        winner: Option<Uuid>,
        loser: Option<Uuid>,
        is_draw: bool,
        stats: MatchStats,
    },

    /// Error message
    Error { code: String, message: String },
}

/// Room lifecycle visible to clients
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatus {
    /// Waiting for the second player
    Matching,
    /// Both players present, match running
    Ready,
}

/// Three-component vector on the wire
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WireVec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Quaternion on the wire (x, y, z, w)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireQuat {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for WireQuat {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

/// Acknowledgment of the last input command the simulation applied
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LastProcessedInput {
    pub step: u32,
    pub timestamp: f64,
}

/// Per-player state in a patch. A read-only projection of the authoritative
/// physics and combat state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub uid: String,
    pub position: WireVec3,
    pub rotation: WireQuat,
    pub turret_rotation: WireQuat,
    pub barrel_rotation: WireQuat,
    pub left_speed: f32,
    pub right_speed: f32,
    /// Health (0-100)
    pub health: f32,
    /// Fire cooldown elapsed
    pub can_fire: bool,
    /// Absent until the first command has been applied
    pub last_processed_input: Option<LastProcessedInput>,
}

/// Match statistics at end
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchStats {
    pub player_stats: HashMap<Uuid, PlayerMatchStats>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlayerMatchStats {
    pub uid: String,
    pub shells_used: u32,
    pub total_damage: f32,
    pub points: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_message_parses_with_unknown_keys_present() {
        let raw = r#"{
            "type": "input",
            "step": 7,
            "timestamp": 1234.5,
            "input": {"forward": true, "jetpack": true, "fire": false}
        }"#;

        let msg: ClientMsg = serde_json::from_str(raw).expect("input message should parse");
        match msg {
            ClientMsg::Input { step, input, .. } => {
                assert_eq!(step, 7);
                // The raw map keeps everything; filtering happens in game::input
                assert_eq!(input.len(), 3);
            }
        }
    }

    #[test]
    fn match_end_uses_dashed_type_tag() {
        let msg = ServerMsg::MatchEnd {
            winner: None,
            loser: None,
            is_draw: true,
            stats: MatchStats::default(),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"match-end""#));
    }

    #[test]
    fn unknown_wire_keys_do_not_map_to_actions() {
        assert_eq!(GameInput::from_wire("forward"), Some(GameInput::Forward));
        assert_eq!(GameInput::from_wire("barrel_up"), Some(GameInput::BarrelUp));
        assert_eq!(GameInput::from_wire("warp_drive"), None);
        assert_eq!(GameInput::from_wire(""), None);
    }
}
