use serde::{Deserialize, Serialize};

use crate::domain::{CalibrationState, RobotAddress};

pub const STATUS_STREAM_PATH: &str = "/controller/ws/status";

/// Server-to-client push message, discriminated by the `cmd` field.
/// Kinds the server may add later deserialize to `Unknown` and are
/// ignored instead of failing the subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", rename_all = "snake_case")]
pub enum StatusUpdate {
    Reload,
    Lh2Position {
        address: RobotAddress,
        x: f32,
        y: f32,
    },
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActiveAddress {
    pub address: RobotAddress,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RgbLedUpdate {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CalibrationStatus {
    pub state: CalibrationState,
}
