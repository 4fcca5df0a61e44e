use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::AddressError;

/// Number of physical reference marks acknowledged during an LH2
/// calibration run.
pub const CALIBRATION_POINT_COUNT: usize = 9;

const ADDRESS_LEN: usize = 16;
const INACTIVE_ADDRESS: &str = "0000000000000000";

/// 64-bit DotBot radio address, carried on the wire as a 16-character
/// lowercase hex string. The all-zero address is reserved as the
/// "no robot is active" sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RobotAddress(String);

impl RobotAddress {
    pub fn parse(raw: impl AsRef<str>) -> Result<Self, AddressError> {
        let raw = raw.as_ref();
        if raw.len() != ADDRESS_LEN {
            return Err(AddressError::Length {
                expected: ADDRESS_LEN,
                actual: raw.len(),
            });
        }
        if let Some(bad) = raw.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(AddressError::InvalidCharacter(bad));
        }
        Ok(Self(raw.to_ascii_lowercase()))
    }

    /// "No robot is active", both in memory and on the wire.
    pub fn inactive() -> Self {
        Self(INACTIVE_ADDRESS.to_string())
    }

    pub fn is_inactive(&self) -> bool {
        self.0 == INACTIVE_ADDRESS
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RobotAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for RobotAddress {
    type Error = AddressError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<RobotAddress> for String {
    fn from(value: RobotAddress) -> Self {
        value.0
    }
}

impl std::str::FromStr for RobotAddress {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RgbLed {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl RgbLed {
    pub fn new(red: u8, green: u8, blue: u8) -> Self {
        Self { red, green, blue }
    }
}

/// 2D coordinate from the LH2 indoor positioning subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Lh2Position {
    pub x: f32,
    pub y: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DotBot {
    pub address: RobotAddress,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rgb_led: Option<RgbLed>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lh2_position: Option<Lh2Position>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CalibrationState {
    #[default]
    Unknown,
    Running,
    Ready,
    Done,
}
