// ── Command API ──
//
// All write operations flow through a typed `DeviceCommand`. Each
// variant knows its wire attribute and value, and which observed state
// confirms it for the settle engine.

use std::fmt;

use serde_json::{Value, json};

use crate::model::{DoorState, LightState, StateSnapshot};

/// A write operation against the opener, delivered over the realtime
/// channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceCommand {
    OpenDoor,
    CloseDoor,
    Light { on: bool },
}

impl DeviceCommand {
    /// Module attribute carried in the command frame.
    pub fn attribute(self) -> &'static str {
        match self {
            Self::OpenDoor | Self::CloseDoor => "doorCommand",
            Self::Light { .. } => "lightState",
        }
    }

    /// Attribute value: the door motor takes `1`/`0`, the light a plain
    /// boolean.
    pub fn value(self) -> Value {
        match self {
            Self::OpenDoor => json!(1),
            Self::CloseDoor => json!(0),
            Self::Light { on } => json!(on),
        }
    }

    /// Whether `snapshot` shows the state this command drives toward.
    pub fn confirmed_by(self, snapshot: &StateSnapshot) -> bool {
        match self {
            Self::OpenDoor => snapshot.door == DoorState::Open,
            Self::CloseDoor => snapshot.door == DoorState::Closed,
            Self::Light { on: true } => snapshot.light == LightState::On,
            Self::Light { on: false } => snapshot.light == LightState::Off,
        }
    }
}

impl fmt::Display for DeviceCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::OpenDoor => "open door",
            Self::CloseDoor => "close door",
            Self::Light { on: true } => "light on",
            Self::Light { on: false } => "light off",
        })
    }
}
