// ── Domain model ──
//
// Canonical device state as hosts consume it. Wire codes from
// `ryobi_gdo_api` map through fixed, closed tables: the vendor cloud
// only ever emits known codes, so an unmapped code is a hard update
// failure rather than a silent `Unknown`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use ryobi_gdo_api::models::DeviceReport;

use crate::error::CoreError;

/// Door position as reported by the opener.
///
/// `Unknown` exists for host-side rendering of not-yet-polled state; it
/// is never produced by code mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DoorState {
    Closed,
    Open,
    Opening,
    Unknown,
}

impl DoorState {
    /// Map a vendor door code: `"0"` closed, `"1"` open, `"3"` opening.
    pub fn from_code(code: &str) -> Result<Self, CoreError> {
        match code {
            "0" => Ok(Self::Closed),
            "1" => Ok(Self::Open),
            "3" => Ok(Self::Opening),
            other => Err(CoreError::UpdateFailed {
                message: format!("unrecognized door state code {other:?}"),
            }),
        }
    }
}

impl fmt::Display for DoorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::Opening => "opening",
            Self::Unknown => "unknown",
        })
    }
}

/// Light switch state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LightState {
    On,
    Off,
    Unknown,
}

impl LightState {
    /// Map a vendor light code: `"True"` on, `"False"` off.
    pub fn from_code(code: &str) -> Result<Self, CoreError> {
        match code {
            "True" => Ok(Self::On),
            "False" => Ok(Self::Off),
            other => Err(CoreError::UpdateFailed {
                message: format!("unrecognized light state code {other:?}"),
            }),
        }
    }
}

impl fmt::Display for LightState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::On => "on",
            Self::Off => "off",
            Self::Unknown => "unknown",
        })
    }
}

/// Last-known device state.
///
/// Owned by the facade and replaced wholesale on each successful
/// update; a failed update leaves the previous snapshot untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateSnapshot {
    pub door: DoorState,
    pub light: LightState,
    /// Backup battery charge, percent.
    pub battery_level: f64,
    /// When this snapshot was taken.
    pub updated_at: DateTime<Utc>,
}

impl StateSnapshot {
    /// Build a snapshot from a wire report, stamped with the current
    /// time. Fails on any unmapped code; no field is applied in
    /// isolation.
    pub fn from_report(report: &DeviceReport) -> Result<Self, CoreError> {
        Ok(Self {
            door: DoorState::from_code(&report.door_code)?,
            light: LightState::from_code(&report.light_code)?,
            battery_level: report.battery_level,
            updated_at: Utc::now(),
        })
    }
}
