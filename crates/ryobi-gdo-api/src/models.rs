// TiWiConnect API response types
//
// Models for the device service's JSON API. Every response wraps its payload
// in a `result` member. Fields use `#[serde(default)]` liberally because the
// service omits modules a unit does not carry; the three attribute paths a
// garage door unit must carry are walked by `DeviceRecord::report`, which
// refuses to produce a partial report.

use serde::{Deserialize, Serialize};

use crate::error::Error;

// ── Login ────────────────────────────────────────────────────────────

/// Response envelope from `POST /api/login`.
#[derive(Debug, Deserialize)]
pub struct LoginResponse {
    pub result: LoginResult,
}

#[derive(Debug, Deserialize)]
pub struct LoginResult {
    #[serde(rename = "metaData")]
    pub meta_data: LoginMetaData,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct LoginMetaData {
    /// Per-session WebSocket auth grants. The first entry carries the key.
    #[serde(default, rename = "wskAuthAttempts")]
    pub wsk_auth_attempts: Vec<AuthAttempt>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub struct AuthAttempt {
    #[serde(default, rename = "apiKey")]
    pub api_key: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Device list ──────────────────────────────────────────────────────

/// Response envelope from `GET /api/devices`.
#[derive(Debug, Deserialize)]
pub struct DeviceListResponse {
    pub result: Vec<DeviceSummary>,
}

/// One account device from the device list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// Stable device identifier; doubles as the command-channel topic.
    #[serde(rename = "varName")]
    pub var_name: String,
    /// Catch-all for undocumented fields.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Device query ─────────────────────────────────────────────────────

/// Response envelope from `GET /api/devices/{id}`.
#[derive(Debug, Deserialize)]
pub struct DeviceQueryResponse {
    pub result: Vec<DeviceRecord>,
}

/// Full device object from a single-device query.
///
/// A unit reports dozens of modules under `deviceTypeMap`; only the three
/// a garage door opener must carry are modeled explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(default, rename = "varName")]
    pub var_name: Option<String>,
    #[serde(default, rename = "deviceTypeMap")]
    pub device_type_map: Option<DeviceTypeMap>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceTypeMap {
    #[serde(default, rename = "garageDoor_7")]
    pub garage_door: Option<DoorModule>,
    #[serde(default, rename = "garageLight_7")]
    pub garage_light: Option<LightModule>,
    #[serde(default, rename = "backupCharger_8")]
    pub backup_charger: Option<ChargerModule>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorModule {
    #[serde(default)]
    pub at: Option<DoorAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoorAttributes {
    #[serde(default, rename = "doorState")]
    pub door_state: Option<Attribute>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightModule {
    #[serde(default)]
    pub at: Option<LightAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LightAttributes {
    #[serde(default, rename = "lightState")]
    pub light_state: Option<Attribute>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargerModule {
    #[serde(default)]
    pub at: Option<ChargerAttributes>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChargerAttributes {
    #[serde(default, rename = "chargeLevel")]
    pub charge_level: Option<Attribute>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// A single reported attribute. The service wraps every reading in an
/// object whose `value` member holds the actual datum.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attribute {
    #[serde(default)]
    pub value: Option<serde_json::Value>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

// ── Extracted report ─────────────────────────────────────────────────

/// The three readings a state update is made of, pulled out of a
/// [`DeviceRecord`]. Codes are kept as raw vendor strings; mapping them
/// onto domain enums happens a layer up.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceReport {
    pub door_code: String,
    pub light_code: String,
    pub battery_level: f64,
}

const DOOR_PATH: &str = "deviceTypeMap.garageDoor_7.at.doorState.value";
const LIGHT_PATH: &str = "deviceTypeMap.garageLight_7.at.lightState.value";
const CHARGE_PATH: &str = "deviceTypeMap.backupCharger_8.at.chargeLevel.value";

impl DeviceRecord {
    /// Walk the three fixed attribute paths and build a [`DeviceReport`].
    ///
    /// Any absent link is a hard error; a partial report is never
    /// produced.
    pub fn report(&self) -> Result<DeviceReport, Error> {
        let modules = self
            .device_type_map
            .as_ref()
            .ok_or(Error::MissingField { path: "result[0].deviceTypeMap" })?;

        let door_attr = modules
            .garage_door
            .as_ref()
            .and_then(|m| m.at.as_ref())
            .and_then(|at| at.door_state.as_ref());
        let light_attr = modules
            .garage_light
            .as_ref()
            .and_then(|m| m.at.as_ref())
            .and_then(|at| at.light_state.as_ref());
        let charge_attr = modules
            .backup_charger
            .as_ref()
            .and_then(|m| m.at.as_ref())
            .and_then(|at| at.charge_level.as_ref());

        let door = attribute_value(door_attr, DOOR_PATH)?;
        let light = attribute_value(light_attr, LIGHT_PATH)?;
        let charge = attribute_value(charge_attr, CHARGE_PATH)?;
        let battery_level = charge.as_f64().ok_or(Error::MissingField { path: CHARGE_PATH })?;

        Ok(DeviceReport {
            door_code: code_string(door),
            light_code: code_string(light),
            battery_level,
        })
    }
}

fn attribute_value<'a>(
    attribute: Option<&'a Attribute>,
    path: &'static str,
) -> Result<&'a serde_json::Value, Error> {
    attribute.and_then(|a| a.value.as_ref()).ok_or(Error::MissingField { path })
}

/// Render an attribute value the way the vendor spells its state codes:
/// strings pass through, booleans become `True`/`False`, numbers are
/// stringified.
fn code_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(true) => "True".to_owned(),
        serde_json::Value::Bool(false) => "False".to_owned(),
        other => other.to_string(),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{DeviceQueryResponse, DeviceRecord, LoginResponse, code_string};
    use crate::error::Error;

    fn full_record() -> serde_json::Value {
        json!({
            "varName": "gd_1234",
            "deviceTypeMap": {
                "garageDoor_7": { "at": { "doorState": { "value": "1" } } },
                "garageLight_7": { "at": { "lightState": { "value": false } } },
                "backupCharger_8": { "at": { "chargeLevel": { "value": 87 } } },
                "wifiModule_1": { "at": { "rssi": { "value": -61 } } }
            }
        })
    }

    #[test]
    fn report_extracts_all_three_readings() {
        let record: DeviceRecord = serde_json::from_value(full_record()).unwrap();
        let report = record.report().unwrap();
        assert_eq!(report.door_code, "1");
        assert_eq!(report.light_code, "False");
        assert!((report.battery_level - 87.0).abs() < f64::EPSILON);
    }

    #[test]
    fn report_fails_when_a_module_is_missing() {
        let mut body = full_record();
        body["deviceTypeMap"].as_object_mut().unwrap().remove("garageLight_7");
        let record: DeviceRecord = serde_json::from_value(body).unwrap();

        let err = record.report().unwrap_err();
        assert!(
            matches!(err, Error::MissingField { path } if path.contains("garageLight_7")),
            "expected the light path, got: {err:?}"
        );
    }

    #[test]
    fn report_fails_when_an_attribute_has_no_value() {
        let mut body = full_record();
        body["deviceTypeMap"]["garageDoor_7"]["at"]["doorState"] = json!({});
        let record: DeviceRecord = serde_json::from_value(body).unwrap();

        let err = record.report().unwrap_err();
        assert!(matches!(err, Error::MissingField { path } if path.contains("doorState")));
    }

    #[test]
    fn report_fails_on_a_non_numeric_charge_level() {
        let mut body = full_record();
        body["deviceTypeMap"]["backupCharger_8"]["at"]["chargeLevel"]["value"] = json!("full");
        let record: DeviceRecord = serde_json::from_value(body).unwrap();

        let err = record.report().unwrap_err();
        assert!(matches!(err, Error::MissingField { path } if path.contains("chargeLevel")));
    }

    #[test]
    fn query_response_tolerates_unknown_modules_and_fields() {
        let body = json!({ "result": [full_record()] });
        let parsed: DeviceQueryResponse = serde_json::from_value(body).unwrap();
        let record = &parsed.result[0];
        assert_eq!(record.var_name.as_deref(), Some("gd_1234"));
        assert!(record.device_type_map.as_ref().unwrap().extra.contains_key("wifiModule_1"));
    }

    #[test]
    fn login_response_exposes_the_first_auth_attempt() {
        let body = json!({
            "result": {
                "metaData": {
                    "wskAuthAttempts": [
                        { "apiKey": "abc123", "varName": "user@example.com" }
                    ],
                    "sessionCount": 1
                },
                "auth": { "roles": ["user"] }
            }
        });
        let parsed: LoginResponse = serde_json::from_value(body).unwrap();
        let key = parsed.result.meta_data.wsk_auth_attempts[0].api_key.as_deref();
        assert_eq!(key, Some("abc123"));
    }

    #[test]
    fn code_string_matches_the_vendor_spelling() {
        assert_eq!(code_string(&json!("3")), "3");
        assert_eq!(code_string(&json!(true)), "True");
        assert_eq!(code_string(&json!(false)), "False");
        assert_eq!(code_string(&json!(1)), "1");
    }
}
