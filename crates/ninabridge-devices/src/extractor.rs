//! State extraction from raw device status responses.
//!
//! NINA wraps most payloads as `{"Response": {...}, "Success": true, ...}`.
//! The extractor flattens one level of nesting into a lookup table keyed by
//! normalized field names, then resolves every value declared in the
//! device descriptor against it.
//!
//! Normalization lower-cases and strips everything that is not ASCII
//! alphanumeric, so `TargetTemp`, `target_temp` and `target-temp` all meet
//! at `targettemp`.

use std::collections::{BTreeMap, HashMap};

use serde_json::{Map, Value};
use tracing::trace;

use crate::mdl::{DeviceKind, ListSection};

/// Field that carries the payload of a NINA API envelope.
const ENVELOPE_FIELD: &str = "Response";

/// Extracted values keyed by value name. Explicit nulls are kept as
/// [`Value::Null`] so the names remain visible to discovery; callers must
/// not publish them.
pub type StateValues = BTreeMap<String, Value>;

/// Maps raw status responses onto the values declared for a device kind.
#[derive(Debug, Default, Clone, Copy)]
pub struct StateExtractor;

impl StateExtractor {
    pub fn new() -> Self {
        Self
    }

    /// Extract the declared values of `kind` from `status`.
    ///
    /// A non-object response yields an empty map. Names with no match in the
    /// response are omitted.
    pub fn extract(&self, kind: DeviceKind, status: &Value) -> StateValues {
        let mut values = StateValues::new();
        let Some(root) = status.as_object() else {
            trace!(device = %kind, "Status is not an object, nothing to extract");
            return values;
        };

        let descriptor = kind.descriptor();
        for section in descriptor.lists {
            synthesize_list(root, section, &mut values);
        }

        let lookup = build_lookup(root);
        for def in descriptor.values {
            let found = def
                .aliases
                .iter()
                .copied()
                .chain(std::iter::once(def.name))
                .find_map(|candidate| lookup.get(&normalize(candidate)));
            if let Some(value) = found {
                values.insert(def.name.to_string(), (*value).clone());
            }
        }

        trace!(device = %kind, count = values.len(), "Extracted state values");
        values
    }
}

/// Lower-case and keep ASCII alphanumerics only.
pub fn normalize(key: &str) -> String {
    key.chars()
        .filter(char::is_ascii_alphanumeric)
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn build_lookup(root: &Map<String, Value>) -> HashMap<String, &Value> {
    let mut lookup = HashMap::new();
    for (key, value) in root {
        match value {
            Value::Object(inner) if key == ENVELOPE_FIELD => {
                for (inner_key, inner_value) in inner {
                    lookup.insert(normalize(inner_key), inner_value);
                }
            }
            Value::Object(inner) => {
                for (inner_key, inner_value) in inner {
                    lookup.insert(normalize(&format!("{}_{}", key, inner_key)), inner_value);
                }
            }
            _ => {
                lookup.insert(normalize(key), value);
            }
        }
    }
    lookup
}

/// Expand each entry of a list section into `<prefix>_<index>_<field>`.
/// Entries that are not objects are skipped but still consume their index.
fn synthesize_list(root: &Map<String, Value>, section: &ListSection, values: &mut StateValues) {
    let entries = root
        .get(ENVELOPE_FIELD)
        .and_then(|response| response.get(section.source))
        .and_then(Value::as_array);
    let Some(entries) = entries else {
        return;
    };

    for (index, entry) in entries.iter().enumerate() {
        let Some(entry) = entry.as_object() else {
            continue;
        };
        for (suffix, field) in section.fields {
            let value = entry.get(*field).cloned().unwrap_or(Value::Null);
            values.insert(format!("{}_{}_{}", section.prefix, index, suffix), value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extract(kind: DeviceKind, status: Value) -> StateValues {
        StateExtractor::new().extract(kind, &status)
    }

    #[test]
    fn test_normalize() {
        assert_eq!(normalize("TargetTemp"), "targettemp");
        assert_eq!(normalize("target_temp"), "targettemp");
        assert_eq!(normalize("RMSError_RA-Pixels"), "rmserrorrapixels");
    }

    #[test]
    fn test_envelope_is_hoisted() {
        let values = extract(DeviceKind::Camera, json!({"Response": {"Temperature": -5.0}}));
        assert_eq!(values.len(), 1);
        assert_eq!(values["temperature"], json!(-5.0));
    }

    #[test]
    fn test_missing_field_is_omitted() {
        let values = extract(DeviceKind::Camera, json!({"Response": {"Gain": 100}}));
        assert!(!values.contains_key("temperature"));
        assert_eq!(values["gain"], json!(100));
    }

    #[test]
    fn test_alias_wins_over_name() {
        let values = extract(
            DeviceKind::Camera,
            json!({"Response": {"TargetTemp": -10, "target_temp": 99}}),
        );
        assert_eq!(values["target_temp"], json!(-10));
    }

    #[test]
    fn test_snake_case_names_match_pascal_case_fields() {
        let values = extract(
            DeviceKind::Camera,
            json!({"Response": {"CoolerOn": true, "IsExposing": false, "DisplayName": "ZWO"}}),
        );
        assert_eq!(values["cooler_on"], json!(true));
        assert_eq!(values["is_exposing"], json!(false));
        assert_eq!(values["display_name"], json!("ZWO"));
    }

    #[test]
    fn test_nested_objects_use_composite_keys() {
        let values = extract(
            DeviceKind::Guider,
            json!({"Response": {
                "Connected": true,
                "State": "Guiding"
            }, "RMSError": {"RA": {"Pixel": 0.3}}}),
        );
        assert_eq!(values["connected"], json!(true));
        assert_eq!(values["state"], json!("Guiding"));

        // One level only: `RMSError_RA` holds the inner object.
        let lookup_root = json!({"RMSError": {"Total": 0.5}});
        let lookup = build_lookup(lookup_root.as_object().unwrap());
        assert_eq!(lookup["rmserrortotal"], &json!(0.5));
    }

    #[test]
    fn test_mount_aliases() {
        let values = extract(
            DeviceKind::Mount,
            json!({"Response": {
                "TimeToMeridianFlip": 42.5,
                "HoursToMeridianString": "02:10:00",
                "TimeToMeridianFlipString": "00:42:30",
                "AtPark": false
            }}),
        );
        assert_eq!(values["time_to_flip"], json!(42.5));
        assert_eq!(values["hours_to_meridian"], json!("02:10:00"));
        assert_eq!(values["time_to_flip_string"], json!("00:42:30"));
        assert_eq!(values["at_park"], json!(false));
    }

    #[test]
    fn test_explicit_null_is_kept() {
        let values = extract(DeviceKind::Focuser, json!({"Response": {"Temperature": null}}));
        assert_eq!(values.get("temperature"), Some(&Value::Null));
    }

    #[test]
    fn test_non_object_status_is_empty() {
        assert!(extract(DeviceKind::Camera, json!([1, 2, 3])).is_empty());
        assert!(extract(DeviceKind::Camera, Value::Null).is_empty());
        assert!(extract(DeviceKind::Screenshot, json!({"Response": {}})).is_empty());
    }

    #[test]
    fn test_switch_lists_are_synthesized() {
        let values = extract(
            DeviceKind::Switch,
            json!({"Response": {
                "Connected": true,
                "ReadonlySwitches": [
                    {"Name": "Dew A", "Value": 1.0, "Id": 0, "Description": "heater"},
                    "garbage",
                    {"Name": "Dew C", "Value": 0.0, "Id": 2}
                ],
                "WriteableSwitches": [
                    {"Name": "Power", "Id": 5, "Min": 0, "Max": 1, "StepSize": 1, "TargetValue": 1}
                ]
            }}),
        );

        assert_eq!(values["connected"], json!(true));
        assert_eq!(values["readonly_switch_0_name"], json!("Dew A"));
        assert_eq!(values["readonly_switch_0_description"], json!("heater"));
        assert!(!values.contains_key("readonly_switch_1_name"));
        assert_eq!(values["readonly_switch_2_value"], json!(0.0));
        assert_eq!(values["readonly_switch_2_description"], Value::Null);
        assert_eq!(values["writable_switch_0_stepsize"], json!(1));
        assert_eq!(values["writable_switch_0_targetvalue"], json!(1));
        assert_eq!(values["writable_switch_0_description"], Value::Null);
    }
}
