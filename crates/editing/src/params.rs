//! Decoding of untyped command parameters (scripts, the CLI) into
//! `EditCommand`. Nothing past this module sees a bare number as a time.

use serde_json::{Map, Value};
use timeline::RationalTime;

use crate::{EditCommand, EditError, EditResult};

const TIMING_FIELDS: &[&str] = &["position", "at", "delta", "duration", "source_in", "source_out"];
const NESTED_FIELDS: &[&str] = &["clip", "clips", "edges"];

/// Older field names that mean the same thing as a canonical timing field.
const LEGACY_ALIASES: &[(&str, &str, &str)] = &[
    ("delta_ms", "delta", "milliseconds"),
    ("delta_frames", "delta", "frames"),
    ("split_frame", "at", "frames"),
    ("insert_time", "position", "frames"),
];

/// Options for the wire adapter.
#[derive(Debug, Clone, Copy, Default)]
pub struct DecodeOptions {
    /// Accept `"delta": 12` as twelve frames.
    pub allow_bare_frame_numbers: bool,
}

pub fn decode_command(raw: &Value, options: DecodeOptions) -> EditResult<EditCommand> {
    let mut value = raw.clone();
    let Some(object) = value.as_object_mut() else {
        return Err(EditError::Validation("a command must be a JSON object".into()));
    };
    if !object.contains_key("command") {
        return Err(EditError::Validation("missing `command` field".into()));
    }
    normalize_object(object, options)?;
    serde_json::from_value(value).map_err(|err| EditError::Validation(err.to_string()))
}

fn normalize_object(object: &mut Map<String, Value>, options: DecodeOptions) -> EditResult<()> {
    for (legacy, field, unit) in LEGACY_ALIASES {
        let Some(raw) = object.remove(*legacy) else {
            continue;
        };
        if object.contains_key(*field) {
            return Err(EditError::Validation(format!(
                "both `{legacy}` and `{field}` given"
            )));
        }
        let Some(number) = raw.as_i64() else {
            return Err(EditError::Validation(format!(
                "`{legacy}` must be an integer"
            )));
        };
        let mut tagged = Map::new();
        tagged.insert((*unit).to_string(), Value::from(number));
        object.insert((*field).to_string(), Value::Object(tagged));
    }

    for field in TIMING_FIELDS {
        if let Some(slot) = object.get_mut(*field) {
            *slot = normalize_timing(field, slot.take(), options)?;
        }
    }
    for field in NESTED_FIELDS {
        match object.get_mut(*field) {
            Some(Value::Object(nested)) => normalize_object(nested, options)?,
            Some(Value::Array(items)) => {
                for item in items {
                    if let Value::Object(nested) = item {
                        normalize_object(nested, options)?;
                    }
                }
            }
            _ => {}
        }
    }
    Ok(())
}

fn normalize_timing(field: &str, value: Value, options: DecodeOptions) -> EditResult<Value> {
    match value {
        Value::Number(number) => {
            let Some(frames) = number.as_i64() else {
                return Err(EditError::Validation(format!(
                    "`{field}` must be a whole number of frames"
                )));
            };
            if !options.allow_bare_frame_numbers {
                return Err(EditError::Validation(format!(
                    "`{field}` is a bare number; pass {{\"frames\": {frames}}} or enable allow_bare_frame_numbers"
                )));
            }
            Ok(serde_json::json!({ "frames": frames }))
        }
        // A bare `{frames, rate_num, rate_den}` record is a rational time.
        Value::Object(object) if object.contains_key("rate_num") => {
            let time: RationalTime = serde_json::from_value(Value::Object(object))
                .map_err(|err| EditError::Validation(format!("`{field}`: {err}")))?;
            Ok(serde_json::json!({ "rational": time }))
        }
        other => Ok(other),
    }
}
