//! Type & port model: the [`DataType`] tag set, port/control schemas, and
//! the type-compatibility relation the scheduler consults when gathering
//! inputs.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The closed set of data types that can flow along an edge.
///
/// Presentation metadata (label/color/line style) is consumed by the editor,
/// not by the engine; `display_label` below is kept only because it is cheap
/// to derive and useful in logs/errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Trigger,
    Number,
    String,
    Boolean,
    Audio,
    Video,
    Texture,
    Data,
    Array,
    Any,
    Scene3d,
    Object3d,
    Geometry3d,
    Material3d,
    Camera3d,
    Light3d,
    Transform3d,
}

impl DataType {
    pub fn display_label(&self) -> &'static str {
        match self {
            DataType::Trigger => "Trigger",
            DataType::Number => "Number",
            DataType::String => "String",
            DataType::Boolean => "Boolean",
            DataType::Audio => "Audio",
            DataType::Video => "Video",
            DataType::Texture => "Texture",
            DataType::Data => "Data",
            DataType::Array => "Array",
            DataType::Any => "Any",
            DataType::Scene3d => "Scene",
            DataType::Object3d => "Object",
            DataType::Geometry3d => "Geometry",
            DataType::Material3d => "Material",
            DataType::Camera3d => "Camera",
            DataType::Light3d => "Light",
            DataType::Transform3d => "Transform",
        }
    }
}

/// Returns true if a value produced for `producer` may be consumed by a port
/// declared as `consumer`.
///
/// `Any` is bidirectionally compatible with everything; otherwise types must
/// match by equality, with a documented set of widenings handled separately
/// by [`coerce`].
pub fn compatible(producer: DataType, consumer: DataType) -> bool {
    producer == DataType::Any || consumer == DataType::Any || producer == consumer
}

/// Attempts a soft coercion of `value` (tagged as having come from a
/// `producer`-typed output) into the shape a `consumer`-typed port expects.
///
/// Coercions are deterministic and total: when a pair has no documented
/// widening the value passes through unchanged (the consumer executor is
/// responsible for any further, node-specific interpretation).
///
/// Documented widenings:
/// - `number -> boolean`: truthiness, `0`/`0.0` is false, anything else true.
/// - `boolean -> number`: `true -> 1.0`, `false -> 0.0`.
/// - `string -> boolean`: `"true"`/`"1"` (case-insensitive) is true,
///   `"false"`/`"0"`/empty is false, anything else defaults to true.
/// - `number -> string`: formatted via `Value`'s default numeric rendering.
/// - `boolean -> string`: `"true"`/`"false"`.
pub fn coerce(value: &Value, producer: DataType, consumer: DataType) -> Value {
    if producer == consumer || producer == DataType::Any || consumer == DataType::Any {
        return value.clone();
    }
    match (producer, consumer) {
        (DataType::Number, DataType::Boolean) => {
            serde_json::Value::Bool(value.as_f64().map(|n| n != 0.0).unwrap_or(false))
        }
        (DataType::Boolean, DataType::Number) => {
            serde_json::Value::from(if value.as_bool().unwrap_or(false) {
                1.0
            } else {
                0.0
            })
        }
        (DataType::String, DataType::Boolean) => {
            let s = value.as_str().unwrap_or("").trim().to_ascii_lowercase();
            let truthy = !(s.is_empty() || s == "false" || s == "0");
            serde_json::Value::Bool(truthy)
        }
        (DataType::Number, DataType::String) => serde_json::Value::String(
            value
                .as_f64()
                .map(|n| n.to_string())
                .unwrap_or_else(|| value.to_string()),
        ),
        (DataType::Boolean, DataType::String) => serde_json::Value::String(
            value
                .as_bool()
                .map(|b| b.to_string())
                .unwrap_or_else(|| value.to_string()),
        ),
        _ => value.clone(),
    }
}

/// Static schema for a single input or output port on a node.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PortDefinition {
    pub id: String,
    #[serde(rename = "type")]
    pub data_type: DataType,
    pub label: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub multiple: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

/// Static schema for a control (an editor-facing widget bound to node data).
///
/// `widget` names a widget family (number, select, checkbox, text, color,
/// ...) that is opaque to the engine; it is carried through only so hosts
/// can render the right control.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ControlDefinition {
    pub id: String,
    pub widget: String,
    pub label: String,
    #[serde(default)]
    pub default: Option<Value>,
    #[serde(default)]
    pub exposable: bool,
    #[serde(default)]
    pub bindable: bool,
    #[serde(default)]
    pub props: Option<Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn any_is_bidirectionally_compatible() {
        assert!(compatible(DataType::Any, DataType::Number));
        assert!(compatible(DataType::Number, DataType::Any));
    }

    #[test]
    fn equal_types_compatible() {
        assert!(compatible(DataType::Texture, DataType::Texture));
        assert!(!compatible(DataType::Texture, DataType::Number));
    }

    #[test]
    fn number_boolean_widening() {
        let v = coerce(&Value::from(0.0), DataType::Number, DataType::Boolean);
        assert_eq!(v, Value::Bool(false));
        let v = coerce(&Value::from(3.5), DataType::Number, DataType::Boolean);
        assert_eq!(v, Value::Bool(true));
    }

    #[test]
    fn string_boolean_truthy_table() {
        for (s, expected) in [("true", true), ("1", true), ("false", false), ("0", false), ("", false), ("yes", true)] {
            let v = coerce(&Value::String(s.into()), DataType::String, DataType::Boolean);
            assert_eq!(v, Value::Bool(expected), "input {s:?}");
        }
    }
}
