//! Ad-hoc shapes for the `dump` command.
//!
//! A shape is a comma-separated list of member type names, e.g.
//! `i32,text,uuid,timestamp`.

use marshal_buffer::{PrimitiveKind, PrimitiveValue, Timestamp, TypeIdentity};
use serde_json::{json, Value};
use std::any::Any;
use uuid::Uuid;

/// Names accepted besides the primitive names.
const NAMED_TYPES: &[&str] = &["text", "string", "uuid", "timestamp"];

/// Resolves one member type name.
pub fn identity_for(name: &str) -> Option<TypeIdentity> {
    if let Some(kind) = PrimitiveKind::from_name(name) {
        return Some(kind.identity());
    }
    match name {
        "text" | "string" => Some(TypeIdentity::of::<String>()),
        "uuid" => Some(TypeIdentity::of::<Uuid>()),
        "timestamp" => Some(TypeIdentity::of::<Timestamp>()),
        _ => None,
    }
}

/// Parses shape member names in order.
pub fn parse_shape(names: &[String]) -> Result<Vec<TypeIdentity>, String> {
    if names.is_empty() {
        return Err("shape must name at least one member".to_string());
    }

    names
        .iter()
        .map(|name| {
            let name = name.trim().to_ascii_lowercase();
            identity_for(&name).ok_or_else(|| {
                format!(
                    "unknown member type '{}' (expected a primitive such as i32 or one of: {})",
                    name,
                    NAMED_TYPES.join(", ")
                )
            })
        })
        .collect()
}

fn primitive_json(value: PrimitiveValue) -> Value {
    match value {
        PrimitiveValue::Bool(v) => json!(v),
        PrimitiveValue::Int8(v) => json!(v),
        PrimitiveValue::UInt8(v) => json!(v),
        PrimitiveValue::Char16(v) => json!(v.to_string()),
        PrimitiveValue::Int16(v) => json!(v),
        PrimitiveValue::UInt16(v) => json!(v),
        PrimitiveValue::Int32(v) => json!(v),
        PrimitiveValue::UInt32(v) => json!(v),
        PrimitiveValue::Int64(v) => json!(v),
        PrimitiveValue::UInt64(v) => json!(v),
        PrimitiveValue::Float32(v) => json!(v),
        PrimitiveValue::Float64(v) => json!(v),
    }
}

/// Renders a decoded member as display text and JSON.
pub fn render(identity: TypeIdentity, value: &dyn Any) -> (String, Value) {
    if let Ok(Some(kind)) = PrimitiveKind::classify(identity) {
        if let Some(v) = PrimitiveValue::from_any(kind, value) {
            return (v.to_string(), primitive_json(v));
        }
    }
    if let Some(text) = value.downcast_ref::<String>() {
        return (format!("{:?}", text), json!(text));
    }
    if let Some(id) = value.downcast_ref::<Uuid>() {
        return (id.to_string(), json!(id));
    }
    if let Some(ts) = value.downcast_ref::<Timestamp>() {
        return (ts.to_string(), json!(ts));
    }
    (format!("<{}>", identity.short_name()), Value::Null)
}
