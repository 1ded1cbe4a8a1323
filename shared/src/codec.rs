//! Conversion between live values and their transport form.
//!
//! In property position a reference travels as its bare id string, since the
//! property's descriptor says how to read it back. Call arguments and return
//! values carry no descriptor, so references there travel as
//! `{"type": "id", "id": "<object id>"}`.

use indexmap::IndexMap;
use serde_json::{Map, Value as JsonValue};

use crate::{
    ledger::ChangeGroup,
    protocol::{rules, template::PropertyKind},
    ObjectId, Protocol, ReplicaError, Role, TrackedObject, Value,
};

/// Resolves object ids met while decoding, creating stub objects for ids
/// the local session has never seen
pub trait ObjectResolver {
    fn resolve(&mut self, object_id: &ObjectId) -> Result<(), ReplicaError>;
}

pub fn to_transport(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(value) => JsonValue::Bool(*value),
        Value::Number(number) => JsonValue::Number(number.clone()),
        Value::String(value) => JsonValue::String(value.clone()),
        Value::Ref(id) => JsonValue::String(id.to_string()),
        Value::Array(values) => JsonValue::Array(values.iter().map(to_transport).collect()),
    }
}

pub fn from_transport(
    json: &JsonValue,
    kind: &PropertyKind,
    resolver: &mut dyn ObjectResolver,
) -> Result<Value, ReplicaError> {
    match kind {
        PropertyKind::Scalar => decode_primitive(json),
        PropertyKind::Reference(_) => decode_reference(json, resolver),
        PropertyKind::ScalarArray => match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Array(values) => values
                .iter()
                .map(decode_primitive)
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(unexpected("an array", other)),
        },
        PropertyKind::ReferenceArray(_) => match json {
            JsonValue::Null => Ok(Value::Null),
            JsonValue::Array(values) => values
                .iter()
                .map(|value| decode_reference(value, resolver))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            other => Err(unexpected("an array", other)),
        },
    }
}

fn decode_primitive(json: &JsonValue) -> Result<Value, ReplicaError> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::Bool(value) => Ok(Value::Bool(*value)),
        JsonValue::Number(number) => Ok(Value::Number(number.clone())),
        JsonValue::String(value) => Ok(Value::String(value.clone())),
        other => Err(unexpected("a primitive", other)),
    }
}

fn decode_reference(
    json: &JsonValue,
    resolver: &mut dyn ObjectResolver,
) -> Result<Value, ReplicaError> {
    match json {
        JsonValue::Null => Ok(Value::Null),
        JsonValue::String(id) => {
            let object_id = ObjectId::parse(id)?;
            resolver.resolve(&object_id)?;
            Ok(Value::Ref(object_id))
        }
        other => Err(unexpected("an object id", other)),
    }
}

fn unexpected(expected: &str, found: &JsonValue) -> ReplicaError {
    ReplicaError::Serialization {
        reason: format!("expected {}, found {}", expected, found),
    }
}

/// Transport form of an untyped value (call argument or return value)
pub fn to_transport_argument(value: &Value) -> JsonValue {
    match value {
        Value::Ref(id) => {
            let mut reference = Map::new();
            reference.insert("type".to_string(), JsonValue::from("id"));
            reference.insert("id".to_string(), JsonValue::from(id.to_string()));
            JsonValue::Object(reference)
        }
        Value::Array(values) => {
            JsonValue::Array(values.iter().map(to_transport_argument).collect())
        }
        other => to_transport(other),
    }
}

pub fn from_transport_argument(
    json: &JsonValue,
    resolver: &mut dyn ObjectResolver,
) -> Result<Value, ReplicaError> {
    match json {
        JsonValue::Array(values) => values
            .iter()
            .map(|value| from_transport_argument(value, resolver))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        JsonValue::Object(map) => match (map.get("type"), map.get("id")) {
            (Some(JsonValue::String(kind)), Some(JsonValue::String(id))) if kind == "id" => {
                let object_id = ObjectId::parse(id)?;
                resolver.resolve(&object_id)?;
                Ok(Value::Ref(object_id))
            }
            _ => Err(unexpected("a primitive or an object reference", json)),
        },
        other => decode_primitive(other),
    }
}

pub fn encode_arguments(args: &[Value]) -> Result<String, ReplicaError> {
    let transport: Vec<JsonValue> = args.iter().map(to_transport_argument).collect();
    serde_json::to_string(&transport).map_err(ReplicaError::serialization)
}

/// Decodes a serialized argument list; an empty string is no arguments
pub fn extract_arguments(
    args: &str,
    resolver: &mut dyn ObjectResolver,
) -> Result<Vec<Value>, ReplicaError> {
    if args.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str(args).map_err(ReplicaError::serialization)? {
        JsonValue::Array(values) => values
            .iter()
            .map(|value| from_transport_argument(value, resolver))
            .collect(),
        other => Err(unexpected("an argument list", &other)),
    }
}

pub fn encode_value(value: &Value) -> Result<String, ReplicaError> {
    serde_json::to_string(&to_transport_argument(value)).map_err(ReplicaError::serialization)
}

pub fn decode_value(value: &str, resolver: &mut dyn ObjectResolver) -> Result<Value, ReplicaError> {
    if value.trim().is_empty() {
        return Ok(Value::Null);
    }
    let json: JsonValue = serde_json::from_str(value).map_err(ReplicaError::serialization)?;
    from_transport_argument(&json, resolver)
}

/// Object ids referenced by a serialized argument list, without resolving them
pub fn argument_references(args: &str) -> Vec<ObjectId> {
    fn collect(json: &JsonValue, out: &mut Vec<ObjectId>) {
        match json {
            JsonValue::Array(values) => values.iter().for_each(|value| collect(value, out)),
            JsonValue::Object(map) => {
                if let (Some("id"), Some(JsonValue::String(id))) =
                    (map.get("type").and_then(JsonValue::as_str), map.get("id"))
                {
                    if let Ok(object_id) = ObjectId::parse(id) {
                        out.push(object_id);
                    }
                }
            }
            _ => {}
        }
    }

    let mut ids = Vec::new();
    if let Ok(json) = serde_json::from_str::<JsonValue>(args) {
        collect(&json, &mut ids);
    }
    ids
}

/// Transport values are equal, with numbers compared numerically
pub fn values_match(a: &JsonValue, b: &JsonValue) -> bool {
    match (a, b) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64() == b.as_f64(),
        (JsonValue::Array(a), JsonValue::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(a, b)| values_match(a, b))
        }
        _ => a == b,
    }
}

/// Builds the ChangeGroup that takes `before` to `after`, limited to the
/// properties a process of `role` creates changes for. Objects missing from
/// `before` are compared against their template defaults.
pub fn diff_graphs(
    protocol: &Protocol,
    role: Role,
    before: &IndexMap<ObjectId, TrackedObject>,
    after: &IndexMap<ObjectId, TrackedObject>,
) -> ChangeGroup {
    let mut changes = ChangeGroup::new();
    for (object_id, object) in after {
        let Some(template) = protocol.template(object.template_name()) else {
            continue;
        };
        let previous = before.get(object_id);
        for (property, descriptor) in template.properties() {
            if !rules::tracked(descriptor, template, role, &protocol.rule_sets) {
                continue;
            }
            let old = previous
                .and_then(|previous| previous.get(property))
                .unwrap_or(&descriptor.default);
            let new = object.get(property).unwrap_or(&descriptor.default);
            let (old, new) = (to_transport(old), to_transport(new));
            if !values_match(&old, &new) {
                changes.insert(object_id, property, old, new);
            }
        }
    }
    changes
}
