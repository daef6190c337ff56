use crate::error::CoreError;
use crate::hash::Fingerprint;
use serde::Serialize;

/// Produce a canonical byte representation: `type_tag\0sorted_json`.
///
/// Keys are sorted so the output does not depend on field order.
fn canonical_serialize(type_tag: &str, value: &impl Serialize) -> Result<Vec<u8>, CoreError> {
    let json_value = serde_json::to_value(value)?;
    let sorted_json = serde_json::to_string(&sort_value(json_value))?;
    let mut buf = Vec::with_capacity(type_tag.len() + 1 + sorted_json.len());
    buf.extend_from_slice(type_tag.as_bytes());
    buf.push(0);
    buf.extend_from_slice(sorted_json.as_bytes());
    Ok(buf)
}

/// Fingerprint of a typed, serializable value.
pub fn fingerprint(type_tag: &str, value: &impl Serialize) -> Result<Fingerprint, CoreError> {
    let bytes = canonical_serialize(type_tag, value)?;
    Ok(Fingerprint::hash(&bytes))
}

fn sort_value(v: serde_json::Value) -> serde_json::Value {
    match v {
        serde_json::Value::Object(map) => {
            let sorted: serde_json::Map<String, serde_json::Value> = map
                .into_iter()
                .map(|(k, v)| (k, sort_value(v)))
                .collect::<std::collections::BTreeMap<_, _>>()
                .into_iter()
                .collect();
            serde_json::Value::Object(sorted)
        }
        serde_json::Value::Array(arr) => {
            serde_json::Value::Array(arr.into_iter().map(sort_value).collect())
        }
        other => other,
    }
}
