use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::error::ProtocolError;
use crate::objects::{ObjectKind, SubjectId};

#[derive(Debug, Clone, PartialEq, Deserialize)]
/// One object echoed back by the endpoint.
pub struct PollResponseObject {
    #[serde(rename = "type")]
    pub kind: ObjectKind,
    #[serde(rename = "id")]
    pub subject_id: SubjectId,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default, deserialize_with = "deserialize_object_data")]
    pub data: Option<Value>,
}

fn deserialize_object_data<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.filter(|value| !matches!(value, Value::Null | Value::Bool(false))))
}

#[derive(Debug, Clone, PartialEq, Default)]
/// Decoded poll envelope.
pub struct PollResponse {
    pub objects: Vec<PollResponseObject>,
    /// Result of the request's action, when one was sent.
    pub response: Option<Value>,
    /// Entries of `objects` that could not be read, with the reason.
    pub malformed: Vec<String>,
}

impl PollResponse {
    pub fn objects_of<'a>(
        &'a self,
        kind: &'a ObjectKind,
    ) -> impl Iterator<Item = &'a PollResponseObject> + 'a {
        self.objects.iter().filter(move |object| &object.kind == kind)
    }
}

/// Reads a poll envelope; a missing `objects` list is a protocol failure.
pub fn decode(raw: &Value) -> Result<PollResponse, ProtocolError> {
    let entries = raw
        .get("objects")
        .and_then(Value::as_array)
        .ok_or(ProtocolError::MissingObjects)?;

    let mut objects = Vec::with_capacity(entries.len());
    let mut malformed = Vec::new();
    for (index, entry) in entries.iter().enumerate() {
        match PollResponseObject::deserialize(entry) {
            Ok(object) => objects.push(object),
            Err(error) => malformed.push(format!("objects[{index}]: {error}")),
        }
    }

    let response = raw
        .get("response")
        .cloned()
        .filter(|value| !matches!(value, Value::Null | Value::Bool(false)));

    Ok(PollResponse {
        objects,
        response,
        malformed,
    })
}

pub fn decode_str(raw: &str) -> Result<PollResponse, ProtocolError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|error| ProtocolError::InvalidJson(error.to_string()))?;
    decode(&value)
}
