use serde_json::{Map, Value};

use crate::error::EnvelopeError;

/// The JSON object carried by one RPC datagram.
///
/// Keys keep their insertion order, so a reply lists `method`, `params`,
/// `note` and `result` in the order the dispatcher filled them in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Envelope {
    fields: Map<String, Value>,
}

impl Envelope {
    /// Outgoing request envelope, as produced by the client.
    pub fn request(method: &str, params: Vec<Value>) -> Self {
        let mut fields = Map::new();
        fields.insert("method".into(), Value::String(method.to_string()));
        fields.insert("params".into(), Value::Array(params));
        Self { fields }
    }

    /// Reply used when the payload could not be decoded at all.
    pub fn diagnostic(note: &str) -> Self {
        let mut fields = Map::new();
        fields.insert("note".into(), Value::String(note.to_string()));
        Self { fields }
    }

    pub fn method(&self) -> Option<&Value> {
        self.fields.get("method")
    }

    pub fn params(&self) -> Option<&Value> {
        self.fields.get("params")
    }

    pub fn note(&self) -> &str {
        self.fields.get("note").and_then(Value::as_str).unwrap_or_default()
    }

    pub fn append_note(&mut self, text: &str) {
        let note = format!("{}{}", self.note(), text);
        self.fields.insert("note".into(), Value::String(note));
    }

    pub fn set_result(&mut self, result: Value) {
        self.fields.insert("result".into(), result);
    }

    pub fn set_fndoc(&mut self, doc: &str) {
        self.fields.insert("fndoc".into(), Value::String(doc.to_string()));
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }
}

/// Decode a datagram payload. The `note` key is reset to `""` straight away
/// so every reply carries one.
pub fn decode_envelope(payload: &[u8]) -> Result<Envelope, EnvelopeError> {
    let value: Value =
        serde_json::from_slice(payload).map_err(|e| EnvelopeError::InvalidJson(e.to_string()))?;
    match value {
        Value::Object(mut fields) => {
            fields.insert("note".into(), Value::String(String::new()));
            Ok(Envelope { fields })
        }
        _ => Err(EnvelopeError::NotAnObject),
    }
}

pub fn encode_envelope(envelope: &Envelope) -> Vec<u8> {
    serde_json::to_vec(&envelope.fields).unwrap_or_else(|_| b"{}".to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_resets_note_and_keeps_order() {
        let env = decode_envelope(br#"{"method":"ping","params":[],"note":"old"}"#).unwrap();
        assert_eq!(env.note(), "");
        let keys: Vec<_> = env.clone().into_value().as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, ["method", "params", "note"]);
    }

    #[test]
    fn test_decode_rejects_non_objects() {
        assert_eq!(decode_envelope(b"[1,2]"), Err(EnvelopeError::NotAnObject));
        assert!(matches!(decode_envelope(b"{oops"), Err(EnvelopeError::InvalidJson(_))));
        assert!(matches!(decode_envelope(&[0xff, 0xfe]), Err(EnvelopeError::InvalidJson(_))));
    }

    #[test]
    fn test_append_note_and_result() {
        let mut env = Envelope::request("m", vec![json!(1)]);
        env.append_note("| a |");
        env.append_note("| b |");
        env.set_result(json!("r"));
        assert_eq!(
            env.into_value(),
            json!({"method": "m", "params": [1], "note": "| a || b |", "result": "r"})
        );
    }

    #[test]
    fn test_encode_is_compact_json() {
        let env = Envelope::diagnostic("| invalid JSON format |");
        assert_eq!(encode_envelope(&env), br#"{"note":"| invalid JSON format |"}"#.to_vec());
    }
}
