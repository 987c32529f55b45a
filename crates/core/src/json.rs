//! JSON parsing without a nesting limit.
//!
//! Values are opaque to the relay, so any depth a client sends must come back
//! out unchanged. serde_json stops at 128 levels by default; here the limit is
//! lifted and the stack grows on demand instead.

use serde::de::DeserializeOwned;

/// Parse `bytes` as a single JSON document of any nesting depth.
pub fn from_slice<T: DeserializeOwned>(bytes: &[u8]) -> serde_json::Result<T> {
    let mut deserializer = serde_json::Deserializer::from_slice(bytes);
    deserializer.disable_recursion_limit();
    let value = T::deserialize(serde_stacker::Deserializer::new(&mut deserializer))?;
    deserializer.end()?;
    Ok(value)
}

#[cfg(test)]
pub(crate) fn nested_document(depth: usize) -> String {
    format!("{{\"v\":{}1{}}}", "[".repeat(depth), "]".repeat(depth))
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    #[test]
    fn test_parses_past_default_depth() {
        let document = nested_document(1_000);
        assert!(serde_json::from_str::<Value>(&document).is_err());

        let value: Value = from_slice(document.as_bytes()).unwrap();
        let mut inner = &value["v"];
        for _ in 0..1_000 {
            inner = &inner[0];
        }
        assert_eq!(inner, &json!(1));
    }

    #[test]
    fn test_rejects_trailing_input() {
        assert!(from_slice::<Value>(br#"{"a": 1} {"b": 2}"#).is_err());
        assert!(from_slice::<Value>(br#"{"a": 1}   "#).is_ok());
    }

    #[test]
    fn test_rejects_malformed_input() {
        assert!(from_slice::<Value>(b"{\"open\": ").is_err());
        assert!(from_slice::<Value>(nested_document(300).trim_end_matches('}').as_bytes()).is_err());
    }
}
