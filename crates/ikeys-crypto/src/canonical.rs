//! Canonical JSON for signing payloads.
//!
//! Signer and verifier must hash byte-identical payloads, so objects are
//! written with keys sorted by code point and no whitespace, independently
//! of how `serde_json` happens to order its maps.

use serde_json::Value;

/// Serialize a JSON value canonically.
pub fn canonicalize(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

fn write_value(out: &mut String, value: &Value) {
    match value {
        Value::Null => out.push_str("null"),
        Value::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        Value::Number(n) => out.push_str(&n.to_string()),
        Value::String(s) => write_string(out, s),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            out.push('{');
            for (idx, (key, item)) in entries.into_iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                write_string(out, key);
                out.push(':');
                write_value(out, item);
            }
            out.push('}');
        }
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push_str(&Value::from(s).to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_keys_sorted_without_whitespace() {
        let v = json!({"t": 1000, "m": "hello", "i": "abc"});
        assert_eq!(canonicalize(&v), r#"{"i":"abc","m":"hello","t":1000}"#);
    }

    #[test]
    fn test_nested_objects_sorted() {
        let v = json!({"b": {"z": true, "a": null}, "a": [3, "x"]});
        assert_eq!(canonicalize(&v), r#"{"a":[3,"x"],"b":{"a":null,"z":true}}"#);
    }

    #[test]
    fn test_strings_escaped() {
        let v = json!({"m": "line\n\"quoted\""});
        assert_eq!(canonicalize(&v), r#"{"m":"line\n\"quoted\""}"#);
    }

    #[test]
    fn test_negative_timestamp() {
        let v = json!({"timestamp": -5});
        assert_eq!(canonicalize(&v), r#"{"timestamp":-5}"#);
    }
}
