// Tool call decoder - validates a tool region before anything is dispatched.
// A region that fails here never reaches a capability provider.

use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

use crate::message::{Region, RegionKind, ToolCall};
use crate::tags::contains_open_tag;

static NAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<name>(.*?)</name>").expect("name pattern compiles"));

static PARAMETERS_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<parameters>(.*)</parameters>").expect("parameters pattern compiles")
});

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("malformed tool call: {0}")]
    Malformed(String),
    #[error("invalid tool parameters: {0}")]
    InvalidParameters(String),
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

/// Decode a `tool` region into a [`ToolCall`].
///
/// Pure function of the region text, so decoding the same region twice
/// yields equal calls.
pub fn decode(region: &Region) -> Result<ToolCall, DecodeError> {
    if region.kind != RegionKind::Tool {
        return Err(DecodeError::Malformed(format!(
            "expected a tool region, got {:?}",
            region.kind
        )));
    }

    if contains_open_tag(&region.text) {
        return Err(DecodeError::ProtocolViolation(
            "tool region contains a nested tag".to_string(),
        ));
    }

    let name = NAME_PATTERN
        .captures(&region.text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| DecodeError::Malformed("missing <name> element".to_string()))?;
    if name.is_empty() {
        return Err(DecodeError::Malformed("empty <name> element".to_string()));
    }

    let raw_parameters = PARAMETERS_PATTERN
        .captures(&region.text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim())
        .ok_or_else(|| DecodeError::Malformed("missing <parameters> element".to_string()))?;

    let parameters = match serde_json::from_str::<Value>(raw_parameters) {
        Ok(Value::Object(map)) => map,
        Ok(other) => {
            return Err(DecodeError::InvalidParameters(format!(
                "expected a JSON object, got {}",
                json_type(&other)
            )))
        }
        Err(e) => return Err(DecodeError::InvalidParameters(e.to_string())),
    };

    Ok(ToolCall {
        name: name.to_string(),
        parameters,
    })
}

fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(text: &str) -> Region {
        Region::new(RegionKind::Tool, text)
    }

    #[test]
    fn test_decode_valid_call() {
        let region = tool("<name>geocode</name><parameters>{\"address\":\"X\"}</parameters>");
        let call = decode(&region).unwrap();
        assert_eq!(call.name, "geocode");
        assert_eq!(serde_json::Value::Object(call.parameters), json!({"address": "X"}));
    }

    #[test]
    fn test_decode_tolerates_whitespace() {
        let region = tool(
            "\n  <name> college_search </name>\n  <parameters>\n {\"state\": \"OH\", \"limit\": 5}\n</parameters>\n",
        );
        let call = decode(&region).unwrap();
        assert_eq!(call.name, "college_search");
        assert_eq!(call.parameters["limit"], json!(5));
    }

    #[test]
    fn test_decode_is_idempotent() {
        let region = tool("<name>search</name><parameters>{\"q\":[1,2,{\"a\":null}]}</parameters>");
        assert_eq!(decode(&region), decode(&region));
    }

    #[test]
    fn test_missing_elements_are_malformed() {
        assert!(matches!(
            decode(&tool("<parameters>{}</parameters>")),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode(&tool("<name>geocode</name>")),
            Err(DecodeError::Malformed(_))
        ));
        assert!(matches!(
            decode(&tool("<name>  </name><parameters>{}</parameters>")),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn test_bad_parameters_are_invalid() {
        assert!(matches!(
            decode(&tool("<name>geocode</name><parameters>{address: X}</parameters>")),
            Err(DecodeError::InvalidParameters(_))
        ));
        let err = decode(&tool("<name>geocode</name><parameters>[1, 2]</parameters>")).unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidParameters("expected a JSON object, got array".to_string())
        );
    }

    #[test]
    fn test_nested_tag_is_protocol_violation() {
        let region = tool("<name>a</name><parameters>{}</parameters><answer>hi");
        assert!(matches!(decode(&region), Err(DecodeError::ProtocolViolation(_))));
    }

    #[test]
    fn test_non_tool_region_rejected() {
        let region = Region::new(RegionKind::Answer, "<name>a</name><parameters>{}</parameters>");
        assert!(matches!(decode(&region), Err(DecodeError::Malformed(_))));
    }
}
