// Checks on model-provided tool parameters before they become process
// arguments. No shell is ever involved, so only NUL is fatal; the rest is
// logged for auditing.

use anyhow::{bail, Result};
use serde_json::Value;

pub fn validate_argument(arg: &str) -> Result<()> {
    // execve cannot carry NUL
    if arg.contains('\0') {
        bail!("Argument contains null byte");
    }

    const SUSPICIOUS_PATTERNS: &[&str] = &["$(", "`", "${", "&&", "||", ";", "|", ">", "\n"];

    if let Some(pattern) = SUSPICIOUS_PATTERNS.iter().find(|p| arg.contains(**p)) {
        tracing::warn!("Shell-like pattern '{}' in tool argument: {:?}", pattern, arg);
    }

    Ok(())
}

pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Check `value` against the declared parameter type.
pub fn validate_typed_value(value: &Value, expected_type: &str) -> Result<()> {
    match (expected_type, value) {
        ("string", Value::String(s)) => validate_argument(s)?,
        ("integer", Value::Number(n)) if n.is_i64() || n.is_u64() => {}
        ("number", Value::Number(_)) | ("boolean", Value::Bool(_)) => {}
        ("array", Value::Array(items)) => {
            for item in items {
                match item {
                    Value::String(s) => validate_argument(s)?,
                    Value::Number(_) | Value::Bool(_) => {}
                    other => bail!("Array elements must be scalars, got {}", value_kind(other)),
                }
            }
        }
        _ => bail!("Expected {}, got {}", expected_type, value_kind(value)),
    }
    Ok(())
}
