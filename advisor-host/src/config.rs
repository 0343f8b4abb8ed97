use serde::{Deserialize, Serialize};

/// How tool calls decoded from a single turn are executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchMode {
    /// Every call runs as its own task; results are reassembled in call order.
    Parallel,
    /// One call at a time, in call order.
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Maximum model invocations for one client request.
    pub max_turns: usize,
    /// Consecutive turns without a tool region or usable answer that are
    /// retried. One more in a row fails the conversation.
    pub max_malformed_turns: usize,
    pub dispatch: DispatchMode,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_turns: 8,
            max_malformed_turns: 2,
            dispatch: DispatchMode::Parallel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ControllerConfig =
            serde_json::from_str(r#"{"max_turns": 3, "dispatch": "sequential"}"#).unwrap();
        assert_eq!(config.max_turns, 3);
        assert_eq!(config.max_malformed_turns, 2);
        assert_eq!(config.dispatch, DispatchMode::Sequential);
    }
}
