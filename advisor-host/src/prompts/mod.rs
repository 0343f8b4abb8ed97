// System prompt assembly - tells the model the tag protocol and which tools
// the registry can serve.

use crate::dispatcher::ProviderRegistry;

const TAG_INSTRUCTIONS: &str = "\
Structure every reply with these tags and nothing outside them:

<thinking>your private reasoning</thinking>
<tool><name>tool_name</name><parameters>{\"param\": \"value\"}</parameters></tool>
<answer>the reply shown to the user</answer>

Rules:
- Use one <tool> block per call. Parameters must be a JSON object.
- You may request several tools in one reply; their results arrive as
  tool-result messages before your next reply.
- Never write <answer> in a reply that requests tools.
- Do not nest tags.";

#[derive(Debug, Clone, Default)]
pub struct PromptTemplate {
    preamble: String,
}

impl PromptTemplate {
    pub fn new(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
        }
    }

    /// Preamble, tag protocol, then one line per registered tool.
    pub fn render(&self, registry: &ProviderRegistry) -> String {
        let mut prompt = String::new();
        if !self.preamble.trim().is_empty() {
            prompt.push_str(self.preamble.trim_end());
            prompt.push_str("\n\n");
        }
        prompt.push_str(TAG_INSTRUCTIONS);

        if registry.is_empty() {
            prompt.push_str("\n\nNo tools are available; always reply with <answer>.");
            return prompt;
        }

        prompt.push_str("\n\nAvailable tools:\n");
        for name in registry.names() {
            let description = registry
                .get(name)
                .map(|p| p.description().to_string())
                .unwrap_or_default();
            if description.is_empty() {
                prompt.push_str(&format!("- {}\n", name));
            } else {
                prompt.push_str(&format!("- {}: {}\n", name, description));
            }
        }
        prompt
    }
}
