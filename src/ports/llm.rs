use async_trait::async_trait;
use serde_json::Value;

use crate::error::OrchestratorError;

/// `Generate`/`GenerateJSON`/`CheckHealth` per §6. Implementations must
/// strip markdown code fences from JSON responses before parsing.
#[async_trait]
pub trait LLM: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, OrchestratorError>;

    async fn generate_json(&self, prompt: &str) -> Result<Value, OrchestratorError>;

    async fn check_health(&self) -> bool;
}

/// Strips leading/trailing ``` fences (with an optional language tag) from a
/// JSON-ish LLM response, a pure helper every `LLM` implementation can
/// reuse before calling `serde_json::from_str`.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest
        .strip_prefix("json")
        .or_else(|| rest.strip_prefix("JSON"))
        .unwrap_or(rest);
    let rest = rest.trim_start_matches(['\n', '\r']);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_json_fence_with_language_tag() {
        let input = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn strips_plain_fence() {
        let input = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }

    #[test]
    fn leaves_unfenced_text_alone() {
        let input = "{\"a\": 1}";
        assert_eq!(strip_code_fences(input), "{\"a\": 1}");
    }
}
