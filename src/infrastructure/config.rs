use serde::{Deserialize, Serialize};

const DEFAULT_MODEL: &str = "gpt-4o";
const DEFAULT_API_BASE: &str = "https://api.openai.com/v1/";

/// Settings for the external generation and transcription services. A
/// missing API key is not an error: AI-backed features degrade to their
/// deterministic fallbacks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AiConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub api_base: String,
}

impl AiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = optional_lookup_value(&lookup, &["FOCUSUP_OPENAI_API_KEY", "OPENAI_API_KEY"]);
        let model = optional_lookup_value(&lookup, &["FOCUSUP_OPENAI_MODEL", "OPENAI_MODEL"])
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let api_base = optional_lookup_value(&lookup, &["FOCUSUP_OPENAI_BASE_URL"])
            .unwrap_or_else(|| DEFAULT_API_BASE.to_string());

        Self {
            api_key,
            model,
            api_base,
        }
    }

    pub fn is_ai_available(&self) -> bool {
        self.api_key.is_some()
    }
}

fn optional_lookup_value<F>(lookup: &F, keys: &[&str]) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    keys.iter()
        .filter_map(|key| lookup(key))
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_api_key_disables_ai_but_keeps_defaults() {
        let config = AiConfig::from_lookup(|_| None);
        assert!(!config.is_ai_available());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
    }

    #[test]
    fn prefixed_keys_take_precedence() {
        let config = AiConfig::from_lookup(|key| match key {
            "FOCUSUP_OPENAI_API_KEY" => Some("sk-prefixed".to_string()),
            "OPENAI_API_KEY" => Some("sk-plain".to_string()),
            "OPENAI_MODEL" => Some("gpt-4o-mini".to_string()),
            _ => None,
        });
        assert_eq!(config.api_key.as_deref(), Some("sk-prefixed"));
        assert_eq!(config.model, "gpt-4o-mini");
    }

    #[test]
    fn blank_values_are_treated_as_missing() {
        let config = AiConfig::from_lookup(|key| match key {
            "OPENAI_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert!(!config.is_ai_available());
    }
}
