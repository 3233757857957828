use serde::{Deserialize, Serialize};

/// Settings for the chat-completions generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Provider name reported in errors and logs.
    pub provider: String,
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
    /// Total attempts per call, including the first.
    pub max_attempts: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4.1-nano".to_string(),
            temperature: 0.1,
            max_tokens: 2000,
            timeout_secs: 30,
            max_attempts: 3,
        }
    }
}

impl GenerationConfig {
    /// Apply `DOCSIGHT_BASE_URL` and `DOCSIGHT_MODEL` when set.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("DOCSIGHT_BASE_URL") {
            if !url.trim().is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(model) = std::env::var("DOCSIGHT_MODEL") {
            if !model.trim().is_empty() {
                self.model = model;
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_conservative() {
        let cfg = GenerationConfig::default();
        assert_eq!(cfg.max_attempts, 3);
        assert_eq!(cfg.timeout_secs, 30);
        assert!((cfg.temperature - 0.1).abs() < f32::EPSILON);
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: GenerationConfig =
            serde_json::from_str(r#"{"model": "local-llama", "max_attempts": 1}"#).unwrap();
        assert_eq!(cfg.model, "local-llama");
        assert_eq!(cfg.max_attempts, 1);
        assert_eq!(cfg.base_url, "https://api.openai.com");
    }
}
