use std::{fs, path::Path};

use serde::Deserialize;

use crate::{NodeflowError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// LLM defaults for process nodes
    #[serde(default)]
    pub llm: LlmConfig,
    /// engine execution limits
    #[serde(default)]
    pub engine: EngineSettings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// api key; falls back to the OPENAI_API_KEY environment variable
    pub api_key: Option<String>,
    /// OpenAI-compatible endpoint base url
    pub base_url: String,
    /// default model for process nodes
    pub model: String,
    /// default sampling temperature
    pub temperature: f32,
    /// default system prompt
    pub system_prompt: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4-turbo-preview".to_string(),
            temperature: 0.7,
            system_prompt: "You are a helpful assistant.".to_string(),
        }
    }
}

impl LlmConfig {
    /// Configured api key, falling back to the environment.
    pub fn api_key(&self) -> Option<String> {
        self.api_key.clone().or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// loop node iteration cap
    pub max_loop_iterations: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_loop_iterations: 1000,
        }
    }
}

impl Config {
    pub fn create<T: AsRef<Path>>(path: T) -> Result<Self> {
        let data = fs::read_to_string(path.as_ref())?;
        Self::load_from_str(data.as_str())
    }

    pub fn load_from_str(toml_str: &str) -> Result<Self> {
        toml::from_str::<Config>(toml_str).map_err(|e| NodeflowError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use crate::Config;

    #[test]
    fn test_config_deserialize() {
        let toml_str = r#"
        [llm]
        base_url = "http://localhost:11434/v1"
        model = "llama3"
        temperature = 0.2
        system_prompt = "Be terse."

        [engine]
        max_loop_iterations = 50
        "#;
        let config = Config::load_from_str(toml_str).unwrap();
        assert_eq!(config.llm.base_url, "http://localhost:11434/v1");
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.engine.max_loop_iterations, 50);
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::load_from_str("").unwrap();
        assert_eq!(config.llm.model, "gpt-4-turbo-preview");
        assert_eq!(config.llm.temperature, 0.7);
        assert_eq!(config.engine.max_loop_iterations, 1000);
    }
}
