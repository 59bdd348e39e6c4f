//! Configuration types for a PDF chat session.
//!
//! Everything that shapes the model call lives in [`ChatConfig`], built via
//! [`ChatConfigBuilder`]. The session itself has no knobs: its behaviour is
//! fixed by the state machine in [`crate::session`].

use crate::error::StartupError;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::sync::Arc;

/// Provider used when none is configured.
pub const DEFAULT_PROVIDER: &str = "gemini";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Configuration for the model query client.
///
/// # Example
/// ```rust
/// use edgequake_pdfchat::ChatConfig;
///
/// let config = ChatConfig::builder()
///     .model("gemini-2.5-flash")
///     .temperature(0.2)
///     .build()
///     .unwrap();
/// assert_eq!(config.provider_name, "gemini");
/// ```
#[derive(Clone)]
pub struct ChatConfig {
    /// LLM provider name (e.g. "gemini", "openai", "anthropic", "ollama").
    pub provider_name: String,

    /// Model identifier sent with every request. Default: `gemini-2.5-flash`.
    pub model: String,

    /// Pre-constructed provider. Takes precedence over `provider_name`, and
    /// skips the credential check (the caller already built a client).
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. `None` leaves the provider default.
    pub temperature: Option<f32>,

    /// Maximum tokens in the reply. `None` leaves the provider default.
    pub max_tokens: Option<usize>,

    /// Replaces the built-in grounding instruction.
    pub grounding_instruction: Option<String>,

    /// User password for encrypted PDFs.
    pub password: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            provider_name: DEFAULT_PROVIDER.to_string(),
            model: DEFAULT_MODEL.to_string(),
            provider: None,
            temperature: None,
            max_tokens: None,
            grounding_instruction: None,
            password: None,
        }
    }
}

impl fmt::Debug for ChatConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatConfig")
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("grounding_instruction", &self.grounding_instruction.is_some())
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl ChatConfig {
    /// Create a new builder for `ChatConfig`.
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ChatConfig`].
#[derive(Debug)]
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = name.into();
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = Some(t.clamp(0.0, 2.0));
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = Some(n);
        self
    }

    pub fn grounding_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.config.grounding_instruction = Some(instruction.into());
        self
    }

    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ChatConfig, StartupError> {
        let c = &self.config;
        if c.provider_name.trim().is_empty() {
            return Err(StartupError::InvalidConfig(
                "Provider name must not be empty".into(),
            ));
        }
        if c.model.trim().is_empty() {
            return Err(StartupError::InvalidConfig(
                "Model must not be empty".into(),
            ));
        }
        if c.max_tokens == Some(0) {
            return Err(StartupError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if let Some(ref instruction) = c.grounding_instruction {
            if instruction.trim().is_empty() {
                return Err(StartupError::InvalidConfig(
                    "Grounding instruction must not be blank".into(),
                ));
            }
        }
        Ok(self.config)
    }
}

/// Environment variables that can hold the API key for a provider; any one
/// of them being set is enough.
///
/// Names follow the aliases `edgequake_llm::ProviderType` accepts. Empty for
/// local and keyless providers, for providers that authenticate
/// through their cloud SDK or a multi-variable setup (Bedrock, Vertex AI,
/// Azure), and for names not listed here; `ProviderFactory` reports those
/// itself.
pub fn credential_vars(provider_name: &str) -> &'static [&'static str] {
    match provider_name.to_ascii_lowercase().as_str() {
        "gemini" | "google" => &["GEMINI_API_KEY"],
        "openai" => &["OPENAI_API_KEY"],
        "anthropic" | "claude" => &["ANTHROPIC_API_KEY"],
        "openrouter" | "open-router" => &["OPENROUTER_API_KEY"],
        "xai" | "grok" => &["XAI_API_KEY"],
        "huggingface" | "hf" | "hugging-face" | "hugging_face" => {
            &["HF_TOKEN", "HUGGINGFACE_TOKEN"]
        }
        "mistral" | "mistral-ai" | "mistralai" => &["MISTRAL_API_KEY"],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_target_gemini_flash() {
        let c = ChatConfig::default();
        assert_eq!(c.provider_name, "gemini");
        assert_eq!(c.model, "gemini-2.5-flash");
        assert!(c.temperature.is_none());
        assert!(c.max_tokens.is_none());
    }

    #[test]
    fn temperature_is_clamped() {
        let c = ChatConfig::builder().temperature(5.0).build().unwrap();
        assert_eq!(c.temperature, Some(2.0));
    }

    #[test]
    fn zero_max_tokens_rejected() {
        let err = ChatConfig::builder().max_tokens(0).build().unwrap_err();
        assert!(matches!(err, StartupError::InvalidConfig(_)));
    }

    #[test]
    fn blank_instruction_rejected() {
        let err = ChatConfig::builder()
            .grounding_instruction("  ")
            .build()
            .unwrap_err();
        assert!(matches!(err, StartupError::InvalidConfig(_)));
    }

    #[test]
    fn debug_redacts_password() {
        let c = ChatConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{c:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }

    #[test]
    fn credential_vars_for_common_providers() {
        assert_eq!(credential_vars("gemini"), ["GEMINI_API_KEY"]);
        assert_eq!(credential_vars("OpenAI"), ["OPENAI_API_KEY"]);
        assert!(credential_vars("ollama").is_empty());
    }

    #[test]
    fn provider_aliases_map_to_their_own_key() {
        assert_eq!(credential_vars("claude"), ["ANTHROPIC_API_KEY"]);
        assert_eq!(credential_vars("openrouter"), ["OPENROUTER_API_KEY"]);
        assert_eq!(credential_vars("grok"), ["XAI_API_KEY"]);
        assert_eq!(credential_vars("xai"), ["XAI_API_KEY"]);
        assert_eq!(credential_vars("hf"), ["HF_TOKEN", "HUGGINGFACE_TOKEN"]);
        assert_eq!(credential_vars("mistralai"), ["MISTRAL_API_KEY"]);
    }

    #[test]
    fn keyless_and_unknown_providers_need_no_key() {
        for name in [
            "mock", "lm_studio", "lmstudio", "vscode", "copilot", "bedrock", "vertexai", "azure",
            "no-such-provider",
        ] {
            assert!(credential_vars(name).is_empty(), "{name}");
        }
    }
}
