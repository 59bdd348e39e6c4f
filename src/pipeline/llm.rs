//! Model query client: one grounded request per user question.
//!
//! Every request is a single user turn made of one text part (instruction,
//! delimited document, question) and, when the user attached one, one image
//! part. No conversation history is replayed; all prompt wording lives in
//! [`crate::prompts`].
//!
//! Failures never escape as panics or untyped strings: they come back as a
//! [`QueryError`] and the session decides how to present them.

use crate::config::{credential_vars, ChatConfig};
use crate::error::{QueryError, StartupError};
use crate::prompts::{grounded_prompt, GROUNDING_INSTRUCTION};
use crate::types::ImageAttachment;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, LlmError, ProviderFactory};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Inputs of one model query.
#[derive(Debug, Clone, Copy)]
pub struct QueryRequest<'a> {
    /// Full extracted text, sent verbatim.
    pub document_text: &'a str,
    /// The user's question, as typed.
    pub prompt: &'a str,
    pub image: Option<&'a ImageAttachment>,
}

/// One discrete unit of a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentPart {
    Text(String),
    Image(ImageAttachment),
}

impl QueryRequest<'_> {
    /// Content parts in request order: the text first, then the optional image.
    pub fn parts(&self, instruction: &str) -> Vec<ContentPart> {
        let mut parts = vec![ContentPart::Text(grounded_prompt(
            instruction,
            self.document_text,
            self.prompt,
        ))];
        if let Some(image) = self.image {
            parts.push(ContentPart::Image(image.clone()));
        }
        parts
    }
}

/// Answers a question about a document.
///
/// The session is generic over this trait; [`LlmModelClient`] is the
/// production implementation.
pub trait ModelClient: Send + Sync {
    fn generate(
        &self,
        request: QueryRequest<'_>,
    ) -> impl Future<Output = Result<String, QueryError>> + Send;
}

/// [`ModelClient`] backed by an edgequake-llm provider.
#[derive(Clone)]
pub struct LlmModelClient {
    provider: Arc<dyn LLMProvider>,
    model: String,
    instruction: String,
    temperature: Option<f32>,
    max_tokens: Option<usize>,
}

impl fmt::Debug for LlmModelClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LlmModelClient")
            .field("provider", &"<dyn LLMProvider>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl LlmModelClient {
    /// Build the client, resolving the provider from the config.
    ///
    /// Call once at startup: a missing credential is fatal.
    pub fn from_config(config: &ChatConfig) -> Result<Self, StartupError> {
        let provider = resolve_provider(config)?;
        Ok(Self::with_provider(provider, config))
    }

    /// Build the client around an already constructed provider.
    pub fn with_provider(provider: Arc<dyn LLMProvider>, config: &ChatConfig) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            instruction: config
                .grounding_instruction
                .clone()
                .unwrap_or_else(|| GROUNDING_INSTRUCTION.to_string()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn instruction(&self) -> &str {
        &self.instruction
    }
}

impl ModelClient for LlmModelClient {
    async fn generate(&self, request: QueryRequest<'_>) -> Result<String, QueryError> {
        let start = Instant::now();
        let messages = vec![to_chat_message(request.parts(&self.instruction))];
        let options = build_options(self.temperature, self.max_tokens);

        debug!(
            "Querying {}: {} document chars, image={}",
            self.model,
            request.document_text.len(),
            request.image.is_some()
        );

        match self.provider.chat(&messages, Some(&options)).await {
            Ok(response) => {
                debug!(
                    "{} input tokens, {} output tokens, {:?}",
                    response.prompt_tokens,
                    response.completion_tokens,
                    start.elapsed()
                );
                Ok(response.content)
            }
            Err(e) => {
                let err = query_error(e);
                warn!("Model query failed after {:?}: {}", start.elapsed(), err);
                Err(err)
            }
        }
    }
}

/// Provider failure → [`QueryError`]. Errors that wrap a provider message
/// carry that message alone; a blank one becomes `Unknown`.
fn query_error(err: LlmError) -> QueryError {
    match err {
        LlmError::ApiError(message)
        | LlmError::ProviderError(message)
        | LlmError::Unknown(message) => QueryError::api(message),
        other => QueryError::api(other.to_string()),
    }
}

/// Fold content parts into a single user message.
fn to_chat_message(parts: Vec<ContentPart>) -> ChatMessage {
    let mut text = String::new();
    let mut images = Vec::new();
    for part in parts {
        match part {
            ContentPart::Text(t) => text.push_str(&t),
            ContentPart::Image(img) => images.push(img.to_image_data()),
        }
    }
    ChatMessage::user_with_images(text, images)
}

fn build_options(temperature: Option<f32>, max_tokens: Option<usize>) -> CompletionOptions {
    CompletionOptions {
        temperature,
        max_tokens,
        ..Default::default()
    }
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`) — used as-is, no credential
///    check.
/// 2. **Named provider + model** — the credential variable for the provider
///    must be set and non-empty, then [`ProviderFactory::create_llm_provider`]
///    builds the client.
pub fn resolve_provider(config: &ChatConfig) -> Result<Arc<dyn LLMProvider>, StartupError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    require_credential(&config.provider_name)?;

    let provider = ProviderFactory::create_llm_provider(&config.provider_name, &config.model)
        .map_err(|e| StartupError::ProviderNotConfigured {
            provider: config.provider_name.clone(),
            hint: format!("{e}"),
        })?;

    info!(
        "Using provider '{}' with model '{}'",
        config.provider_name, config.model
    );
    Ok(provider)
}

/// Check the provider's credential variable once, at startup.
pub fn require_credential(provider_name: &str) -> Result<(), StartupError> {
    let vars = credential_vars(provider_name);
    if vars.is_empty() {
        return Ok(());
    }
    let present = vars.iter().any(|var| {
        std::env::var(var)
            .map(|value| !value.trim().is_empty())
            .unwrap_or(false)
    });
    if present {
        return Ok(());
    }
    Err(StartupError::MissingCredential {
        provider: provider_name.to_string(),
        var: vars.join(" or "),
    })
}
