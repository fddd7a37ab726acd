//! Model interaction: the generation client seam and its LLM-backed impl.
//!
//! The rest of the crate only sees [`GenerationClient`]. The production
//! implementation, [`LlmGenerationClient`], is intentionally thin: prompt
//! text lives in [`crate::prompts`], response clean-up in
//! [`super::postprocess`]. What is left here is one round trip per call,
//! the per-call timeout and the mapping of every failure onto a single
//! descriptive [`GenerationError`].
//!
//! ## Why no retry?
//!
//! Each action is started by a person who sees the error and can simply run
//! it again. Retrying a multi-thousand-token design request behind their
//! back doubles cost and latency for the rare transient failure.

use crate::config::GenerationConfig;
use crate::document::{DesignDocument, ImplementationPlan};
use crate::error::GenerationError;
use crate::pipeline::postprocess::{clean_markdown, extract_json};
use crate::prompts::{
    analysis_request, design_request, plan_request, ANALYSIS_SYSTEM_PROMPT, DESIGN_SYSTEM_PROMPT,
    PLAN_SYSTEM_PROMPT,
};
use async_trait::async_trait;
use edgequake_llm::{ChatMessage, CompletionOptions, LLMProvider, ProviderFactory};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// What each call produces, used in error messages.
pub const ANALYSIS: &str = "analysis";
pub const DESIGN: &str = "TDD";
pub const PLAN: &str = "implementation plan";

/// Model used when a provider is named without a model.
const DEFAULT_MODEL: &str = "gpt-4.1-mini";

/// The external document generation service.
///
/// One request, one response; implementations must not retry or stream.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Structured Markdown analysis of a raw requirement.
    async fn analyze_requirement(&self, requirement: &str) -> Result<String, GenerationError>;

    /// Technical Design Document for a requirement.
    async fn generate_design_document(
        &self,
        requirement: &str,
    ) -> Result<DesignDocument, GenerationError>;

    /// Implementation plans, one per core feature of a formatted design document.
    async fn generate_plan(
        &self,
        design_markdown: &str,
    ) -> Result<Vec<ImplementationPlan>, GenerationError>;
}

/// [`GenerationClient`] over any `edgequake_llm` provider.
pub struct LlmGenerationClient {
    provider: Arc<dyn LLMProvider>,
    config: GenerationConfig,
}

impl LlmGenerationClient {
    pub fn new(provider: Arc<dyn LLMProvider>, config: GenerationConfig) -> Self {
        Self { provider, config }
    }

    /// Resolve a provider from `config` (see [`resolve_provider`]) and wrap it.
    pub fn from_config(config: GenerationConfig) -> Result<Self, GenerationError> {
        let provider = resolve_provider(&config)?;
        Ok(Self::new(provider, config))
    }

    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    /// One chat round trip; returns the raw answer text.
    async fn ask(
        &self,
        what: &'static str,
        system: &str,
        user: String,
    ) -> Result<String, GenerationError> {
        let messages = vec![ChatMessage::system(system), ChatMessage::user(user.as_str())];
        let options = build_options(&self.config);
        let start = Instant::now();

        let response = tokio::time::timeout(
            self.config.api_timeout(),
            self.provider.chat(&messages, Some(&options)),
        )
        .await
        .map_err(|_| GenerationError::Timeout {
            what,
            secs: self.config.api_timeout_secs,
        })?
        .map_err(|e| GenerationError::Request {
            what,
            message: e.to_string(),
        })?;

        debug!(
            "{what}: {} input tokens, {} output tokens, {:?}",
            response.prompt_tokens,
            response.completion_tokens,
            start.elapsed()
        );

        if response.content.trim().is_empty() {
            return Err(GenerationError::EmptyResponse { what });
        }
        Ok(response.content)
    }
}

#[async_trait]
impl GenerationClient for LlmGenerationClient {
    async fn analyze_requirement(&self, requirement: &str) -> Result<String, GenerationError> {
        info!("Requesting {ANALYSIS} ({} chars)", requirement.len());
        let raw = self
            .ask(ANALYSIS, ANALYSIS_SYSTEM_PROMPT, analysis_request(requirement))
            .await?;
        parse_analysis(&raw)
    }

    async fn generate_design_document(
        &self,
        requirement: &str,
    ) -> Result<DesignDocument, GenerationError> {
        info!("Requesting {DESIGN} ({} chars)", requirement.len());
        let raw = self
            .ask(DESIGN, DESIGN_SYSTEM_PROMPT, design_request(requirement))
            .await?;
        parse_json(DESIGN, &raw)
    }

    async fn generate_plan(
        &self,
        design_markdown: &str,
    ) -> Result<Vec<ImplementationPlan>, GenerationError> {
        info!("Requesting {PLAN} ({} chars)", design_markdown.len());
        let raw = self
            .ask(PLAN, PLAN_SYSTEM_PROMPT, plan_request(design_markdown))
            .await?;
        parse_json(PLAN, &raw)
    }
}

// ── Response parsing ─────────────────────────────────────────────────────

/// Clean a Markdown answer; an answer that cleans down to nothing is empty.
pub fn parse_analysis(raw: &str) -> Result<String, GenerationError> {
    let markdown = clean_markdown(raw);
    if markdown.is_empty() {
        return Err(GenerationError::EmptyResponse { what: ANALYSIS });
    }
    Ok(markdown)
}

/// Parse a JSON answer after stripping fences and surrounding prose.
pub fn parse_json<T: DeserializeOwned>(
    what: &'static str,
    raw: &str,
) -> Result<T, GenerationError> {
    let payload = extract_json(raw);
    if payload.is_empty() {
        return Err(GenerationError::EmptyResponse { what });
    }
    serde_json::from_str(payload).map_err(|e| GenerationError::MalformedResponse {
        what,
        detail: e.to_string(),
    })
}

/// Build `CompletionOptions` from the generation config.
fn build_options(config: &GenerationConfig) -> CompletionOptions {
    CompletionOptions {
        temperature: Some(config.temperature),
        max_tokens: Some(config.max_tokens),
        ..Default::default()
    }
}

// ── Provider resolution ──────────────────────────────────────────────────

fn create_provider(name: &str, model: &str) -> Result<Arc<dyn LLMProvider>, GenerationError> {
    ProviderFactory::create_llm_provider(name, model).map_err(|e| {
        GenerationError::ProviderNotConfigured {
            provider: name.to_string(),
            hint: e.to_string(),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific:
///
/// 1. **Pre-built provider** (`config.provider`), used as-is.
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key (`OPENAI_API_KEY`, ...) from the environment.
/// 3. **Environment pair** `EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`,
///    both set and non-empty.
/// 4. **Auto-detection** via [`ProviderFactory::from_env`].
pub fn resolve_provider(config: &GenerationConfig) -> Result<Arc<dyn LLMProvider>, GenerationError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        let model = config.model.as_deref().unwrap_or(DEFAULT_MODEL);
        return create_provider(name, model);
    }

    if let (Ok(name), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !name.is_empty() && !model.is_empty() {
            return create_provider(&name, &model);
        }
    }

    let (provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| GenerationError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or pass --provider.\n\
                Error: {e}"
            ),
        })?;

    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_options_defaults() {
        let opts = build_options(&GenerationConfig::default());
        assert_eq!(opts.temperature, Some(0.2));
        assert_eq!(opts.max_tokens, Some(8192));
    }

    #[test]
    fn analysis_is_cleaned() {
        let md = parse_analysis("```markdown\n# 📌 Feature: X\n```").unwrap();
        assert_eq!(md, "# 📌 Feature: X\n");
    }

    #[test]
    fn blank_analysis_is_empty_response() {
        let err = parse_analysis(" \n ").unwrap_err();
        assert!(matches!(err, GenerationError::EmptyResponse { what: ANALYSIS }));
    }

    #[test]
    fn plan_json_in_fence() {
        let raw = "```json\n[{\"featureName\": \"A\", \"featuresToImplement\": [\"x\"], \
\"frontendSteps\": [], \"backendSteps\": [], \"integrationSteps\": []}]\n```";
        let plans: Vec<ImplementationPlan> = parse_json(PLAN, raw).unwrap();
        assert_eq!(plans.len(), 1);
        assert_eq!(plans[0].feature_name, "A");
    }

    #[test]
    fn invalid_design_is_malformed() {
        let err = parse_json::<DesignDocument>(DESIGN, "{\"title\": 3}").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { what: DESIGN, .. }));
        assert!(err.to_string().starts_with("Could not generate TDD"));
    }

    #[test]
    fn prose_only_is_malformed() {
        let err = parse_json::<DesignDocument>(DESIGN, "I cannot help with that.").unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse { .. }));
    }
}
