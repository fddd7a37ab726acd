//! Configuration types for generation and rendering.
//!
//! Two structs, two concerns:
//!
//! * [`GenerationConfig`] controls how requests reach the external model
//!   service (provider, model, sampling, timeout).
//! * [`RenderConfig`] controls how Markdown becomes a document view (theme,
//!   diagram engine, timers).
//!
//! Both are built through a consuming builder whose `build()` validates the
//! result, so an invalid combination is rejected before any work starts.

use crate::error::ReqDocError;
use edgequake_llm::LLMProvider;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

// ── Theme ────────────────────────────────────────────────────────────────

/// Visual theme of a rendered document.
///
/// The theme picks the callout variant, the syntax-highlighting palette and
/// the directive prepended to diagram code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
}

impl Theme {
    pub fn as_str(self) -> &'static str {
        match self {
            Theme::Dark => "dark",
            Theme::Light => "light",
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Theme {
    type Err = ReqDocError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            other => Err(ReqDocError::InvalidConfig(format!(
                "unknown theme '{other}' (expected 'dark' or 'light')"
            ))),
        }
    }
}

// ── Generation ───────────────────────────────────────────────────────────

/// Configuration for calls to the document generation service.
///
/// # Example
/// ```rust
/// use reqdoc::GenerationConfig;
///
/// let config = GenerationConfig::builder()
///     .provider_name("openai")
///     .model("gpt-4.1-mini")
///     .api_timeout_secs(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.api_timeout_secs, 90);
/// ```
#[derive(Clone)]
pub struct GenerationConfig {
    /// Model identifier, e.g. "gpt-4.1-mini". If None, uses the provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "gemini", "ollama").
    /// If None along with `provider`, the environment decides.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature. Default: 0.2.
    pub temperature: f32,

    /// Maximum tokens per response. Default: 8192.
    ///
    /// A design document with several features, each carrying a diagram,
    /// routinely passes 4 000 output tokens.
    pub max_tokens: usize,

    /// Per-call timeout in seconds. Default: 120.
    pub api_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.2,
            max_tokens: 8192,
            api_timeout_secs: 120,
        }
    }
}

impl fmt::Debug for GenerationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenerationConfig")
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .finish()
    }
}

impl GenerationConfig {
    pub fn builder() -> GenerationConfigBuilder {
        GenerationConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }
}

/// Builder for [`GenerationConfig`].
#[derive(Debug)]
pub struct GenerationConfigBuilder {
    config: GenerationConfig,
}

impl GenerationConfigBuilder {
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<GenerationConfig, ReqDocError> {
        let c = &self.config;
        if c.max_tokens == 0 {
            return Err(ReqDocError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        if c.api_timeout_secs == 0 {
            return Err(ReqDocError::InvalidConfig(
                "API timeout must be ≥ 1 second".into(),
            ));
        }
        if matches!(&c.provider_name, Some(name) if name.trim().is_empty()) {
            return Err(ReqDocError::InvalidConfig(
                "provider name must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Rendering ────────────────────────────────────────────────────────────

/// Configuration for the Markdown render pipeline and the diagram pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Theme for callouts, highlighting and diagrams. Default: dark.
    pub theme: Theme,

    /// Delay before the diagram pass runs after a document is mounted.
    /// Default: 100 ms.
    pub mount_delay_ms: u64,

    /// Maximum number of diagrams rendered at once. Default: 4.
    pub diagram_concurrency: usize,

    /// Per-diagram engine timeout in seconds. Default: 30.
    pub diagram_timeout_secs: u64,

    /// Mermaid CLI executable. Default: `mmdc` on `PATH`.
    pub mermaid_cli: PathBuf,

    /// How long a code block's copy affordance stays in the "copied" state.
    /// Default: 2000 ms.
    pub code_copy_reset_ms: u64,

    /// Same, for the whole-document copy action. Default: 2500 ms.
    pub document_copy_reset_ms: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            theme: Theme::default(),
            mount_delay_ms: 100,
            diagram_concurrency: 4,
            diagram_timeout_secs: 30,
            mermaid_cli: PathBuf::from("mmdc"),
            code_copy_reset_ms: 2000,
            document_copy_reset_ms: 2500,
        }
    }
}

impl RenderConfig {
    pub fn builder() -> RenderConfigBuilder {
        RenderConfigBuilder {
            config: Self::default(),
        }
    }

    pub fn mount_delay(&self) -> Duration {
        Duration::from_millis(self.mount_delay_ms)
    }

    pub fn diagram_timeout(&self) -> Duration {
        Duration::from_secs(self.diagram_timeout_secs)
    }

    pub fn code_copy_reset(&self) -> Duration {
        Duration::from_millis(self.code_copy_reset_ms)
    }

    pub fn document_copy_reset(&self) -> Duration {
        Duration::from_millis(self.document_copy_reset_ms)
    }
}

/// Builder for [`RenderConfig`].
#[derive(Debug)]
pub struct RenderConfigBuilder {
    config: RenderConfig,
}

impl RenderConfigBuilder {
    pub fn theme(mut self, theme: Theme) -> Self {
        self.config.theme = theme;
        self
    }

    pub fn mount_delay_ms(mut self, ms: u64) -> Self {
        self.config.mount_delay_ms = ms;
        self
    }

    pub fn diagram_concurrency(mut self, n: usize) -> Self {
        self.config.diagram_concurrency = n.max(1);
        self
    }

    pub fn diagram_timeout_secs(mut self, secs: u64) -> Self {
        self.config.diagram_timeout_secs = secs;
        self
    }

    pub fn mermaid_cli(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.mermaid_cli = path.into();
        self
    }

    pub fn code_copy_reset_ms(mut self, ms: u64) -> Self {
        self.config.code_copy_reset_ms = ms;
        self
    }

    pub fn document_copy_reset_ms(mut self, ms: u64) -> Self {
        self.config.document_copy_reset_ms = ms;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<RenderConfig, ReqDocError> {
        let c = &self.config;
        if c.diagram_concurrency == 0 {
            return Err(ReqDocError::InvalidConfig(
                "diagram concurrency must be ≥ 1".into(),
            ));
        }
        if c.diagram_timeout_secs == 0 {
            return Err(ReqDocError::InvalidConfig(
                "diagram timeout must be ≥ 1 second".into(),
            ));
        }
        if c.mermaid_cli.as_os_str().is_empty() {
            return Err(ReqDocError::InvalidConfig(
                "mermaid CLI path must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
