//! Diagram post-pass: turn `mermaid` placeholders into rendered SVG.
//!
//! The pass runs after a document has been rendered (and, in a viewer,
//! mounted). For every diagram node whose `processed` flag is still false it:
//!
//! 1. sets `processed = true` before anything else, so no later pass can
//!    pick the node up again;
//! 2. shows nothing when the code after the directive line is blank;
//! 3. otherwise asks the [`DiagramEngine`] for an SVG.
//!
//! Engine calls for different diagrams run concurrently. A failure only
//! affects its own node, which switches to an error panel; the pass itself
//! never fails.

use crate::config::RenderConfig;
use crate::error::RenderError;
use crate::render::node::{DiagramContent, RenderedDocument};
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub const ERROR_TITLE: &str = "Diagram Rendering Error";
pub const ERROR_DETAIL: &str = "The AI-generated diagram syntax could not be rendered.";
pub const LOADING_TEXT: &str = "Loading diagram...";

/// Something that turns diagram code into SVG markup.
#[async_trait]
pub trait DiagramEngine: Send + Sync {
    async fn render(&self, id: &str, code: &str) -> Result<String, RenderError>;
}

/// Outcome counts of one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiagramPassSummary {
    pub rendered: usize,
    pub failed: usize,
    pub empty: usize,
    /// Nodes already processed by an earlier pass.
    pub skipped: usize,
}

pub struct DiagramRenderer {
    engine: Arc<dyn DiagramEngine>,
    concurrency: usize,
    mount_delay: Duration,
}

impl DiagramRenderer {
    pub fn new(engine: Arc<dyn DiagramEngine>) -> Self {
        let defaults = RenderConfig::default();
        Self::from_config(engine, &defaults)
    }

    pub fn from_config(engine: Arc<dyn DiagramEngine>, config: &RenderConfig) -> Self {
        Self {
            engine,
            concurrency: config.diagram_concurrency.max(1),
            mount_delay: config.mount_delay(),
        }
    }

    /// Wait for the mount delay, then run [`render_pending`](Self::render_pending).
    pub async fn render_after_mount(&self, doc: &mut RenderedDocument) -> DiagramPassSummary {
        tokio::time::sleep(self.mount_delay).await;
        self.render_pending(doc).await
    }

    /// Render every diagram that has not been processed yet.
    pub async fn render_pending(&self, doc: &mut RenderedDocument) -> DiagramPassSummary {
        let mut summary = DiagramPassSummary::default();
        let mut diagrams = doc.diagrams_mut();
        let mut jobs = Vec::new();

        for (idx, diagram) in diagrams.iter_mut().enumerate() {
            if diagram.state.processed {
                summary.skipped += 1;
                continue;
            }
            diagram.state.processed = true;

            if diagram.is_blank() {
                debug!("Diagram {} is blank, nothing to render", diagram.id);
                diagram.content = DiagramContent::Empty;
                summary.empty += 1;
                continue;
            }

            diagram.content = DiagramContent::Loading;
            jobs.push((idx, diagram.id.clone(), diagram.state.code.clone()));
        }

        if jobs.is_empty() {
            return summary;
        }
        info!("Rendering {} diagram(s), concurrency {}", jobs.len(), self.concurrency);

        let engine = &self.engine;
        let results: Vec<(usize, Result<String, RenderError>)> = stream::iter(jobs)
            .map(|(idx, id, code)| async move { (idx, engine.render(&id, &code).await) })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for (idx, result) in results {
            let diagram = &mut diagrams[idx];
            match result {
                Ok(svg) => {
                    diagram.content = DiagramContent::Rendered { svg };
                    summary.rendered += 1;
                }
                Err(e) => {
                    warn!("Diagram {} failed to render: {e}", diagram.id);
                    diagram.content = DiagramContent::Failed {
                        message: e.to_string(),
                    };
                    summary.failed += 1;
                }
            }
        }

        summary
    }
}

// ── Mermaid CLI engine ───────────────────────────────────────────────────

/// Renders with the Mermaid CLI (`mmdc` from `@mermaid-js/mermaid-cli`).
///
/// Each call writes the code to a private temp directory, runs the CLI with a
/// timeout and reads the SVG back. The child process is killed if the call
/// is dropped or times out.
#[derive(Debug, Clone)]
pub struct MermaidCli {
    program: PathBuf,
    timeout: Duration,
}

impl MermaidCli {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.mermaid_cli.clone(), config.diagram_timeout())
    }
}

/// Keep the CLI's message, drop its JavaScript stack trace.
fn cli_message(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let message = text
        .lines()
        .filter(|l| !l.trim_start().starts_with("at "))
        .collect::<Vec<_>>()
        .join("\n");
    message.trim().to_string()
}

#[async_trait]
impl DiagramEngine for MermaidCli {
    async fn render(&self, id: &str, code: &str) -> Result<String, RenderError> {
        let dir = tempfile::tempdir()
            .map_err(|e| RenderError::EngineUnavailable(format!("cannot create temp dir: {e}")))?;
        let input = dir.path().join("diagram.mmd");
        let output = dir.path().join("diagram.svg");

        tokio::fs::write(&input, code)
            .await
            .map_err(|e| RenderError::EngineUnavailable(format!("cannot write diagram source: {e}")))?;

        let mut cmd = tokio::process::Command::new(&self.program);
        cmd.arg("--quiet")
            .arg("--input")
            .arg(&input)
            .arg("--output")
            .arg(&output)
            .arg("--backgroundColor")
            .arg("transparent")
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!("Running {} for diagram {id}", self.program.display());
        let out = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return Err(RenderError::Timeout {
                    id: id.to_string(),
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RenderError::EngineUnavailable(format!(
                    "'{}' not found; install @mermaid-js/mermaid-cli or set REQDOC_MERMAID_CLI",
                    self.program.display()
                )))
            }
            Ok(Err(e)) => return Err(RenderError::EngineUnavailable(e.to_string())),
            Ok(Ok(out)) => out,
        };

        if !out.status.success() {
            let message = cli_message(&out.stderr);
            return Err(RenderError::InvalidSource {
                id: id.to_string(),
                message: if message.is_empty() {
                    format!("mermaid CLI exited with {}", out.status)
                } else {
                    message
                },
            });
        }

        tokio::fs::read_to_string(&output)
            .await
            .map_err(|e| RenderError::InvalidSource {
                id: id.to_string(),
                message: format!("no SVG produced: {e}"),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Theme;
    use crate::render::render_markdown;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Counts calls; fails any diagram whose code contains `BROKEN`.
    #[derive(Default)]
    struct CountingEngine {
        calls: AtomicUsize,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl DiagramEngine for CountingEngine {
        async fn render(&self, id: &str, code: &str) -> Result<String, RenderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen.lock().unwrap().push(id.to_string());
            if code.contains("BROKEN") {
                return Err(RenderError::InvalidSource {
                    id: id.to_string(),
                    message: "Parse error: unexpected <token>".into(),
                });
            }
            Ok(format!("<svg data-id=\"{id}\"></svg>"))
        }
    }

    const TWO_DIAGRAMS: &str =
        "# Doc\n\n```mermaid\ngraph TD; A-->B\n```\n\ntext\n\n```mermaid\ngraph TD; C-->D\n```\n";

    #[tokio::test]
    async fn every_pending_diagram_is_rendered_once() {
        let engine = Arc::new(CountingEngine::default());
        let renderer = DiagramRenderer::new(engine.clone());
        let mut doc = render_markdown(TWO_DIAGRAMS, Theme::Dark);

        let first = renderer.render_pending(&mut doc).await;
        assert_eq!(first.rendered, 2);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);

        let second = renderer.render_pending(&mut doc).await;
        assert_eq!(second.skipped, 2);
        assert_eq!(second.rendered, 0);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);

        for d in doc.diagrams() {
            assert!(d.state.processed);
            assert!(matches!(d.content, DiagramContent::Rendered { .. }));
        }
    }

    #[tokio::test]
    async fn failure_is_contained_to_one_diagram() {
        let engine = Arc::new(CountingEngine::default());
        let renderer = DiagramRenderer::new(engine);
        let md = "```mermaid\ngraph TD; BROKEN\n```\n\n```mermaid\ngraph TD; A-->B\n```\n";
        let mut doc = render_markdown(md, Theme::Dark);

        let summary = renderer.render_pending(&mut doc).await;
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.rendered, 1);

        let diagrams = doc.diagrams();
        assert!(matches!(
            &diagrams[0].content,
            DiagramContent::Failed { message } if message.contains("unexpected <token>")
        ));
        assert!(matches!(diagrams[1].content, DiagramContent::Rendered { .. }));

        let html = doc.to_html();
        assert!(html.contains(ERROR_TITLE));
        assert!(html.contains("unexpected &lt;token&gt;"));
    }

    #[tokio::test]
    async fn blank_diagram_renders_nothing_without_engine_call() {
        let engine = Arc::new(CountingEngine::default());
        let renderer = DiagramRenderer::new(engine.clone());
        let mut doc = render_markdown("```mermaid\n   \n```\n", Theme::Light);

        let summary = renderer.render_pending(&mut doc).await;
        assert_eq!(summary.empty, 1);
        assert_eq!(engine.calls.load(Ordering::SeqCst), 0);
        assert_eq!(doc.diagrams()[0].content, DiagramContent::Empty);
        assert!(doc.diagrams()[0].state.processed);
    }

    #[tokio::test]
    async fn engine_receives_directive_prefixed_code() {
        struct Echo;
        #[async_trait]
        impl DiagramEngine for Echo {
            async fn render(&self, _id: &str, code: &str) -> Result<String, RenderError> {
                Ok(code.to_string())
            }
        }

        let renderer = DiagramRenderer::new(Arc::new(Echo));
        let mut doc = render_markdown("```mermaid\ngraph LR; X-->Y\n```\n", Theme::Light);
        renderer.render_pending(&mut doc).await;
        assert_eq!(
            doc.diagrams()[0].content,
            DiagramContent::Rendered {
                svg: "%%{init: {'theme': 'default'}}%%\ngraph LR; X-->Y".into()
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn mount_delay_precedes_the_pass() {
        let engine = Arc::new(CountingEngine::default());
        let renderer = DiagramRenderer::new(engine.clone());
        let mut doc = render_markdown(TWO_DIAGRAMS, Theme::Dark);

        let start = tokio::time::Instant::now();
        renderer.render_after_mount(&mut doc).await;
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn missing_cli_becomes_error_panel() {
        let engine = Arc::new(MermaidCli::new(
            "/definitely/not/installed/mmdc",
            Duration::from_secs(5),
        ));
        let renderer = DiagramRenderer::new(engine);
        let mut doc = render_markdown("```mermaid\ngraph TD; A-->B\n```\n", Theme::Dark);

        let summary = renderer.render_pending(&mut doc).await;
        assert_eq!(summary.failed, 1);
        assert!(matches!(
            &doc.diagrams()[0].content,
            DiagramContent::Failed { message } if message.contains("not found")
        ));
    }

    #[test]
    fn stack_frames_are_dropped_from_cli_errors() {
        let stderr = b"Error: Parse error on line 2:\n...A-->\n    at Object.parse (mermaid.js:1:1)\n    at run (cli.js:2:2)\n";
        assert_eq!(cli_message(stderr), "Error: Parse error on line 2:\n...A-->");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn cli_engine_reads_back_svg() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-mmdc");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
while [ $# -gt 0 ]; do\n\
  case \"$1\" in\n\
    --input) in=\"$2\"; shift ;;\n\
    --output) out=\"$2\"; shift ;;\n\
  esac\n\
  shift\n\
done\n\
if grep -q BROKEN \"$in\"; then echo 'Parse error on line 2' >&2; exit 1; fi\n\
printf '<svg>ok</svg>' > \"$out\"\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let cli = MermaidCli::new(&script, Duration::from_secs(10));
        assert_eq!(cli.render("d1", "\ngraph TD; A").await.unwrap(), "<svg>ok</svg>");

        match cli.render("d2", "\ngraph TD; BROKEN").await.unwrap_err() {
            RenderError::InvalidSource { id, message } => {
                assert_eq!(id, "d2");
                assert_eq!(message, "Parse error on line 2");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
