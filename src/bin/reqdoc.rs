//! CLI binary for reqdoc.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `GenerationConfig` / `RenderConfig`, drives one `Session` and prints
//! results.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use reqdoc::export::{ANALYSIS_FILE_STEM, DESIGN_FALLBACK_TITLE};
use reqdoc::render::copy::Osc52Clipboard;
use reqdoc::render::html;
use reqdoc::toc;
use reqdoc::{
    build_toc, download_file_name, format_plan, safe_title, write_markdown, CopyAffordance,
    DiagramRenderer, GenerationConfig, LlmGenerationClient, MermaidCli, RenderConfig, Renderer,
    Session, Theme, Upload,
};
use std::future::Future;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract the text of a requirement document
  reqdoc extract requirements.pdf

  # Feature brief from a document, a text file or stdin
  reqdoc analyze requirements.docx -o brief.md
  echo "Users can reset their password by email" | reqdoc analyze -

  # Technical Design Document, saved as <Title>.md in ./out
  reqdoc tdd requirements.pdf -o out/

  # TDD followed by an implementation plan per core feature
  reqdoc plan requirements.pdf --json > plan.json

  # Table of contents / standalone HTML preview of any Markdown file
  reqdoc toc design.md
  reqdoc preview design.md --theme light -o design.html

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium
  REQDOC_MERMAID_CLI      Mermaid CLI executable (default: mmdc)
"#;

/// Turn requirement documents into analyses, TDDs and implementation plans.
#[derive(Parser, Debug)]
#[command(
    name = "reqdoc",
    version,
    about = "Turn requirement documents into analyses, TDDs and implementation plans",
    long_about = "Extract text from PDF and DOCX requirement documents, generate a feature \
analysis, a Technical Design Document and an implementation plan with an LLM, and render \
Markdown into a navigable HTML preview with diagrams.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Output structured JSON instead of Markdown.
    #[arg(long, global = true, env = "REQDOC_JSON")]
    json: bool,

    /// Disable the spinner.
    #[arg(long, global = true, env = "REQDOC_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "REQDOC_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "REQDOC_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the plain text of a PDF or DOCX document.
    Extract {
        /// PDF or DOCX file.
        input: PathBuf,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Generate a structured feature analysis.
    Analyze {
        /// PDF, DOCX or text file, or `-` for stdin.
        input: String,
        #[command(flatten)]
        generation: GenerationArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Generate a Technical Design Document.
    Tdd {
        /// PDF, DOCX or text file, or `-` for stdin.
        input: String,
        #[command(flatten)]
        generation: GenerationArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Generate a TDD, then an implementation plan for each of its core features.
    Plan {
        /// PDF, DOCX or text file, or `-` for stdin.
        input: String,
        #[command(flatten)]
        generation: GenerationArgs,
        #[command(flatten)]
        out: OutputArgs,
    },
    /// Print the table of contents of a Markdown file.
    Toc {
        /// Markdown file, or `-` for stdin.
        input: String,
    },
    /// Render a Markdown file to a standalone HTML page.
    Preview {
        /// Markdown file, or `-` for stdin.
        input: String,
        #[command(flatten)]
        render: RenderArgs,
        /// Write HTML to this file instead of stdout.
        #[arg(short, long, env = "REQDOC_OUTPUT")]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct GenerationArgs {
    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "REQDOC_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-mini, claude-sonnet-4-20250514).
    #[arg(long, env = "REQDOC_MODEL")]
    model: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "REQDOC_TEMPERATURE", default_value_t = 0.2)]
    temperature: f32,

    /// Max LLM output tokens per call.
    #[arg(long, env = "REQDOC_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "REQDOC_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Write Markdown to this file, or into this directory under the download name.
    #[arg(short, long, env = "REQDOC_OUTPUT")]
    output: Option<PathBuf>,

    /// Also copy the result to the clipboard (OSC 52 terminal escape).
    #[arg(long)]
    copy: bool,
}

#[derive(Args, Debug)]
struct RenderArgs {
    /// Theme: dark or light.
    #[arg(long, env = "REQDOC_THEME", default_value = "dark")]
    theme: Theme,

    /// Leave diagrams as source instead of running the Mermaid CLI.
    #[arg(long)]
    no_diagrams: bool,

    /// Mermaid CLI executable.
    #[arg(long, env = "REQDOC_MERMAID_CLI", default_value = "mmdc")]
    mermaid_cli: PathBuf,

    /// Maximum number of diagrams rendered at once.
    #[arg(long, env = "REQDOC_DIAGRAM_CONCURRENCY", default_value_t = 4)]
    diagram_concurrency: usize,

    /// Per-diagram timeout in seconds.
    #[arg(long, env = "REQDOC_DIAGRAM_TIMEOUT", default_value_t = 30)]
    diagram_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner gives all the feedback that matters; library INFO logs
    // are only shown when it is off.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let ui = Ui {
        json: cli.json,
        quiet: cli.quiet,
        progress: show_progress,
    };

    match cli.command {
        Command::Extract { input, out } => {
            let upload = Upload::from_path(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let doc = ui
                .spin("Extracting text…", reqdoc::extract_text(&upload))
                .await
                .context("Text extraction failed")?;
            if ui.json {
                print_json(&doc)?;
            } else {
                emit(&ui, &doc.text, &out, "extracted").await?;
            }
        }

        Command::Analyze {
            input,
            generation,
            out,
        } => {
            let session = connect(&generation)?;
            let text = requirement_text(&ui, &session, &input).await?;
            let analysis = ui
                .spin("Analysing requirement…", session.analyze(&text))
                .await
                .context("Analysis failed")?;
            if ui.json {
                print_json(&serde_json::json!({ "analysis": analysis }))?;
            } else {
                emit(&ui, &analysis, &out, ANALYSIS_FILE_STEM).await?;
            }
        }

        Command::Tdd {
            input,
            generation,
            out,
        } => {
            let session = connect(&generation)?;
            let text = requirement_text(&ui, &session, &input).await?;
            let design = ui
                .spin("Generating TDD…", session.generate_design(&text))
                .await
                .context("TDD generation failed")?;
            if ui.json {
                print_json(&design)?;
            } else {
                emit(&ui, &design.content, &out, &design.title).await?;
            }
        }

        Command::Plan {
            input,
            generation,
            out,
        } => {
            let session = connect(&generation)?;
            let text = requirement_text(&ui, &session, &input).await?;
            let design = ui
                .spin("Generating TDD…", session.generate_design(&text))
                .await
                .context("TDD generation failed")?;
            let plans = ui
                .spin("Generating implementation plan…", session.generate_plan())
                .await
                .context("Implementation plan generation failed")?;
            if ui.json {
                print_json(&serde_json::json!({ "tdd": design, "plans": plans }))?;
            } else {
                let stem = format!("{}_Plan", design.title);
                emit(&ui, &format_plan(&plans), &out, &stem).await?;
            }
        }

        Command::Toc { input } => {
            let markdown = read_markdown(&input).await?;
            let entries = build_toc(&markdown);
            if ui.json {
                print_json(&entries)?;
            } else {
                print!("{}", toc::to_markdown(&entries));
            }
        }

        Command::Preview {
            input,
            render,
            output,
        } => {
            let config = RenderConfig::builder()
                .theme(render.theme)
                .mermaid_cli(render.mermaid_cli.clone())
                .diagram_concurrency(render.diagram_concurrency)
                .diagram_timeout_secs(render.diagram_timeout)
                .build()
                .context("Invalid configuration")?;

            let markdown = read_markdown(&input).await?;
            let entries = build_toc(&markdown);
            let mut doc = Renderer::from_config(&config).render(&markdown);

            let summary = if render.no_diagrams || doc.diagrams().is_empty() {
                None
            } else {
                let engine = Arc::new(MermaidCli::from_config(&config));
                let renderer = DiagramRenderer::from_config(engine, &config);
                Some(
                    ui.spin("Rendering diagrams…", renderer.render_after_mount(&mut doc))
                        .await,
                )
            };

            let title = entries
                .iter()
                .find(|e| e.level == 1)
                .map(|e| e.text.clone())
                .unwrap_or_else(|| input_stem(&input));
            let page = html::page(&title, &entries, &doc);

            match output {
                Some(ref path) => {
                    tokio::fs::write(path, &page)
                        .await
                        .with_context(|| format!("Failed to write {}", path.display()))?;
                    ui.done(&format!("Preview written to {}", bold(&path.display().to_string())));
                }
                None if !ui.json => io::stdout()
                    .write_all(page.as_bytes())
                    .context("Failed to write to stdout")?,
                None => {}
            }

            if ui.json {
                print_json(&serde_json::json!({
                    "title": title,
                    "toc": entries,
                    "codeBlocks": doc.code_blocks().len(),
                    "diagrams": summary,
                }))?;
            } else if let Some(s) = summary {
                ui.note(&format!(
                    "diagrams: {} rendered, {} failed, {} empty",
                    s.rendered, s.failed, s.empty
                ));
            }
        }
    }

    Ok(())
}

// ── Output helpers ───────────────────────────────────────────────────────

struct Ui {
    json: bool,
    quiet: bool,
    progress: bool,
}

impl Ui {
    /// Run `fut` behind a spinner when progress output is enabled.
    async fn spin<T>(&self, message: &str, fut: impl Future<Output = T>) -> T {
        if !self.progress {
            return fut.await;
        }
        let bar = ProgressBar::new_spinner();
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}  {elapsed:.dim}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
        );
        bar.set_message(message.to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        let out = fut.await;
        bar.finish_and_clear();
        out
    }

    fn done(&self, message: &str) {
        if !self.quiet {
            eprintln!("{} {message}", green("✔"));
        }
    }

    fn note(&self, message: &str) {
        if !self.quiet {
            eprintln!("   {}", dim(message));
        }
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialise output")?
    );
    Ok(())
}

/// Write Markdown to `--output` (a file, or a directory that receives
/// `{stem}.md`) or stdout, and optionally copy it to the clipboard.
async fn emit(ui: &Ui, markdown: &str, out: &OutputArgs, stem: &str) -> Result<()> {
    match out.output {
        Some(ref path) => {
            let target = if path.is_dir() || path.to_string_lossy().ends_with('/') {
                path.join(download_file_name(&safe_title(stem, DESIGN_FALLBACK_TITLE)))
            } else {
                path.clone()
            };
            write_markdown(&target, markdown)
                .await
                .context("Failed to save output")?;
            ui.done(&format!("Saved {}", bold(&target.display().to_string())));
        }
        None => write_text(&mut io::stdout().lock(), markdown)?,
    }

    if out.copy {
        let copy = CopyAffordance::new(markdown, RenderConfig::default().document_copy_reset());
        if copy.trigger(&Osc52Clipboard::stderr()) {
            ui.done("Copied to clipboard");
        } else {
            ui.note("nothing to copy");
        }
    }
    Ok(())
}

// ── Input helpers ────────────────────────────────────────────────────────

/// Write `text` to `w`, ending with exactly one trailing newline.
fn write_text(w: &mut impl Write, text: &str) -> Result<()> {
    w.write_all(text.as_bytes())
        .context("Failed to write to stdout")?;
    if !text.ends_with('\n') {
        w.write_all(b"\n").context("Failed to write to stdout")?;
    }
    Ok(())
}

fn connect(args: &GenerationArgs) -> Result<Session> {
    let mut builder = GenerationConfig::builder()
        .temperature(args.temperature)
        .max_tokens(args.max_tokens)
        .api_timeout_secs(args.api_timeout);
    if let Some(ref name) = args.provider {
        builder = builder.provider_name(name);
    }
    if let Some(ref model) = args.model {
        builder = builder.model(model);
    }
    let config = builder.build().context("Invalid configuration")?;
    let client = LlmGenerationClient::from_config(config).context("No LLM provider available")?;
    Ok(Session::new(Arc::new(client)))
}

fn is_document(path: &Path) -> bool {
    matches!(
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref(),
        Some("pdf" | "docx" | "doc")
    )
}

/// Requirement text from a document (extracted), a text file or stdin.
async fn requirement_text(ui: &Ui, session: &Session, input: &str) -> Result<String> {
    let path = Path::new(input);
    if input != "-" && is_document(path) {
        let upload = Upload::from_path(path)
            .await
            .with_context(|| format!("Failed to read {input}"))?;
        let doc = ui
            .spin("Extracting text…", session.extract(&upload))
            .await
            .context("Text extraction failed")?;
        ui.note(&format!("{} chars extracted", doc.text.len()));
        return Ok(doc.text);
    }
    read_markdown(input).await
}

async fn read_markdown(input: &str) -> Result<String> {
    if input == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("Failed to read {input}"))
}

fn input_stem(input: &str) -> String {
    Path::new(input)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| s != "-")
        .unwrap_or_else(|| "Preview".to_string())
}
