//! CLI binary for probnorm.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `NormalizeConfig` and prints per-document results.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use probnorm::{
    audit, backfill, run, DocStatus, DocumentOutcome, GraphqlFetcher, JsonDirStore,
    NormalizeConfig, ReportSink, RunStats, SharedSink,
};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI report sink using indicatif ──────────────────────────────────────────

/// Terminal report sink: renders a live progress bar plus one log line per
/// settled document. Documents complete out of order in concurrent mode;
/// the bar only counts, it never assumes ordering.
struct CliSink {
    bar: ProgressBar,
    failures: AtomicUsize,
}

impl CliSink {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(spinner_style);
        bar.set_prefix("Scanning");
        bar.set_message("Listing corpus…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            failures: AtomicUsize::new(0),
        })
    }
}

impl ReportSink for CliSink {
    fn begin(&self, total_documents: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>4}/{len} docs  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        self.bar.set_length(total_documents as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Normalizing");
        self.bar.reset_eta();
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Processing {total_documents} documents…"))
        ));
    }

    fn record(&self, outcome: &DocumentOutcome) {
        let title = outcome.title.as_deref().unwrap_or("?");
        let line = match outcome.status {
            DocStatus::Rewritten => format!(
                "  {} {:>5}  {:<40}  {}",
                green("✓"),
                outcome.id,
                title,
                dim(&format!(
                    "rewritten, {} calls, {:.1}s",
                    outcome.attempts,
                    outcome.duration_ms as f64 / 1000.0
                )),
            ),
            DocStatus::AlreadyTarget | DocStatus::NoContent => format!(
                "  {} {:>5}  {:<40}  {}",
                dim("·"),
                outcome.id,
                title,
                dim(if outcome.status == DocStatus::NoContent {
                    "no content"
                } else {
                    "already ok"
                }),
            ),
            DocStatus::NeedsRewrite => format!(
                "  {} {:>5}  {:<40}  {}",
                yellow("→"),
                outcome.id,
                title,
                yellow(outcome.detail.as_deref().unwrap_or("needs rewrite")),
            ),
            _ => {
                self.failures.fetch_add(1, Ordering::SeqCst);
                let msg = clip(outcome.detail.as_deref().unwrap_or("failed"), 80);
                format!("  {} {:>5}  {:<40}  {}", red("✗"), outcome.id, title, red(&msg))
            }
        };
        self.bar.println(line);
        self.bar.inc(1);
    }

    fn finish(&self, stats: &RunStats) {
        self.bar.finish_and_clear();
        let failed = self.failures.load(Ordering::SeqCst);
        if failed == 0 {
            eprintln!(
                "{} {} documents settled  ({} rewritten, {} already ok, {} empty)",
                green("✔"),
                bold(&stats.total_documents.to_string()),
                stats.rewritten,
                stats.already_target,
                stats.no_content,
            );
        } else {
            eprintln!(
                "{} {}/{} documents settled  ({} failed — re-run to retry)",
                if failed == stats.total_documents {
                    red("✘")
                } else {
                    cyan("⚠")
                },
                bold(&(stats.total_documents - failed).to_string()),
                stats.total_documents,
                red(&failed.to_string()),
            );
        }
    }
}

/// Clip a failure detail to one tidy line. Counts characters, not bytes:
/// provider errors and service-derived details are arbitrary UTF-8 and a
/// byte slice could land inside a multibyte character.
fn clip(msg: &str, max_chars: usize) -> String {
    if msg.chars().count() > max_chars {
        let mut s: String = msg.chars().take(max_chars - 1).collect();
        s.push('\u{2026}');
        s
    } else {
        msg.to_string()
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Normalize a corpus directory to Java (the default target)
  probnorm corpus/

  # Normalize to Python with higher concurrency
  probnorm --target python --concurrency 10 corpus/

  # Dry run: report what would be rewritten, no service calls, no writes
  probnorm --check corpus/

  # Use a specific model
  probnorm --model gpt-4.1 --provider openai corpus/

  # Fetch missing problem statements before normalizing
  probnorm --backfill --session "$PROBNORM_SESSION" corpus/

  # Machine-readable report
  probnorm --json corpus/ > report.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PROBNORM_SESSION        Session cookie for --backfill

SETUP:
  1. Set API key:     export OPENAI_API_KEY=sk-...
  2. Normalize:       probnorm corpus/

  Runs are resumable: failed documents keep their original content and are
  retried on the next invocation. Repeat until the summary reports zero
  failures.
"#;

/// Normalize the solution language of an HTML problem corpus using LLMs.
#[derive(Parser, Debug)]
#[command(
    name = "probnorm",
    version,
    about = "Normalize the solution language of an HTML problem corpus using LLMs",
    long_about = "Classify the code blocks of every document in a corpus directory, then rewrite \
the documents whose solutions are in the wrong language via an LLM. Rewritten output is \
re-classified before acceptance; documents that fail keep their original content.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Corpus directory containing one JSON record per document.
    input: PathBuf,

    /// Target language: java, cpp, python.
    #[arg(short, long, env = "PROBNORM_TARGET", default_value = "java")]
    target: String,

    /// Dry run: classify and report only, no service calls, no writes.
    #[arg(long)]
    check: bool,

    /// Fetch missing problem statements before normalizing (needs --session).
    #[arg(long)]
    backfill: bool,

    /// Session cookie for the authenticated backfill endpoint.
    #[arg(long, env = "PROBNORM_SESSION", hide_env_values = true)]
    session: Option<String>,

    /// GraphQL endpoint used by --backfill.
    #[arg(long, env = "PROBNORM_GRAPHQL", default_value = "https://leetcode.com/graphql")]
    graphql_endpoint: String,

    /// Number of concurrent rewrite calls.
    #[arg(short, long, env = "PROBNORM_CONCURRENCY", default_value_t = 5)]
    concurrency: usize,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "PROBNORM_TEMPERATURE", default_value_t = 0.1)]
    temperature: f32,

    /// Max LLM output tokens per document.
    #[arg(long, env = "PROBNORM_MAX_TOKENS", default_value_t = 8192)]
    max_tokens: usize,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "PROBNORM_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,

    /// Initial retry backoff in milliseconds.
    #[arg(long, env = "PROBNORM_BACKOFF_MS", default_value_t = 500)]
    backoff_ms: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long, env = "PROBNORM_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// Output the full report as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PROBNORM_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PROBNORM_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PROBNORM_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active; the
    // bar provides all the feedback that matters to the user.
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

    let store = JsonDirStore::open(&cli.input).context("Failed to open corpus directory")?;

    // ── Optional backfill pre-pass ───────────────────────────────────────
    if cli.backfill {
        let session = cli
            .session
            .as_deref()
            .context("--backfill requires --session (or PROBNORM_SESSION)")?;
        let fetcher = GraphqlFetcher::new(&cli.graphql_endpoint, session)
            .context("Failed to build fetch client")?;
        let assets_root = cli.input.join("assets");
        let stats = backfill(&store, &fetcher, &assets_root)
            .await
            .context("Backfill failed")?;
        if !cli.quiet {
            eprintln!(
                "{} backfill: {} fetched, {} skipped, {} failed, {} assets",
                if stats.failed == 0 { green("✔") } else { cyan("⚠") },
                stats.fetched,
                stats.skipped,
                red(&stats.failed.to_string()),
                stats.assets_downloaded,
            );
        }
    }

    // ── Build config ─────────────────────────────────────────────────────
    let config = build_config(&cli, show_progress).await?;

    // ── Run ──────────────────────────────────────────────────────────────
    let report = if cli.check {
        audit(&store, &config).context("Audit failed")?
    } else {
        run(&store, &config).await.context("Normalization failed")?
    };

    if cli.json {
        let json = serde_json::to_string_pretty(&report).context("Failed to serialise report")?;
        println!("{json}");
    }

    if !report.is_settled() && !cli.check {
        std::process::exit(1);
    }
    Ok(())
}

/// Map CLI args to `NormalizeConfig`.
async fn build_config(cli: &Cli, show_progress: bool) -> Result<NormalizeConfig> {
    let target = cli
        .target
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))
        .context("Invalid --target")?;

    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let mut builder = NormalizeConfig::builder()
        .target(target)
        .concurrency(cli.concurrency)
        .temperature(cli.temperature)
        .max_tokens(cli.max_tokens)
        .retry_backoff_ms(cli.backoff_ms)
        .api_timeout_secs(cli.api_timeout);

    if show_progress {
        let sink: SharedSink = CliSink::new();
        builder = builder.report_sink(sink);
    }

    let mut config = builder.build().context("Invalid configuration")?;

    // Apply fields the builder doesn't have setters for in this shim.
    config.model = cli.model.clone();
    config.provider_name = cli.provider.clone();
    config.system_prompt = system_prompt;

    Ok(config)
}
