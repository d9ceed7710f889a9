//! CLI binary for archive-scribe.
//!
//! A thin shim over the library crate that maps CLI flags (and the
//! environment, including a `.env` file) to `TranscriptionConfig`, runs the
//! pipeline and reports where the output went.

use anyhow::{Context, Result};
use archive_scribe::{
    document_title_from_path, ImageEncoding, ProgressCallback, TranscriptionConfig,
    TranscriptionPipeline, TranscriptionProgressCallback,
};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Live progress bar with one log line per page.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` tells us how many pages were selected.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Opening PDF…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }

    fn activate_bar(&self, selected: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(selected as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Transcribing");
        self.bar.reset_eta();
    }
}

impl TranscriptionProgressCallback for CliProgressCallback {
    fn on_run_start(&self, total_pages: usize, selected: usize) {
        self.activate_bar(selected);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Transcribing {selected} of {total_pages} pages…"))
        ));
    }

    fn on_page_start(&self, page_number: usize, _total_pages: usize) {
        self.bar.set_message(format!("page {page_number}"));
    }

    fn on_page_complete(&self, page_number: usize, total_pages: usize, elapsed: Duration, chars: usize) {
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_number,
            total_pages,
            dim(&format!("{chars:>5} chars")),
            dim(&format!("{:.1}s", elapsed.as_secs_f64())),
        ));
        self.bar.inc(1);
    }

    fn on_page_degraded(&self, page_number: usize, total_pages: usize, elapsed: Duration, marker: &str) {
        let msg: String = if marker.chars().count() > 80 {
            marker.chars().take(79).chain(std::iter::once('…')).collect()
        } else {
            marker.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            yellow("⚠"),
            page_number,
            total_pages,
            yellow(&msg),
            dim(&format!("{:.1}s", elapsed.as_secs_f64())),
        ));
        self.bar.inc(1);
    }

    fn on_run_complete(&self, processed: usize, degraded: usize) {
        self.bar.finish_and_clear();
        if degraded == 0 {
            eprintln!(
                "{} {} pages transcribed",
                green("✔"),
                bold(&processed.to_string())
            );
        } else {
            eprintln!(
                "{} {} pages transcribed  ({} with error markers)",
                yellow("⚠"),
                bold(&processed.to_string()),
                yellow(&degraded.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Whole document, text output in ./outputs/
  transcribe assets/acta_concejo_1953.pdf

  # A few pages, with a title and structured JSON
  transcribe acta.pdf --pages 1,3,5-7 --title "Actas del Concejo 1953" --json

  # Lossy images and a slower pace for a strict rate limit
  transcribe acta.pdf --image-format jpeg --jpeg-quality 90 --inter-page-delay 3

OUTPUT:
  <output-dir>/<stem>_transcription.txt   rewritten after every page
  <output-dir>/<stem>_transcription.json  written at the end with --json

ENVIRONMENT VARIABLES (also read from ./.env):
  ANTHROPIC_API_KEY          Anthropic API key (required)
  CLAUDE_MODEL               Model ID (default claude-sonnet-4-5)
  MAX_OUTPUT_TOKENS          Max output tokens per page (default 4096)
  PDF_DPI                    Rasterisation DPI (default 200)
  IMAGE_MAX_WIDTH            Downscale pages wider than this (default 1600)
  CONTRAST_FACTOR            Contrast boost (default 1.3)
  SHARPNESS_FACTOR           Sharpness boost (default 1.2)
  RETRY_ATTEMPTS             Attempts per page (default 3)
  RETRY_DELAY_SECONDS        Base retry delay (default 5)
  INTER_PAGE_DELAY_SECONDS   Pause between pages (default 1.0)
  OUTPUT_DIR                 Output directory (default outputs)
  IMAGE_FORMAT               png or jpeg (default png)
  ANTHROPIC_BASE_URL         API base URL
  API_TIMEOUT_SECONDS        Per-request timeout (default 120)
  PDFIUM_LIB_PATH            libpdfium file or directory
"#;

/// Transcribe handwritten archive PDFs with a vision language model.
#[derive(Parser, Debug)]
#[command(
    name = "transcribe",
    version,
    about = "Transcribe handwritten archive PDFs page by page with Claude",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF document to transcribe.
    input: PathBuf,

    /// Document title for prompts and output headers (default: from file name).
    #[arg(long)]
    title: Option<String>,

    /// Page selection: all, 5, 3-15, or 1,3,5-7 (1-based).
    #[arg(long)]
    pages: Option<String>,

    /// Also write the structured JSON result.
    #[arg(long)]
    json: bool,

    /// Directory for output files.
    #[arg(short, long, env = "OUTPUT_DIR", default_value = "outputs")]
    output_dir: PathBuf,

    /// Anthropic API key.
    #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Model ID.
    #[arg(long, env = "CLAUDE_MODEL", default_value = archive_scribe::config::DEFAULT_MODEL)]
    model: String,

    /// API base URL.
    #[arg(long, env = "ANTHROPIC_BASE_URL", default_value = archive_scribe::config::DEFAULT_API_BASE_URL)]
    base_url: String,

    /// Max output tokens per page.
    #[arg(long, env = "MAX_OUTPUT_TOKENS", default_value_t = 4096)]
    max_tokens: u32,

    /// Rendering DPI (72–600).
    #[arg(long, env = "PDF_DPI", default_value_t = 200,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Pages wider than this many pixels are downscaled.
    #[arg(long, env = "IMAGE_MAX_WIDTH", default_value_t = 1600)]
    max_width: u32,

    /// Contrast enhancement factor (1.0 = unchanged).
    #[arg(long, env = "CONTRAST_FACTOR", default_value_t = 1.3)]
    contrast: f32,

    /// Sharpness enhancement factor (1.0 = unchanged).
    #[arg(long, env = "SHARPNESS_FACTOR", default_value_t = 1.2)]
    sharpness: f32,

    /// Image encoding sent to the model.
    #[arg(long, env = "IMAGE_FORMAT", value_enum, default_value = "png")]
    image_format: ImageFormatArg,

    /// JPEG quality (1–100), used with --image-format jpeg.
    #[arg(long, default_value_t = 85,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    jpeg_quality: u8,

    /// Attempts per page, including the first.
    #[arg(long, env = "RETRY_ATTEMPTS", default_value_t = 3,
          value_parser = clap::value_parser!(u32).range(1..))]
    retry_attempts: u32,

    /// Base retry delay in seconds.
    #[arg(long, env = "RETRY_DELAY_SECONDS", default_value_t = 5.0)]
    retry_delay: f64,

    /// Pause between pages in seconds.
    #[arg(long, env = "INTER_PAGE_DELAY_SECONDS", default_value_t = 1.0)]
    inter_page_delay: f64,

    /// Per-request timeout in seconds.
    #[arg(long, env = "API_TIMEOUT_SECONDS", default_value_t = 120)]
    api_timeout: u64,

    /// Path to a text file containing a custom system prompt.
    #[arg(long)]
    system_prompt: Option<PathBuf>,

    /// libpdfium file or the directory containing it.
    #[arg(long, env = "PDFIUM_LIB_PATH")]
    pdfium_lib: Option<PathBuf>,

    /// Disable progress bar.
    #[arg(long)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long)]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ImageFormatArg {
    Png,
    Jpeg,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env is normal.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO-level narration while it is shown.
    let show_progress = !cli.quiet && !cli.no_progress;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Build pipeline ───────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn TranscriptionProgressCallback>)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb).await?;
    let pipeline = TranscriptionPipeline::new(config).context("Cannot start transcription")?;

    // ── Run ──────────────────────────────────────────────────────────────
    let title = cli
        .title
        .clone()
        .unwrap_or_else(|| document_title_from_path(&cli.input));

    let result = pipeline
        .run(&cli.input, &title, cli.pages.as_deref(), cli.json)
        .await
        .with_context(|| format!("Transcription of '{}' failed", cli.input.display()))?;

    if !cli.quiet {
        let store = pipeline.store();
        eprintln!(
            "{}  {} pages  →  {}",
            green("✔"),
            result.processed_pages.len(),
            bold(&store.txt_path(&cli.input).display().to_string()),
        );
        if cli.json {
            eprintln!(
                "   {}",
                dim(&store.json_path(&cli.input).display().to_string())
            );
        }
    }

    Ok(())
}

/// Map CLI args to `TranscriptionConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<TranscriptionConfig> {
    let system_prompt = if let Some(ref path) = cli.system_prompt {
        Some(
            tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read system prompt from {:?}", path))?,
        )
    } else {
        None
    };

    let retry_delay = Duration::try_from_secs_f64(cli.retry_delay)
        .context("--retry-delay must be a non-negative number of seconds")?;
    let inter_page_delay = Duration::try_from_secs_f64(cli.inter_page_delay)
        .context("--inter-page-delay must be a non-negative number of seconds")?;

    let encoding = match cli.image_format {
        ImageFormatArg::Png => ImageEncoding::Png,
        ImageFormatArg::Jpeg => ImageEncoding::Jpeg {
            quality: cli.jpeg_quality,
        },
    };

    let mut builder = TranscriptionConfig::builder()
        .model(cli.model.clone())
        .api_base_url(cli.base_url.clone())
        .max_tokens(cli.max_tokens)
        .api_timeout_secs(cli.api_timeout)
        .dpi(cli.dpi)
        .max_image_width(cli.max_width)
        .contrast_factor(cli.contrast)
        .sharpness_factor(cli.sharpness)
        .image_encoding(encoding)
        .max_attempts(cli.retry_attempts)
        .retry_delay(retry_delay)
        .inter_page_delay(inter_page_delay)
        .output_dir(cli.output_dir.clone());

    if let Some(ref key) = cli.api_key {
        builder = builder.api_key(key.clone());
    }
    if let Some(prompt) = system_prompt {
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref lib) = cli.pdfium_lib {
        builder = builder.pdfium_library_path(lib.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_core_flags() {
        let cli = Cli::try_parse_from([
            "transcribe",
            "acta.pdf",
            "--pages",
            "1,3,5-7",
            "--json",
            "--image-format",
            "jpeg",
            "--retry-delay",
            "0.5",
        ])
        .unwrap();
        assert_eq!(cli.input, PathBuf::from("acta.pdf"));
        assert_eq!(cli.pages.as_deref(), Some("1,3,5-7"));
        assert!(cli.json);
        assert!(matches!(cli.image_format, ImageFormatArg::Jpeg));
        assert_eq!(cli.retry_delay, 0.5);
    }

    #[test]
    fn zero_retry_attempts_rejected() {
        assert!(Cli::try_parse_from(["transcribe", "a.pdf", "--retry-attempts", "0"]).is_err());
    }

    #[tokio::test]
    async fn negative_delay_is_a_config_error() {
        let cli = Cli::try_parse_from(["transcribe", "a.pdf", "--inter-page-delay=-1"]).unwrap();
        assert!(build_config(&cli, None).await.is_err());
    }
}
