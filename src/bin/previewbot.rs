//! CLI binary for cpdl-previewbot.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `BotConfig`, runs the bot and prints a summary.

use anyhow::{Context, Result};
use clap::Parser;
use cpdl_previewbot::{
    run, BotConfig, BotProgressCallback, Credentials, ExternalTools, MediaWikiClient,
    ProgressCallback,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
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

/// Terminal progress callback: one bar for the whole run plus a log line per
/// PDF. Files are processed one at a time, so a single start time suffices.
struct CliProgressCallback {
    bar: ProgressBar,
    file_started: Mutex<Option<Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    /// Spinner until `on_run_start` reports how many PDFs there are.
    fn new_dynamic() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading page…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            file_started: Mutex::new(None),
            errors: AtomicUsize::new(0),
        })
    }

    fn activate_bar(&self, total: usize) {
        let progress_style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} PDFs  \
             ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total as u64);
        self.bar.set_style(progress_style);
        self.bar.set_prefix("Previewing");
    }

    fn elapsed_secs(&self) -> f64 {
        self.file_started
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take()
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl BotProgressCallback for CliProgressCallback {
    fn on_run_start(&self, editions: usize, total_files: usize) {
        self.activate_bar(total_files);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!(
                "{editions} editions, {total_files} PDFs to preview…"
            ))
        ));
    }

    fn on_file_start(&self, _index: usize, _total: usize, link: &str) {
        *self.file_started.lock().unwrap_or_else(|e| e.into_inner()) = Some(Instant::now());
        self.bar.set_message(link.to_string());
    }

    fn on_file_complete(&self, index: usize, total: usize, link: &str) {
        let secs = self.elapsed_secs();
        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}",
            green("✓"),
            index,
            total,
            link,
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_file_error(&self, index: usize, total: usize, link: &str, error: &str) {
        let secs = self.elapsed_secs();
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg = if error.chars().count() > 80 {
            let cut: String = error.chars().take(79).collect();
            format!("{cut}\u{2026}")
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} {:>3}/{:<3}  {}  {}  {}",
            red("✗"),
            index,
            total,
            link,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.abandon();
    }

    fn on_run_complete(&self, total_files: usize, saved: bool) {
        self.bar.finish_and_clear();
        if self.errors.load(Ordering::SeqCst) == 0 {
            eprintln!(
                "{} {} previews ready{}",
                green("✔"),
                bold(&total_files.to_string()),
                if saved { "" } else { " (dry run, page not saved)" }
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Add previews to a page and save it
  previewbot "Ave verum corpus (William Byrd)"

  # Dry run: build the new text, write it to a file, save nothing
  previewbot --no-save -o new.txt "Ave verum corpus (William Byrd)"

  # Read a local copy of the page and save the result to a sandbox page
  previewbot --snapshot page.txt --target "User:PreviewBot/Sandbox" "Ave verum corpus (William Byrd)"

  # Full run summary as JSON
  previewbot --json --no-progress "Ave verum corpus (William Byrd)" > run.json

CREDENTIALS:
  A file holding the bot's username and password separated by whitespace.
  Default location: ~/.config/cpdl (or the platform config directory).

EXTERNAL TOOLS:
  pdftoppm   (poppler-utils)  renders page 1 of each PDF to PNG
  convert    (ImageMagick)    crops the top of the rendered page

  Downloaded PDFs and previews are kept in the work directory, keyed by the
  SHA-1 of the PDF, and reused on later runs.

ENVIRONMENT VARIABLES:
  Every option can also be set with PREVIEWBOT_<OPTION>, e.g.
  PREVIEWBOT_API_URL, PREVIEWBOT_WORKDIR, PREVIEWBOT_CREDENTIALS.
  RUST_LOG overrides the log filter.
"#;

/// Add first-page score previews to a CPDL wiki page.
#[derive(Parser, Debug)]
#[command(
    name = "previewbot",
    version,
    about = "Add first-page score previews to a CPDL wiki page",
    long_about = "Render the top of the first page of every PDF score listed on a CPDL work \
page, upload the previews and insert a gallery of them above the page's \
==General Information== section.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Title of the page to scan.
    page: String,

    /// Read the page text from this file instead of the wiki.
    #[arg(long, env = "PREVIEWBOT_SNAPSHOT")]
    snapshot: Option<PathBuf>,

    /// Save the result to this page instead of the scanned one.
    #[arg(long, env = "PREVIEWBOT_TARGET")]
    target: Option<String>,

    /// Dry run: do everything except saving the page.
    #[arg(long, env = "PREVIEWBOT_NO_SAVE")]
    no_save: bool,

    /// Also write the resulting page text to this file.
    #[arg(short, long, env = "PREVIEWBOT_OUTPUT")]
    output: Option<PathBuf>,

    /// Directory for downloaded PDFs and rendered previews.
    #[arg(long, env = "PREVIEWBOT_WORKDIR", default_value = "previews")]
    workdir: PathBuf,

    /// Credentials file (username and password). Default: <config dir>/cpdl.
    #[arg(long, env = "PREVIEWBOT_CREDENTIALS")]
    credentials: Option<PathBuf>,

    /// MediaWiki Action API endpoint.
    #[arg(long, env = "PREVIEWBOT_API_URL", default_value = cpdl_previewbot::config::DEFAULT_API_URL)]
    api_url: String,

    /// Edit summary for the save.
    #[arg(long, env = "PREVIEWBOT_SUMMARY", default_value = cpdl_previewbot::config::DEFAULT_SUMMARY)]
    summary: String,

    /// Rasteriser executable (pdftoppm-compatible).
    #[arg(long, env = "PREVIEWBOT_RASTERIZER", default_value = "pdftoppm")]
    rasterizer: String,

    /// Crop executable (ImageMagick convert-compatible).
    #[arg(long, env = "PREVIEWBOT_CROPPER", default_value = "convert")]
    cropper: String,

    /// HTTP request timeout in seconds.
    #[arg(long, env = "PREVIEWBOT_HTTP_TIMEOUT", default_value_t = 120)]
    http_timeout: u64,

    /// Print the run output (editions, previews, stats) as JSON on stdout.
    #[arg(long, env = "PREVIEWBOT_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PREVIEWBOT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PREVIEWBOT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PREVIEWBOT_QUIET")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless --verbose is given.
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

    // ── Credentials ──────────────────────────────────────────────────────
    let credentials_path = match cli.credentials.clone() {
        Some(path) => path,
        None => Credentials::default_path()
            .context("No config directory on this platform; pass --credentials")?,
    };
    let credentials = Credentials::load(&credentials_path)
        .with_context(|| format!("Failed to load credentials from {:?}", credentials_path))?;

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        let cb = CliProgressCallback::new_dynamic();
        Some(cb as Arc<dyn BotProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run ──────────────────────────────────────────────────────────────
    let client = MediaWikiClient::new(&config).context("Failed to set up wiki client")?;
    let tools = ExternalTools::from_config(&config);
    let output = run(&client, &tools, &credentials, &config)
        .await
        .context("Preview run failed")?;

    if let Some(ref path) = cli.output {
        tokio::fs::write(path, &output.text)
            .await
            .with_context(|| format!("Failed to write page text to {:?}", path))?;
    }

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    }

    // ── Summary ──────────────────────────────────────────────────────────
    if !cli.quiet && !cli.json {
        let stats = &output.stats;
        eprintln!(
            "{}  {} editions  {} PDFs  {}ms  →  {}",
            if output.saved { green("✔") } else { cyan("◇") },
            stats.editions,
            stats.pdf_links,
            stats.total_duration_ms,
            bold(&if output.saved {
                output.target_page.clone()
            } else {
                format!("{} (not saved)", output.target_page)
            }),
        );
        eprintln!(
            "   {} downloaded / {} cached  ·  {} uploaded / {} already on wiki",
            dim(&stats.downloads.to_string()),
            dim(&stats.cache_hits.to_string()),
            dim(&stats.uploads.to_string()),
            dim(&stats.uploads_skipped.to_string()),
        );
        if let Some(ref path) = cli.output {
            eprintln!("   page text written to {}", bold(&path.display().to_string()));
        }
    }

    Ok(())
}

/// Map CLI args to `BotConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<BotConfig> {
    let mut builder = BotConfig::builder(cli.page.clone())
        .api_url(cli.api_url.clone())
        .workdir(cli.workdir.clone())
        .save(!cli.no_save)
        .summary(cli.summary.clone())
        .rasterizer(cli.rasterizer.clone())
        .cropper(cli.cropper.clone())
        .http_timeout_secs(cli.http_timeout);

    if let Some(ref path) = cli.snapshot {
        builder = builder.snapshot(path.clone());
    }
    if let Some(ref target) = cli.target {
        builder = builder.target_page(target.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
