//! CLI binary for edgequake-pdftools.
//!
//! A thin shim over the library crate: maps CLI flags to a `ClientConfig`
//! and an `OptionsForm`, drives one `Controller` through select → upload →
//! submit → download, and prints the result.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_pdftools::{
    ClientConfig, Controller, FileHandle, FileSet, Notice, NoticeLevel, OptionsForm, Phase,
    ProcessingResult, SharedObserver, Thumbnail, Tool, ToolSpec, WorkflowObserver,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
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

// ── CLI observer using indicatif ─────────────────────────────────────────────

/// Terminal observer: one bar that shows upload as a spinner and processing
/// as a percentage, with notices and preview pages printed above it.
struct CliObserver {
    bar: ProgressBar,
    preview_dir: Option<PathBuf>,
    /// Preview files written so far.
    saved: Mutex<Vec<PathBuf>>,
}

impl CliObserver {
    fn new(preview_dir: Option<PathBuf>) -> Arc<Self> {
        let bar = ProgressBar::new(100);
        bar.set_style(Self::spinner_style());
        bar.set_prefix("Waiting");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            preview_dir,
            saved: Mutex::new(Vec::new()),
        })
    }

    fn spinner_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"])
    }

    fn bar_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}%  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"])
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl WorkflowObserver for CliObserver {
    fn on_tool_selected(&self, _tool: Tool, spec: &ToolSpec) {
        self.bar
            .println(format!("{} {}", cyan("◆"), bold(spec.title)));
    }

    fn on_files_selected(&self, files: &FileSet) {
        self.bar.println(format!("  {}", dim(&files.summary())));
    }

    fn on_phase_change(&self, _from: Phase, to: Phase) {
        match to {
            Phase::Uploading => {
                self.bar.set_style(Self::spinner_style());
                self.bar.set_prefix("Uploading");
            }
            Phase::Processing => {
                self.bar.set_style(Self::bar_style());
                self.bar.set_prefix("Processing");
                self.bar.set_position(0);
                self.bar.reset_elapsed();
            }
            other => self.bar.set_prefix(other.to_string()),
        }
    }

    fn on_progress(&self, percent: f64) {
        self.bar.set_position(percent.round() as u64);
    }

    fn on_preview_page(&self, thumbnail: &Thumbnail) {
        let Some(ref dir) = self.preview_dir else {
            return;
        };
        let path = dir.join(format!("page-{}.png", thumbnail.page_num));
        match std::fs::write(&path, &thumbnail.png) {
            Ok(()) => {
                self.bar.println(format!(
                    "  {} {}  {}",
                    green("✓"),
                    thumbnail.caption(),
                    dim(&format!("{}×{} → {}", thumbnail.width, thumbnail.height, path.display()))
                ));
                if let Ok(mut saved) = self.saved.lock() {
                    saved.push(path);
                }
            }
            Err(e) => self.bar.println(format!(
                "  {} {}  {}",
                red("✗"),
                thumbnail.caption(),
                red(&e.to_string())
            )),
        }
    }

    fn on_preview_overflow(&self, remaining: usize) {
        self.bar
            .println(format!("  {}", dim(&format!("+ {remaining} more pages..."))));
    }

    fn on_notice(&self, notice: &Notice) {
        let mark = match notice.level {
            NoticeLevel::Success => green("✔"),
            NoticeLevel::Error => red("✘"),
        };
        self.bar.println(format!("{mark} {}", notice.message));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Compress with the strongest setting
  pdftools --tool compress --level 3 report.pdf -o report.min.pdf

  # Merge several documents, in order
  pdftools --tool merge a.pdf b.pdf c.pdf -o merged.pdf

  # Extract pages
  pdftools --tool split --page-range 1-3,5 book.pdf -o parts.zip

  # Password-protect (prompts are not interactive; pass both flags)
  pdftools --tool lock --password s3cret --confirm-password s3cret doc.pdf -o locked.pdf

  # Convert, saving preview thumbnails of the first pages
  pdftools --tool convert --format docx --preview-dir ./previews doc.pdf -o doc.docx

  # Machine-readable result
  pdftools --tool compress --json report.pdf

TOOLS:
  compress   Reduce file size           --level 1|2|3 (default 2)
  merge      Combine PDFs into one      (no options)
  split      Extract page ranges        --page-range N[-M][,N[-M]...]
  lock       Protect with a password    --password P --confirm-password P
  convert    Convert to another format  --format F [--quality Q]

ENVIRONMENT VARIABLES:
  PDFTOOLS_SERVER         Processing service base URL
  PDFTOOLS_TOOL           Default tool id
  PDFIUM_LIB_PATH         Path to libpdfium, used for --preview-dir
  RUST_LOG                Override log filter (e.g. edgequake_pdftools=debug)
"#;

/// Compress, merge, split, lock and convert PDFs through a processing service.
#[derive(Parser, Debug)]
#[command(
    name = "pdftools",
    version,
    about = "Compress, merge, split, lock and convert PDFs through a processing service",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Files to upload, in order.
    #[arg(required_unless_present = "list_tools")]
    files: Vec<PathBuf>,

    /// Tool to run: compress, merge, split, lock, convert.
    #[arg(short, long, env = "PDFTOOLS_TOOL", value_parser = parse_tool,
          required_unless_present = "list_tools")]
    tool: Option<Tool>,

    /// Compression level for `compress`: 1 (low) … 3 (high).
    #[arg(long, env = "PDFTOOLS_LEVEL")]
    level: Option<String>,

    /// Page ranges for `split`, e.g. `1-3,5`.
    #[arg(long, env = "PDFTOOLS_PAGE_RANGE")]
    page_range: Option<String>,

    /// Password for `lock`.
    #[arg(long, env = "PDFTOOLS_PASSWORD")]
    password: Option<String>,

    /// Password confirmation for `lock`. Defaults to `--password`.
    #[arg(long)]
    confirm_password: Option<String>,

    /// Target format for `convert`.
    #[arg(long, env = "PDFTOOLS_FORMAT")]
    format: Option<String>,

    /// Image quality for `convert`.
    #[arg(long, env = "PDFTOOLS_QUALITY")]
    quality: Option<String>,

    /// Save the result here. Without it the result is only reported.
    #[arg(short, long, env = "PDFTOOLS_OUTPUT")]
    output: Option<PathBuf>,

    /// Render preview thumbnails of the first PDF into this directory.
    #[arg(long, env = "PDFTOOLS_PREVIEW_DIR")]
    preview_dir: Option<PathBuf>,

    /// Processing service base URL.
    #[arg(long, env = "PDFTOOLS_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,

    /// List the available tools and their options, then exit.
    #[arg(long)]
    list_tools: bool,

    /// Print the result as JSON.
    #[arg(long, env = "PDFTOOLS_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "PDFTOOLS_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PDFTOOLS_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PDFTOOLS_QUIET")]
    quiet: bool,

    /// Upload timeout in seconds.
    #[arg(long, env = "PDFTOOLS_UPLOAD_TIMEOUT", default_value_t = 300)]
    upload_timeout: u64,

    /// Processing timeout in seconds.
    #[arg(long, env = "PDFTOOLS_PROCESS_TIMEOUT", default_value_t = 600)]
    process_timeout: u64,

    /// Result download timeout in seconds.
    #[arg(long, env = "PDFTOOLS_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,
}

fn parse_tool(s: &str) -> Result<Tool, String> {
    Tool::from_id(s).ok_or_else(|| {
        let known: Vec<&str> = Tool::ALL.iter().map(|t| t.id()).collect();
        format!("unknown tool '{s}' (expected one of: {})", known.join(", "))
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // Suppress INFO-level library logs when the progress bar is active;
    // the bar and the notices carry what matters to the user.
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

    if cli.list_tools {
        return list_tools(cli.json);
    }

    let tool = cli.tool.context("--tool is required")?;
    let config = build_config(&cli)?;

    if let Some(ref dir) = cli.preview_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .with_context(|| format!("Failed to create preview directory {:?}", dir))?;
    }

    let observer = show_progress.then(|| CliObserver::new(cli.preview_dir.clone()));
    let mut controller = Controller::new(config).context("Failed to create controller")?;
    if let Some(ref obs) = observer {
        controller = controller.with_observer(Arc::clone(obs) as SharedObserver);
    }

    // ── Select ───────────────────────────────────────────────────────────
    controller.select_tool(tool.id());

    let mut files = Vec::with_capacity(cli.files.len());
    for path in &cli.files {
        files.push(
            FileHandle::from_path(path)
                .await
                .with_context(|| format!("Failed to read {:?}", path))?,
        );
    }
    controller.select_files(files);
    if cli.preview_dir.is_some() {
        controller.settle().await;
    } else {
        wait_for_upload(&mut controller).await;
    }

    let state = controller.state();
    if state.phase() != Phase::Ready {
        finish(&observer);
        anyhow::bail!(
            "Upload failed: {}",
            state.last_error().unwrap_or("unknown error")
        );
    }

    // ── Process ──────────────────────────────────────────────────────────
    let form = build_form(&cli);
    if let Err(e) = controller.submit(&form) {
        finish(&observer);
        anyhow::bail!("{e}");
    }
    wait_for_processing(&mut controller).await;
    finish(&observer);

    let state = controller.state();
    let result = state
        .last_result()
        .cloned()
        .context("Processing finished without a result")?;

    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&result).context("Failed to serialise result")?
        );
    } else if !cli.quiet {
        print_result(&result);
    }

    if state.phase() != Phase::Succeeded {
        anyhow::bail!(
            "Processing failed: {}",
            state.last_error().unwrap_or("unknown error")
        );
    }

    // ── Download ─────────────────────────────────────────────────────────
    if let Some(ref output_path) = cli.output {
        let written = controller
            .download_to(output_path)
            .await
            .context("Download failed")?;
        if !cli.quiet && !cli.json {
            eprintln!(
                "{}  {}  →  {}",
                green("✔"),
                dim(&edgequake_pdftools::format_size(written)),
                bold(&output_path.display().to_string()),
            );
        }
    }

    if let Some(ref obs) = observer {
        if let Ok(saved) = obs.saved.lock() {
            if !saved.is_empty() && !cli.quiet {
                eprintln!("{}", dim(&format!("{} preview page(s) saved", saved.len())));
            }
        }
    }

    Ok(())
}

/// Step until the upload resolves. Preview completions for the same file set
/// are applied along the way.
async fn wait_for_upload(controller: &mut Controller) {
    while controller.state().phase() == Phase::Uploading {
        if !controller.step().await {
            break;
        }
    }
}

/// Step until the processing attempt resolves.
async fn wait_for_processing(controller: &mut Controller) {
    while controller.state().phase().is_in_flight() {
        if !controller.step().await {
            break;
        }
    }
}

fn finish(observer: &Option<Arc<CliObserver>>) {
    if let Some(obs) = observer {
        obs.finish();
    }
}

/// Map CLI args to `ClientConfig`.
fn build_config(cli: &Cli) -> Result<ClientConfig> {
    ClientConfig::builder()
        .base_url(&cli.server)
        .upload_timeout_secs(cli.upload_timeout)
        .process_timeout_secs(cli.process_timeout)
        .download_timeout_secs(cli.download_timeout)
        .preview_max_pages(if cli.preview_dir.is_some() { 3 } else { 0 })
        .build()
        .context("Invalid configuration")
}

/// Map option flags to the raw form the submission gate validates.
fn build_form(cli: &Cli) -> OptionsForm {
    OptionsForm {
        level: cli.level.clone(),
        page_range: cli.page_range.clone(),
        password: cli.password.clone(),
        confirm_password: cli
            .confirm_password
            .clone()
            .or_else(|| cli.password.clone()),
        format: cli.format.clone(),
        quality: cli.quality.clone(),
    }
}

fn print_result(result: &ProcessingResult) {
    if result.success {
        eprintln!("Original size:  {}", result.original_size_label());
        eprintln!("New size:       {}", result.new_size_label());
        eprintln!("Reduction:      {}", result.reduction_label());
        if let Some(ref location) = result.download_location {
            eprintln!("Download:       {}", dim(location));
        }
    } else if let Some(ref message) = result.message {
        eprintln!("{} {}", red("✘"), message);
    }
}

fn list_tools(json: bool) -> Result<()> {
    let specs: Vec<&ToolSpec> = Tool::ALL.iter().map(|t| t.spec()).collect();
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&specs).context("Failed to serialise tools")?
        );
        return Ok(());
    }
    for spec in specs {
        println!("{:<10} {}", bold(spec.tool.id()), spec.title);
        println!("           {}", dim(spec.description));
        for field in spec.fields {
            println!(
                "           --{:<18} {}{}",
                field.name.replace('_', "-"),
                field.label,
                if field.required { " (required)" } else { "" }
            );
        }
    }
    Ok(())
}
