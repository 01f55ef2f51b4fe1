//! ddbook CLI - convert D&D Beyond sourcebooks to Markdown

use clap::{Parser, Subcommand, ValueEnum};
use ddbook::{Chapter, ChapterOutcome, ConvertError, Pipeline, PipelineBuilder, RunReport};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Output format for the run summary
#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    /// Human-readable Markdown summary
    #[default]
    Md,
    /// JSON report
    Json,
}

/// ddbook - convert a web-hosted sourcebook into Markdown documents
#[derive(Parser, Debug)]
#[command(name = "ddbook")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging (overridden by RUST_LOG)
    #[arg(long, short, global = true)]
    verbose: bool,
}

/// Options shared by every subcommand that fetches pages
#[derive(clap::Args, Debug)]
struct FetchArgs {
    /// External program invoked as `<program> <url> <output-path>`
    #[arg(long, env = "DDB_FETCH_TOOL")]
    fetch_tool: Option<PathBuf>,

    /// Directory holding cached pages (default: system temp dir)
    #[arg(long, env = "DDB_CACHE_DIR")]
    cache_dir: Option<PathBuf>,

    /// Fetch timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Custom User-Agent for HTTP requests
    #[arg(long)]
    user_agent: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert chapters into <OUTPUT_DIR>; all chapters are discovered when none are given
    Convert {
        /// Sourcebook base URL, e.g. https://www.dndbeyond.com/sources/dnd/doip
        base_url: String,

        /// Output directory for documents and images
        output_dir: PathBuf,

        /// Chapters as `slug` or `slug:filename`
        chapters: Vec<Chapter>,

        #[command(flatten)]
        fetch: FetchArgs,

        /// Summary format
        #[arg(long, short, default_value = "md")]
        output: OutputFormat,
    },
    /// List the chapters linked from the overview page without converting
    Discover {
        /// Sourcebook base URL
        base_url: String,

        #[command(flatten)]
        fetch: FetchArgs,

        /// Output format
        #[arg(long, short, default_value = "md")]
        output: OutputFormat,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Convert {
            base_url,
            output_dir,
            chapters,
            fetch,
            output,
        } => run_convert(&base_url, output_dir, chapters, fetch, output).await,
        Commands::Discover {
            base_url,
            fetch,
            output,
        } => run_discover(&base_url, fetch, output).await,
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn build_pipeline(fetch: FetchArgs) -> Pipeline {
    let mut builder: PipelineBuilder =
        Pipeline::builder().timeout(Duration::from_secs(fetch.timeout));
    if let Some(tool) = fetch.fetch_tool {
        builder = builder.fetch_program(tool);
    }
    if let Some(dir) = fetch.cache_dir {
        builder = builder.cache_dir(dir);
    }
    if let Some(ua) = fetch.user_agent {
        builder = builder.user_agent(ua);
    }

    builder.build().unwrap_or_else(|e| {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    })
}

/// Strip trailing slashes and reject URLs without a sourcebook path
fn normalize_base_url(base_url: &str) -> String {
    let base_url = base_url.trim_end_matches('/').to_string();
    if let Err(e) = ddbook::sourcebook_slug(&base_url) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    base_url
}

async fn resolve_or_exit(pipeline: &Pipeline, base_url: &str, explicit: Vec<Chapter>) -> Vec<Chapter> {
    match pipeline.resolve_chapters(base_url, explicit).await {
        Ok(chapters) if chapters.is_empty() => {
            eprintln!("Error: no chapters found on {}", base_url);
            std::process::exit(1);
        }
        Ok(chapters) => chapters,
        Err(e @ ConvertError::MalformedChapter { .. }) => {
            eprintln!("Error: {}", e);
            std::process::exit(2);
        }
        Err(e) => {
            eprintln!("Error: could not fetch overview page: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_convert(
    base_url: &str,
    output_dir: PathBuf,
    chapters: Vec<Chapter>,
    fetch: FetchArgs,
    output: OutputFormat,
) {
    let base_url = normalize_base_url(base_url);
    let pipeline = build_pipeline(fetch);
    let chapters = resolve_or_exit(&pipeline, &base_url, chapters).await;

    let report = match pipeline.run(&base_url, &output_dir, &chapters).await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    match output {
        OutputFormat::Md => writeln_safe(&format_report_md(&report)),
        OutputFormat::Json => writeln_safe(&to_json(&report)),
    }
}

async fn run_discover(base_url: &str, fetch: FetchArgs, output: OutputFormat) {
    let base_url = normalize_base_url(base_url);
    let pipeline = build_pipeline(fetch);
    let chapters = resolve_or_exit(&pipeline, &base_url, Vec::new()).await;

    match output {
        OutputFormat::Md => writeln_safe(&format_chapters_md(&chapters)),
        OutputFormat::Json => writeln_safe(&to_json(&chapters)),
    }
}

fn to_json<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| {
        eprintln!("Error serializing output: {}", e);
        std::process::exit(1);
    })
}

/// Format discovered chapters as a Markdown list
fn format_chapters_md(chapters: &[Chapter]) -> String {
    let mut output = String::new();
    for chapter in chapters {
        output.push_str(&format!("- {} -> {}\n", chapter.slug, chapter.filename));
    }
    output.push_str(&format!("\nFound {} chapters.", chapters.len()));
    output
}

/// Format a run report as Markdown
fn format_report_md(report: &RunReport) -> String {
    let mut output = String::new();
    output.push_str(&format!("# {}\n\n", report.base_url));
    for outcome in &report.chapters {
        match outcome {
            ChapterOutcome::Written {
                slug,
                filename,
                chars,
                images_downloaded,
                images_skipped,
                images_failed,
            } => {
                output.push_str(&format!(
                    "- {} -> {} ({} chars, images: {} downloaded, {} present",
                    slug, filename, chars, images_downloaded, images_skipped
                ));
                if *images_failed > 0 {
                    output.push_str(&format!(", {} failed", images_failed));
                }
                output.push_str(")\n");
            }
            ChapterOutcome::Skipped { slug, reason } => {
                output.push_str(&format!("- {} skipped: {}\n", slug, reason));
            }
        }
    }
    output.push_str(&format!(
        "\nDone! Processed {} chapters ({} written, {} skipped).\nOutput directory: {}",
        report.chapters.len(),
        report.written(),
        report.skipped(),
        report.output_dir
    ));
    output
}

/// Write to stdout, exit silently on broken pipe
fn writeln_safe(s: &str) {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    if let Err(e) = writeln!(handle, "{}", s) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            std::process::exit(0);
        }
        eprintln!("Error writing to stdout: {}", e);
        std::process::exit(1);
    }
}
