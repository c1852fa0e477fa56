//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use sieve_core::{AnalyseConfig, ProgressReporter, analyse};
use sieve_shared::{
    AnalyserConfig, AppConfig, FetchConfig, TranslationConfig, init_config, load_config,
    load_config_from,
};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// sieve: enrich crawled links into company records.
#[derive(Parser)]
#[command(
    name = "sieve",
    version,
    about = "Aggregate, filter and enrich crawled web links into company records.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.sieve/sieve.toml.
    #[arg(long, global = true, env = "SIEVE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Run the analyser over a crawler NDJSON file.
    Analyse {
        /// NDJSON file with one `{url, num_occurrences, loc}` object per line.
        input: PathBuf,

        /// Output file (defaults to <run_dir>/analyser/<results_file>).
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Keywords to classify titles/descriptions with (comma-separated).
        /// Replaces the configured keyword list.
        #[arg(short, long, value_delimiter = ',')]
        whitelist: Option<Vec<String>>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "sieve=info",
        1 => "sieve=debug",
        _ => "sieve=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt().json().with_env_filter(env_filter).init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Analyse {
            input,
            output,
            whitelist,
        } => cmd_analyse(config_path, input, output, whitelist).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

fn resolve_config(path: Option<&Path>) -> Result<AppConfig> {
    let config = match path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    Ok(config)
}

async fn cmd_analyse(
    config_path: Option<&Path>,
    input: PathBuf,
    output: Option<PathBuf>,
    whitelist: Option<Vec<String>>,
) -> Result<()> {
    let config = resolve_config(config_path)?;

    let mut analyser = AnalyserConfig::from(&config);
    if let Some(keywords) = whitelist {
        analyser.keywords = keywords;
    }

    let output = match output {
        Some(path) => path,
        None => config.output.results_path(Local::now())?,
    };

    info!(
        input = %input.display(),
        output = %output.display(),
        keywords = analyser.keywords.len(),
        "starting analyser run"
    );

    let analyse_config = AnalyseConfig {
        input,
        output,
        analyser,
        fetch: FetchConfig::from(&config),
        translation: TranslationConfig::from(&config),
    };

    let reporter = CliProgress::new();
    let result = analyse(&analyse_config, &reporter)
        .await
        .wrap_err("analyser run failed")?;

    // Print summary
    println!();
    println!("  Analysis complete!");
    println!("  Links read:  {}", result.records_in);
    if result.skipped > 0 {
        println!("  Skipped:     {} malformed line(s)", result.skipped);
    }
    println!("  Companies:   {}", result.records_out);
    println!("  Matches:     {}", result.matched);
    println!("  Output:      {}", result.output.display());
    println!(
        "  Time:        {:.1}s",
        Duration::from_millis(result.duration_ms).as_secs_f64()
    );
    println!();

    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn stage_started(&self, stage_id: u32, name: &str, position: usize, total: usize) {
        self.spinner
            .set_message(format!("[{position}/{total}] stage {stage_id}: {name}"));
    }

    fn stage_finished(&self, stage_id: u32, name: &str, records_out: usize, elapsed: Duration) {
        self.spinner.println(format!(
            "  ✓ {stage_id:>2} {name:<26} {records_out:>6} records  {:.1}s",
            elapsed.as_secs_f64()
        ));
    }

    fn done(&self, _records: usize) {
        self.spinner.finish_and_clear();
    }
}
