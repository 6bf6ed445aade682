//! AI Prediction CLI

use aiprediction_client::PredictionClient;
use aiprediction_core::{normalize, ApiConfig, DateId, SnapshotSummary, DEFAULT_BASE_URL};
use aiprediction_mcp::McpServer;
use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::EnvFilter;

const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 20;

const MAX_PROBE_DAYS: i64 = 3650;

/// Number of last-elements fields shown in the startup summary
const SAMPLE_FIELDS: usize = 3;

/// Initialize logging with the specified verbosity level.
///
/// Logs always go to stderr: stdout carries the MCP protocol.
fn init_logging(verbose: u8, quiet: bool, json: bool) -> Result<()> {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter =
        EnvFilter::from_default_env().add_directive(format!("aiprediction={}", level).parse()?);

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(verbose >= 1)
        .with_file(verbose >= 2)
        .with_line_number(verbose >= 2);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "aiprediction")]
#[command(about = "MCP server for the AI Prediction API")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    api: ApiArgs,

    /// Increase verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output logs as JSON (for machine parsing)
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Args)]
struct ApiArgs {
    /// Base URL of the prediction API
    #[arg(long, env = "API_BASE_URL", default_value = DEFAULT_BASE_URL, global = true)]
    base_url: String,

    /// API username
    #[arg(long, env = "API_USERNAME", global = true)]
    username: Option<String>,

    /// API password
    #[arg(long, env = "API_PASSWORD", hide_env_values = true, global = true)]
    password: Option<String>,

    /// Request timeout in seconds
    #[arg(long, env = "API_TIMEOUT_SECS", default_value_t = 30, global = true)]
    timeout_secs: u64,

    /// Connection timeout in seconds
    #[arg(long, env = "API_CONNECT_TIMEOUT_SECS", default_value_t = 10, global = true)]
    connect_timeout_secs: u64,
}

impl ApiArgs {
    fn to_config(&self) -> ApiConfig {
        ApiConfig::new(&self.base_url)
            .with_credentials(self.username.clone(), self.password.clone())
            .with_timeouts(self.timeout_secs, self.connect_timeout_secs)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Serve MCP over stdio (default)
    Serve(ServeArgs),
    /// Exercise the API step by step and print what comes back
    Probe {
        /// Number of previous days to check
        #[arg(long, default_value_t = 5, value_parser = clap::value_parser!(u32).range(0..=MAX_PROBE_DAYS))]
        days: u32,
    },
    /// Convert a date to YYMMDD format
    FormatDate {
        /// Year (e.g. 2024 or 24)
        #[arg(allow_negative_numbers = true)]
        year: i32,
        /// Month (1-12)
        month: u32,
        /// Day (1-31)
        day: u32,
    },
}

#[derive(Args)]
struct ServeArgs {
    /// Upper bound for the startup authentication check
    #[arg(long, default_value_t = DEFAULT_PROBE_TIMEOUT_SECS)]
    probe_timeout_secs: u64,

    /// Start serving without the startup authentication check
    #[arg(long)]
    skip_probe: bool,
}

impl Default for ServeArgs {
    fn default() -> Self {
        Self {
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            skip_probe: false,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env before parsing so clap's env fallbacks see it
    let env_file = dotenv::dotenv().ok();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet, cli.log_json)?;

    if let Some(path) = env_file {
        debug!(path = %path.display(), ".env file loaded");
    }

    let config = cli.api.to_config();

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => run_serve(config, args).await?,
        Commands::Probe { days } => run_probe(config, days).await?,
        Commands::FormatDate { year, month, day } => {
            let did = normalize(Some(year), Some(month), Some(day))?;
            println!("{}", did);
        }
    }

    Ok(())
}

async fn run_serve(config: ApiConfig, args: ServeArgs) -> Result<()> {
    let client = Arc::new(PredictionClient::new(config)?);

    if !args.skip_probe {
        let probe = startup_probe(&client);
        if tokio::time::timeout(Duration::from_secs(args.probe_timeout_secs), probe)
            .await
            .is_err()
        {
            warn!(
                timeout_secs = args.probe_timeout_secs,
                "Startup check timed out, serving anyway"
            );
        }
    }

    let server = McpServer::new(client.clone());

    tokio::select! {
        result = server.serve_stdio() => result?,
        _ = tokio::signal::ctrl_c() => info!("Interrupted, shutting down"),
    }

    Ok(())
}

/// Check credentials, authenticate and fetch today's data once.
///
/// Failures are logged only; the server keeps running so the client can
/// still list tools and see error text from calls.
async fn startup_probe(client: &PredictionClient) {
    info!(base_url = %client.config().base_url, "Starting AI Prediction MCP Server");

    if let Err(e) = client.config().credentials() {
        error!("{}", e);
        error!("Every API call will fail until credentials are configured");
        return;
    }

    if !client.authenticate().await {
        error!("Authentication failed - MCP server will not work properly");
        return;
    }

    let did = DateId::today();
    match client.get_last_elements(&did).await {
        Ok(data) => log_snapshot(&did, &data),
        Err(e) => warn!(
            did = %did,
            error = %e,
            "Could not retrieve today's data, this might be normal if none exists yet"
        ),
    }
}

fn log_snapshot(did: &DateId, data: &Value) {
    let summary = SnapshotSummary::from_response(data);
    info!(
        did = %did,
        remote_did = ?summary.did,
        id = ?summary.id,
        last_ctime = ?summary.last_ctime,
        lookup_method = ?summary.lookup_method,
        "Retrieved today's data"
    );

    if summary.total() == 0 {
        warn!("No last_elements data found");
        return;
    }

    for (field, value) in summary.sample(SAMPLE_FIELDS) {
        info!("  {}: {}", field, value);
    }

    let remaining = summary.total().saturating_sub(SAMPLE_FIELDS);
    if remaining > 0 {
        info!("  ... and {} more fields", remaining);
    }
}

async fn run_probe(config: ApiConfig, days: u32) -> Result<()> {
    println!("Testing API: {}", config.base_url);
    println!("Username: {}", config.username.as_deref().unwrap_or("NOT SET"));
    println!("Password: {}", config.masked_password());
    println!();

    let client = PredictionClient::new(config)?;

    println!("Step 1: Authentication");
    if !client.authenticate().await {
        anyhow::bail!("Authentication failed");
    }
    println!("  Token received");
    println!();

    let today = DateId::today();
    println!("Step 2: Data for current date {}", today);
    match client.get_last_elements(&today).await {
        Ok(data) => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            print_analysis(&SnapshotSummary::from_response(&data));
        }
        Err(e) => println!("  Data request failed: {}", e),
    }
    println!();

    println!("Step 3: Previous {} days", days);
    for offset in 1..=days {
        let did = DateId::days_ago(offset)?;
        match client.get_last_elements(&did).await {
            Ok(data) => {
                let summary = SnapshotSummary::from_response(&data);
                println!(
                    "  {}: {}/{} fields have data",
                    did,
                    summary.non_null_count(),
                    summary.total()
                );
                if let Some((field, value)) = summary.first_non_null() {
                    println!("    Example: {} = {}", field, value);
                }
            }
            Err(e) => println!("  {}: {}", did, e),
        }
    }
    println!();

    println!("Step 4: Debug endpoint");
    match client.get_debug_info().await {
        Ok(data) => println!("{}", serde_json::to_string_pretty(&data)?),
        Err(e) => println!("  Debug failed: {}", e),
    }

    Ok(())
}

fn print_analysis(summary: &SnapshotSummary) {
    if summary.total() == 0 {
        println!("  No last_elements data found");
        return;
    }

    println!("  Last elements:");
    for (field, value) in &summary.fields {
        let marker = if value.is_null() { "missing" } else { "ok" };
        println!("    {}: {} ({})", field, value, marker);
    }
    println!(
        "  Non-null fields: {}, null fields: {}, total: {}",
        summary.non_null_count(),
        summary.null_count(),
        summary.total()
    );
}
