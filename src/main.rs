//! meshroute - Traffic-management mutations for service-mesh routing resources

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;

use cli::OutputFormat;
use meshroute::errors::format_error;
use meshroute::store::filesystem::default_store_path;
use meshroute::{Action, FilesystemStore, RouteEngine, Settings};

/// meshroute - Apply traffic-management behaviors to mesh routing resources
#[derive(Parser)]
#[command(
    name = "meshroute",
    version,
    about = "Apply traffic-management behaviors to service-mesh routing resources",
    long_about = "meshroute mutates a routing resource (VirtualService) or creates a policy \
                  resource (DestinationRule) to realize one behavior per invocation.\n\n\
                  Actions:\n\
                  • header-override  route a header value to a rewritten path and subset\n\
                  • traffic-split    weighted v1/v2 split\n\
                  • delay-fault      inject a fixed delay for test traffic\n\
                  • traffic-mirror   mirror traffic to a second subset\n\
                  • timeout          request timeout on the target path\n\
                  • retry-policy     retries on the target path\n\
                  • circuit-breaker  connection limits and outlier ejection"
)]
struct Cli {
    /// Action to apply
    #[arg(required_unless_present = "show_settings")]
    action: Option<String>,

    /// Path to a TOML settings file with a [settings] table
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override a setting (repeatable), e.g. --set weight1=50
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE")]
    set: Vec<String>,

    /// Directory holding resource documents (defaults to ~/.meshroute/store)
    #[arg(long)]
    store_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Print resolved settings and exit
    #[arg(long)]
    show_settings: bool,

    /// Verbosity level (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all logging except errors
    #[arg(short, long)]
    quiet: bool,
}

fn init_logging(verbosity: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbosity {
            0 => EnvFilter::new("meshroute=warn"),
            1 => EnvFilter::new("meshroute=info"),
            2 => EnvFilter::new("meshroute=debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let settings = Settings::resolve(cli.config.as_deref(), cli.set.as_slice())?;

    if cli.show_settings {
        return cli::print_settings(&settings, cli.format);
    }

    // Selector is validated before any store access
    let Some(selector) = cli.action.as_deref() else {
        anyhow::bail!("an action is required; run 'meshroute --help' to list actions");
    };
    let action: Action = selector.parse()?;

    let store_dir = cli.store_dir.unwrap_or_else(default_store_path);
    debug!("Using store at {}", store_dir.display());

    let engine = RouteEngine::new(FilesystemStore::new(store_dir), settings);
    let outcome = engine.apply(action).await?;

    cli::print_outcome(&outcome, cli.format)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_logging(cli.verbose, cli.quiet);

    if let Err(err) = run(cli).await {
        eprintln!("{} {}", "✖".red(), format_error(&err));
        std::process::exit(1);
    }
}
