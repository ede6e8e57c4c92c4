use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "logferry")]
#[command(about = "Incremental log feed to ordered log stream synchronizer", long_about = None)]
struct Cli {
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one synchronization pass
    Run,
    State {
        #[command(subcommand)]
        action: StateAction,
    },
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum StateAction {
    /// Show the stored watermark and write token
    Show,
    /// Overwrite the watermark and clear the write token
    Reset {
        #[arg(long, default_value_t = 0)]
        watermark: i64,
    },
    /// Store the feed API key in the parameter store
    SetCredential { value: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    Init {
        #[arg(long)]
        stdout: bool,
    },
    Validate,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries the run result
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "logferry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Err(e) = dispatch(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = logferry::config::resolve_config_path(cli.config.as_deref());

    match cli.command {
        Some(Commands::Run) | None => logferry::cli::run::run(config_path).await?,
        Some(Commands::State { action }) => match action {
            StateAction::Show => logferry::cli::state::show(config_path).await?,
            StateAction::Reset { watermark } => {
                logferry::cli::state::reset(config_path, watermark).await?
            }
            StateAction::SetCredential { value } => {
                logferry::cli::state::set_credential(config_path, value).await?
            }
        },
        Some(Commands::Config { action }) => match action {
            ConfigAction::Init { stdout } => logferry::cli::config::init(stdout)?,
            ConfigAction::Validate => logferry::cli::config::validate(config_path)?,
        },
    }

    Ok(())
}
