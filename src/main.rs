use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use heartline::api::{ApiServer, ApiState};
use heartline::{Config, EmotionClassifier};

/// Heartline - Emotion-aware voice companion backend
#[derive(Parser)]
#[command(name = "heartline", version, about)]
struct Cli {
    /// Port to listen on (overrides configuration)
    #[arg(long)]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve,
    /// Classify the emotion of a piece of text
    Classify {
        /// Text to classify
        text: String,
    },
    /// Show the effective voice profile
    Voices,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set
    let filter = match cli.verbose {
        0 => "info,heartline=info",
        1 => "info,heartline=debug",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(cli.port).await,
        Command::Classify { text } => classify(&text),
        Command::Voices => voices(),
    }
}

async fn serve(port: Option<u16>) -> anyhow::Result<()> {
    let config = Config::load()?;
    let port = port.unwrap_or(config.server.port);

    tracing::info!(
        port,
        database = %config.database_path.display(),
        auth = config.auth.is_configured(),
        "starting heartline"
    );

    let state = ApiState::from_config(&config)?;
    ApiServer::new(state, port, config.server.frontend_url.clone())
        .run()
        .await?;

    Ok(())
}

fn classify(text: &str) -> anyhow::Result<()> {
    let result = EmotionClassifier::default().classify(text);
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn voices() -> anyhow::Result<()> {
    let config = Config::load()?;
    println!("{}", serde_json::to_string_pretty(&config.voice)?);
    Ok(())
}
