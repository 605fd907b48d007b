use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use session_gate::comms::local_api;
use session_gate::config::Config;
use session_gate::security::session::SessionDecoder;
use session_gate::utils::{logging, prune};

#[derive(Parser)]
#[command(name = "session-gate", version, about = "Session gate for the news admin dashboard")]
struct GateCli {
    /// Config file path
    #[arg(short, long, default_value = "config.json", global = true)]
    config: String,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the gate HTTP server
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Decode a session credential and print its claims
    Decode { token: String },
    /// Print a JSON file with empty values stripped
    Prune { file: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init();

    let args = GateCli::parse();
    let config = Config::load(&args.config)?;

    match args.command.unwrap_or(Commands::Serve { port: 8080 }) {
        Commands::Serve { port } => {
            info!("Starting session gate on port {port}");
            local_api::serve(config, port).await?;
        }
        Commands::Decode { token } => {
            let decoder = SessionDecoder::new(config.session_secret.as_deref());
            let session = decoder
                .decode(Some(&token))
                .context("session credential rejected")?;
            println!("{}", serde_json::to_string_pretty(&session)?);
        }
        Commands::Prune { file } => {
            let raw = std::fs::read_to_string(&file).context("reading JSON file")?;
            let value: serde_json::Value = serde_json::from_str(&raw).context("parsing JSON")?;
            let pruned = prune::prune_empty(value).unwrap_or(serde_json::Value::Null);
            println!("{}", serde_json::to_string_pretty(&pruned)?);
        }
    }

    Ok(())
}
