use clap::{Parser, Subcommand};
use dotenv::dotenv;
use mobile_forge::engine::command::{LogReporter, ProcessRunner};
use mobile_forge::engine::fs::RealFileSystem;
use mobile_forge::forge::config::CheckpointBackend;
use mobile_forge::forge::{build_orchestrator, server, ConfigLoader};
use serde_json::{json, Value};

use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Start or resume a session with one input
    Run {
        /// User input: JSON, or plain text
        #[arg(short, long)]
        input: String,

        /// Session token returned by an earlier call
        #[arg(short, long)]
        session: Option<String>,

        /// Config file (defaults to $MOBILE_FORGE_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
    /// Serve the workflow over HTTP
    Serve {
        #[arg(short, long, default_value_t = 3000)]
        port: u16,

        /// Config file (defaults to $MOBILE_FORGE_CONFIG)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Commands::Run {
            input,
            session,
            config,
        } => {
            let config = ConfigLoader::resolve(config.as_deref())?;
            if config.checkpoint.backend == CheckpointBackend::Memory {
                log::warn!(
                    "Memory checkpoints do not survive this process; sessions cannot be resumed"
                );
            }
            let orchestrator = build_orchestrator(
                config,
                Arc::new(ProcessRunner),
                Arc::new(RealFileSystem),
                Some(Arc::new(LogReporter)),
            )?;

            let user_input =
                serde_json::from_str::<Value>(&input).unwrap_or_else(|_| Value::String(input));
            let mut envelope = json!({ "userInput": user_input });
            if let Some(token) = session {
                envelope["sessionToken"] = Value::String(token);
            }

            let response = orchestrator.handle(envelope).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Serve { port, config } => {
            let config = ConfigLoader::resolve(config.as_deref())?;
            let orchestrator = build_orchestrator(
                config,
                Arc::new(ProcessRunner),
                Arc::new(RealFileSystem),
                Some(Arc::new(LogReporter)),
            )?;
            server::serve(port, Arc::new(orchestrator))
                .await
                .map_err(|e| anyhow::anyhow!(e))?;
        }
    }

    Ok(())
}
