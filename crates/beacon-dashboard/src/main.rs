mod app;
mod render;
mod signal;

use anyhow::{anyhow, Result};
use app::BoardView;
use beacon_client::HttpBackend;
use beacon_config::{BoardConfig, ConfigLoader};
use beacon_core::{BearerToken, BoardContext, SnapshotStore};
use clap::{Parser, Subcommand, ValueEnum};
use signal::SignalHandler;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(author, version, about = "Terminal dashboard for device heartbeats", long_about = None)]
struct Args {
    /// Directory containing beacon.toml
    #[arg(short, long, default_value = ".")]
    config_dir: PathBuf,

    /// Override the backend base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token for authenticated endpoints
    #[arg(long, env = "BEACON_TOKEN", hide_env_values = true)]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Poll the backend and print the board on every change
    Watch {
        #[arg(long, value_enum, default_value_t = ViewArg::Heartbeat)]
        view: ViewArg,

        /// Also fetch GPU status
        #[arg(long)]
        gpu: bool,
    },
    /// Set the return message of one device
    Edit {
        #[arg(long)]
        device: String,

        #[arg(long)]
        message: String,
    },
    /// Exchange credentials for a bearer token
    Login {
        #[arg(long)]
        username: String,

        #[arg(long, env = "BEACON_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Register a new device
    Register {
        #[arg(long)]
        name: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum ViewArg {
    Heartbeat,
    Reports,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = ConfigLoader::new(&args.config_dir).load()?;
    if let Some(base_url) = &args.base_url {
        config.backend.base_url = base_url.clone();
    }
    config.validate()?;

    beacon_logging::init_logging(&config.logging)?;
    info!(
        config_dir = %args.config_dir.display(),
        backend = %config.backend.base_url,
        "Starting beacon dashboard"
    );

    let token = args.token.clone().map(BearerToken::new);
    let result = run(args.command, config, token).await;
    if let Err(e) = &result {
        error!(error = %e, "Command failed");
    }
    result
}

async fn run(command: Command, mut config: BoardConfig, token: Option<BearerToken>) -> Result<()> {
    match command {
        Command::Config => {
            print!("{}", config.to_toml()?);
            Ok(())
        }
        Command::Watch { view, gpu } => {
            config.polling.fetch_gpu_info |= gpu;
            let (profile, view) = match view {
                ViewArg::Heartbeat => (config.heartbeat_profile(), BoardView::Heartbeat),
                ViewArg::Reports => (config.reports_profile(), BoardView::Reports),
            };

            let backend = Arc::new(HttpBackend::new(config.backend.clone())?);
            let store = Arc::new(SnapshotStore::new(backend, profile.store_options()));

            let handler = Arc::new(SignalHandler::default());
            let shutdown = handler.subscribe();
            let signals = handler.clone();
            tokio::spawn(async move {
                if let Err(e) = signals.wait_for_system_signal().await {
                    error!(error = %e, "Failed to install signal handlers");
                    signals.trigger_shutdown();
                }
            });

            app::watch(store, profile, view, shutdown, |frame| {
                println!("{}", frame);
            })
            .await
        }
        Command::Edit { device, message } => {
            let backend = Arc::new(HttpBackend::new(config.backend.clone())?);
            let profile = config.return_message_profile();
            let store = Arc::new(SnapshotStore::new(backend.clone(), profile.store_options()));

            let mut context = BoardContext::new(backend);
            if let Some(token) = token {
                context = context.with_token(token);
            }

            if app::edit_return_message(store, context, &device, &message).await? {
                println!("return message of {} set to {:?}", device, message);
            } else {
                println!("return message of {} unchanged", device);
            }
            Ok(())
        }
        Command::Login { username, password } => {
            let backend = HttpBackend::new(config.backend.clone())?;
            let response = backend.login(&username, &password).await?;
            println!("{}", response.access_token);
            Ok(())
        }
        Command::Register { name } => {
            let token = token.ok_or_else(|| anyhow!("--token or BEACON_TOKEN is required"))?;
            let backend = HttpBackend::new(config.backend.clone())?;
            let body = backend.register_device(&name, &token).await?;
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(())
        }
    }
}
