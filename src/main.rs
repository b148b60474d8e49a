// ABOUTME: Main entry point for rancherssh
// Resolves the requested container, then relays the local terminal into its shell

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::terminal::disable_raw_mode;
use rancherssh::config::{AppConfig, ConfigOverrides};
use rancherssh::rancher::{RancherClient, SessionResolver, StdioOperator};
use rancherssh::terminal::TerminalBridge;

const USAGE: &str = "\
Example:
    rancherssh my-server-1
    rancherssh \"my-server*\"  (equals to) rancherssh my-server%
    rancherssh %proxy%
    rancherssh \"projectA-app-*\" (equals to) rancherssh projectA-app-%

Configuration:
    We read configuration from config.toml, config.json or config.yml in ./,
    ~/.rancherssh/ and /etc/rancherssh/ folders. A config.toml looks like:
        endpoint = \"https://rancher.server/v1\"   # or https://rancher.server/v1/projects/xxxx
        user = \"your_access_key\"
        password = \"your_access_password\"
    and the same settings in a config.yml:
        endpoint: https://rancher.server/v1
        user: your_access_key
        password: your_access_password

    We accept environment variables as well:
        RANCHERSSH_ENDPOINT=https://your.rancher.server/v1
        RANCHERSSH_USER=your_access_key
        RANCHERSSH_PASSWORD=your_access_password";

#[derive(Debug, Parser)]
#[command(name = "rancherssh", version, about = "SSH into a running Rancher container", after_help = USAGE)]
struct Cli {
    /// Rancher server endpoint, https://your.rancher.server/v1 or https://your.rancher.server/v1/projects/xxx
    #[arg(long)]
    endpoint: Option<String>,

    /// Rancher API user/accesskey
    #[arg(long)]
    user: Option<String>,

    /// Rancher API password/secret
    #[arg(long)]
    password: Option<String>,

    /// Container name, fuzzy match (`*` and `%` are wildcards)
    container: String,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging();
    setup_panic_handler();

    let runtime = tokio::runtime::Runtime::new().context("Failed to start async runtime")?;
    let result = runtime.block_on(run(cli));
    // The stdin reader thread may still be parked in a blocking read
    runtime.shutdown_background();

    if let Err(e) = &result {
        tracing::error!("rancherssh failed: {:#}", e);
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    if cli.container.trim().is_empty() {
        anyhow::bail!("Missing required argument: container\n\n{USAGE}");
    }

    let config = AppConfig::load(ConfigOverrides {
        endpoint: cli.endpoint,
        user: cli.user,
        password: cli.password,
    })
    .with_context(|| format!("Invalid configuration\n\n{USAGE}"))?;

    let client = RancherClient::new(config.credentials());
    let mut resolver = SessionResolver::new(client, StdioOperator);
    let container = resolver.select_container(&cli.container).await?;
    let dial_url = resolver
        .request_dial_url(&container)
        .await
        .context("Failed to get access token")?;

    println!("SSH into container ...");
    let bridge = TerminalBridge::new(resolver.origin());
    let session = bridge.open(&dial_url).await?;
    session.run().await.context("Session terminated")?;

    println!("Good bye.");
    Ok(())
}

fn setup_logging() {
    use std::fs::OpenOptions;
    use tracing_subscriber::prelude::*;

    // stdout carries the remote terminal, so logs only ever go to a file
    let Some(log_dir) = dirs::home_dir().map(|home| home.join(".rancherssh").join("logs")) else {
        return;
    };
    if std::fs::create_dir_all(&log_dir).is_err() {
        return;
    }

    let log_file = log_dir.join(format!(
        "rancherssh-{}.log",
        chrono::Local::now().format("%Y%m%d-%H%M%S")
    ));
    let Ok(file) = OpenOptions::new().create(true).append(true).open(&log_file) else {
        return;
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rancherssh=info".into()),
        )
        .init();
}

fn setup_panic_handler() {
    std::panic::set_hook(Box::new(|panic_info| {
        // Give the operator their terminal back before reporting
        let _ = disable_raw_mode();

        tracing::error!("Application panicked: {}", panic_info);
        eprintln!("Application panicked: {}", panic_info);
        eprintln!("Please check the logs in ~/.rancherssh/logs for more details.");
    }));
}
