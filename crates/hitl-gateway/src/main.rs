//! hitl - human-in-the-loop chat gateway

mod api;
mod config;
mod server;

use clap::Parser;
use std::path::PathBuf;

use config::Config;

/// hitl - relay a human-in-the-loop agent backend to chat clients
#[derive(Parser, Debug)]
#[command(name = "hitl")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on (default: 127.0.0.1:3000)
    #[arg(short, long)]
    bind: Option<String>,

    /// Agent backend base URL (default: http://localhost:8000)
    #[arg(long)]
    backend_url: Option<String>,

    /// App identifier sent to the backend
    #[arg(long)]
    app: Option<String>,

    /// User identifier sent to the backend
    #[arg(long)]
    user: Option<String>,

    /// Delay between streamed words in milliseconds
    #[arg(long)]
    word_delay_ms: Option<u64>,

    /// Config file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    /// Command-line flags win over the config file
    fn apply(&self, config: &mut Config) {
        if let Some(bind) = &self.bind {
            config.bind = bind.clone();
        }
        if let Some(url) = &self.backend_url {
            config.backend_url = url.clone();
        }
        if let Some(app) = &self.app {
            config.app_name = app.clone();
        }
        if let Some(user) = &self.user {
            config.user_id = user.clone();
        }
        if let Some(delay) = self.word_delay_ms {
            config.word_delay_ms = delay;
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "hitl=debug,tower_http=debug"
    } else {
        "hitl=info,tower_http=info"
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    args.apply(&mut config);

    if args.init_config {
        let path = config.init()?;
        println!("Config file: {}", path.display());
        println!("\nExample config:\n{}", config::example_config());
        return Ok(());
    }

    server::start(config).await
}
