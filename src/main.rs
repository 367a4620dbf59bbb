use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use wavnav::config::schema::{AppConfig, OutputKind};

/// wavnav: WAV player navigated by a rotary encoder and four buttons
#[derive(Parser)]
#[command(name = "wavnav", version, about)]
struct Cli {
    /// Path to the config file (TOML). Built-in defaults when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage root, overriding `player.root`.
    #[arg(short, long)]
    root: Option<PathBuf>,

    /// Discard audio at real-time pace instead of opening a sound device.
    #[arg(long)]
    null_output: bool,

    /// Enable JSON log output (for journald).
    #[arg(long)]
    json: bool,

    /// Validate config and exit.
    #[arg(long)]
    check: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Init tracing.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("wavnav=info"));

    if cli.json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    info!("wavnav v{}", env!("CARGO_PKG_VERSION"));

    // Load config.
    let mut config = match &cli.config {
        Some(path) => wavnav::config::load(path)?,
        None => AppConfig::default(),
    };
    if let Some(root) = cli.root {
        config.player.root = root;
    }
    if cli.null_output {
        config.audio.output = OutputKind::Null;
    }

    if cli.check {
        println!(
            "config OK: root {}, volume {}%, step {}, output {:?}",
            config.player.root.display(),
            config.player.volume,
            config.player.volume_step,
            config.audio.output,
        );
        return Ok(());
    }

    let runtime = tokio::runtime::Runtime::new()?;
    let result = runtime.block_on(wavnav::daemon::run(config));
    // The console reader may still be parked in a blocking stdin read.
    runtime.shutdown_timeout(Duration::from_millis(200));
    result?;

    Ok(())
}
