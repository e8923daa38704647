//! Inquest — terminal viewer and gateway for streamed agent investigations

mod tui;

use clap::{Parser, Subcommand};
use inquest_core::{AuthConfig, AuthMode, BindMode, EngineConfig, GatewayConfig, RuntimeConfig};
use inquest_gateway::{start_gateway, GatewayLaunchConfig};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "inquest",
    about = "Inquest — live graph viewer for autonomous agent investigations"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Watch an investigation in the terminal
    Tui {
        /// Symbol for the built-in demo investigation
        #[arg(short, long, default_value = "ACME")]
        symbol: String,
        /// Replay a captured JSONL session instead of the demo
        #[arg(long)]
        script: Option<PathBuf>,
        /// Pacing between played-back frames, in milliseconds
        #[arg(long, default_value_t = 400)]
        delay_ms: u64,
        /// Log file directory (the alternate screen owns stdout)
        #[arg(long, default_value = ".")]
        log_dir: PathBuf,
    },
    /// Start the websocket gateway server
    Serve {
        #[arg(short, long, default_value_t = 17861)]
        port: u16,
        #[arg(short, long, default_value = "loopback")]
        bind: String,
        #[arg(short, long)]
        token: Option<String>,
        #[arg(long)]
        no_auth: bool,
        /// Safety timeout before an abandoned session is terminated
        #[arg(long, default_value_t = 120)]
        session_timeout_secs: u64,
    },
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Tui {
            symbol,
            script,
            delay_ms,
            log_dir,
        }) => {
            let _guard = init_tui_logging(&log_dir);
            tui::run_tui(tui::TuiOptions {
                symbol,
                script,
                frame_delay: Duration::from_millis(delay_ms),
            })
            .await?;
        }

        Some(Commands::Serve {
            port,
            bind,
            token,
            no_auth,
            session_timeout_secs,
        }) => {
            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| "inquest=info,tower_http=info".into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            let bind_mode = match bind.as_str() {
                "lan" | "0.0.0.0" => BindMode::Lan,
                _ => BindMode::Loopback,
            };
            let auth = if no_auth {
                AuthConfig {
                    mode: AuthMode::None,
                    token: None,
                }
            } else {
                AuthConfig {
                    mode: AuthMode::Token,
                    token,
                }
            };

            start_gateway(GatewayLaunchConfig {
                gateway: GatewayConfig {
                    port,
                    bind: bind_mode,
                    auth,
                },
                engine: EngineConfig::default(),
                runtime: RuntimeConfig {
                    safety_timeout_secs: session_timeout_secs,
                    ..RuntimeConfig::default()
                },
                demo_frame_delay: Duration::from_millis(400),
            })
            .await?;
        }

        Some(Commands::Version) => {
            println!("inquest v{}", env!("CARGO_PKG_VERSION"));
        }

        // No subcommand = watch the demo investigation.
        None => {
            let _guard = init_tui_logging(std::path::Path::new("."));
            tui::run_tui(tui::TuiOptions {
                symbol: "ACME".to_string(),
                script: None,
                frame_delay: Duration::from_millis(400),
            })
            .await?;
        }
    }

    Ok(())
}

/// File-based logging for TUI mode: the alternate screen owns stdout, so
/// log lines go to `inquest.log` in the given directory.
fn init_tui_logging(log_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    let appender = tracing_appender::rolling::never(log_dir, "inquest.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inquest=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false),
        )
        .init();
    guard
}
