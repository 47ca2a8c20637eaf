//! Companion host.
//!
//! # Architecture Overview
//!
//! ```text
//!   desktop app / companion-cli
//!          │  reads <app-data-dir>/companion.json {port, secret}
//!          ▼
//!   ┌──────────────────────────────────────────────────────────────┐
//!   │                        COMPANION HOST                        │
//!   │                                                              │
//!   │  ┌─────────┐   ┌────────────┐   ┌──────────┐   ┌──────────┐  │
//!   │  │   net   │──▶│ gatekeeper │──▶│  routes  │──▶│ settings │  │
//!   │  │listener │   │  (secret)  │   │ realtime │   │  store   │  │
//!   │  └─────────┘   └────────────┘   └──────────┘   └──────────┘  │
//!   │                                                              │
//!   │  ┌────────────────────────────────────────────────────────┐  │
//!   │  │ lifecycle: registry → orchestrator → shutdown          │  │
//!   │  │ modules:   settings (built-in), external processes     │  │
//!   │  └────────────────────────────────────────────────────────┘  │
//!   └──────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use companion_host::config::{self, ConfigOverrides, LogFormat, ServiceConfig};
use companion_host::error::{ServiceError, EXIT_FATAL};
use companion_host::lifecycle::diagnostics::install_panic_hook;
use companion_host::lifecycle::signals::spawn_signal_listener;
use companion_host::lifecycle::supervisor::spawn_stdin_watcher;
use companion_host::lifecycle::{Bootstrap, ShutdownCoordinator, ShutdownTrigger};
use companion_host::observability::{logging, metrics};

#[derive(Parser, Debug)]
#[command(name = "companion-host", version, about = "Local companion host for the desktop app")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Host or IP address to bind
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (0 = any free port)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for the run file and settings
    #[arg(long)]
    app_data_dir: Option<PathBuf>,

    /// Log level or filter directive
    #[arg(long)]
    log_level: Option<String>,

    /// Log output format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Accept requests without the shared secret (development only)
    #[arg(long)]
    no_security_check: bool,
}

fn main() {
    let cli = Cli::parse();
    let overrides = ConfigOverrides {
        host: cli.host,
        port: cli.port,
        app_data_dir: cli.app_data_dir,
        log_level: cli.log_level,
        log_format: cli.log_format,
        disable_security_check: cli.no_security_check,
    };

    let config = match config::load(cli.config.as_deref(), overrides) {
        Ok(config) => config,
        Err(error) => {
            eprintln!("companion-host: {}", ServiceError::from(error));
            std::process::exit(EXIT_FATAL);
        }
    };

    if let Err(error) = logging::init_logging(&config.observability) {
        eprintln!("companion-host: failed to initialize logging: {error}");
    }
    install_panic_hook();

    if !config.security.check_enabled {
        tracing::warn!("Security check disabled, every local process can call the host");
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(config.runtime.worker_threads)
        .max_blocking_threads(config.runtime.blocking_threads)
        .thread_name("companion-worker")
        .enable_all()
        .build();
    let runtime = match runtime {
        Ok(runtime) => runtime,
        Err(error) => {
            tracing::error!(error = %error, "Failed to build runtime");
            logging::flush();
            std::process::exit(EXIT_FATAL);
        }
    };

    let code = runtime.block_on(serve(config));
    std::process::exit(code);
}

async fn serve(config: ServiceConfig) -> i32 {
    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => {
                if let Err(error) = metrics::init_metrics(addr) {
                    tracing::warn!(error = %error, "Failed to start metrics endpoint");
                }
            }
            Err(error) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %error,
                "Failed to parse metrics address"
            ),
        }
    }

    let trigger = ShutdownTrigger::new();
    let coordinator = Arc::new(ShutdownCoordinator::with_process_exit());

    spawn_signal_listener(trigger.clone());
    if config.supervisor.exit_on_stdin_close {
        spawn_stdin_watcher(trigger.clone());
    }

    Bootstrap::new(config).run(coordinator, trigger).await
}
