//! perevod - selection translator daemon.
//!
//! Without a subcommand, runs the daemon: binds the control socket, serves
//! actions and drains them on the application loop. `call` talks to a running
//! instance; `config` prints the default configuration template.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use perevod::action::Action;
use perevod::app::App;
use perevod::config::{Config, DEFAULT_TEMPLATE};
use perevod::control::{self, Outcome};
use perevod::frontend::CommandFrontend;
use perevod::translate::GoogleTranslate;
use std::path::PathBuf;
use std::process;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Exit code of a duplicate instance that refused to start.
const EXIT_DUPLICATE: i32 = 1;

/// Selection translator daemon.
///
/// Reads the primary selection, translates it and shows the result. A single
/// instance per session owns a control socket; `perevod call <action>` drives
/// the running instance.
#[derive(Parser, Debug)]
#[command(name = "perevod")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Send an action to the running instance and print its reply.
    Call {
        /// Action to invoke.
        #[arg(value_enum)]
        action: Action,
    },
    /// Print the default configuration template.
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    let config = Config::load_or_default(args.config.as_deref())
        .context("Failed to load configuration")?;

    match args.command {
        Some(Command::Config) => {
            print!("{DEFAULT_TEMPLATE}");
            Ok(())
        }
        Some(Command::Call { action }) => run_call(&config, action).await,
        None => run_daemon(config).await,
    }
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("perevod={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Send one action to the running instance and print the reply.
async fn run_call(config: &Config, action: Action) -> Result<()> {
    let path = config.socket_path();
    let timeout = Duration::from_secs(config.probe_timeout_seconds);

    match control::send_action(&path, action, timeout).await {
        Ok(reply) => {
            println!("{reply}");
            Ok(())
        }
        Err(e) => {
            eprintln!("perevod: {e}");
            process::exit(EXIT_DUPLICATE);
        }
    }
}

/// Run the daemon: guard the instance, serve the socket, drain actions.
async fn run_daemon(config: Config) -> Result<()> {
    info!("perevod v{} starting", env!("CARGO_PKG_VERSION"));

    let path = config.socket_path();
    let probe_timeout = Duration::from_secs(config.probe_timeout_seconds);

    let socket = match control::ensure_single_instance(&path, probe_timeout).await? {
        Outcome::Bound(socket) => socket,
        Outcome::AlreadyRunning => {
            eprintln!("Another perevod instance already runs.");
            process::exit(EXIT_DUPLICATE);
        }
    };

    let (tx, rx) = mpsc::channel(32);

    let server = tokio::spawn(control::serve(socket, tx.clone()));

    // SIGINT behaves like a `quit` action.
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received");
            if tx.send(Action::Quit).await.is_err() {
                warn!("Application loop already gone");
            }
        }
    });

    let frontend = CommandFrontend::from_config(&config);
    let backend = GoogleTranslate::new(config.endpoint.clone())
        .context("Failed to initialize translation client")?;
    let app = App::new(frontend, backend, config.languages.clone());

    let exit = app.run(rx).await;

    // Dropping the server task releases the socket and unlinks its path.
    server.abort();
    let _ = server.await;

    info!("perevod closed");
    process::exit(exit.code());
}
