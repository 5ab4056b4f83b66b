use clap::{Parser, Subcommand};

use ada_api::config::load_config;
use ada_api::console::Console;
use ada_api::{build_router, daemon, AppState};

// --- Command-Line Argument Parsing ---
#[derive(Parser, Debug)]
#[command(author, version, about = "Ada API console and download proxy.", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Manages the proxy server process.
    Server {
        #[command(subcommand)]
        action: ServerAction,
    },
    /// Opens the interactive endpoint console.
    Console {
        /// Catalog file or URL (defaults to the configured one).
        #[arg(long)]
        catalog: Option<String>,
        /// Origin that relative endpoint paths are sent to.
        #[arg(long)]
        origin: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ServerAction {
    /// Start the server as a background process.
    Start,
    /// Stop the background server process.
    Stop,
    /// Restart the background server process.
    Restart,
    /// Run the server in the foreground.
    Run,
    /// Check the status of the background server process.
    Status,
}

// --- Main Application Logic ---
fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Server { action } => match action {
            ServerAction::Start => daemon::start_server(serve_blocking)?,
            ServerAction::Stop => daemon::stop_server()?,
            ServerAction::Restart => {
                daemon::stop_server()?;
                std::thread::sleep(std::time::Duration::from_secs(1));
                daemon::start_server(serve_blocking)?;
            }
            ServerAction::Run => serve_blocking()?,
            ServerAction::Status => daemon::check_status()?,
        },
        Commands::Console { catalog, origin } => runtime()?.block_on(run_console(catalog, origin))?,
    }

    Ok(())
}

/// Built per command so that `server start` forks before any worker thread exists.
fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    Ok(tokio::runtime::Builder::new_multi_thread().enable_all().build()?)
}

fn serve_blocking() -> anyhow::Result<()> {
    runtime()?.block_on(run_server())
}

/// Runs the Axum proxy server in the foreground.
async fn run_server() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let config = load_config().await?;
    let addr = config.server.listen_addr();
    let app = build_router(AppState::new(&config)?);

    tracing::info!("Starting server in foreground, listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn run_console(catalog: Option<String>, origin: Option<String>) -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let mut config = load_config().await?.console;
    if let Some(catalog) = catalog {
        config.catalog = catalog;
    }
    if let Some(origin) = origin {
        config.origin = origin;
    }

    Console::new(&config).await?.run().await
}
