mod cli;
mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "zeppctl",
    version,
    about = "Deploy and manage an Apache Zeppelin notebook server"
)]
struct Cli {
    #[command(flatten)]
    global: cli::GlobalFlags,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch and unpack the distribution, then lay down default config
    Install(commands::install::InstallArgs),
    /// Write computed configuration and the init-unit definition
    Configure(commands::configure::ConfigureArgs),
    /// Enable and start the daemon, waiting for its port
    Start,
    /// Stop the daemon, waiting for the process to exit
    Stop,
    /// Stop then start the daemon
    Restart,
    /// Show service state and persisted flags
    Status,
    /// Remove all managed directories and persisted state
    Cleanup,
    /// Manage notebooks through the daemon REST API
    #[command(subcommand)]
    Notebook(commands::notebook::NotebookCommand),
    /// Manage interpreter settings through the daemon REST API
    #[command(subcommand)]
    Interpreter(commands::interpreter::InterpreterCommand),
    /// Deliver an upstream lifecycle event
    #[command(subcommand)]
    Event(commands::event::EventCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::debug!(global = ?cli.global, "parsed arguments");
    match cli.command {
        Commands::Install(args) => commands::install::execute(args, &cli.global).await,
        Commands::Configure(args) => commands::configure::execute(args, &cli.global).await,
        Commands::Start => commands::start::execute(&cli.global).await,
        Commands::Stop => commands::stop::execute(&cli.global).await,
        Commands::Restart => commands::restart::execute(&cli.global).await,
        Commands::Status => commands::status::execute(&cli.global).await,
        Commands::Cleanup => commands::cleanup::execute(&cli.global).await,
        Commands::Notebook(command) => commands::notebook::execute(command, &cli.global).await,
        Commands::Interpreter(command) => {
            commands::interpreter::execute(command, &cli.global).await
        }
        Commands::Event(command) => commands::event::execute(command, &cli.global).await,
    }
}
