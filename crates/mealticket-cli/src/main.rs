use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "mealticket-cli", version, about = "Mealticket CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Student registry management
    Student {
        #[command(subcommand)]
        action: commands::student::StudentAction,
    },
    /// Redeem a student's ticket from a given position
    Redeem(commands::redeem::RedeemArgs),
    /// Daily reset
    Reset {
        #[command(subcommand)]
        action: commands::reset::ResetAction,
    },
    /// Eligibility window
    Window {
        #[command(subcommand)]
        action: commands::window::WindowAction,
    },
    /// Geofence checks and location history
    Locate {
        #[command(subcommand)]
        action: commands::locate::LocateAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
}

fn main() {
    // Logs go to stderr so stdout stays valid JSON.
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Student { action } => commands::student::run(action),
        Commands::Redeem(args) => commands::redeem::run(args),
        Commands::Reset { action } => commands::reset::run(action),
        Commands::Window { action } => commands::window::run(action),
        Commands::Locate { action } => commands::locate::run(action),
        Commands::Config { action } => commands::config::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
