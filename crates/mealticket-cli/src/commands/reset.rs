use clap::Subcommand;

use super::{open_service, print_json};

#[derive(Subcommand)]
pub enum ResetAction {
    /// Run the daily reset check
    Check {
        /// Run as if at this local time ("YYYY-MM-DD HH:MM:SS")
        #[arg(long)]
        at: Option<String>,
    },
    /// Clear every student's redemption
    All,
}

pub fn run(action: ResetAction) -> Result<(), Box<dyn std::error::Error>> {
    match action {
        ResetAction::Check { at } => {
            // Opening the service runs the check.
            let service = open_service(at.as_deref())?;
            print_json(service.startup_reset())?;
        }
        ResetAction::All => {
            let service = open_service(None)?;
            let cleared = service.reset_all()?;
            print_json(&serde_json::json!({ "cleared": cleared }))?;
        }
    }
    Ok(())
}
