use chrono::NaiveDateTime;
use clap::Subcommand;
use mealticket_core::{schedule_status, Clock, Config, SystemClock};

use super::{parse_at, print_json, AT_FORMAT};

#[derive(Subcommand)]
pub enum WindowAction {
    /// Show whether the window is open and the countdown
    Status {
        /// Evaluate at this local time ("YYYY-MM-DD HH:MM:SS")
        #[arg(long)]
        at: Option<String>,
    },
    /// Count down to the nearest break window
    Schedule {
        /// Evaluate at this local time ("YYYY-MM-DD HH:MM:SS")
        #[arg(long)]
        at: Option<String>,
    },
}

fn now_or(at: Option<String>) -> Result<NaiveDateTime, Box<dyn std::error::Error>> {
    match at {
        Some(text) => parse_at(&text),
        None => Ok(SystemClock.now()),
    }
}

pub fn run(action: WindowAction) -> Result<(), Box<dyn std::error::Error>> {
    // Read-only: no store is opened and no reset check runs.
    let config = Config::load()?;
    match action {
        WindowAction::Status { at } => {
            let window = config.window()?;
            let now = now_or(at)?;
            print_json(&serde_json::json!({
                "window": window.to_string(),
                "now": now.format(AT_FORMAT).to_string(),
                "status": window.status(&now),
            }))
        }
        WindowAction::Schedule { at } => {
            let windows = config.schedule()?;
            let now = now_or(at)?;
            print_json(&serde_json::json!({
                "now": now.format(AT_FORMAT).to_string(),
                "windows": windows,
                "status": schedule_status(&windows, &now),
            }))
        }
    }
}
