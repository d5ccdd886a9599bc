use clap::Subcommand;
use mealticket_core::{Coordinate, StaticLocationSource};

use super::{open_service, print_json};

#[derive(Subcommand)]
pub enum LocateAction {
    /// Check a position against the geofence and record it
    Check {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
    },
    /// Show recent location checks, oldest first
    History,
}

pub fn run(action: LocateAction) -> Result<(), Box<dyn std::error::Error>> {
    let service = open_service(None)?;
    match action {
        LocateAction::Check { lat, lon } => {
            let source = StaticLocationSource::new(Coordinate::new(lat, lon));
            print_json(&service.check_location_once(&source)?)
        }
        LocateAction::History => print_json(&service.location_history()?),
    }
}
