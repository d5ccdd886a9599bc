use clap::Args;
use mealticket_core::{Coordinate, RedeemOutcome, StaticLocationSource, VerifierStatus};
use serde::Serialize;

use super::{open_service, print_json};

#[derive(Args)]
pub struct RedeemArgs {
    /// Student id
    id: String,
    /// Current latitude (decimal degrees)
    #[arg(long, allow_hyphen_values = true)]
    lat: f64,
    /// Current longitude (decimal degrees)
    #[arg(long, allow_hyphen_values = true)]
    lon: f64,
    /// Evaluate at this local time instead of now ("YYYY-MM-DD HH:MM:SS")
    #[arg(long)]
    at: Option<String>,
}

#[derive(Serialize)]
struct RedeemReport {
    location: VerifierStatus,
    #[serde(flatten)]
    outcome: RedeemOutcome,
}

pub fn run(args: RedeemArgs) -> Result<(), Box<dyn std::error::Error>> {
    let service = open_service(args.at.as_deref())?;
    let source = StaticLocationSource::new(Coordinate::new(args.lat, args.lon));
    let location = service.check_location_once(&source)?;
    let outcome = service.attempt_redeem(&args.id)?;
    print_json(&RedeemReport { location, outcome })
}
