pub mod config;
pub mod locate;
pub mod redeem;
pub mod reset;
pub mod student;
pub mod window;

use std::error::Error;
use std::sync::Arc;

use chrono::NaiveDateTime;
use mealticket_core::{Clock, Config, FixedClock, SqliteStore, SystemClock, TicketService};
use serde::Serialize;

/// Accepted by every `--at` flag.
pub const AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Open the service over the on-disk store, pinned to `at` when given.
pub fn open_service(at: Option<&str>) -> Result<TicketService, Box<dyn Error>> {
    let config = Config::load()?;
    let store = Arc::new(SqliteStore::open()?);
    let clock: Arc<dyn Clock> = match at {
        Some(text) => Arc::new(FixedClock::new(parse_at(text)?)),
        None => Arc::new(SystemClock),
    };
    Ok(TicketService::open(&config, store, clock)?)
}

pub fn parse_at(text: &str) -> Result<NaiveDateTime, Box<dyn Error>> {
    NaiveDateTime::parse_from_str(text, AT_FORMAT)
        .map_err(|e| format!("invalid --at '{text}' (expected YYYY-MM-DD HH:MM:SS): {e}").into())
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
