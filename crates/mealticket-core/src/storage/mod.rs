mod config;
pub mod history;
pub mod kv;

pub use config::{
    Config, FormatConfig, GeofenceConfig, HistoryConfig, NamedWindowConfig, ScheduleConfig,
    WindowConfig,
};
pub use history::{LocationHistory, LocationRecord};
pub use kv::{KvStore, MemoryStore, SqliteStore};

use std::path::PathBuf;

/// Returns the application data directory, creating it if needed.
///
/// `MEALTICKET_DATA_DIR` overrides the location entirely. Otherwise this is
/// `~/.config/mealticket[-dev]/`; set MEALTICKET_ENV=dev to use the
/// development directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> std::io::Result<PathBuf> {
    let dir = match std::env::var_os("MEALTICKET_DATA_DIR") {
        Some(custom) => PathBuf::from(custom),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");
            let env = std::env::var("MEALTICKET_ENV").unwrap_or_else(|_| "production".to_string());
            if env == "dev" {
                base_dir.join("mealticket-dev")
            } else {
                base_dir.join("mealticket")
            }
        }
    };

    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}
