//! Settings for the sensorhub service.
//!
//! Loading flow: compiled defaults, then an optional JSON file deep-merged on
//! top, then environment variable overrides. See [`loader`].

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{load_settings, load_settings_from_path, settings_path};
pub use types::{DatabaseSettings, InsightSettings, LoggingSettings, ServerSettings, Settings};
