pub mod loader;
pub mod logger;
pub mod settings;

pub use logger::{setup_logger, Level, LogOptions};
pub use settings::Settings;
