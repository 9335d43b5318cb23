pub mod error;
pub mod settings;

pub use error::ConfigError;
pub use settings::{parse_database_name, FileConfig, Overrides, Settings, DEFAULT_BATCH_SIZE};
