//! Configuration: data directory layout and the optional settings file.

mod paths;
mod settings;

pub use paths::{DATA_DIR_NAME, DataPaths, STATE_DB_FILE, UPLOADS_DIR, expand_home, home_dir};
pub use settings::{ServerSettings, Settings, StreamSettings};
