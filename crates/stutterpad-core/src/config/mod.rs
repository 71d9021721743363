//! Configuration infrastructure
//!
//! Generic YAML load/save plus the app's persistent settings type.
//!
//! ```ignore
//! use stutterpad_core::config::{load_config, save_config, settings_path, EngineSettings};
//!
//! let settings: EngineSettings = load_config(&settings_path());
//! save_config(&settings, &settings_path())?;
//! ```

pub mod io;
mod paths;
mod settings;

pub use io::{load_config, save_config};
pub use paths::{config_dir, settings_path};
pub use settings::EngineSettings;
