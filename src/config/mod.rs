//! Configuration module - Modular configuration management
//!
//! Split into focused modules:
//! - types.rs: Core configuration types (Config, GatewayConfig, DashboardConfig)
//! - io.rs: Configuration loading and saving
//! - validation.rs: Configuration validation
//! - paths.rs: Configuration file paths

mod io;
mod paths;
mod types;
mod validation;

// Re-export core config types
pub use types::{Config, DashboardConfig, GatewayConfig};

// Re-export IO and utilities
pub use io::{apply_env_overrides, load_config, read_config_snapshot, save_config, ConfigSnapshot};
pub use paths::{config_dir, config_path, logs_dir, state_dir};
pub use validation::{validate_config, ConfigValidationResult};
