use std::path::PathBuf;
use thiserror::Error;

/// Main error type for wallpaperd operations
#[derive(Error, Debug)]
pub enum WallpaperdError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Playlist error: {0}")]
    Playlist(#[from] PlaylistError),
}

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read configuration file: {path:?}")]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse TOML configuration: {message}")]
    TomlParse { message: String },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Missing required configuration: {field}")]
    MissingField { field: String },

    #[error("Invalid configuration value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("Could not determine config directory")]
    NoConfigDir,
}

/// Playlist file errors
#[derive(Error, Debug)]
pub enum PlaylistError {
    #[error("Failed to read playlist file: {path:?}")]
    FileRead { path: PathBuf, source: std::io::Error },

    #[error("Failed to parse playlist: {message}")]
    Parse { message: String },
}

// Convenience type alias
pub type Result<T> = std::result::Result<T, WallpaperdError>;
