use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use wallpaperd_common::error::ConfigError;
use wallpaperd_common::{
    Playlist, Result, SelectMode, SelectionSource, WallpaperKind, WallpaperMode, WallpaperdError,
};

pub mod playlist;

/// Wallpaper settings for one desktop, or the default entry. Every field
/// is optional; lookups fall back to the default entry field by field.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WallpaperEntry {
    pub kind: Option<WallpaperKind>,
    pub image: Option<String>,
    pub color: Option<String>,
    pub display: Option<WallpaperMode>,
}

/// Daemon configuration, loaded from
/// `$XDG_CONFIG_HOME/wallpaperd/wallpaperd.toml`.
///
/// Desktop tables are keyed 1-based, `[desktop.1]` being the first
/// desktop as reported by the window manager.
#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_mode")]
    pub mode: SelectMode,
    #[serde(default = "default_search_path")]
    search_path: Vec<String>,
    #[serde(default = "default_random_interval", with = "humantime_serde")]
    pub random_interval: Duration,
    #[serde(default)]
    pub playlist: Option<PathBuf>,
    #[serde(default)]
    default: WallpaperEntry,
    #[serde(default)]
    desktop: HashMap<String, WallpaperEntry>,
    #[serde(skip)]
    expanded_search_path: Vec<PathBuf>,
}

fn default_mode() -> SelectMode {
    SelectMode::ByNumber
}

fn default_search_path() -> Vec<String> {
    vec![".".to_string(), "~".to_string(), "~/Pictures".to_string()]
}

fn default_random_interval() -> Duration {
    // Zero keeps random mode event-driven only.
    Duration::ZERO
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_path()?)
    }

    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or(WallpaperdError::Config(ConfigError::NoConfigDir))?
            .join("wallpaperd");

        Ok(config_dir.join("wallpaperd.toml"))
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            WallpaperdError::Config(ConfigError::FileRead {
                path: path.to_path_buf(),
                source: e,
            })
        })?;

        let mut config: Config = toml::from_str(&content).map_err(|e| {
            WallpaperdError::Config(ConfigError::TomlParse {
                message: e.to_string(),
            })
        })?;

        config.expanded_search_path = config
            .search_path
            .iter()
            .map(|raw| expand_home(raw))
            .collect();

        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        match self.default.kind.unwrap_or(WallpaperKind::Image) {
            WallpaperKind::Image => {
                if self.default.image.is_none() {
                    return Err(missing_field("default.image"));
                }
            }
            WallpaperKind::Color => {
                if self.default.color.is_none() {
                    return Err(missing_field("default.color"));
                }
            }
        }

        if self.default.display.is_none() {
            return Err(missing_field("default.display"));
        }

        if self.mode == SelectMode::Playlist && self.playlist.is_none() {
            return Err(missing_field("playlist"));
        }

        for key in self.desktop.keys() {
            match key.parse::<u32>() {
                Ok(number) if number >= 1 => {}
                _ => {
                    return Err(WallpaperdError::Config(ConfigError::Validation {
                        message: format!(
                            "desktop table keys must be numbers starting at 1, got {key:?}"
                        ),
                    }));
                }
            }
        }

        Ok(())
    }

    fn desktop_entry(&self, desktop: Option<u32>) -> Option<&WallpaperEntry> {
        desktop.and_then(|number| self.desktop.get(&number.to_string()))
    }
}

fn missing_field(field: &str) -> WallpaperdError {
    WallpaperdError::Config(ConfigError::MissingField {
        field: field.to_string(),
    })
}

fn expand_home(raw: &str) -> PathBuf {
    let home = dirs::home_dir;
    if raw == "~" {
        home().unwrap_or_else(|| PathBuf::from("."))
    } else if let Some(rest) = raw.strip_prefix("~/") {
        home().map_or_else(|| PathBuf::from(rest), |home| home.join(rest))
    } else {
        PathBuf::from(raw)
    }
}

impl SelectionSource for Config {
    fn kind_for(&self, desktop: Option<u32>) -> WallpaperKind {
        self.desktop_entry(desktop)
            .and_then(|entry| entry.kind)
            .or(self.default.kind)
            .unwrap_or(WallpaperKind::Image)
    }

    fn display_mode_for(&self, desktop: Option<u32>) -> WallpaperMode {
        self.desktop_entry(desktop)
            .and_then(|entry| entry.display)
            .or(self.default.display)
            .unwrap_or(WallpaperMode::Centered)
    }

    fn color_for(&self, desktop: Option<u32>) -> Option<&str> {
        self.desktop_entry(desktop)
            .and_then(|entry| entry.color.as_deref())
            .or(self.default.color.as_deref())
    }

    fn image_for(&self, desktop: Option<u32>) -> Option<&str> {
        self.desktop_entry(desktop)
            .and_then(|entry| entry.image.as_deref())
            .or(self.default.image.as_deref())
    }

    fn search_path(&self) -> &[PathBuf] {
        &self.expanded_search_path
    }
}

/// Configuration plus the playlist it references, swapped as one unit on
/// reload so the playlist never outlives the settings that loaded it.
#[derive(Debug)]
pub struct ActiveConfig {
    pub settings: Config,
    pub playlist: Option<Playlist>,
}

impl ActiveConfig {
    pub fn load(path: &Path, now: SystemTime) -> Result<Self> {
        let settings = Config::load_from_path(path)?;

        let playlist = if settings.mode == SelectMode::Playlist {
            // Presence is validated with the settings.
            match &settings.playlist {
                Some(playlist_path) => Some(playlist::load(playlist_path, now)?),
                None => None,
            }
        } else {
            None
        };

        Ok(Self { settings, playlist })
    }
}
