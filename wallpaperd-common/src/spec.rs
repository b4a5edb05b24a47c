use serde::{Deserialize, Serialize};

/// What a resolved wallpaper is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallpaperKind {
    Color,
    Image,
}

impl std::fmt::Display for WallpaperKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WallpaperKind::Color => write!(f, "color"),
            WallpaperKind::Image => write!(f, "image"),
        }
    }
}

/// How an image is placed on an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WallpaperMode {
    Centered,
    Tiled,
    Filled,
    Zoomed,
    Scaled,
}

impl WallpaperMode {
    /// Parse a mode name, falling back to centered for unknown values.
    pub fn from_name(name: &str) -> Self {
        match name {
            "centered" => WallpaperMode::Centered,
            "tiled" => WallpaperMode::Tiled,
            "filled" => WallpaperMode::Filled,
            "zoomed" => WallpaperMode::Zoomed,
            "scaled" => WallpaperMode::Scaled,
            _ => {
                log::warn!("Unknown display mode {:?}, using centered", name);
                WallpaperMode::Centered
            }
        }
    }
}

impl std::fmt::Display for WallpaperMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WallpaperMode::Centered => write!(f, "centered"),
            WallpaperMode::Tiled => write!(f, "tiled"),
            WallpaperMode::Filled => write!(f, "filled"),
            WallpaperMode::Zoomed => write!(f, "zoomed"),
            WallpaperMode::Scaled => write!(f, "scaled"),
        }
    }
}

/// How the wallpaper for a desktop is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectMode {
    #[serde(rename = "number")]
    ByNumber,
    #[serde(rename = "name")]
    ByName,
    #[serde(rename = "random")]
    Random,
    #[serde(rename = "playlist")]
    Playlist,
    #[serde(rename = "static")]
    Static,
}

impl SelectMode {
    /// Whether this mode changes wallpaper on a timer.
    pub fn is_timed(&self) -> bool {
        matches!(self, SelectMode::Random | SelectMode::Playlist)
    }
}

impl std::fmt::Display for SelectMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SelectMode::ByNumber => write!(f, "number"),
            SelectMode::ByName => write!(f, "name"),
            SelectMode::Random => write!(f, "random"),
            SelectMode::Playlist => write!(f, "playlist"),
            SelectMode::Static => write!(f, "static"),
        }
    }
}

/// Fully resolved "what to display" value for one output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WallpaperSpec {
    pub kind: WallpaperKind,
    pub spec: String,
    pub mode: WallpaperMode,
}

impl WallpaperSpec {
    /// Render the spec as one segment of a composite cache key.
    pub fn cache_segment(&self) -> String {
        format!("{}:{}:{}", self.spec, self.mode, self.kind)
    }
}

/// Selection parameters for a single resolve, built fresh per recompute.
#[derive(Debug, Clone, Copy)]
pub struct WallpaperFilter<'a> {
    pub mode: SelectMode,
    pub desktop: Option<u32>,
    pub desktop_name: Option<&'a str>,
    pub output: Option<usize>,
}
