pub mod cache;
pub mod error;
pub mod playlist;
pub mod resolver;
pub mod spec;

pub use cache::RenderCache;
pub use error::{ConfigError, PlaylistError, Result, WallpaperdError};
pub use playlist::{DayStart, Entry, Playlist};
pub use resolver::{find_in_search_path, Resolver, SelectionSource, IMAGE_EXTS};
pub use spec::{SelectMode, WallpaperFilter, WallpaperKind, WallpaperMode, WallpaperSpec};
