use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use wallpaperd_common::error::PlaylistError;
use wallpaperd_common::{DayStart, Playlist, Result, WallpaperdError};

/// On-disk playlist document.
///
/// ```toml
/// [start]
/// hour = 6
///
/// [[entry]]
/// image = "/backgrounds/morning.png"
/// duration = "4h"
///
/// [[transition]]
/// from = "/backgrounds/morning.png"
/// to = "/backgrounds/day.png"
/// duration = "10m"
/// ```
#[derive(Debug, Deserialize)]
struct PlaylistDoc {
    #[serde(default)]
    start: StartDoc,
    #[serde(default, rename = "entry")]
    entries: Vec<EntryDoc>,
    #[serde(default, rename = "transition")]
    transitions: Vec<TransitionDoc>,
}

#[derive(Debug, Default, Deserialize)]
struct StartDoc {
    #[serde(default)]
    hour: u32,
    #[serde(default)]
    minute: u32,
    #[serde(default)]
    second: u32,
}

#[derive(Debug, Deserialize)]
struct EntryDoc {
    image: PathBuf,
    #[serde(with = "humantime_serde")]
    duration: Duration,
}

#[derive(Debug, Deserialize)]
struct TransitionDoc {
    from: PathBuf,
    to: PathBuf,
    #[serde(with = "humantime_serde")]
    duration: Duration,
}

/// Load a playlist file and phase-lock it to `now`.
pub fn load(path: &Path, now: SystemTime) -> Result<Playlist> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        WallpaperdError::Playlist(PlaylistError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })
    })?;

    from_toml_str(&content, now)
}

pub fn from_toml_str(content: &str, now: SystemTime) -> Result<Playlist> {
    let doc: PlaylistDoc = toml::from_str(content).map_err(|e| {
        WallpaperdError::Playlist(PlaylistError::Parse {
            message: e.to_string(),
        })
    })?;

    if doc.start.hour >= 24 || doc.start.minute >= 60 || doc.start.second >= 60 {
        return Err(WallpaperdError::Playlist(PlaylistError::Parse {
            message: format!(
                "invalid start time {:02}:{:02}:{:02}",
                doc.start.hour, doc.start.minute, doc.start.second
            ),
        }));
    }

    let mut playlist = Playlist::new(DayStart {
        hour: doc.start.hour,
        minute: doc.start.minute,
        second: doc.start.second,
    });

    for entry in doc.entries {
        playlist.push(entry.image, entry.duration);
    }
    for transition in doc.transitions {
        playlist.set_transition(&transition.from, &transition.to, transition.duration);
    }

    playlist.finalize(now);
    log::info!(
        "Loaded playlist with {} entries, {:?} per cycle",
        playlist.len(),
        playlist.total()
    );

    Ok(playlist)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entries_and_transitions() {
        let playlist = from_toml_str(
            r#"
[start]
hour = 6

[[entry]]
image = "/backgrounds/morning.png"
duration = "4h"

[[entry]]
image = "/backgrounds/day.png"
duration = "8h"

[[transition]]
from = "/backgrounds/morning.png"
to = "/backgrounds/day.png"
duration = "10m"
"#,
            SystemTime::now(),
        )
        .unwrap();

        assert_eq!(playlist.len(), 2);
        let entries = playlist.entries();
        assert_eq!(entries[0].image, PathBuf::from("/backgrounds/morning.png"));
        assert_eq!(entries[0].duration, Duration::from_secs(4 * 3600));
        assert_eq!(entries[0].transition, Duration::from_secs(600));
        assert_eq!(entries[1].transition, Duration::ZERO);
        assert_eq!(
            playlist.total(),
            Duration::from_secs(4 * 3600 + 8 * 3600 + 600)
        );
    }

    #[test]
    fn test_empty_document_is_an_empty_playlist() {
        let playlist = from_toml_str("", SystemTime::now()).unwrap();
        assert!(playlist.is_empty());
    }

    #[test]
    fn test_zero_durations_are_coerced() {
        let playlist = from_toml_str(
            r#"
[[entry]]
image = "a.png"
duration = "0s"

[[entry]]
image = "b.png"
duration = "0s"
"#,
            SystemTime::now(),
        )
        .unwrap();

        assert_eq!(playlist.total(), Duration::from_secs(2));
    }

    #[test]
    fn test_invalid_start_time_is_rejected() {
        let result = from_toml_str("[start]\nhour = 24\n", SystemTime::now());
        match result {
            Err(WallpaperdError::Playlist(PlaylistError::Parse { message })) => {
                assert!(message.contains("invalid start time"));
            }
            other => panic!("Expected Parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_malformed_toml_is_rejected() {
        let result = from_toml_str("[[entry]]\nimage = ", SystemTime::now());
        assert!(matches!(
            result,
            Err(WallpaperdError::Playlist(PlaylistError::Parse { .. }))
        ));
    }

    #[test]
    fn test_missing_file() {
        let result = load(Path::new("/nonexistent/playlist.toml"), SystemTime::now());
        assert!(matches!(
            result,
            Err(WallpaperdError::Playlist(PlaylistError::FileRead { .. }))
        ));
    }
}
