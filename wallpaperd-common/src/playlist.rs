use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use chrono::Timelike;

const DAY_SECS: u64 = 24 * 60 * 60;

/// One playlist item. The transition duration is reserved for cross-fades
/// and is only used in timing arithmetic for now.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub image: PathBuf,
    pub duration: Duration,
    pub transition: Duration,
}

impl Entry {
    /// Effective time this entry stays active.
    pub fn span(&self) -> Duration {
        self.duration + self.transition
    }
}

/// Configured time-of-day the playlist starts from each day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DayStart {
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
}

impl DayStart {
    fn as_secs(self) -> u64 {
        u64::from(self.hour) * 3600 + u64::from(self.minute) * 60 + u64::from(self.second)
    }
}

/// Ordered, looping sequence of timed wallpaper entries, phase-locked to a
/// daily start time.
///
/// The anchor is the wall-clock instant elapsed playback time is measured
/// from. It is set on `finalize` so that the playlist behaves as if it
/// started at the configured time-of-day, and corrected by one full cycle
/// when playback wraps past the last entry.
#[derive(Debug, Clone)]
pub struct Playlist {
    entries: Vec<Entry>,
    start: DayStart,
    anchor: SystemTime,
    total: Duration,
    current: usize,
    effective: Duration,
}

impl Playlist {
    pub fn new(start: DayStart) -> Self {
        Self {
            entries: Vec::new(),
            start,
            anchor: SystemTime::now(),
            total: Duration::ZERO,
            current: 0,
            effective: Duration::ZERO,
        }
    }

    /// Append an entry; playback order is insertion order.
    pub fn push(&mut self, image: PathBuf, duration: Duration) {
        self.entries.push(Entry {
            image,
            duration,
            transition: Duration::ZERO,
        });
    }

    /// Attach a transition duration to the entry pair it belongs to.
    ///
    /// Looks for an adjacent pair whose images match `from` and `to`. If
    /// none matches, the last entry matching `from` takes the value, which
    /// covers a transition declared right after its entry.
    pub fn set_transition(&mut self, from: &Path, to: &Path, duration: Duration) {
        if let Some(last) = self.entries.last_mut() {
            if last.image == from {
                last.transition = duration;
                return;
            }
        }
        for i in 0..self.entries.len().saturating_sub(1) {
            if self.entries[i].image == from && self.entries[i + 1].image == to {
                self.entries[i].transition = duration;
                return;
            }
        }
        log::warn!(
            "No playlist entry matches transition {:?} -> {:?}",
            from,
            to
        );
    }

    /// Recompute the total cycle time and phase-lock the anchor to the
    /// configured daily start. Must be called after the entry list is
    /// complete and before the first `active_entry` query.
    ///
    /// A zero-length entry in a multi-entry playlist would stall the
    /// projection loop, so such entries are stretched to one second.
    pub fn finalize(&mut self, now: SystemTime) {
        if self.entries.len() > 1 {
            for entry in &mut self.entries {
                if entry.span().is_zero() {
                    log::warn!(
                        "Playlist entry {:?} has no duration, using 1s",
                        entry.image
                    );
                    entry.duration = Duration::from_secs(1);
                }
            }
        }

        self.total = self.entries.iter().map(Entry::span).sum();
        self.anchor = now - Duration::from_secs(self.elapsed_since_day_start(now));
    }

    /// Seconds since the configured start time-of-day, in local time,
    /// wrapped to 24 hours.
    fn elapsed_since_day_start(&self, now: SystemTime) -> u64 {
        let local: chrono::DateTime<chrono::Local> = now.into();
        let now_s = u64::from(local.num_seconds_from_midnight());
        (now_s + DAY_SECS - self.start.as_secs()) % DAY_SECS
    }

    /// The entry that should be on display at `now`.
    ///
    /// Walks the list subtracting each entry's span from the elapsed time
    /// until it goes negative. Wrapping past the last entry moves the
    /// anchor back by one full cycle, which keeps the phase intact without
    /// resetting it to `now`.
    pub fn active_entry(&mut self, now: SystemTime) -> Option<&Entry> {
        if self.entries.is_empty() {
            return None;
        }
        if self.entries.len() > 1 && !self.total.is_zero() {
            let mut elapsed = now
                .duration_since(self.anchor)
                .map_or(0, |d| d.as_secs() as i64);
            let mut idx = 0;
            loop {
                elapsed -= self.entries[idx].span().as_secs() as i64;
                if elapsed < 0 {
                    break;
                }
                if idx + 1 < self.entries.len() {
                    idx += 1;
                } else {
                    idx = 0;
                    self.anchor -= self.total;
                }
            }
            self.current = idx;
        } else {
            self.current = 0;
        }

        let entry = &self.entries[self.current];
        self.effective = entry.span();
        Some(entry)
    }

    /// Effective duration of the entry returned by the last
    /// `active_entry` call; the loop derives its next deadline from it.
    pub fn current_duration(&self) -> Duration {
        self.effective
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> Duration {
        self.total
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playlist_a10_b20(now: SystemTime) -> Playlist {
        let mut playlist = Playlist::new(DayStart::default());
        playlist.push(PathBuf::from("/test/a.png"), Duration::from_secs(10));
        playlist.push(PathBuf::from("/test/b.png"), Duration::from_secs(20));
        playlist.finalize(now);
        playlist.anchor = now;
        playlist
    }

    #[test]
    fn test_active_entry_walks_and_wraps() {
        let now = SystemTime::now();
        let mut playlist = playlist_a10_b20(now);

        let at = |playlist: &mut Playlist, offset: u64| {
            playlist
                .active_entry(now + Duration::from_secs(offset))
                .unwrap()
                .image
                .clone()
        };

        assert_eq!(at(&mut playlist, 5), PathBuf::from("/test/a.png"));
        assert_eq!(at(&mut playlist, 15), PathBuf::from("/test/b.png"));
        // 35s is one full cycle plus 5s, back at the first entry.
        assert_eq!(at(&mut playlist, 35), PathBuf::from("/test/a.png"));
        assert_eq!(playlist.current_index(), 0);
        assert_eq!(playlist.current_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_wrap_moves_anchor_back_one_cycle() {
        let now = SystemTime::now();
        let mut playlist = playlist_a10_b20(now);

        playlist.active_entry(now + Duration::from_secs(35)).unwrap();
        assert_eq!(playlist.anchor, now - Duration::from_secs(30));
    }

    #[test]
    fn test_empty_playlist_has_no_entry() {
        let mut playlist = Playlist::new(DayStart::default());
        playlist.finalize(SystemTime::now());
        assert!(playlist.active_entry(SystemTime::now()).is_none());
    }

    #[test]
    fn test_single_entry_ignores_timing() {
        let now = SystemTime::now();
        let mut playlist = Playlist::new(DayStart::default());
        playlist.push(PathBuf::from("/test/only.png"), Duration::from_secs(3));
        playlist.finalize(now);

        let far_future = now + Duration::from_secs(100_000);
        let entry = playlist.active_entry(far_future).unwrap();
        assert_eq!(entry.image, PathBuf::from("/test/only.png"));
        assert_eq!(playlist.current_duration(), Duration::from_secs(3));
    }

    #[test]
    fn test_zero_duration_entries_are_stretched() {
        let now = SystemTime::now();
        let mut playlist = Playlist::new(DayStart::default());
        playlist.push(PathBuf::from("/test/a.png"), Duration::ZERO);
        playlist.push(PathBuf::from("/test/b.png"), Duration::from_secs(5));
        playlist.finalize(now);

        assert_eq!(playlist.total(), Duration::from_secs(6));
        // The query terminates even far from the anchor.
        playlist.anchor = now;
        assert!(playlist
            .active_entry(now + Duration::from_secs(10_000))
            .is_some());
    }

    #[test]
    fn test_transition_counts_toward_span() {
        let now = SystemTime::now();
        let mut playlist = Playlist::new(DayStart::default());
        playlist.push(PathBuf::from("/test/a.png"), Duration::from_secs(10));
        playlist.set_transition(
            Path::new("/test/a.png"),
            Path::new("/test/b.png"),
            Duration::from_secs(2),
        );
        playlist.push(PathBuf::from("/test/b.png"), Duration::from_secs(20));
        playlist.finalize(now);
        playlist.anchor = now;

        assert_eq!(playlist.total(), Duration::from_secs(32));
        // a holds the display for duration + transition.
        let entry = playlist.active_entry(now + Duration::from_secs(11)).unwrap();
        assert_eq!(entry.image, PathBuf::from("/test/a.png"));
        let entry = playlist.active_entry(now + Duration::from_secs(12)).unwrap();
        assert_eq!(entry.image, PathBuf::from("/test/b.png"));
    }

    #[test]
    fn test_transition_matches_adjacent_pair() {
        let mut playlist = Playlist::new(DayStart::default());
        playlist.push(PathBuf::from("/test/a.png"), Duration::from_secs(10));
        playlist.push(PathBuf::from("/test/b.png"), Duration::from_secs(10));
        playlist.push(PathBuf::from("/test/c.png"), Duration::from_secs(10));
        playlist.set_transition(
            Path::new("/test/a.png"),
            Path::new("/test/b.png"),
            Duration::from_secs(3),
        );

        assert_eq!(playlist.entries()[0].transition, Duration::from_secs(3));
        assert_eq!(playlist.entries()[1].transition, Duration::ZERO);
    }

    #[test]
    fn test_anchor_is_phase_locked_to_day_start() {
        let now = SystemTime::now();
        let local: chrono::DateTime<chrono::Local> = now.into();
        let start = DayStart {
            hour: local.hour(),
            minute: local.minute(),
            second: local.second(),
        };

        let mut playlist = Playlist::new(start);
        playlist.push(PathBuf::from("/test/a.png"), Duration::from_secs(10));
        playlist.push(PathBuf::from("/test/b.png"), Duration::from_secs(10));
        playlist.finalize(now);

        // Start time equals the current time of day, so nothing has
        // elapsed yet and the first entry is active.
        let elapsed = now.duration_since(playlist.anchor).unwrap();
        assert!(elapsed < Duration::from_secs(2));
        assert_eq!(
            playlist.active_entry(now).unwrap().image,
            PathBuf::from("/test/a.png")
        );
    }
}
