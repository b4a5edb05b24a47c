use std::path::{Path, PathBuf};
use std::time::SystemTime;

use rand::Rng;
use walkdir::WalkDir;

use crate::playlist::Playlist;
use crate::spec::{SelectMode, WallpaperFilter, WallpaperKind, WallpaperSpec};

/// Extensions tried for name-based lookups and accepted by the random
/// enumeration. Suffix matching is case sensitive.
pub const IMAGE_EXTS: [&str; 2] = ["png", "jpg"];

/// Per-desktop wallpaper configuration as the resolver sees it. `None` for
/// the desktop selects the default entry; implementations fall back to the
/// default when a desktop has no specific value.
pub trait SelectionSource {
    fn kind_for(&self, desktop: Option<u32>) -> WallpaperKind;
    fn display_mode_for(&self, desktop: Option<u32>) -> crate::spec::WallpaperMode;
    fn color_for(&self, desktop: Option<u32>) -> Option<&str>;
    fn image_for(&self, desktop: Option<u32>) -> Option<&str>;
    fn search_path(&self) -> &[PathBuf];
}

/// Turns a selection filter into a concrete wallpaper spec.
///
/// Holds the previous random pick so random mode never repeats itself when
/// more than one candidate exists. Every miss resolves to `None`, meaning
/// "leave the display unchanged", never an error.
#[derive(Debug, Default)]
pub struct Resolver {
    last_random: Option<usize>,
}

impl Resolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(
        &mut self,
        source: &impl SelectionSource,
        playlist: Option<&mut Playlist>,
        filter: &WallpaperFilter<'_>,
        now: SystemTime,
    ) -> Option<WallpaperSpec> {
        match filter.mode {
            SelectMode::ByNumber => self.resolve_by_number(source, filter.desktop),
            SelectMode::ByName => {
                self.resolve_by_name(source, filter.desktop, filter.desktop_name)
            }
            SelectMode::Random => self.resolve_random(source),
            SelectMode::Playlist => self.resolve_playlist(source, playlist, now),
            SelectMode::Static => self.resolve_by_number(source, None),
        }
    }

    fn resolve_by_number(
        &self,
        source: &impl SelectionSource,
        desktop: Option<u32>,
    ) -> Option<WallpaperSpec> {
        let mode = source.display_mode_for(desktop);
        match source.kind_for(desktop) {
            WallpaperKind::Color => source.color_for(desktop).map(|color| WallpaperSpec {
                kind: WallpaperKind::Color,
                spec: color.to_string(),
                mode,
            }),
            WallpaperKind::Image => {
                let image = source.image_for(desktop)?;
                let path = find_in_search_path(source.search_path(), Path::new(image))?;
                Some(WallpaperSpec {
                    kind: WallpaperKind::Image,
                    spec: path.display().to_string(),
                    mode,
                })
            }
        }
    }

    /// Name-based lookup tries `{name}.{ext}` for each known extension in
    /// the search path. Kind and display mode still come from the desktop
    /// entry; only the color or the fallback image uses the default entry.
    fn resolve_by_name(
        &self,
        source: &impl SelectionSource,
        desktop: Option<u32>,
        desktop_name: Option<&str>,
    ) -> Option<WallpaperSpec> {
        let mode = source.display_mode_for(desktop);
        if source.kind_for(desktop) == WallpaperKind::Color {
            return source.color_for(None).map(|color| WallpaperSpec {
                kind: WallpaperKind::Color,
                spec: color.to_string(),
                mode,
            });
        }

        if let Some(name) = desktop_name {
            for ext in IMAGE_EXTS {
                let candidate = format!("{name}.{ext}");
                if let Some(path) =
                    find_in_search_path(source.search_path(), Path::new(&candidate))
                {
                    return Some(WallpaperSpec {
                        kind: WallpaperKind::Image,
                        spec: path.display().to_string(),
                        mode,
                    });
                }
            }
        }

        let image = source.image_for(None)?;
        let path = find_in_search_path(source.search_path(), Path::new(image))?;
        Some(WallpaperSpec {
            kind: WallpaperKind::Image,
            spec: path.display().to_string(),
            mode,
        })
    }

    /// Uniform pick over all eligible images in the search path, done in
    /// two passes so the file list never has to be held in memory: one to
    /// count, one to materialize the chosen index. Directories can mutate
    /// between the passes; an index that falls off the end settles on the
    /// last file seen.
    fn resolve_random(&mut self, source: &impl SelectionSource) -> Option<WallpaperSpec> {
        let dirs = source.search_path();
        let count: usize = dirs.iter().map(|dir| count_eligible(dir)).sum();
        if count == 0 {
            log::debug!("No images found in search path for random selection");
            return None;
        }

        let mut rng = rand::thread_rng();
        let mut pick = rng.gen_range(0..count);
        if count > 1 {
            while Some(pick) == self.last_random {
                pick = rng.gen_range(0..count);
            }
        }
        self.last_random = Some(pick);

        let path = nth_eligible(dirs, pick)?;
        Some(WallpaperSpec {
            kind: WallpaperKind::Image,
            spec: path.display().to_string(),
            mode: source.display_mode_for(None),
        })
    }

    fn resolve_playlist(
        &self,
        source: &impl SelectionSource,
        playlist: Option<&mut Playlist>,
        now: SystemTime,
    ) -> Option<WallpaperSpec> {
        let entry = playlist?.active_entry(now)?;
        let path = find_in_search_path(source.search_path(), &entry.image)?;
        Some(WallpaperSpec {
            kind: WallpaperKind::Image,
            spec: path.display().to_string(),
            mode: source.display_mode_for(None),
        })
    }
}

/// Locate an image reference. Absolute references are returned verbatim;
/// relative ones are probed against each search directory in order and the
/// first existing match wins.
pub fn find_in_search_path(search_path: &[PathBuf], reference: &Path) -> Option<PathBuf> {
    if reference.is_absolute() {
        return Some(reference.to_path_buf());
    }

    for dir in search_path {
        let candidate = dir.join(reference);
        if candidate.exists() {
            return Some(candidate);
        }
    }

    None
}

fn is_eligible(path: &Path) -> bool {
    path.is_file()
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| IMAGE_EXTS.contains(&ext))
}

fn eligible_in_dir(dir: &Path) -> impl Iterator<Item = PathBuf> {
    WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path().to_path_buf())
        .filter(|path| is_eligible(path))
}

fn count_eligible(dir: &Path) -> usize {
    eligible_in_dir(dir).count()
}

fn nth_eligible(dirs: &[PathBuf], n: usize) -> Option<PathBuf> {
    let mut seen = 0;
    let mut last = None;
    for dir in dirs {
        for path in eligible_in_dir(dir) {
            if seen == n {
                return Some(path);
            }
            seen += 1;
            last = Some(path);
        }
    }
    last
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::WallpaperMode;
    use std::fs;
    use std::time::Duration;
    use tempfile::tempdir;

    struct TestSource {
        kind: WallpaperKind,
        color: Option<String>,
        image: Option<String>,
        desktop_image: Option<(u32, String)>,
        search_path: Vec<PathBuf>,
    }

    impl TestSource {
        fn images(search_path: Vec<PathBuf>) -> Self {
            Self {
                kind: WallpaperKind::Image,
                color: None,
                image: Some("default.png".to_string()),
                desktop_image: None,
                search_path,
            }
        }
    }

    impl SelectionSource for TestSource {
        fn kind_for(&self, _desktop: Option<u32>) -> WallpaperKind {
            self.kind
        }

        fn display_mode_for(&self, _desktop: Option<u32>) -> WallpaperMode {
            WallpaperMode::Zoomed
        }

        fn color_for(&self, _desktop: Option<u32>) -> Option<&str> {
            self.color.as_deref()
        }

        fn image_for(&self, desktop: Option<u32>) -> Option<&str> {
            if let (Some(desktop), Some((number, image))) = (desktop, &self.desktop_image) {
                if desktop == *number {
                    return Some(image);
                }
            }
            self.image.as_deref()
        }

        fn search_path(&self) -> &[PathBuf] {
            &self.search_path
        }
    }

    fn filter(mode: SelectMode) -> WallpaperFilter<'static> {
        WallpaperFilter {
            mode,
            desktop: None,
            desktop_name: None,
            output: None,
        }
    }

    #[test]
    fn test_absolute_reference_returned_verbatim() {
        let found = find_in_search_path(&[PathBuf::from("/somewhere")], Path::new("/tmp/a.png"));
        assert_eq!(found, Some(PathBuf::from("/tmp/a.png")));
    }

    #[test]
    fn test_relative_reference_first_match_wins() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        fs::write(second.path().join("a.png"), "fake png").unwrap();

        let search_path = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let found = find_in_search_path(&search_path, Path::new("a.png"));
        assert_eq!(found, Some(second.path().join("a.png")));

        // Once present in the first directory, that copy shadows the second.
        fs::write(first.path().join("a.png"), "fake png").unwrap();
        let found = find_in_search_path(&search_path, Path::new("a.png"));
        assert_eq!(found, Some(first.path().join("a.png")));
    }

    #[test]
    fn test_relative_reference_missing_is_none() {
        let dir = tempdir().unwrap();
        let search_path = vec![dir.path().to_path_buf()];
        assert_eq!(find_in_search_path(&search_path, Path::new("a.png")), None);
    }

    #[test]
    fn test_by_number_resolves_color() {
        let source = TestSource {
            kind: WallpaperKind::Color,
            color: Some("#336699".to_string()),
            image: None,
            desktop_image: None,
            search_path: vec![],
        };

        let mut resolver = Resolver::new();
        let spec = resolver
            .resolve(&source, None, &filter(SelectMode::ByNumber), SystemTime::now())
            .unwrap();
        assert_eq!(spec.kind, WallpaperKind::Color);
        assert_eq!(spec.spec, "#336699");
        assert_eq!(spec.mode, WallpaperMode::Zoomed);
    }

    #[test]
    fn test_by_number_desktop_overrides_default() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("default.png"), "fake png").unwrap();
        fs::write(dir.path().join("two.png"), "fake png").unwrap();

        let mut source = TestSource::images(vec![dir.path().to_path_buf()]);
        source.desktop_image = Some((2, "two.png".to_string()));

        let mut resolver = Resolver::new();
        let mut by_number = filter(SelectMode::ByNumber);
        by_number.desktop = Some(2);
        let spec = resolver
            .resolve(&source, None, &by_number, SystemTime::now())
            .unwrap();
        assert_eq!(spec.spec, dir.path().join("two.png").display().to_string());

        // Static mode ignores the desktop and uses the default entry.
        let mut static_default = filter(SelectMode::Static);
        static_default.desktop = Some(2);
        let spec = resolver
            .resolve(&source, None, &static_default, SystemTime::now())
            .unwrap();
        assert_eq!(
            spec.spec,
            dir.path().join("default.png").display().to_string()
        );
    }

    #[test]
    fn test_by_name_tries_extensions_then_falls_back() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("default.png"), "fake png").unwrap();
        fs::write(dir.path().join("Work.jpg"), "fake jpg").unwrap();

        let source = TestSource::images(vec![dir.path().to_path_buf()]);
        let mut resolver = Resolver::new();

        let mut by_name = filter(SelectMode::ByName);
        by_name.desktop_name = Some("Work");
        let spec = resolver
            .resolve(&source, None, &by_name, SystemTime::now())
            .unwrap();
        assert_eq!(spec.spec, dir.path().join("Work.jpg").display().to_string());

        by_name.desktop_name = Some("Mail");
        let spec = resolver
            .resolve(&source, None, &by_name, SystemTime::now())
            .unwrap();
        assert_eq!(
            spec.spec,
            dir.path().join("default.png").display().to_string()
        );
    }

    #[test]
    fn test_random_never_repeats_with_multiple_candidates() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("a.png"), "fake png").unwrap();
        fs::write(dir.path().join("b.jpg"), "fake jpg").unwrap();
        fs::write(dir.path().join("c.png"), "fake png").unwrap();
        fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

        let source = TestSource::images(vec![dir.path().to_path_buf()]);
        let mut resolver = Resolver::new();

        let mut previous: Option<String> = None;
        for _ in 0..20 {
            let spec = resolver
                .resolve(&source, None, &filter(SelectMode::Random), SystemTime::now())
                .unwrap();
            assert!(spec.spec.ends_with(".png") || spec.spec.ends_with(".jpg"));
            if let Some(previous) = &previous {
                assert_ne!(&spec.spec, previous);
            }
            previous = Some(spec.spec);
        }
    }

    #[test]
    fn test_random_single_candidate_repeats() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("only.png"), "fake png").unwrap();

        let source = TestSource::images(vec![dir.path().to_path_buf()]);
        let mut resolver = Resolver::new();

        for _ in 0..3 {
            let spec = resolver
                .resolve(&source, None, &filter(SelectMode::Random), SystemTime::now())
                .unwrap();
            assert_eq!(spec.spec, dir.path().join("only.png").display().to_string());
        }
    }

    #[test]
    fn test_random_empty_search_path_is_none() {
        let dir = tempdir().unwrap();
        let source = TestSource::images(vec![dir.path().to_path_buf()]);
        let mut resolver = Resolver::new();

        assert!(resolver
            .resolve(&source, None, &filter(SelectMode::Random), SystemTime::now())
            .is_none());
    }

    #[test]
    fn test_playlist_mode_uses_active_entry() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("morning.png"), "fake png").unwrap();

        let now = SystemTime::now();
        let mut playlist = Playlist::new(crate::playlist::DayStart::default());
        playlist.push(PathBuf::from("morning.png"), Duration::from_secs(60));
        playlist.finalize(now);

        let source = TestSource::images(vec![dir.path().to_path_buf()]);
        let mut resolver = Resolver::new();
        let spec = resolver
            .resolve(&source, Some(&mut playlist), &filter(SelectMode::Playlist), now)
            .unwrap();
        assert_eq!(
            spec.spec,
            dir.path().join("morning.png").display().to_string()
        );

        let mut empty = Playlist::new(crate::playlist::DayStart::default());
        empty.finalize(now);
        assert!(resolver
            .resolve(&source, Some(&mut empty), &filter(SelectMode::Playlist), now)
            .is_none());
    }
}
