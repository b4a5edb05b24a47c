use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use wallpaperd_common::{RenderCache, Resolver, SelectMode, WallpaperFilter, WallpaperSpec};
use wallpaperd_config::ActiveConfig;

use crate::backend::{DisplayEvent, DisplayService, RenderService};
use crate::signals::Flags;

/// Single-threaded dispatch loop tying the display, the renderer and the
/// active configuration together. One iteration waits for at most one
/// event, then drains signal flags, the deadline and the event in a fixed
/// order.
pub struct Daemon<D, R>
where
    D: DisplayService,
    R: RenderService<Handle = D::Handle>,
{
    display: D,
    renderer: R,
    config: ActiveConfig,
    config_path: PathBuf,
    resolver: Resolver,
    cache: RenderCache<D::Handle>,
    last_applied: Option<D::Handle>,
    next_deadline: SystemTime,
}

impl<D, R> Daemon<D, R>
where
    D: DisplayService,
    R: RenderService<Handle = D::Handle>,
{
    pub fn new(display: D, renderer: R, config: ActiveConfig, config_path: PathBuf) -> Self {
        Self {
            display,
            renderer,
            config,
            config_path,
            resolver: Resolver::new(),
            cache: RenderCache::new(),
            last_applied: None,
            next_deadline: SystemTime::now(),
        }
    }

    /// Run until shutdown is requested, then release every cached handle.
    pub fn run(&mut self, flags: &Flags) {
        let now = SystemTime::now();
        self.recompute(now);
        self.next_deadline = now;
        self.advance_deadline(now);

        while !flags.shutdown() {
            self.step(flags);
        }

        log::info!("Shutting down, releasing {} cached handles", self.cache.len());
        self.release_cache();
    }

    /// One loop iteration: wait, then reload flag, skip flag, deadline,
    /// event, in that order.
    pub fn step(&mut self, flags: &Flags) {
        let now = SystemTime::now();
        let event = self.display.wait_for_event(self.event_timeout(now));

        if flags.take_reload() {
            self.reload();
        }
        if flags.take_skip() {
            // Force the deadline into the past so the check below fires.
            self.next_deadline = UNIX_EPOCH;
        }

        let now = SystemTime::now();
        if self.timed_mode() && now > self.next_deadline {
            self.recompute(now);
            self.advance_deadline(now);
        }

        if let Some(event) = event {
            self.handle_event(event);
        }
    }

    /// Timed modes wake up for their deadline, everything else blocks
    /// until an event arrives. An overdue deadline still waits one second
    /// so events keep draining.
    fn event_timeout(&self, now: SystemTime) -> Option<Duration> {
        if !self.timed_mode() {
            return None;
        }
        match self.next_deadline.duration_since(now) {
            Ok(wait) if !wait.is_zero() => Some(wait),
            _ => Some(Duration::from_secs(1)),
        }
    }

    fn timed_mode(&self) -> bool {
        match self.config.settings.mode {
            SelectMode::Playlist => true,
            SelectMode::Random => !self.config.settings.random_interval.is_zero(),
            _ => false,
        }
    }

    fn advance_deadline(&mut self, now: SystemTime) {
        match self.config.settings.mode {
            SelectMode::Random => {
                self.next_deadline = now + self.config.settings.random_interval;
            }
            SelectMode::Playlist => {
                let effective = self
                    .config
                    .playlist
                    .as_ref()
                    .map(wallpaperd_common::Playlist::current_duration)
                    .unwrap_or_default();
                if effective.is_zero() {
                    self.next_deadline = now + Duration::from_secs(1);
                    return;
                }
                // Stay phase-locked while we keep up, re-base when the
                // loop fell more than one period behind.
                let advanced = self.next_deadline + effective;
                self.next_deadline = if advanced > now { advanced } else { now + effective };
            }
            _ => {}
        }
    }

    fn reload(&mut self) {
        let now = SystemTime::now();
        match ActiveConfig::load(&self.config_path, now) {
            Ok(config) => {
                log::info!("Configuration reloaded from {:?}", self.config_path);
                self.config = config;
                self.release_cache();
                self.recompute(now);
                self.next_deadline = now;
                self.advance_deadline(now);
            }
            Err(e) => {
                log::error!("Reload failed, keeping the current configuration: {e}");
            }
        }
    }

    fn handle_event(&mut self, event: DisplayEvent) {
        match event {
            DisplayEvent::PropertyChanged(target) => {
                let mode = self.config.settings.mode;
                if mode == SelectMode::Random || mode == SelectMode::Static {
                    log::debug!("Ignoring {target:?} change in {mode} mode");
                } else {
                    self.recompute(SystemTime::now());
                }
            }
            DisplayEvent::TopologyChanged => {
                log::info!("Output topology changed, re-rendering");
                self.release_cache();
                self.recompute(SystemTime::now());
            }
        }
    }

    fn release_cache(&mut self) {
        for handle in self.cache.clear() {
            self.renderer.release(handle);
        }
        self.last_applied = None;
    }

    /// Resolve a wallpaper for every output, render the composite if it is
    /// not cached yet and apply it when it differs from what is showing.
    fn recompute(&mut self, now: SystemTime) {
        let topology = match self.display.output_topology() {
            Ok(topology) => topology,
            Err(e) => {
                log::error!("Failed to query output topology: {e}");
                return;
            }
        };
        if topology.is_empty() {
            return;
        }

        let mode = self.config.settings.mode;
        // The window manager reports desktops 0-based, configuration
        // tables count from 1.
        let wm_desktop = self.display.current_desktop();
        let desktop = wm_desktop.map(|number| number + 1);
        let desktop_name = if mode == SelectMode::ByName {
            wm_desktop.and_then(|number| self.display.current_desktop_name(number))
        } else {
            None
        };

        let mut outputs = Vec::with_capacity(topology.len());
        let mut resolved_any = false;
        for (index, geometry) in topology.iter().enumerate() {
            let filter = WallpaperFilter {
                mode,
                desktop,
                desktop_name: desktop_name.as_deref(),
                output: Some(index),
            };
            let spec = self.resolver.resolve(
                &self.config.settings,
                self.config.playlist.as_mut(),
                &filter,
                now,
            );
            resolved_any |= spec.is_some();
            outputs.push((*geometry, spec));
        }

        if !resolved_any {
            log::debug!("No wallpaper resolved for any output, leaving the display unchanged");
            return;
        }

        let key = outputs
            .iter()
            .map(|(_, spec)| spec.as_ref().map(WallpaperSpec::cache_segment).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(";");

        let handle = match self.cache.get(&key) {
            Some(handle) => handle,
            None => match self.renderer.compose(&outputs) {
                Ok(handle) => {
                    log::debug!("Rendered {key:?}");
                    self.cache.put(key, handle)
                }
                Err(e) => {
                    log::error!("Failed to render wallpaper: {e}");
                    return;
                }
            },
        };

        if self.last_applied != Some(handle) {
            if let Err(e) = self.display.apply(handle) {
                log::error!("Failed to apply wallpaper: {e}");
                return;
            }
            self.last_applied = Some(handle);
        }
    }
}
