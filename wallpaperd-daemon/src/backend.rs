use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

use wallpaperd_common::WallpaperSpec;

/// Placement of one output inside the root coordinate space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Geometry {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Root window property the display reported a change for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyTarget {
    CurrentDesktop,
    DesktopNames,
}

/// Event the dispatch loop reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayEvent {
    PropertyChanged(PropertyTarget),
    TopologyChanged,
}

/// Display server errors
#[derive(Error, Debug)]
pub enum DisplayError {
    #[error("Failed to connect to display: {message}")]
    Connection { message: String },

    #[error("Display request failed: {message}")]
    Request { message: String },

    #[error("Unsupported display visual: {message}")]
    Visual { message: String },
}

/// Rendering errors
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to load image: {path:?}")]
    ImageLoad {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("Invalid color specification: {spec:?}")]
    InvalidColor { spec: String },

    #[error("Nothing to compose, no outputs")]
    NoOutputs,

    #[error(transparent)]
    Display(#[from] DisplayError),
}

/// Window-system side of the daemon: output topology, desktop properties,
/// the blocking event wait and handle application. `Handle` is whatever
/// the paired render service allocates.
pub trait DisplayService {
    type Handle: Copy + PartialEq + std::fmt::Debug;

    fn output_topology(&self) -> Result<Vec<Geometry>, DisplayError>;

    /// Current desktop index as reported by the window manager, 0-based.
    fn current_desktop(&self) -> Option<u32>;

    /// Name of the given 0-based desktop, if published.
    fn current_desktop_name(&self, desktop: u32) -> Option<String>;

    fn apply(&self, handle: Self::Handle) -> Result<(), DisplayError>;

    /// Block until a relevant event arrives or the timeout expires. `None`
    /// timeout blocks indefinitely; a signal interrupting the wait returns
    /// `None` so the loop can drain its flags.
    fn wait_for_event(&mut self, timeout: Option<Duration>) -> Option<DisplayEvent>;
}

/// Turns per-output wallpaper specs into a displayable resource.
pub trait RenderService {
    type Handle;

    fn compose(
        &mut self,
        outputs: &[(Geometry, Option<WallpaperSpec>)],
    ) -> Result<Self::Handle, RenderError>;

    fn release(&mut self, handle: Self::Handle);
}
