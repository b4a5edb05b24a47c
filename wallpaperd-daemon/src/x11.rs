use std::os::fd::{AsRawFd, BorrowedFd};
use std::rc::Rc;
use std::time::{Duration, Instant};

use image::RgbImage;
use rustix::event::{poll, PollFd, PollFlags};
use rustix::io::Errno;
use xcb::{randr, x, Xid, XidNew};

use wallpaperd_common::WallpaperSpec;

use crate::backend::{
    DisplayError, DisplayEvent, DisplayService, Geometry, PropertyTarget, RenderError,
    RenderService,
};
use crate::compose;

// Keep each PutImage request safely below the server's maximum request
// size.
const PUT_IMAGE_BAND_BYTES: usize = 1 << 20;

impl From<xcb::ConnError> for DisplayError {
    fn from(e: xcb::ConnError) -> Self {
        Self::Connection {
            message: e.to_string(),
        }
    }
}

impl From<xcb::ProtocolError> for DisplayError {
    fn from(e: xcb::ProtocolError) -> Self {
        Self::Request {
            message: e.to_string(),
        }
    }
}

impl From<xcb::Error> for DisplayError {
    fn from(e: xcb::Error) -> Self {
        Self::Request {
            message: e.to_string(),
        }
    }
}

/// X11 side of the daemon: root window properties, RandR monitors and the
/// event wait.
pub struct X11Display {
    conn: Rc<xcb::Connection>,
    root: x::Window,
    width: u16,
    height: u16,
    atom_current_desktop: x::Atom,
    atom_desktop_names: x::Atom,
    atom_utf8_string: x::Atom,
}

/// Renders composed root images into X pixmaps.
pub struct X11Renderer {
    conn: Rc<xcb::Connection>,
    root: x::Window,
    depth: u8,
    red_shift: u32,
    green_shift: u32,
    blue_shift: u32,
}

/// Connect to the display named by `DISPLAY` and set up event selection on
/// the root window.
pub fn connect() -> Result<(X11Display, X11Renderer), DisplayError> {
    let (conn, screen_num) =
        xcb::Connection::connect_with_extensions(None, &[xcb::Extension::RandR], &[]).map_err(
            |e| DisplayError::Connection {
                message: e.to_string(),
            },
        )?;

    let (root, depth, width, height, shifts) = {
        let setup = conn.get_setup();
        let screen =
            setup
                .roots()
                .nth(screen_num as usize)
                .ok_or_else(|| DisplayError::Connection {
                    message: format!("screen {screen_num} out of range"),
                })?;
        (
            screen.root(),
            screen.root_depth(),
            screen.width_in_pixels(),
            screen.height_in_pixels(),
            rgb_shifts(screen)?,
        )
    };

    let atom_current_desktop = intern_atom(&conn, b"_NET_CURRENT_DESKTOP")?;
    let atom_desktop_names = intern_atom(&conn, b"_NET_DESKTOP_NAMES")?;
    let atom_utf8_string = intern_atom(&conn, b"UTF8_STRING")?;

    conn.send_and_check_request(&x::ChangeWindowAttributes {
        window: root,
        value_list: &[x::Cw::EventMask(
            x::EventMask::PROPERTY_CHANGE | x::EventMask::STRUCTURE_NOTIFY,
        )],
    })?;
    conn.send_and_check_request(&randr::SelectInput {
        window: root,
        enable: randr::NotifyMask::SCREEN_CHANGE,
    })?;

    let conn = Rc::new(conn);
    let display = X11Display {
        conn: Rc::clone(&conn),
        root,
        width,
        height,
        atom_current_desktop,
        atom_desktop_names,
        atom_utf8_string,
    };
    let renderer = X11Renderer {
        conn,
        root,
        depth,
        red_shift: shifts.0,
        green_shift: shifts.1,
        blue_shift: shifts.2,
    };

    Ok((display, renderer))
}

fn intern_atom(conn: &xcb::Connection, name: &[u8]) -> Result<x::Atom, DisplayError> {
    let cookie = conn.send_request(&x::InternAtom {
        only_if_exists: false,
        name,
    });
    Ok(conn.wait_for_reply(cookie)?.atom())
}

fn rgb_shifts(screen: &x::Screen) -> Result<(u32, u32, u32), DisplayError> {
    for depth in screen.allowed_depths() {
        for visual in depth.visuals() {
            if visual.visual_id() != screen.root_visual() {
                continue;
            }
            let (red, green, blue) = (visual.red_mask(), visual.green_mask(), visual.blue_mask());
            if red == 0 || green == 0 || blue == 0 {
                return Err(DisplayError::Visual {
                    message: format!("visual class {:?} has no channel masks", visual.class()),
                });
            }
            return Ok((
                red.trailing_zeros(),
                green.trailing_zeros(),
                blue.trailing_zeros(),
            ));
        }
    }

    Err(DisplayError::Visual {
        message: "root visual not described by the screen".to_string(),
    })
}

impl X11Display {
    fn cardinal_property(&self, property: x::Atom) -> Option<u32> {
        let cookie = self.conn.send_request(&x::GetProperty {
            delete: false,
            window: self.root,
            property,
            r#type: x::ATOM_CARDINAL,
            long_offset: 0,
            long_length: 1,
        });
        let reply = self.conn.wait_for_reply(cookie).ok()?;
        reply.value::<u32>().first().copied()
    }

    fn translate(&mut self, event: &xcb::Event) -> Option<DisplayEvent> {
        match event {
            xcb::Event::X(x::Event::PropertyNotify(ev)) if ev.window() == self.root => {
                if ev.atom() == self.atom_current_desktop {
                    Some(DisplayEvent::PropertyChanged(PropertyTarget::CurrentDesktop))
                } else if ev.atom() == self.atom_desktop_names {
                    Some(DisplayEvent::PropertyChanged(PropertyTarget::DesktopNames))
                } else {
                    None
                }
            }
            xcb::Event::X(x::Event::ConfigureNotify(ev)) if ev.window() == self.root => {
                self.width = ev.width();
                self.height = ev.height();
                Some(DisplayEvent::TopologyChanged)
            }
            xcb::Event::RandR(randr::Event::ScreenChangeNotify(ev)) => {
                self.width = ev.width();
                self.height = ev.height();
                Some(DisplayEvent::TopologyChanged)
            }
            _ => None,
        }
    }

    /// The connection is the daemon's only link to the outside world, a
    /// broken one is fatal.
    fn die(&self, error: &dyn std::fmt::Display) -> ! {
        log::error!("Display connection lost: {error}");
        std::process::exit(1);
    }
}

impl DisplayService for X11Display {
    type Handle = u32;

    fn output_topology(&self) -> Result<Vec<Geometry>, DisplayError> {
        let cookie = self.conn.send_request(&randr::GetMonitors {
            window: self.root,
            get_active: true,
        });
        let reply = self.conn.wait_for_reply(cookie)?;

        let monitors: Vec<Geometry> = reply
            .monitors()
            .map(|monitor| Geometry {
                x: i32::from(monitor.x()),
                y: i32::from(monitor.y()),
                width: u32::from(monitor.width()),
                height: u32::from(monitor.height()),
            })
            .collect();

        if monitors.is_empty() {
            // No RandR monitors, treat the whole screen as one output.
            Ok(vec![Geometry {
                x: 0,
                y: 0,
                width: u32::from(self.width),
                height: u32::from(self.height),
            }])
        } else {
            Ok(monitors)
        }
    }

    fn current_desktop(&self) -> Option<u32> {
        self.cardinal_property(self.atom_current_desktop)
    }

    fn current_desktop_name(&self, desktop: u32) -> Option<String> {
        let cookie = self.conn.send_request(&x::GetProperty {
            delete: false,
            window: self.root,
            property: self.atom_desktop_names,
            r#type: self.atom_utf8_string,
            long_offset: 0,
            long_length: 4096,
        });
        let reply = self.conn.wait_for_reply(cookie).ok()?;

        // _NET_DESKTOP_NAMES is a NUL separated list of UTF-8 strings.
        reply
            .value::<u8>()
            .split(|byte| *byte == 0)
            .nth(desktop as usize)
            .filter(|name| !name.is_empty())
            .map(|name| String::from_utf8_lossy(name).into_owned())
    }

    fn apply(&self, handle: u32) -> Result<(), DisplayError> {
        let pixmap = unsafe { x::Pixmap::new(handle) };
        self.conn.send_and_check_request(&x::ChangeWindowAttributes {
            window: self.root,
            value_list: &[x::Cw::BackPixmap(pixmap)],
        })?;
        // Width and height zero clear to the window edges.
        self.conn.send_and_check_request(&x::ClearArea {
            exposures: false,
            window: self.root,
            x: 0,
            y: 0,
            width: 0,
            height: 0,
        })?;
        Ok(())
    }

    fn wait_for_event(&mut self, timeout: Option<Duration>) -> Option<DisplayEvent> {
        let deadline = timeout.map(|t| Instant::now() + t);

        loop {
            loop {
                match self.conn.poll_for_event() {
                    Ok(Some(event)) => {
                        if let Some(translated) = self.translate(&event) {
                            return Some(translated);
                        }
                    }
                    Ok(None) => break,
                    Err(e) => self.die(&e),
                }
            }
            if let Err(e) = self.conn.flush() {
                self.die(&e);
            }

            let wait_ms = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    deadline
                        .duration_since(now)
                        .as_millis()
                        .min(i32::MAX as u128) as i32
                }
                None => -1,
            };

            let fd = unsafe { BorrowedFd::borrow_raw(self.conn.as_raw_fd()) };
            let mut fds = [PollFd::from_borrowed_fd(fd, PollFlags::IN)];
            match poll(&mut fds, wait_ms) {
                Ok(0) => return None,
                Ok(_) => {}
                // A signal interrupted the wait, let the loop drain its
                // flags.
                Err(e) if e == Errno::INTR => return None,
                Err(e) => {
                    log::warn!("Event wait failed: {e}");
                    return None;
                }
            }
        }
    }
}

impl X11Renderer {
    fn upload(&self, root_image: &RgbImage) -> Result<u32, DisplayError> {
        let (width, height) = root_image.dimensions();

        let pixmap: x::Pixmap = self.conn.generate_id();
        self.conn.send_and_check_request(&x::CreatePixmap {
            depth: self.depth,
            pid: pixmap,
            drawable: x::Drawable::Window(self.root),
            width: width as u16,
            height: height as u16,
        })?;

        let gc: x::Gcontext = self.conn.generate_id();
        self.conn.send_and_check_request(&x::CreateGc {
            cid: gc,
            drawable: x::Drawable::Pixmap(pixmap),
            value_list: &[],
        })?;

        let stride = width as usize * 4;
        let rows_per_band = (PUT_IMAGE_BAND_BYTES / stride.max(1)).max(1) as u32;

        let mut y = 0u32;
        while y < height {
            let band = rows_per_band.min(height - y);
            let mut data = Vec::with_capacity(stride * band as usize);
            for row in y..y + band {
                for column in 0..width {
                    let pixel = root_image.get_pixel(column, row);
                    let value = (u32::from(pixel[0]) << self.red_shift)
                        | (u32::from(pixel[1]) << self.green_shift)
                        | (u32::from(pixel[2]) << self.blue_shift);
                    data.extend_from_slice(&value.to_ne_bytes());
                }
            }

            self.conn.send_and_check_request(&x::PutImage {
                format: x::ImageFormat::ZPixmap,
                drawable: x::Drawable::Pixmap(pixmap),
                gc,
                width: width as u16,
                height: band as u16,
                dst_x: 0,
                dst_y: y as i16,
                left_pad: 0,
                depth: self.depth,
                data: &data,
            })?;

            y += band;
        }

        self.conn.send_request(&x::FreeGc { gc });
        self.conn.flush()?;

        Ok(pixmap.resource_id())
    }
}

impl RenderService for X11Renderer {
    type Handle = u32;

    fn compose(
        &mut self,
        outputs: &[(Geometry, Option<WallpaperSpec>)],
    ) -> Result<u32, RenderError> {
        let root_image = compose::compose_outputs(outputs)?;
        Ok(self.upload(&root_image)?)
    }

    fn release(&mut self, handle: u32) {
        let pixmap = unsafe { x::Pixmap::new(handle) };
        self.conn.send_request(&x::FreePixmap { pixmap });
        if let Err(e) = self.conn.flush() {
            log::warn!("Failed to flush pixmap release: {e}");
        }
    }
}
