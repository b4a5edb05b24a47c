use std::sync::atomic::{AtomicBool, Ordering};

static RELOAD: AtomicBool = AtomicBool::new(false);
static SKIP: AtomicBool = AtomicBool::new(false);
static SHUTDOWN: AtomicBool = AtomicBool::new(false);

extern "C" fn handle_signal(signal: libc::c_int) {
    // Only flag stores here, the loop does the actual work.
    match signal {
        libc::SIGHUP => RELOAD.store(true, Ordering::SeqCst),
        libc::SIGUSR1 => SKIP.store(true, Ordering::SeqCst),
        libc::SIGINT | libc::SIGTERM => SHUTDOWN.store(true, Ordering::SeqCst),
        _ => {}
    }
}

/// Signal-driven control flags drained by the dispatch loop: SIGHUP
/// requests a configuration reload, SIGUSR1 skips to the next wallpaper,
/// SIGINT and SIGTERM request shutdown.
pub struct Flags {
    reload: &'static AtomicBool,
    skip: &'static AtomicBool,
    shutdown: &'static AtomicBool,
}

impl Flags {
    /// Install the process signal handlers and return the flags they set.
    pub fn install() -> Self {
        unsafe {
            libc::signal(libc::SIGHUP, handle_signal as libc::sighandler_t);
            libc::signal(libc::SIGUSR1, handle_signal as libc::sighandler_t);
            libc::signal(libc::SIGINT, handle_signal as libc::sighandler_t);
            libc::signal(libc::SIGTERM, handle_signal as libc::sighandler_t);
        }

        Self {
            reload: &RELOAD,
            skip: &SKIP,
            shutdown: &SHUTDOWN,
        }
    }

    /// Flags backed by fresh storage, without touching process signal
    /// dispositions. Used by tests running in parallel.
    pub fn detached() -> Self {
        Self {
            reload: Box::leak(Box::new(AtomicBool::new(false))),
            skip: Box::leak(Box::new(AtomicBool::new(false))),
            shutdown: Box::leak(Box::new(AtomicBool::new(false))),
        }
    }

    pub fn take_reload(&self) -> bool {
        self.reload.swap(false, Ordering::SeqCst)
    }

    pub fn take_skip(&self) -> bool {
        self.skip.swap(false, Ordering::SeqCst)
    }

    pub fn shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    pub fn request_reload(&self) {
        self.reload.store(true, Ordering::SeqCst);
    }

    pub fn request_skip(&self) {
        self.skip.store(true, Ordering::SeqCst);
    }

    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_clears_the_flag() {
        let flags = Flags::detached();
        assert!(!flags.take_reload());

        flags.request_reload();
        assert!(flags.take_reload());
        assert!(!flags.take_reload());
    }

    #[test]
    fn test_shutdown_is_sticky() {
        let flags = Flags::detached();
        assert!(!flags.shutdown());

        flags.request_shutdown();
        assert!(flags.shutdown());
        assert!(flags.shutdown());
    }
}
