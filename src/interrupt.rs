//! Interrupt handling (Ctrl+C).
//!
//! The shell catches SIGINT with a handler that only records it, so Ctrl+C
//! stops the foreground command but not the shell. A caught signal reverts
//! to its default disposition on exec, so children stay interruptible.

#[cfg(unix)]
mod imp {
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    use nix::libc::c_int;
    use nix::sys::signal::{sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};

    static SIGINT_SEEN: AtomicBool = AtomicBool::new(false);

    extern "C" fn on_sigint(_signal: c_int) {
        SIGINT_SEEN.store(true, Ordering::SeqCst);
    }

    pub fn install() -> io::Result<()> {
        let action = SigAction::new(
            SigHandler::Handler(on_sigint),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );
        // SAFETY: the handler only stores to an atomic.
        unsafe { sigaction(Signal::SIGINT, &action) }.map_err(io::Error::from)?;
        Ok(())
    }

    pub fn take() -> bool {
        SIGINT_SEEN.swap(false, Ordering::SeqCst)
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io;

    pub fn install() -> io::Result<()> {
        Ok(())
    }

    pub fn take() -> bool {
        false
    }
}

pub use imp::{install, take};
