//! Log output setup.
//!
//! Library code only emits `tracing` events. A binary installs the process
//! subscriber once with [`init`]. Code that needs to look at diagnostics (tests,
//! isolated runs) wraps the work in [`capture`], which installs a subscriber
//! for the current thread only and restores the previous one on return.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::Level;

/// Install a process-wide formatter at `level`.
///
/// Fails if a global subscriber is already set.
pub fn init(level: Level) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .try_init()
}

/// Run `f` with log output at `level` and above redirected into a buffer.
///
/// Returns the result of `f` and the captured text. The redirection is scoped
/// to this call on this thread.
pub fn capture<R>(level: Level, f: impl FnOnce() -> R) -> (R, String) {
    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .with_writer(move || writer.clone())
        .finish();
    let result = tracing::subscriber::with_default(subscriber, f);
    (result, buffer.contents())
}

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn contents(&self) -> String {
        let bytes = self.0.lock().unwrap_or_else(PoisonError::into_inner);
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl io::Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
