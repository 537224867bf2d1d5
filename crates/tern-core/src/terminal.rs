//! Terminal driver seam and scoped terminal-mode guards.
//!
//! Raw mode and the alternate screen are process-wide state. Everything that
//! changes them goes through a [`TerminalHandle`], which hands out RAII
//! guards:
//!
//! * [`RawModeGuard`] is reference counted. The first guard enters raw mode,
//!   the last one to drop restores the previous mode, so the runtime's
//!   session guard and a keyboard subscription's guard nest safely.
//! * [`AltScreenGuard`] has a single owner. A second acquisition while one is
//!   live is rejected with an error.
//! * [`TerminalSession`] is the runtime's outermost scope: raw mode, then the
//!   alternate screen. Dropping it leaves the alternate screen first and
//!   restores the mode last.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Byte-level terminal primitives the runtime is built on.
///
/// [`CrosstermDriver`](crate::backend::CrosstermDriver) talks to the real
/// terminal; [`TestTerminal`](crate::testing::TestTerminal) is a scripted
/// stand-in for tests.
pub trait TerminalDriver: Send + Sync + 'static {
    /// Read one input unit, waiting at most `timeout`.
    ///
    /// Returns `Ok(None)` when nothing arrived in time. The bound lets a
    /// reader notice cancellation between reads.
    fn read_input_unit(&self, timeout: Duration) -> io::Result<Option<i32>>;

    /// Switch the terminal to raw (unbuffered, unechoed) input.
    fn enter_raw_mode(&self) -> io::Result<()>;

    /// Restore the mode that was active before raw mode.
    fn restore_mode(&self) -> io::Result<()>;

    /// Switch to the alternate screen buffer.
    fn enter_alternate_screen(&self) -> io::Result<()>;

    /// Return to the primary screen buffer.
    fn exit_alternate_screen(&self) -> io::Result<()>;

    /// Terminal size as `(columns, rows)`.
    fn size(&self) -> io::Result<(u16, u16)>;

    /// Clear the screen and move the cursor home.
    fn clear(&self) -> io::Result<()>;

    /// Write text at the cursor.
    fn write(&self, text: &str) -> io::Result<()>;

    /// Flush buffered output.
    fn flush(&self) -> io::Result<()>;
}

struct Shared {
    driver: Arc<dyn TerminalDriver>,
    raw_depth: Mutex<usize>,
    alt_screen: AtomicBool,
    // Units read on behalf of a reader that may no longer be waiting.
    input: Mutex<VecDeque<io::Result<i32>>>,
    // Held for the duration of one driver read.
    reading: Mutex<()>,
}

/// Cloneable, shared access to a [`TerminalDriver`] with mode bookkeeping.
#[derive(Clone)]
pub struct TerminalHandle {
    shared: Arc<Shared>,
}

impl TerminalHandle {
    /// Wrap a driver.
    pub fn new(driver: impl TerminalDriver) -> Self {
        Self::from_driver(Arc::new(driver))
    }

    /// Wrap a driver that is already shared.
    pub fn from_driver(driver: Arc<dyn TerminalDriver>) -> Self {
        Self {
            shared: Arc::new(Shared {
                driver,
                raw_depth: Mutex::new(0),
                alt_screen: AtomicBool::new(false),
                input: Mutex::new(VecDeque::new()),
                reading: Mutex::new(()),
            }),
        }
    }

    /// Enter raw mode, or join the raw-mode scope that is already active.
    pub fn acquire_raw_mode(&self) -> io::Result<RawModeGuard> {
        let mut depth = self
            .shared
            .raw_depth
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *depth == 0 {
            self.shared.driver.enter_raw_mode()?;
            tracing::debug!("raw mode entered");
        }
        *depth += 1;
        Ok(RawModeGuard {
            terminal: self.clone(),
        })
    }

    /// Enter the alternate screen. Fails if a guard is already live.
    pub fn enter_alternate_screen(&self) -> io::Result<AltScreenGuard> {
        if self
            .shared
            .alt_screen
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                "alternate screen is already active",
            ));
        }
        if let Err(err) = self.shared.driver.enter_alternate_screen() {
            self.shared.alt_screen.store(false, Ordering::SeqCst);
            return Err(err);
        }
        Ok(AltScreenGuard {
            terminal: self.clone(),
        })
    }

    /// Number of live [`RawModeGuard`]s.
    pub fn raw_mode_depth(&self) -> usize {
        *self
            .shared
            .raw_depth
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether an [`AltScreenGuard`] is live.
    pub fn is_alternate_screen(&self) -> bool {
        self.shared.alt_screen.load(Ordering::SeqCst)
    }

    /// Block for up to `timeout` reading one input unit into the handle's
    /// input buffer.
    ///
    /// The result is kept on the handle rather than returned, so a unit read
    /// for a reader that was cancelled in the meantime is handed to the next
    /// [`take_input`](TerminalHandle::take_input) instead of being lost. One
    /// driver read runs at a time; nothing is read while the buffer is
    /// non-empty or while no [`RawModeGuard`] is live.
    pub fn buffer_input(&self, timeout: Duration) {
        let _reading = self
            .shared
            .reading
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !self.input_buffer().is_empty() || self.raw_mode_depth() == 0 {
            return;
        }
        match self.shared.driver.read_input_unit(timeout) {
            Ok(None) => {}
            Ok(Some(code)) => self.input_buffer().push_back(Ok(code)),
            Err(err) => self.input_buffer().push_back(Err(err)),
        }
    }

    /// Take the oldest buffered input unit, or a read failure.
    pub fn take_input(&self) -> Option<io::Result<i32>> {
        self.input_buffer().pop_front()
    }

    fn input_buffer(&self) -> MutexGuard<'_, VecDeque<io::Result<i32>>> {
        self.shared
            .input
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// See [`TerminalDriver::size`].
    pub fn size(&self) -> io::Result<(u16, u16)> {
        self.shared.driver.size()
    }

    /// Replace the screen contents with `frame` and flush.
    pub fn present(&self, frame: &str) -> io::Result<()> {
        let driver = &self.shared.driver;
        driver.clear()?;
        driver.write(frame)?;
        driver.flush()
    }

    fn release_raw_mode(&self) {
        let mut depth = self
            .shared
            .raw_depth
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *depth {
            0 => {}
            1 => {
                *depth = 0;
                match self.shared.driver.restore_mode() {
                    Ok(()) => tracing::debug!("raw mode restored"),
                    Err(err) => tracing::error!(error = %err, "failed to restore terminal mode"),
                }
            }
            _ => *depth -= 1,
        }
    }

    fn release_alternate_screen(&self) {
        if let Err(err) = self.shared.driver.exit_alternate_screen() {
            tracing::error!(error = %err, "failed to leave alternate screen");
        }
        self.shared.alt_screen.store(false, Ordering::SeqCst);
    }
}

/// Keeps raw mode active while alive. See [`TerminalHandle::acquire_raw_mode`].
#[must_use = "raw mode is released when the guard is dropped"]
pub struct RawModeGuard {
    terminal: TerminalHandle,
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        self.terminal.release_raw_mode();
    }
}

/// Keeps the alternate screen active while alive.
#[must_use = "the alternate screen is left when the guard is dropped"]
pub struct AltScreenGuard {
    terminal: TerminalHandle,
}

impl Drop for AltScreenGuard {
    fn drop(&mut self) {
        self.terminal.release_alternate_screen();
    }
}

/// The runtime's terminal scope: raw mode, then optionally the alternate
/// screen. Released in reverse order on drop, including during unwinding.
pub struct TerminalSession {
    // Field order is drop order.
    alt_screen: Option<AltScreenGuard>,
    _raw_mode: RawModeGuard,
}

impl TerminalSession {
    /// Acquire raw mode and, if `alt_screen` is set, the alternate screen.
    pub fn begin(terminal: &TerminalHandle, alt_screen: bool) -> io::Result<Self> {
        let raw_mode = terminal.acquire_raw_mode()?;
        let alt_screen = if alt_screen {
            Some(terminal.enter_alternate_screen()?)
        } else {
            None
        };
        Ok(Self {
            alt_screen,
            _raw_mode: raw_mode,
        })
    }

    /// Whether this session owns the alternate screen.
    pub fn uses_alternate_screen(&self) -> bool {
        self.alt_screen.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TerminalOp, TestTerminal};

    #[test]
    fn raw_mode_guards_nest() {
        let tty = TestTerminal::new();
        let terminal = TerminalHandle::new(tty.clone());

        let outer = terminal.acquire_raw_mode().unwrap();
        let inner = terminal.acquire_raw_mode().unwrap();
        assert_eq!(terminal.raw_mode_depth(), 2);

        drop(inner);
        assert!(tty.is_raw_mode());
        assert_eq!(terminal.raw_mode_depth(), 1);

        drop(outer);
        assert!(!tty.is_raw_mode());
        assert_eq!(
            tty.ops(),
            vec![TerminalOp::EnterRawMode, TerminalOp::RestoreMode]
        );
    }

    #[test]
    fn raw_mode_restored_when_outer_drops_first() {
        let tty = TestTerminal::new();
        let terminal = TerminalHandle::new(tty.clone());

        let outer = terminal.acquire_raw_mode().unwrap();
        let inner = terminal.acquire_raw_mode().unwrap();
        drop(outer);
        assert!(tty.is_raw_mode());
        drop(inner);
        assert!(!tty.is_raw_mode());
        assert_eq!(terminal.raw_mode_depth(), 0);
    }

    #[test]
    fn failed_raw_mode_leaves_depth_untouched() {
        let tty = TestTerminal::new();
        tty.fail_raw_mode();
        let terminal = TerminalHandle::new(tty.clone());

        assert!(terminal.acquire_raw_mode().is_err());
        assert_eq!(terminal.raw_mode_depth(), 0);
        assert!(tty.ops().is_empty());
    }

    #[test]
    fn second_alternate_screen_is_rejected() {
        let tty = TestTerminal::new();
        let terminal = TerminalHandle::new(tty.clone());

        let guard = terminal.enter_alternate_screen().unwrap();
        let err = terminal.enter_alternate_screen().err().unwrap();
        assert_eq!(err.kind(), io::ErrorKind::AlreadyExists);

        drop(guard);
        assert!(!terminal.is_alternate_screen());
        let again = terminal.enter_alternate_screen();
        assert!(again.is_ok());
    }

    #[test]
    fn session_releases_in_reverse_order() {
        let tty = TestTerminal::new();
        let terminal = TerminalHandle::new(tty.clone());

        let session = TerminalSession::begin(&terminal, true).unwrap();
        assert!(session.uses_alternate_screen());
        drop(session);

        assert_eq!(
            tty.ops(),
            vec![
                TerminalOp::EnterRawMode,
                TerminalOp::EnterAlternateScreen,
                TerminalOp::ExitAlternateScreen,
                TerminalOp::RestoreMode,
            ]
        );
    }

    #[test]
    fn session_without_alternate_screen() {
        let tty = TestTerminal::new();
        let terminal = TerminalHandle::new(tty.clone());

        drop(TerminalSession::begin(&terminal, false).unwrap());
        assert_eq!(
            tty.ops(),
            vec![TerminalOp::EnterRawMode, TerminalOp::RestoreMode]
        );
    }

    #[test]
    fn input_is_only_read_inside_raw_mode() {
        let tty = TestTerminal::new();
        let terminal = TerminalHandle::new(tty.clone());
        tty.type_str("ab");

        terminal.buffer_input(Duration::from_millis(1));
        assert!(terminal.take_input().is_none());

        let guard = terminal.acquire_raw_mode().unwrap();
        terminal.buffer_input(Duration::from_millis(1));
        terminal.buffer_input(Duration::from_millis(1));
        assert_eq!(terminal.take_input().unwrap().unwrap(), i32::from(b'a'));
        assert!(terminal.take_input().is_none());
        drop(guard);

        // "b" is still waiting for the next raw-mode reader.
        let _guard = terminal.acquire_raw_mode().unwrap();
        terminal.buffer_input(Duration::from_millis(1));
        assert_eq!(terminal.take_input().unwrap().unwrap(), i32::from(b'b'));
    }

    #[test]
    fn present_clears_writes_and_flushes() {
        let tty = TestTerminal::new();
        let terminal = TerminalHandle::new(tty.clone());

        terminal.present("hello").unwrap();
        assert_eq!(
            tty.ops(),
            vec![
                TerminalOp::Clear,
                TerminalOp::Write("hello".into()),
                TerminalOp::Flush,
            ]
        );
        assert_eq!(tty.frames(), vec!["hello".to_string()]);
    }
}
