use crate::terminal::TerminalDriver;
use crossterm::{
    cursor::{self, MoveTo},
    execute,
    terminal::{
        disable_raw_mode, enable_raw_mode, Clear, ClearType, EnterAlternateScreen,
        LeaveAlternateScreen,
    },
};
use std::io::{self, stderr, stdout, Stderr, Stdout, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Output target for the terminal UI.
///
/// By default the UI renders to **stdout**.  When your program's stdout is
/// piped (e.g. to capture structured output), switch to [`Stderr`](OutputTarget::Stderr)
/// so the UI goes to the terminal while data flows through the pipe.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// Write to stdout (default).
    #[default]
    Stdout,
    /// Write to stderr (useful when stdout is piped).
    Stderr,
}

/// Writer that wraps either stdout or stderr.
enum Output {
    Stdout(Stdout),
    Stderr(Stderr),
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout(w) => w.write(buf),
            Output::Stderr(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout(w) => w.flush(),
            Output::Stderr(w) => w.flush(),
        }
    }
}

impl Output {
    fn new(target: OutputTarget) -> Self {
        match target {
            OutputTarget::Stdout => Output::Stdout(stdout()),
            OutputTarget::Stderr => Output::Stderr(stderr()),
        }
    }
}

/// [`TerminalDriver`] for a real terminal.
///
/// Modes, screen control and size go through crossterm. Input is read from
/// stdin one byte at a time with `poll(2)`/`read(2)`, bypassing crossterm's
/// event parser so the runtime sees raw codes.
pub struct CrosstermDriver {
    output: Mutex<Output>,
}

impl CrosstermDriver {
    /// Create a driver writing to `target`.
    pub fn new(target: OutputTarget) -> Self {
        Self {
            output: Mutex::new(Output::new(target)),
        }
    }

    fn output(&self) -> MutexGuard<'_, Output> {
        self.output.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for CrosstermDriver {
    fn default() -> Self {
        Self::new(OutputTarget::default())
    }
}

impl TerminalDriver for CrosstermDriver {
    #[cfg(unix)]
    fn read_input_unit(&self, timeout: Duration) -> io::Result<Option<i32>> {
        let mut fds = libc::pollfd {
            fd: libc::STDIN_FILENO,
            events: libc::POLLIN,
            revents: 0,
        };
        let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
        // SAFETY: `fds` is a valid, initialised pollfd and the count is 1.
        let ready = unsafe { libc::poll(&mut fds, 1, millis) };
        if ready < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(err);
        }
        if ready == 0 {
            return Ok(None);
        }

        let mut byte = 0u8;
        // SAFETY: reading at most one byte into a live, writable u8.
        let n = unsafe {
            libc::read(
                libc::STDIN_FILENO,
                (&mut byte as *mut u8).cast::<libc::c_void>(),
                1,
            )
        };
        match n {
            1 => Ok(Some(i32::from(byte))),
            0 => Err(io::Error::new(io::ErrorKind::UnexpectedEof, "stdin closed")),
            _ => Err(io::Error::last_os_error()),
        }
    }

    #[cfg(not(unix))]
    fn read_input_unit(&self, _timeout: Duration) -> io::Result<Option<i32>> {
        Err(io::Error::new(
            io::ErrorKind::Unsupported,
            "byte-level input is only available on unix",
        ))
    }

    fn enter_raw_mode(&self) -> io::Result<()> {
        enable_raw_mode()
    }

    fn restore_mode(&self) -> io::Result<()> {
        disable_raw_mode()
    }

    fn enter_alternate_screen(&self) -> io::Result<()> {
        let mut out = self.output();
        execute!(out, EnterAlternateScreen, cursor::Hide)
    }

    fn exit_alternate_screen(&self) -> io::Result<()> {
        let mut out = self.output();
        execute!(out, cursor::Show, LeaveAlternateScreen)
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        crossterm::terminal::size()
    }

    fn clear(&self) -> io::Result<()> {
        let mut out = self.output();
        execute!(out, MoveTo(0, 0), Clear(ClearType::All))
    }

    fn write(&self, text: &str) -> io::Result<()> {
        // Raw mode does not translate \n to \r\n.
        self.output().write_all(text.replace('\n', "\r\n").as_bytes())
    }

    fn flush(&self) -> io::Result<()> {
        self.output().flush()
    }
}
