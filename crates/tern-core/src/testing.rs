//! Test doubles for terminals and applications.

use crate::application::Application;
use crate::bridge::Bridge;
use crate::command::Command;
use crate::render::render;
use crate::subscription::{Subscription, SubscriptionContext};
use crate::terminal::{TerminalDriver, TerminalHandle};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// A call made on a [`TestTerminal`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalOp {
    EnterRawMode,
    RestoreMode,
    EnterAlternateScreen,
    ExitAlternateScreen,
    Clear,
    Write(String),
    Flush,
}

enum Input {
    Unit(i32),
    Error(io::ErrorKind),
}

#[derive(Default)]
struct State {
    input: VecDeque<Input>,
    ops: Vec<TerminalOp>,
    raw_mode: bool,
    alt_screen: bool,
    fail_raw_mode: bool,
    read_latency: Duration,
    size: (u16, u16),
}

/// A scripted, in-memory [`TerminalDriver`].
///
/// Input is queued up front with [`push_bytes`](TestTerminal::push_bytes) or
/// [`type_str`](TestTerminal::type_str); every driver call is recorded and
/// can be inspected with [`ops`](TestTerminal::ops). Clones share state, so
/// keep one clone for assertions and hand another to a [`TerminalHandle`].
///
/// # Example
///
/// ```rust,ignore
/// let tty = TestTerminal::new();
/// tty.type_str("+q");
/// let terminal = TerminalHandle::new(tty.clone());
/// // ... run a program against `terminal` ...
/// assert_eq!(tty.frames().last().unwrap(), "Count: 1");
/// assert!(!tty.is_raw_mode());
/// ```
#[derive(Clone)]
pub struct TestTerminal {
    state: Arc<Mutex<State>>,
}

impl TestTerminal {
    /// An 80x24 terminal with no pending input.
    pub fn new() -> Self {
        Self::with_size(80, 24)
    }

    /// A terminal of the given size.
    pub fn with_size(columns: u16, rows: u16) -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                size: (columns, rows),
                ..State::default()
            })),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue raw input bytes.
    pub fn push_bytes(&self, bytes: &[u8]) {
        let mut state = self.state();
        state
            .input
            .extend(bytes.iter().map(|b| Input::Unit(i32::from(*b))));
    }

    /// Queue the bytes of `text`.
    pub fn type_str(&self, text: &str) {
        self.push_bytes(text.as_bytes());
    }

    /// Queue a failed read.
    pub fn push_read_error(&self, kind: io::ErrorKind) {
        self.state().input.push_back(Input::Error(kind));
    }

    /// Make every subsequent attempt to enter raw mode fail.
    pub fn fail_raw_mode(&self) {
        self.state().fail_raw_mode = true;
    }

    /// Make every read block for `latency` before taking from the queue,
    /// like a read that is still waiting when the input arrives.
    pub fn set_read_latency(&self, latency: Duration) {
        self.state().read_latency = latency;
    }

    /// Every driver call so far, in order. Reads are not recorded.
    pub fn ops(&self) -> Vec<TerminalOp> {
        self.state().ops.clone()
    }

    /// The text of every write so far.
    pub fn frames(&self) -> Vec<String> {
        self.state()
            .ops
            .iter()
            .filter_map(|op| match op {
                TerminalOp::Write(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    /// Whether the terminal is currently in raw mode.
    pub fn is_raw_mode(&self) -> bool {
        self.state().raw_mode
    }

    /// Whether the alternate screen is currently shown.
    pub fn is_alternate_screen(&self) -> bool {
        self.state().alt_screen
    }
}

impl Default for TestTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl TerminalDriver for TestTerminal {
    fn read_input_unit(&self, timeout: Duration) -> io::Result<Option<i32>> {
        let latency = self.state().read_latency;
        if !latency.is_zero() {
            std::thread::sleep(latency);
        }
        let next = self.state().input.pop_front();
        match next {
            Some(Input::Unit(code)) => Ok(Some(code)),
            Some(Input::Error(kind)) => Err(io::Error::new(kind, "scripted read failure")),
            None if !latency.is_zero() => Ok(None),
            None => {
                std::thread::sleep(timeout.min(Duration::from_millis(5)));
                Ok(None)
            }
        }
    }

    fn enter_raw_mode(&self) -> io::Result<()> {
        let mut state = self.state();
        if state.fail_raw_mode {
            return Err(io::Error::other("raw mode unavailable"));
        }
        state.raw_mode = true;
        state.ops.push(TerminalOp::EnterRawMode);
        Ok(())
    }

    fn restore_mode(&self) -> io::Result<()> {
        let mut state = self.state();
        state.raw_mode = false;
        state.ops.push(TerminalOp::RestoreMode);
        Ok(())
    }

    fn enter_alternate_screen(&self) -> io::Result<()> {
        let mut state = self.state();
        state.alt_screen = true;
        state.ops.push(TerminalOp::EnterAlternateScreen);
        Ok(())
    }

    fn exit_alternate_screen(&self) -> io::Result<()> {
        let mut state = self.state();
        state.alt_screen = false;
        state.ops.push(TerminalOp::ExitAlternateScreen);
        Ok(())
    }

    fn size(&self) -> io::Result<(u16, u16)> {
        Ok(self.state().size)
    }

    fn clear(&self) -> io::Result<()> {
        self.state().ops.push(TerminalOp::Clear);
        Ok(())
    }

    fn write(&self, text: &str) -> io::Result<()> {
        self.state().ops.push(TerminalOp::Write(text.to_string()));
        Ok(())
    }

    fn flush(&self) -> io::Result<()> {
        self.state().ops.push(TerminalOp::Flush);
        Ok(())
    }
}

/// A headless harness that drives an [`Application`] without a terminal.
///
/// Commands returned by `init` and `update` are run to completion on a
/// [`Bridge`], effects included, and the messages they produce are queued.
/// Call [`drain_messages`](TestProgram::drain_messages) to feed them back
/// through `update`. No tokio runtime or TTY is required, so this works in a
/// plain `#[test]` function.
///
/// # Example
///
/// ```rust,ignore
/// use tern_core::testing::TestProgram;
///
/// let mut prog = TestProgram::new(Counter, ()).unwrap();
/// prog.send(Msg::Increment).unwrap();
/// prog.send(Msg::Increment).unwrap();
/// assert_eq!(*prog.state(), 2);
/// assert_eq!(prog.render_string(40, 1), "Count: 2");
/// ```
pub struct TestProgram<A: Application> {
    app: A,
    env: A::Env,
    state: Option<A::State>,
    pending_messages: VecDeque<A::Message>,
    exited: bool,
    bridge: Bridge,
}

impl<A: Application> TestProgram<A> {
    /// Call [`Application::init`] and run its command.
    ///
    /// # Panics
    ///
    /// Panics if a tokio runtime for the bridge cannot be created.
    pub fn new(app: A, env: A::Env) -> Result<Self, A::Error> {
        let (state, cmd) = app.init()?;
        let bridge = Bridge::new().expect("failed to build test runtime");
        let mut program = Self {
            app,
            env,
            state: Some(state),
            pending_messages: VecDeque::new(),
            exited: false,
            bridge,
        };
        program.run_command(cmd);
        Ok(program)
    }

    /// Send one message through `update` and run the returned command.
    /// Messages the command produces are queued, not processed.
    ///
    /// # Panics
    ///
    /// Panics if a previous `update` failed, since the state was consumed.
    pub fn send(&mut self, msg: A::Message) -> Result<(), A::Error> {
        let state = self.state.take().expect("state is present between updates");
        match self.app.update(msg, state) {
            Ok((state, cmd)) => {
                self.state = Some(state);
                self.run_command(cmd);
                Ok(())
            }
            Err(err) => {
                self.exited = true;
                Err(err)
            }
        }
    }

    /// Process queued messages, including the ones they produce in turn,
    /// until the queue is empty or the application exits.
    pub fn drain_messages(&mut self) -> Result<(), A::Error> {
        while !self.exited {
            let Some(msg) = self.pending_messages.pop_front() else {
                break;
            };
            self.send(msg)?;
        }
        Ok(())
    }

    /// Deliver every value of a finite subscription as a message, then
    /// drain. Keyboard subscriptions read from `terminal`.
    pub fn feed(
        &mut self,
        subscription: Subscription<A::Message>,
        terminal: &TerminalHandle,
    ) -> Result<(), A::Error> {
        let ctx = SubscriptionContext::new(terminal.clone());
        let items = self.bridge.block_on(async {
            use futures::StreamExt;
            subscription.into_stream(&ctx).collect::<Vec<_>>().await
        });
        self.pending_messages
            .extend(items.into_iter().filter_map(Result::ok));
        self.drain_messages()
    }

    /// The current state.
    pub fn state(&self) -> &A::State {
        self.state.as_ref().expect("state is present between updates")
    }

    /// Messages waiting to be processed.
    pub fn pending(&self) -> usize {
        self.pending_messages.len()
    }

    /// Whether a command containing [`Command::exit`] has been returned, or
    /// `update` failed.
    pub fn has_exited(&self) -> bool {
        self.exited
    }

    /// Render the current view at the given size.
    pub fn render_string(&self, columns: u16, rows: u16) -> String {
        render(&self.app.view(self.state()), columns, rows)
    }

    fn run_command(&mut self, cmd: Command<A::Env, A::Message>) {
        if cmd.contains_exit() {
            self.exited = true;
        }
        let pending = &mut self.pending_messages;
        self.bridge
            .convert_command(cmd, &self.env, |msg| pending.push_back(msg));
    }
}
