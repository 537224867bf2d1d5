use crate::application::Application;
use crate::backend::{CrosstermDriver, OutputTarget};
use crate::clock::Clock;
use crate::command::Command;
use crate::interpret::{interpret, panic_message};
use crate::render::render;
use crate::subscription::{SubscriptionContext, SubscriptionManager};
use crate::terminal::{TerminalHandle, TerminalSession};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinSet;

/// Errors that end a [`Program`].
///
/// The terminal has always been restored by the time one of these is
/// returned.
#[derive(Debug, thiserror::Error)]
pub enum ProgramError<E> {
    /// An I/O error from terminal setup, rendering, or teardown.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// [`Application::init`] returned an error.
    #[error("init failed: {0}")]
    Init(#[source] E),
    /// [`Application::update`] returned an error.
    #[error("update failed: {0}")]
    Update(#[source] E),
    /// `init`, or the first `view`, panicked.
    #[error("init panicked: {0}")]
    InitDefect(String),
    /// `update`, `view` or `subscriptions` panicked.
    #[error("update panicked: {0}")]
    UpdateDefect(String),
}

/// Configuration options for a [`Program`].
///
/// Use struct update syntax to override only the options you need:
///
/// ```rust,ignore
/// use tern_core::{OutputTarget, ProgramOptions};
///
/// let opts = ProgramOptions {
///     alt_screen: false,
///     output: OutputTarget::Stderr,
///     ..ProgramOptions::default()
/// };
/// ```
#[derive(Debug, Clone)]
pub struct ProgramOptions {
    /// Draw on the alternate screen (default: true).
    pub alt_screen: bool,
    /// Exit cleanly on Ctrl+C / SIGINT (default: true).
    pub handle_signals: bool,
    /// Output target: stdout (default) or stderr.
    pub output: OutputTarget,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        Self {
            alt_screen: true,
            handle_signals: true,
            output: OutputTarget::default(),
        }
    }
}

/// A cloneable handle to a running [`Program`] for external control.
///
/// * [`send`](ProgramHandle::send) -- inject a message into the program's
///   event loop from outside.
/// * [`kill`](ProgramHandle::kill) -- make the program exit as soon as the
///   loop next waits, running the normal exit path.
///
/// Obtain a handle with [`Program::handle`] before calling
/// [`Program::run`].
pub struct ProgramHandle<Msg: Send + 'static> {
    msg_tx: mpsc::UnboundedSender<Msg>,
    kill_tx: Arc<watch::Sender<bool>>,
}

impl<Msg: Send + 'static> Clone for ProgramHandle<Msg> {
    fn clone(&self) -> Self {
        Self {
            msg_tx: self.msg_tx.clone(),
            kill_tx: self.kill_tx.clone(),
        }
    }
}

impl<Msg: Send + 'static> ProgramHandle<Msg> {
    /// Send a message to the program. Ignored once the program has exited.
    pub fn send(&self, msg: Msg) {
        let _ = self.msg_tx.send(msg);
    }

    /// Ask the program to exit.
    pub fn kill(&self) {
        self.kill_tx.send_replace(true);
    }
}

#[derive(Debug, Clone, Copy)]
enum Phase {
    Starting,
    Running,
    Exiting,
    Stopped,
}

fn enter(phase: Phase) {
    tracing::debug!(?phase, "program phase");
}

enum Step<S> {
    Continue(S),
    Exit(S),
}

type MessageFilter<Msg> = Box<dyn Fn(Msg) -> Option<Msg> + Send + Sync>;

/// The program runtime. Owns the terminal session and drives the
/// [`Application`] lifecycle.
///
/// `Program` wires an application to a terminal and runs the
/// init/update/view loop until a command contains [`Command::exit`], the
/// process receives Ctrl+C, or a [`ProgramHandle`] kills it. Whichever way
/// it ends, subscriptions are cancelled, pending commands are aborted and
/// the terminal is restored (alternate screen first, then the input mode)
/// before [`run`](Program::run) returns.
///
/// # Example
///
/// ```rust,ignore
/// use tern_core::{Program, ProgramError};
///
/// #[tokio::main]
/// async fn main() -> Result<(), ProgramError<MyError>> {
///     let state = Program::new(MyApp, ()).run().await?;
///     // `state` is the final state after exit
///     Ok(())
/// }
/// ```
pub struct Program<A: Application> {
    app: A,
    env: A::Env,
    terminal: TerminalHandle,
    options: ProgramOptions,
    msg_tx: mpsc::UnboundedSender<A::Message>,
    msg_rx: mpsc::UnboundedReceiver<A::Message>,
    kill_tx: Arc<watch::Sender<bool>>,
    kill_rx: watch::Receiver<bool>,
    subscriptions: SubscriptionManager<A::Message>,
    tasks: JoinSet<()>,
    filter: Option<MessageFilter<A::Message>>,
    last_frame: Option<String>,
}

impl<A: Application> Program<A> {
    /// Create a program on the real terminal with default options.
    pub fn new(app: A, env: A::Env) -> Self {
        Self::with_options(app, env, ProgramOptions::default())
    }

    /// Create a program on the real terminal with custom options.
    pub fn with_options(app: A, env: A::Env, options: ProgramOptions) -> Self {
        let terminal = TerminalHandle::new(CrosstermDriver::new(options.output));
        Self::with_terminal(app, env, terminal, options)
    }

    /// Create a program on any terminal driver, e.g. a
    /// [`TestTerminal`](crate::testing::TestTerminal).
    pub fn with_terminal(
        app: A,
        env: A::Env,
        terminal: TerminalHandle,
        options: ProgramOptions,
    ) -> Self {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        let ctx = SubscriptionContext::new(terminal.clone());
        Self {
            app,
            env,
            subscriptions: SubscriptionManager::new(ctx, msg_tx.clone()),
            terminal,
            options,
            msg_tx,
            msg_rx,
            kill_tx: Arc::new(kill_tx),
            kill_rx,
            tasks: JoinSet::new(),
            filter: None,
            last_frame: None,
        }
    }

    /// Use `clock` for timer and polling subscriptions.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        let ctx = SubscriptionContext::new(self.terminal.clone()).with_clock(clock);
        self.subscriptions = SubscriptionManager::new(ctx, self.msg_tx.clone());
        self
    }

    /// Set a message filter. Messages pass through the filter before reaching `update`.
    /// Return `Some(msg)` to pass (possibly transformed), `None` to drop.
    pub fn with_filter(
        mut self,
        filter: impl Fn(A::Message) -> Option<A::Message> + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Get a sender for external message injection.
    pub fn sender(&self) -> mpsc::UnboundedSender<A::Message> {
        self.msg_tx.clone()
    }

    /// Get a handle for external control (send messages, kill).
    pub fn handle(&self) -> ProgramHandle<A::Message> {
        ProgramHandle {
            msg_tx: self.msg_tx.clone(),
            kill_tx: self.kill_tx.clone(),
        }
    }

    /// Run the program until it exits and return the final state.
    pub async fn run(mut self) -> Result<A::State, ProgramError<A::Error>> {
        enter(Phase::Starting);
        let session = TerminalSession::begin(&self.terminal, self.options.alt_screen)?;

        let outcome = self.event_loop().await;
        match &outcome {
            Ok(_) => enter(Phase::Exiting),
            Err(err) => tracing::debug!(phase = "Failed", error = %err, "program phase"),
        }

        // Subscriptions first, so guards they hold drop before the session's.
        self.subscriptions.shutdown().await;
        self.tasks.abort_all();
        while self.tasks.join_next().await.is_some() {}

        if let Ok(state) = &outcome {
            self.run_exit_command(state).await;
        }

        drop(session);
        enter(Phase::Stopped);
        outcome
    }

    async fn event_loop(&mut self) -> Result<A::State, ProgramError<A::Error>> {
        let app = &self.app;
        let init = contain::<_, A::Error>(|| app.init(), ProgramError::InitDefect)?;
        let (state, init_cmd) = match init {
            Ok(init) => init,
            Err(err) => return Err(ProgramError::Init(err)),
        };
        self.draw(&state, ProgramError::InitDefect)?;

        if init_cmd.contains_exit() {
            self.run_inline(init_cmd).await;
            return Ok(state);
        }
        self.dispatch(init_cmd);
        let app = &self.app;
        let sub =
            contain::<_, A::Error>(|| app.subscriptions(&state), ProgramError::InitDefect)?;
        self.subscriptions.reconcile(sub).await;

        enter(Phase::Running);
        let handle_signals = self.options.handle_signals;
        let mut state = state;

        loop {
            tokio::select! {
                biased;

                _ = tokio::signal::ctrl_c(), if handle_signals => {
                    tracing::debug!("received ctrl+c signal");
                    return Ok(state);
                }

                _ = self.kill_rx.changed() => {
                    tracing::debug!("program killed");
                    return Ok(state);
                }

                Some(msg) = self.msg_rx.recv() => {
                    match self.process_message(msg, state).await? {
                        Step::Continue(next) => state = next,
                        Step::Exit(last) => return Ok(last),
                    }
                }

                Some(_) = self.tasks.join_next(), if !self.tasks.is_empty() => {}
            }
        }
    }

    async fn process_message(
        &mut self,
        msg: A::Message,
        state: A::State,
    ) -> Result<Step<A::State>, ProgramError<A::Error>> {
        let msg = if let Some(ref filter) = self.filter {
            match filter(msg) {
                Some(msg) => msg,
                None => return Ok(Step::Continue(state)),
            }
        } else {
            msg
        };

        let app = &self.app;
        let updated =
            contain::<_, A::Error>(|| app.update(msg, state), ProgramError::UpdateDefect)?;
        let (state, cmd) = match updated {
            Ok(next) => next,
            Err(err) => return Err(ProgramError::Update(err)),
        };

        if cmd.contains_exit() {
            self.run_inline(cmd).await;
            return Ok(Step::Exit(state));
        }

        self.dispatch(cmd);
        self.draw(&state, ProgramError::UpdateDefect)?;

        let app = &self.app;
        let sub =
            contain::<_, A::Error>(|| app.subscriptions(&state), ProgramError::UpdateDefect)?;
        self.subscriptions.reconcile(sub).await;

        Ok(Step::Continue(state))
    }

    /// Interpret `cmd` in its own task; messages come back on the channel.
    fn dispatch(&mut self, cmd: Command<A::Env, A::Message>) {
        if cmd.is_none() {
            return;
        }
        let env = self.env.clone();
        let tx = self.msg_tx.clone();
        self.tasks.spawn(async move {
            interpret(cmd, &env, |msg| {
                let _ = tx.send(msg);
            })
            .await;
        });
    }

    /// Run an exiting command to completion. Its messages are dropped since
    /// no update will see them.
    async fn run_inline(&self, cmd: Command<A::Env, A::Message>) {
        let mut dropped = 0usize;
        interpret(cmd, &self.env, |_| dropped += 1).await;
        if dropped > 0 {
            tracing::debug!(dropped, "messages produced while exiting were discarded");
        }
    }

    async fn run_exit_command(&self, state: &A::State) {
        let app = &self.app;
        match catch_unwind(AssertUnwindSafe(|| app.on_exit(state))) {
            Ok(cmd) => self.run_inline(cmd).await,
            Err(panic) => {
                tracing::error!(panic = %panic_message(panic.as_ref()), "on_exit panicked");
            }
        }
    }

    fn draw(
        &mut self,
        state: &A::State,
        defect: fn(String) -> ProgramError<A::Error>,
    ) -> Result<(), ProgramError<A::Error>> {
        let (columns, rows) = self.terminal.size()?;
        let app = &self.app;
        let frame = contain(|| render(&app.view(state), columns, rows), defect)?;
        if self.last_frame.as_deref() == Some(frame.as_str()) {
            return Ok(());
        }
        self.terminal.present(&frame)?;
        self.last_frame = Some(frame);
        Ok(())
    }
}

/// Run `f`, turning a panic into the given defect error.
fn contain<T, E>(
    f: impl FnOnce() -> T,
    defect: fn(String) -> ProgramError<E>,
) -> Result<T, ProgramError<E>> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|panic| defect(panic_message(panic.as_ref())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Key;
    use crate::subscription::Subscription;
    use crate::subscriptions::key_press;
    use crate::testing::{TerminalOp, TestTerminal};
    use std::convert::Infallible;
    use std::io;
    use std::sync::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    #[derive(Debug, thiserror::Error)]
    #[error("counter failed")]
    struct CounterError;

    struct Counter;

    #[derive(Debug)]
    enum Msg {
        Increment,
        Decrement,
        Noop,
        Bump,
        SaveAndQuit,
        Quit,
        Fail,
        Explode,
    }

    impl Application for Counter {
        type State = i64;
        type Message = Msg;
        type Env = Log;
        type Error = CounterError;
        type Element = String;

        fn init(&self) -> Result<(i64, Command<Log, Msg>), CounterError> {
            Ok((0, Command::none()))
        }

        fn update(&self, msg: Msg, count: i64) -> Result<(i64, Command<Log, Msg>), CounterError> {
            Ok(match msg {
                Msg::Increment => (count + 1, Command::none()),
                Msg::Decrement => (count - 1, Command::none()),
                Msg::Noop => (count, Command::none()),
                Msg::Bump => (
                    count,
                    Command::batch([
                        Command::message(Msg::Increment),
                        Command::message(Msg::Increment),
                        Command::message(Msg::Quit),
                    ]),
                ),
                Msg::SaveAndQuit => (
                    count,
                    Command::batch([
                        Command::fire(|log: Log| async move {
                            log.lock().unwrap().push("saved".to_string());
                            Ok::<_, io::Error>(())
                        }),
                        Command::exit(),
                    ]),
                ),
                Msg::Quit => (count, Command::exit()),
                Msg::Fail => return Err(CounterError),
                Msg::Explode => panic!("update exploded"),
            })
        }

        fn subscriptions(&self, _count: &i64) -> Subscription<Msg> {
            key_press(|key| match key {
                Key::Character('+') => Some(Msg::Increment),
                Key::Character('-') => Some(Msg::Decrement),
                Key::Character('q') => Some(Msg::Quit),
                Key::Character('s') => Some(Msg::SaveAndQuit),
                Key::Character('!') => Some(Msg::Fail),
                Key::Character('#') => Some(Msg::Explode),
                _ => None,
            })
        }

        fn view(&self, count: &i64) -> String {
            format!("Count: {count}")
        }

        fn on_exit(&self, count: &i64) -> Command<Log, Msg> {
            let line = format!("exit at {count}");
            Command::fire(move |log: Log| async move {
                log.lock().unwrap().push(line);
                Ok::<_, io::Error>(())
            })
        }
    }

    fn options() -> ProgramOptions {
        ProgramOptions {
            handle_signals: false,
            ..ProgramOptions::default()
        }
    }

    fn program(tty: &TestTerminal, log: &Log) -> Program<Counter> {
        Program::with_terminal(
            Counter,
            log.clone(),
            TerminalHandle::new(tty.clone()),
            options(),
        )
    }

    fn assert_restored(tty: &TestTerminal) {
        assert!(!tty.is_raw_mode());
        assert!(!tty.is_alternate_screen());
        let ops = tty.ops();
        assert_eq!(
            &ops[ops.len() - 2..],
            &[TerminalOp::ExitAlternateScreen, TerminalOp::RestoreMode]
        );
    }

    #[tokio::test]
    async fn counter_end_to_end() {
        let tty = TestTerminal::new();
        tty.type_str("++-q");
        let log = Log::default();

        let state = program(&tty, &log).run().await.unwrap();

        assert_eq!(state, 1);
        assert_eq!(tty.frames(), vec!["Count: 0", "Count: 1", "Count: 2", "Count: 1"]);
        assert_restored(&tty);
        let raw_entries = tty
            .ops()
            .iter()
            .filter(|op| **op == TerminalOp::EnterRawMode)
            .count();
        assert_eq!(raw_entries, 1);
        assert_eq!(*log.lock().unwrap(), vec!["exit at 1"]);
    }

    #[tokio::test]
    async fn exit_command_runs_to_completion_before_on_exit() {
        let tty = TestTerminal::new();
        tty.type_str("+s");
        let log = Log::default();

        let state = program(&tty, &log).run().await.unwrap();

        assert_eq!(state, 1);
        assert_eq!(*log.lock().unwrap(), vec!["saved", "exit at 1"]);
        assert_restored(&tty);
    }

    #[tokio::test]
    async fn update_error_restores_terminal() {
        let tty = TestTerminal::new();
        tty.type_str("+!+");
        let log = Log::default();

        let err = program(&tty, &log).run().await.unwrap_err();

        assert!(matches!(err, ProgramError::Update(CounterError)));
        assert_eq!(tty.frames(), vec!["Count: 0", "Count: 1"]);
        assert_restored(&tty);
        assert!(log.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn update_panic_restores_terminal() {
        let tty = TestTerminal::new();
        tty.type_str("#");
        let log = Log::default();

        let err = program(&tty, &log).run().await.unwrap_err();

        match err {
            ProgramError::UpdateDefect(message) => assert!(message.contains("update exploded")),
            other => panic!("expected UpdateDefect, got {other:?}"),
        }
        assert_restored(&tty);
    }

    #[tokio::test]
    async fn messages_from_commands_reach_update() {
        let tty = TestTerminal::new();
        let log = Log::default();
        let program = program(&tty, &log);
        program.sender().send(Msg::Bump).unwrap();

        let state = program.run().await.unwrap();

        assert_eq!(state, 2);
        assert_eq!(tty.frames(), vec!["Count: 0", "Count: 1", "Count: 2"]);
    }

    #[tokio::test]
    async fn filter_drops_messages_and_identical_frames_are_skipped() {
        let tty = TestTerminal::new();
        let log = Log::default();
        let program = program(&tty, &log).with_filter(|msg| match msg {
            Msg::Decrement => None,
            other => Some(other),
        });
        let handle = program.handle();
        for msg in [Msg::Increment, Msg::Decrement, Msg::Noop, Msg::Increment, Msg::Quit] {
            handle.send(msg);
        }

        let state = program.run().await.unwrap();

        assert_eq!(state, 2);
        assert_eq!(tty.frames(), vec!["Count: 0", "Count: 1", "Count: 2"]);
    }

    #[tokio::test]
    async fn kill_runs_normal_exit_path() {
        let tty = TestTerminal::new();
        let log = Log::default();
        let program = program(&tty, &log);
        program.handle().kill();

        let state = program.run().await.unwrap();

        assert_eq!(state, 0);
        assert_eq!(tty.frames(), vec!["Count: 0"]);
        assert_eq!(*log.lock().unwrap(), vec!["exit at 0"]);
        assert_restored(&tty);
    }

    #[tokio::test]
    async fn cancelled_run_restores_terminal() {
        let tty = TestTerminal::new();
        let log = Log::default();

        let run = program(&tty, &log).run();
        let outcome = tokio::time::timeout(Duration::from_millis(100), run).await;
        assert!(outcome.is_err());

        // The aborted subscription task is dropped on a later scheduler turn.
        for _ in 0..200 {
            if !tty.is_raw_mode() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(!tty.is_raw_mode());
        assert!(!tty.is_alternate_screen());
        assert_eq!(tty.ops().last(), Some(&TerminalOp::RestoreMode));
    }

    #[tokio::test]
    async fn without_alternate_screen() {
        let tty = TestTerminal::new();
        tty.type_str("q");
        let log = Log::default();
        let options = ProgramOptions {
            alt_screen: false,
            ..options()
        };

        Program::with_terminal(Counter, log, TerminalHandle::new(tty.clone()), options)
            .run()
            .await
            .unwrap();

        assert!(!tty.ops().contains(&TerminalOp::EnterAlternateScreen));
        assert_eq!(tty.ops().last(), Some(&TerminalOp::RestoreMode));
    }

    #[tokio::test]
    async fn failed_raw_mode_is_io_error() {
        let tty = TestTerminal::new();
        tty.fail_raw_mode();

        let err = program(&tty, &Log::default()).run().await.unwrap_err();

        assert!(matches!(err, ProgramError::Io(_)));
        assert!(tty.ops().is_empty());
    }

    struct Broken {
        panic: bool,
    }

    impl Application for Broken {
        type State = ();
        type Message = ();
        type Env = ();
        type Error = CounterError;
        type Element = String;

        fn init(&self) -> Result<((), Command<(), ()>), CounterError> {
            if self.panic {
                panic!("init exploded");
            }
            Err(CounterError)
        }

        fn update(&self, _: (), _: ()) -> Result<((), Command<(), ()>), CounterError> {
            Ok(((), Command::none()))
        }

        fn view(&self, _: &()) -> String {
            String::new()
        }
    }

    #[tokio::test]
    async fn init_failures_restore_terminal() {
        for panic in [false, true] {
            let tty = TestTerminal::new();
            let terminal = TerminalHandle::new(tty.clone());

            let err = Program::with_terminal(Broken { panic }, (), terminal, options())
                .run()
                .await
                .unwrap_err();

            if panic {
                assert!(matches!(err, ProgramError::InitDefect(_)));
            } else {
                assert!(matches!(err, ProgramError::Init(CounterError)));
            }
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
    }

    struct ExitAtOnce;

    impl Application for ExitAtOnce {
        type State = &'static str;
        type Message = Infallible;
        type Env = ();
        type Error = Infallible;
        type Element = &'static str;

        fn init(&self) -> Result<(&'static str, Command<(), Infallible>), Infallible> {
            Ok(("done", Command::exit()))
        }

        fn update(
            &self,
            msg: Infallible,
            _: &'static str,
        ) -> Result<(&'static str, Command<(), Infallible>), Infallible> {
            match msg {}
        }

        fn view(&self, state: &&'static str) -> &'static str {
            *state
        }
    }

    #[tokio::test]
    async fn init_exit_renders_once_and_stops() {
        let tty = TestTerminal::new();
        let terminal = TerminalHandle::new(tty.clone());
        let state = Program::with_terminal(ExitAtOnce, (), terminal, options())
            .run()
            .await
            .unwrap();

        assert_eq!(state, "done");
        assert_eq!(tty.frames(), vec!["done"]);
        assert_restored(&tty);
    }
}
