//! Core runtime for the **tern** terminal application framework.
//!
//! `tern-core` runs applications written in the Model-View-Update style:
//! state is a plain value, `update` is a pure function from a message and
//! the current state to the next state, and every side effect is described
//! as data ([`Command`]s and [`Subscription`]s) and executed by the runtime.
//!
//! # Key types
//!
//! | Type | Purpose |
//! |------|---------|
//! | [`Application`] | The init / update / view / subscriptions contract |
//! | [`Command`] | Deferred effects: none, exit, effect, fire, batch |
//! | [`Subscription`] | Lazy event sources: [`tick`](subscriptions::tick), [`watch_file`](subscriptions::watch_file), [`key_press`](subscriptions::key_press), [`merge`] |
//! | [`Key`] | A decoded key press |
//! | [`Program`] | Owns the terminal session and drives the loop |
//! | [`Bridge`] | Runs commands and finite streams from synchronous code |
//! | [`TestProgram`](testing::TestProgram) | Headless harness for unit-testing an [`Application`] |
//!
//! # Architecture
//!
//! 1. **init** -- [`Application::init`] creates the initial state and may
//!    return a [`Command`] to kick off early work.
//! 2. **view** -- The runtime calls [`Application::view`] and writes the
//!    rendered [`Element`] to the terminal when it changed.
//! 3. **event** -- Key presses, timers and file changes arrive through the
//!    subscription returned by [`Application::subscriptions`].
//! 4. **update** -- [`Application::update`] receives a message and the
//!    current state and returns the next state and a [`Command`].
//! 5. **repeat** -- Steps 2-4 repeat until a command contains
//!    [`Command::exit`].
//!
//! Raw mode and the alternate screen are held by scoped guards
//! ([`TerminalSession`]), so the terminal is restored on every exit path,
//! including errors and panics in application code.
//!
//! # Quick example
//!
//! ```ignore
//! use tern_core::{Application, Command, Key, Subscription};
//! use tern_core::subscriptions::key_press;
//!
//! struct Counter;
//!
//! enum Msg { Increment, Quit }
//!
//! impl Application for Counter {
//!     type State = i32;
//!     type Message = Msg;
//!     type Env = ();
//!     type Error = std::convert::Infallible;
//!     type Element = String;
//!
//!     fn init(&self) -> Result<(i32, Command<(), Msg>), Self::Error> {
//!         Ok((0, Command::none()))
//!     }
//!
//!     fn update(&self, msg: Msg, count: i32) -> Result<(i32, Command<(), Msg>), Self::Error> {
//!         Ok(match msg {
//!             Msg::Increment => (count + 1, Command::none()),
//!             Msg::Quit => (count, Command::exit()),
//!         })
//!     }
//!
//!     fn subscriptions(&self, _: &i32) -> Subscription<Msg> {
//!         key_press(|key| match key {
//!             Key::Character('+') => Some(Msg::Increment),
//!             Key::Character('q') => Some(Msg::Quit),
//!             _ => None,
//!         })
//!     }
//!
//!     fn view(&self, count: &i32) -> String {
//!         format!("Count: {count}")
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     tern_core::run(Counter, ()).await.unwrap();
//! }
//! ```

pub mod application;
pub mod backend;
pub mod bridge;
pub mod clock;
pub mod command;
pub mod interpret;
pub mod key;
pub mod logging;
pub mod render;
pub mod runtime;
pub mod subscription;
pub mod subscriptions;
pub mod terminal;
pub mod testing;

pub use application::Application;
pub use backend::{CrosstermDriver, OutputTarget};
pub use bridge::Bridge;
pub use clock::{Clock, TokioClock};
pub use command::{Command, EffectError};
pub use interpret::interpret;
pub use key::{decode, Key};
pub use logging::{log_to_file, LoggingError};
pub use render::{render, Element};
pub use runtime::{Program, ProgramError, ProgramHandle, ProgramOptions};
pub use subscription::{
    merge, Subscription, SubscriptionContext, SubscriptionError, SubscriptionId,
    SubscriptionStream,
};
pub use terminal::{
    AltScreenGuard, RawModeGuard, TerminalDriver, TerminalHandle, TerminalSession,
};

/// Run an application on the real terminal with default options.
pub async fn run<A: Application>(
    app: A,
    env: A::Env,
) -> Result<A::State, ProgramError<A::Error>> {
    Program::new(app, env).run().await
}

/// Run with custom options.
pub async fn run_with<A: Application>(
    app: A,
    env: A::Env,
    options: ProgramOptions,
) -> Result<A::State, ProgramError<A::Error>> {
    Program::with_options(app, env, options).run().await
}
