use crate::command::Command;
use crate::render::Element;
use crate::subscription::Subscription;

/// The top-level application trait, following the [Elm Architecture].
///
/// An application is a set of pure functions over a `State` value it does
/// not own. The runtime drives a continuous **init -> update -> view**
/// cycle:
///
/// 1. [`init`](Application::init) creates the initial state and may return a
///    [`Command`] for early side effects (e.g. loading data).
/// 2. [`view`](Application::view) renders the current state to an
///    [`Element`].
/// 3. External events arrive as messages through the [`Subscription`]
///    returned by [`subscriptions`](Application::subscriptions).
/// 4. [`update`](Application::update) takes the current state and a message
///    and returns the replacement state and a [`Command`].
/// 5. Steps 2--4 repeat until a command contains [`Command::exit`].
///
/// Effects never run inside these functions: they are described by the
/// returned commands and executed by the runtime with `Env`.
///
/// # Example
///
/// ```rust,ignore
/// use tern_core::{Application, Command, Subscription, subscriptions::key_press, Key};
///
/// struct Counter;
///
/// enum Msg { Increment, Decrement, Quit }
///
/// impl Application for Counter {
///     type State = i64;
///     type Message = Msg;
///     type Env = ();
///     type Error = std::convert::Infallible;
///     type Element = String;
///
///     fn init(&self) -> Result<(i64, Command<(), Msg>), Self::Error> {
///         Ok((0, Command::none()))
///     }
///
///     fn update(&self, msg: Msg, count: i64) -> Result<(i64, Command<(), Msg>), Self::Error> {
///         Ok(match msg {
///             Msg::Increment => (count + 1, Command::none()),
///             Msg::Decrement => (count - 1, Command::none()),
///             Msg::Quit => (count, Command::exit()),
///         })
///     }
///
///     fn subscriptions(&self, _: &i64) -> Subscription<Msg> {
///         key_press(|key| match key {
///             Key::Character('+') => Some(Msg::Increment),
///             Key::Character('-') => Some(Msg::Decrement),
///             Key::Character('q') => Some(Msg::Quit),
///             _ => None,
///         })
///     }
///
///     fn view(&self, count: &i64) -> String {
///         format!("Count: {count}")
///     }
/// }
/// ```
///
/// [Elm Architecture]: https://guide.elm-lang.org/architecture/
pub trait Application: Send + 'static {
    /// The application state. Replaced wholesale by every update.
    type State: Send + 'static;

    /// Every event that can affect the state is a variant of this type.
    type Message: Send + 'static;

    /// Dependencies handed to every effect when it runs (clients, paths,
    /// configuration). Use `()` when effects need nothing.
    type Env: Clone + Send + Sync + 'static;

    /// Typed failure of [`init`](Application::init) or
    /// [`update`](Application::update). Ends the program.
    type Error: std::error::Error + Send + Sync + 'static;

    /// What [`view`](Application::view) returns.
    type Element: Element;

    /// Create the initial state and a startup command.
    fn init(&self) -> Result<(Self::State, Command<Self::Env, Self::Message>), Self::Error>;

    /// Consume the current state and a message; return the next state and a
    /// command. After `update` returns, the runtime re-renders and
    /// re-evaluates [`subscriptions`](Application::subscriptions).
    fn update(
        &self,
        msg: Self::Message,
        state: Self::State,
    ) -> Result<(Self::State, Command<Self::Env, Self::Message>), Self::Error>;

    /// The event sources that should be active for `state`. Called after
    /// every update; the running subscription is only restarted when the
    /// returned one has a different [`id`](Subscription::id).
    ///
    /// The default implementation subscribes to nothing.
    fn subscriptions(&self, _state: &Self::State) -> Subscription<Self::Message> {
        Subscription::none()
    }

    /// Render the state. Must be a pure function of `state`.
    fn view(&self, state: &Self::State) -> Self::Element;

    /// A command to run when the program exits normally. It runs to
    /// completion before the terminal is released; any messages it produces
    /// are discarded.
    fn on_exit(&self, _state: &Self::State) -> Command<Self::Env, Self::Message> {
        Command::none()
    }
}
