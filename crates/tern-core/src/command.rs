use futures::future::BoxFuture;
use futures::FutureExt;
use std::future::Future;
use std::sync::Arc;

/// Failure value produced by a command's effect.
///
/// Effects may fail with any error convertible into this box; the
/// interpreter logs it and produces no message.
pub type EffectError = Box<dyn std::error::Error + Send + Sync>;

/// A deferred effect: given the environment, build the future to run.
///
/// Nothing happens until the interpreter calls the closure.
pub(crate) type Job<Env, T> =
    Box<dyn FnOnce(Env) -> BoxFuture<'static, Result<T, EffectError>> + Send>;

/// A side effect returned from [`Application::init`](crate::Application::init)
/// or [`Application::update`](crate::Application::update).
///
/// Commands describe work as data. The runtime decides when and how it runs,
/// which keeps `update` pure and testable. `Env` is the dependency handle
/// every effect receives when it is eventually executed.
///
/// # Examples
///
/// ```rust,ignore
/// // Do nothing:
/// let cmd = Command::none();
///
/// // Load a file and map its content to a message:
/// let cmd = Command::effect(
///     |env: Env| async move { tokio::fs::read_to_string(env.path).await },
///     Msg::Loaded,
/// );
///
/// // Stop the program:
/// let cmd = Command::exit();
/// ```
pub struct Command<Env, Msg> {
    pub(crate) inner: CommandInner<Env, Msg>,
}

pub(crate) enum CommandInner<Env, Msg> {
    None,
    Exit,
    Effect(Job<Env, Msg>),
    Fire(Job<Env, ()>),
    Batch(Vec<Command<Env, Msg>>),
}

impl<Env, Msg> std::fmt::Debug for Command<Env, Msg> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.inner {
            CommandInner::None => f.write_str("None"),
            CommandInner::Exit => f.write_str("Exit"),
            CommandInner::Effect(_) => f.write_str("Effect(..)"),
            CommandInner::Fire(_) => f.write_str("Fire(..)"),
            CommandInner::Batch(cmds) => f.debug_tuple("Batch").field(cmds).finish(),
        }
    }
}

impl<Env, Msg> Default for Command<Env, Msg> {
    fn default() -> Self {
        Command {
            inner: CommandInner::None,
        }
    }
}

impl<Env, Msg> Command<Env, Msg>
where
    Env: Send + 'static,
    Msg: Send + 'static,
{
    /// No-op command. Identity element for [`batch`](Command::batch) and
    /// [`combine`](Command::combine).
    pub fn none() -> Self {
        Command {
            inner: CommandInner::None,
        }
    }

    /// Stop the program after this update cycle.
    pub fn exit() -> Self {
        Command {
            inner: CommandInner::Exit,
        }
    }

    /// Run `effect` with the environment and map its success value to a
    /// message. A failure is logged and produces no message.
    pub fn effect<F, Fut, A, E>(
        effect: F,
        to_message: impl FnOnce(A) -> Msg + Send + 'static,
    ) -> Self
    where
        F: FnOnce(Env) -> Fut + Send + 'static,
        Fut: Future<Output = Result<A, E>> + Send + 'static,
        A: Send + 'static,
        E: Into<EffectError> + 'static,
    {
        Command {
            inner: CommandInner::Effect(Box::new(move |env| {
                let fut = effect(env);
                async move { fut.await.map(to_message).map_err(Into::into) }.boxed()
            })),
        }
    }

    /// Run `effect` for its side effects only. It never produces a message;
    /// failures are logged.
    pub fn fire<F, Fut, E>(effect: F) -> Self
    where
        F: FnOnce(Env) -> Fut + Send + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<EffectError> + 'static,
    {
        Command {
            inner: CommandInner::Fire(Box::new(move |env| {
                let fut = effect(env);
                async move { fut.await.map_err(Into::into) }.boxed()
            })),
        }
    }

    /// Run `effect` and hand its full result, success or failure, to
    /// `to_message`. Use this when the application must react to failures
    /// instead of having them logged and dropped.
    pub fn attempt<F, Fut, A, E>(
        effect: F,
        to_message: impl FnOnce(Result<A, E>) -> Msg + Send + 'static,
    ) -> Self
    where
        F: FnOnce(Env) -> Fut + Send + 'static,
        Fut: Future<Output = Result<A, E>> + Send + 'static,
        A: Send + 'static,
        E: Send + 'static,
    {
        Command {
            inner: CommandInner::Effect(Box::new(move |env| {
                let fut = effect(env);
                async move { Ok(to_message(fut.await)) }.boxed()
            })),
        }
    }

    /// Run an environment-free future and map its output to a message.
    pub fn perform<F, T>(future: F, map: impl FnOnce(T) -> Msg + Send + 'static) -> Self
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Command {
            inner: CommandInner::Effect(Box::new(move |_env| {
                async move { Ok(map(future.await)) }.boxed()
            })),
        }
    }

    /// Deliver a message immediately.
    pub fn message(msg: Msg) -> Self {
        Command {
            inner: CommandInner::Effect(Box::new(move |_env| {
                futures::future::ready(Ok(msg)).boxed()
            })),
        }
    }

    /// Run the given commands one after another, in order.
    ///
    /// `none` entries are dropped. No survivors gives [`Command::none`]; a
    /// single survivor is returned as-is rather than wrapped.
    pub fn batch(cmds: impl IntoIterator<Item = Command<Env, Msg>>) -> Self {
        let mut cmds: Vec<_> = cmds.into_iter().filter(|cmd| !cmd.is_none()).collect();
        match cmds.len() {
            0 => Command::none(),
            1 => cmds.pop().unwrap_or_default(),
            _ => Command {
                inner: CommandInner::Batch(cmds),
            },
        }
    }

    /// Append `other` after `self`.
    ///
    /// Batch operands are spliced, so `batch([a, b]).combine(c)` is a
    /// three-element batch. Associative, with [`Command::none`] as identity.
    pub fn combine(self, other: Command<Env, Msg>) -> Self {
        let mut parts = self.into_parts();
        parts.extend(other.into_parts());
        Command::batch(parts)
    }

    fn into_parts(self) -> Vec<Command<Env, Msg>> {
        match self.inner {
            CommandInner::Batch(cmds) => cmds,
            inner => vec![Command { inner }],
        }
    }

    /// Transform the message type (for composing sub-applications).
    pub fn map<NewMsg: Send + 'static>(
        self,
        f: impl Fn(Msg) -> NewMsg + Send + Sync + 'static,
    ) -> Command<Env, NewMsg> {
        self.map_with(Arc::new(f))
    }

    fn map_with<NewMsg: Send + 'static>(
        self,
        f: Arc<dyn Fn(Msg) -> NewMsg + Send + Sync>,
    ) -> Command<Env, NewMsg> {
        match self.inner {
            CommandInner::None => Command::none(),
            CommandInner::Exit => Command::exit(),
            CommandInner::Effect(job) => Command {
                inner: CommandInner::Effect(Box::new(move |env| {
                    let fut = job(env);
                    async move { fut.await.map(|msg| f(msg)) }.boxed()
                })),
            },
            CommandInner::Fire(job) => Command {
                inner: CommandInner::Fire(job),
            },
            CommandInner::Batch(cmds) => Command {
                inner: CommandInner::Batch(
                    cmds.into_iter()
                        .map(|cmd| cmd.map_with(f.clone()))
                        .collect(),
                ),
            },
        }
    }

    // --- Inspection methods (useful for testing) ---

    /// Returns `true` if this is a no-op command.
    pub fn is_none(&self) -> bool {
        matches!(self.inner, CommandInner::None)
    }

    /// Returns `true` if this is exactly [`Command::exit`].
    pub fn is_exit(&self) -> bool {
        matches!(self.inner, CommandInner::Exit)
    }

    /// Returns `true` if this command is, or anywhere contains, an exit.
    pub fn contains_exit(&self) -> bool {
        match &self.inner {
            CommandInner::Exit => true,
            CommandInner::Batch(cmds) => cmds.iter().any(Command::contains_exit),
            _ => false,
        }
    }

    /// If this command is a batch, return the inner commands.
    pub fn into_batch(self) -> Option<Vec<Command<Env, Msg>>> {
        match self.inner {
            CommandInner::Batch(cmds) => Some(cmds),
            _ => None,
        }
    }
}
