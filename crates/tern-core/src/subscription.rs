use crate::clock::{Clock, TokioClock};
use crate::terminal::TerminalHandle;
use futures::ready;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::any::TypeId;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::task::Poll;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Why a subscription stopped.
///
/// A subscription that yields one of these ends right after it. Use
/// [`Subscription::recover`] to turn the failure into a message instead.
#[derive(Debug, thiserror::Error)]
pub enum SubscriptionError {
    /// A watched path does not exist.
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),
    /// Any other I/O failure.
    #[error("I/O error during {operation}: {cause}")]
    Io {
        /// What was being attempted, e.g. `"read"`.
        operation: String,
        /// The underlying error.
        #[source]
        cause: io::Error,
    },
    /// Reading from the terminal failed.
    #[error("terminal read failed: {0}")]
    TerminalRead(#[source] io::Error),
}

/// The item stream a running subscription produces.
pub type SubscriptionStream<T> = BoxStream<'static, Result<T, SubscriptionError>>;

/// Identity for comparing subscriptions between update cycles.
///
/// Each subscription carries a `SubscriptionId` composed of a Rust [`TypeId`]
/// and a numeric discriminant. The runtime keeps a running subscription as
/// long as the application keeps returning one with the same identity.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId {
    type_id: TypeId,
    discriminant: u64,
}

impl SubscriptionId {
    /// Create an ID from a type and a numeric discriminant.
    pub fn new<T: 'static>(discriminant: u64) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            discriminant,
        }
    }

    /// Create an ID from a type alone (for singletons).
    pub fn of<T: 'static>() -> Self {
        Self::new::<T>(0)
    }

    /// Create an ID from a type and a string discriminant.
    pub fn with_str<T: 'static>(s: &str) -> Self {
        Self::new::<T>(hash_of(s))
    }

    /// Create an ID from a type and any hashable discriminant.
    pub fn hashed<T: 'static>(value: &impl Hash) -> Self {
        Self::new::<T>(hash_of(value))
    }

    fn keyed(&self, key: &str) -> Self {
        Self {
            type_id: self.type_id,
            discriminant: hash_of(&(self.discriminant, key)),
        }
    }

    fn merged(ids: &[SubscriptionId]) -> Self {
        Self::new::<Merged>(hash_of(ids))
    }
}

fn hash_of<H: Hash + ?Sized>(value: &H) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

struct Empty;
struct Merged;
struct FromStream;

/// What a subscription is given when it starts.
#[derive(Clone)]
pub struct SubscriptionContext {
    terminal: TerminalHandle,
    clock: Arc<dyn Clock>,
}

impl SubscriptionContext {
    /// A context over `terminal` using the tokio clock.
    pub fn new(terminal: TerminalHandle) -> Self {
        Self {
            terminal,
            clock: Arc::new(TokioClock),
        }
    }

    /// Replace the clock.
    pub fn with_clock(mut self, clock: impl Clock) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// The terminal keyboard subscriptions read from.
    pub fn terminal(&self) -> &TerminalHandle {
        &self.terminal
    }

    /// The clock timers and pollers schedule against.
    pub fn clock(&self) -> Arc<dyn Clock> {
        self.clock.clone()
    }
}

type Start<T> = Box<dyn FnOnce(&SubscriptionContext) -> SubscriptionStream<T> + Send>;

/// A lazy, restartable event source.
///
/// A `Subscription` is a description: nothing runs until it is started with
/// [`into_stream`](Subscription::into_stream), which the runtime does when the
/// application's [`subscriptions`](crate::Application::subscriptions) returns
/// an identity that is not already running. Calling a factory such as
/// [`tick`](crate::subscriptions::tick) twice gives two independent sources.
///
/// The stream may be infinite. An `Err` item is its last item.
pub struct Subscription<T: Send + 'static> {
    pub(crate) id: SubscriptionId,
    start: Start<T>,
}

impl<T: Send + 'static> Subscription<T> {
    /// Create from an identity and a start function.
    pub fn new(
        id: SubscriptionId,
        start: impl FnOnce(&SubscriptionContext) -> SubscriptionStream<T> + Send + 'static,
    ) -> Self {
        Subscription {
            id,
            start: Box::new(start),
        }
    }

    /// Create from a ready-made stream of values. The identity is derived
    /// from `key`.
    pub fn from_stream(key: &str, stream: BoxStream<'static, T>) -> Self {
        Subscription::new(SubscriptionId::with_str::<FromStream>(key), move |_| {
            stream.map(Ok).boxed()
        })
    }

    /// A subscription that never emits and completes immediately.
    pub fn none() -> Self {
        Subscription::new(SubscriptionId::of::<Empty>(), |_| stream::empty().boxed())
    }

    /// This subscription's identity.
    pub fn id(&self) -> &SubscriptionId {
        &self.id
    }

    /// Distinguish this subscription from others with the same identity,
    /// e.g. two file watchers or a key handler whose mapping changed.
    pub fn keyed(mut self, key: &str) -> Self {
        self.id = self.id.keyed(key);
        self
    }

    /// Start the subscription.
    pub fn into_stream(self, ctx: &SubscriptionContext) -> SubscriptionStream<T> {
        (self.start)(ctx)
    }

    /// Transform the emitted values (for component composition).
    pub fn map<U: Send + 'static>(
        self,
        f: impl Fn(T) -> U + Send + Sync + 'static,
    ) -> Subscription<U> {
        let start = self.start;
        Subscription::new(self.id, move |ctx| {
            start(ctx).map(move |item| item.map(&f)).boxed()
        })
    }

    /// Deliver the terminating error as a final value instead of failing.
    pub fn recover(self, f: impl Fn(SubscriptionError) -> T + Send + Sync + 'static) -> Self {
        let start = self.start;
        Subscription::new(self.id, move |ctx| {
            start(ctx).map(move |item| Ok(item.unwrap_or_else(&f))).boxed()
        })
    }
}

/// Interleave several subscriptions into one.
///
/// Sources are polled concurrently; each source's order is preserved, with
/// no ordering between sources. No sources gives an empty subscription and a
/// single source is returned unchanged. The first error from any source is
/// yielded and ends the merged stream at once, dropping the other sources;
/// otherwise it completes once every source has completed. Dropping the merged stream drops every source.
pub fn merge<T: Send + 'static>(
    subs: impl IntoIterator<Item = Subscription<T>>,
) -> Subscription<T> {
    let mut subs: Vec<_> = subs.into_iter().collect();
    match subs.len() {
        0 => Subscription::none(),
        1 => subs.pop().unwrap_or_else(Subscription::none),
        _ => {
            let ids: Vec<_> = subs.iter().map(|sub| sub.id.clone()).collect();
            Subscription::new(SubscriptionId::merged(&ids), move |ctx| {
                let streams = subs.into_iter().map(|sub| sub.into_stream(ctx));
                let mut sources = Some(stream::select_all(streams));
                stream::poll_fn(move |cx| {
                    let Some(active) = sources.as_mut() else {
                        return Poll::Ready(None);
                    };
                    let item = ready!(active.poll_next_unpin(cx));
                    // An error or exhaustion ends the merge; drop every source now.
                    if !matches!(item, Some(Ok(_))) {
                        sources = None;
                    }
                    Poll::Ready(item)
                })
                .boxed()
            })
        }
    }
}

struct Active {
    id: SubscriptionId,
    task: JoinHandle<()>,
}

/// Runs the application's subscription and restarts it when its identity
/// changes.
pub(crate) struct SubscriptionManager<Msg: Send + 'static> {
    active: Option<Active>,
    ctx: SubscriptionContext,
    msg_tx: mpsc::UnboundedSender<Msg>,
}

impl<Msg: Send + 'static> SubscriptionManager<Msg> {
    pub fn new(ctx: SubscriptionContext, msg_tx: mpsc::UnboundedSender<Msg>) -> Self {
        Self {
            active: None,
            ctx,
            msg_tx,
        }
    }

    /// Keep the running subscription if `sub` has the same identity,
    /// otherwise stop it and start `sub`.
    pub async fn reconcile(&mut self, sub: Subscription<Msg>) {
        if self.active.as_ref().is_some_and(|active| active.id == sub.id) {
            return;
        }
        self.shutdown().await;

        let id = sub.id.clone();
        tracing::debug!(?id, "starting subscription");
        let mut stream = sub.into_stream(&self.ctx);
        let tx = self.msg_tx.clone();
        let task = tokio::spawn(async move {
            while let Some(item) = stream.next().await {
                match item {
                    Ok(msg) => {
                        if tx.send(msg).is_err() {
                            break;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "subscription terminated");
                        break;
                    }
                }
            }
        });
        self.active = Some(Active { id, task });
    }

    /// Stop the running subscription and wait until its stream, and any
    /// terminal guard it holds, has been dropped.
    pub async fn shutdown(&mut self) {
        if let Some(active) = self.active.take() {
            tracing::debug!(id = ?active.id, "stopping subscription");
            active.task.abort();
            let _ = active.task.await;
        }
    }

    /// Identity of the running subscription (for testing).
    #[cfg(test)]
    pub fn active_id(&self) -> Option<&SubscriptionId> {
        self.active.as_ref().map(|active| &active.id)
    }
}

impl<Msg: Send + 'static> Drop for SubscriptionManager<Msg> {
    fn drop(&mut self) {
        // Reached without `shutdown` when the run future is cancelled.
        if let Some(active) = self.active.take() {
            active.task.abort();
        }
    }
}
