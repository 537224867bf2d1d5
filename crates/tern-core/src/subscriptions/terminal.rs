use crate::clock::Clock;
use crate::key::{self, Key};
use crate::subscription::{Subscription, SubscriptionId, SubscriptionStream};
use crate::terminal::{RawModeGuard, TerminalHandle};
use futures::stream;
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;

/// Upper bound on a single blocking read, so a cancelled subscription
/// releases its reader thread promptly. A unit that arrives after the
/// subscription is gone stays buffered on the [`TerminalHandle`].
const READ_POLL_TIMEOUT: Duration = Duration::from_millis(50);

/// Pause after a failed read before trying again.
const READ_RETRY_PAUSE: Duration = Duration::from_millis(10);

struct KeyPress;

type KeyHandler<Msg> = Arc<dyn Fn(Key) -> Option<Msg> + Send + Sync>;

struct KeyReader<Msg> {
    terminal: TerminalHandle,
    clock: Arc<dyn Clock>,
    handler: KeyHandler<Msg>,
    _raw_mode: RawModeGuard,
}

/// Decode keys from the terminal and map them through `handler`.
///
/// When first polled the subscription joins the terminal's raw-mode scope;
/// if raw mode cannot be entered it logs a warning and produces nothing.
/// Each input unit is decoded with [`key::decode`] and passed to `handler`;
/// `Some(msg)` is emitted, `None` discards the key. Failed reads are logged
/// and skipped, so the subscription never fails on its own. Dropping it
/// releases its raw-mode guard.
///
/// All `key_press` subscriptions share one identity. If the handler's
/// behavior depends on state, distinguish the variants with
/// [`Subscription::keyed`] so the runtime restarts it when they change.
///
/// # Example
///
/// ```rust,ignore
/// fn subscriptions(&self, _: &State) -> Subscription<Msg> {
///     key_press(|key| match key {
///         Key::Character('q') => Some(Msg::Quit),
///         Key::Character('+') => Some(Msg::Increment),
///         _ => None,
///     })
/// }
/// ```
pub fn key_press<Msg: Send + 'static>(
    handler: impl Fn(Key) -> Option<Msg> + Send + Sync + 'static,
) -> Subscription<Msg> {
    let handler: KeyHandler<Msg> = Arc::new(handler);
    Subscription::new(SubscriptionId::of::<KeyPress>(), move |ctx| {
        let terminal = ctx.terminal().clone();
        let clock = ctx.clock();
        stream::once(async move {
            match terminal.acquire_raw_mode() {
                Ok(guard) => read_keys(KeyReader {
                    terminal,
                    clock,
                    handler,
                    _raw_mode: guard,
                }),
                Err(err) => {
                    tracing::warn!(error = %err, "key press subscription could not enter raw mode");
                    stream::empty().boxed()
                }
            }
        })
        .flatten()
        .boxed()
    })
}

fn read_keys<Msg: Send + 'static>(reader: KeyReader<Msg>) -> SubscriptionStream<Msg> {
    stream::unfold(reader, |reader| async move {
        loop {
            let Some(read) = reader.terminal.take_input() else {
                let terminal = reader.terminal.clone();
                let filled =
                    tokio::task::spawn_blocking(move || terminal.buffer_input(READ_POLL_TIMEOUT))
                        .await;
                if let Err(err) = filled {
                    tracing::debug!(error = %err, "key reader task failed, skipping");
                    reader.clock.sleep(READ_RETRY_PAUSE).await;
                }
                continue;
            };
            match read {
                Ok(code) => {
                    if let Some(msg) = (reader.handler)(key::decode(code)) {
                        return Some((Ok(msg), reader));
                    }
                }
                Err(err) => {
                    tracing::debug!(error = %err, "key read failed, skipping");
                    reader.clock.sleep(READ_RETRY_PAUSE).await;
                }
            }
        }
    })
    .boxed()
}
