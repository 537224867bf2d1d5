use crate::clock::Clock;
use crate::subscription::{Subscription, SubscriptionError, SubscriptionId};
use futures::stream;
use futures::StreamExt;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// How often [`watch_file`] re-reads the file.
pub const WATCH_POLL_INTERVAL: Duration = Duration::from_millis(100);

struct WatchFile;

struct Watch {
    path: PathBuf,
    clock: Arc<dyn Clock>,
    last_hash: Option<u64>,
    polled: bool,
}

/// Emit the contents of the file at `path` whenever they change.
///
/// The file is read as soon as the subscription starts and then every
/// [`WATCH_POLL_INTERVAL`]. Content is emitted only when its hash differs
/// from the previously observed one, so the first read always emits and
/// rewriting identical bytes does not.
///
/// A missing file ends the subscription with
/// [`SubscriptionError::FileNotFound`]; any other read failure ends it with
/// [`SubscriptionError::Io`].
pub fn watch_file(path: impl AsRef<Path>) -> Subscription<String> {
    let path = path.as_ref().to_path_buf();
    let id = SubscriptionId::with_str::<WatchFile>(&path.to_string_lossy());
    Subscription::new(id, move |ctx| {
        let watch = Watch {
            path,
            clock: ctx.clock(),
            last_hash: None,
            polled: false,
        };
        stream::unfold(Some(watch), |state| async move {
            let mut watch = state?;
            loop {
                if watch.polled {
                    watch.clock.sleep(WATCH_POLL_INTERVAL).await;
                }
                watch.polled = true;

                let content = match read(&watch.path).await {
                    Ok(content) => content,
                    Err(err) => return Some((Err(err), None)),
                };
                let hash = content_hash(&content);
                if watch.last_hash != Some(hash) {
                    watch.last_hash = Some(hash);
                    return Some((Ok(content), Some(watch)));
                }
            }
        })
        .boxed()
    })
}

async fn read(path: &Path) -> Result<String, SubscriptionError> {
    tokio::fs::read_to_string(path).await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            SubscriptionError::FileNotFound(path.to_path_buf())
        } else {
            SubscriptionError::Io {
                operation: "read".to_string(),
                cause: err,
            }
        }
    })
}

fn content_hash(content: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    hasher.finish()
}
