use crate::subscription::{Subscription, SubscriptionId};
use futures::stream;
use futures::StreamExt;
use std::time::Duration;

struct Tick;
struct After;

/// A repeating timer that emits `()` at a fixed rate.
///
/// The `n`th emission is scheduled at `start + n * interval`, so a slow
/// consumer does not make the timer drift. The first emission comes one
/// interval after the subscription starts. Never fails or completes.
///
/// # Example
///
/// ```rust,ignore
/// use std::time::Duration;
/// use tern_core::subscriptions::tick;
///
/// fn subscriptions(&self, _: &State) -> Subscription<Msg> {
///     tick(Duration::from_secs(1)).map(|()| Msg::Tick)
/// }
/// ```
pub fn tick(interval: Duration) -> Subscription<()> {
    let id = SubscriptionId::hashed::<Tick>(&interval);
    Subscription::new(id, move |ctx| {
        let clock = ctx.clock();
        let first = clock.now() + interval;
        stream::unfold(first, move |deadline| {
            let sleep = clock.sleep_until(deadline);
            async move {
                sleep.await;
                Some((Ok(()), deadline + interval))
            }
        })
        .boxed()
    })
}

/// A one-shot delay: emits `()` once after `duration`, then completes.
pub fn after(duration: Duration) -> Subscription<()> {
    let id = SubscriptionId::hashed::<After>(&duration);
    Subscription::new(id, move |ctx| {
        let clock = ctx.clock();
        stream::once(async move {
            clock.sleep(duration).await;
            Ok(())
        })
        .boxed()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subscription::SubscriptionContext;
    use crate::terminal::TerminalHandle;
    use crate::testing::TestTerminal;
    use tokio::time::Instant;

    fn ctx() -> SubscriptionContext {
        SubscriptionContext::new(TerminalHandle::new(TestTerminal::new()))
    }

    #[tokio::test(start_paused = true)]
    async fn tick_emits_at_fixed_rate() {
        let interval = Duration::from_millis(250);
        let start = Instant::now();
        let ticks: Vec<_> = tick(interval).into_stream(&ctx()).take(3).collect().await;

        assert_eq!(ticks.len(), 3);
        assert!(ticks.iter().all(Result::is_ok));
        let elapsed = start.elapsed();
        assert!(elapsed >= interval * 3);
        assert!(elapsed < interval * 4);
    }

    #[tokio::test(start_paused = true)]
    async fn tick_does_not_emit_before_first_interval() {
        let mut ticks = tick(Duration::from_secs(1)).into_stream(&ctx());
        let early = tokio::time::timeout(Duration::from_millis(999), ticks.next()).await;
        assert!(early.is_err());
        assert!(ticks.next().await.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn after_fires_once_then_completes() {
        let start = Instant::now();
        let items: Vec<_> = after(Duration::from_millis(500))
            .into_stream(&ctx())
            .collect()
            .await;
        assert_eq!(items.len(), 1);
        assert!(start.elapsed() >= Duration::from_millis(500));
    }

    #[test]
    fn timer_identity_follows_duration() {
        assert_eq!(tick(Duration::from_secs(1)).id(), tick(Duration::from_secs(1)).id());
        assert_ne!(tick(Duration::from_secs(1)).id(), tick(Duration::from_secs(2)).id());
        assert_ne!(tick(Duration::from_secs(1)).id(), after(Duration::from_secs(1)).id());
    }

    #[test]
    fn timer_identity_keeps_every_nanosecond() {
        // 2^64 + 5 ns apart from 5 ns only in the bits above u64.
        let long = Duration::new(18_446_744_073, 709_551_621);
        let short = Duration::from_nanos(5);
        assert_ne!(tick(long).id(), tick(short).id());
        assert_ne!(after(long).id(), after(short).id());
    }

    #[test]
    fn after_starts_outside_a_runtime() {
        let stream = after(Duration::from_millis(1)).into_stream(&ctx());
        let bridge = crate::bridge::Bridge::new().unwrap();
        assert_eq!(bridge.collect_all(stream).len(), 1);
    }
}
