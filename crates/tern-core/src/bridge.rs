//! Blocking access to async commands and streams.
//!
//! Synchronous code (tests, scripts, other event loops) can't `.await`.
//! A [`Bridge`] owns a single-threaded tokio runtime and drives a command or
//! a finite stream to completion on it.

use crate::command::Command;
use crate::interpret::interpret;
use futures::{Stream, StreamExt};
use std::io;
use tokio::runtime::{Builder, Runtime};

/// Runs async work to completion from synchronous code.
///
/// Calling a `Bridge` method from inside an async context panics (tokio
/// refuses to block a runtime thread). Use [`interpret`] directly there.
pub struct Bridge {
    runtime: Runtime,
}

impl Bridge {
    /// Create a bridge with its own current-thread runtime (timers and I/O
    /// enabled).
    pub fn new() -> io::Result<Self> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self { runtime })
    }

    /// Interpret `cmd` against `env`, blocking until every effect has
    /// finished. `on_message` is called for each message in order.
    pub fn convert_command<Env, Msg>(
        &self,
        cmd: Command<Env, Msg>,
        env: &Env,
        on_message: impl FnMut(Msg),
    ) where
        Env: Clone,
    {
        self.runtime.block_on(interpret(cmd, env, on_message));
    }

    /// Drain a finite stream, blocking until it ends. An infinite stream
    /// never returns.
    pub fn collect_all<S>(&self, stream: S) -> Vec<S::Item>
    where
        S: Stream,
    {
        self.runtime.block_on(stream.collect())
    }

    /// Run an arbitrary future to completion.
    pub fn block_on<F: std::future::Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
