//! Command interpreter.
//!
//! [`interpret`] is the only code that executes the effects described by a
//! [`Command`]. It never fails: effect errors and panics are logged and turn
//! into "no message" for the sub-command that produced them.

use crate::command::{Command, CommandInner, Job};
use futures::FutureExt;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

enum Leaf<Env, Msg> {
    Effect(Job<Env, Msg>),
    Fire(Job<Env, ()>),
}

/// Execute `cmd` against `env`, calling `on_message` once per message
/// produced.
///
/// Batches (including batches nested inside batches) run strictly in listed
/// order; each effect completes before the next one starts. `none` and
/// `exit` produce nothing here: the runtime inspects a command for `exit`
/// before handing it over.
pub async fn interpret<Env, Msg, F>(cmd: Command<Env, Msg>, env: &Env, mut on_message: F)
where
    Env: Clone,
    F: FnMut(Msg),
{
    for leaf in flatten(cmd) {
        match leaf {
            Leaf::Effect(job) => {
                if let Some(msg) = run_job(job, env, "effect").await {
                    on_message(msg);
                }
            }
            Leaf::Fire(job) => {
                run_job(job, env, "fire").await;
            }
        }
    }
}

fn flatten<Env, Msg>(cmd: Command<Env, Msg>) -> Vec<Leaf<Env, Msg>> {
    let mut leaves = Vec::new();
    let mut stack = vec![cmd];
    while let Some(cmd) = stack.pop() {
        match cmd.inner {
            CommandInner::None | CommandInner::Exit => {}
            CommandInner::Effect(job) => leaves.push(Leaf::Effect(job)),
            CommandInner::Fire(job) => leaves.push(Leaf::Fire(job)),
            CommandInner::Batch(cmds) => stack.extend(cmds.into_iter().rev()),
        }
    }
    leaves
}

async fn run_job<Env: Clone, T>(job: Job<Env, T>, env: &Env, kind: &'static str) -> Option<T> {
    let fut = match catch_unwind(AssertUnwindSafe(|| job(env.clone()))) {
        Ok(fut) => fut,
        Err(panic) => {
            tracing::error!(kind, panic = %panic_message(panic.as_ref()), "command panicked before starting");
            return None;
        }
    };
    match AssertUnwindSafe(fut).catch_unwind().await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(err)) => {
            tracing::warn!(kind, error = %err, "command failed, no message produced");
            None
        }
        Err(panic) => {
            tracing::error!(kind, panic = %panic_message(panic.as_ref()), "command panicked");
            None
        }
    }
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
