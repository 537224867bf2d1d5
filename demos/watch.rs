//! # Watch Example
//!
//! Shows the contents of a file and refreshes whenever it changes:
//! - `watch_file` merged with `key_press`
//! - Recovering from a subscription error into a message
//! - Loading data with `Command::effect` and an environment
//! - Sending runtime logs to a file with `log_to_file`
//!
//! Run with: `cargo run --example watch -- notes.txt`
//! Set `TERN_LOG=watch.log` (and optionally `RUST_LOG=debug`) to capture logs.

use std::path::PathBuf;
use tern::ratatui::text::Text;
use tern::ratatui::widgets::{Block, Borders, Paragraph, Wrap};
use tern::subscriptions::{key_press, watch_file};
use tern::{merge, Application, Command, Key, Subscription, SubscriptionError};

struct Watch;

#[derive(Clone)]
struct Env {
    path: PathBuf,
}

struct State {
    path: PathBuf,
    content: String,
    line_count: usize,
    status: String,
}

#[derive(Debug)]
enum Msg {
    Changed(String),
    Counted(usize),
    Failed(String),
    Quit,
}

impl Application for Watch {
    type State = State;
    type Message = Msg;
    type Env = Env;
    type Error = std::io::Error;
    type Element = Paragraph<'static>;

    fn init(&self) -> Result<(State, Command<Env, Msg>), std::io::Error> {
        let path = std::env::args()
            .nth(1)
            .map(PathBuf::from)
            .ok_or_else(|| std::io::Error::other("usage: watch <file>"))?;
        let state = State {
            path,
            content: String::new(),
            line_count: 0,
            status: "waiting for first read".to_string(),
        };
        Ok((state, Command::none()))
    }

    fn update(&self, msg: Msg, state: State) -> Result<(State, Command<Env, Msg>), std::io::Error> {
        Ok(match msg {
            Msg::Changed(content) => {
                // Counting is done by an effect so it reads the file through
                // the environment rather than the state.
                let count = Command::effect(
                    |env: Env| async move {
                        let text = tern::tokio::fs::read_to_string(&env.path).await?;
                        Ok::<_, std::io::Error>(text.lines().count())
                    },
                    Msg::Counted,
                );
                let status = format!("updated ({} bytes)", content.len());
                (State { content, status, ..state }, count)
            }
            Msg::Counted(line_count) => (State { line_count, ..state }, Command::none()),
            Msg::Failed(reason) => (State { status: reason, ..state }, Command::none()),
            Msg::Quit => (state, Command::exit()),
        })
    }

    fn view(&self, state: &State) -> Paragraph<'static> {
        let title = format!(
            " {} - {} lines - {} ",
            state.path.display(),
            state.line_count,
            state.status
        );
        Paragraph::new(Text::raw(state.content.clone()))
            .block(Block::default().borders(Borders::ALL).title(title))
            .wrap(Wrap { trim: false })
    }

    fn subscriptions(&self, state: &State) -> Subscription<Msg> {
        let file = watch_file(&state.path)
            .map(Msg::Changed)
            .recover(|err| match err {
                SubscriptionError::FileNotFound(path) => {
                    Msg::Failed(format!("{} not found, press q", path.display()))
                }
                other => Msg::Failed(other.to_string()),
            });
        merge([
            file,
            key_press(|key| match key {
                Key::Character('q') | Key::Escape => Some(Msg::Quit),
                _ => None,
            }),
        ])
    }
}

#[tern::tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Ok(log_path) = std::env::var("TERN_LOG") {
        tern::log_to_file(log_path)?;
    }
    let path = std::env::args().nth(1).map(PathBuf::from).unwrap_or_default();
    let state = tern::run(Watch, Env { path }).await?;
    println!("{}: {} lines", state.path.display(), state.line_count);
    Ok(())
}
