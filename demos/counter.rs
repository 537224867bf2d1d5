//! # Counter Example
//!
//! A minimal counter app demonstrating the core tern architecture:
//! - Implementing the [`Application`] trait with `init`, `update`, `view`, and `subscriptions`
//! - Mapping decoded key presses to application messages
//! - Merging a keyboard subscription with a timer
//! - Using `Command::none()`, `Command::exit()` and an `on_exit` effect
//!
//! Run with: `cargo run --example counter`

use std::convert::Infallible;
use std::time::Duration;
use tern::ratatui::layout::Alignment;
use tern::ratatui::widgets::{Block, Borders, Paragraph};
use tern::subscriptions::{key_press, tick};
use tern::{merge, Application, Command, Key, Subscription};

/// A minimal counter app that validates the core loop.
struct Counter;

#[derive(Debug, Clone, Copy)]
struct State {
    count: i64,
    seconds: u64,
}

#[derive(Debug)]
enum Msg {
    Increment,
    Decrement,
    Reset,
    Tick,
    Quit,
}

impl Application for Counter {
    type State = State;
    type Message = Msg;
    type Env = ();
    type Error = Infallible;
    type Element = Paragraph<'static>;

    fn init(&self) -> Result<(State, Command<(), Msg>), Infallible> {
        Ok((State { count: 0, seconds: 0 }, Command::none()))
    }

    // Each arm returns the replacement state. Quit keeps the state and
    // returns Command::exit() to end the loop.
    fn update(&self, msg: Msg, state: State) -> Result<(State, Command<(), Msg>), Infallible> {
        let next = match msg {
            Msg::Increment => State { count: state.count + 1, ..state },
            Msg::Decrement => State { count: state.count - 1, ..state },
            Msg::Reset => State { count: 0, ..state },
            Msg::Tick => State { seconds: state.seconds + 1, ..state },
            Msg::Quit => return Ok((state, Command::exit())),
        };
        Ok((next, Command::none()))
    }

    fn view(&self, state: &State) -> Paragraph<'static> {
        let text = format!(
            "Count: {}\n\n+/k inc  -/j dec  r reset  q quit\nrunning for {}s",
            state.count, state.seconds
        );
        Paragraph::new(text)
            .block(Block::default().borders(Borders::ALL).title(" Counter "))
            .alignment(Alignment::Center)
    }

    // The key handler returns None for keys it does not care about, which
    // discards them.
    fn subscriptions(&self, _: &State) -> Subscription<Msg> {
        merge([
            key_press(|key| match key {
                Key::Character('q') | Key::Escape | Key::Control('C') => Some(Msg::Quit),
                Key::Character('+') | Key::Character('k') => Some(Msg::Increment),
                Key::Character('-') | Key::Character('j') => Some(Msg::Decrement),
                Key::Character('r') => Some(Msg::Reset),
                _ => None,
            }),
            tick(Duration::from_secs(1)).map(|()| Msg::Tick),
        ])
    }
}

#[tern::tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let state = tern::run(Counter, ()).await?;
    println!("Final count: {}", state.count);
    Ok(())
}
