//! **tern** -- a Model-View-Update runtime for terminal applications.
//!
//! This is the umbrella crate that re-exports everything you need to build a
//! tern application from a single dependency:
//!
//! ```toml
//! [dependencies]
//! tern = "0.1"
//! ```
//!
//! # Re-exports
//!
//! * All public items from [`tern_core`] are available at the crate root
//!   ([`Application`], [`Command`], [`Subscription`], [`Program`], [`run`],
//!   [`run_with`], etc.), along with its modules ([`subscriptions`],
//!   [`testing`], [`logging`], ...).
//! * [`ratatui`], [`crossterm`], [`tokio`] and [`tracing`] are re-exported so
//!   downstream crates do not need to depend on them directly. Any cloneable
//!   ratatui widget can be returned from a view.
//!
//! # Quick start
//!
//! ```ignore
//! use tern::{Application, Command};
//!
//! struct Hello;
//!
//! impl Application for Hello {
//!     type State = ();
//!     type Message = ();
//!     type Env = ();
//!     type Error = std::convert::Infallible;
//!     type Element = &'static str;
//!
//!     fn init(&self) -> Result<((), Command<(), ()>), Self::Error> {
//!         Ok(((), Command::none()))
//!     }
//!     fn update(&self, _: (), _: ()) -> Result<((), Command<(), ()>), Self::Error> {
//!         Ok(((), Command::exit()))
//!     }
//!     fn view(&self, _: &()) -> &'static str {
//!         "Hello, tern!"
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() {
//!     tern::run(Hello, ()).await.unwrap();
//! }
//! ```

pub use tern_core::*;

// Re-export dependencies for use in demos and downstream crates
pub use crossterm;
pub use ratatui;
pub use tokio;
pub use tracing;
