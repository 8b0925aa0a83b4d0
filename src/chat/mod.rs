//! The chat surface: action parsing, screen rendering, and event routing.

pub mod command;
pub mod dispatcher;
pub mod screen;

pub use command::Command;
pub use dispatcher::{ChatEvent, Dispatcher, Payload};
pub use screen::{Button, Screen};
