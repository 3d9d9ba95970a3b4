//! Operator console.

mod command;
mod console;
mod input;

pub use command::{InputError, ListingCommand, MenuCommand, SessionCommand};
pub use console::{Console, ConsoleState};
pub use input::{spawn_line_reader, spawn_stdin_reader};
