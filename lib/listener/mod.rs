//! TCP transport: accepts peers and runs one task per connection.

mod connection;
pub mod event;
mod server;

pub use event::{render_events, EventReceiver, EventSender, ListenerEvent};
pub use server::Listener;
