//! In-process notification bus.
//!
//! Listeners are registered while the application is assembled and receive
//! every event synchronously, in registration order, on the publishing
//! thread. Delivery stops at the first listener that fails; the publisher is
//! told which listener failed and how many had already seen the event.

mod bus;

pub use bus::{EventBus, Listener, ListenerError, PublishError};

use std::fmt;

/// Something happened to the content working copy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// The working copy now reflects `commit`.
    Checkout { commit: String },
    /// Local commits were pushed upstream.
    Push,
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::Checkout { .. } => "checkout",
            Event::Push => "push",
        }
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Checkout { commit } => write!(f, "checkout({commit})"),
            Event::Push => f.write_str("push"),
        }
    }
}
