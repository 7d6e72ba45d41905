//! Canonical wire types shared by the Joist server and its clients.
//!
//! A change notification describes a single committed row mutation. The
//! database emits them as JSON on a notification channel; the server relays
//! them verbatim to every connected subscriber.

mod change;

pub use change::{ChangeAction, ChangeEvent, ChangeMessage, ChangeRecord};
