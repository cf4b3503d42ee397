//! Live Preview Pipeline
//!
//! Turns edits of a markdown file into pushed HTML renders:
//!
//! ```text
//! filesystem -> Notifier -> signal (cap 1) -> PushSession -> render -> Transport -> browser
//!                                                  ^
//!                          Supervisor (accept, path check, disconnect watch)
//! ```
//!
//! Cancellation flows top-down: process shutdown -> supervisor -> session -> notifier.
//!
//! # Modules
//!
//! - `notifier` - Debounced file watcher for one document
//! - `session` - Per-connection read/render/push loop
//! - `transport` - WebSocket delivery of rendered documents
//! - `server` - Accept loop and session supervision

pub mod notifier;
pub mod server;
pub mod session;
pub mod transport;
