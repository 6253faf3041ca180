//! Client-side realtime reconciliation engine for a shared task board.
//!
//! The engine keeps a local mirror of the board's entities (tasks, chat
//! messages, presence rows) consistent with a remote persistence service
//! under two concurrent streams of change:
//!
//! - **Local mutations** apply optimistically: the store changes before
//!   the service confirms, then the optimistic entry is replaced in
//!   place by the confirmed record, or rolled back on failure.
//! - **Push events** from the service's change feed are reconciled into
//!   the store without duplicating rows the client already has (echoes
//!   of its own writes included) and without clobbering newer state.
//!
//! Entry points are the three stores: [`tasks::TaskStore`],
//! [`chat::ChatStore`], and [`presence::PresenceStore`], all generic
//! over the [`backend::Backend`] and [`realtime::PushChannel`] traits.
//! [`backend::InMemoryBackend`] implements both for tests and demos.

pub mod backend;
pub mod chat;
pub mod config;
pub mod presence;
pub mod realtime;
pub mod report;
pub mod store;
pub mod tasks;
pub mod tracker;

pub use config::{ClientConfig, ConfigError};
pub use report::{AppError, ErrorKind, ErrorReporter};
