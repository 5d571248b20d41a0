//! Connection dispatch for the Warden dispatcher.
//!
//! A single thread owns every listener and the [`Supervisor`], which holds the
//! mutable state: the worker table, the verification token, the audit log and
//! the shutdown flag. Each accepted connection carries exactly one request
//! frame. The dispatcher answers it and closes the socket, except for a
//! `START` on port zero, whose client is parked in the worker slot until the
//! new worker calls back with `VERIFY`.
//!
//! ## Request flow
//!
//! ```text
//! accept -> read frame -> VERIFY ............... token reply, relay to parked client
//!                      -> HELLO ................ release identification
//!                      -> START ................ spawn worker, reply or park
//!                      -> SHUTDOWN, SHOWUSRS,
//!                         NEWLOG, STARTLOG,
//!                         STOPLOG, COMMAND ..... password-gated administration
//! ```
//!
//! Worker exits arrive as [`SupervisorEvent::ChildExited`] from the signal
//! thread (or are detected by the polling reaper); clients still waiting on a
//! dead worker receive a single failure reply.

mod errors;
mod event_loop;
mod events;
mod settings;
mod supervisor;

pub use self::errors::DispatchError;
pub(crate) use self::event_loop::Dispatcher;
pub(crate) use self::events::SupervisorEvent;
pub(crate) use self::settings::DispatchSettings;
pub(crate) use self::supervisor::Supervisor;

pub(crate) const DISPATCH_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::dispatch");
