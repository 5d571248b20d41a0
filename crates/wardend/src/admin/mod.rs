//! Password-gated control-plane operations.
//!
//! Administrative requests never touch the worker table or the audit log
//! directly; the dispatcher hands the relevant state to the processor, which
//! authenticates the caller, performs the operation and reports failures as
//! [`AdminError`] values whose `Display` text is sent back to the client.

mod errors;
mod processor;
mod utility;

pub use self::errors::{AdminError, UtilityError};
pub(crate) use self::processor::{AdminCommandProcessor, LogOperation};
pub(crate) use self::utility::{SystemUtilityRunner, Utility, UtilityRunner};

pub(crate) const ADMIN_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::admin");
