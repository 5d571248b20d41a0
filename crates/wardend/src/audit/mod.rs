//! Durable audit log shared by the dispatcher and its workers.

mod errors;
mod timestamp;
mod writer;

pub use self::errors::AuditLogError;
pub(crate) use self::writer::{AuditLog, LogStartup, RemovalRetry};

pub(crate) const AUDIT_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::audit");
