//! Cross-process coordination for ctx.
//!
//! A [`ScopeLock`] gives one holder at a time exclusive use of a named scope
//! (such as `install`) for a bounded lease. Leases that outlive their TTL are
//! reclaimed by the next acquirer, so a crashed process cannot wedge the
//! project forever.

pub mod error;
pub mod scope_lock;

pub use error::{CoordError, Result};
pub use scope_lock::{holder_id, LockRecord, ScopeGuard, ScopeLock};
