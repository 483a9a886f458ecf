//! Lock module
//!
//! Named lock handles and the decorator that holds one around a call.
//!
//! Lock holders should also release on drop, so a cancelled call cannot
//! leave its key locked.

mod factory;
mod transport;

pub use factory::{Lock, LockFactory, MemoryLock, MemoryLockFactory};
pub use transport::LockTransport;
