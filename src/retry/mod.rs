//! Retry module
//!
//! Re-issues calls that failed with a transient status or connection error.
//! Only requests whose description opts in are wrapped. A request body given
//! as a one-shot stream cannot be replayed, so its retry fails with
//! `BodyConsumed`.

mod transport;

pub use transport::RetryTransport;

#[cfg(test)]
mod tests;
