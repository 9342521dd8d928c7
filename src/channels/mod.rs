//! Channel abstraction for message transport.

pub mod channel;
pub mod queue;

pub use channel::*;
pub use queue::QueueChannel;
