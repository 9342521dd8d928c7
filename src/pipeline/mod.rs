//! Message pipeline built on top of the binder.
//!
//! Messages flow:
//! 1. `PollingConsumer` pulls from an input `PollableChannel`
//! 2. `ServiceActivator` binds the message, invokes its handler, builds the reply
//! 3. The reply goes to the endpoint's output channel, e.g. a
//!    `RecipientListRouter` fanning out to several queues
//!
//! Failed messages are logged and, if configured, forwarded to an error channel.

pub mod endpoint;
pub mod poller;
pub mod router;

pub use endpoint::{Handler, ServiceActivator};
pub use poller::{PollingConsumer, spawn_polling_consumer};
pub use router::RecipientListRouter;
