//! Argument binding between messages and handler parameters.
//!
//! A handler is described once by a [`HandlerSignature`]; the [`Binder`]
//! built from it maps every inbound message to the handler's arguments and
//! turns return values back into messages.

pub mod argument;
pub mod binder;
pub mod parameter;

pub use argument::{Argument, Outbound};
pub use binder::{Binder, Slot};
pub use parameter::{
    HandlerSignature, HeaderBinding, Marker, ParameterDescriptor, ParameterSpec, ParameterType,
};
