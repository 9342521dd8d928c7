//! Conduit: message binding core and a thin integration pipeline.

pub mod binding;
pub mod channels;
pub mod config;
pub mod error;
pub mod message;
pub mod pipeline;
