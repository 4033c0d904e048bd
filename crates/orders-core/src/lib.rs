//! Orders Core: shared abstractions for the order pipeline.
//!
//! This crate defines the event schema that travels between the producer and
//! the worker, the message envelopes, and the `MessageQueue` transport trait
//! that broker adapters implement. It contains no infrastructure code.

pub mod clock;
pub mod error;
pub mod event;
pub mod id;
pub mod message;
pub mod queue;
