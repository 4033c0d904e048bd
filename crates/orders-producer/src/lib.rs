//! Orders: order submission.
//!
//! Turns an accepted order request into an `OrderCreatedEvent` and publishes
//! it, exactly once per request, to the order queue.

pub mod application;
pub mod domain;
