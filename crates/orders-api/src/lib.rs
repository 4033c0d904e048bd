//! Orders API: HTTP front door of the order pipeline.
//!
//! Accepts order requests, publishes one `OrderCreatedEvent` per request to
//! the order queue, and answers `202 Accepted` once the broker has taken the
//! message.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
