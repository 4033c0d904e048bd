//! Application layer for order submission.

pub mod command_handlers;
pub mod publisher;
