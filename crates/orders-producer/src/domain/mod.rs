//! Domain layer for order submission.

pub mod commands;
