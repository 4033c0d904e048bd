//! Orders worker: consumes order events from the queue.
//!
//! A dispatcher task pulls messages from the broker and hands them to a
//! bounded pool of workers. Each message is handled, then completed on
//! success or abandoned (dead-lettered once its delivery budget is spent) on
//! failure. A failing message never stops the pool.

pub mod config;
pub mod error;
pub mod handler;
pub mod processor;

pub use handler::{MessageHandler, OrderCreatedHandler, SimulatedWork, UnitOfWork};
pub use processor::{MessageProcessor, ProcessorOptions, ProcessorStats, Settlement};
