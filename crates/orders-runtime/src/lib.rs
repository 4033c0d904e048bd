//! Process plumbing shared by the `orders-api` and `orders-worker` binaries:
//! tracing initialisation and cooperative shutdown.

pub mod shutdown;
pub mod telemetry;
