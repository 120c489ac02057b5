pub mod runner;
pub mod tasks;

pub use runner::{WorkerContext, consume_queue, handle_envelope};
