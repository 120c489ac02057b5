pub mod dispatcher;
pub mod payload;
pub mod store;

pub use dispatcher::{Broker, TaskDispatcher, TaskEnvelope, TaskKind};
pub use store::{JobError, JobStore, MemoryJobStore, MongoJobStore, TransitionUpdate};
