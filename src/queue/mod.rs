//! Request serialization - the single gatekeeper of the model engine

pub mod job;
pub mod serial;

pub use job::Job;
pub use serial::{SerialQueue, SerialQueueConfig};
