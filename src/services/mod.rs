pub mod analyzer;
pub mod id;
pub mod queue;
pub mod registry;
pub mod retry;
pub mod scheduler;
pub mod screenshot;
mod worker;
