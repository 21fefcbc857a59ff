pub mod analysis;
pub mod batch;
pub mod job;
pub mod location;
