// file: src/pipeline/mod.rs
// description: pipeline module exports and public api
// reference: pipeline orchestration

mod progress;
mod service;

pub use progress::{RunStats, StageProgress};
pub use service::PipelineService;
