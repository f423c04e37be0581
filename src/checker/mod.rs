//! Task Generation, Worker Pool, Attempt Pipeline and Result Aggregation
//! (components F, G, H, I)

mod aggregator;
mod generator;
pub mod pipeline;
pub mod types;
mod worker;

pub use aggregator::{ResultAggregator, SharedStats};
pub use generator::TaskGenerator;
pub use pipeline::PipelineContext;
pub use worker::{spawn_pool, ActiveWorkers};
