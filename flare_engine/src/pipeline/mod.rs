//! Pipeline cache keyed by (camera, program)

mod pipeline_cache;

pub use pipeline_cache::{PipelineCache, PipelineKey, CachedPipeline};
