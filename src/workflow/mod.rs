pub mod generation_flow;
pub mod job_ctx;

pub use generation_flow::GenerationFlow;
pub use job_ctx::JobCtx;
