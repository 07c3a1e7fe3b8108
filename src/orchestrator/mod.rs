pub mod batch_processor;
pub mod job_processor;

pub use batch_processor::{App, ProcessingStats};
pub use job_processor::{process_job, RetryPolicy};
