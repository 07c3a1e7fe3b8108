pub mod article;
pub mod job;
pub mod scenario;

pub use article::{ArticleOutput, GenerationResult, ParsedArticle, StageOutput, TokenUsage};
pub use job::{GenerationParams, Job, JobStatus};
pub use scenario::{ProviderKind, Scenario, Stage};
