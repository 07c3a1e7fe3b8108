pub mod generation_cache;
pub mod job_store;
pub mod rate_limiter;

pub use generation_cache::{analysis_fingerprint, CacheStore, CachedAnalysis, MemoryCache};
pub use job_store::{JobStore, MemoryJobStore};
pub use rate_limiter::{RateLimitStatus, RateLimiter};
