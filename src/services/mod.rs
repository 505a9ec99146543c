// src/services/mod.rs
pub mod message_pipeline;
pub mod rate_limit;
pub mod request_token;
pub mod word_filter;

pub use message_pipeline::{MessagePipeline, PipelineError};
pub use rate_limit::VisitorRateLimiter;
pub use request_token::RequestTokens;
pub use word_filter::WordFilter;
