//! Text generation seam for docsight.
//!
//! Provides the `TextGenerator` trait the workflows call, the prompt layout
//! shared by every generator, an OpenAI-compatible chat-completions client,
//! a retrying wrapper, and a dry-run generator that never leaves the process.

mod chat;
mod config;
mod dry_run;
mod generator;
pub mod prompt;
mod retry;

pub use chat::ChatCompletionsGenerator;
pub use config::GenerationConfig;
pub use dry_run::DryRunGenerator;
pub use generator::{GenerationRequest, TextGenerator};
pub use retry::{execute_with_retry, BackoffPolicy, RetryingGenerator};
