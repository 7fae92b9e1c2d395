//! Streaming completion client module.

mod completion;
mod llm_client;
mod sse;

pub use completion::*;
pub use llm_client::*;
pub use sse::*;
