//! Model backend integration for cot-bench.
//!
//! The only thing the rest of the crate knows about a language model is the
//! [`LlmProvider`] trait: a chat request goes in, text comes out. The
//! [`ChatCompletionsClient`] speaks the OpenAI-compatible protocol that local
//! inference servers expose.
//!
//! ```ignore
//! use cot_bench::llm::{ChatCompletionsClient, GenerationRequest, LlmProvider, Message};
//!
//! let client = ChatCompletionsClient::local()?;
//! let request = GenerationRequest::new("", vec![Message::user("def add(a, b):")])
//!     .with_temperature(0.2)
//!     .with_max_tokens(256);
//! let response = client.generate(request).await?;
//! ```

pub mod client;

pub use client::{
    ChatCompletionsClient, Choice, GenerationRequest, GenerationResponse, LlmProvider, Message,
    Usage, DEFAULT_API_BASE, DEFAULT_MODEL,
};
