//! memoriva-providers: Language-model provider integrations.
//!
//! Implements the `LlmProvider` trait for OpenAI-compatible chat-completion
//! APIs (DeepSeek and OpenAI), plus configuration loading and a mock provider
//! for tests.

pub mod config;
pub mod error;
pub mod mock;
pub mod openai;

pub use config::{
    create_provider, load_config_from, resolve_provider, MemorivaConfig, ProviderConfig,
};
pub use error::ProviderError;
