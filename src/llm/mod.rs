// src/llm/mod.rs
// Chat provider clients and LLM output extraction

mod client;
mod extraction;
mod ollama;
mod openai_compat;
mod provider;

pub use client::{ChatClient, Hypothesis};
pub use extraction::{estimate_confidence, first_balanced_array, first_balanced_object, parse_concepts};
pub use ollama::OllamaChat;
pub use openai_compat::OpenAiCompatChat;
pub use provider::{
    chat_provider_from_config, ChatProvider, GenerateMode, GenerateOptions, LastCallInfo,
};
