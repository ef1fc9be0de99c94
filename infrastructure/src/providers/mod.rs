//! LLM provider adapters.
//!
//! The MCP client side of this crate is provider-agnostic — §6 of the
//! spec treats the LLM side as an external, interface-only collaborator.
//! [`OpenAiCompatibleProvider`] is the one concrete adapter: it speaks the
//! OpenAI chat-completions wire format, which covers OpenAI itself, Groq,
//! Ollama (OpenAI-compat mode), and any other endpoint exposing the same
//! shape via `api_base`.

mod openai_compatible;
mod registry;

pub use openai_compatible::OpenAiCompatibleProvider;
pub use registry::{ProviderRegistry, ProviderRegistryError};
