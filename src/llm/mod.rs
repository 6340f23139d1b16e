//! LLM routing: generation clients, role-based agents, and the task router

pub mod agent;
pub mod client;
pub mod error;
pub mod router;

pub use agent::{Agent, AgentRole};
pub use client::{
    AnthropicClient, GenerationClient, GenerationOptions, OpenAiClient, Provider, TextStream,
};
pub use error::LlmError;
pub use router::{swarm_roles, LlmRouter};
