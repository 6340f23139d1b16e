//! voxcode - voice-driven development assistant
//!
//! Pipeline: speech audio -> transcription -> structured prompt -> LLM
//! routing (single client or sequential agent swarm) -> generated code or
//! synthesized speech. Ships an HTTP/WebSocket API, a CLI, an in-memory
//! session store and a git wrapper for repository-aware workflows.

pub mod cli;
pub mod config;
pub mod git;
pub mod llm;
pub mod prompt;
pub mod scaffold;
pub mod server;
pub mod session;
pub mod stt;
pub mod tts;

pub use config::Config;
pub use llm::{Agent, AgentRole, LlmError, LlmRouter, Provider, TextStream};
pub use prompt::PromptEngine;
pub use session::SessionManager;
