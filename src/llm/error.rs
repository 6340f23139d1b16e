//! Error taxonomy for the LLM routing layer

use thiserror::Error;

use crate::llm::client::Provider;

/// Errors surfaced by the router and generation clients.
///
/// `Configuration` is fatal to the call and reported before any remote
/// request is made. `Generation` carries the backend name and the
/// underlying cause; it is never retried or translated locally.
#[derive(Debug, Error)]
pub enum LlmError {
    /// The requested provider has no registered client.
    #[error("no client configured for provider '{provider}'")]
    Configuration { provider: Provider },

    /// A remote generation call failed (network, auth, malformed payload).
    #[error("{provider} generation error: {message}")]
    Generation { provider: Provider, message: String },
}

impl LlmError {
    pub fn generation(provider: Provider, message: impl Into<String>) -> Self {
        Self::Generation {
            provider,
            message: message.into(),
        }
    }
}
