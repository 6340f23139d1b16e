//! Task router: backend selection and sequential agent swarms
//!
//! Routes a structured prompt either directly to one generation client or
//! through a fixed, strictly sequential chain of role-bound agents. The
//! provider map is populated at construction and read-only afterward, so a
//! single router may serve concurrent calls without coordination.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::StreamExt;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, info};

use crate::config::LlmConfig;
use crate::llm::agent::{Agent, AgentRole};
use crate::llm::client::{
    AnthropicClient, GenerationClient, GenerationOptions, OpenAiClient, Provider, TextStream,
};
use crate::llm::error::LlmError;

/// Ordered role sequence for a task type. Unknown task types coalesce into a
/// single-developer chain; matching is exact and case-sensitive.
pub fn swarm_roles(task_type: &str) -> Vec<AgentRole> {
    match task_type {
        "code_generation" => vec![AgentRole::Architect, AgentRole::Developer],
        "code_review" => vec![AgentRole::Reviewer],
        "testing" => vec![AgentRole::Tester],
        _ => vec![AgentRole::Developer],
    }
}

/// Router over generation clients and agent swarms.
pub struct LlmRouter {
    default_provider: Provider,
    clients: HashMap<Provider, Arc<dyn GenerationClient>>,
}

impl LlmRouter {
    /// Create an empty router with a process-wide default provider.
    pub fn new(default_provider: Provider) -> Self {
        Self {
            default_provider,
            clients: HashMap::new(),
        }
    }

    /// Register a client for its provider. Builder-style; the map must be
    /// fully populated before the router starts serving requests.
    pub fn with_client(mut self, client: Arc<dyn GenerationClient>) -> Self {
        self.clients.insert(client.provider(), client);
        self
    }

    /// Build a router from configuration, registering a client for each
    /// provider with a configured API key.
    pub fn from_config(config: &LlmConfig) -> Self {
        let mut router = Self::new(config.default_provider);

        if let Some(key) = &config.openai_api_key {
            router = router.with_client(Arc::new(OpenAiClient::new(
                key.clone(),
                config.openai_model.clone(),
            )));
            info!("Registered OpenAI generation client");
        }
        if let Some(key) = &config.anthropic_api_key {
            router = router.with_client(Arc::new(AnthropicClient::new(
                key.clone(),
                config.anthropic_model.clone(),
            )));
            info!("Registered Anthropic generation client");
        }

        router
    }

    pub fn default_provider(&self) -> Provider {
        self.default_provider
    }

    pub fn has_client(&self, provider: Provider) -> bool {
        self.clients.contains_key(&provider)
    }

    /// Resolve a client: explicit provider if given, else the default.
    /// A missing client is a configuration error, never a silent fallback.
    pub fn client(
        &self,
        provider: Option<Provider>,
    ) -> Result<Arc<dyn GenerationClient>, LlmError> {
        let provider = provider.unwrap_or(self.default_provider);
        self.clients
            .get(&provider)
            .cloned()
            .ok_or(LlmError::Configuration { provider })
    }

    /// Build one agent per role, all bound to the same resolved client.
    pub fn create_agent_swarm(
        &self,
        roles: &[AgentRole],
        provider: Option<Provider>,
    ) -> Result<Vec<Agent>, LlmError> {
        let client = self.client(provider)?;
        Ok(roles
            .iter()
            .map(|&role| Agent::new(role, client.clone()))
            .collect())
    }

    /// Route a task to a single client or an agent swarm.
    ///
    /// Decision logic runs once per call, with no retries and no memoization.
    /// Swarm stages run strictly sequentially: the fully concatenated output
    /// of stage i becomes the entire task input of stage i+1. With
    /// `stream=true` every stage's fragments are forwarded in production
    /// order; with `stream=false` only the final stage's concatenated output
    /// is yielded, as a single fragment. Any stage failure aborts the whole
    /// chain and propagates unmodified.
    pub async fn route_task(
        &self,
        prompt: &str,
        task_type: &str,
        use_swarm: bool,
        provider: Option<Provider>,
        stream: bool,
    ) -> Result<TextStream, LlmError> {
        if !use_swarm {
            let client = self.client(provider)?;
            debug!(provider = %client.provider(), stream, "routing task to single client");
            return client
                .generate(prompt, GenerationOptions::streaming(stream))
                .await;
        }

        let roles = swarm_roles(task_type);
        debug!(
            task_type,
            roles = ?roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
            stream,
            "routing task through agent swarm"
        );
        let agents = self.create_agent_swarm(&roles, provider)?;

        let prompt = prompt.to_string();
        let (tx, rx) = mpsc::channel::<Result<String, LlmError>>(32);

        tokio::spawn(async move {
            let mut current = prompt;

            for agent in &agents {
                debug!(role = agent.role().as_str(), "running swarm stage");
                let mut fragments = match agent.process(&current, &[], stream).await {
                    Ok(fragments) => fragments,
                    Err(e) => {
                        let _ = tx.send(Err(e)).await;
                        return;
                    }
                };

                let mut stage_output = String::new();
                while let Some(fragment) = fragments.next().await {
                    match fragment {
                        Ok(text) => {
                            if stream && tx.send(Ok(text.clone())).await.is_err() {
                                // Consumer cancelled; stop the chain
                                return;
                            }
                            stage_output.push_str(&text);
                        }
                        Err(e) => {
                            let _ = tx.send(Err(e)).await;
                            return;
                        }
                    }
                }

                // Next stage sees only this stage's full output
                current = stage_output;
            }

            if !stream {
                let _ = tx.send(Ok(current)).await;
            }
        });

        Ok(ReceiverStream::new(rx).boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_swarm_roles_known_task_types() {
        assert_eq!(
            swarm_roles("code_generation"),
            vec![AgentRole::Architect, AgentRole::Developer]
        );
        assert_eq!(swarm_roles("code_review"), vec![AgentRole::Reviewer]);
        assert_eq!(swarm_roles("testing"), vec![AgentRole::Tester]);
    }

    #[test]
    fn test_swarm_roles_fallback_is_developer() {
        assert_eq!(swarm_roles("refactor"), vec![AgentRole::Developer]);
        assert_eq!(swarm_roles(""), vec![AgentRole::Developer]);
        // Matching is case-sensitive and exact
        assert_eq!(swarm_roles("Code_Generation"), vec![AgentRole::Developer]);
        assert_eq!(swarm_roles("code_generation "), vec![AgentRole::Developer]);
    }

    #[test]
    fn test_unregistered_provider_is_configuration_error() {
        let router = LlmRouter::new(Provider::OpenAi);
        let err = router.client(None).err().unwrap();
        assert!(matches!(
            err,
            LlmError::Configuration {
                provider: Provider::OpenAi
            }
        ));
    }

    #[test]
    fn test_explicit_provider_never_falls_back() {
        let router = LlmRouter::new(Provider::OpenAi).with_client(Arc::new(OpenAiClient::new(
            "key".to_string(),
            "gpt-4".to_string(),
        )));
        // The default is registered but the explicit request must still fail
        let err = router.client(Some(Provider::Anthropic)).err().unwrap();
        assert!(matches!(
            err,
            LlmError::Configuration {
                provider: Provider::Anthropic
            }
        ));
    }

    #[test]
    fn test_from_config_registers_only_configured_keys() {
        let config = LlmConfig {
            default_provider: Provider::Anthropic,
            openai_api_key: None,
            anthropic_api_key: Some("sk-ant".to_string()),
            ..Default::default()
        };
        let router = LlmRouter::from_config(&config);
        assert!(!router.has_client(Provider::OpenAi));
        assert!(router.has_client(Provider::Anthropic));
        assert_eq!(router.default_provider(), Provider::Anthropic);
    }
}
