//! Role-based agents for the swarm pipeline
//!
//! An agent binds a fixed persona (system preamble) to a generation client.
//! Agents are built per task invocation and never persisted.

use std::sync::Arc;

use crate::llm::client::{GenerationClient, GenerationOptions, TextStream};
use crate::llm::error::LlmError;

/// Fixed personas available to the swarm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentRole {
    Architect,
    Developer,
    Reviewer,
    Tester,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentRole::Architect => "architect",
            AgentRole::Developer => "developer",
            AgentRole::Reviewer => "reviewer",
            AgentRole::Tester => "tester",
        }
    }

    /// Canonical system preamble for the role. Never mutated at runtime;
    /// callers may override per agent instance instead.
    pub fn default_preamble(&self) -> &'static str {
        match self {
            AgentRole::Architect => {
                "You are a software architect. Design system architecture, \
                 choose appropriate patterns, and plan component structure."
            }
            AgentRole::Developer => {
                "You are a software developer. Implement clean, maintainable code \
                 following best practices and the provided architecture."
            }
            AgentRole::Reviewer => {
                "You are a code reviewer. Review code for quality, correctness, \
                 security issues, and suggest improvements."
            }
            AgentRole::Tester => {
                "You are a QA engineer. Write comprehensive tests, identify edge cases, \
                 and ensure code quality through testing."
            }
        }
    }
}

/// One role bound to one generation client and one system preamble.
/// Lifetime is a single `route_task` call.
pub struct Agent {
    role: AgentRole,
    client: Arc<dyn GenerationClient>,
    system_prompt: String,
}

impl Agent {
    pub fn new(role: AgentRole, client: Arc<dyn GenerationClient>) -> Self {
        Self {
            role,
            client,
            system_prompt: role.default_preamble().to_string(),
        }
    }

    /// Override the role's canonical preamble at construction time.
    pub fn with_system_prompt(
        role: AgentRole,
        client: Arc<dyn GenerationClient>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            role,
            client,
            system_prompt: system_prompt.into(),
        }
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Assemble the effective prompt: preamble, blank line, task text, and a
    /// literal "Context:" block with one `key: value` line per entry, in the
    /// order supplied.
    pub fn build_prompt(&self, task: &str, context: &[(String, String)]) -> String {
        let mut prompt = format!("{}\n\n{}", self.system_prompt, task);

        if !context.is_empty() {
            let context_str = context
                .iter()
                .map(|(k, v)| format!("{}: {}", k, v))
                .collect::<Vec<_>>()
                .join("\n");
            prompt = format!("{}\n\nContext:\n{}", prompt, context_str);
        }

        prompt
    }

    /// Process a task with this agent's persona, delegating generation
    /// verbatim to the bound client. Temperature and max-token defaults are
    /// left untouched; only the streaming flag is forwarded.
    pub async fn process(
        &self,
        task: &str,
        context: &[(String, String)],
        stream: bool,
    ) -> Result<TextStream, LlmError> {
        let prompt = self.build_prompt(task, context);
        self.client
            .generate(&prompt, GenerationOptions::streaming(stream))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use futures::stream::{self, StreamExt};

    use crate::llm::client::Provider;

    struct EchoClient;

    #[async_trait]
    impl GenerationClient for EchoClient {
        fn provider(&self) -> Provider {
            Provider::OpenAi
        }

        async fn generate(
            &self,
            prompt: &str,
            _options: GenerationOptions,
        ) -> Result<TextStream, LlmError> {
            let prompt = prompt.to_string();
            Ok(stream::once(async move { Ok(prompt) }).boxed())
        }
    }

    #[test]
    fn test_default_preambles() {
        let client: Arc<dyn GenerationClient> = Arc::new(EchoClient);
        let agent = Agent::new(AgentRole::Architect, client);
        assert!(agent
            .system_prompt()
            .starts_with("You are a software architect."));
        assert_eq!(agent.role(), AgentRole::Architect);
    }

    #[test]
    fn test_preamble_override() {
        let client: Arc<dyn GenerationClient> = Arc::new(EchoClient);
        let agent = Agent::with_system_prompt(AgentRole::Developer, client, "Custom persona.");
        assert_eq!(agent.system_prompt(), "Custom persona.");
    }

    #[test]
    fn test_build_prompt_without_context() {
        let client: Arc<dyn GenerationClient> = Arc::new(EchoClient);
        let agent = Agent::with_system_prompt(AgentRole::Tester, client, "PREAMBLE");
        assert_eq!(
            agent.build_prompt("do the task", &[]),
            "PREAMBLE\n\ndo the task"
        );
    }

    #[test]
    fn test_build_prompt_with_ordered_context() {
        let client: Arc<dyn GenerationClient> = Arc::new(EchoClient);
        let agent = Agent::with_system_prompt(AgentRole::Developer, client, "P");
        let context = vec![
            ("language".to_string(), "rust".to_string()),
            ("framework".to_string(), "axum".to_string()),
        ];
        let prompt = agent.build_prompt("task", &context);
        assert_eq!(
            prompt,
            "P\n\ntask\n\nContext:\nlanguage: rust\nframework: axum"
        );
    }

    #[tokio::test]
    async fn test_process_delegates_assembled_prompt() {
        let client: Arc<dyn GenerationClient> = Arc::new(EchoClient);
        let agent = Agent::with_system_prompt(AgentRole::Reviewer, client, "SYS");
        let mut out = agent.process("review this", &[], false).await.unwrap();
        assert_eq!(out.next().await.unwrap().unwrap(), "SYS\n\nreview this");
    }
}
