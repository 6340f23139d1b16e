//! Router integration tests with scripted generation clients.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};

use voxcode::llm::{
    swarm_roles, AgentRole, GenerationClient, GenerationOptions, LlmError, LlmRouter, Provider,
    TextStream,
};

/// Wraps every prompt as `F[...]`, emitted as three fragments.
struct WrapClient;

#[async_trait]
impl GenerationClient for WrapClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(
        &self,
        prompt: &str,
        _options: GenerationOptions,
    ) -> Result<TextStream, LlmError> {
        let fragments = vec!["F[".to_string(), prompt.to_string(), "]".to_string()];
        Ok(stream::iter(fragments.into_iter().map(Ok)).boxed())
    }
}

/// Emits a fixed fragment sequence regardless of the prompt.
struct ScriptedClient {
    fragments: Vec<&'static str>,
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: GenerationOptions,
    ) -> Result<TextStream, LlmError> {
        let fragments: Vec<Result<String, LlmError>> = self
            .fragments
            .iter()
            .map(|f| Ok(f.to_string()))
            .collect();
        Ok(stream::iter(fragments).boxed())
    }
}

/// Fails mid-stream after one good fragment.
struct FlakyClient;

#[async_trait]
impl GenerationClient for FlakyClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate(
        &self,
        _prompt: &str,
        _options: GenerationOptions,
    ) -> Result<TextStream, LlmError> {
        let items: Vec<Result<String, LlmError>> = vec![
            Ok("partial".to_string()),
            Err(LlmError::generation(Provider::Anthropic, "backend exploded")),
        ];
        Ok(stream::iter(items).boxed())
    }
}

fn wrap_router() -> LlmRouter {
    LlmRouter::new(Provider::OpenAi).with_client(Arc::new(WrapClient))
}

async fn collect(mut stream: TextStream) -> Result<Vec<String>, LlmError> {
    let mut out = Vec::new();
    while let Some(fragment) = stream.next().await {
        out.push(fragment?);
    }
    Ok(out)
}

/// Expected output of one agent stage for WrapClient.
fn stage(role: AgentRole, input: &str) -> String {
    format!("F[{}\n\n{}]", role.default_preamble(), input)
}

#[tokio::test]
async fn direct_routing_preserves_fragments() {
    let router = wrap_router();
    let stream = router
        .route_task("hello", "code_generation", false, None, true)
        .await
        .unwrap();
    let fragments = collect(stream).await.unwrap();
    assert_eq!(fragments, vec!["F[", "hello", "]"]);
}

#[tokio::test]
async fn swarm_non_stream_yields_single_final_fragment() {
    let router = wrap_router();
    let stream = router
        .route_task("task", "code_generation", true, None, false)
        .await
        .unwrap();
    let fragments = collect(stream).await.unwrap();

    // code_generation chains architect then developer; the developer sees the
    // architect's full output as its task
    let architect_out = stage(AgentRole::Architect, "task");
    let expected = stage(AgentRole::Developer, &architect_out);
    assert_eq!(fragments, vec![expected]);
}

#[tokio::test]
async fn swarm_stream_and_non_stream_concatenate_equally() {
    let router = wrap_router();

    let streamed = router
        .route_task("task", "code_generation", true, None, true)
        .await
        .unwrap();
    let streamed_fragments = collect(streamed).await.unwrap();
    // Two stages, three fragments each
    assert_eq!(streamed_fragments.len(), 6);

    let buffered = router
        .route_task("task", "code_generation", true, None, false)
        .await
        .unwrap();
    let buffered_fragments = collect(buffered).await.unwrap();
    assert_eq!(buffered_fragments.len(), 1);

    // Streamed final-stage fragments concatenate to the buffered output
    let streamed_final: String = streamed_fragments[3..].concat();
    assert_eq!(streamed_final, buffered_fragments[0]);
}

#[tokio::test]
async fn unknown_task_type_uses_single_developer() {
    assert_eq!(swarm_roles("make_it_nice"), vec![AgentRole::Developer]);

    let router = wrap_router();
    let stream = router
        .route_task("task", "make_it_nice", true, None, false)
        .await
        .unwrap();
    let fragments = collect(stream).await.unwrap();
    assert_eq!(fragments, vec![stage(AgentRole::Developer, "task")]);
}

#[tokio::test]
async fn review_task_runs_single_reviewer() {
    let router = wrap_router();
    let stream = router
        .route_task("look at this", "code_review", true, None, false)
        .await
        .unwrap();
    let fragments = collect(stream).await.unwrap();
    assert_eq!(fragments, vec![stage(AgentRole::Reviewer, "look at this")]);
}

#[tokio::test]
async fn testing_task_runs_single_tester() {
    let router = wrap_router();
    let stream = router
        .route_task("cover the edge cases", "testing", true, None, false)
        .await
        .unwrap();
    let fragments = collect(stream).await.unwrap();
    assert_eq!(
        fragments,
        vec![stage(AgentRole::Tester, "cover the edge cases")]
    );
}

#[tokio::test]
async fn ordered_fragments_arrive_in_production_order() {
    let router = LlmRouter::new(Provider::OpenAi).with_client(Arc::new(ScriptedClient {
        fragments: vec!["2", "+", "2", "=", "4"],
    }));

    let stream = router
        .route_task("what is 2+2", "math", false, None, true)
        .await
        .unwrap();
    let fragments = collect(stream).await.unwrap();
    assert_eq!(fragments, vec!["2", "+", "2", "=", "4"]);
}

#[tokio::test]
async fn unregistered_provider_is_configuration_error() {
    let router = wrap_router();
    let err = router
        .route_task("task", "code_generation", false, Some(Provider::Anthropic), true)
        .await
        .err().unwrap();
    assert!(matches!(
        err,
        LlmError::Configuration {
            provider: Provider::Anthropic
        }
    ));

    // Same for the swarm path
    let err = router
        .route_task("task", "code_generation", true, Some(Provider::Anthropic), true)
        .await
        .err().unwrap();
    assert!(matches!(err, LlmError::Configuration { .. }));
}

#[tokio::test]
async fn empty_router_rejects_default_provider() {
    let router = LlmRouter::new(Provider::OpenAi);
    let err = router
        .route_task("task", "code_generation", false, None, false)
        .await
        .err().unwrap();
    assert!(matches!(
        err,
        LlmError::Configuration {
            provider: Provider::OpenAi
        }
    ));
}

#[tokio::test]
async fn mid_stream_failure_aborts_swarm() {
    let router = LlmRouter::new(Provider::Anthropic).with_client(Arc::new(FlakyClient));

    let mut stream = router
        .route_task("task", "code_generation", true, None, true)
        .await
        .unwrap();

    // First stage forwards its good fragment, then the error ends the chain
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first, "partial");
    let err = stream.next().await.unwrap().err().unwrap();
    assert!(matches!(err, LlmError::Generation { .. }));
    assert!(stream.next().await.is_none());
}

#[tokio::test]
async fn explicit_provider_is_honored_in_swarm() {
    let router = LlmRouter::new(Provider::Anthropic).with_client(Arc::new(WrapClient));

    // Default provider has no client, but the explicit one does
    let stream = router
        .route_task("task", "code_review", true, Some(Provider::OpenAi), false)
        .await
        .unwrap();
    let fragments = collect(stream).await.unwrap();
    assert_eq!(fragments, vec![stage(AgentRole::Reviewer, "task")]);
}
