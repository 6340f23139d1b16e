//! HTTP handlers

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Multipart, Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::json;
use tracing::{error, info};

use crate::llm::Provider;
use crate::scaffold::{DddGenerator, ScaffoldSpec};

use super::ServerState;

fn internal_error(context: &str, err: impl std::fmt::Display) -> Response {
    error!("{context}: {err}");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"error": context, "details": err.to_string()})),
    )
        .into_response()
}

fn bad_request(message: impl Into<String>) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({"error": message.into()})),
    )
        .into_response()
}

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "voxcode",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

pub async fn health() -> impl IntoResponse {
    Json(json!({"status": "healthy"}))
}

/// Pull the `file` field out of a multipart upload.
async fn read_upload(multipart: &mut Multipart) -> Result<Vec<u8>, Response> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| bad_request(format!("Invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let data = field
                .bytes()
                .await
                .map_err(|e| bad_request(format!("Failed to read upload: {e}")))?;
            return Ok(data.to_vec());
        }
    }
    Err(bad_request("Missing 'file' field in upload"))
}

/// Stage uploaded audio on disk and transcribe it.
async fn transcribe_upload(state: &ServerState, audio: &[u8]) -> anyhow::Result<String> {
    let mut file = tempfile::Builder::new().suffix(".wav").tempfile()?;
    file.write_all(audio)?;
    state.stt.transcribe_file(file.path()).await
}

pub async fn transcribe(
    State(state): State<Arc<ServerState>>,
    mut multipart: Multipart,
) -> Response {
    let audio = match read_upload(&mut multipart).await {
        Ok(audio) => audio,
        Err(response) => return response,
    };

    match transcribe_upload(&state, &audio).await {
        Ok(text) => Json(json!({"success": true, "text": text})).into_response(),
        Err(e) => internal_error("Transcription failed", e),
    }
}

#[derive(Debug, Deserialize)]
pub struct PromptRequest {
    pub text: String,
    #[serde(default = "default_task_type")]
    pub task_type: String,
    #[serde(default = "default_true")]
    pub include_cot: bool,
    #[serde(default)]
    pub context: Option<BTreeMap<String, String>>,
}

fn default_task_type() -> String {
    "code_generation".to_string()
}

fn default_true() -> bool {
    true
}

fn context_pairs(context: &Option<BTreeMap<String, String>>) -> Vec<(String, String)> {
    context
        .as_ref()
        .map(|map| map.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}

pub async fn translate_prompt(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<PromptRequest>,
) -> Response {
    let structured = state.prompt_engine.translate_to_structured_prompt(
        &request.text,
        &request.task_type,
        request.include_cot,
        &context_pairs(&request.context),
    );
    Json(json!({"success": true, "structured_prompt": structured})).into_response()
}

#[derive(Debug, Deserialize)]
pub struct CodeGenerationRequest {
    pub prompt: String,
    #[serde(default = "default_task_type")]
    pub task_type: String,
    #[serde(default)]
    pub use_swarm: bool,
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default = "default_true")]
    pub stream: bool,
}

pub async fn generate_code(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<CodeGenerationRequest>,
) -> Response {
    let result = state
        .llm_router
        .route_task(
            &request.prompt,
            &request.task_type,
            request.use_swarm,
            request.provider,
            request.stream,
        )
        .await;

    let stream = match result {
        Ok(stream) => stream,
        Err(e) => return internal_error("Code generation failed", e),
    };

    if request.stream {
        let body = Body::from_stream(stream.map(|fragment| fragment.map(bytes::Bytes::from)));
        return (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response();
    }

    match collect_stream(stream).await {
        Ok(code) => Json(json!({"success": true, "code": code})).into_response(),
        Err(e) => internal_error("Code generation failed", e),
    }
}

async fn collect_stream(mut stream: crate::llm::TextStream) -> Result<String, crate::llm::LlmError> {
    let mut out = String::new();
    while let Some(fragment) = stream.next().await {
        out.push_str(&fragment?);
    }
    Ok(out)
}

#[derive(Debug, Deserialize)]
pub struct VoiceToCodeParams {
    #[serde(default = "default_task_type")]
    pub task_type: String,
    #[serde(default)]
    pub use_swarm: bool,
    #[serde(default = "default_true")]
    pub include_cot: bool,
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn voice_to_code(
    State(state): State<Arc<ServerState>>,
    Query(params): Query<VoiceToCodeParams>,
    mut multipart: Multipart,
) -> Response {
    let audio = match read_upload(&mut multipart).await {
        Ok(audio) => audio,
        Err(response) => return response,
    };

    let transcript = match transcribe_upload(&state, &audio).await {
        Ok(text) => text,
        Err(e) => return internal_error("Transcription failed", e),
    };
    info!(chars = transcript.len(), "transcribed voice input");

    let structured = state.prompt_engine.translate_to_structured_prompt(
        &transcript,
        &params.task_type,
        params.include_cot,
        &[],
    );

    let result = state
        .llm_router
        .route_task(&structured, &params.task_type, params.use_swarm, None, false)
        .await;
    let code = match result {
        Ok(stream) => match collect_stream(stream).await {
            Ok(code) => code,
            Err(e) => return internal_error("Code generation failed", e),
        },
        Err(e) => return internal_error("Code generation failed", e),
    };

    if let Some(session_id) = &params.session_id {
        let recorded = state.sessions.add_to_session(session_id, "user", &transcript)
            && state.sessions.add_to_session(session_id, "assistant", &code);
        if !recorded {
            return bad_request(format!("Session '{session_id}' not found"));
        }
    }

    Json(json!({
        "success": true,
        "transcription": transcript,
        "structured_prompt": structured,
        "code": code
    }))
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct SynthesizeRequest {
    pub text: String,
    #[serde(default)]
    pub voice: Option<String>,
}

pub async fn synthesize(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<SynthesizeRequest>,
) -> Response {
    match state
        .tts
        .synthesize(&request.text, request.voice.as_deref())
        .await
    {
        Ok(audio) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            audio,
        )
            .into_response(),
        Err(e) => internal_error("Speech synthesis failed", e),
    }
}

#[derive(Debug, Deserialize)]
pub struct ScaffoldRequest {
    pub domain_name: String,
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
}

fn default_language() -> String {
    "python".to_string()
}

pub async fn generate_scaffold(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ScaffoldRequest>,
) -> Response {
    let scaffold_prompt = format!(
        "Generate a DDD scaffold for a {} domain with the following description:\n\n\
         {}\n\n\
         Provide the output as JSON with entities, value objects, repositories, and services.",
        request.domain_name, request.description
    );

    let result = state
        .llm_router
        .route_task(&scaffold_prompt, "code_generation", false, None, false)
        .await;
    let llm_output = match result {
        Ok(stream) => match collect_stream(stream).await {
            Ok(output) => output,
            Err(e) => return internal_error("Scaffold generation failed", e),
        },
        Err(e) => return internal_error("Scaffold generation failed", e),
    };

    let mut spec = match ScaffoldSpec::parse_from_llm_output(&llm_output) {
        Ok(spec) => spec,
        Err(e) => return internal_error("Scaffold parsing failed", e),
    };
    spec.domain_name = request.domain_name.clone();

    let files = match DddGenerator::new(&request.language).generate(&spec) {
        Ok(files) => files,
        Err(e) => return internal_error("Scaffold generation failed", e),
    };

    Json(json!({
        "success": true,
        "domain_name": request.domain_name,
        "files": files
    }))
    .into_response()
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub context: HashMap<String, String>,
}

pub async fn create_session(
    State(state): State<Arc<ServerState>>,
    request: Option<Json<CreateSessionRequest>>,
) -> Response {
    let context = request.map(|Json(r)| r.context).unwrap_or_default();
    let session = state.sessions.create_session(context);
    (StatusCode::CREATED, Json(session)).into_response()
}

pub async fn list_sessions(State(state): State<Arc<ServerState>>) -> Response {
    Json(json!({"sessions": state.sessions.list_sessions()})).into_response()
}

pub async fn get_session(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Response {
    match state.sessions.get_session(&id) {
        Some(session) => Json(session).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Session '{id}' not found")})),
        )
            .into_response(),
    }
}

pub async fn delete_session(
    State(state): State<Arc<ServerState>>,
    Path(id): Path<String>,
) -> Response {
    if state.sessions.delete_session(&id) {
        Json(json!({"success": true})).into_response()
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"error": format!("Session '{id}' not found")})),
        )
            .into_response()
    }
}
