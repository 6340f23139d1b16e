//! Prompt template engine
//!
//! Converts natural speech transcripts into structured prompts with XML task
//! tags, keyword-extracted intent/entities, optional chain-of-thought and an
//! output-format block. Also manages named templates with `{var}` placeholder
//! substitution, loadable from YAML files.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Keyword tables for intent extraction, checked in order.
const INTENTS: &[(&str, &[&str])] = &[
    ("create", &["create", "build", "make", "generate", "scaffold"]),
    ("modify", &["change", "update", "modify", "refactor", "improve"]),
    ("debug", &["fix", "debug", "resolve", "error", "bug"]),
    ("explain", &["explain", "describe", "what is", "how does"]),
    ("test", &["test", "testing", "unit test", "integration test"]),
];

const LANGUAGES: &[&str] = &["python", "javascript", "typescript", "java", "go", "rust"];
const FRAMEWORKS: &[&str] = &["fastapi", "django", "flask", "react", "vue", "express"];
const PATTERNS: &[&str] = &["rest api", "microservice", "crud", "authentication"];

/// A named template with `{var}` placeholders.
#[derive(Debug, Clone)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    /// Substitute `{key}` placeholders with the supplied values. Unknown
    /// placeholders are left in place.
    pub fn render(&self, vars: &[(String, String)]) -> String {
        let mut out = self.template.clone();
        for (key, value) in vars {
            out = out.replace(&format!("{{{}}}", key), value);
        }
        out
    }
}

/// YAML template file layout: `name` plus `template` body.
#[derive(Debug, Deserialize)]
struct TemplateFile {
    name: Option<String>,
    #[serde(default)]
    template: String,
}

/// Engine for structured-prompt translation and template rendering.
#[derive(Debug, Default)]
pub struct PromptEngine {
    templates: HashMap<String, PromptTemplate>,
}

impl PromptEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an engine, loading any `*.yaml` templates under `template_dir`.
    pub fn with_template_dir(template_dir: &Path) -> Result<Self> {
        let mut engine = Self::new();
        if template_dir.exists() {
            engine.load_templates(template_dir)?;
        }
        Ok(engine)
    }

    fn load_templates(&mut self, dir: &Path) -> Result<()> {
        for entry in std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read template dir: {}", dir.display()))?
        {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .map(|e| e == "yaml" || e == "yml")
                .unwrap_or(false);
            if !is_yaml {
                continue;
            }

            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read template: {}", path.display()))?;
            let file: TemplateFile = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse template: {}", path.display()))?;

            let name = file.name.unwrap_or_else(|| {
                path.file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });
            debug!(template = %name, "loaded prompt template");
            self.templates.insert(name, PromptTemplate::new(file.template));
        }
        Ok(())
    }

    /// Register a template under a name, replacing any existing one.
    pub fn register_template(&mut self, name: impl Into<String>, template: impl Into<String>) {
        self.templates.insert(name.into(), PromptTemplate::new(template));
    }

    /// Render a registered template.
    pub fn render_template(&self, name: &str, vars: &[(String, String)]) -> Result<String> {
        match self.templates.get(name) {
            Some(template) => Ok(template.render(vars)),
            None => bail!("Template '{}' not found", name),
        }
    }

    /// Translate natural speech into a structured prompt. The router treats
    /// the result as an opaque prompt string.
    pub fn translate_to_structured_prompt(
        &self,
        natural_text: &str,
        task_type: &str,
        include_cot: bool,
        context: &[(String, String)],
    ) -> String {
        let intent = extract_intent(natural_text, task_type);
        let entities = extract_entities(natural_text);

        let mut parts: Vec<String> = Vec::new();

        parts.push(format!("<task type='{}'>", task_type));
        parts.push(format!("  <intent>{}</intent>", intent));
        parts.push(format!("  <natural_input>{}</natural_input>", natural_text));

        if !entities.is_empty() {
            parts.push("  <entities>".to_string());
            for (key, value) in &entities {
                parts.push(format!("    <{key}>{value}</{key}>"));
            }
            parts.push("  </entities>".to_string());
        }

        if !context.is_empty() {
            parts.push("  <context>".to_string());
            for (key, value) in context {
                parts.push(format!("    <{key}>{value}</{key}>"));
            }
            parts.push("  </context>".to_string());
        }

        parts.push("</task>".to_string());

        if include_cot {
            parts.push("\n<reasoning>".to_string());
            parts.push("  Think step by step:".to_string());
            parts.push("  1. Understand the user's intent".to_string());
            parts.push("  2. Identify required components and structure".to_string());
            parts.push("  3. Plan the implementation approach".to_string());
            parts.push("  4. Generate clean, maintainable code".to_string());
            parts.push("</reasoning>".to_string());
        }

        parts.push("\n<output_format>".to_string());
        parts.push("  Provide the implementation with:".to_string());
        parts.push("  - Clear file structure".to_string());
        parts.push("  - Well-documented code".to_string());
        parts.push("  - Following best practices".to_string());
        parts.push("  - DDD principles where applicable".to_string());
        parts.push("</output_format>".to_string());

        parts.join("\n")
    }
}

/// Keyword-based intent extraction; falls back to the task type.
fn extract_intent(text: &str, default_task: &str) -> String {
    let text_lower = text.to_lowercase();
    for (intent, keywords) in INTENTS {
        if keywords.iter().any(|kw| text_lower.contains(kw)) {
            return (*intent).to_string();
        }
    }
    default_task.to_string()
}

/// Keyword-based entity extraction: first matching language, framework and
/// pattern, in that key order.
fn extract_entities(text: &str) -> Vec<(String, String)> {
    let text_lower = text.to_lowercase();
    let mut entities = Vec::new();

    if let Some(lang) = LANGUAGES.iter().find(|l| text_lower.contains(*l)) {
        entities.push(("language".to_string(), (*lang).to_string()));
    }
    if let Some(framework) = FRAMEWORKS.iter().find(|f| text_lower.contains(*f)) {
        entities.push(("framework".to_string(), (*framework).to_string()));
    }
    if let Some(pattern) = PATTERNS.iter().find(|p| text_lower.contains(*p)) {
        entities.push(("pattern".to_string(), (*pattern).to_string()));
    }

    entities
}
