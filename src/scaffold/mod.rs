//! Domain-driven design scaffold generator
//!
//! Turns a scaffold definition (usually parsed out of LLM output) into a map
//! of file paths to source text. Python generation is the primary target;
//! TypeScript currently emits a module stub only.

use std::collections::BTreeMap;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Field of an entity or value object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_required")]
    pub required: bool,
    #[serde(default)]
    pub default: Option<Value>,
}

fn default_required() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValueObjectDef {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RepositoryDef {
    pub name: String,
    #[serde(default)]
    pub entity: String,
    #[serde(default)]
    pub methods: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceDef {
    pub name: String,
    #[serde(default)]
    pub methods: Vec<String>,
}

/// Complete scaffold definition for one domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScaffoldSpec {
    #[serde(default = "default_domain_name")]
    pub domain_name: String,
    #[serde(default)]
    pub entities: Vec<EntityDef>,
    #[serde(default)]
    pub value_objects: Vec<ValueObjectDef>,
    #[serde(default)]
    pub repositories: Vec<RepositoryDef>,
    #[serde(default)]
    pub services: Vec<ServiceDef>,
}

fn default_domain_name() -> String {
    "domain".to_string()
}

impl Default for ScaffoldSpec {
    fn default() -> Self {
        Self {
            domain_name: default_domain_name(),
            entities: Vec::new(),
            value_objects: Vec::new(),
            repositories: Vec::new(),
            services: Vec::new(),
        }
    }
}

impl ScaffoldSpec {
    /// Parse a scaffold from LLM output. A fenced ```json block wins; output
    /// without one yields an empty scaffold named `generated_domain`.
    pub fn parse_from_llm_output(llm_output: &str) -> Result<Self> {
        match extract_json_block(llm_output) {
            Some(json_str) => {
                serde_json::from_str(json_str).context("Failed to parse scaffold JSON")
            }
            None => Ok(Self {
                domain_name: "generated_domain".to_string(),
                ..Default::default()
            }),
        }
    }
}

/// Extract the contents of the first ```json fenced block.
fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find("```json")? + "```json".len();
    let rest = &text[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}

/// Code generator for a scaffold, parameterized on target language.
pub struct DddGenerator {
    language: String,
}

impl DddGenerator {
    pub fn new(language: impl Into<String>) -> Self {
        Self {
            language: language.into().to_lowercase(),
        }
    }

    /// Render the scaffold to a path -> source map.
    pub fn generate(&self, scaffold: &ScaffoldSpec) -> Result<BTreeMap<String, String>> {
        match self.language.as_str() {
            "python" => Ok(self.generate_python(scaffold)),
            "typescript" => Ok(self.generate_typescript(scaffold)),
            other => bail!("Unsupported scaffold language: {}", other),
        }
    }

    fn generate_python(&self, scaffold: &ScaffoldSpec) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        let base = &scaffold.domain_name;

        files.insert(
            format!("{base}/__init__.py"),
            format!("\"\"\"{base} domain module.\"\"\"\n"),
        );

        if !scaffold.entities.is_empty() {
            files.insert(format!("{base}/entities/__init__.py"), String::new());
            for entity in &scaffold.entities {
                files.insert(
                    format!("{base}/entities/{}.py", entity.name.to_lowercase()),
                    python_entity(entity),
                );
            }
        }

        if !scaffold.value_objects.is_empty() {
            files.insert(format!("{base}/value_objects/__init__.py"), String::new());
            for vo in &scaffold.value_objects {
                files.insert(
                    format!("{base}/value_objects/{}.py", vo.name.to_lowercase()),
                    python_value_object(vo),
                );
            }
        }

        if !scaffold.repositories.is_empty() {
            files.insert(format!("{base}/repositories/__init__.py"), String::new());
            for repo in &scaffold.repositories {
                files.insert(
                    format!("{base}/repositories/{}.py", repo.name.to_lowercase()),
                    python_repository(repo),
                );
            }
        }

        if !scaffold.services.is_empty() {
            files.insert(format!("{base}/services/__init__.py"), String::new());
            for service in &scaffold.services {
                files.insert(
                    format!("{base}/services/{}.py", service.name.to_lowercase()),
                    python_service(service),
                );
            }
        }

        files
    }

    fn generate_typescript(&self, scaffold: &ScaffoldSpec) -> BTreeMap<String, String> {
        // TypeScript target is a stub for now
        let mut files = BTreeMap::new();
        files.insert(
            format!("{}/index.ts", scaffold.domain_name),
            format!("// {} module\n", scaffold.domain_name),
        );
        files
    }
}

fn python_field_lines(fields: &[FieldDef], lines: &mut Vec<String>) {
    for field in fields {
        let mut type_name = field.type_name.clone();
        if !field.required {
            type_name = format!("Optional[{type_name}]");
        }

        if let Some(default) = &field.default {
            lines.push(format!("    {}: {} = {}", field.name, type_name, default));
        } else if !field.required {
            lines.push(format!("    {}: {} = None", field.name, type_name));
        } else {
            lines.push(format!("    {}: {}", field.name, type_name));
        }
    }
}

fn python_entity(entity: &EntityDef) -> String {
    let mut lines = vec![
        "\"\"\"Entity definition.\"\"\"".to_string(),
        String::new(),
        "from dataclasses import dataclass, field".to_string(),
        "from typing import Optional".to_string(),
        "from uuid import UUID, uuid4".to_string(),
        String::new(),
        String::new(),
        "@dataclass".to_string(),
        format!("class {}:", entity.name),
        format!("    \"\"\"{} entity.\"\"\"", entity.name),
        "    ".to_string(),
        "    id: UUID = field(default_factory=uuid4)".to_string(),
    ];

    python_field_lines(&entity.fields, &mut lines);

    if !entity.methods.is_empty() {
        lines.push(String::new());
        for method in &entity.methods {
            lines.push(format!("    def {method}(self):"));
            lines.push(format!("        \"\"\"Implement {method}.\"\"\""));
            lines.push("        pass".to_string());
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

fn python_value_object(vo: &ValueObjectDef) -> String {
    let mut lines = vec![
        "\"\"\"Value object definition.\"\"\"".to_string(),
        String::new(),
        "from dataclasses import dataclass".to_string(),
        "from typing import Optional".to_string(),
        String::new(),
        String::new(),
        "@dataclass(frozen=True)".to_string(),
        format!("class {}:", vo.name),
        format!("    \"\"\"{} value object.\"\"\"", vo.name),
        "    ".to_string(),
    ];

    python_field_lines(&vo.fields, &mut lines);
    lines.join("\n")
}

fn python_repository(repo: &RepositoryDef) -> String {
    let entity = &repo.entity;
    let mut lines = vec![
        "\"\"\"Repository definition.\"\"\"".to_string(),
        String::new(),
        "from abc import ABC, abstractmethod".to_string(),
        "from typing import List, Optional".to_string(),
        "from uuid import UUID".to_string(),
        format!(
            "from ..entities.{} import {}",
            entity.to_lowercase(),
            entity
        ),
        String::new(),
        String::new(),
        format!("class {}(ABC):", repo.name),
        format!("    \"\"\"{} repository interface.\"\"\"", repo.name),
        String::new(),
        "    @abstractmethod".to_string(),
        format!("    async def get_by_id(self, id: UUID) -> Optional[{entity}]:"),
        format!("        \"\"\"Get {entity} by ID.\"\"\""),
        "        pass".to_string(),
        String::new(),
        "    @abstractmethod".to_string(),
        format!("    async def get_all(self) -> List[{entity}]:"),
        format!("        \"\"\"Get all {entity} instances.\"\"\""),
        "        pass".to_string(),
        String::new(),
        "    @abstractmethod".to_string(),
        format!("    async def save(self, entity: {entity}) -> {entity}:"),
        format!("        \"\"\"Save {entity}.\"\"\""),
        "        pass".to_string(),
        String::new(),
        "    @abstractmethod".to_string(),
        "    async def delete(self, id: UUID) -> bool:".to_string(),
        format!("        \"\"\"Delete {entity} by ID.\"\"\""),
        "        pass".to_string(),
    ];

    if !repo.methods.is_empty() {
        lines.push(String::new());
        for method in &repo.methods {
            lines.push("    @abstractmethod".to_string());
            lines.push(format!("    async def {method}(self):"));
            lines.push(format!("        \"\"\"Implement {method}.\"\"\""));
            lines.push("        pass".to_string());
            lines.push(String::new());
        }
    }

    lines.join("\n")
}

fn python_service(service: &ServiceDef) -> String {
    let mut lines = vec![
        "\"\"\"Domain service definition.\"\"\"".to_string(),
        String::new(),
        "from typing import Any".to_string(),
        String::new(),
        String::new(),
        format!("class {}:", service.name),
        format!("    \"\"\"{} domain service.\"\"\"", service.name),
        String::new(),
        "    def __init__(self):".to_string(),
        format!("        \"\"\"Initialize {}.\"\"\"", service.name),
        "        pass".to_string(),
    ];

    if !service.methods.is_empty() {
        lines.push(String::new());
        for method in &service.methods {
            lines.push(format!(
                "    async def {method}(self, *args, **kwargs) -> Any:"
            ));
            lines.push(format!("        \"\"\"Implement {method}.\"\"\""));
            lines.push("        pass".to_string());
            lines.push(String::new());
        }
    }

    lines.join("\n")
}
