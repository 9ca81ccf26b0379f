//! Skills the agent can invoke
//!
//! A skill is the component registration seam: a name, a description and an
//! input schema for the model, plus a `process` routine. Skills are stateless
//! apart from the settings they were registered with.

mod checksum;
mod price;
mod repeat;

pub use checksum::ChecksumSkill;
pub use price::{PriceSkill, DEFAULT_COINGECKO_URL};
pub use repeat::{RepeatSettings, RepeatSkill};

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Result of running a skill
#[derive(Debug, Clone, PartialEq)]
pub struct SkillOutput {
    pub value: Value,
    pub is_error: bool,
}

impl SkillOutput {
    pub fn ok(value: Value) -> Self {
        Self {
            value,
            is_error: false,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            value: json!({ "error": message.into() }),
            is_error: true,
        }
    }

    /// Text handed back to the model as the tool result body
    pub fn to_model_text(&self) -> String {
        match &self.value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

/// Context injected into every skill invocation
#[derive(Clone)]
pub struct SkillContext {
    /// Name of the agent running the skill, for logging
    pub agent_name: String,
    pub http: reqwest::Client,
}

impl SkillContext {
    pub fn new(agent_name: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            agent_name: agent_name.into(),
            http,
        }
    }
}

/// Definition advertised to the model
#[derive(Debug, Clone, PartialEq)]
pub struct SkillDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

#[async_trait]
pub trait Skill: Send + Sync {
    fn name(&self) -> &str;

    /// Description for the model
    fn description(&self) -> String;

    /// JSON schema of the input object
    fn input_schema(&self) -> Value;

    async fn process(&self, input: Value, ctx: SkillContext) -> SkillOutput;
}

/// Named collection of skills
#[derive(Default, Clone)]
pub struct SkillRegistry {
    skills: BTreeMap<String, Arc<dyn Skill>>,
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a skill under its own name, replacing any previous one.
    pub fn register(&mut self, skill: Arc<dyn Skill>) {
        let name = skill.name().to_string();
        if self.skills.insert(name.clone(), skill).is_some() {
            tracing::warn!(skill = %name, "Replaced previously registered skill");
        } else {
            tracing::debug!(skill = %name, "Registered skill");
        }
    }

    #[must_use]
    pub fn with(mut self, skill: impl Skill + 'static) -> Self {
        self.register(Arc::new(skill));
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.skills.keys().map(String::as_str).collect()
    }

    pub fn definitions(&self) -> Vec<SkillDefinition> {
        self.skills
            .values()
            .map(|skill| SkillDefinition {
                name: skill.name().to_string(),
                description: skill.description(),
                input_schema: skill.input_schema(),
            })
            .collect()
    }

    /// Run a skill by name; unknown names produce an error output.
    pub async fn execute(&self, name: &str, input: Value, ctx: SkillContext) -> SkillOutput {
        let Some(skill) = self.get(name) else {
            tracing::warn!(skill = %name, "Model requested unknown skill");
            return SkillOutput::error(format!("Unknown skill: {name}"));
        };

        let start = std::time::Instant::now();
        let output = skill.process(input, ctx).await;
        tracing::info!(
            skill = %name,
            duration_ms = %start.elapsed().as_millis(),
            is_error = output.is_error,
            "Skill finished"
        );
        output
    }
}
