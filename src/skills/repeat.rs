//! Repeat skill - echoes its input a configured number of times

use super::{Skill, SkillContext, SkillOutput};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Settings fixed at registration time
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RepeatSettings {
    pub intro: String,
    #[serde(default = "default_times")]
    pub times: usize,
}

impl Default for RepeatSettings {
    fn default() -> Self {
        Self {
            intro: String::new(),
            times: default_times(),
        }
    }
}

fn default_times() -> usize {
    1
}

pub struct RepeatSkill {
    settings: RepeatSettings,
}

impl RepeatSkill {
    pub fn new(settings: RepeatSettings) -> Self {
        Self { settings }
    }
}

#[derive(Debug, Deserialize)]
struct RepeatInput {
    text: String,
}

#[async_trait]
impl Skill for RepeatSkill {
    fn name(&self) -> &'static str {
        "Repeat"
    }

    fn description(&self) -> String {
        "Repeat a piece of text a fixed number of times after a short intro.".to_string()
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "required": ["text"],
            "properties": {
                "text": {
                    "type": "string",
                    "description": "The text to repeat"
                }
            }
        })
    }

    async fn process(&self, input: Value, _ctx: SkillContext) -> SkillOutput {
        let input: RepeatInput = match serde_json::from_value(input) {
            Ok(i) => i,
            Err(e) => return SkillOutput::error(format!("Invalid input: {e}")),
        };

        tracing::debug!(
            intro = %self.settings.intro,
            times = self.settings.times,
            text = %input.text,
            "Repeat"
        );
        let repeated = vec![input.text.as_str(); self.settings.times].join(" ");
        SkillOutput::ok(json!({
            "result": format!("{} :: {repeated}", self.settings.intro)
        }))
    }
}
