//! Prompt rendering for per-item plan generation.

use chrono::NaiveDate;
use minijinja::{Environment, context};
use tracing::debug;

use anyhow::Result;

use crate::core::truncate::truncate_chars;

const PLAN_TEMPLATE: &str = include_str!("prompts/plan.md");

/// Everything the plan prompt embeds.
#[derive(Debug, Clone)]
pub struct PlanPromptInputs<'a> {
    pub item_name: &'a str,
    pub content: &'a str,
    pub date: NaiveDate,
    pub content_cap_chars: usize,
}

/// Rendered prompt plus whether the item content had to be cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedPrompt {
    pub text: String,
    pub content_truncated: bool,
}

/// Template engine wrapper around minijinja.
struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("plan", PLAN_TEMPLATE)
            .expect("plan template should be valid");
        Self { env }
    }

    fn render_plan(&self, inputs: &PlanPromptInputs<'_>) -> Result<RenderedPrompt> {
        let (content, content_truncated) =
            truncate_chars(inputs.content.trim(), inputs.content_cap_chars);
        if content_truncated {
            debug!(
                item = inputs.item_name,
                cap = inputs.content_cap_chars,
                "item content truncated for prompt"
            );
        }
        let template = self.env.get_template("plan")?;
        let text = template.render(context! {
            item_name => inputs.item_name,
            date => inputs.date.format("%Y-%m-%d").to_string(),
            content => content.as_ref(),
        })?;
        Ok(RenderedPrompt {
            text,
            content_truncated,
        })
    }
}

pub fn render_plan_prompt(inputs: &PlanPromptInputs<'_>) -> Result<RenderedPrompt> {
    PromptEngine::new().render_plan(inputs)
}
