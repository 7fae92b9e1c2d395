//! Request construction from a record and the configured persona.

use crate::client::{CompletionRequest, Message};
use crate::models::{PersonaConfig, Record, Result, SamplingConfig, SolaceError};

const DEFAULT_TEMPLATE: &str = "{title}\n\n{description}";

/// Turns records into completion requests.
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    title_suffix: String,
    template: String,
    system_prompt: Option<String>,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self {
            title_suffix: String::new(),
            template: DEFAULT_TEMPLATE.to_string(),
            system_prompt: None,
        }
    }
}

impl PromptBuilder {
    pub fn new(title_suffix: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            title_suffix: title_suffix.into(),
            template: template.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    /// Build from the `[persona]` section, reading the template file if set.
    pub fn from_config(persona: &PersonaConfig) -> Result<Self> {
        let template = match &persona.prompt_template {
            Some(path) => std::fs::read_to_string(path)
                .map_err(|e| SolaceError::io(format!("reading prompt template {}", path.display()), e))?,
            None => DEFAULT_TEMPLATE.to_string(),
        };
        if !template.contains("{title}") && !template.contains("{description}") {
            return Err(SolaceError::InvalidInput(
                "prompt template references neither {title} nor {description}".to_string(),
            ));
        }

        let mut builder = Self::new(persona.title_suffix.clone(), template);
        builder.system_prompt = persona.system_prompt.clone();
        Ok(builder)
    }

    /// Record title with the persona suffix applied.
    pub fn augmented_title(&self, record: &Record) -> String {
        format!("{}{}", record.title, self.title_suffix)
    }

    /// Build the completion request for one record.
    pub fn build(&self, record: &Record, model: &str, sampling: SamplingConfig) -> CompletionRequest {
        let prompt = self
            .template
            .replace("{title}", &self.augmented_title(record))
            .replace("{description}", &record.description);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));

        CompletionRequest {
            model: model.to_string(),
            messages,
            sampling,
        }
    }
}
