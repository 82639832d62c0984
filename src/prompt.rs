use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::error::AssistError;

/// Placeholder replaced with the user's selection.
pub const MARKER: &str = "%TEXT%";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub name: String,
    pub text: String,
}

impl PromptTemplate {
    pub fn new(id: &str, name: &str, text: &str) -> Self {
        Self { id: id.to_string(), name: name.to_string(), text: text.to_string() }
    }

    pub fn marker_count(&self) -> usize {
        self.text.matches(MARKER).count()
    }

    /// Substitute `selection` for the marker, verbatim.
    pub fn resolve(&self, selection: &str) -> Result<String, AssistError> {
        if !self.text.contains(MARKER) {
            return Err(AssistError::Config(format!(
                "Prompt \"{}\" has no {} marker.",
                self.name, MARKER
            )));
        }
        Ok(self.text.replacen(MARKER, selection, 1))
    }
}

pub fn find<'a>(prompts: &'a [PromptTemplate], id: &str) -> Option<&'a PromptTemplate> {
    prompts.iter().find(|p| p.id == id)
}

fn quoted(instruction: &str) -> String {
    format!("{}:\n\n\"{}\"", instruction, MARKER)
}

/// Prompt set of the selection assistant.
pub static DEFAULT_PROMPTS: Lazy<Vec<PromptTemplate>> = Lazy::new(|| {
    [
        ("1", "Generate Reply", "Automatically generate a reply following the text below. Be insightful and suitable for social media like x.com . Limit to 1000 characters. Do not use markdown, use pure text"),
        ("2", "Proofread Text", "Proofread the following text for grammar, spelling, and clarity"),
        ("3", "Translate to Chinese (Simplified)", "Translate the following text to Simplified Chinese"),
        ("4", "Fact and Logic Check with Critical Thinking", "Critically analyze the following text through the lens of a critical thinker. Conduct both fact and logic checks"),
        ("5", "Analyze via Separation of Powers", "Evaluate the following text regarding the US Constitution's principle of separation of powers (legislative, executive, judicial). Note any potential imbalances or checks. Concise analysis (under 280 chars)"),
        ("6", "Identify Underlying Assumptions", "What are the key underlying assumptions in the following text? Briefly list them (under 280 chars total)"),
        ("7", "Evaluate Evidence/Support", "Briefly assess the strength and type of evidence or support used in the following text (e.g., anecdotal, statistical, logical). Note any weaknesses (under 280 chars)"),
        ("8", "Generate Counter-Argument", "Generate a concise, logical counter-argument or opposing viewpoint to the main point of the following text (under 280 chars)"),
        ("9", "Explore Potential Implications", "Briefly outline one significant potential implication or consequence (intended or unintended) of the idea presented in the following text (under 280 chars)"),
        ("10", "Counter-Argument (Two Segments)", "Critically analyze the following text based on verifiable facts and sound reasoning. Generate a concise counter-argument (under 460 characters so it can be posted as two segments)"),
    ]
    .into_iter()
    .map(|(id, name, instruction)| PromptTemplate::new(id, name, &quoted(instruction)))
    .collect()
});

/// Prompt set of the reply writer, which fills an editable box.
pub static REPLY_PROMPTS: Lazy<Vec<PromptTemplate>> = Lazy::new(|| {
    [
        ("reply", "Write Reply", "Write a short, friendly reply to the following message. Use plain text only"),
        ("rebuttal", "Write Rebuttal", "Write a polite but firm rebuttal to the following post. Keep it under 280 characters"),
        ("translate_en", "Translate to English", "Translate the following text to English"),
    ]
    .into_iter()
    .map(|(id, name, instruction)| PromptTemplate::new(id, name, &quoted(instruction)))
    .collect()
});
