use tracing::{debug, warn};

use crate::ai::AIProvider;
use crate::config::LlmConfig;
use crate::models::CoverLetter;

/// Writes cover letters through an AI provider. Never fails: a provider error
/// yields an empty letter marked as not generated.
pub struct LetterWriter<'a> {
    provider: &'a dyn AIProvider,
    max_tokens: u32,
    max_prompt_chars: usize,
}

impl<'a> LetterWriter<'a> {
    pub fn new(provider: &'a dyn AIProvider, config: &LlmConfig) -> Self {
        Self {
            provider,
            max_tokens: config.max_tokens,
            max_prompt_chars: config.max_prompt_chars,
        }
    }

    pub fn generate(&self, title: &str, company: &str, description: &str, resume_text: &str) -> CoverLetter {
        if title.trim().is_empty() || company.trim().is_empty() {
            warn!("Refusing to generate a cover letter without a job title and company");
            return CoverLetter::failed();
        }

        let prompt = self.prompt(title, company, description, resume_text);
        debug!(
            "Requesting cover letter from {} ({} prompt chars)",
            self.provider.model_name(),
            prompt.len()
        );

        match self.provider.complete(&prompt, self.max_tokens) {
            Ok(text) if !text.trim().is_empty() => CoverLetter::generated(text.trim().to_string()),
            Ok(_) => {
                warn!("Cover letter generation returned no text");
                CoverLetter::failed()
            }
            Err(e) => {
                warn!("Cover letter generation failed: {:#}", e);
                CoverLetter::failed()
            }
        }
    }

    fn prompt(&self, title: &str, company: &str, description: &str, resume_text: &str) -> String {
        let mut prompt = String::from("Write a professional and tailored cover letter for the following job:\n");
        prompt.push_str(&format!("Job Title: {}\n", title.trim()));
        prompt.push_str(&format!("Company Name: {}\n", company.trim()));

        let description = truncate_chars(description.trim(), self.max_prompt_chars);
        if !description.is_empty() {
            prompt.push_str(&format!("Job Description: {}\n", description));
        }

        let resume_text = truncate_chars(resume_text.trim(), self.max_prompt_chars);
        if !resume_text.is_empty() {
            prompt.push_str(&format!("Resume Details: {}\n", resume_text));
        }

        prompt.push_str(
            "Make it engaging, concise, and aligned with industry standards. \
             Respond with the letter only, no preamble.",
        );
        prompt
    }
}

fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
