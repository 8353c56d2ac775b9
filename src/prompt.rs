//! Prompt composition for `PROCESS_CONTENT` messages
//!
//! A command names what to do with a piece of page content. Known commands map
//! to fixed instructions; anything else is passed through as a free-form
//! instruction from the user.

use crate::error::LlmError;
use crate::types::CompletionRequest;

const SYSTEM_PROMPT: &str = "You are a helpful assistant that works with the text of web pages. \
Answer in plain prose or concise markdown and do not invent facts that are not in the text.";

/// Action requested for a piece of content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Summarize,
    Explain,
    /// Target language; `None` means English
    Translate(Option<String>),
    KeyPoints,
    /// Anything else, used verbatim as the instruction
    Custom(String),
}

impl Command {
    /// Parse a command string. Matching of known names ignores case and
    /// surrounding whitespace.
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        let (name, argument) = match trimmed.split_once(':') {
            Some((name, arg)) => (name.trim(), Some(arg.trim())),
            None => (trimmed, None),
        };
        match name.to_ascii_lowercase().as_str() {
            "summarize" | "summarise" | "summary" if argument.is_none() => Self::Summarize,
            "explain" if argument.is_none() => Self::Explain,
            "key_points" | "keypoints" | "key-points" if argument.is_none() => Self::KeyPoints,
            "translate" => Self::Translate(
                argument
                    .filter(|lang| !lang.is_empty())
                    .map(str::to_string),
            ),
            _ => Self::Custom(trimmed.to_string()),
        }
    }

    fn instruction(&self) -> String {
        match self {
            Self::Summarize => "Summarize the following content in a few short paragraphs.".into(),
            Self::Explain => {
                "Explain the following content in simple terms, defining any jargon.".into()
            }
            Self::Translate(lang) => format!(
                "Translate the following content into {}. Preserve formatting and meaning.",
                lang.as_deref().unwrap_or("English")
            ),
            Self::KeyPoints => {
                "List the key points of the following content as a bulleted list.".into()
            }
            Self::Custom(text) => text.clone(),
        }
    }
}

/// Build a completion request from a command, page content and page title.
pub fn compose(command: &str, content: &str, title: &str) -> Result<CompletionRequest, LlmError> {
    let command = Command::parse(command);
    let content = content.trim();
    let title = title.trim();

    if content.is_empty() {
        return match command {
            Command::Custom(text) if !text.is_empty() => {
                Ok(CompletionRequest::new(text).with_system(SYSTEM_PROMPT))
            }
            _ => Err(LlmError::ValidationError(
                "no content to process".to_string(),
            )),
        };
    }

    let mut prompt = command.instruction();
    if !prompt.is_empty() {
        prompt.push_str("\n\n");
    }
    if !title.is_empty() {
        prompt.push_str("Title: ");
        prompt.push_str(title);
        prompt.push_str("\n\n");
    }
    prompt.push_str("Content:\n");
    prompt.push_str(content);

    Ok(CompletionRequest::new(prompt).with_system(SYSTEM_PROMPT))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_commands() {
        assert_eq!(Command::parse("summarize"), Command::Summarize);
        assert_eq!(Command::parse(" Explain "), Command::Explain);
        assert_eq!(Command::parse("key_points"), Command::KeyPoints);
        assert_eq!(Command::parse("translate"), Command::Translate(None));
        assert_eq!(
            Command::parse("translate: French"),
            Command::Translate(Some("French".into()))
        );
        assert_eq!(
            Command::parse("What is the author's main claim?"),
            Command::Custom("What is the author's main claim?".into())
        );
    }

    #[test]
    fn prompt_embeds_title_and_content() {
        let request = compose("summarize", "Body text.", "A Title").unwrap();
        assert!(request.prompt.starts_with("Summarize"));
        assert!(request.prompt.contains("Title: A Title"));
        assert!(request.prompt.ends_with("Content:\nBody text."));
        assert!(request.system.is_some());
    }

    #[test]
    fn empty_title_is_omitted() {
        let request = compose("translate:German", "Hallo", "  ").unwrap();
        assert!(request.prompt.contains("into German"));
        assert!(!request.prompt.contains("Title:"));
    }

    #[test]
    fn free_form_question_without_content() {
        let request = compose("Write a haiku about rust", "", "").unwrap();
        assert_eq!(request.prompt, "Write a haiku about rust");
    }

    #[test]
    fn known_command_without_content_is_rejected() {
        assert!(matches!(
            compose("summarize", "   ", "Title"),
            Err(LlmError::ValidationError(_))
        ));
        assert!(compose("", "", "").is_err());
    }
}
