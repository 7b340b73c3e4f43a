use regex::{Regex, RegexBuilder};

/// Keywords that always mark a post as NSFW.
const BUILTIN_KEYWORDS: &[&str] = &["nsfw", "nude", "nudity", "porn", "explicit", "gore", "xxx"];

/// Keyword-based NSFW detector.
///
/// Matches whole words, case-insensitively: "Gorefield" does not trip "gore",
/// while "NSFW" matches "nsfw".
#[derive(Debug)]
pub struct NsfwFilter {
    pattern: Regex,
}

impl NsfwFilter {
    /// Compiles the built-in keyword list plus `extra` into a single alternation.
    pub fn new(extra: &[String]) -> Result<Self, regex::Error> {
        let alternation = BUILTIN_KEYWORDS
            .iter()
            .map(|k| regex::escape(k))
            .chain(extra.iter().map(|k| regex::escape(k)))
            .collect::<Vec<_>>()
            .join("|");

        let pattern = RegexBuilder::new(&format!(r"\b(?:{})\b", alternation))
            .case_insensitive(true)
            .build()?;

        Ok(Self { pattern })
    }

    pub fn is_nsfw(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }

    /// A post is NSFW if its author says so or its title/body trips the keyword list.
    pub fn classify_post(&self, flagged: bool, title: &str, content: &str) -> bool {
        flagged || self.is_nsfw(title) || self.is_nsfw(content)
    }
}
