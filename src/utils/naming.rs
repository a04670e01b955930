use std::sync::Arc;

use uuid::Uuid;

use crate::utils::slug;

/// Source of the unique, time-ordered token appended to every file name.
pub trait TokenSource: Send + Sync {
    fn next_token(&self) -> String;
}

/// UUID v7 in simple (hex) form: unique, and sorts by creation time.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidV7Tokens;

impl TokenSource for UuidV7Tokens {
    fn next_token(&self) -> String {
        Uuid::now_v7().simple().to_string()
    }
}

#[derive(Clone)]
pub struct NameGenerator {
    extension: String,
    tokens: Arc<dyn TokenSource>,
}

impl NameGenerator {
    pub fn new(extension: impl Into<String>) -> Self {
        Self::with_tokens(extension, Arc::new(UuidV7Tokens))
    }

    pub fn with_tokens(extension: impl Into<String>, tokens: Arc<dyn TokenSource>) -> Self {
        Self {
            extension: extension.into(),
            tokens,
        }
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    /// `part-part-...-<token>.<ext>`; empty parts are skipped.
    pub fn generate<S: AsRef<str>>(&self, prefix_parts: &[S]) -> String {
        let mut segments: Vec<String> = prefix_parts
            .iter()
            .map(|p| slug(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();
        segments.push(self.tokens.next_token());
        format!("{}.{}", segments.join("-"), self.extension)
    }
}
