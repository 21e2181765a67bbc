use regex::Regex;
use std::borrow::Cow;
use std::sync::OnceLock;

use super::Sanitizer;

/// Replacement for a redacted address.
pub const EMAIL_MASK: &str = "•••@•••";

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(r"[\p{L}\p{N}._%+\-]+@[\p{L}\p{N}\-]+(?:\.[\p{L}\p{N}\-]+)*\.\p{L}{2,}")
            .expect("email pattern is valid")
    })
}

/// Masks e-mail addresses.
pub struct EmailSanitizer;

impl Sanitizer for EmailSanitizer {
    fn name(&self) -> &'static str {
        "email"
    }

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if !text.contains('@') {
            return Cow::Borrowed(text);
        }
        email_regex().replace_all(text, EMAIL_MASK)
    }
}
