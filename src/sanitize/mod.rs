//! Redaction of sensitive substrings before records leave the process.
//!
//! Sanitizers are best effort: they catch the common shapes of e-mail addresses
//! and payment-card numbers, not every valid format. Each one is a pure,
//! deterministic function of its input; text they don't match is returned unchanged.

mod credit_card;
mod email;

use std::borrow::Cow;

use crate::config::SanitizationConfig;

pub use credit_card::{CreditCardSanitizer, CARD_MASK};
pub use email::{EmailSanitizer, EMAIL_MASK};

/// A single redaction rule.
pub trait Sanitizer: Send + Sync {
    /// Short rule name used in diagnostics.
    fn name(&self) -> &'static str;

    /// Return `text` with every match of this rule masked.
    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str>;
}

/// The ordered set of sanitizers enabled by a [`SanitizationConfig`].
pub struct Sanitizers {
    rules: Vec<Box<dyn Sanitizer>>,
}

impl Sanitizers {
    pub fn from_config(config: &SanitizationConfig) -> Self {
        let mut rules: Vec<Box<dyn Sanitizer>> = Vec::new();
        if config.emails {
            rules.push(Box::new(EmailSanitizer));
        }
        if config.credit_cards {
            rules.push(Box::new(CreditCardSanitizer));
        }
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    pub fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let mut out = Cow::Borrowed(text);
        for rule in &self.rules {
            let changed = match rule.apply(&out) {
                Cow::Owned(changed) => Some(changed),
                Cow::Borrowed(_) => None,
            };
            if let Some(changed) = changed {
                out = Cow::Owned(changed);
            }
        }
        out
    }
}

impl std::fmt::Debug for Sanitizers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

/// Redact `text` according to `config`.
pub fn sanitize<'a>(text: &'a str, config: &SanitizationConfig) -> Cow<'a, str> {
    Sanitizers::from_config(config).apply(text)
}
