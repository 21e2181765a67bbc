use regex::{Captures, Regex};
use std::borrow::Cow;
use std::sync::OnceLock;

use super::Sanitizer;

/// Replacement for a redacted card number.
pub const CARD_MASK: &str = "••••-••••-••••-••••";

/// Card numbers carry between 13 and 19 digits.
const MIN_CARD_DIGITS: usize = 13;
const MAX_CARD_DIGITS: usize = 19;

/// Grouped layouts: 4-6-5 up to 4-4-4-4-3.
const MIN_GROUPS: usize = 3;
const MAX_GROUPS: usize = 5;
const MIN_GROUP_LEN: usize = 3;
const MAX_GROUP_LEN: usize = 6;

/// Letters tolerated in a grouped number before it stops looking like a mistyped card.
const MAX_TYPOS: usize = 2;

static CARD_RUN_REGEX: OnceLock<Regex> = OnceLock::new();

/// Runs of alphanumeric groups that each contain a digit, joined by single
/// spaces or dashes. Candidates for `4111 1111 1111 1111`, `5500-0000-0000-0004`
/// and mistyped variants such as `1111-2a222-3333-4444`.
fn card_run_regex() -> &'static Regex {
    CARD_RUN_REGEX.get_or_init(|| {
        Regex::new(r"[0-9A-Za-z]*[0-9][0-9A-Za-z]*(?:[ \-][0-9A-Za-z]*[0-9][0-9A-Za-z]*)*")
            .expect("card pattern is valid")
    })
}

fn passes_luhn(digits: &[u32]) -> bool {
    let sum: u32 = digits
        .iter()
        .rev()
        .enumerate()
        .map(|(i, &d)| match (i % 2, d * 2) {
            (0, _) => d,
            (_, doubled) if doubled > 9 => doubled - 9,
            (_, doubled) => doubled,
        })
        .sum();
    sum % 10 == 0
}

fn card_shaped(groups: &[&str]) -> bool {
    (MIN_GROUPS..=MAX_GROUPS).contains(&groups.len())
        && groups
            .iter()
            .all(|g| (MIN_GROUP_LEN..=MAX_GROUP_LEN).contains(&g.len()))
}

/// A candidate is card-like when it holds 13 to 19 digits and either
/// - is all digits, in one block or card-shaped groups, and passes the Luhn check, or
/// - is card-shaped with at most a couple of stray letters.
fn is_card_like(candidate: &str) -> bool {
    let digits: Vec<u32> = candidate.chars().filter_map(|c| c.to_digit(10)).collect();
    if !(MIN_CARD_DIGITS..=MAX_CARD_DIGITS).contains(&digits.len()) {
        return false;
    }

    let groups: Vec<&str> = candidate.split([' ', '-']).collect();
    let letters = candidate.chars().filter(|c| c.is_ascii_alphabetic()).count();
    if letters == 0 {
        (groups.len() == 1 || card_shaped(&groups)) && passes_luhn(&digits)
    } else {
        letters <= MAX_TYPOS && card_shaped(&groups)
    }
}

/// Byte spans of the groups in a run.
fn group_spans(run: &str) -> Vec<(usize, usize)> {
    let mut spans = Vec::new();
    let mut start = 0;
    for (i, c) in run.char_indices() {
        if c == ' ' || c == '-' {
            spans.push((start, i));
            start = i + 1;
        }
    }
    spans.push((start, run.len()));
    spans
}

/// Mask every card-like window of consecutive groups in `run`, longest first.
/// Returns `None` when nothing was masked.
fn mask_run(run: &str) -> Option<String> {
    let spans = group_spans(run);
    let mut out = String::with_capacity(run.len());
    let mut copied = 0;
    let mut i = 0;

    while i < spans.len() {
        let last = spans.len().min(i + MAX_GROUPS);
        let hit = (i + 1..=last)
            .rev()
            .find(|&j| is_card_like(&run[spans[i].0..spans[j - 1].1]));
        match hit {
            Some(j) => {
                out.push_str(&run[copied..spans[i].0]);
                out.push_str(CARD_MASK);
                copied = spans[j - 1].1;
                i = j;
            }
            None => i += 1,
        }
    }

    if copied == 0 {
        return None;
    }
    out.push_str(&run[copied..]);
    Some(out)
}

/// Masks payment-card numbers.
pub struct CreditCardSanitizer;

impl Sanitizer for CreditCardSanitizer {
    fn name(&self) -> &'static str {
        "credit_card"
    }

    fn apply<'a>(&self, text: &'a str) -> Cow<'a, str> {
        let regex = card_run_regex();
        if !regex.find_iter(text).any(|m| mask_run(m.as_str()).is_some()) {
            return Cow::Borrowed(text);
        }
        Cow::Owned(
            regex
                .replace_all(text, |caps: &Captures| {
                    let run = &caps[0];
                    mask_run(run).unwrap_or_else(|| run.to_string())
                })
                .into_owned(),
        )
    }
}
