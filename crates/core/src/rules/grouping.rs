//! Multi-token groupers.
//!
//! Each grouper walks the page's tokens in `(block, line, word)` order and
//! only ever groups tokens that share a `(block, line)`.

use super::heuristics::PatternSet;
use super::normalize::{is_punctuation_only, normalize_token};
use super::{PiiBox, PiiLabel};
use crate::config::{
    ADDRESS_LOOKAHEAD, ADDRESS_MAX_NUMBER_DIGITS, ADDRESS_MIN_TOKENS, CARD_GROUP_COUNT,
    CARD_GROUP_DIGITS, NAME_MAX_FRAGMENTS, NAME_MIN_FRAGMENTS,
};
use crate::document::Token;
use crate::geometry;

fn is_digits(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

fn span_box(page: u32, tokens: &[&Token], label: PiiLabel) -> Option<PiiBox> {
    let bbox = geometry::union(tokens.iter().map(|t| &t.bbox))?;
    let value = tokens
        .iter()
        .map(|t| normalize_token(&t.text))
        .collect::<Vec<_>>()
        .join(" ");
    Some(PiiBox::new(page, bbox, label, &value))
}

/// Four adjacent four-digit tokens on one line, e.g. `4111 1111 1111 1111`.
pub fn group_credit_cards(page: u32, tokens: &[Token]) -> Vec<PiiBox> {
    let mut found = Vec::new();
    let mut i = 0;

    while i + CARD_GROUP_COUNT <= tokens.len() {
        let window = &tokens[i..i + CARD_GROUP_COUNT];
        let is_card = window.iter().all(|t| {
            let text = normalize_token(&t.text);
            t.same_line(&window[0]) && text.len() == CARD_GROUP_DIGITS && is_digits(text)
        });

        if is_card {
            let refs: Vec<&Token> = window.iter().collect();
            if let Some(b) = span_box(page, &refs, PiiLabel::CreditCardLike) {
                found.push(b);
            }
            i += CARD_GROUP_COUNT;
        } else {
            i += 1;
        }
    }

    found
}

/// House number followed, on the same line, by a street type within a short
/// window, e.g. `742 Evergreen Terrace`.
pub fn group_addresses(page: u32, tokens: &[Token], patterns: &PatternSet) -> Vec<PiiBox> {
    let mut found = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let anchor = &tokens[i];
        let number = normalize_token(&anchor.text);

        if is_digits(number) && number.len() <= ADDRESS_MAX_NUMBER_DIGITS {
            let last = (i + ADDRESS_LOOKAHEAD).min(tokens.len() - 1);
            let street_end = (i + 1..=last)
                .take_while(|&j| tokens[j].same_line(anchor))
                .find(|&j| patterns.is_street_type(&tokens[j].text));

            if let Some(end) = street_end {
                if end - i + 1 >= ADDRESS_MIN_TOKENS {
                    let refs: Vec<&Token> = tokens[i..=end].iter().collect();
                    if let Some(b) = span_box(page, &refs, PiiLabel::AddressLike) {
                        found.push(b);
                    }
                    i = end + 1;
                    continue;
                }
            }
        }

        i += 1;
    }

    found
}

/// Capitalised name fragments following a label such as `Name:` or
/// `Applicant`. Deliberately conservative: at least two fragments are needed.
pub fn group_names(page: u32, tokens: &[Token], patterns: &PatternSet) -> Vec<PiiBox> {
    let mut found = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let anchor = &tokens[i];
        if !patterns.is_name_label(&anchor.text) {
            i += 1;
            continue;
        }

        let mut fragments: Vec<&Token> = Vec::new();
        let mut j = i + 1;
        while j < tokens.len() && tokens[j].same_line(anchor) && fragments.len() < NAME_MAX_FRAGMENTS
        {
            let token = &tokens[j];
            if patterns.is_name_label(&token.text) {
                break;
            }
            if is_punctuation_only(&token.text) || patterns.is_name_sub_label(&token.text) {
                j += 1;
                continue;
            }
            if patterns.is_name_fragment(normalize_token(&token.text)) {
                fragments.push(token);
            } else if fragments.len() >= NAME_MIN_FRAGMENTS {
                break;
            }
            j += 1;
        }

        if fragments.len() >= NAME_MIN_FRAGMENTS {
            if let Some(b) = span_box(page, &fragments, PiiLabel::Name) {
                found.push(b);
            }
            i = j;
        } else {
            i += 1;
        }
    }

    found
}
